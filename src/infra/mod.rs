//! Narrow interfaces to everything outside the process, plus the concrete
//! adapters used by the CLI.

pub mod apibay;
pub mod cache;
pub mod fs;
pub mod transmission;
pub mod tvdb;

use crate::domain::models::{SeriesDetail, SeriesSummary, TorrentInfo};
use crate::error::Result;

pub trait MetadataProvider {
    fn search_series(&self, title: &str) -> Result<Vec<SeriesSummary>>;

    fn get_series_by_id(&self, series_id: &str) -> Result<SeriesDetail>;

    /// Search hits that have a first-aired date, most recent first.
    fn find_series(&self, title: &str) -> Result<Vec<SeriesSummary>> {
        let mut results: Vec<SeriesSummary> = self
            .search_series(title)?
            .into_iter()
            .filter(|r| r.first_aired.is_some())
            .collect();
        results.sort_by(|a, b| b.first_aired.cmp(&a.first_aired));
        Ok(results)
    }
}

pub trait MagnetSearch {
    fn find_episode(&self, series_name: &str, season: u32, episode: u32) -> Result<Option<String>>;
}

pub trait TorrentClient {
    fn list_all(&self) -> Result<Vec<TorrentInfo>>;

    fn remove(&self, id: i64) -> Result<()>;

    fn add(&self, magnet: &str) -> Result<()>;
}
