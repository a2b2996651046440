//! Deterministic collaborators for tests.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::domain::models::{SeriesDetail, SeriesSummary, TorrentInfo};
use crate::error::{Error, Result};
use crate::infra::{MagnetSearch, MetadataProvider, TorrentClient};

#[derive(Default)]
pub struct FakeMetadata {
    pub summaries: Vec<SeriesSummary>,
    pub details: HashMap<String, SeriesDetail>,
    pub fetches: RefCell<Vec<String>>,
}

impl MetadataProvider for FakeMetadata {
    fn search_series(&self, _title: &str) -> Result<Vec<SeriesSummary>> {
        Ok(self.summaries.clone())
    }

    fn get_series_by_id(&self, series_id: &str) -> Result<SeriesDetail> {
        self.fetches.borrow_mut().push(series_id.to_string());
        self.details
            .get(series_id)
            .cloned()
            .ok_or_else(|| Error::Collaborator(format!("unknown series {series_id}")))
    }
}

/// Magnet links keyed by `(series name, season, episode)`.
#[derive(Default)]
pub struct FakeMagnets {
    pub links: HashMap<(String, u32, u32), String>,
    pub fail: bool,
    pub queries: RefCell<usize>,
}

impl FakeMagnets {
    pub fn with(mut self, series: &str, season: u32, episode: u32, link: &str) -> Self {
        self.links
            .insert((series.to_string(), season, episode), link.to_string());
        self
    }
}

impl MagnetSearch for FakeMagnets {
    fn find_episode(&self, series_name: &str, season: u32, episode: u32) -> Result<Option<String>> {
        *self.queries.borrow_mut() += 1;
        if self.fail {
            return Err(Error::Collaborator("magnet search unavailable".into()));
        }
        Ok(self
            .links
            .get(&(series_name.to_string(), season, episode))
            .cloned())
    }
}

#[derive(Default)]
pub struct FakeTorrents {
    pub torrents: RefCell<Vec<TorrentInfo>>,
    pub added: RefCell<Vec<String>>,
    pub removed: RefCell<Vec<i64>>,
    pub fail: bool,
}

impl FakeTorrents {
    pub fn with(self, id: i64, name: &str, percent_done: f64) -> Self {
        self.torrents.borrow_mut().push(TorrentInfo {
            id,
            name: name.to_string(),
            percent_done,
        });
        self
    }
}

impl TorrentClient for FakeTorrents {
    fn list_all(&self) -> Result<Vec<TorrentInfo>> {
        if self.fail {
            return Err(Error::Collaborator("transmission unreachable".into()));
        }
        Ok(self.torrents.borrow().clone())
    }

    fn remove(&self, id: i64) -> Result<()> {
        self.removed.borrow_mut().push(id);
        self.torrents.borrow_mut().retain(|t| t.id != id);
        Ok(())
    }

    fn add(&self, magnet: &str) -> Result<()> {
        self.added.borrow_mut().push(magnet.to_string());
        Ok(())
    }
}
