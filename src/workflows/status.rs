//! Lifecycle status of every catalogued episode of a series.
//!
//! Each episode is checked against the evidence in a fixed order and the
//! first hit decides: air date, library, downloads folder, torrent client,
//! magnet search. Nothing is remembered between passes.

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::domain::models::{EpisodeIdentity, EpisodeMeta, EpisodeRecord, EpisodeStatus, SeriesRef};
use crate::error::{Error, Result};
use crate::infra::MagnetSearch;

use super::downloads::Downloads;
use super::library::LibraryCataloger;

/// Records for the episodes that resolved, and the per-episode failures
/// that were skipped over.
#[derive(Debug, Default)]
pub struct Resolution {
    pub records: Vec<EpisodeRecord>,
    pub failures: Vec<(String, Error)>,
}

impl Resolution {
    pub fn extend(&mut self, other: Resolution) {
        self.records.extend(other.records);
        self.failures.extend(other.failures);
    }
}

pub struct StatusResolver<'a> {
    library: &'a LibraryCataloger<'a>,
    downloads: &'a Downloads<'a>,
    magnets: &'a dyn MagnetSearch,
    today: NaiveDate,
    tolerant: bool,
}

impl<'a> StatusResolver<'a> {
    pub fn new(
        library: &'a LibraryCataloger<'a>,
        downloads: &'a Downloads<'a>,
        magnets: &'a dyn MagnetSearch,
        today: NaiveDate,
    ) -> Self {
        Self {
            library,
            downloads,
            magnets,
            today,
            tolerant: false,
        }
    }

    /// When set, a failed torrent or magnet lookup demotes the episode to
    /// `Missing` instead of failing the whole pass.
    pub fn tolerant(mut self, tolerant: bool) -> Self {
        self.tolerant = tolerant;
        self
    }

    /// One record per episode in `episodes`, specials (season 0) excluded.
    /// Filesystem and invalid-episode errors are collected per episode;
    /// anything else stops the pass.
    pub fn resolve_series(&self, series: &SeriesRef, episodes: &[EpisodeMeta]) -> Result<Resolution> {
        let mut resolution = Resolution::default();
        for meta in episodes.iter().filter(|meta| meta.season > 0) {
            match self.resolve_episode(series, meta) {
                Ok(record) => resolution.records.push(record),
                Err(e) if e.is_per_item() => {
                    let episode = EpisodeIdentity::new(series, meta.season, meta.number);
                    warn!(episode = %episode, "Could not resolve status: {e}");
                    resolution.failures.push((episode.to_string(), e));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(resolution)
    }

    pub fn resolve_episode(&self, series: &SeriesRef, meta: &EpisodeMeta) -> Result<EpisodeRecord> {
        let mut record = EpisodeRecord {
            identity: EpisodeIdentity::new(series, meta.season, meta.number),
            title: meta.name.clone(),
            air_date: meta.air_date,
            path: String::new(),
            status: EpisodeStatus::Missing,
            percent_done: 0.0,
        };
        let identity = record.identity.clone();

        let aired = matches!(record.air_date, Some(date) if date <= self.today);
        if !aired {
            record.resolve(EpisodeStatus::Upcoming, String::new(), 0.0);
        } else if self.library.exists(&identity)? {
            let path = self.library.existing_path(&identity)?;
            record.resolve(
                EpisodeStatus::Cataloged,
                path.as_deref().map(display).unwrap_or_default(),
                1.0,
            );
        } else if let Some(path) = self.downloads.path_for(&identity)? {
            record.resolve(EpisodeStatus::Downloaded, display(&path), 1.0);
        } else if let Some(torrent) = self.lookup(&identity, "torrent", || {
            self.downloads.torrent_for(&identity)
        })? {
            // The client's fraction is passed through, so a finished torrent
            // whose file is not visible yet reads as downloading at 1.
            let percent_done = torrent.percent_done.clamp(0.0, 1.0);
            record.resolve(EpisodeStatus::Downloading, String::new(), percent_done);
        } else if let Some(magnet) = self.lookup(&identity, "magnet", || {
            self.magnets
                .find_episode(&identity.series_name, identity.season, identity.episode)
        })? {
            record.resolve(EpisodeStatus::Available, magnet, 0.0);
        } else {
            record.resolve(EpisodeStatus::Missing, String::new(), 0.0);
        }

        debug!(
            episode = %record.identity,
            status = %record.status,
            percent_done = record.percent_done,
            "Resolved status"
        );
        Ok(record)
    }

    fn lookup<T>(
        &self,
        identity: &EpisodeIdentity,
        what: &str,
        query: impl FnOnce() -> Result<Option<T>>,
    ) -> Result<Option<T>> {
        match query() {
            Err(Error::Collaborator(message)) if self.tolerant => {
                warn!(episode = %identity, lookup = what, "Lookup failed, treating as missing: {message}");
                Ok(None)
            }
            other => other,
        }
    }
}

fn display(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}
