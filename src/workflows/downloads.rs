use std::cell::RefCell;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::Settings;
use crate::domain::matcher;
use crate::domain::models::{EpisodeIdentity, EpisodeRecord, EpisodeStatus, SeriesRef, TorrentInfo};
use crate::error::Result;
use crate::infra::fs::FileSystem;
use crate::infra::TorrentClient;

/// What is on disk under the download root and what the torrent client is
/// still working on. Both listings are taken once and reused for the pass.
pub struct Downloads<'a> {
    settings: &'a Settings,
    fs: &'a dyn FileSystem,
    torrent_client: Option<&'a dyn TorrentClient>,
    files: RefCell<Option<Vec<PathBuf>>>,
    torrents: RefCell<Option<Vec<TorrentInfo>>>,
}

impl<'a> Downloads<'a> {
    pub fn new(
        settings: &'a Settings,
        fs: &'a dyn FileSystem,
        torrent_client: Option<&'a dyn TorrentClient>,
    ) -> Self {
        Self {
            settings,
            fs,
            torrent_client,
            files: RefCell::new(None),
            torrents: RefCell::new(None),
        }
    }

    fn files(&self) -> Result<Vec<PathBuf>> {
        if let Some(files) = self.files.borrow().as_ref() {
            return Ok(files.clone());
        }
        let files = self.fs.walk_files(&self.settings.download_path)?;
        debug!(
            root = %self.settings.download_path.display(),
            count = files.len(),
            "Scanned downloads"
        );
        *self.files.borrow_mut() = Some(files.clone());
        Ok(files)
    }

    /// Media and subtitle files, the candidates for cataloging.
    pub fn catalogable_paths(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .files()?
            .into_iter()
            .filter(|p| self.settings.is_catalogable(p))
            .collect())
    }

    fn media_paths(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .files()?
            .into_iter()
            .filter(|p| self.settings.is_media(p))
            .collect())
    }

    /// Path text below the download root. The root's own name never takes
    /// part in matching.
    fn match_text(&self, path: &Path) -> String {
        path.strip_prefix(&self.settings.download_path)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    /// Every catalogable file that identifies as an episode of a subscribed series.
    pub fn episode_files(&self) -> Result<Vec<EpisodeRecord>> {
        Ok(self
            .catalogable_paths()?
            .into_iter()
            .filter_map(|path| {
                matcher::match_against_known_series(&self.match_text(&path), &self.settings.series)
                    .map(|identity| EpisodeRecord::from_file(identity, &path))
            })
            .collect())
    }

    pub fn episode_files_in_series(&self, series: &SeriesRef) -> Result<Vec<EpisodeRecord>> {
        Ok(self
            .catalogable_paths()?
            .into_iter()
            .filter_map(|path| {
                matcher::match_series(&self.match_text(&path), series)
                    .map(|identity| EpisodeRecord::from_file(identity, &path))
            })
            .collect())
    }

    /// A downloaded media file for `identity`, if one is waiting to be cataloged.
    pub fn path_for(&self, identity: &EpisodeIdentity) -> Result<Option<PathBuf>> {
        let series = series_of(identity);
        Ok(self.media_paths()?.into_iter().find(|path| {
            matcher::match_series(&self.match_text(path), &series).as_ref() == Some(identity)
        }))
    }

    pub fn torrents(&self) -> Result<Vec<TorrentInfo>> {
        if let Some(torrents) = self.torrents.borrow().as_ref() {
            return Ok(torrents.clone());
        }
        let torrents = match self.torrent_client {
            Some(client) => client.list_all()?,
            None => Vec::new(),
        };
        *self.torrents.borrow_mut() = Some(torrents.clone());
        Ok(torrents)
    }

    pub fn torrent_for(&self, identity: &EpisodeIdentity) -> Result<Option<TorrentInfo>> {
        let series = series_of(identity);
        Ok(self.torrents()?.into_iter().find(|torrent| {
            matcher::match_series(&torrent.name, &series).as_ref() == Some(identity)
        }))
    }

    /// Drop finished torrents from the client so their files can be moved.
    pub fn remove_completed_torrents(&self) -> Result<usize> {
        let Some(client) = self.torrent_client else {
            return Ok(0);
        };
        let (completed, remaining): (Vec<TorrentInfo>, Vec<TorrentInfo>) = self
            .torrents()?
            .into_iter()
            .partition(|t| t.percent_done >= 1.0);

        for torrent in &completed {
            if self.settings.dry_run {
                info!(torrent = %torrent.name, "[DRY RUN] Would remove completed torrent");
                continue;
            }
            client.remove(torrent.id)?;
            info!(torrent = %torrent.name, "Removed completed torrent");
        }
        if !self.settings.dry_run {
            *self.torrents.borrow_mut() = Some(remaining);
        }
        Ok(completed.len())
    }

    /// Start downloading an `Available` episode. Returns whether anything was
    /// handed off.
    pub fn download(&self, record: &EpisodeRecord) -> Result<bool> {
        if record.status != EpisodeStatus::Available {
            return Ok(false);
        }
        let magnet = record.path.as_str();
        if self.settings.verbose {
            println!("{magnet}");
        }
        if self.settings.dry_run {
            info!(episode = %record.identity, "[DRY RUN] Would start download");
            return Ok(false);
        }
        match self.torrent_client {
            Some(client) => {
                client.add(magnet)?;
                info!(episode = %record.identity, "Download started");
            }
            None => println!("{}: {magnet}", record.identity),
        }
        Ok(true)
    }
}

fn series_of(identity: &EpisodeIdentity) -> SeriesRef {
    SeriesRef {
        id: identity.series_id.clone(),
        name: identity.series_name.clone(),
    }
}
