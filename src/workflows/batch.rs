//! The operations the CLI exposes, composed from the cataloger, the
//! download index and the status resolver.

use std::path::{Path, PathBuf};
use std::thread;

use tracing::{error, info};

use crate::config::Settings;
use crate::domain::matcher;
use crate::domain::models::{EpisodeMeta, EpisodeRecord, EpisodeStatus, SeriesRef};
use crate::error::{Error, Result};

use super::downloads::Downloads;
use super::library::{CatalogAction, LibraryCataloger};
use super::status::{Resolution, StatusResolver};

/// Outcome of a batch: what worked and what was skipped over.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub cataloged: Vec<(PathBuf, CatalogAction)>,
    pub downloads_started: usize,
    pub failures: Vec<(String, Error)>,
}

impl BatchReport {
    fn fail(&mut self, item: String, err: Error) {
        error!(item = %item, "{err}");
        self.failures.push((item, err));
    }

    pub fn print(&self) {
        for (path, action) in &self.cataloged {
            println!("{}: {action}", path.display());
        }
        if self.downloads_started > 0 {
            println!("Started {} download(s)", self.downloads_started);
        }
        if !self.failures.is_empty() {
            println!("{} failure(s):", self.failures.len());
            for (item, err) in &self.failures {
                println!("  {item}: {err}");
            }
        }
    }
}

/// Catalog one explicit file. The first problem is returned as is.
pub fn catalog_file(
    settings: &Settings,
    library: &LibraryCataloger,
    path: &Path,
) -> Result<CatalogAction> {
    if !settings.is_catalogable(path) {
        return Err(Error::InvalidEpisode(format!(
            "{} is not an allowed file type",
            path.display()
        )));
    }
    let text = path.strip_prefix(&settings.download_path).unwrap_or(path);
    let identity = matcher::match_against_known_series(&text.to_string_lossy(), &settings.series)
        .ok_or_else(|| {
            Error::InvalidEpisode(format!(
                "{} does not match any subscribed series episode",
                path.display()
            ))
        })?;
    library.catalog(&EpisodeRecord::from_file(identity, path))
}

/// Catalog everything under the download root, or only one series' files.
/// Per-file problems are collected; anything else stops the batch.
pub fn catalog_downloads(
    downloads: &Downloads,
    library: &LibraryCataloger,
    series: Option<&SeriesRef>,
) -> Result<BatchReport> {
    let episode_files = match series {
        Some(series) => {
            let removed = downloads.remove_completed_torrents()?;
            if removed > 0 {
                info!(removed, "Removed completed torrents");
            }
            downloads.episode_files_in_series(series)?
        }
        None => downloads.episode_files()?,
    };

    let mut report = BatchReport::default();
    for episode_file in episode_files {
        let path = PathBuf::from(&episode_file.path);
        match library.catalog(&episode_file) {
            Ok(action) => report.cataloged.push((path, action)),
            Err(e) if e.is_per_item() => report.fail(episode_file.path.clone(), e),
            Err(e) => return Err(e),
        }
    }
    Ok(report)
}

/// Statuses for every episode of each series in turn. Per-episode failures
/// are gathered across all series.
pub fn resolve_all<'s>(
    resolver: &StatusResolver,
    series: impl IntoIterator<Item = (&'s SeriesRef, &'s [EpisodeMeta])>,
) -> Result<Resolution> {
    let mut resolution = Resolution::default();
    for (series, episodes) in series {
        resolution.extend(resolver.resolve_series(series, episodes)?);
    }
    Ok(resolution)
}

/// Hand every `Available` episode to the torrent client, pausing between
/// hand-offs.
pub fn download_missing(
    settings: &Settings,
    downloads: &Downloads,
    records: &[EpisodeRecord],
) -> BatchReport {
    let mut report = BatchReport::default();
    let available = records
        .iter()
        .filter(|r| r.status == EpisodeStatus::Available);
    for (i, record) in available.enumerate() {
        if i > 0 && !settings.download_delay().is_zero() {
            thread::sleep(settings.download_delay());
        }
        match downloads.download(record) {
            Ok(true) => report.downloads_started += 1,
            Ok(false) => {}
            Err(e) => report.fail(record.identity.to_string(), e),
        }
    }
    report
}

pub fn print_statuses(records: &[EpisodeRecord]) {
    for record in records {
        let title = record.title.as_deref().unwrap_or("");
        let percent = (record.percent_done * 100.0).round();
        println!(
            "{:<40} {:<12} {:>4}%  {}  {}",
            format!("{} - {title}", record.identity),
            record.status.to_string(),
            percent,
            record.air_date.map(|d| d.to_string()).unwrap_or_default(),
            record.path
        );
    }
}
