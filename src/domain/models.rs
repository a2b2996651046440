use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

/// A subscribed series as stored in the settings file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SeriesRef {
    pub id: String,
    pub name: String,
}

/// The (series, season, episode) key used to correlate library files,
/// downloads, torrents and metadata for one logical episode.
///
/// Equality and ordering ignore `series_id` and compare series name, then
/// season, then episode.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EpisodeIdentity {
    pub series_id: String,
    pub series_name: String,
    pub season: u32,
    pub episode: u32,
}

impl EpisodeIdentity {
    pub fn new(series: &SeriesRef, season: u32, episode: u32) -> Self {
        Self {
            series_id: series.id.clone(),
            series_name: series.name.clone(),
            season,
            episode,
        }
    }

    /// `S01E02`
    pub fn code(&self) -> String {
        format!("S{:02}E{:02}", self.season, self.episode)
    }
}

impl PartialEq for EpisodeIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EpisodeIdentity {}

impl PartialOrd for EpisodeIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EpisodeIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.series_name
            .cmp(&other.series_name)
            .then(self.season.cmp(&other.season))
            .then(self.episode.cmp(&other.episode))
    }
}

impl fmt::Display for EpisodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.series_name, self.code())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeStatus {
    Upcoming,
    Cataloged,
    Downloaded,
    Downloading,
    Available,
    Missing,
}

impl fmt::Display for EpisodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EpisodeStatus::Upcoming => "upcoming",
            EpisodeStatus::Cataloged => "cataloged",
            EpisodeStatus::Downloaded => "downloaded",
            EpisodeStatus::Downloading => "downloading",
            EpisodeStatus::Available => "available",
            EpisodeStatus::Missing => "missing",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EpisodeRecord {
    #[serde(flatten)]
    pub identity: EpisodeIdentity,
    pub title: Option<String>,
    pub air_date: Option<NaiveDate>,
    /// Local file, magnet URI when `Available`, empty otherwise.
    pub path: String,
    pub status: EpisodeStatus,
    pub percent_done: f64,
}

impl EpisodeRecord {
    /// A record for a file found on disk. Status starts as `Downloaded`.
    pub fn from_file(identity: EpisodeIdentity, path: &Path) -> Self {
        Self {
            identity,
            title: None,
            air_date: None,
            path: path.to_string_lossy().into_owned(),
            status: EpisodeStatus::Downloaded,
            percent_done: 1.0,
        }
    }

    /// Suffix of `path` including the dot, e.g. `.mkv`. `None` while there is
    /// no local file.
    pub fn file_extension(&self) -> Option<String> {
        if self.path.is_empty() || self.path.starts_with("magnet:") {
            return None;
        }
        Path::new(&self.path)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!(".{ext}"))
    }

    pub(crate) fn resolve(&mut self, status: EpisodeStatus, path: String, percent_done: f64) {
        self.status = status;
        self.path = path;
        self.percent_done = percent_done;
    }
}

/// One search hit from the metadata provider.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SeriesSummary {
    pub id: String,
    pub name: String,
    pub first_aired: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EpisodeMeta {
    pub season: u32,
    pub number: u32,
    pub name: Option<String>,
    pub air_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SeriesDetail {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub continuing: bool,
    pub episodes: Vec<EpisodeMeta>,
}

impl SeriesDetail {
    pub fn series_ref(&self) -> SeriesRef {
        SeriesRef {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }

    pub fn latest_air_date(&self) -> Option<NaiveDate> {
        self.episodes.iter().filter_map(|ep| ep.air_date).max()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TorrentInfo {
    pub id: i64,
    pub name: String,
    #[serde(rename = "percentDone")]
    pub percent_done: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(series_id: &str, name: &str, season: u32, episode: u32) -> EpisodeIdentity {
        EpisodeIdentity {
            series_id: series_id.to_string(),
            series_name: name.to_string(),
            season,
            episode,
        }
    }

    #[test]
    fn test_identity_equality_ignores_series_id() {
        assert_eq!(identity("1", "Show", 1, 2), identity("99", "Show", 1, 2));
        assert_ne!(identity("1", "Show", 1, 2), identity("1", "Show", 1, 3));
    }

    #[test]
    fn test_identity_ordering() {
        let mut ids = vec![
            identity("1", "B Show", 1, 1),
            identity("1", "A Show", 2, 1),
            identity("1", "A Show", 1, 10),
            identity("1", "A Show", 1, 2),
        ];
        ids.sort();
        let codes: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        assert_eq!(
            codes,
            vec!["A Show S01E02", "A Show S01E10", "A Show S02E01", "B Show S01E01"]
        );
    }

    #[test]
    fn test_file_extension() {
        let id = identity("1", "Show", 1, 1);
        let record = EpisodeRecord::from_file(id.clone(), Path::new("/dl/Show.S01E01.mkv"));
        assert_eq!(record.file_extension().as_deref(), Some(".mkv"));

        let mut magnet = record.clone();
        magnet.path = "magnet:?xt=urn:btih:abc&dn=Show.S01E01.mkv".to_string();
        assert_eq!(magnet.file_extension(), None);

        let mut empty = record;
        empty.path = String::new();
        assert_eq!(empty.file_extension(), None);

        let bare = EpisodeRecord::from_file(id, Path::new("/dl/Show S01E01"));
        assert_eq!(bare.file_extension(), None);
    }
}
