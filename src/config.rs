use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::models::SeriesRef;
use crate::domain::title;
use crate::error::{Error, Result};

const APP_DIR: &str = "tv-catalog";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TransmissionSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Validated, immutable configuration for one run.
///
/// The duplicate policies are only reachable through [`Settings::with_value`]
/// and deserialization, both of which validate.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub library_path: PathBuf,
    pub download_path: PathBuf,
    pub allowed_types: Vec<String>,
    pub subtitles: Vec<String>,
    delete_duplicate_downloads: bool,
    overwrite_duplicates: bool,
    pub dry_run: bool,
    pub verbose: bool,
    pub high_def: bool,
    pub download_delay_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tvdb_api_key: Option<String>,
    pub series: Vec<SeriesRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmission: Option<TransmissionSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            library_path: PathBuf::from("~/Movies/TV"),
            download_path: PathBuf::from("~/Downloads"),
            allowed_types: vec![".avi".into(), ".mkv".into(), ".mp4".into()],
            subtitles: vec![".srt".into()],
            delete_duplicate_downloads: false,
            overwrite_duplicates: false,
            dry_run: false,
            verbose: false,
            high_def: true,
            download_delay_secs: 0,
            tvdb_api_key: None,
            series: Vec::new(),
            transmission: None,
        }
    }
}

impl Settings {
    /// Parse, expand `~`, collapse duplicate series and reject
    /// contradictory duplicate policies.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("invalid settings file: {e}")))?;
        settings.validated()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "cannot read settings at {}: {e}. Run `tv-catalog init` to create one",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validated(mut self) -> Result<Self> {
        if self.overwrite_duplicates && self.delete_duplicate_downloads {
            return Err(Error::Configuration(
                "'overwrite_duplicates' and 'delete_duplicate_downloads' cannot both be true"
                    .to_string(),
            ));
        }
        self.library_path = expand_home(&self.library_path);
        self.download_path = expand_home(&self.download_path);

        let mut unique: Vec<SeriesRef> = Vec::with_capacity(self.series.len());
        for series in self.series.drain(..) {
            if !unique.iter().any(|s| s.id == series.id) {
                unique.push(series);
            }
        }
        self.series = unique;
        self.sort_series();
        Ok(self)
    }

    /// Write a default settings file. Refuses to clobber an existing one.
    pub fn create_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(Error::Configuration(format!(
                "a settings file already exists. please delete {} first",
                path.display()
            )));
        }
        let settings = Settings::default();
        settings.save(path)?;
        settings.validated()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::fs(parent, e))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("cannot serialize settings: {e}")))?;
        fs::write(path, content).map_err(|e| Error::fs(path, e))
    }

    /// Remove a download whose episode is already in the library.
    pub fn delete_duplicate_downloads(&self) -> bool {
        self.delete_duplicate_downloads
    }

    /// Replace the library copy with a newer download.
    pub fn overwrite_duplicates(&self) -> bool {
        self.overwrite_duplicates
    }

    pub fn get_series(&self, series_id: &str) -> Option<&SeriesRef> {
        self.series.iter().find(|s| s.id == series_id)
    }

    /// Series to operate on: one by id, or all of them.
    pub fn select_series(&self, series_id: Option<&str>) -> Result<Vec<SeriesRef>> {
        match series_id {
            Some(id) => self
                .get_series(id)
                .cloned()
                .map(|s| vec![s])
                .ok_or_else(|| Error::Configuration(format!("no subscribed series with id {id}"))),
            None => Ok(self.series.clone()),
        }
    }

    /// Insert or replace a subscription.
    pub fn add_series(&mut self, series: SeriesRef) {
        self.remove_series(&series.id);
        self.series.push(series);
        self.sort_series();
    }

    pub fn remove_series(&mut self, series_id: &str) -> bool {
        let before = self.series.len();
        self.series.retain(|s| s.id != series_id);
        self.series.len() != before
    }

    fn sort_series(&mut self) {
        self.series
            .sort_by(|a, b| title::sort_key(&a.name).cmp(title::sort_key(&b.name)));
    }

    pub fn is_media(&self, path: &Path) -> bool {
        has_extension(path, &self.allowed_types)
    }

    pub fn is_subtitle(&self, path: &Path) -> bool {
        has_extension(path, &self.subtitles)
    }

    pub fn is_catalogable(&self, path: &Path) -> bool {
        self.is_media(path) || self.is_subtitle(path)
    }

    pub fn download_delay(&self) -> Duration {
        Duration::from_secs(self.download_delay_secs)
    }

    /// Apply a `set <key> <value>` command. Returns the re-validated settings.
    pub fn with_value(mut self, key: &str, value: &str) -> Result<Self> {
        let flag = || {
            value
                .parse::<bool>()
                .map_err(|_| Error::Configuration(format!("{key} expects true or false")))
        };
        match key {
            "library_path" => self.library_path = PathBuf::from(value),
            "download_path" => self.download_path = PathBuf::from(value),
            "delete_duplicate_downloads" => self.delete_duplicate_downloads = flag()?,
            "overwrite_duplicates" => self.overwrite_duplicates = flag()?,
            "dry_run" => self.dry_run = flag()?,
            "verbose" => self.verbose = flag()?,
            "high_def" => self.high_def = flag()?,
            "download_delay_secs" => {
                self.download_delay_secs = value.parse().map_err(|_| {
                    Error::Configuration(format!("{key} expects a number of seconds"))
                })?
            }
            "tvdb_api_key" => self.tvdb_api_key = Some(value.to_string()),
            _ => return Err(Error::Configuration(format!("unknown setting '{key}'"))),
        }
        self.validated()
    }

    /// `TVDB_API_KEY` wins over the settings file.
    pub fn tvdb_api_key(&self) -> Result<String> {
        if let Ok(key) = env::var("TVDB_API_KEY") {
            return Ok(key);
        }
        self.tvdb_api_key.clone().ok_or_else(|| {
            Error::Configuration(
                "TVDB API key not found. Set TVDB_API_KEY or `tv-catalog set tvdb_api_key <key>`"
                    .to_string(),
            )
        })
    }
}

fn has_extension(path: &Path, allowed: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
        return false;
    };
    let ext = format!(".{ext}");
    allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext))
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(rest),
        Err(_) => path.to_path_buf(),
    }
}

pub fn get_settings_path() -> PathBuf {
    get_config_dir_path().join("settings.toml")
}

pub fn get_cache_path(settings_path: &Path) -> PathBuf {
    settings_path
        .parent()
        .map(|dir| dir.join("cache.json"))
        .unwrap_or_else(|| PathBuf::from("cache.json"))
}

fn get_config_dir_path() -> PathBuf {
    xdir::config()
        .map(|path| path.join(APP_DIR))
        // If the standard path could not be found (e.g.`$HOME` is not set),
        // default to the current directory.
        .unwrap_or_default()
}
