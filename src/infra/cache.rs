use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::domain::models::SeriesDetail;
use crate::error::{Error, Result};
use crate::infra::MetadataProvider;

/// Episode metadata per series, kept between runs so status checks do not
/// hit the metadata provider every time.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct MetadataCache {
    pub series: HashMap<String, SeriesDetail>, // series_id -> detail
    #[serde(skip)]
    path: PathBuf,
}

impl MetadataCache {
    /// A missing or unreadable cache is treated as empty.
    pub fn load(path: &Path) -> Self {
        let mut cache = match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), "Ignoring unreadable metadata cache: {e}");
                MetadataCache::default()
            }),
            Err(_) => MetadataCache::default(),
        };
        cache.path = path.to_path_buf();
        cache
    }

    pub fn save(&self) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::fs(parent, e))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("cannot serialize cache: {e}")))?;
        fs::write(&self.path, content).map_err(|e| Error::fs(&self.path, e))
    }

    pub fn get_series(&self, series_id: &str) -> Option<&SeriesDetail> {
        self.series.get(series_id)
    }

    pub fn set_series(&mut self, detail: SeriesDetail) {
        self.series.insert(detail.id.clone(), detail);
    }

    pub fn remove_series(&mut self, series_id: &str) {
        self.series.remove(series_id);
    }

    /// Cached detail, fetching and storing it on a miss.
    pub fn series_or_fetch(
        &mut self,
        provider: &dyn MetadataProvider,
        series_id: &str,
    ) -> Result<&SeriesDetail> {
        if !self.series.contains_key(series_id) {
            info!(series_id, "Fetching episode metadata");
            let detail = provider.get_series_by_id(series_id)?;
            self.series.insert(series_id.to_string(), detail);
        }
        self.series
            .get(series_id)
            .ok_or_else(|| Error::Collaborator(format!("no metadata for series {series_id}")))
    }

    /// Re-fetch a continuing series once its newest known episode has aired.
    /// Returns whether anything was fetched.
    pub fn refresh_series(
        &mut self,
        provider: &dyn MetadataProvider,
        series_id: &str,
        today: NaiveDate,
    ) -> Result<bool> {
        let stale = match self.series.get(series_id) {
            None => true,
            Some(detail) if !detail.continuing => false,
            Some(detail) => detail.latest_air_date().map_or(true, |latest| latest < today),
        };
        if !stale {
            return Ok(false);
        }
        let detail = provider.get_series_by_id(series_id)?;
        self.set_series(detail);
        Ok(true)
    }
}
