use anyhow::{bail, Context};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::debug;

use crate::domain::matcher;
use crate::domain::models::SeriesRef;
use crate::domain::title::normalize;
use crate::error::{Error, Result};
use crate::infra::MagnetSearch;

const APIBAY_BASE: &str = "https://apibay.org";
// Video > TV shows, Video > HD - TV shows
const TV_CATEGORIES: &str = "205,208";
const EMPTY_HASH: &str = "0000000000000000000000000000000000000000";

/// Magnet search against the apibay JSON index.
pub struct ApiBaySearch {
    http: Client,
    high_def: bool,
    found: RefCell<HashMap<(String, u32, u32), Option<String>>>,
}

#[derive(Debug, Deserialize, Clone)]
struct Listing {
    name: String,
    info_hash: String,
    #[serde(default)]
    seeders: String,
}

impl Listing {
    fn seeders(&self) -> u64 {
        self.seeders.parse().unwrap_or(0)
    }

    fn is_high_def(&self) -> bool {
        let name = self.name.to_lowercase();
        name.contains("720p") || name.contains("1080p")
    }

    fn magnet(&self) -> String {
        format!(
            "magnet:?xt=urn:btih:{}&dn={}",
            self.info_hash,
            urlencoding::encode(&self.name)
        )
    }
}

/// Best listing for the episode: it must identify as the same episode, then
/// high definition is preferred if asked for, then seeders.
fn pick_magnet(
    listings: &[Listing],
    series_name: &str,
    season: u32,
    episode: u32,
    high_def: bool,
) -> Option<String> {
    let series = SeriesRef {
        id: String::new(),
        name: series_name.to_string(),
    };
    listings
        .iter()
        .filter(|l| l.info_hash != EMPTY_HASH && l.seeders() > 0)
        .filter(|l| {
            matcher::match_series(&l.name, &series)
                .is_some_and(|id| id.season == season && id.episode == episode)
        })
        .max_by_key(|l| (high_def && l.is_high_def(), l.seeders()))
        .map(Listing::magnet)
}

impl ApiBaySearch {
    pub fn new(high_def: bool) -> Self {
        Self {
            http: Client::new(),
            high_def,
            found: RefCell::new(HashMap::new()),
        }
    }

    fn query(&self, series_name: &str, season: u32, episode: u32) -> anyhow::Result<Vec<Listing>> {
        let query = format!("{} S{:02}E{:02}", normalize(series_name), season, episode);
        let response = self
            .http
            .get(format!("{APIBAY_BASE}/q.php"))
            .query(&[("q", query.as_str()), ("cat", TV_CATEGORIES)])
            .send()?;

        if !response.status().is_success() {
            bail!("magnet search failed: HTTP {}", response.status());
        }

        let listings: Vec<Listing> =
            serde_json::from_str(&response.text()?).context("malformed magnet search response")?;
        debug!(query, count = listings.len(), "Magnet search");
        Ok(listings)
    }
}

impl MagnetSearch for ApiBaySearch {
    fn find_episode(&self, series_name: &str, season: u32, episode: u32) -> Result<Option<String>> {
        let key = (series_name.to_string(), season, episode);
        if let Some(found) = self.found.borrow().get(&key) {
            return Ok(found.clone());
        }
        let listings = self
            .query(series_name, season, episode)
            .map_err(Error::collaborator)?;
        let magnet = pick_magnet(&listings, series_name, season, episode, self.high_def);
        self.found.borrow_mut().insert(key, magnet.clone());
        Ok(magnet)
    }
}
