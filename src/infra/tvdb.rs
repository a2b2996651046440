use anyhow::{bail, Context};
use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::debug;

use crate::domain::models::{EpisodeMeta, SeriesDetail, SeriesSummary};
use crate::error::{Error, Result};
use crate::infra::MetadataProvider;

const TVDB_API_BASE: &str = "https://api4.thetvdb.com/v4";

pub struct TvdbClient {
    api_key: String,
    http: Client,
    token: RefCell<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    data: LoginData,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    tvdb_id: String,
    name: Option<String>,
    first_air_time: Option<String>,
    translations: Option<HashMap<String, String>>,
}

impl SearchResult {
    fn display_name(&self) -> String {
        self.translations
            .as_ref()
            .and_then(|t| t.get("eng"))
            .or(self.name.as_ref())
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    data: SeriesData,
}

#[derive(Debug, Deserialize)]
struct SeriesData {
    name: String,
    status: Option<SeriesStatus>,
}

#[derive(Debug, Deserialize)]
struct SeriesStatus {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EpisodesResponse {
    data: EpisodesData,
}

#[derive(Debug, Deserialize)]
struct EpisodesData {
    episodes: Vec<Episode>,
}

#[derive(Debug, Deserialize)]
struct Episode {
    #[serde(rename = "seasonNumber")]
    season_number: u32,
    number: u32,
    name: Option<String>,
    aired: Option<String>,
}

fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    value.and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

impl TvdbClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: Client::new(),
            token: RefCell::new(None),
        }
    }

    fn login(&self) -> anyhow::Result<String> {
        let body = serde_json::json!({
            "apikey": self.api_key
        });
        let response = self
            .http
            .post(format!("{TVDB_API_BASE}/login"))
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()?;

        if !response.status().is_success() {
            bail!("TVDB login failed: HTTP {}", response.status());
        }

        let login_resp: LoginResponse = serde_json::from_str(&response.text()?)?;
        Ok(login_resp.data.token)
    }

    fn bearer(&self) -> anyhow::Result<String> {
        if let Some(token) = self.token.borrow().as_ref() {
            return Ok(format!("Bearer {token}"));
        }
        let token = self.login()?;
        *self.token.borrow_mut() = Some(token.clone());
        Ok(format!("Bearer {token}"))
    }

    fn search(&self, query: &str) -> anyhow::Result<Vec<SeriesSummary>> {
        let response = self
            .http
            .get(format!("{TVDB_API_BASE}/search"))
            .header("Authorization", self.bearer()?)
            .query(&[("query", query), ("type", "series")])
            .send()?;

        if !response.status().is_success() {
            bail!("TVDB search failed: HTTP {}", response.status());
        }

        let search_resp: SearchResponse =
            serde_json::from_str(&response.text()?).context("malformed TVDB search response")?;
        Ok(search_resp
            .data
            .into_iter()
            .map(|r| SeriesSummary {
                name: r.display_name(),
                first_aired: parse_date(r.first_air_time.as_deref()),
                id: r.tvdb_id,
            })
            .collect())
    }

    fn series(&self, series_id: &str) -> anyhow::Result<SeriesDetail> {
        let response = self
            .http
            .get(format!("{TVDB_API_BASE}/series/{series_id}"))
            .header("Authorization", self.bearer()?)
            .send()?;

        if !response.status().is_success() {
            bail!("TVDB series lookup failed: HTTP {}", response.status());
        }

        let series_resp: SeriesResponse =
            serde_json::from_str(&response.text()?).context("malformed TVDB series response")?;
        let continuing = series_resp
            .data
            .status
            .and_then(|s| s.name)
            .is_some_and(|name| name.eq_ignore_ascii_case("continuing"));

        Ok(SeriesDetail {
            id: series_id.to_string(),
            name: series_resp.data.name,
            continuing,
            episodes: self.episodes(series_id)?,
        })
    }

    fn episodes(&self, series_id: &str) -> anyhow::Result<Vec<EpisodeMeta>> {
        let mut page = 0;
        let mut all_episodes = Vec::new();

        loop {
            let url = format!("{TVDB_API_BASE}/series/{series_id}/episodes/default");
            let response = self
                .http
                .get(&url)
                .header("Authorization", self.bearer()?)
                .query(&[("page", page.to_string())])
                .send()?;

            let status = response.status();
            let response_text = response.text()?;

            if !status.is_success() {
                if status == 404 {
                    break;
                }
                bail!("TVDB episodes lookup failed: HTTP {}", status);
            }

            let episodes_resp: EpisodesResponse = serde_json::from_str(&response_text)
                .context("malformed TVDB episodes response")?;
            let episodes = episodes_resp.data.episodes;

            if episodes.is_empty() {
                break;
            }

            debug!(series_id, page, count = episodes.len(), "Fetched episode page");
            all_episodes.extend(episodes.into_iter().map(|ep| EpisodeMeta {
                season: ep.season_number,
                number: ep.number,
                name: ep.name,
                air_date: parse_date(ep.aired.as_deref()),
            }));
            page += 1;
        }

        Ok(all_episodes)
    }
}

impl MetadataProvider for TvdbClient {
    fn search_series(&self, title: &str) -> Result<Vec<SeriesSummary>> {
        self.search(title).map_err(Error::collaborator)
    }

    fn get_series_by_id(&self, series_id: &str) -> Result<SeriesDetail> {
        self.series(series_id).map_err(Error::collaborator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date(Some("2008-01-20")),
            NaiveDate::from_ymd_opt(2008, 1, 20)
        );
        assert_eq!(parse_date(Some("")), None);
        assert_eq!(parse_date(None), None);
    }

    #[test]
    fn test_search_result_prefers_english_translation() {
        let raw = r#"{"data":[
            {"tvdb_id":"81189","name":"Breaking Bad","first_air_time":"2008-01-20",
             "translations":{"eng":"Breaking Bad (EN)","spa":"Breaking Bad (ES)"}},
            {"tvdb_id":"1","name":"Plain","first_air_time":null}
        ]}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data[0].display_name(), "Breaking Bad (EN)");
        assert_eq!(parsed.data[1].display_name(), "Plain");
    }

    #[test]
    fn test_episode_page_parses() {
        let raw = r#"{"data":{"series":{"id":1},"episodes":[
            {"seasonNumber":0,"number":1,"name":"Pilot Special","aired":null},
            {"seasonNumber":1,"number":2,"name":"Cat's in the Bag","aired":"2008-01-27"}
        ]}}"#;
        let parsed: EpisodesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.episodes.len(), 2);
        assert_eq!(parsed.data.episodes[1].season_number, 1);
        assert_eq!(parsed.data.episodes[0].aired, None);
    }
}
