use anyhow::{bail, Context};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::cell::RefCell;
use tracing::debug;

use crate::config::TransmissionSettings;
use crate::domain::models::TorrentInfo;
use crate::error::{Error, Result};
use crate::infra::TorrentClient;

const SESSION_HEADER: &str = "X-Transmission-Session-Id";

/// Transmission RPC over HTTP.
pub struct TransmissionClient {
    url: String,
    username: Option<String>,
    password: Option<String>,
    http: Client,
    session_id: RefCell<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct TorrentList {
    torrents: Vec<TorrentInfo>,
}

impl TransmissionClient {
    pub fn new(settings: &TransmissionSettings) -> Self {
        Self {
            url: format!("http://{}:{}/transmission/rpc", settings.host, settings.port),
            username: settings.username.clone(),
            password: settings.password.clone(),
            http: Client::new(),
            session_id: RefCell::new(None),
        }
    }

    fn post(&self, body: &Value) -> anyhow::Result<Response> {
        let mut request = self.http.post(&self.url).json(body);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }
        if let Some(session_id) = self.session_id.borrow().as_ref() {
            request = request.header(SESSION_HEADER, session_id);
        }
        Ok(request.send()?)
    }

    /// One RPC call. A 409 hands out a fresh session id, after which the call
    /// is repeated once.
    fn call(&self, method: &str, arguments: Value) -> anyhow::Result<Value> {
        let body = json!({ "method": method, "arguments": arguments });
        let mut response = self.post(&body)?;

        if response.status() == StatusCode::CONFLICT {
            let session_id = response
                .headers()
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .context("Transmission did not provide a session id")?
                .to_string();
            debug!("Refreshed Transmission session id");
            *self.session_id.borrow_mut() = Some(session_id);
            response = self.post(&body)?;
        }

        if !response.status().is_success() {
            bail!("Transmission {method} failed: HTTP {}", response.status());
        }

        let rpc: RpcResponse = serde_json::from_str(&response.text()?)
            .with_context(|| format!("malformed Transmission {method} response"))?;
        if rpc.result != "success" {
            bail!("Transmission {method} failed: {}", rpc.result);
        }
        Ok(rpc.arguments)
    }
}

impl TorrentClient for TransmissionClient {
    fn list_all(&self) -> Result<Vec<TorrentInfo>> {
        let arguments = self
            .call("torrent-get", json!({ "fields": ["id", "name", "percentDone"] }))
            .map_err(Error::collaborator)?;
        let list: TorrentList = serde_json::from_value(arguments).map_err(Error::collaborator)?;
        Ok(list.torrents)
    }

    fn remove(&self, id: i64) -> Result<()> {
        self.call("torrent-remove", json!({ "ids": [id] }))
            .map(|_| ())
            .map_err(Error::collaborator)
    }

    fn add(&self, magnet: &str) -> Result<()> {
        self.call("torrent-add", json!({ "filename": magnet }))
            .map(|_| ())
            .map_err(Error::collaborator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_url() {
        let client = TransmissionClient::new(&TransmissionSettings {
            host: "localhost".into(),
            port: 9091,
            username: None,
            password: None,
        });
        assert_eq!(client.url, "http://localhost:9091/transmission/rpc");
    }

    #[test]
    fn test_torrent_get_arguments_parse() {
        let raw = r#"{"result":"success","arguments":{"torrents":[
            {"id":3,"name":"Show.Name.S01E02.720p","percentDone":0.42}
        ]}}"#;
        let rpc: RpcResponse = serde_json::from_str(raw).unwrap();
        let list: TorrentList = serde_json::from_value(rpc.arguments).unwrap();
        assert_eq!(
            list.torrents,
            vec![TorrentInfo {
                id: 3,
                name: "Show.Name.S01E02.720p".into(),
                percent_done: 0.42,
            }]
        );
    }
}
