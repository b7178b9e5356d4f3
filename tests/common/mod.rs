#![allow(dead_code)]

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::Value;

use org_structure_api::AppState;

pub const STRUCTURE: &str = "/API/v1.0.0/organizational-structure";

/// In-process server, by default over a fresh in-memory structure. Lives as
/// long as the test's runtime.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(AppState::memory("Company")).await
    }

    pub async fn start_with(state: AppState) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test port")?;
        tokio::spawn(org_structure_api::serve(listener, state));

        let server = Self {
            port,
            base_url,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/organizational-structure[/id]?query`
    pub fn structure_url(&self, id: Option<i64>, query: &str) -> String {
        let path = match id {
            Some(id) => format!("{}/{}", STRUCTURE, id),
            None => STRUCTURE.to_string(),
        };
        if query.is_empty() {
            self.url(&path)
        } else {
            format!("{}?{}", self.url(&path), query)
        }
    }

    pub async fn get(&self, id: Option<i64>, query: &str) -> Result<(StatusCode, Value)> {
        let res = self.client.get(self.structure_url(id, query)).send().await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn post(&self, query: &str) -> Result<(StatusCode, Value)> {
        let res = self.client.post(self.structure_url(None, query)).send().await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn put(&self, id: i64, query: &str) -> Result<(StatusCode, Value)> {
        let res = self.client.put(self.structure_url(Some(id), query)).send().await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn delete(&self, id: i64, query: &str) -> Result<(StatusCode, Value)> {
        let res = self.client.delete(self.structure_url(Some(id), query)).send().await?;
        Ok((res.status(), res.json().await?))
    }

    /// Creates an element and returns its id
    pub async fn create(&self, query: &str) -> Result<i64> {
        let (status, body) = self.post(query).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "create failed ({}): {}", status, body);
        body["node"]["id"].as_i64().context("created node has no id")
    }

    /// The drill-down tree's top element
    pub async fn tree(&self) -> Result<Value> {
        let (status, body) = self.get(None, "").await?;
        anyhow::ensure!(status == StatusCode::OK, "tree read failed ({}): {}", status, body);
        Ok(body["nodes"][0].clone())
    }
}

/// Ids of an element's children, in document order
pub fn child_ids(element: &Value) -> Vec<i64> {
    element["children"]
        .as_array()
        .map(|children| children.iter().filter_map(|c| c["id"].as_i64()).collect())
        .unwrap_or_default()
}
