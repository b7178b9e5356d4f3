mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn health_reports_backend() -> Result<()> {
    let server = common::TestServer::start().await?;

    let res = server.client.get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "memory");
    assert!(body["timestamp"].is_string());
    Ok(())
}

#[tokio::test]
async fn root_describes_endpoints() -> Result<()> {
    let server = common::TestServer::start().await?;

    let body = server.client.get(server.url("/")).send().await?.json::<serde_json::Value>().await?;
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["endpoints"]["tree"]
        .as_str()
        .unwrap_or_default()
        .ends_with("/API/v1.0.0/organizational-structure"));
    Ok(())
}
