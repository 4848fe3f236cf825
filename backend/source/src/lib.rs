//! HTTP document source.
//!
//! Fetches the markup behind `page(url:)` with `reqwest`. Unreachable hosts,
//! non-success statuses and oversized bodies all surface as a single
//! [`FetchError`]; nothing is retried or cached.

use async_trait::async_trait;
use pagegraph_core::{DocumentSource, FetchError};
use reqwest::Client;
use tracing::debug;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = concat!("pagegraph/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    pub user_agent: String,
    pub max_body_bytes: usize,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

pub struct HttpSource {
    client: Client,
    max_body_bytes: usize,
}

impl HttpSource {
    pub fn new(config: HttpSourceConfig) -> reqwest::Result<Self> {
        let client = Client::builder().user_agent(config.user_agent).build()?;
        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

/// Only absolute http(s) URLs are fetched.
fn validate_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::UnsupportedScheme(other.to_string())),
    }
}

fn transport(err: reqwest::Error) -> FetchError {
    FetchError::Transport(err.without_url().to_string())
}

#[async_trait]
impl DocumentSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let url = validate_url(url)?;
        debug!(host = url.host_str().unwrap_or_default(), "Fetching document");

        let mut resp = self.client.get(url).send().await.map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let limit = self.max_body_bytes;
        if resp.content_length().is_some_and(|len| len > limit as u64) {
            return Err(FetchError::BodyTooLarge { limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(transport)? {
            if body.len() + chunk.len() > limit {
                return Err(FetchError::BodyTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        debug!(bytes = body.len(), "Document fetched");
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::Html, routing::get, Router};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn serve_fixture() -> SocketAddr {
        let app = Router::new()
            .route(
                "/",
                get(|| async { Html("<html><head><title>Local</title></head></html>") }),
            )
            .route("/big", get(|| async { "x".repeat(4096) }))
            .route(
                "/broken",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "oops") }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn source(max_body_bytes: usize) -> HttpSource {
        HttpSource::new(HttpSourceConfig {
            max_body_bytes,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/a?b=c").is_ok());
        assert!(matches!(
            validate_url("not a url"),
            Err(FetchError::InvalidUrl(_))
        ));
        assert_eq!(
            validate_url("ftp://example.com/file").unwrap_err(),
            FetchError::UnsupportedScheme("ftp".into())
        );
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let addr = serve_fixture().await;
        let body = source(DEFAULT_MAX_BODY_BYTES)
            .fetch(&format!("http://{addr}/"))
            .await
            .unwrap();
        assert!(body.contains("<title>Local</title>"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let addr = serve_fixture().await;
        let src = source(DEFAULT_MAX_BODY_BYTES);
        assert_eq!(
            src.fetch(&format!("http://{addr}/broken")).await.unwrap_err(),
            FetchError::Status(500)
        );
        assert_eq!(
            src.fetch(&format!("http://{addr}/missing")).await.unwrap_err(),
            FetchError::Status(404)
        );
    }

    #[tokio::test]
    async fn test_body_cap() {
        let addr = serve_fixture().await;
        let err = source(1024)
            .fetch(&format!("http://{addr}/big"))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::BodyTooLarge { limit: 1024 });
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = source(DEFAULT_MAX_BODY_BYTES)
            .fetch(&format!("http://{addr}/"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
