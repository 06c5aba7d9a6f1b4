//! HTTP place lookup

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::{EnrichError, Enricher};
use crate::config::EnrichmentConfig;
use crate::plan::ItemMetadata;

/// Enricher backed by `GET {url}?q=<title>&context=<context>`
pub struct HttpEnricher {
    url: String,
    http: Client,
    timeout: Duration,
}

impl HttpEnricher {
    pub fn from_config(config: &EnrichmentConfig) -> Result<Self, EnrichError> {
        debug!(url = %config.url, timeout_ms = config.timeout_ms, "from_config: called");
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: config.url.clone(),
            http,
            timeout,
        })
    }
}

#[async_trait]
impl Enricher for HttpEnricher {
    async fn lookup(&self, title: &str, context: Option<&str>) -> Result<Option<ItemMetadata>, EnrichError> {
        debug!(%title, ?context, "lookup: called");
        let mut query = vec![("q", title)];
        if let Some(context) = context {
            query.push(("context", context));
        }

        let response = self
            .http
            .get(&self.url)
            .query(&query)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { EnrichError::Timeout(self.timeout) } else { EnrichError::Network(e) })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(%title, "lookup: not found");
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EnrichError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let metadata: Option<ItemMetadata> = serde_json::from_str(&body)?;
        Ok(metadata.filter(|m| !m.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve one canned response and report the request line
    async fn serve_once(status_line: &str, body: &str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let request = String::from_utf8_lossy(&request).to_string();
            let _ = tx.send(request.lines().next().unwrap_or_default().to_string());
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        (format!("http://{}/lookup", addr), rx)
    }

    fn enricher(url: String) -> HttpEnricher {
        HttpEnricher::from_config(&EnrichmentConfig {
            enabled: true,
            url,
            concurrency: 1,
            timeout_ms: 5_000,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_lookup_hit() {
        let body = r#"{"imageUrl":"https://img.example/zoo.jpg","placeId":"p1","latitude":32.7,"longitude":-117.1}"#;
        let (url, request_line) = serve_once("200 OK", body).await;

        let metadata = enricher(url).lookup("San Diego Zoo", Some("San Diego")).await.unwrap().unwrap();

        assert_eq!(metadata.place_id.as_deref(), Some("p1"));
        assert_eq!(metadata.latitude, Some(32.7));
        let request_line = request_line.await.unwrap();
        assert!(request_line.starts_with("GET /lookup?q=San+Diego+Zoo&context=San+Diego"));
    }

    #[tokio::test]
    async fn test_lookup_not_found() {
        let (url, _) = serve_once("404 Not Found", "").await;
        assert_eq!(enricher(url).lookup("Nowhere", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lookup_null_body() {
        let (url, _) = serve_once("200 OK", "null").await;
        assert_eq!(enricher(url).lookup("Nowhere", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lookup_server_error() {
        let (url, _) = serve_once("500 Internal Server Error", "oops").await;
        let err = enricher(url).lookup("Zoo", None).await.unwrap_err();
        assert!(matches!(err, EnrichError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_lookup_invalid_body() {
        let (url, _) = serve_once("200 OK", "not json").await;
        let err = enricher(url).lookup("Zoo", None).await.unwrap_err();
        assert!(matches!(err, EnrichError::InvalidResponse(_)));
    }
}
