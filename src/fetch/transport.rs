//! Byte transfer from a resolved source.

use crate::config::FetchConfig;
use crate::error::FetchError;
use bytes::Bytes;
use url::Url;

/// Downloads the full payload behind a URL
///
/// One transport instance is shared by every transfer of a batch so the
/// underlying connection pool is reused.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Download every byte at `url`
    async fn download(&self, url: &Url) -> Result<Bytes, FetchError>;
}

/// HTTP(S) transport backed by a single pooled `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    request_timeout: std::time::Duration,
}

impl HttpTransport {
    /// Build the client with the configured timeouts and user agent
    pub fn new(config: &FetchConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            request_timeout: config.request_timeout,
        })
    }

    fn transfer_error(&self, url: &Url, err: reqwest::Error) -> FetchError {
        let reason = if err.is_timeout() {
            format!("timed out after {:?}", self.request_timeout)
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        };

        FetchError::Transfer {
            url: url.to_string(),
            status: err.status().map(|s| s.as_u16()),
            reason,
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn download(&self, url: &Url) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.transfer_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transfer {
                url: url.to_string(),
                status: Some(status.as_u16()),
                reason: format!("HTTP {}", status),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transfer_error(url, e))?;

        tracing::debug!(url = %url, bytes = body.len(), "transfer complete");
        Ok(body)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(request_timeout: Duration) -> HttpTransport {
        HttpTransport::new(&FetchConfig {
            request_timeout,
            ..FetchConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_download_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bucket/x.nc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"CDF\x01payload".to_vec()))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/bucket/x.nc", server.uri())).unwrap();
        let body = transport(Duration::from_secs(5)).download(&url).await.unwrap();

        assert_eq!(&body[..], b"CDF\x01payload");
    }

    #[tokio::test]
    async fn test_download_sends_user_agent() {
        let server = MockServer::start().await;
        let agent = FetchConfig::default().user_agent;
        Mock::given(method("GET"))
            .and(header("user-agent", agent.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/x.nc", server.uri())).unwrap();
        transport(Duration::from_secs(5)).download(&url).await.unwrap();
    }

    #[tokio::test]
    async fn test_http_error_status_is_transfer_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/missing.nc", server.uri())).unwrap();
        let err = transport(Duration::from_secs(5))
            .download(&url)
            .await
            .unwrap_err();

        match err {
            FetchError::Transfer { status, url: u, .. } => {
                assert_eq!(status, Some(404));
                assert_eq!(u, url.to_string());
            }
            other => panic!("expected transfer error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"late".to_vec())
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/slow.nc", server.uri())).unwrap();
        let err = transport(Duration::from_millis(200))
            .download(&url)
            .await
            .unwrap_err();

        match err {
            FetchError::Transfer { reason, .. } => assert!(reason.contains("timed out"), "{reason}"),
            other => panic!("expected transfer error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_transfer_error() {
        // Bind then drop a listener to get a port with nothing behind it
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let url = Url::parse(&format!("http://127.0.0.1:{port}/x.nc")).unwrap();
        let err = transport(Duration::from_secs(5))
            .download(&url)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "transfer_error");
    }
}
