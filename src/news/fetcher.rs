use crate::util::parse_http_url;
use futures::StreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;

/// Connect timeout applied to every request.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(15_000);
/// Read timeout applied to every request.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10_000);

const MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB
const MAX_REDIRECTS: usize = 3;

/// Errors that can occur while fetching a URL.
///
/// Every failure is reported as a distinct variant; an empty body is only
/// ever returned for a successful response that really was empty.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL could not be parsed or does not use http/https.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Network-level error (DNS, connection refused, TLS, connect/read timeout)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the overall connect + read budget
    #[error("Request timed out")]
    Timeout,
    /// HTTP response with a status other than 200
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

impl FetchError {
    /// True for failures of the transport itself rather than of the server's answer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FetchError::Network(_) | FetchError::Timeout | FetchError::IncompleteResponse { .. }
        )
    }
}

/// Timeouts and limits for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub max_body_size: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_body_size: MAX_BODY_SIZE,
        }
    }
}

impl FetchSettings {
    fn total_budget(&self) -> Duration {
        self.connect_timeout.saturating_add(self.read_timeout)
    }
}

/// Limit redirects to a few hops and refuse loops.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Performs single timed GET requests with no retry.
///
/// Cloning is cheap: the underlying `reqwest::Client` is reference counted and
/// clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl HttpFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .redirect(create_redirect_policy())
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .user_agent(concat!("newsfeed/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, settings })
    }

    /// Fetches `url` and returns the body decoded as UTF-8.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] - unparseable or non-http(s) URL
    /// - [`FetchError::Network`] / [`FetchError::Timeout`] - transport failure
    /// - [`FetchError::HttpStatus`] - status other than 200, body not read
    /// - [`FetchError::ResponseTooLarge`] / [`FetchError::IncompleteResponse`]
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let bytes = self.fetch_bytes(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Fetches `url` and returns the raw body bytes.
    ///
    /// Same contract as [`HttpFetcher::fetch`] without the text decoding.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = parse_http_url(url).map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Rejecting request URL");
            FetchError::InvalidUrl(e.to_string())
        })?;

        let response = tokio::time::timeout(
            self.settings.total_budget(),
            self.client.get(parsed.as_str()).send(),
        )
        .await
        .map_err(|_| {
            tracing::warn!(url = %url, "Request timed out");
            FetchError::Timeout
        })?
        .map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Request failed");
            FetchError::Network(e)
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::warn!(url = %url, status = status.as_u16(), "Unexpected response status");
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let bytes = read_limited_bytes(response, self.settings.max_body_size).await?;
        tracing::debug!(url = %url, bytes = bytes.len(), "Fetched response body");
        Ok(bytes)
    }
}

/// Drains the response body, enforcing `limit` and the advertised Content-Length.
///
/// Consumes the response, so the connection is released on every return path.
async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(FetchSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"response":{}}"#))
            .expect(1)
            .mount(&mock_server)
            .await;

        let body = fetcher()
            .fetch(&format!("{}/search", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(body, r#"{"response":{}}"#);
    }

    #[tokio::test]
    async fn test_fetch_empty_body_is_ok() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let body = fetcher().fetch(&mock_server.uri()).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&mock_server)
            .await;

        let result = fetcher().fetch(&mock_server.uri()).await;
        match result {
            Err(FetchError::HttpStatus(404)) => {}
            other => panic!("Expected HttpStatus(404), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_500_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = fetcher().fetch(&mock_server.uri()).await;
        assert!(matches!(result, Err(FetchError::HttpStatus(500))));
    }

    #[tokio::test]
    async fn test_fetch_non_200_success_status_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let result = fetcher().fetch(&mock_server.uri()).await;
        assert!(matches!(result, Err(FetchError::HttpStatus(204))));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let result = fetcher().fetch("not-a-valid-url").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_unsupported_scheme() {
        let result = fetcher().fetch("ftp://example.com/search").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_network_error() {
        // Reserve a free port, then release it so nothing is listening there.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = fetcher()
            .fetch(&format!("http://127.0.0.1:{port}/search"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)), "got {:?}", err);
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_fetch_read_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new(FetchSettings {
            connect_timeout: Duration::from_millis(100),
            read_timeout: Duration::from_millis(100),
            ..FetchSettings::default()
        })
        .unwrap();

        let err = fetcher.fetch(&mock_server.uri()).await.unwrap_err();
        assert!(err.is_transport(), "expected transport error, got {:?}", err);
    }

    #[tokio::test]
    async fn test_fetch_response_too_large() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new(FetchSettings {
            max_body_size: 16,
            ..FetchSettings::default()
        })
        .unwrap();

        let result = fetcher.fetch(&mock_server.uri()).await;
        assert!(matches!(result, Err(FetchError::ResponseTooLarge)));
    }

    #[tokio::test]
    async fn test_fetch_invalid_utf8_is_replaced() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'o', b'k', 0xff]))
            .mount(&mock_server)
            .await;

        let body = fetcher().fetch(&mock_server.uri()).await.unwrap();
        assert!(body.starts_with("ok"));
        assert!(body.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_fetch_bytes_returns_raw_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8, 1, 2, 3]))
            .mount(&mock_server)
            .await;

        let bytes = fetcher().fetch_bytes(&mock_server.uri()).await.unwrap();
        assert_eq!(bytes, vec![0u8, 1, 2, 3]);
    }
}
