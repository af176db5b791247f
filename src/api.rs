//! HTTP client for the Access Watch API.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::error::Error;
use crate::report::ActivityRecord;
use crate::request::Headers;
use crate::session::Session;

/// Production API base.
pub const DEFAULT_API_BASE: &str = "https://access.watch/api/1.0";

const API_KEY_HEADER: &str = "Api-Key";

#[derive(Serialize)]
struct IdentityLookup<'a> {
    address: &'a str,
    headers: &'a Headers,
}

/// Authenticated client for the `/hello`, `/identity` and `/log` endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base: String,
    api_key: String,
}

impl ApiClient {
    /// Create a client for `base`. `timeout` bounds each request; without it
    /// requests wait as long as the transport does.
    pub fn new(
        base: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base: base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Base URL with any trailing slash removed.
    pub fn base(&self) -> &str {
        &self.base
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    /// Check that the base URL and API key are usable.
    ///
    /// Anything but a 200 fails with the response body as the message.
    pub async fn hello(&self) -> Result<(), Error> {
        let response = self
            .client
            .get(self.endpoint("hello"))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let body = response.text().await?;
            return Err(Error::Protocol(body));
        }

        Ok(())
    }

    /// Ask the API to classify a client address and header set.
    pub async fn identity(&self, address: &str, headers: &Headers) -> Result<Session, Error> {
        debug!(address = %address, "Querying identity endpoint");

        let response = self
            .client
            .post(self.endpoint("identity"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&IdentityLookup { address, headers })
            .send()
            .await?;

        if !is_json(&response) {
            return Err(Error::Protocol("Expected a json body from API".to_string()));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Submit an activity record.
    pub async fn log(&self, record: &ActivityRecord) -> Result<(), Error> {
        let response = self
            .client
            .post(self.endpoint("log"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(record)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(Error::Protocol(format!("HTTP {}: {}", status, body)));
        }

        Ok(())
    }
}

/// Whether the response declares `application/json`, parameters aside.
fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(server.uri(), "test-instance-apikey", None).unwrap()
    }

    #[test]
    fn test_base_trailing_slash() {
        let api = ApiClient::new("http://localhost:1234/api/", "key", None).unwrap();
        assert_eq!(api.base(), "http://localhost:1234/api");
        assert_eq!(api.endpoint("hello"), "http://localhost:1234/api/hello");
    }

    #[tokio::test]
    async fn test_hello_invalid_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hello"))
            .respond_with(ResponseTemplate::new(401).set_body_string("error message"))
            .mount(&server)
            .await;

        let err = client(&server).hello().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(err.to_string(), "error message");
    }

    #[tokio::test]
    async fn test_hello_valid_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hello"))
            .and(header("Api-Key", "test-instance-apikey"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).hello().await.unwrap();
    }

    #[tokio::test]
    async fn test_identity_sends_address_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity"))
            .and(header("Api-Key", "test-instance-apikey"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"a": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let headers: Headers = [("User-Agent", "123")].into_iter().collect();
        let session = client(&server).identity("1.2.3.4", &headers).await.unwrap();
        assert_eq!(session.get("a"), Some(&json!(1)));

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(
            body,
            json!({"address": "1.2.3.4", "headers": {"user-agent": "123"}})
        );
    }

    #[tokio::test]
    async fn test_identity_accepts_charset_parameter() {
        let server = MockServer::start().await;
        Mock::given(path("/identity"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"blocked":true}"#, "application/json; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let session = client(&server)
            .identity("1.2.3.4", &Headers::new())
            .await
            .unwrap();
        assert!(session.is_blocked());
    }

    #[tokio::test]
    async fn test_identity_rejects_non_json() {
        let server = MockServer::start().await;
        Mock::given(path("/identity"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html/>", "text/html"))
            .mount(&server)
            .await;

        let err = client(&server)
            .identity("1.2.3.4", &Headers::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_identity_malformed_json() {
        let server = MockServer::start().await;
        Mock::given(path("/identity"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("{not json", "application/json"))
            .mount(&server)
            .await;

        let err = client(&server)
            .identity("1.2.3.4", &Headers::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    /// Serve one response whose body is cut short of its Content-Length.
    async fn truncated_body_server(status_line: &str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!("{status_line}\r\nContent-Length: 100\r\n\r\nshort");
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_hello_body_read_failure_is_transport_error() {
        let base = truncated_body_server("HTTP/1.1 401 Unauthorized").await;
        let api = ApiClient::new(base, "key", None).unwrap();

        let err = api.hello().await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_log_body_read_failure_is_transport_error() {
        let base = truncated_body_server("HTTP/1.1 500 Internal Server Error").await;
        let api = ApiClient::new(base, "key", None).unwrap();
        let record = crate::report::ActivityReporter::new(
            crate::forwarded::ForwardedHeaders::none(),
            crate::report::DEFAULT_HEADER_BLACKLIST,
        )
        .record(&crate::request::IncomingRequest::new("1.2.3.4"), 200, chrono::Utc::now());

        let err = api.log(&record).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_transport_failure() {
        // Nothing listens on the discard port.
        let api = ApiClient::new("http://127.0.0.1:9", "key", None).unwrap();
        let err = api.hello().await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
