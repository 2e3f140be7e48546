//! Network transport used by the data-access services.
//!
//! The services only see the [`Transport`] trait. In development the
//! [`MockResponder`](mock::MockResponder) answers from fixtures after a
//! simulated delay; in production [`HttpTransport`] talks to a real endpoint.
//! Which one is used is decided once at startup (see [`Settings`](crate::settings::Settings));
//! nothing below the services knows about it.

pub mod mock;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::query::QueryError;

/// A response as seen by the services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, "OK", body)
    }

    pub fn not_found(status_text: impl Into<String>) -> Self {
        Self::new(404, status_text, "")
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Turns a non-2xx response into [`QueryError::Status`].
    ///
    /// # Errors
    ///
    /// Returns the status error when the response is not successful.
    pub fn error_for_status(self) -> Result<Self, QueryError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(QueryError::status(self.status, self.status_text))
        }
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Decode`] when the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, QueryError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Performs `GET` requests against the API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `path` (e.g. `/api/patients`).
    ///
    /// Only transport failures are errors; a non-2xx status is a regular
    /// [`Response`].
    async fn get(&self, path: &str) -> Result<Response, QueryError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn get(&self, path: &str) -> Result<Response, QueryError> {
        (**self).get(path).await
    }
}

/// A transport backed by a real HTTP endpoint.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<Response, QueryError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| QueryError::Network(e.to_string()))?;

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| QueryError::Network(e.to_string()))?;
        Ok(Response::new(status.as_u16(), status_text, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_for_status() {
        let ok = Response::ok("[]");
        assert_eq!(ok.clone().error_for_status(), Ok(ok));

        let err = Response::not_found("Patient not found").error_for_status();
        assert_eq!(err, Err(QueryError::status(404, "Patient not found")));
    }

    #[test]
    fn test_json_decode() {
        let values: Vec<u32> = Response::ok("[1,2,3]").json().expect("valid json");
        assert_eq!(values, vec![1, 2, 3]);

        let err = Response::ok("{").json::<Vec<u32>>().unwrap_err();
        assert!(matches!(err, QueryError::Decode(_)));
    }

    #[test]
    fn test_http_url_join() {
        let transport = HttpTransport::new("https://hospital.example/");
        assert_eq!(
            transport.url("/api/patients"),
            "https://hospital.example/api/patients"
        );
    }
}
