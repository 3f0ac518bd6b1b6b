//! HTTP client abstraction used for LNURL round trips.

use std::collections::HashMap;

use crate::HttpError;

mod native;

pub use native::BitreqHttpClient;

/// Default HTTP client type.
pub type DefaultHttpClient = BitreqHttpClient;

/// Default request timeout in seconds.
pub const REQUEST_TIMEOUT: u64 = 30;

/// Response from an HTTP request, whatever its status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// Returns true if the status code indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the response body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        for<'a> T: serde::de::Deserialize<'a>,
    {
        serde_json::from_str::<T>(&self.body)
    }
}

/// HTTP client trait for making requests.
///
/// Implementations must report transport failures (DNS, connect, timeout)
/// as [`HttpError`] and return every received response, including non-2xx
/// ones, as [`HttpResponse`].
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    /// Makes a GET request.
    async fn get(
        &self,
        url: String,
        headers: Option<HashMap<String, String>>,
    ) -> Result<HttpResponse, HttpError>;

    /// Makes a POST request with optional body.
    async fn post(
        &self,
        url: String,
        headers: Option<HashMap<String, String>>,
        body: Option<String>,
    ) -> Result<HttpResponse, HttpError>;
}

/// Create a new HTTP client with the given user agent.
pub fn create_http_client(user_agent: Option<&str>) -> Box<dyn HttpClient> {
    Box::new(BitreqHttpClient::new(user_agent.map(String::from)))
}
