//! Native HTTP client using bitreq.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::HttpError;

use super::{HttpClient, HttpResponse, REQUEST_TIMEOUT};

/// Default connection pool capacity for the HTTP client.
const DEFAULT_POOL_CAPACITY: usize = 10;

/// HTTP client backed by a pooled bitreq client.
pub struct BitreqHttpClient {
    client: bitreq::Client,
    user_agent: Option<String>,
}

impl BitreqHttpClient {
    pub fn new(user_agent: Option<String>) -> Self {
        Self {
            client: bitreq::Client::new(DEFAULT_POOL_CAPACITY),
            user_agent,
        }
    }

    fn prepare(
        &self,
        req: bitreq::Request,
        headers: Option<HashMap<String, String>>,
    ) -> bitreq::Request {
        let mut req = req.with_timeout(REQUEST_TIMEOUT);
        if let Some(ua) = &self.user_agent {
            req = req.with_header("User-Agent", ua);
        }
        for (key, value) in headers.unwrap_or_default() {
            req = req.with_header(key, value);
        }
        req
    }

    async fn send(&self, req: bitreq::Request) -> Result<HttpResponse, HttpError> {
        let response = self.client.send_async(req).await?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let status = response.status_code as u16;
        let body = response.as_str()?.to_string();
        debug!("Received response, status: {status}");
        trace!("raw response body: {body}");

        Ok(HttpResponse { status, body })
    }
}

impl Default for BitreqHttpClient {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait::async_trait]
impl HttpClient for BitreqHttpClient {
    async fn get(
        &self,
        url: String,
        headers: Option<HashMap<String, String>>,
    ) -> Result<HttpResponse, HttpError> {
        debug!("Making GET request to: {url}");
        let req = self.prepare(bitreq::get(&url), headers);
        self.send(req).await
    }

    async fn post(
        &self,
        url: String,
        headers: Option<HashMap<String, String>>,
        body: Option<String>,
    ) -> Result<HttpResponse, HttpError> {
        debug!("Making POST request to: {url}");
        let mut req = self.prepare(bitreq::post(&url), headers);
        if let Some(body) = body {
            req = req.with_body(body);
        }
        self.send(req).await
    }
}
