use std::collections::HashMap;

use platform_utils::{HttpClient, HttpError, HttpResponse};
use scan_engine_common::test_utils::mock_rest_client::MockRestClient;
use tokio::sync::{Semaphore, watch};

/// [`MockRestClient`] whose replies are held back until the test opens the
/// gate, one reply per [`GatedHttpClient::release`].
pub struct GatedHttpClient {
    inner: MockRestClient,
    gate: Semaphore,
    started_tx: watch::Sender<usize>,
}

impl GatedHttpClient {
    pub fn new() -> Self {
        let (started_tx, _) = watch::channel(0);
        Self {
            inner: MockRestClient::new(),
            gate: Semaphore::new(0),
            started_tx,
        }
    }

    pub fn mock(&self) -> &MockRestClient {
        &self.inner
    }

    /// Lets `count` held back requests complete.
    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    /// Waits until `count` requests reached the client.
    pub async fn wait_for_requests(&self, count: usize) {
        let mut started_rx = self.started_tx.subscribe();
        let _ = started_rx.wait_for(|started| *started >= count).await;
    }

    async fn pass_gate(&self) {
        self.started_tx
            .send_modify(|started| *started = started.saturating_add(1));
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
    }
}

impl Default for GatedHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HttpClient for GatedHttpClient {
    async fn get(
        &self,
        url: String,
        headers: Option<HashMap<String, String>>,
    ) -> Result<HttpResponse, HttpError> {
        self.pass_gate().await;
        self.inner.get(url, headers).await
    }

    async fn post(
        &self,
        url: String,
        headers: Option<HashMap<String, String>>,
        body: Option<String>,
    ) -> Result<HttpResponse, HttpError> {
        self.pass_gate().await;
        self.inner.post(url, headers, body).await
    }
}
