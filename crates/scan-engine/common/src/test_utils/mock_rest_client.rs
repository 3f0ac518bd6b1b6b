use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use platform_utils::{HttpClient, HttpError, HttpResponse};
use tracing::debug;

#[derive(Debug)]
enum MockReply {
    Response(HttpResponse),
    Error(HttpError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub body: Option<String>,
}

/// HTTP client replaying queued replies in order and recording every
/// request it receives.
#[derive(Default)]
pub struct MockRestClient {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockRestClient {
    pub fn new() -> Self {
        MockRestClient::default()
    }

    pub fn add_response(&self, status: u16, body: impl Into<String>) -> &Self {
        let response = HttpResponse {
            status,
            body: body.into(),
        };
        debug!("Push response: {response:?}");
        self.replies
            .lock()
            .unwrap()
            .push_back(MockReply::Response(response));
        self
    }

    pub fn add_error(&self, error: HttpError) -> &Self {
        debug!("Push error: {error:?}");
        self.replies.lock().unwrap().push_back(MockReply::Error(error));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn reply(
        &self,
        method: &'static str,
        url: String,
        body: Option<String>,
    ) -> Result<HttpResponse, HttpError> {
        self.requests
            .lock()
            .unwrap()
            .push(RecordedRequest { method, url, body });
        let reply = self.replies.lock().unwrap().pop_front().ok_or_else(|| {
            HttpError::Other(format!("No response available for {method} request"))
        })?;
        debug!("Pop {method} reply: {reply:?}");
        match reply {
            MockReply::Response(response) => Ok(response),
            MockReply::Error(error) => Err(error),
        }
    }
}

#[async_trait::async_trait]
impl HttpClient for MockRestClient {
    async fn get(
        &self,
        url: String,
        _headers: Option<HashMap<String, String>>,
    ) -> Result<HttpResponse, HttpError> {
        self.reply("GET", url, None)
    }

    async fn post(
        &self,
        url: String,
        _headers: Option<HashMap<String, String>>,
        body: Option<String>,
    ) -> Result<HttpResponse, HttpError> {
        self.reply("POST", url, body)
    }
}
