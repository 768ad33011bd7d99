use core::time::Duration;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use piano_booking_http::{ApiRequest, ApiResponse, HttpError, StatusCode, Transport};

#[derive(Clone, Debug)]
pub enum MockReply {
    Response(StatusCode, &'static str),
    TransportFailure,
}

impl MockReply {
    pub const fn ok(body: &'static str) -> Self {
        Self::Response(StatusCode::OK, body)
    }

    pub const fn status(status: StatusCode, body: &'static str) -> Self {
        Self::Response(status, body)
    }
}

/// Replays queued replies per path and records every request it saw.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<HashMap<String, VecDeque<MockReply>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn reply(&self, path: impl Into<String>, reply: MockReply) {
        self.replies
            .lock()
            .unwrap()
            .entry(path.into())
            .or_default()
            .push_back(reply);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path == path)
            .collect()
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
        let path = request.path.clone();
        self.requests.lock().unwrap().push(request);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&path)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| panic!("no reply queued for {path}"));
        match reply {
            MockReply::Response(status, body) => Ok(ApiResponse {
                status,
                body: body.into(),
            }),
            MockReply::TransportFailure => Err(HttpError::Timeout(Duration::ZERO)),
        }
    }
}
