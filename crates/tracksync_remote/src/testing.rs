//! Scripted HTTP client for unit tests.

use crate::http::{HttpClient, HttpRequest, HttpResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub(crate) struct ScriptedClient {
    responses: Mutex<VecDeque<Result<HttpResponse, String>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, response: HttpResponse) -> &Self {
        self.responses.lock().push_back(Ok(response));
        self
    }

    pub(crate) fn fail(&self, message: &str) -> &Self {
        self.responses.lock().push_back(Err(message.to_string()));
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err("no scripted response".into()))
    }
}
