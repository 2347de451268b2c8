//! `MockHttpClient`: a test double for `HttpClient`.
//!
//! Useful in unit and scenario tests where a real network is either
//! unavailable or irrelevant.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{HttpCall, HttpClient, TransportError};

/// Behaviour injected into `MockHttpClient` for a URL (or as the fallback).
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Answer with the given body.
    Respond(String),
    /// Fail with a `TransportError::Failed`.
    Fail(String),
    /// Fail with a `TransportError::Timeout`.
    TimeOut,
}

/// A mock client that records every call it receives and answers with a
/// programmer-specified result.
#[derive(Debug, Clone)]
pub struct MockHttpClient {
    routes: Vec<(String, MockBehaviour)>,
    fallback: MockBehaviour,
    calls: Arc<Mutex<Vec<HttpCall>>>,
}

impl MockHttpClient {
    /// A mock that answers every call with `body`.
    pub fn returning(body: impl Into<String>) -> Self {
        Self::with_fallback(MockBehaviour::Respond(body.into()))
    }

    /// A mock that fails every call.
    pub fn failing(msg: impl Into<String>) -> Self {
        Self::with_fallback(MockBehaviour::Fail(msg.into()))
    }

    /// A mock that times out on every call.
    pub fn timing_out() -> Self {
        Self::with_fallback(MockBehaviour::TimeOut)
    }

    fn with_fallback(fallback: MockBehaviour) -> Self {
        Self {
            routes: Vec::new(),
            fallback,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Use `behaviour` for calls whose URL equals `url`.
    pub fn route(mut self, url: impl Into<String>, behaviour: MockBehaviour) -> Self {
        self.routes.push((url.into(), behaviour));
        self
    }

    /// All calls seen so far (in call order).
    pub fn calls(&self) -> Vec<HttpCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of calls seen so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn behaviour_for(&self, url: &str) -> &MockBehaviour {
        self.routes
            .iter()
            .find(|(route, _)| route == url)
            .map(|(_, behaviour)| behaviour)
            .unwrap_or(&self.fallback)
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(&self, call: HttpCall) -> Result<String, TransportError> {
        let behaviour = self.behaviour_for(&call.url).clone();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call.clone());

        match behaviour {
            MockBehaviour::Respond(body) => Ok(body),
            MockBehaviour::Fail(msg) => Err(TransportError::Failed(msg)),
            MockBehaviour::TimeOut => Err(TransportError::Timeout(format!("{} timed out", call.url))),
        }
    }
}
