//! The `HttpClient` trait: the contract every HTTP backend must fulfil.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::TransportError;

/// HTTP verbs a task may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
            Self::Patch => write!(f, "PATCH"),
        }
    }
}

/// A fully resolved request, ready to be put on the wire.
///
/// Built by the engine from a task's request template after every
/// contextual input has been substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpCall {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpCall {
    /// A bare call with no headers, query parameters or body.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }
}

/// The HTTP collaborator used by the task executor.
///
/// Implementations issue exactly one request per call and never retry.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send the call and return the response body.
    async fn send(&self, call: HttpCall) -> Result<String, TransportError>;
}
