//! `ReqwestClient`: the production [`HttpClient`].

use async_trait::async_trait;
use reqwest::{Client, Method};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::{HttpCall, HttpClient, HttpMethod, TransportError};

/// HTTP client backed by a shared reqwest connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    http: Client,
    config: ClientConfig,
}

impl ReqwestClient {
    /// Build a client from the given configuration.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidRequest`] if reqwest rejects the
    /// configuration (for example an invalid user agent).
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        debug!(
            timeout_ms = config.timeout.as_millis() as u64,
            "creating http client"
        );

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { http, config })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Patch => Method::PATCH,
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, call: HttpCall) -> Result<String, TransportError> {
        debug!(method = %call.method, url = %call.url, "sending task request");

        let mut request = self.http.request(to_method(call.method), &call.url);
        for (name, value) in &call.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !call.query.is_empty() {
            request = request.query(&call.query);
        }
        if let Some(body) = call.body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(url = %call.url, status = status.as_u16(), "task request returned error status");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}
