//! HTTP transport
//!
//! The executor performs the call and nothing else: any HTTP status comes
//! back as a raw response for the dialect to interpret, and only
//! network-level failures become errors.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::ActionError;

/// HTTP verb for a service request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// Basic-auth credentials attached to a request.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// A fully built request for one identifier service.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub basic_auth: Option<BasicAuth>,
}

impl ServiceRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            basic_auth: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some(BasicAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

/// Raw response from a service. Status interpretation belongs to the
/// dialect, not the transport.
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    pub status: u16,
    pub body: String,
}

impl ServiceResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport seam between the action engine and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ServiceRequest) -> Result<ServiceResponse, ActionError>;
}

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Request timeout in seconds (default: 30).
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!("registrar/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// reqwest-backed transport with a bounded timeout.
pub struct RequestExecutor {
    client: Client,
}

impl RequestExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent)
            .build()
            .unwrap_or_default();

        Self { client }
    }

    pub fn with_defaults() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

#[async_trait]
impl Transport for RequestExecutor {
    async fn send(&self, request: ServiceRequest) -> Result<ServiceResponse, ActionError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref auth) = request.basic_auth {
            builder = builder.basic_auth(&auth.username, Some(&auth.password));
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        debug!(url = %request.url, method = ?request.method, "sending service request");

        let response = builder
            .send()
            .await
            .map_err(|e| ActionError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ActionError::Transport(e.to_string()))?;

        Ok(ServiceResponse { status, body })
    }
}
