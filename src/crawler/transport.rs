//! Transport capability and its HTTP implementation
//!
//! The crawl engine only needs to connect to an endpoint and issue GET
//! requests against it. `Transport` captures that capability; `Connector`
//! hands out one transport per worker context. `HttpConnector` is the
//! reqwest-backed implementation used by the binary.

use crate::config::HttpConfig;
use crate::url::Endpoint;
use crate::TransportError;
use reqwest::{redirect::Policy, Client};
use std::collections::HashMap;
use std::time::Duration;
use tokio::runtime::Handle;

/// Response to a single GET request
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: u16,
    headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Adds a header; names are stored lowercase
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Connection to one endpoint at a time
///
/// `connect` may be called again with a URL on another endpoint; the
/// transport then switches over. Redirects are never followed here.
pub trait Transport: Send {
    /// Prepares the transport for requests against the endpoint of `url`
    fn connect(&mut self, url: &str) -> Result<Endpoint, TransportError>;

    /// Issues a GET for `path` (path plus query) on the connected endpoint
    fn get(&mut self, path: &str) -> Result<Response, TransportError>;
}

/// Factory for transports, shared by every worker context of a crawl
pub trait Connector: Send + Sync {
    fn open(&self) -> Box<dyn Transport>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The HTTP configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::none()) // 301/302 are handled by the crawl pipeline
        .gzip(true)
        .brotli(true)
        .build()
}

/// Connector backed by a shared reqwest client
///
/// Worker threads are plain OS threads, so requests are driven to completion
/// with `Handle::block_on` on the runtime the connector was created with.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: Client,
    runtime: Handle,
}

impl HttpConnector {
    pub fn new(config: &HttpConfig, runtime: Handle) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            runtime,
        })
    }
}

impl Connector for HttpConnector {
    fn open(&self) -> Box<dyn Transport> {
        Box::new(HttpTransport {
            client: self.client.clone(),
            runtime: self.runtime.clone(),
            endpoint: None,
        })
    }
}

/// Transport issuing requests through reqwest
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    runtime: Handle,
    endpoint: Option<Endpoint>,
}

impl Transport for HttpTransport {
    fn connect(&mut self, url: &str) -> Result<Endpoint, TransportError> {
        let endpoint = Endpoint::from_url(url).map_err(|e| TransportError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        self.endpoint = Some(endpoint.clone());
        Ok(endpoint)
    }

    fn get(&mut self, path: &str) -> Result<Response, TransportError> {
        let endpoint = self.endpoint.as_ref().ok_or(TransportError::NotConnected)?;
        let url = format!("{}{}", endpoint.base(), path);
        let client = self.client.clone();

        self.runtime.block_on(async move {
            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|e| TransportError::Request {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();

            let body = response.bytes().await.map_err(|e| TransportError::Body {
                url: url.clone(),
                reason: e.to_string(),
            })?;

            Ok(Response {
                status,
                headers,
                body: body.to_vec(),
            })
        })
    }
}
