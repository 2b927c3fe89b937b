use crate::proxy::ProxyEndpoint;
use anyhow::{Context, Result};
use log::{debug, error, warn};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::time::Duration;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/111.0.0.0 Safari/537.36";

/// Result of a single page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Page(String),
    NotFound,
    /// HTTP 403; usually means the exit IP is blocked.
    Forbidden,
    Failed(String),
}

pub trait PageFetcher {
    fn fetch(&mut self, url: &str, proxy: Option<&ProxyEndpoint>) -> FetchOutcome;
}

pub struct HttpFetcher {
    referer: Option<String>,
    timeout: Duration,
    direct: Option<Client>,
    proxied: HashMap<ProxyEndpoint, Client>,
}

impl HttpFetcher {
    pub fn new(referer: Option<&str>, timeout: Duration) -> Self {
        Self {
            referer: referer.map(str::to_string),
            timeout,
            direct: None,
            proxied: HashMap::new(),
        }
    }

    fn build_client(&self, proxy: Option<&ProxyEndpoint>) -> Result<Client> {
        let mut headers = HeaderMap::new();
        if let Some(referer) = &self.referer {
            headers.insert(
                REFERER,
                HeaderValue::from_str(referer).context("Invalid referer header")?,
            );
        }

        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(self.timeout)
            .cookie_store(true);

        if let Some(endpoint) = proxy {
            let mut proxy = reqwest::Proxy::all(endpoint.proxy_url())
                .with_context(|| format!("Invalid proxy {}", endpoint))?;
            if let (Some(user), Some(pass)) = (&endpoint.username, &endpoint.password) {
                proxy = proxy.basic_auth(user, pass);
            }
            builder = builder.proxy(proxy);
        }

        builder.build().context("Failed to build HTTP client")
    }

    fn client_for(&mut self, proxy: Option<&ProxyEndpoint>) -> Result<&Client> {
        match proxy {
            None => {
                if self.direct.is_none() {
                    self.direct = Some(self.build_client(None)?);
                }
                self.direct.as_ref().context("Direct client missing")
            }
            Some(endpoint) => {
                // Rotating gateways share host:port and differ only in
                // credentials, so the whole endpoint is the key.
                if !self.proxied.contains_key(endpoint) {
                    debug!("Building HTTP client for proxy {}", endpoint);
                    let client = self.build_client(Some(endpoint))?;
                    self.proxied.insert(endpoint.clone(), client);
                }
                self.proxied
                    .get(endpoint)
                    .context("Proxy client missing from cache")
            }
        }
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&mut self, url: &str, proxy: Option<&ProxyEndpoint>) -> FetchOutcome {
        let client = match self.client_for(proxy) {
            Ok(client) => client,
            Err(e) => return FetchOutcome::Failed(format!("{:#}", e)),
        };

        let response = match client.get(url).send() {
            Ok(response) => response,
            Err(e) => {
                error!("Error making GET request to URL: {}\nError message: {}", url, e);
                return FetchOutcome::Failed(e.to_string());
            }
        };

        match response.status() {
            StatusCode::NOT_FOUND => {
                warn!("Page not found: {}", url);
                FetchOutcome::NotFound
            }
            StatusCode::FORBIDDEN => {
                error!("HTTP 403 Forbidden error for URL: {}", url);
                FetchOutcome::Forbidden
            }
            status if !status.is_success() => {
                error!("Error making GET request to URL: {}\nStatus: {}", url, status);
                FetchOutcome::Failed(format!("HTTP {}", status))
            }
            _ => match response.text() {
                Ok(body) => FetchOutcome::Page(body),
                Err(e) => {
                    error!("Failed to read response body from {}: {}", url, e);
                    FetchOutcome::Failed(e.to_string())
                }
            },
        }
    }
}
