use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;

use crate::Failure;

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single outbound request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub proxy: Option<String>,
    pub timeout: Duration,
    pub json: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: vec![("User-Agent".to_string(), USER_AGENT.to_string())],
            proxy: None,
            timeout: DEFAULT_TIMEOUT,
            json: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            json: Some(body),
            ..Self::get(url)
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn proxy(mut self, proxy: Option<&str>) -> Self {
        self.proxy = proxy.map(str::to_string);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Status and body of a completed request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Failure> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Fail with a status-derived classification unless 2xx
    pub fn error_for_status(self, context: &str) -> Result<Self, Failure> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Failure::from_status(self.status, context))
        }
    }
}

/// Outbound HTTP capability.
///
/// Non-2xx statuses are returned as responses; transport errors and timeouts
/// come back as classified failures.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Failure>;
}

/// reqwest-backed fetcher; proxied requests get a dedicated client
#[derive(Debug, Clone, Default)]
pub struct ReqwestFetch {
    client: reqwest::Client,
}

impl ReqwestFetch {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<reqwest::Client, Failure> {
        match proxy {
            None => Ok(self.client.clone()),
            Some(url) => {
                let proxy = reqwest::Proxy::all(url)
                    .map_err(|e| Failure::Configuration(format!("invalid proxy URL: {e}")))?;
                reqwest::Client::builder()
                    .proxy(proxy)
                    .build()
                    .map_err(|e| Failure::Configuration(format!("failed to build proxied client: {e}")))
            }
        }
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetch {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Failure> {
        let client = self.client_for(request.proxy.as_deref())?;
        debug!(
            "{:?} {} (proxied: {}, timeout: {:?})",
            request.method,
            redact(&request.url),
            request.proxy.is_some(),
            request.timeout
        );

        let mut builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Post => client.post(&request.url),
        };
        builder = builder.timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(ref body) = request.json {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        debug!("HTTP {status}, {} bytes", body.len());

        Ok(HttpResponse { status, body })
    }
}

/// Strip the query string so keys never reach the log
fn redact(url: &str) -> &str {
    url.split_once('?').map(|(base, _)| base).unwrap_or(url)
}
