//! HTTP transport: one request in, one normalized result out.
//!
//! Every failure is returned to the caller; nothing is retried here.

use std::time::Duration;

use media_proto::config::ClientConfig;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::TransportError;

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
}

impl Body {
    pub fn into_json(self) -> Option<Value> {
        match self {
            Body::Json(v) => Some(v),
            Body::Text(_) => None,
        }
    }
}

/// Per-request extras.  Headers given here replace the JSON defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RequestOptions {
    pub fn query(pairs: &[(&str, &str)]) -> Self {
        Self {
            query: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
    base_url: String,
}

impl Transport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mediadeck/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(TransportError::Network)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        Self::new(
            &config.base_url,
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URLs pass through; anything else is joined onto the base.
    fn resolve(&self, path: &str) -> Result<Url, TransportError> {
        let raw = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        Url::parse(&raw).map_err(|_| TransportError::InvalidUrl(raw))
    }

    /// The base URL with `segments` appended, each percent-encoded as a
    /// single path segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let invalid = || TransportError::InvalidUrl(self.base_url.clone());
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn headers(overrides: &HeaderMap) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for key in overrides.keys() {
            headers.remove(key);
        }
        for (key, value) in overrides.iter() {
            headers.append(key.clone(), value.clone());
        }
        headers
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Body, TransportError> {
        let url = self.resolve(path)?;
        debug!("transport: {} {}", method, url);

        let mut req = self
            .client
            .request(method.clone(), url.clone())
            .headers(Self::headers(&options.headers));
        if !options.query.is_empty() {
            req = req.query(&options.query);
        }
        if let Some(body) = options.body {
            req = req.body(body);
        }

        let response = req.send().await.map_err(|e| {
            warn!("transport: {} {} failed: {}", method, url, e);
            TransportError::Network(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!("transport: {} {} -> {}", method, url, status);
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
            .unwrap_or(false);

        let bytes = response.bytes().await.map_err(TransportError::Network)?;
        if is_json {
            serde_json::from_slice(&bytes).map(Body::Json).map_err(|e| {
                warn!("transport: {} {} returned malformed JSON: {}", method, url, e);
                TransportError::Decode(e.to_string())
            })
        } else {
            Ok(Body::Text(String::from_utf8_lossy(&bytes).into_owned()))
        }
    }

    pub async fn get(&self, path: &str) -> Result<Body, TransportError> {
        self.request(Method::GET, path, RequestOptions::default())
            .await
    }

    /// GET and decode a JSON body into `T`.  A text body counts as a decode
    /// failure.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, TransportError> {
        let body = self
            .request(Method::GET, path, RequestOptions::query(query))
            .await?;
        let value = body
            .into_json()
            .ok_or_else(|| TransportError::Decode(format!("{} did not return JSON", path)))?;
        serde_json::from_value(value).map_err(|e| TransportError::Decode(e.to_string()))
    }
}
