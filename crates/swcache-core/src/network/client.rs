//! HTTP fetcher backed by reqwest.
//!
//! Provides:
//! - Configurable request timeout and user agent
//! - Response tainting: same-origin responses are `basic`, the rest `cors`
//! - Conversion between the router's request/response models and reqwest

use super::fetcher::Fetcher;
use crate::config::{AppConfig, NetworkConfig};
use crate::error::{Result, SwError};
use crate::models::{HeaderMap, Request, Response, ResponseType};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::{Origin, Url};

/// Hop-by-hop headers that must not be forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// Fetcher that performs real HTTP requests.
pub struct HttpFetcher {
    client: Client,
    /// Origin whose responses are classified as `basic`.
    origin: Origin,
    default_timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher for `origin` with the default timeout.
    pub fn new(origin: &Url) -> Result<Self> {
        Self::with_timeout(origin, NetworkConfig::REQUEST_TIMEOUT)
    }

    /// Create a fetcher with a custom request timeout.
    pub fn with_timeout(origin: &Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(AppConfig::USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| SwError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: Some(e.to_string()),
            })?;

        Ok(Self {
            client,
            origin: origin.origin(),
            default_timeout: timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Classify a response by the URL it was finally served from.
    pub fn response_type_for(&self, final_url: &Url) -> ResponseType {
        if final_url.origin() == self.origin {
            ResponseType::Basic
        } else {
            ResponseType::Cors
        }
    }
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

fn end_to_end(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_hop_by_hop(name.as_str()) {
            forwarded.append(name.clone(), value.clone());
        }
    }
    forwarded
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(end_to_end(&request.headers));
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                SwError::Timeout(self.default_timeout)
            } else {
                SwError::Network {
                    message: format!("{} {} failed: {}", request.method, request.url, e),
                    cause: Some(e.to_string()),
                }
            }
        })?;

        let status = response.status();
        let response_type = self.response_type_for(response.url());
        let headers = end_to_end(response.headers());

        let body = response.bytes().await.map_err(|e| SwError::Network {
            message: format!("Reading body of {} failed: {}", request.url, e),
            cause: Some(e.to_string()),
        })?;

        debug!(
            "{} {} -> {} ({}, {} bytes)",
            request.method,
            request.url,
            status.as_u16(),
            response_type.as_str(),
            body.len()
        );

        Ok(Response {
            status,
            response_type,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_type_by_origin() {
        let origin = Url::parse("https://blog.example/").unwrap();
        let fetcher = HttpFetcher::new(&origin).unwrap();

        assert_eq!(
            fetcher.response_type_for(&Url::parse("https://blog.example/a.css").unwrap()),
            ResponseType::Basic
        );
        assert_eq!(
            fetcher.response_type_for(&Url::parse("https://fonts.example/a.woff2").unwrap()),
            ResponseType::Cors
        );
        assert_eq!(
            fetcher.response_type_for(&Url::parse("http://blog.example/").unwrap()),
            ResponseType::Cors
        );
    }

    #[test]
    fn test_hop_by_hop_filter() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("host"));
        assert!(!is_hop_by_hop("accept"));
    }

    #[test]
    fn test_end_to_end_keeps_repeated_and_binary_values() {
        use crate::models::{header, HeaderValue};

        let mut headers = HeaderMap::new();
        headers.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        headers.insert("x-legacy", HeaderValue::from_bytes(b"caf\xe9").unwrap());

        let forwarded = end_to_end(&headers);
        assert_eq!(forwarded.get_all(header::SET_COOKIE).iter().count(), 2);
        assert!(!forwarded.contains_key(header::CONNECTION));
        assert_eq!(forwarded["x-legacy"].as_bytes(), b"caf\xe9");
    }

    #[test]
    fn test_client_with_timeout() {
        let origin = Url::parse("http://localhost/").unwrap();
        let fetcher = HttpFetcher::with_timeout(&origin, Duration::from_secs(5)).unwrap();
        assert_eq!(fetcher.timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let origin = Url::parse("http://127.0.0.1:9/").unwrap();
        let fetcher =
            HttpFetcher::with_timeout(&origin, NetworkConfig::QUICK_REQUEST_TIMEOUT).unwrap();
        let request = Request::get("http://127.0.0.1:9/").unwrap();

        let err = fetcher.fetch(&request).await.unwrap_err();
        assert!(err.is_network());
    }
}
