//! Response snapshot model.

use bytes::Bytes;
use http::header::{AsHeaderName, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Response tainting, as a browser would classify it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response with readable body and headers.
    #[default]
    Basic,
    /// Cross-origin response that passed CORS.
    Cors,
    /// Cross-origin response whose contents cannot be verified.
    Opaque,
    /// Network error placeholder.
    Error,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Opaque => "opaque",
            ResponseType::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "basic" => ResponseType::Basic,
            "cors" => ResponseType::Cors,
            "opaque" => ResponseType::Opaque,
            _ => ResponseType::Error,
        }
    }
}

/// An HTTP response as seen by the router.
///
/// The body is a `Bytes` buffer, so `clone()` shares the payload instead of
/// copying it. Cache writes always take a clone and hand the original back to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub response_type: ResponseType,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// Create a basic response with the given status and no body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            response_type: ResponseType::Basic,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// 200 OK with a body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK).with_body(body)
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// First value of a header, if it is visible ASCII.
    pub fn header(&self, name: impl AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Status in the 200-299 range.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    /// Whether this response may be written to a cache namespace.
    ///
    /// Only exact 200 responses of basic (same-origin, non-opaque) type
    /// qualify, so error pages and unverifiable cross-origin payloads are never
    /// stored.
    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK && self.response_type == ResponseType::Basic
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cacheable_requires_200_basic() {
        assert!(Response::ok("hello").is_cacheable());
        assert!(!Response::new(StatusCode::NOT_FOUND).is_cacheable());
        assert!(!Response::new(StatusCode::NO_CONTENT).is_cacheable());
        assert!(!Response::ok("x").with_type(ResponseType::Opaque).is_cacheable());
        assert!(!Response::ok("x").with_type(ResponseType::Cors).is_cacheable());
    }

    #[test]
    fn test_is_ok_range() {
        assert!(Response::new(StatusCode::OK).is_ok());
        assert!(Response::new(StatusCode::NO_CONTENT).is_ok());
        assert!(!Response::new(StatusCode::NOT_MODIFIED).is_ok());
        assert!(!Response::new(StatusCode::INTERNAL_SERVER_ERROR).is_ok());
    }

    #[test]
    fn test_clone_shares_body() {
        let original = Response::ok(vec![1u8; 1024]);
        let copy = original.clone();
        assert_eq!(original.body.as_ptr(), copy.body.as_ptr());
    }

    #[test]
    fn test_response_type_roundtrip() {
        for ty in [
            ResponseType::Basic,
            ResponseType::Cors,
            ResponseType::Opaque,
            ResponseType::Error,
        ] {
            assert_eq!(ResponseType::parse(ty.as_str()), ty);
        }
    }
}
