//! Request and response models shared by the router, the cache store and the
//! network fetcher.
//!
//! Methods, status codes and headers are the `http` crate's types, the same
//! ones reqwest and axum speak.

mod request;
mod response;

pub use http::header::{self, HeaderMap, HeaderName, HeaderValue};
pub use http::{Method, StatusCode};
pub use request::*;
pub use response::*;
