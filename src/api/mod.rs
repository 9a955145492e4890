//! Outbound HTTP with bounded retry
//!
//! - [`ApiClient`]: base URL + default headers + retry ceiling
//! - [`HttpTransport`]: the single-attempt fetch primitive ([`ReqwestTransport`] in production)
//! - [`RequestBody`]: JSON or form-encoded request bodies

pub mod body;
pub mod client;
pub mod error;
pub mod retry;
pub mod transport;

pub use body::{FieldValue, Fields, RequestBody, FORM_CONTENT_TYPE};
pub use client::{ApiClient, Headers};
pub use error::{ApiError, AttemptError, TransportError};
pub use transport::{
    HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport, SharedTransport,
};
