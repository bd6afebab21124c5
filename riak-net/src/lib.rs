//! HTTP plumbing for the Riak client: the transport contract, header codec
//! and REST path construction

use bytes::Bytes;

pub mod protocol;
pub mod wire;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use protocol::*;
pub use wire::*;

/// HTTP methods the REST interface uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw response as handed back by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// `0` when the transport completed without obtaining a status
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, headers: Headers, body: impl Into<Bytes>) -> Self {
        HttpResponse {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Body as text, replacing invalid UTF-8
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport failure; the client turns these into "no response"
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Body error: {0}")]
    Body(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// A blocking HTTP request primitive
///
/// Implementations perform exactly one exchange per call and never retry.
pub trait Transport: Send + Sync {
    fn request(
        &self,
        method: Method,
        url: &str,
        headers: &Headers,
        body: Bytes,
    ) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn request(
        &self,
        method: Method,
        url: &str,
        headers: &Headers,
        body: Bytes,
    ) -> Result<HttpResponse, TransportError> {
        (**self).request(method, url, headers, body)
    }
}
