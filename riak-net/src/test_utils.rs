//! Scripted transport for exercising the client without a server

use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::{Headers, HttpResponse, Method, Transport, TransportError};

/// A request as the transport received it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Replays queued responses in order and records every request
///
/// When the queue runs dry the transport reports a connection failure.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: HttpResponse) -> &Self {
        lock(&self.responses).push_back(Ok(response));
        self
    }

    /// Queue a response from a status, header pairs and body
    pub fn push_response(&self, status: u16, headers: &[(&str, &str)], body: impl Into<Bytes>) -> &Self {
        let headers: Headers = headers.iter().copied().collect();
        self.push(HttpResponse::new(status, headers, body))
    }

    /// Queue a response given as raw HTTP text
    pub fn push_raw(&self, raw: &str) -> Result<&Self, TransportError> {
        let response = HttpResponse::parse(raw.as_bytes())?;
        Ok(self.push(response))
    }

    /// Queue a transport-level failure
    pub fn push_failure(&self) -> &Self {
        lock(&self.responses).push_back(Err(TransportError::Connect("connection refused".to_string())));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        lock(&self.requests).last().cloned()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.responses).len()
    }
}

impl Transport for MockTransport {
    fn request(
        &self,
        method: Method,
        url: &str,
        headers: &Headers,
        body: Bytes,
    ) -> Result<HttpResponse, TransportError> {
        lock(&self.requests).push(RecordedRequest {
            method,
            url: url.to_string(),
            headers: headers.clone(),
            body,
        });

        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("no scripted response".to_string())))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_in_order_and_records() {
        let transport = MockTransport::new();
        transport.push_response(200, &[("Content-Type", "text/plain")], "one");
        transport.push_failure();

        let first = transport
            .request(Method::Get, "http://x/1", &Headers::new(), Bytes::new())
            .unwrap();
        assert_eq!(first.status, 200);
        assert_eq!(&first.body[..], b"one");

        assert!(transport
            .request(Method::Delete, "http://x/2", &Headers::new(), Bytes::new())
            .is_err());
        assert!(transport
            .request(Method::Get, "http://x/3", &Headers::new(), Bytes::new())
            .is_err());

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].method, Method::Delete);
        assert_eq!(requests[2].url, "http://x/3");
    }

    #[test]
    fn test_push_raw() {
        let transport = MockTransport::new();
        transport
            .push_raw("HTTP/1.1 404 Object Not Found\r\nServer: test\r\n\r\nnot found\n")
            .unwrap();
        assert_eq!(transport.remaining(), 1);
        let response = transport
            .request(Method::Get, "http://x", &Headers::new(), Bytes::new())
            .unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.headers.get("server"), Some("test"));
    }
}
