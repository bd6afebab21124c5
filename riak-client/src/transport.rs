//! Blocking HTTP/1.1 transport on hyper

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::runtime::Runtime;
use tracing::trace;

use riak_net::{Headers, HttpResponse, Method, Transport, TransportError};

/// Sends each request on a fresh connection and waits for the full response
///
/// Owns a single-threaded tokio runtime to drive hyper. Must not be called
/// from inside another tokio runtime.
pub struct HyperTransport {
    runtime: Runtime,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HyperTransport {
    pub fn new() -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TransportError::Runtime(e.to_string()))?;

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build_http();

        Ok(HyperTransport { runtime, client })
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        headers: &Headers,
        body: Bytes,
    ) -> Result<HttpResponse, TransportError> {
        let mut builder = hyper::Request::builder()
            .method(to_hyper_method(method))
            .uri(url);
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }
        let request = builder
            .body(Full::new(body))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status().as_u16();
        let mut response_headers = Headers::new();
        for (name, value) in response.headers() {
            response_headers.append(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?
            .to_bytes();

        trace!("Received {} bytes with status {}", body.len(), status);
        Ok(HttpResponse::new(status, response_headers, body))
    }
}

impl Transport for HyperTransport {
    fn request(
        &self,
        method: Method,
        url: &str,
        headers: &Headers,
        body: Bytes,
    ) -> Result<HttpResponse, TransportError> {
        self.runtime.block_on(self.execute(method, url, headers, body))
    }
}

fn to_hyper_method(method: Method) -> hyper::Method {
    match method {
        Method::Get => hyper::Method::GET,
        Method::Post => hyper::Method::POST,
        Method::Put => hyper::Method::PUT,
        Method::Delete => hyper::Method::DELETE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_mapping() {
        assert_eq!(to_hyper_method(Method::Get), hyper::Method::GET);
        assert_eq!(to_hyper_method(Method::Delete), hyper::Method::DELETE);
    }

    #[test]
    fn test_connection_refused_is_an_error() {
        let transport = HyperTransport::new().unwrap();
        // Port 1 is reserved and nothing listens there
        let result = transport.request(Method::Get, "http://127.0.0.1:1/ping", &Headers::new(), Bytes::new());
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let transport = HyperTransport::new().unwrap();
        let result = transport.request(Method::Get, "not a url", &Headers::new(), Bytes::new());
        assert!(matches!(result, Err(TransportError::InvalidRequest(_))));
    }
}
