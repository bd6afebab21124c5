//! Main client implementation

use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use riak_core::*;
use riak_net::{build_ping_path, build_rest_path, Headers, HttpResponse, Method, Transport};

use crate::{Bucket, HyperTransport, MapReduce, RiakObject};

/// Entry point for talking to a Riak node over HTTP
///
/// Cloning is cheap; clones share the transport but carry their own copy of
/// the configuration.
#[derive(Clone)]
pub struct RiakClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl RiakClient {
    /// Create a client backed by the blocking hyper transport
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HyperTransport::new().map_err(|e| {
            warn!("Failed to start HTTP transport: {}", e);
            RiakError::TransportUnavailable { url: config.base_url() }
        })?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over any transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        RiakClient {
            config: Arc::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn r(&self) -> u32 {
        self.config.quorum.r
    }

    pub fn set_r(&mut self, r: u32) -> &mut Self {
        Arc::make_mut(&mut self.config).quorum.r = r;
        self
    }

    pub fn w(&self) -> u32 {
        self.config.quorum.w
    }

    pub fn set_w(&mut self, w: u32) -> &mut Self {
        Arc::make_mut(&mut self.config).quorum.w = w;
        self
    }

    pub fn dw(&self) -> u32 {
        self.config.quorum.dw
    }

    pub fn set_dw(&mut self, dw: u32) -> &mut Self {
        Arc::make_mut(&mut self.config).quorum.dw = dw;
        self
    }

    pub fn rw(&self) -> u32 {
        self.config.quorum.rw
    }

    pub fn set_rw(&mut self, rw: u32) -> &mut Self {
        Arc::make_mut(&mut self.config).quorum.rw = rw;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    /// Replace the generated client id. Writers sharing an id are
    /// indistinguishable to the server's conflict tracking.
    pub fn set_client_id(&mut self, client_id: impl Into<String>) -> &mut Self {
        Arc::make_mut(&mut self.config).client_id = client_id.into();
        self
    }

    /// Buckets always exist on the server, so this never fails
    pub fn bucket(&self, name: impl Into<String>) -> Bucket {
        Bucket::new(self.clone(), name)
    }

    /// List every bucket holding data. Expensive on the server.
    pub fn buckets(&self) -> Result<Vec<Bucket>> {
        let url = build_rest_path(&self.config, None, None, &[], &[("buckets", "true".to_string())]);
        let response = self.send(Method::Get, &url, &Headers::new(), Bytes::new());
        let value = decode_json_response(response, &url, &[200])?;

        let names = value
            .get("buckets")
            .and_then(Value::as_array)
            .ok_or_else(|| RiakError::MalformedPayload("missing 'buckets' list".to_string()))?;

        Ok(names
            .iter()
            .filter_map(Value::as_str)
            .map(|name| self.bucket(name))
            .collect())
    }

    /// True when the node answers its ping endpoint with `OK`
    pub fn is_alive(&self) -> bool {
        let url = build_ping_path(&self.config);
        match self.send(Method::Get, &url, &Headers::new(), Bytes::new()) {
            Some(response) => response.body_text().trim() == "OK",
            None => false,
        }
    }

    /// Fetch the JSON object a link points at
    pub fn get_link(&self, link: &Link) -> Result<RiakObject> {
        self.bucket(link.bucket.as_str()).get(&link.key, None)
    }

    /// Start a map/reduce job over a whole bucket
    pub fn add_bucket(&self, bucket: impl Into<String>) -> Result<MapReduce> {
        MapReduce::new(self.clone()).add_bucket(bucket)
    }

    /// Start a map/reduce job over one stored object
    pub fn add_object(&self, object: &RiakObject) -> Result<MapReduce> {
        MapReduce::new(self.clone()).add_object(object)
    }

    /// Start a map/reduce job over one bucket/key pair with optional key data
    pub fn add_bucket_key_data(
        &self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        data: Value,
    ) -> Result<MapReduce> {
        MapReduce::new(self.clone()).add_bucket_key_data(bucket, key, data)
    }

    /// Start a map/reduce job fed by a full-text search query
    pub fn search(&self, bucket: impl Into<String>, query: impl Into<String>) -> Result<MapReduce> {
        MapReduce::new(self.clone()).search(bucket, query)
    }

    /// Issue one request. A transport failure is reported as `None`.
    pub(crate) fn send(
        &self,
        method: Method,
        url: &str,
        headers: &Headers,
        body: Bytes,
    ) -> Option<HttpResponse> {
        debug!("{} {}", method, url);
        match self.transport.request(method, url, headers, body) {
            Ok(response) => {
                debug!("{} {} -> {}", method, url, response.status);
                Some(response)
            }
            Err(e) => {
                warn!("No response for {} {}: {}", method, url, e);
                None
            }
        }
    }
}

impl std::fmt::Debug for RiakClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiakClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Check the status of a response that is not interpreted through an
/// object, then decode its body as JSON
pub(crate) fn decode_json_response(
    response: Option<HttpResponse>,
    url: &str,
    expected: &[u16],
) -> Result<Value> {
    let response = response.ok_or_else(|| RiakError::TransportUnavailable {
        url: url.to_string(),
    })?;

    if response.status == 0 {
        return Err(RiakError::ServerUnreachable);
    }
    if !expected.contains(&response.status) {
        return Err(RiakError::UnexpectedStatus {
            expected: expected.to_vec(),
            actual: response.status,
            body: response.body_text(),
        });
    }

    serde_json::from_slice(&response.body).map_err(|e| RiakError::MalformedPayload(e.to_string()))
}
