//! Client configuration

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{QuorumDefaults, RiakError};

/// Connection and default settings shared by every request a client issues
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Path prefix of the key/value interface
    pub prefix: String,
    /// Path of the map/reduce endpoint
    pub mapred_prefix: String,
    /// Path prefix of the secondary index interface
    pub index_prefix: String,
    pub quorum: QuorumDefaults,
    /// Attributes writes to this client for conflict bookkeeping
    pub client_id: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: "127.0.0.1".to_string(),
            port: 8098,
            prefix: "riak".to_string(),
            mapred_prefix: "mapred".to_string(),
            index_prefix: "buckets".to_string(),
            quorum: QuorumDefaults::default(),
            client_id: generate_client_id(),
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ClientConfig {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RiakError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| RiakError::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_mapred_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.mapred_prefix = prefix.into();
        self
    }

    pub fn with_index_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.index_prefix = prefix.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_quorum(mut self, quorum: QuorumDefaults) -> Self {
        self.quorum = quorum;
        self
    }

    /// `http://host:port`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Random `rust_<base36>` identifier
pub fn generate_client_id() -> String {
    let mut n: u64 = rand::thread_rng().gen_range(0..(1u64 << 31));
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut digits = Vec::new();
    loop {
        digits.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    digits.reverse();
    format!("rust_{}", String::from_utf8_lossy(&digits))
}
