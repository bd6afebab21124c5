//! Error types for the Riak client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiakError {
    #[error("Transport unavailable: no response for {url}")]
    TransportUnavailable { url: String },

    #[error("Could not contact the server (status 0)")]
    ServerUnreachable,

    #[error("Expected status {expected:?}, received {actual}: {body}")]
    UnexpectedStatus {
        expected: Vec<u16>,
        actual: u16,
        body: String,
    },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Error getting properties for bucket '{bucket}'")]
    PropertyFetchFailed { bucket: String },

    #[error("Error setting properties for bucket '{bucket}' (status {status:?})")]
    PropertySetFailed { bucket: String, status: Option<u16> },

    #[error("Error listing keys for bucket '{bucket}'")]
    KeyListFailed { bucket: String },

    #[error("Error searching index '{index}' on bucket '{bucket}'")]
    IndexSearchFailed { bucket: String, index: String },

    #[error("No sibling at position {index} ({count} siblings)")]
    SiblingNotFound { index: usize, count: usize },

    #[error("Invalid map/reduce input mode: {0}")]
    InvalidInputMode(String),

    #[error("Invalid map/reduce query combination: {0}")]
    InvalidQueryCombination(String),

    #[error("Auto indexes require a JSON-encoded object: {0}")]
    UnsupportedAutoIndexType(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RiakError {
    /// True for the errors that mean no HTTP exchange took place
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            RiakError::TransportUnavailable { .. } | RiakError::ServerUnreachable
        )
    }
}
