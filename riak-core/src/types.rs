//! Core data types shared by the transport and client layers

use serde::{Deserialize, Serialize};

/// Secondary index value type, encoded as a suffix on the index name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexType {
    /// `_bin` indexes hold arbitrary strings
    Binary,
    /// `_int` indexes hold integers
    Integer,
}

impl IndexType {
    /// Wire suffix without the leading underscore
    pub fn suffix(&self) -> &'static str {
        match self {
            IndexType::Binary => "bin",
            IndexType::Integer => "int",
        }
    }

    /// Full index name as the server expects it, e.g. `email_bin`. Index
    /// names are case-insensitive on the wire, so they are lower-cased.
    pub fn index_name(&self, name: &str) -> String {
        format!("{}_{}", name.to_ascii_lowercase(), self.suffix())
    }

    /// Recover the type from a full index name
    pub fn from_index_name(index: &str) -> Option<Self> {
        if index.ends_with("_bin") {
            Some(IndexType::Binary)
        } else if index.ends_with("_int") {
            Some(IndexType::Integer)
        } else {
            None
        }
    }
}

impl std::fmt::Display for IndexType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// A link from one object to another, optionally tagged
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub bucket: String,
    pub key: String,
    tag: Option<String>,
}

impl Link {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, tag: Option<String>) -> Self {
        Link {
            bucket: bucket.into(),
            key: key.into(),
            tag,
        }
    }

    /// Tag of this link; an untagged link is tagged with its bucket name
    pub fn tag(&self) -> &str {
        self.tag.as_deref().unwrap_or(&self.bucket)
    }

    /// Tag exactly as given, without the bucket fallback
    pub fn raw_tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn set_tag(&mut self, tag: Option<String>) {
        self.tag = tag;
    }

    /// Two links are interchangeable when bucket, key and effective tag agree
    pub fn same_target(&self, other: &Link) -> bool {
        self.bucket == other.bucket && self.key == other.key && self.tag() == other.tag()
    }
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} ({})", self.bucket, self.key, self.tag())
    }
}

/// One step of a link-walk URL: `bucket,tag,keep`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSpec {
    pub bucket: String,
    pub tag: String,
    pub keep: bool,
}

impl LinkSpec {
    pub fn new(bucket: impl Into<String>, tag: impl Into<String>, keep: bool) -> Self {
        LinkSpec {
            bucket: bucket.into(),
            tag: tag.into(),
            keep,
        }
    }

    /// Matches any bucket and any tag
    pub fn any(keep: bool) -> Self {
        Self::new("_", "_", keep)
    }
}

/// Client-wide quorum defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumDefaults {
    pub r: u32,
    pub w: u32,
    pub dw: u32,
    pub rw: u32,
}

impl Default for QuorumDefaults {
    fn default() -> Self {
        QuorumDefaults { r: 2, w: 2, dw: 2, rw: 2 }
    }
}

/// Per-bucket quorum overrides; unset values fall back to the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quorum {
    pub r: Option<u32>,
    pub w: Option<u32>,
    pub dw: Option<u32>,
    pub rw: Option<u32>,
}

impl Quorum {
    pub fn resolve_r(&self, explicit: Option<u32>, defaults: &QuorumDefaults) -> u32 {
        explicit.or(self.r).unwrap_or(defaults.r)
    }

    pub fn resolve_w(&self, explicit: Option<u32>, defaults: &QuorumDefaults) -> u32 {
        explicit.or(self.w).unwrap_or(defaults.w)
    }

    pub fn resolve_dw(&self, explicit: Option<u32>, defaults: &QuorumDefaults) -> u32 {
        explicit.or(self.dw).unwrap_or(defaults.dw)
    }

    pub fn resolve_rw(&self, explicit: Option<u32>, defaults: &QuorumDefaults) -> u32 {
        explicit.or(self.rw).unwrap_or(defaults.rw)
    }
}
