//! Stored objects: one value (or conflict set) at a bucket and key

use bytes::Bytes;
use serde_json::Value;
use std::collections::BTreeMap;

use riak_core::*;
use riak_net::{build_rest_path, Headers, Method};

use crate::{Bucket, MapReduce, PhaseFunction, PhaseOptions, RiakClient};

pub(crate) const JSON_CONTENT_TYPE: &str = "application/json";
pub(crate) const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// How an object's body is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Body is JSON, decoded into a [`Value`] on successful reads
    Json,
    /// Body is kept as raw bytes
    Binary,
}

/// The value an object carries
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Binary(Bytes),
}

impl Payload {
    pub(crate) fn empty(encoding: Encoding) -> Self {
        match encoding {
            Encoding::Json => Payload::Json(Value::Null),
            Encoding::Binary => Payload::Binary(Bytes::new()),
        }
    }

    /// Bytes to send when storing this value
    pub(crate) fn to_body(&self) -> Result<Bytes> {
        match self {
            Payload::Json(value) => Ok(Bytes::from(serde_json::to_vec(value)?)),
            Payload::Binary(bytes) => Ok(bytes.clone()),
        }
    }
}

/// One version of a value at a bucket and key, or a set of conflicting
/// versions ("siblings")
///
/// The object is both the read and the write buffer of a
/// read-modify-write cycle. Every server round trip replaces its whole state
/// with what the server answered. Not meant to be shared between concurrent
/// operations.
#[derive(Debug, Clone)]
pub struct RiakObject {
    pub(crate) bucket: Bucket,
    pub(crate) key: Option<String>,
    pub(crate) encoding: Encoding,
    pub(crate) value: Payload,
    pub(crate) body: Bytes,
    pub(crate) content_type: String,
    pub(crate) vclock: Option<String>,
    pub(crate) headers: Headers,
    pub(crate) status: Option<u16>,
    pub(crate) links: Vec<Link>,
    pub(crate) indexes: BTreeMap<String, Vec<String>>,
    /// index name -> JSON field the index is derived from
    pub(crate) auto_indexes: BTreeMap<String, String>,
    pub(crate) meta: BTreeMap<String, String>,
    pub(crate) siblings: Vec<String>,
    pub(crate) exists: bool,
}

impl RiakObject {
    pub fn new(bucket: Bucket, key: Option<String>, encoding: Encoding) -> Self {
        RiakObject {
            bucket,
            key,
            encoding,
            value: Payload::empty(encoding),
            body: Bytes::new(),
            content_type: default_content_type(encoding).to_string(),
            vclock: None,
            headers: Headers::new(),
            status: None,
            links: Vec::new(),
            indexes: BTreeMap::new(),
            auto_indexes: BTreeMap::new(),
            meta: BTreeMap::new(),
            siblings: Vec::new(),
            exists: false,
        }
    }

    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    pub(crate) fn client(&self) -> &RiakClient {
        self.bucket.client()
    }

    /// `None` until the server assigns one on first store
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn value(&self) -> &Payload {
        &self.value
    }

    /// Decoded JSON value, if this object carries one
    pub fn data(&self) -> Option<&Value> {
        match &self.value {
            Payload::Json(value) => Some(value),
            Payload::Binary(_) => None,
        }
    }

    pub fn set_data(&mut self, data: Value) -> &mut Self {
        self.value = Payload::Json(data);
        self
    }

    /// Raw bytes of a binary object
    pub fn binary(&self) -> Option<&Bytes> {
        match &self.value {
            Payload::Binary(bytes) => Some(bytes),
            Payload::Json(_) => None,
        }
    }

    pub fn set_binary(&mut self, data: impl Into<Bytes>) -> &mut Self {
        self.value = Payload::Binary(data.into());
        self
    }

    /// Body of the last response, undecoded
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) -> &mut Self {
        self.content_type = content_type.into();
        self
    }

    /// Opaque causality token from the last read
    pub fn vclock(&self) -> Option<&str> {
        self.vclock.as_deref()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// HTTP status of the last response
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    // Links

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Add a link, replacing an existing link to the same target and tag
    pub fn add_link(&mut self, link: Link) -> &mut Self {
        self.remove_link(&link);
        self.links.push(link);
        self
    }

    pub fn remove_link(&mut self, link: &Link) -> &mut Self {
        self.links.retain(|l| !l.same_target(link));
        self
    }

    /// A link pointing at this object; `None` before a key is known
    pub fn to_link(&self, tag: Option<String>) -> Option<Link> {
        self.key
            .as_ref()
            .map(|key| Link::new(self.bucket.name(), key.clone(), tag))
    }

    // Secondary indexes

    pub fn indexes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.indexes
    }

    pub fn index_values(&self, name: &str, index_type: IndexType) -> &[String] {
        self.indexes
            .get(&index_type.index_name(name))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn add_index(&mut self, name: &str, index_type: IndexType, value: impl Into<String>) -> &mut Self {
        let values = self.indexes.entry(index_type.index_name(name)).or_default();
        let value = value.into();
        if !values.contains(&value) {
            values.push(value);
        }
        self
    }

    pub fn remove_index(&mut self, name: &str, index_type: IndexType, value: &str) -> &mut Self {
        let index = index_type.index_name(name);
        if let Some(values) = self.indexes.get_mut(&index) {
            values.retain(|v| v != value);
            if values.is_empty() {
                self.indexes.remove(&index);
            }
        }
        self
    }

    /// Drop every value of one index
    pub fn clear_index(&mut self, name: &str, index_type: IndexType) -> &mut Self {
        self.indexes.remove(&index_type.index_name(name));
        self
    }

    pub fn remove_all_indexes(&mut self) -> &mut Self {
        self.indexes.clear();
        self
    }

    // Auto indexes

    pub fn auto_indexes(&self) -> &BTreeMap<String, String> {
        &self.auto_indexes
    }

    /// Index `field` of the JSON value under an index of the same name
    ///
    /// The index name always carries its type suffix (`category_bin`);
    /// untyped index names are not supported. Index names are lower-cased,
    /// field names are matched as given.
    pub fn add_auto_index(&mut self, field: &str, index_type: IndexType) -> Result<&mut Self> {
        self.add_auto_index_as(field, field, index_type)
    }

    /// Index `field` of the JSON value under `index_name`
    pub fn add_auto_index_as(
        &mut self,
        field: &str,
        index_name: &str,
        index_type: IndexType,
    ) -> Result<&mut Self> {
        if self.encoding != Encoding::Json {
            return Err(RiakError::UnsupportedAutoIndexType(format!(
                "cannot auto-index field '{}' of a binary object",
                field
            )));
        }
        self.auto_indexes
            .insert(index_type.index_name(index_name), field.to_string());
        Ok(self)
    }

    pub fn remove_auto_index(&mut self, index_name: &str, index_type: IndexType) -> &mut Self {
        self.auto_indexes.remove(&index_type.index_name(index_name));
        self
    }

    pub fn remove_all_auto_indexes(&mut self) -> &mut Self {
        self.auto_indexes.clear();
        self
    }

    // Metadata
    //
    // Header names do not keep their case over HTTP, so metadata names are
    // lower-cased on every access.

    pub fn meta(&self, name: &str) -> Option<&str> {
        self.meta.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn all_meta(&self) -> &BTreeMap<String, String> {
        &self.meta
    }

    /// Set a user metadata entry; an empty value is not sent
    pub fn set_meta(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.meta.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn remove_meta(&mut self, name: &str) -> &mut Self {
        self.meta.remove(&name.to_ascii_lowercase());
        self
    }

    pub fn remove_all_meta(&mut self) -> &mut Self {
        self.meta.clear();
        self
    }

    // Siblings

    pub fn has_siblings(&self) -> bool {
        !self.siblings.is_empty()
    }

    pub fn sibling_count(&self) -> usize {
        self.siblings.len()
    }

    /// Version tags of the conflicting values
    pub fn sibling_tags(&self) -> &[String] {
        &self.siblings
    }

    /// Fetch one sibling by position as a standalone object
    pub fn sibling(&self, index: usize, r: Option<u32>) -> Result<RiakObject> {
        let vtag = self.siblings.get(index).ok_or(RiakError::SiblingNotFound {
            index,
            count: self.siblings.len(),
        })?;

        let r = self.bucket.resolve_r(r);
        let params = [("r", r.to_string()), ("vtag", vtag.clone())];
        let url = build_rest_path(
            self.client().config(),
            Some(self.bucket.name()),
            self.key.as_deref(),
            &[],
            &params,
        );

        let mut sibling = RiakObject::new(self.bucket.clone(), self.key.clone(), self.encoding);
        let response = self.client().send(Method::Get, &url, &Headers::new(), Bytes::new());
        let reached = response.is_some();
        sibling.populate(response, &[200])?;
        if !reached {
            return Err(RiakError::TransportUnavailable { url });
        }
        Ok(sibling)
    }

    /// Fetch every sibling
    pub fn siblings(&self, r: Option<u32>) -> Result<Vec<RiakObject>> {
        (0..self.siblings.len()).map(|i| self.sibling(i, r)).collect()
    }

    // Server round trips

    /// Re-read the object. When the read reports siblings, the value of the
    /// first one is loaded; the sibling tags stay available.
    pub fn reload(&mut self, r: Option<u32>) -> Result<&mut Self> {
        let r = self.bucket.resolve_r(r);
        let params = [("r", r.to_string())];
        let url = build_rest_path(
            self.client().config(),
            Some(self.bucket.name()),
            self.key.as_deref(),
            &[],
            &params,
        );

        let response = self.client().send(Method::Get, &url, &Headers::new(), Bytes::new());
        let reached = response.is_some();
        self.populate(response, &[200, 300, 404])?;
        if !reached {
            return Err(RiakError::TransportUnavailable { url });
        }

        if self.has_siblings() {
            let first = self.sibling(0, Some(r))?;
            self.value = first.value;
            self.body = first.body;
            self.content_type = first.content_type;
        }
        Ok(self)
    }

    /// Write the object and adopt the server's post-write view of it,
    /// including a server-assigned key or a conflict
    pub fn store(&mut self, w: Option<u32>, dw: Option<u32>) -> Result<&mut Self> {
        let w = self.bucket.resolve_w(w);
        let dw = self.bucket.resolve_dw(dw);
        let params = [
            ("returnbody", "true".to_string()),
            ("w", w.to_string()),
            ("dw", dw.to_string()),
        ];
        let url = build_rest_path(
            self.client().config(),
            Some(self.bucket.name()),
            self.key.as_deref(),
            &[],
            &params,
        );

        let headers = self.write_headers()?;
        let body = self.value.to_body()?;
        let method = if self.key.is_some() { Method::Put } else { Method::Post };

        let response = self.client().send(method, &url, &headers, body);
        let reached = response.is_some();
        self.populate(response, &[200, 201, 300])?;
        if !reached {
            return Err(RiakError::TransportUnavailable { url });
        }
        Ok(self)
    }

    /// Delete the object. A missing object counts as deleted.
    pub fn delete(&mut self, rw: Option<u32>) -> Result<&mut Self> {
        let rw = self.bucket.resolve_rw(rw);
        let params = [("rw", rw.to_string())];
        let url = build_rest_path(
            self.client().config(),
            Some(self.bucket.name()),
            self.key.as_deref(),
            &[],
            &params,
        );

        let response = self.client().send(Method::Delete, &url, &Headers::new(), Bytes::new());
        let reached = response.is_some();
        self.populate(response, &[204, 404])?;
        if !reached {
            return Err(RiakError::TransportUnavailable { url });
        }
        self.clear();
        Ok(self)
    }

    // Link walking

    /// Start a map/reduce job at this object that follows its links
    pub fn walk_link(&self, bucket: &str, tag: &str, keep: bool) -> Result<MapReduce> {
        Ok(self.client().add_object(self)?.link(bucket, tag, keep))
    }

    /// Start a map/reduce job at this object with a map phase
    pub fn map(&self, function: impl Into<PhaseFunction>, options: PhaseOptions) -> Result<MapReduce> {
        Ok(self.client().add_object(self)?.map(function, options))
    }

    /// Start a map/reduce job at this object with a reduce phase
    pub fn reduce(&self, function: impl Into<PhaseFunction>, options: PhaseOptions) -> Result<MapReduce> {
        Ok(self.client().add_object(self)?.reduce(function, options))
    }
}

pub(crate) fn default_content_type(encoding: Encoding) -> &'static str {
    match encoding {
        Encoding::Json => JSON_CONTENT_TYPE,
        Encoding::Binary => BINARY_CONTENT_TYPE,
    }
}
