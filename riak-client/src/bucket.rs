//! Buckets: object factories, bucket properties, key listing and index
//! queries

use bytes::Bytes;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tracing::debug;

use riak_core::*;
use riak_net::{build_index_path, build_rest_path, decode, Headers, Method, CONTENT_TYPE_HEADER};

use crate::object::JSON_CONTENT_TYPE;
use crate::{Encoding, RiakClient, RiakObject};

/// A named bucket with optional quorum overrides
#[derive(Debug, Clone)]
pub struct Bucket {
    client: RiakClient,
    name: String,
    quorum: Quorum,
}

impl Bucket {
    pub(crate) fn new(client: RiakClient, name: impl Into<String>) -> Self {
        Bucket {
            client,
            name: name.into(),
            quorum: Quorum::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &RiakClient {
        &self.client
    }

    pub fn quorum(&self) -> &Quorum {
        &self.quorum
    }

    /// Override R for reads through this bucket; `None` restores the
    /// client default
    pub fn set_r(&mut self, r: Option<u32>) -> &mut Self {
        self.quorum.r = r;
        self
    }

    pub fn set_w(&mut self, w: Option<u32>) -> &mut Self {
        self.quorum.w = w;
        self
    }

    pub fn set_dw(&mut self, dw: Option<u32>) -> &mut Self {
        self.quorum.dw = dw;
        self
    }

    pub fn set_rw(&mut self, rw: Option<u32>) -> &mut Self {
        self.quorum.rw = rw;
        self
    }

    pub fn resolve_r(&self, r: Option<u32>) -> u32 {
        self.quorum.resolve_r(r, &self.client.config().quorum)
    }

    pub fn resolve_w(&self, w: Option<u32>) -> u32 {
        self.quorum.resolve_w(w, &self.client.config().quorum)
    }

    pub fn resolve_dw(&self, dw: Option<u32>) -> u32 {
        self.quorum.resolve_dw(dw, &self.client.config().quorum)
    }

    pub fn resolve_rw(&self, rw: Option<u32>) -> u32 {
        self.quorum.resolve_rw(rw, &self.client.config().quorum)
    }

    /// A new object whose value is stored as JSON. Without a key the server
    /// assigns one on first store.
    pub fn new_object(&self, key: Option<&str>, data: Value) -> RiakObject {
        let mut object = RiakObject::new(self.clone(), key.map(str::to_string), Encoding::Json);
        object.set_data(data).set_content_type(JSON_CONTENT_TYPE);
        object
    }

    /// A new object stored as raw bytes under the given content type
    pub fn new_binary(&self, key: Option<&str>, data: impl Into<Bytes>, content_type: &str) -> RiakObject {
        let mut object = RiakObject::new(self.clone(), key.map(str::to_string), Encoding::Binary);
        object.set_binary(data).set_content_type(content_type);
        object
    }

    /// Fetch a JSON object. A missing key yields an object whose
    /// [`RiakObject::exists`] is false.
    pub fn get(&self, key: &str, r: Option<u32>) -> Result<RiakObject> {
        let mut object = RiakObject::new(self.clone(), Some(key.to_string()), Encoding::Json);
        object.reload(r)?;
        Ok(object)
    }

    /// Fetch an object as raw bytes
    pub fn get_binary(&self, key: &str, r: Option<u32>) -> Result<RiakObject> {
        let mut object = RiakObject::new(self.clone(), Some(key.to_string()), Encoding::Binary);
        object.reload(r)?;
        Ok(object)
    }

    // Properties

    /// Replication factor. Set it once, before writing any data.
    pub fn set_n_val(&self, n_val: u32) -> Result<()> {
        self.set_property("n_val", json!(n_val))
    }

    pub fn n_val(&self) -> Result<Option<u64>> {
        Ok(self.property("n_val")?.and_then(|v| v.as_u64()))
    }

    /// Keep conflicting writes as siblings instead of last-write-wins
    pub fn set_allow_multiples(&self, allow: bool) -> Result<()> {
        self.set_property("allow_mult", json!(allow))
    }

    pub fn allow_multiples(&self) -> Result<bool> {
        Ok(match self.property("allow_mult")? {
            Some(Value::Bool(allow)) => allow,
            Some(Value::String(s)) => s == "true",
            _ => false,
        })
    }

    pub fn set_property(&self, name: &str, value: Value) -> Result<()> {
        let mut props = Map::new();
        props.insert(name.to_string(), value);
        self.set_properties(props)
    }

    pub fn property(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.properties()?.remove(name))
    }

    /// Read every bucket property
    pub fn properties(&self) -> Result<Map<String, Value>> {
        let params = [("props", "true".to_string()), ("keys", "false".to_string())];
        let object = self.fetch_listing(&params)?;
        if !object.exists() {
            return Err(RiakError::PropertyFetchFailed {
                bucket: self.name.clone(),
            });
        }

        match object.data().and_then(|data| data.get("props")) {
            Some(Value::Object(props)) => Ok(props.clone()),
            _ => Err(RiakError::PropertyFetchFailed {
                bucket: self.name.clone(),
            }),
        }
    }

    /// Write several bucket properties at once
    pub fn set_properties(&self, props: Map<String, Value>) -> Result<()> {
        let url = build_rest_path(self.client.config(), Some(&self.name), None, &[], &[]);
        let mut headers = Headers::new();
        headers.append(CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE);
        let body = serde_json::to_vec(&json!({ "props": props }))?;

        let response = self.client.send(Method::Put, &url, &headers, Bytes::from(body));
        match response.map(|r| r.status) {
            Some(204) => Ok(()),
            status => Err(RiakError::PropertySetFailed {
                bucket: self.name.clone(),
                status,
            }),
        }
    }

    /// Every key in the bucket, percent-decoded
    ///
    /// The server walks the whole bucket to answer; expect this to be slow.
    pub fn keys(&self) -> Result<Vec<String>> {
        let params = [("props", "false".to_string()), ("keys", "true".to_string())];
        let object = self.fetch_listing(&params)?;
        if !object.exists() {
            return Err(RiakError::KeyListFailed {
                bucket: self.name.clone(),
            });
        }

        let keys = string_list(object.data(), "keys").ok_or_else(|| RiakError::KeyListFailed {
            bucket: self.name.clone(),
        })?;
        debug!("Listed {} keys in bucket {}", keys.len(), self.name);
        Ok(keys)
    }

    /// Query a secondary index for an exact value, or a range when `end` is
    /// given. Results point at the matching objects.
    pub fn index_search(
        &self,
        name: &str,
        index_type: IndexType,
        start: &str,
        end: Option<&str>,
        dedupe: bool,
    ) -> Result<Vec<Link>> {
        let index = index_type.index_name(name);
        let url = build_index_path(self.client.config(), &self.name, &index, start, end);

        let mut object = RiakObject::new(self.clone(), None, Encoding::Json);
        let response = self.client.send(Method::Get, &url, &Headers::new(), Bytes::new());
        object.populate(response, &[200])?;
        if !object.exists() {
            return Err(RiakError::IndexSearchFailed {
                bucket: self.name.clone(),
                index,
            });
        }

        let keys = string_list(object.data(), "keys").ok_or_else(|| RiakError::IndexSearchFailed {
            bucket: self.name.clone(),
            index: index.clone(),
        })?;

        let mut seen = HashSet::new();
        Ok(keys
            .into_iter()
            .filter(|key| !dedupe || seen.insert(key.clone()))
            .map(|key| Link::new(self.name.as_str(), key, None))
            .collect())
    }

    /// GET the bucket resource and interpret it through an object
    fn fetch_listing(&self, params: &[(&str, String)]) -> Result<RiakObject> {
        let url = build_rest_path(self.client.config(), Some(&self.name), None, &[], params);
        let mut object = RiakObject::new(self.clone(), None, Encoding::Json);
        let response = self.client.send(Method::Get, &url, &Headers::new(), Bytes::new());
        object.populate(response, &[200])?;
        Ok(object)
    }
}

/// Decoded string array under `field`
fn string_list(data: Option<&Value>, field: &str) -> Option<Vec<String>> {
    let list = data?.get(field)?.as_array()?;
    Some(
        list.iter()
            .filter_map(Value::as_str)
            .map(decode)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use riak_net::test_utils::MockTransport;
    use std::sync::Arc;

    fn bucket(name: &str) -> (Bucket, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        let config = ClientConfig::new("localhost", 8098).with_client_id("test-client");
        let client = RiakClient::with_transport(config, transport.clone());
        (client.bucket(name), transport)
    }

    #[test]
    fn test_quorum_falls_back_to_client() {
        let (mut bucket, _) = bucket("b");
        assert_eq!(bucket.resolve_w(None), 2);

        bucket.set_w(Some(3));
        assert_eq!(bucket.resolve_w(None), 3);
        assert_eq!(bucket.resolve_w(Some(1)), 1);

        bucket.set_w(None);
        assert_eq!(bucket.resolve_w(None), 2);
    }

    #[test]
    fn test_new_object_defaults() {
        let (bucket, _) = bucket("b");
        let object = bucket.new_object(Some("k"), json!({"a": 1}));
        assert_eq!(object.content_type(), "application/json");
        assert_eq!(object.encoding(), Encoding::Json);
        assert!(!object.exists());

        let binary = bucket.new_binary(None, "raw", "text/plain");
        assert_eq!(binary.key(), None);
        assert_eq!(binary.binary().map(|b| &b[..]), Some(&b"raw"[..]));
    }

    #[test]
    fn test_string_list_decodes() {
        let data = json!({"keys": ["a%20b", "c", 3]});
        assert_eq!(string_list(Some(&data), "keys"), Some(vec!["a b".to_string(), "c".to_string()]));
        assert_eq!(string_list(Some(&data), "missing"), None);
        assert_eq!(string_list(None, "keys"), None);
    }
}
