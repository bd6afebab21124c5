//! Response interpretation: rebuilds an object's state from one HTTP
//! response, and renders the headers a write sends

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, trace};

use riak_core::*;
use riak_net::*;

use crate::object::default_content_type;
use crate::{Payload, RiakObject};

/// Metadata entry carrying the auto-index declarations (index -> field)
pub const AUTO_INDEX_META: &str = "x-rc-autoindex";

/// Metadata entry recording auto-index values that were also set by hand
pub const AUTO_INDEX_COLLISION_META: &str = "x-rc-autoindexcollision";

const ACCEPT_SIBLING_LIST: &str = "text/plain, */*; q=0.5";

impl RiakObject {
    /// Drop everything learned from the server or set locally, keeping only
    /// bucket, key and encoding
    pub(crate) fn clear(&mut self) {
        self.value = Payload::empty(self.encoding);
        self.body = bytes::Bytes::new();
        self.content_type = default_content_type(self.encoding).to_string();
        self.vclock = None;
        self.headers = Headers::new();
        self.links.clear();
        self.indexes.clear();
        self.auto_indexes.clear();
        self.meta.clear();
        self.siblings.clear();
        self.exists = false;
    }

    /// Replace this object's state with what `response` says
    ///
    /// A `None` response (no answer from the transport) leaves the object
    /// cleared; callers decide whether that is a failure. Status `0` is
    /// always an error, as is any status outside `expected`.
    pub fn populate(&mut self, response: Option<HttpResponse>, expected: &[u16]) -> Result<&mut Self> {
        self.clear();
        self.status = response.as_ref().map(|r| r.status);

        let Some(response) = response else {
            return Ok(self);
        };

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

        self.headers = response.headers;
        if response.status == 404 {
            return Ok(self);
        }

        self.body = response.body;
        self.exists = true;

        if let Some(content_type) = self.headers.get(CONTENT_TYPE_HEADER) {
            self.content_type = content_type.to_string();
        }
        self.vclock = self.headers.get(VCLOCK_HEADER).map(str::to_string);

        self.links = self
            .headers
            .get_all(LINK_HEADER)
            .flat_map(parse_link_header)
            .collect();

        self.read_index_and_meta_headers();
        let collisions = self.take_auto_index_meta();

        match self.status {
            Some(300) => {
                self.siblings = parse_sibling_list(&self.body);
                debug!("{} siblings for {:?}", self.siblings.len(), self.key);
                return Ok(self);
            }
            Some(201) => {
                if let Some(key) = self.headers.get(LOCATION_HEADER).and_then(last_segment) {
                    self.key = Some(key);
                }
            }
            _ => {}
        }

        self.value = match (self.encoding, self.status) {
            (crate::Encoding::Json, Some(200 | 201)) => Payload::Json(decode_json_body(&self.body)?),
            (crate::Encoding::Json, _) => Payload::Json(Value::Null),
            (crate::Encoding::Binary, _) => Payload::Binary(self.body.clone()),
        };

        self.strip_auto_index_values(&collisions);
        Ok(self)
    }

    fn read_index_and_meta_headers(&mut self) {
        for (name, value) in self.headers.with_prefix(INDEX_HEADER_PREFIX) {
            let values = self.indexes.entry(name).or_default();
            for v in decode_index_values(value) {
                if !values.contains(&v) {
                    values.push(v);
                }
            }
        }

        for (name, value) in self.headers.with_prefix(META_HEADER_PREFIX) {
            self.meta.insert(name, value.to_string());
        }
    }

    /// Move the auto-index bookkeeping out of user metadata. Returns the
    /// recorded collisions.
    fn take_auto_index_meta(&mut self) -> Map<String, Value> {
        if let Some(declared) = self.meta.remove(AUTO_INDEX_META) {
            match serde_json::from_str::<BTreeMap<String, String>>(&declared) {
                Ok(declared) => {
                    self.auto_indexes = declared
                        .into_iter()
                        .map(|(index, field)| (index.to_ascii_lowercase(), field))
                        .collect()
                }
                Err(e) => trace!("Ignoring unreadable auto-index metadata: {}", e),
            }
        }

        self.meta
            .remove(AUTO_INDEX_COLLISION_META)
            .and_then(|raw| serde_json::from_str::<Map<String, Value>>(&raw).ok())
            .unwrap_or_default()
            .into_iter()
            .map(|(index, value)| (index.to_ascii_lowercase(), value))
            .collect()
    }

    /// Remove index values the server derived from auto-indexed fields, so
    /// that they do not turn into hand-set index values on the next write
    fn strip_auto_index_values(&mut self, collisions: &Map<String, Value>) {
        let Payload::Json(data) = &self.value else {
            return;
        };

        for (index, field) in &self.auto_indexes {
            let Some(value) = data.get(field).and_then(index_value_of) else {
                continue;
            };
            if collisions.get(index).and_then(index_value_of).as_deref() == Some(value.as_str()) {
                continue;
            }
            if let Some(values) = self.indexes.get_mut(index) {
                values.retain(|v| *v != value);
                if values.is_empty() {
                    self.indexes.remove(index);
                }
            }
        }
    }

    /// Auto-index values resolved from the current JSON value
    fn resolved_auto_indexes(&self) -> Result<Vec<(&str, String)>> {
        if self.auto_indexes.is_empty() {
            return Ok(Vec::new());
        }
        let data = match &self.value {
            Payload::Json(data) => data,
            Payload::Binary(_) => {
                return Err(RiakError::UnsupportedAutoIndexType(
                    "auto indexes need a JSON value".to_string(),
                ))
            }
        };

        Ok(self
            .auto_indexes
            .iter()
            .filter_map(|(index, field)| {
                data.get(field)
                    .and_then(index_value_of)
                    .map(|value| (index.as_str(), value))
            })
            .collect())
    }

    /// Headers for a store request
    pub(crate) fn write_headers(&self) -> Result<Headers> {
        let config = self.client().config();
        let mut headers = Headers::new();

        headers.append("Accept", ACCEPT_SIBLING_LIST);
        headers.append(CONTENT_TYPE_HEADER, self.content_type.as_str());
        headers.append(CLIENT_ID_HEADER, config.client_id.as_str());
        if let Some(vclock) = &self.vclock {
            headers.append(VCLOCK_HEADER, vclock.as_str());
        }

        for link in &self.links {
            headers.append(LINK_HEADER, format_link_header(&config.prefix, link));
        }

        let auto_values = self.resolved_auto_indexes()?;
        let mut collisions = Map::new();
        for (index, value) in &auto_values {
            headers.append(&format!("{}{}", INDEX_HEADER_PREFIX, index), encode(value));
            let explicit = self.indexes.get(*index);
            if explicit.is_some_and(|values| values.contains(value)) {
                collisions.insert(index.to_string(), Value::String(value.clone()));
            }
        }

        for (index, values) in &self.indexes {
            if values.is_empty() {
                continue;
            }
            headers.append(
                &format!("{}{}", INDEX_HEADER_PREFIX, index),
                encode_index_values(values.iter().map(String::as_str)),
            );
        }

        let mut meta = self.meta.clone();
        meta.remove(AUTO_INDEX_META);
        meta.remove(AUTO_INDEX_COLLISION_META);
        if !self.auto_indexes.is_empty() {
            meta.insert(AUTO_INDEX_META.to_string(), serde_json::to_string(&self.auto_indexes)?);
        }
        if !collisions.is_empty() {
            meta.insert(AUTO_INDEX_COLLISION_META.to_string(), Value::Object(collisions).to_string());
        }
        for (name, value) in meta.iter().filter(|(_, v)| !v.is_empty()) {
            headers.append(&format!("{}{}", META_HEADER_PREFIX, name), value.as_str());
        }

        Ok(headers)
    }
}

/// Index representation of a JSON field; compound values are not indexable
pub(crate) fn index_value_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Sibling listing: a label line followed by one version tag per line
fn parse_sibling_list(body: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(body)
        .trim()
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn last_segment(location: &str) -> Option<String> {
    let path = location.split('?').next().unwrap_or(location);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(decode)
}

fn decode_json_body(body: &[u8]) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| RiakError::MalformedPayload(e.to_string()))
}
