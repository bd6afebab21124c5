//! Map/reduce job assembly and execution

use bytes::Bytes;
use serde_json::{json, Map, Value};
use tracing::debug;

use riak_core::*;
use riak_net::{build_mapred_path, encode, Headers, Method, CONTENT_TYPE_HEADER};

use crate::client::decode_json_response;
use crate::object::JSON_CONTENT_TYPE;
use crate::{RiakClient, RiakObject};

/// The function a map or reduce phase runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseFunction {
    /// Built-in JavaScript function, e.g. `Riak.mapValuesJson`
    Named(String),
    /// Anonymous JavaScript source
    Source(String),
    /// JavaScript stored as an object
    Stored { bucket: String, key: String },
    /// Erlang `module:function`
    Erlang { module: String, function: String },
}

impl PhaseFunction {
    pub fn erlang(module: impl Into<String>, function: impl Into<String>) -> Self {
        PhaseFunction::Erlang {
            module: module.into(),
            function: function.into(),
        }
    }

    pub fn stored(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        PhaseFunction::Stored {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Language the server runs this function in unless overridden
    pub fn default_language(&self) -> &'static str {
        match self {
            PhaseFunction::Erlang { .. } => "erlang",
            _ => "javascript",
        }
    }
}

/// JavaScript given as text: source when it has a body, a name otherwise
impl From<&str> for PhaseFunction {
    fn from(function: &str) -> Self {
        if function.contains('{') {
            PhaseFunction::Source(function.to_string())
        } else {
            PhaseFunction::Named(function.to_string())
        }
    }
}

impl From<String> for PhaseFunction {
    fn from(function: String) -> Self {
        PhaseFunction::from(function.as_str())
    }
}

impl From<(&str, &str)> for PhaseFunction {
    fn from((module, function): (&str, &str)) -> Self {
        PhaseFunction::erlang(module, function)
    }
}

/// Optional settings for a map or reduce phase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseOptions {
    pub language: Option<String>,
    pub keep: bool,
    pub arg: Option<Value>,
}

impl PhaseOptions {
    pub fn keep() -> Self {
        PhaseOptions {
            keep: true,
            ..Default::default()
        }
    }

    pub fn with_arg(mut self, arg: Value) -> Self {
        self.arg = Some(arg);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionPhase {
    pub function: PhaseFunction,
    pub language: String,
    pub keep: bool,
    pub arg: Option<Value>,
}

impl FunctionPhase {
    fn new(function: PhaseFunction, options: PhaseOptions) -> Self {
        let language = options
            .language
            .unwrap_or_else(|| function.default_language().to_string());
        FunctionPhase {
            function,
            language,
            keep: options.keep,
            arg: options.arg,
        }
    }

    fn to_json(&self) -> Value {
        let mut step = Map::new();
        step.insert("keep".to_string(), Value::Bool(self.keep));
        step.insert("language".to_string(), Value::String(self.language.clone()));
        step.insert("arg".to_string(), self.arg.clone().unwrap_or(Value::Null));

        match &self.function {
            PhaseFunction::Named(name) => {
                step.insert("name".to_string(), json!(name));
            }
            PhaseFunction::Source(source) => {
                step.insert("source".to_string(), json!(source));
            }
            PhaseFunction::Stored { bucket, key } => {
                step.insert("bucket".to_string(), json!(bucket));
                step.insert("key".to_string(), json!(key));
            }
            PhaseFunction::Erlang { module, function } => {
                step.insert("module".to_string(), json!(module));
                step.insert("function".to_string(), json!(function));
            }
        }
        Value::Object(step)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPhase {
    pub bucket: String,
    pub tag: String,
    pub keep: bool,
}

/// One step of a job
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Map(FunctionPhase),
    Reduce(FunctionPhase),
    Link(LinkPhase),
}

impl Phase {
    pub fn keep(&self) -> bool {
        match self {
            Phase::Map(p) | Phase::Reduce(p) => p.keep,
            Phase::Link(p) => p.keep,
        }
    }

    fn set_keep(&mut self, keep: bool) {
        match self {
            Phase::Map(p) | Phase::Reduce(p) => p.keep = keep,
            Phase::Link(p) => p.keep = keep,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Phase::Map(p) => json!({ "map": p.to_json() }),
            Phase::Reduce(p) => json!({ "reduce": p.to_json() }),
            Phase::Link(p) => json!({
                "link": { "bucket": p.bucket, "tag": p.tag, "keep": p.keep }
            }),
        }
    }
}

/// Where a job's input comes from
#[derive(Debug, Clone, PartialEq)]
enum Inputs {
    Unset,
    /// bucket, key, key data
    Objects(Vec<(String, String, Value)>),
    Bucket(String),
    Search { bucket: String, query: String },
}

/// Secondary index restriction of a whole-bucket input
#[derive(Debug, Clone, PartialEq, Eq)]
struct IndexSelector {
    index: String,
    start: String,
    end: Option<String>,
}

/// What a job returned
#[derive(Debug, Clone, PartialEq)]
pub enum MapReduceResult {
    /// Output of a map or reduce phase, as decoded JSON
    Values(Value),
    /// Output of a link phase (or of an input echo)
    Links(Vec<Link>),
}

impl MapReduceResult {
    pub fn into_values(self) -> Option<Value> {
        match self {
            MapReduceResult::Values(v) => Some(v),
            MapReduceResult::Links(_) => None,
        }
    }

    pub fn into_links(self) -> Option<Vec<Link>> {
        match self {
            MapReduceResult::Links(l) => Some(l),
            MapReduceResult::Values(_) => None,
        }
    }
}

/// Builder for a map/reduce job
///
/// Inputs are either a list of objects or one whole bucket, never both. Key
/// filters and index selection narrow a whole-bucket input and exclude each
/// other. Misuse is reported before any request is sent.
#[derive(Debug, Clone)]
pub struct MapReduce {
    client: RiakClient,
    phases: Vec<Phase>,
    inputs: Inputs,
    key_filters: Vec<Value>,
    index: Option<IndexSelector>,
    /// Set once an identity reduce stands in for an empty phase list
    echo_inputs: bool,
}

impl MapReduce {
    pub fn new(client: RiakClient) -> Self {
        MapReduce {
            client,
            phases: Vec::new(),
            inputs: Inputs::Unset,
            key_filters: Vec::new(),
            index: None,
            echo_inputs: false,
        }
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Use a stored object as input
    pub fn add_object(self, object: &RiakObject) -> Result<Self> {
        let key = object.key().ok_or_else(|| {
            RiakError::InvalidInputMode("an object without a key cannot be an input".to_string())
        })?;
        let bucket = object.bucket().name().to_string();
        let key = key.to_string();
        self.add_bucket_key_data(bucket, key, Value::Null)
    }

    /// Use a bucket/key pair as input, with data handed to the first phase
    pub fn add_bucket_key_data(
        mut self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        data: Value,
    ) -> Result<Self> {
        let entry = (bucket.into(), key.into(), data);
        match &mut self.inputs {
            Inputs::Unset => self.inputs = Inputs::Objects(vec![entry]),
            Inputs::Objects(objects) => objects.push(entry),
            Inputs::Bucket(_) => {
                return Err(RiakError::InvalidInputMode(
                    "already added a bucket, can't add an object".to_string(),
                ))
            }
            Inputs::Search { .. } => {
                return Err(RiakError::InvalidInputMode(
                    "already using a search, can't add an object".to_string(),
                ))
            }
        }
        Ok(self)
    }

    /// Use every object in a bucket as input
    pub fn add_bucket(mut self, bucket: impl Into<String>) -> Result<Self> {
        match self.inputs {
            Inputs::Objects(_) => Err(RiakError::InvalidInputMode(
                "already added objects, can't add a bucket".to_string(),
            )),
            Inputs::Search { .. } => Err(RiakError::InvalidInputMode(
                "already using a search, can't add a bucket".to_string(),
            )),
            Inputs::Unset | Inputs::Bucket(_) => {
                self.inputs = Inputs::Bucket(bucket.into());
                Ok(self)
            }
        }
    }

    /// Feed the job from a full-text search. Only Riak Search clusters
    /// accept this input.
    pub fn search(mut self, bucket: impl Into<String>, query: impl Into<String>) -> Result<Self> {
        match self.inputs {
            Inputs::Unset | Inputs::Search { .. } => {
                self.inputs = Inputs::Search {
                    bucket: bucket.into(),
                    query: query.into(),
                };
                Ok(self)
            }
            _ => Err(RiakError::InvalidInputMode(
                "search cannot be combined with other inputs".to_string(),
            )),
        }
    }

    /// Follow links; `_` matches any bucket or tag
    pub fn link(mut self, bucket: &str, tag: &str, keep: bool) -> Self {
        self.phases.push(Phase::Link(LinkPhase {
            bucket: bucket.to_string(),
            tag: tag.to_string(),
            keep,
        }));
        self
    }

    pub fn map(mut self, function: impl Into<PhaseFunction>, options: PhaseOptions) -> Self {
        self.phases
            .push(Phase::Map(FunctionPhase::new(function.into(), options)));
        self
    }

    pub fn reduce(mut self, function: impl Into<PhaseFunction>, options: PhaseOptions) -> Self {
        self.phases
            .push(Phase::Reduce(FunctionPhase::new(function.into(), options)));
        self
    }

    /// Add key filters, and-ed with any existing ones
    pub fn key_filter(self, filters: Vec<Value>) -> Result<Self> {
        self.key_filter_operator("and", filters)
    }

    pub fn key_filter_and(self, filters: Vec<Value>) -> Result<Self> {
        self.key_filter_operator("and", filters)
    }

    pub fn key_filter_or(self, filters: Vec<Value>) -> Result<Self> {
        self.key_filter_operator("or", filters)
    }

    /// Add key filters, combined with existing ones through `operator`:
    /// `[[operator, existing, added]]`
    pub fn key_filter_operator(mut self, operator: &str, filters: Vec<Value>) -> Result<Self> {
        if !matches!(self.inputs, Inputs::Bucket(_)) {
            return Err(RiakError::InvalidQueryCombination(
                "key filters can only be used in bucket mode".to_string(),
            ));
        }
        if self.index.is_some() {
            return Err(RiakError::InvalidQueryCombination(
                "index search and key filters cannot be used on the same operation".to_string(),
            ));
        }

        if self.key_filters.is_empty() {
            self.key_filters = filters;
        } else {
            let existing = std::mem::take(&mut self.key_filters);
            self.key_filters = vec![json!([operator, existing, filters])];
        }
        Ok(self)
    }

    /// Restrict a bucket input to objects matching a secondary index:
    /// exact match on `start`, or the range `start..=end`
    pub fn index_search(
        mut self,
        name: &str,
        index_type: IndexType,
        start: &str,
        end: Option<&str>,
    ) -> Result<Self> {
        if !self.key_filters.is_empty() {
            return Err(RiakError::InvalidQueryCombination(
                "index search and key filters cannot be used on the same operation".to_string(),
            ));
        }
        if !matches!(self.inputs, Inputs::Bucket(_)) {
            return Err(RiakError::InvalidQueryCombination(
                "index search can only be used in bucket mode".to_string(),
            ));
        }

        self.index = Some(IndexSelector {
            index: index_type.index_name(name),
            start: encode(start),
            end: end.map(encode),
        });
        Ok(self)
    }

    fn inputs_json(&self) -> Value {
        match &self.inputs {
            Inputs::Unset => json!([]),
            Inputs::Objects(objects) => Value::Array(
                objects
                    .iter()
                    .map(|(bucket, key, data)| json!([bucket, key, data]))
                    .collect(),
            ),
            Inputs::Bucket(bucket) => {
                if !self.key_filters.is_empty() {
                    json!({ "bucket": bucket, "key_filters": self.key_filters })
                } else if let Some(selector) = &self.index {
                    let mut input = Map::new();
                    input.insert("bucket".to_string(), json!(bucket));
                    input.insert("index".to_string(), json!(selector.index));
                    match &selector.end {
                        None => {
                            input.insert("key".to_string(), json!(selector.start));
                        }
                        Some(end) => {
                            input.insert("start".to_string(), json!(selector.start));
                            input.insert("end".to_string(), json!(end));
                        }
                    }
                    Value::Object(input)
                } else {
                    json!(bucket)
                }
            }
            Inputs::Search { bucket, query } => json!({
                "module": "riak_search",
                "function": "mapred_search",
                "arg": [bucket, query],
            }),
        }
    }

    /// Finalize the phase list and render the job
    ///
    /// An empty phase list becomes a single identity reduce that echoes the
    /// inputs. When no phase keeps its output, the last one is made to.
    pub fn build_job(&mut self, timeout: Option<u64>) -> Value {
        if self.phases.is_empty() {
            self.phases.push(Phase::Reduce(FunctionPhase::new(
                PhaseFunction::erlang("riak_kv_mapreduce", "reduce_identity"),
                PhaseOptions::default(),
            )));
            self.echo_inputs = true;
        }

        if !self.phases.iter().any(Phase::keep) {
            if let Some(last) = self.phases.last_mut() {
                last.set_keep(true);
            }
        }

        let query: Vec<Value> = self.phases.iter().map(Phase::to_json).collect();
        let mut job = Map::new();
        job.insert("inputs".to_string(), self.inputs_json());
        job.insert("query".to_string(), Value::Array(query));
        if let Some(timeout) = timeout {
            job.insert("timeout".to_string(), json!(timeout));
        }
        Value::Object(job)
    }

    /// Submit the job. Results of a job ending in a link phase, or of an
    /// input echo, come back as links; anything else as raw JSON.
    pub fn run(&mut self, timeout: Option<u64>) -> Result<MapReduceResult> {
        let job = self.build_job(timeout);
        let body = serde_json::to_vec(&job)?;

        let url = build_mapred_path(self.client.config());
        let mut headers = Headers::new();
        headers.append(CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE);

        debug!("Submitting map/reduce job with {} phases", self.phases.len());
        let response = self.client.send(Method::Post, &url, &headers, Bytes::from(body));
        let result = decode_json_response(response, &url, &[200])?;

        let link_results = self.echo_inputs || matches!(self.phases.last(), Some(Phase::Link(_)));
        if !link_results {
            return Ok(MapReduceResult::Values(result));
        }

        let rows = result
            .as_array()
            .ok_or_else(|| RiakError::MalformedPayload("expected a list of link rows".to_string()))?;
        rows.iter()
            .map(link_from_row)
            .collect::<Result<Vec<_>>>()
            .map(MapReduceResult::Links)
    }
}

/// `[bucket, key]` or `[bucket, key, tag]`
fn link_from_row(row: &Value) -> Result<Link> {
    let malformed = || RiakError::MalformedPayload(format!("not a link row: {}", row));
    let bucket = row.get(0).and_then(Value::as_str).ok_or_else(malformed)?;
    let key = row.get(1).and_then(Value::as_str).ok_or_else(malformed)?;
    let tag = row.get(2).and_then(Value::as_str).map(str::to_string);
    Ok(Link::new(bucket, key, tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use riak_net::test_utils::MockTransport;
    use std::sync::Arc;

    fn mr() -> MapReduce {
        let transport = Arc::new(MockTransport::new());
        let config = ClientConfig::new("localhost", 8098).with_client_id("test-client");
        MapReduce::new(RiakClient::with_transport(config, transport))
    }

    #[test]
    fn test_phase_function_detection() {
        assert_eq!(
            PhaseFunction::from("Riak.mapValuesJson"),
            PhaseFunction::Named("Riak.mapValuesJson".to_string())
        );
        assert!(matches!(
            PhaseFunction::from("function(v) { return [v]; }"),
            PhaseFunction::Source(_)
        ));
        assert_eq!(
            PhaseFunction::from(("riak_kv_mapreduce", "map_object_value")).default_language(),
            "erlang"
        );
    }

    #[test]
    fn test_phase_json_shapes() {
        let map = Phase::Map(FunctionPhase::new(
            PhaseFunction::stored("code", "mapper"),
            PhaseOptions::keep().with_arg(json!({"x": 1})),
        ));
        assert_eq!(
            map.to_json(),
            json!({"map": {"keep": true, "language": "javascript", "arg": {"x": 1}, "bucket": "code", "key": "mapper"}})
        );

        let reduce = Phase::Reduce(FunctionPhase::new(
            PhaseFunction::erlang("m", "f"),
            PhaseOptions::default(),
        ));
        assert_eq!(
            reduce.to_json(),
            json!({"reduce": {"keep": false, "language": "erlang", "arg": null, "module": "m", "function": "f"}})
        );

        let link = Phase::Link(LinkPhase { bucket: "_".into(), tag: "friend".into(), keep: false });
        assert_eq!(link.to_json(), json!({"link": {"bucket": "_", "tag": "friend", "keep": false}}));
    }

    #[test]
    fn test_input_modes_are_exclusive() {
        let err = mr().add_bucket("b").unwrap().add_bucket_key_data("b", "k", Value::Null);
        assert!(matches!(err, Err(RiakError::InvalidInputMode(_))));

        let err = mr().add_bucket_key_data("b", "k", Value::Null).unwrap().add_bucket("b");
        assert!(matches!(err, Err(RiakError::InvalidInputMode(_))));

        let err = mr().search("b", "q").unwrap().add_bucket("b");
        assert!(matches!(err, Err(RiakError::InvalidInputMode(_))));
    }

    #[test]
    fn test_key_filters_need_bucket_mode_and_no_index() {
        let err = mr().key_filter(vec![json!(["eq", "x"])]);
        assert!(matches!(err, Err(RiakError::InvalidQueryCombination(_))));

        let err = mr()
            .add_bucket("b")
            .unwrap()
            .index_search("age", IndexType::Integer, "1", None)
            .unwrap()
            .key_filter(vec![json!(["eq", "x"])]);
        assert!(matches!(err, Err(RiakError::InvalidQueryCombination(_))));

        let err = mr()
            .add_bucket("b")
            .unwrap()
            .key_filter(vec![json!(["eq", "x"])])
            .unwrap()
            .index_search("age", IndexType::Integer, "1", None);
        assert!(matches!(err, Err(RiakError::InvalidQueryCombination(_))));

        let err = mr()
            .add_bucket_key_data("b", "k", Value::Null)
            .unwrap()
            .index_search("age", IndexType::Integer, "1", None);
        assert!(matches!(err, Err(RiakError::InvalidQueryCombination(_))));
    }

    #[test]
    fn test_key_filters_combine() {
        let mut job = mr()
            .add_bucket("logs")
            .unwrap()
            .key_filter(vec![json!(["tokenize", "-", 2])])
            .unwrap()
            .key_filter_or(vec![json!(["eq", "x"])])
            .unwrap();

        let built = job.build_job(None);
        assert_eq!(
            built["inputs"],
            json!({
                "bucket": "logs",
                "key_filters": [["or", [["tokenize", "-", 2]], [["eq", "x"]]]]
            })
        );
    }

    #[test]
    fn test_index_inputs() {
        let mut exact = mr()
            .add_bucket("users")
            .unwrap()
            .index_search("email", IndexType::Binary, "a@b.c", None)
            .unwrap();
        assert_eq!(
            exact.build_job(None)["inputs"],
            json!({"bucket": "users", "index": "email_bin", "key": "a%40b.c"})
        );

        let mut range = mr()
            .add_bucket("users")
            .unwrap()
            .index_search("age", IndexType::Integer, "18", Some("30"))
            .unwrap();
        assert_eq!(
            range.build_job(Some(5000)),
            json!({
                "inputs": {"bucket": "users", "index": "age_int", "start": "18", "end": "30"},
                "query": [{"reduce": {"keep": true, "language": "erlang", "arg": null,
                    "module": "riak_kv_mapreduce", "function": "reduce_identity"}}],
                "timeout": 5000
            })
        );
    }

    #[test]
    fn test_search_input() {
        let mut job = mr().search("docs", "title:rust").unwrap();
        assert_eq!(
            job.build_job(None)["inputs"],
            json!({"module": "riak_search", "function": "mapred_search", "arg": ["docs", "title:rust"]})
        );
    }

    #[test]
    fn test_last_phase_kept_only_when_none_kept() {
        let mut job = mr()
            .add_bucket("b")
            .unwrap()
            .map("Riak.mapValuesJson", PhaseOptions::default())
            .reduce("Riak.reduceSum", PhaseOptions::default());
        job.build_job(None);
        assert!(!job.phases()[0].keep());
        assert!(job.phases()[1].keep());

        let mut job = mr()
            .add_bucket("b")
            .unwrap()
            .map("Riak.mapValuesJson", PhaseOptions::keep())
            .reduce("Riak.reduceSum", PhaseOptions::default());
        job.build_job(None);
        assert!(job.phases()[0].keep());
        assert!(!job.phases()[1].keep());
    }

    #[test]
    fn test_link_from_row() {
        assert_eq!(
            link_from_row(&json!(["b", "k", "t"])).unwrap(),
            Link::new("b", "k", Some("t".to_string()))
        );
        assert_eq!(link_from_row(&json!(["b", "k"])).unwrap().raw_tag(), None);
        assert_eq!(link_from_row(&json!(["b", "k", null])).unwrap().raw_tag(), None);
        assert!(link_from_row(&json!({"b": 1})).is_err());
    }
}
