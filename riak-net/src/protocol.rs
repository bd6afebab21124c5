//! REST path construction
//!
//! Segment order is fixed by the server's routing and must not change:
//! `http://host:port/<prefix>/<bucket>/<key>/<linkspec>...?<params>`.

use riak_core::{ClientConfig, LinkSpec};

use crate::wire::encode;

/// Build a key/value interface URL
///
/// `bucket`, `key`, link-walk steps and query parameters are each optional;
/// every dynamic part is percent-encoded. A `?` is added only when there are
/// parameters.
pub fn build_rest_path(
    config: &ClientConfig,
    bucket: Option<&str>,
    key: Option<&str>,
    spec: &[LinkSpec],
    params: &[(&str, String)],
) -> String {
    let mut path = format!("{}/{}", config.base_url(), config.prefix);

    if let Some(bucket) = bucket {
        path.push('/');
        path.push_str(&encode(bucket));
    }

    if let Some(key) = key {
        path.push('/');
        path.push_str(&encode(key));
    }

    for step in spec {
        path.push('/');
        path.push_str(&format!(
            "{},{},{}",
            encode(&step.bucket),
            encode(&step.tag),
            if step.keep { "1" } else { "0" }
        ));
    }

    if !params.is_empty() {
        path.push('?');
        path.push_str(&build_query(params));
    }

    path
}

/// Build a secondary index query URL:
/// `http://host:port/<index_prefix>/<bucket>/index/<index>/<start>[/<end>]`
pub fn build_index_path(
    config: &ClientConfig,
    bucket: &str,
    index: &str,
    start: &str,
    end: Option<&str>,
) -> String {
    let mut segments = vec![
        config.base_url(),
        config.index_prefix.clone(),
        encode(bucket),
        "index".to_string(),
        encode(index),
        encode(start),
    ];
    if let Some(end) = end {
        segments.push(encode(end));
    }
    segments.join("/")
}

/// Map/reduce endpoint; only ever used with POST
pub fn build_mapred_path(config: &ClientConfig) -> String {
    format!("{}/{}", config.base_url(), config.mapred_prefix)
}

/// Liveness endpoint
pub fn build_ping_path(config: &ClientConfig) -> String {
    format!("{}/ping", config.base_url())
}

/// `k=v&k=v` with keys and values percent-encoded
pub fn build_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new("localhost", 8098).with_client_id("test")
    }

    #[test]
    fn test_rest_path_shapes() {
        let config = config();
        assert_eq!(
            build_rest_path(&config, None, None, &[], &[]),
            "http://localhost:8098/riak"
        );
        assert_eq!(
            build_rest_path(&config, Some("my bucket"), None, &[], &[]),
            "http://localhost:8098/riak/my%20bucket"
        );
        assert_eq!(
            build_rest_path(&config, Some("b"), Some("k/1"), &[], &[("r", "2".to_string())]),
            "http://localhost:8098/riak/b/k%2F1?r=2"
        );
    }

    #[test]
    fn test_rest_path_link_spec() {
        let spec = [LinkSpec::new("people", "friend", false), LinkSpec::any(true)];
        assert_eq!(
            build_rest_path(&config(), Some("people"), Some("alice"), &spec, &[]),
            "http://localhost:8098/riak/people/alice/people,friend,0/_,_,1"
        );
    }

    #[test]
    fn test_rest_path_query_order_is_preserved() {
        let params = [
            ("props", "true".to_string()),
            ("keys", "false".to_string()),
        ];
        assert_eq!(
            build_rest_path(&config(), Some("b"), None, &[], &params),
            "http://localhost:8098/riak/b?props=true&keys=false"
        );
    }

    #[test]
    fn test_index_path() {
        let config = config();
        assert_eq!(
            build_index_path(&config, "users", "email_bin", "a@b.c", None),
            "http://localhost:8098/buckets/users/index/email_bin/a%40b.c"
        );
        assert_eq!(
            build_index_path(&config, "users", "age_int", "18", Some("30")),
            "http://localhost:8098/buckets/users/index/age_int/18/30"
        );
    }

    #[test]
    fn test_mapred_and_ping_paths() {
        let config = config().with_mapred_prefix("mr");
        assert_eq!(build_mapred_path(&config), "http://localhost:8098/mr");
        assert_eq!(build_ping_path(&config), "http://localhost:8098/ping");
    }
}
