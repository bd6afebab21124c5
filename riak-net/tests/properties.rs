//! Property-based tests for path construction and header codecs

use proptest::prelude::*;
use riak_core::{ClientConfig, LinkSpec};
use riak_net::*;

fn config() -> ClientConfig {
    ClientConfig::new("127.0.0.1", 8098).with_client_id("props")
}

fn path_segments(url: &str) -> Vec<String> {
    let path = url.split('?').next().unwrap_or_default();
    let path = path.strip_prefix("http://127.0.0.1:8098/").unwrap();
    path.split('/').map(decode).collect()
}

proptest! {
    #[test]
    fn props_rest_path_has_one_query_mark_iff_params(
        bucket in ".{1,20}",
        key in proptest::option::of(".{1,20}"),
        params in prop::collection::vec(("[a-z?&=]{1,8}", ".{0,12}"), 0..4)
    ) {
        let params: Vec<(&str, String)> = params.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        let url = build_rest_path(&config(), Some(&bucket), key.as_deref(), &[], &params);

        let marks = url.matches('?').count();
        prop_assert_eq!(marks, if params.is_empty() { 0 } else { 1 });
    }

    #[test]
    fn props_rest_path_segments_round_trip(
        bucket in ".{1,20}",
        key in ".{1,20}",
    ) {
        let url = build_rest_path(&config(), Some(&bucket), Some(&key), &[], &[]);
        let segments = path_segments(&url);
        prop_assert_eq!(segments, vec!["riak".to_string(), bucket, key]);
    }

    #[test]
    fn props_query_params_round_trip(
        params in prop::collection::vec(("[a-z&=?]{1,8}", ".{0,12}"), 1..4)
    ) {
        let borrowed: Vec<(&str, String)> = params.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        let url = build_rest_path(&config(), Some("b"), None, &[], &borrowed);
        let query = url.split_once('?').unwrap().1;

        let decoded: Vec<(String, String)> = query
            .split('&')
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap();
                (decode(k), decode(v))
            })
            .collect();
        prop_assert_eq!(decoded, params);
    }

    #[test]
    fn props_link_spec_segments_round_trip(
        bucket in ".{1,12}",
        tag in ".{1,12}",
        keep in any::<bool>(),
    ) {
        let spec = [LinkSpec::new(bucket.clone(), tag.clone(), keep)];
        let url = build_rest_path(&config(), Some("b"), Some("k"), &spec, &[]);
        let last = url.rsplit('/').next().unwrap();
        let parts: Vec<&str> = last.split(',').collect();

        prop_assert_eq!(parts.len(), 3);
        prop_assert_eq!(decode(parts[0]), bucket);
        prop_assert_eq!(decode(parts[1]), tag);
        prop_assert_eq!(parts[2], if keep { "1" } else { "0" });
    }

    #[test]
    fn props_index_values_round_trip(
        values in prop::collection::vec("[^ ].{0,10}[^ ]", 1..5)
    ) {
        let encoded = encode_index_values(values.iter().map(String::as_str));
        prop_assert_eq!(decode_index_values(&encoded), values);
    }

    #[test]
    fn props_header_names_compare_case_insensitively(
        name in "[A-Za-z][A-Za-z-]{0,15}",
        value in "[a-z0-9]{1,10}",
    ) {
        let mut headers = Headers::new();
        headers.append(&name, value.clone());
        prop_assert_eq!(headers.get(&name.to_uppercase()), Some(value.as_str()));
        prop_assert_eq!(headers.get(&name.to_lowercase()), Some(value.as_str()));
    }

    #[test]
    fn props_continuation_lines_fold_into_one_value(
        words in prop::collection::vec("[a-z0-9]{1,8}", 1..6),
        indent in "[ \t]{1,3}",
    ) {
        let mut raw = format!("X-Long: {}", words[0]);
        for word in &words[1..] {
            raw.push_str(&format!("\r\n{}{}", indent, word));
        }
        raw.push_str("\r\nX-After: end\r\n");

        let headers = Headers::parse_block(&raw);
        let folded = words.join(" ");
        prop_assert_eq!(headers.get("x-long"), Some(folded.as_str()));
        prop_assert_eq!(headers.get("x-after"), Some("end"));
        prop_assert_eq!(headers.len(), 2);
    }
}
