//! Header codec: multimap headers, raw header block parsing and the link and
//! index header encodings

use bytes::Bytes;
use riak_core::Link;
use tracing::trace;

use crate::{HttpResponse, TransportError};

/// Prefix of secondary index headers
pub const INDEX_HEADER_PREFIX: &str = "x-riak-index-";

/// Prefix of user metadata headers
pub const META_HEADER_PREFIX: &str = "x-riak-meta-";

pub const CLIENT_ID_HEADER: &str = "X-Riak-ClientId";
pub const VCLOCK_HEADER: &str = "X-Riak-Vclock";
pub const LINK_HEADER: &str = "Link";
pub const LOCATION_HEADER: &str = "Location";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

/// Ordered header multimap
///
/// Names are stored title-cased and compared case-insensitively. Repeated
/// names keep every value in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, keeping any earlier values under the same name
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.entries.push((title_case(name), value.into()));
    }

    /// Replace every value under `name` with a single one
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.remove(name);
        self.append(name, value);
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// First value under `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Entries whose name starts with `prefix`, yielding the lower-cased
    /// remainder of the name and the value
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (String, &'a str)> + 'a {
        self.entries.iter().filter_map(move |(name, value)| {
            if name.len() > prefix.len()
                && name.is_char_boundary(prefix.len())
                && name[..prefix.len()].eq_ignore_ascii_case(prefix)
            {
                Some((name[prefix.len()..].to_ascii_lowercase(), value.as_str()))
            } else {
                None
            }
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `Name: value` lines in insertion order
    pub fn to_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(n, v)| format!("{}: {}", n, v))
            .collect()
    }

    /// Parse a raw header block
    ///
    /// Continuation lines (CRLF followed by spaces or tabs) are folded into
    /// the previous line. Lines without a `name: value` shape, such as the
    /// status line, are skipped.
    pub fn parse_block(raw: &str) -> Headers {
        let mut headers = Headers::new();
        for field in fold_continuations(raw) {
            let Some((name, value)) = field.split_once(':') else {
                continue;
            };
            let name = name.trim();
            let value = value.trim();
            if name.is_empty() || value.is_empty() || name.contains(' ') {
                continue;
            }
            headers.append(name, value);
        }
        headers
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Headers {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

/// Join continuation lines onto the line they continue
fn fold_continuations(raw: &str) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    for line in raw.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(previous) = fields.last_mut() {
                previous.push(' ');
                previous.push_str(line.trim_start_matches([' ', '\t']));
                continue;
            }
        }
        fields.push(line.to_string());
    }
    fields
}

/// Canonical header capitalization: `content-TYPE` becomes `Content-Type`
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.trim().chars() {
        if upper_next {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        upper_next = matches!(c, '-' | ' ' | '\t');
    }
    out
}

impl HttpResponse {
    /// Parse a complete raw HTTP/1.x response: status line, headers, body
    pub fn parse(raw: &[u8]) -> Result<HttpResponse, TransportError> {
        let (head_end, body_start) = find_head_end(raw)
            .ok_or_else(|| TransportError::Body("missing end of header block".to_string()))?;
        let head = std::str::from_utf8(&raw[..head_end])
            .map_err(|e| TransportError::Body(format!("header block is not UTF-8: {}", e)))?;

        let status_line = head.lines().next().unwrap_or_default();
        let status = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or_else(|| TransportError::Body(format!("bad status line '{}'", status_line)))?;

        let headers = Headers::parse_block(head);
        let body = Bytes::copy_from_slice(&raw[body_start..]);
        Ok(HttpResponse::new(status, headers, body))
    }
}

fn find_head_end(raw: &[u8]) -> Option<(usize, usize)> {
    if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some((pos, pos + 4));
    }
    raw.windows(2).position(|w| w == b"\n\n").map(|pos| (pos, pos + 2))
}

/// Percent-encode one path segment or header value
pub fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Percent-decode, keeping the input when it is not valid encoded UTF-8
pub fn decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Render a link as a `Link` header value: `</prefix/bucket/key>; riaktag="tag"`
pub fn format_link_header(prefix: &str, link: &Link) -> String {
    format!(
        "</{}/{}/{}>; riaktag=\"{}\"",
        prefix,
        encode(&link.bucket),
        encode(&link.key),
        encode(link.tag())
    )
}

/// Parse a `Link` header value into object links
///
/// Entries that do not point at an object (for example the `rel="up"` link
/// to the bucket) are skipped.
pub fn parse_link_header(value: &str) -> Vec<Link> {
    value
        .split(',')
        .filter_map(|entry| {
            let link = parse_link_entry(entry.trim());
            if link.is_none() {
                trace!("Skipping link entry '{}'", entry.trim());
            }
            link
        })
        .collect()
}

fn parse_link_entry(entry: &str) -> Option<Link> {
    let rest = entry.strip_prefix('<')?;
    let (target, params) = rest.split_once('>')?;

    let segments: Vec<&str> = target.strip_prefix('/')?.split('/').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return None;
    }

    let params = params.trim_start().strip_prefix(';')?.trim_start();
    let tag = params.strip_prefix("riaktag=\"")?;
    let (tag, _) = tag.split_once('"')?;
    if tag.is_empty() {
        return None;
    }

    Some(Link::new(
        decode(segments[1]),
        decode(segments[2]),
        Some(decode(tag)),
    ))
}

/// Encode index values for one `x-riak-index-*` header
pub fn encode_index_values<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    values
        .into_iter()
        .map(encode)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split and decode a (possibly multi-valued) index header value
pub fn decode_index_values(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(decode)
        .collect()
}
