//! URL string ↔ model conversion.
//!
//! # Responsibilities
//! - Print a `UrlTree` in the router's wire format
//! - Percent-encode path, matrix, query and fragment components with their own character sets
//! - Expose the `UrlSerializer` seam so an application can swap the format
//!
//! # Design Decisions
//! - Primary outlet prints without parentheses, auxiliary outlets as `(name:path//name2:path)`
//! - Repeated query keys print as repeated `key=value` pairs
//! - Encoding sets mirror what browsers leave readable so serialized URLs stay stable

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::url::parser::UrlParser;
use crate::url::tree::{Params, QueryParams, QueryValue, UrlSegment, UrlSegmentGroup, UrlTree, PRIMARY_OUTLET};
use crate::url::MalformedUrlError;

/// Converts between URL strings and `UrlTree`s.
pub trait UrlSerializer: Send + Sync {
    /// Parse a URL string into a tree.
    fn parse(&self, url: &str) -> Result<UrlTree, MalformedUrlError>;

    /// Print a tree as a URL string.
    fn serialize(&self, tree: &UrlTree) -> String;
}

/// The router's own wire format.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUrlSerializer;

impl UrlSerializer for DefaultUrlSerializer {
    fn parse(&self, url: &str) -> Result<UrlTree, MalformedUrlError> {
        UrlParser::new(url).parse_root()
    }

    fn serialize(&self, tree: &UrlTree) -> String {
        let mut out = String::from("/");
        out.push_str(&serialize_group(&tree.root, true));
        out.push_str(&serialize_query_params(&tree.query_params));
        if let Some(fragment) = &tree.fragment {
            out.push('#');
            out.push_str(&utf8_percent_encode(fragment, FRAGMENT).to_string());
        }
        out
    }
}

// encodeURIComponent leaves A-Z a-z 0-9 - _ . ! ~ * ' ( ) untouched.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const URI_STRING: &AsciiSet = &COMPONENT.remove(b'@').remove(b':').remove(b'$').remove(b',');

const QUERY: &AsciiSet = &URI_STRING.remove(b';');

const SEGMENT: &AsciiSet = &URI_STRING.add(b'(').add(b')').remove(b'&');

const FRAGMENT: &AsciiSet = &COMPONENT
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'#');

/// Encode a path segment or matrix key/value.
pub fn encode_uri_segment(s: &str) -> String {
    utf8_percent_encode(s, SEGMENT).to_string()
}

/// Encode a query key or value.
pub fn encode_uri_query(s: &str) -> String {
    utf8_percent_encode(s, QUERY).to_string()
}

/// Decode a path, matrix or fragment component.
pub(crate) fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Decode a query component, where `+` means space.
pub(crate) fn decode_query(s: &str) -> String {
    decode(&s.replace('+', "%20"))
}

pub(crate) fn serialize_segment(segment: &UrlSegment) -> String {
    let mut out = encode_uri_segment(&segment.path);
    out.push_str(&serialize_matrix_params(&segment.parameters));
    out
}

fn serialize_matrix_params(params: &Params) -> String {
    params
        .iter()
        .map(|(k, v)| format!(";{}={}", encode_uri_segment(k), encode_uri_segment(v)))
        .collect()
}

/// Segments of one group joined by `/`, children excluded.
pub(crate) fn serialize_paths(group: &UrlSegmentGroup) -> String {
    group
        .segments
        .iter()
        .map(serialize_segment)
        .collect::<Vec<_>>()
        .join("/")
}

fn serialize_group(group: &UrlSegmentGroup, root: bool) -> String {
    if !group.has_children() {
        return serialize_paths(group);
    }

    if root {
        let primary = group
            .child(PRIMARY_OUTLET)
            .map(|child| serialize_group(child, false))
            .unwrap_or_default();
        let aux: Vec<String> = group
            .children
            .iter()
            .filter(|(name, _)| name.as_str() != PRIMARY_OUTLET)
            .map(|(name, child)| format!("{}:{}", name, serialize_group(child, false)))
            .collect();
        if aux.is_empty() {
            primary
        } else {
            format!("{}({})", primary, aux.join("//"))
        }
    } else {
        let children: Vec<String> = group
            .children_primary_first()
            .into_iter()
            .map(|(name, child)| {
                if name == PRIMARY_OUTLET {
                    serialize_group(child, false)
                } else {
                    format!("{}:{}", name, serialize_group(child, false))
                }
            })
            .collect();
        if group.children.len() == 1 && group.child(PRIMARY_OUTLET).is_some() {
            format!("{}/{}", serialize_paths(group), children[0])
        } else {
            format!("{}/({})", serialize_paths(group), children.join("//"))
        }
    }
}

fn serialize_query_params(params: &QueryParams) -> String {
    let pairs: Vec<String> = params
        .iter()
        .flat_map(|(name, value)| {
            let name = encode_uri_query(name);
            match value {
                QueryValue::Single(v) => vec![format!("{}={}", name, encode_uri_query(v))],
                QueryValue::Multi(values) => values
                    .iter()
                    .map(|v| format!("{}={}", name, encode_uri_query(v)))
                    .collect(),
            }
        })
        .collect();
    if pairs.is_empty() {
        String::new()
    } else {
        format!("?{}", pairs.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(url: &str) -> String {
        let tree = DefaultUrlSerializer.parse(url).expect("parse");
        DefaultUrlSerializer.serialize(&tree)
    }

    #[test]
    fn test_serialize_reproduces_canonical_url() {
        assert_eq!(roundtrip("/a/b;id=5?x=1#frag"), "/a/b;id=5?x=1#frag");
    }

    #[test]
    fn test_serialize_named_outlets() {
        assert_eq!(roundtrip("/a(aux:b//side:c)"), "/a(aux:b//side:c)");
        assert_eq!(roundtrip("/a/(b//aux:c)"), "/a/(b//aux:c)");
    }

    #[test]
    fn test_serialize_repeated_query_keys() {
        assert_eq!(roundtrip("/?a=1&a=2&b=3"), "/?a=1&a=2&b=3");
    }

    #[test]
    fn test_segment_encoding_escapes_parens_keeps_ampersand() {
        assert_eq!(encode_uri_segment("a(b)&c d"), "a%28b%29&c%20d");
    }

    #[test]
    fn test_query_encoding_keeps_semicolon() {
        assert_eq!(encode_uri_query("a;b=c&d"), "a;b%3Dc%26d");
    }

    #[test]
    fn test_serialize_is_idempotent_after_normalization() {
        for url in ["/a%20b/c?q=x+y", "/one;k=v%3B/two(aux:three)#f%20g", "/", "/?"] {
            let once = roundtrip(url);
            assert_eq!(roundtrip(&once), once, "not stable for {url}");
        }
    }
}
