//! `application/x-www-form-urlencoded` bodies.
//!
//! ```text
//! database.url=pg%3A%2F%2Fdb&labels%5Benv%5D=prod&tags=a&tags=b
//! ```
//!
//! Record fields nest with `.`, map entries with `[key]`, lists of records
//! with `[i]` (brackets are percent-encoded on the wire). Lists of scalars
//! repeat their key. Empty values are left out.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use tracing::debug;

use super::{Codec, utf8};
use crate::error::CodecError;
use crate::node::Node;
use crate::path::{PathStyle, Segment, join};
use crate::record::{Payload, Target};
use crate::shape::{Shape, inspect};
use crate::types::Kind;
use crate::unflatten::{insert, type_text};

/// Name registered for the form codec; `form` is accepted as an alias.
pub const NAME: &str = "x-www-form-urlencoded";

/// Everything but the unreserved characters is escaped.
const FORM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone, Copy, Default)]
pub struct FormCodec;

impl Codec for FormCodec {
    fn name(&self) -> &str {
        NAME
    }

    fn marshal(&self, payload: Payload<'_>) -> Result<Vec<u8>, CodecError> {
        let shape = match payload {
            Payload::Fields(accessor) => crate::record::accessor_shape(accessor),
            Payload::Generic(record) => record.shape(),
        };
        let mut pairs = Vec::new();
        walk(&payload.to_node()?, Some(&shape), "", &mut pairs);
        // Stable: repeated keys keep their list order.
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(codec = NAME, keys = pairs.len(), "encoded form");
        let body: Vec<String> = pairs
            .iter()
            .map(|(key, value)| format!("{}={}", escape(key), escape(value)))
            .collect();
        Ok(body.join("&").into_bytes())
    }

    fn unmarshal(&self, data: &[u8], mut target: Target<'_>) -> Result<(), CodecError> {
        let shape = inspect(&target.shape(), ".");
        let pairs = parse_query(utf8(data)?)?;
        debug!(codec = NAME, keys = pairs.len(), "decoding form");

        // Group repeated keys, keeping first-seen order.
        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for (key, value) in pairs {
            match grouped.iter_mut().find(|(k, _)| *k == key) {
                Some((_, values)) => values.push(value),
                None => grouped.push((key, vec![value])),
            }
        }

        let mut root = Node::Map(Vec::new());
        for (key, mut values) in grouped {
            let segments = parse_path(&key)?;
            let kind = shape.kind_of(&join(&segments, &PathStyle::flag()));
            let value = if kind == Some(Kind::List) || values.len() > 1 {
                Node::List(values.into_iter().map(Node::Str).collect())
            } else {
                type_text(&values.pop().unwrap_or_default(), kind)
            };
            insert(&mut root, &segments, value, &key)?;
        }
        target.assign(root)
    }
}

/// Collect `(path, text)` pairs. `shape` tells records (`a.b`) from maps (`m[k]`).
fn walk(node: &Node, shape: Option<&Shape>, path: &str, out: &mut Vec<(String, String)>) {
    match node {
        Node::Null => {}
        Node::Map(entries) => {
            let is_map = matches!(shape, Some(Shape::Map(_)));
            for (key, value) in entries {
                let child_shape = match shape {
                    Some(Shape::Map(value_shape)) => Some(&**value_shape),
                    Some(Shape::Record(fields)) => fields
                        .iter()
                        .find(|f| f.name == *key)
                        .map(|f| &f.shape),
                    _ => None,
                };
                let child = if is_map {
                    format!("{path}[{key}]")
                } else if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                walk(value, child_shape, &child, out);
            }
        }
        Node::List(items) => {
            let elem = match shape {
                Some(Shape::List(elem)) => Some(&**elem),
                _ => None,
            };
            if items.iter().all(Node::is_scalar) {
                for item in items {
                    walk(item, elem, path, out);
                }
            } else {
                for (i, item) in items.iter().enumerate() {
                    walk(item, elem, &format!("{path}[{i}]"), out);
                }
            }
        }
        scalar => {
            if let Some(text) = scalar.text().filter(|t| !t.is_empty()) {
                out.push((path.to_string(), text));
            }
        }
    }
}

fn escape(s: &str) -> String {
    utf8_percent_encode(s, FORM).to_string().replace("%20", "+")
}

fn unescape(s: &str) -> Result<String, CodecError> {
    let spaced = s.replace('+', " ");
    Ok(percent_decode_str(&spaced).decode_utf8()?.into_owned())
}

/// Split a query string into decoded pairs. A pair without `=` has an empty value.
pub fn parse_query(text: &str) -> Result<Vec<(String, String)>, CodecError> {
    text.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Ok((unescape(key)?, unescape(value)?))
        })
        .collect()
}

/// `a.b[k][0].c` → `[a, b, k, 0, c]`. Numeric brackets are indices.
///
/// Bracket contents are taken whole, so map keys may hold `.` and brackets.
/// A bracket closes at the first `]` followed by `.`, `[` or the end.
fn parse_path(key: &str) -> Result<Vec<Segment>, CodecError> {
    let malformed = || CodecError::MalformedToken {
        token: key.to_string(),
    };
    let mut segments = Vec::new();
    let mut rest = key;
    loop {
        let end = rest.find(['.', '[']).unwrap_or(rest.len());
        let (name, tail) = rest.split_at(end);
        if name.is_empty() {
            return Err(malformed());
        }
        segments.push(Segment::Field(name.to_string()));
        rest = tail;
        while let Some(inner) = rest.strip_prefix('[') {
            let close = closing_bracket(inner).ok_or_else(malformed)?;
            let content = &inner[..close];
            segments.push(match content.parse::<usize>() {
                Ok(index) if content.bytes().all(|b| b.is_ascii_digit()) => Segment::Index(index),
                _ => Segment::Key(content.to_string()),
            });
            rest = &inner[close + 1..];
        }
        match rest.strip_prefix('.') {
            Some(next) => rest = next,
            None if rest.is_empty() => break,
            None => return Err(malformed()),
        }
    }
    Ok(segments)
}

fn closing_bracket(s: &str) -> Option<usize> {
    s.match_indices(']')
        .map(|(pos, _)| pos)
        .find(|&pos| matches!(s.as_bytes().get(pos + 1), None | Some(b'.' | b'[')))
}
