//! Rebuild nested structure from a flat key/value mapping.
//!
//! Each key is resolved into [`Segment`]s, then inserted into the tree,
//! creating maps and lists on the way down. A [`TypeShape`] lets field names
//! contain the separator, tells map keys apart from fields, and types leaves
//! (`true` for a bool, `a,b` for a list).

use tracing::trace;

use crate::error::CodecError;
use crate::flatten::{FlatMapping, LIST_DELIMITER};
use crate::node::Node;
use crate::path::{LIST_MARKER, MAP_PLACEHOLDER, Segment, Token, tokenize};
use crate::shape::TypeShape;
use crate::types::Kind;

/// Largest list index accepted in a key.
pub const MAX_LIST_INDEX: usize = 65_535;

/// Build a nested [`Node`] from `flat`.
///
/// Keys are split on `separator`. Without a shape every token becomes a map
/// key and every leaf stays a string.
pub fn unflatten(
    flat: &FlatMapping,
    shape: Option<&TypeShape>,
    separator: &str,
) -> Result<Node, CodecError> {
    let mut root = Node::Map(Vec::new());
    for (key, value) in flat {
        if key.is_empty() {
            return Err(CodecError::MalformedToken {
                token: format!("={value}"),
            });
        }
        let resolved = resolve(key, shape, separator)?;
        trace!(key = %key, segments = ?resolved.segments, "resolved flat key");
        let leaf = typed_leaf(value, &resolved, shape);
        insert(&mut root, &resolved.segments, leaf, key)?;
    }
    Ok(root)
}

/// A key split into structural segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub segments: Vec<Segment>,
    /// Shape pattern the key resolved to, when it is a declared location.
    pub pattern: Option<String>,
}

/// Split `key` into segments, consulting `shape` when given.
///
/// Keys that leave the declared shape (unknown fields) fall back to plain
/// splitting; keys that contradict it fail with `AmbiguousPath`.
pub fn resolve(
    key: &str,
    shape: Option<&TypeShape>,
    separator: &str,
) -> Result<Resolved, CodecError> {
    let tokens = tokenize(key, separator);
    let Some(shape) = shape else {
        return Ok(Resolved {
            segments: untyped(&tokens),
            pattern: None,
        });
    };

    let mut segments = Vec::new();
    let mut pattern = String::new();
    let mut i = 0;
    while i < tokens.len() {
        let rest = &tokens[i..];
        let last = match shape.get(&pattern) {
            Some(Kind::Record) => {
                let Some((name, taken)) = match_field(shape, &pattern, rest) else {
                    trace!(key = %key, at = %pattern, "key is not declared");
                    segments.extend(untyped(rest));
                    return Ok(Resolved {
                        segments,
                        pattern: None,
                    });
                };
                pattern = shape.child(&pattern, &name.to_lowercase());
                segments.push(Segment::Field(name));
                i += taken;
                &tokens[i - 1]
            }
            Some(Kind::Map) => {
                let value = shape.child(&pattern, MAP_PLACEHOLDER);
                // Keys of leaf-valued maps may contain the separator.
                let taken = if shape.is_leaf(&value) { rest.len() } else { 1 };
                let last = &rest[taken - 1];
                let mut parts: Vec<String> = rest[..taken - 1].iter().map(Token::raw).collect();
                parts.push(last.name.clone());
                segments.push(Segment::Key(parts.join(separator)));
                pattern = value;
                i += taken;
                last
            }
            Some(kind) => {
                return Err(CodecError::ambiguous(
                    key,
                    format!("'{pattern}' is declared {kind:?} and cannot hold nested keys"),
                ));
            }
            None => {
                segments.extend(untyped(rest));
                return Ok(Resolved {
                    segments,
                    pattern: None,
                });
            }
        };
        for &index in &last.indices {
            if shape.get(&pattern) != Some(Kind::List) {
                return Err(CodecError::ambiguous(
                    key,
                    format!("'{pattern}' is not declared as a list"),
                ));
            }
            segments.push(Segment::Index(index));
            pattern.push_str(LIST_MARKER);
        }
    }

    Ok(Resolved {
        segments,
        pattern: Some(pattern),
    })
}

/// Longest run of tokens naming a declared field under `pattern`.
///
/// Index markers may only sit on the last token of the run.
fn match_field(shape: &TypeShape, pattern: &str, rest: &[Token]) -> Option<(String, usize)> {
    (1..=rest.len()).rev().find_map(|taken| {
        let run = &rest[..taken];
        if run[..taken - 1].iter().any(|t| !t.indices.is_empty()) {
            return None;
        }
        let name = run
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(shape.separator());
        shape
            .has_field(pattern, &name.to_lowercase())
            .then_some((name, taken))
    })
}

fn untyped(tokens: &[Token]) -> Vec<Segment> {
    let mut out = Vec::new();
    for token in tokens {
        out.push(Segment::Field(token.name.clone()));
        out.extend(token.indices.iter().map(|&i| Segment::Index(i)));
    }
    out
}

/// Type a raw leaf by its declared kind: bools and numbers parsed, leaf
/// lists split.
fn typed_leaf(value: &str, resolved: &Resolved, shape: Option<&TypeShape>) -> Node {
    let (Some(shape), Some(pattern)) = (shape, resolved.pattern.as_deref()) else {
        return Node::Str(value.to_string());
    };
    match shape.get(pattern) {
        Some(Kind::List) if shape.is_leaf(pattern) => {
            let element = shape.get(&format!("{pattern}{LIST_MARKER}"));
            match split_list(value) {
                Node::List(items) => Node::List(
                    items
                        .into_iter()
                        .map(|item| match item {
                            Node::Str(text) => type_text(&text, element),
                            other => other,
                        })
                        .collect(),
                ),
                other => other,
            }
        }
        kind => type_text(value, kind),
    }
}

/// Text that does not parse as its kind stays a string, so the decode step
/// reports the mismatch against the target field.
pub(crate) fn type_text(value: &str, kind: Option<Kind>) -> Node {
    let trimmed = value.trim();
    match kind {
        Some(Kind::Bool) => match trimmed.to_ascii_lowercase().as_str() {
            "true" => Node::Bool(true),
            "false" => Node::Bool(false),
            _ => Node::Str(value.to_string()),
        },
        Some(Kind::Number) => {
            if let Ok(n) = trimmed.parse::<i64>() {
                Node::Int(n)
            } else if let Ok(n) = trimmed.parse::<u64>() {
                Node::UInt(n)
            } else if trimmed.parse::<i128>().is_ok() || trimmed.parse::<u128>().is_ok() {
                // Wider than 64 bits: the digits are parsed by the target.
                Node::Str(value.to_string())
            } else {
                match trimmed.parse::<f64>() {
                    Ok(f) if !trimmed.is_empty() => Node::Float(f),
                    _ => Node::Str(value.to_string()),
                }
            }
        }
        _ => Node::Str(value.to_string()),
    }
}

/// Place `value` at `segments` below `root`, creating containers as needed.
///
/// Gaps in lists are filled with `Null`. Kind conflicts fail with
/// `AmbiguousPath` naming `key`.
pub(crate) fn insert(
    root: &mut Node,
    segments: &[Segment],
    value: Node,
    key: &str,
) -> Result<(), CodecError> {
    let mut current = root;
    for segment in segments {
        current = descend(current, segment, key)?;
    }
    if matches!(current, Node::Null) {
        *current = value;
        return Ok(());
    }
    match current {
        Node::Map(_) | Node::List(_) => Err(CodecError::ambiguous(
            key,
            "a value is set where other keys expect a container",
        )),
        _ => Err(CodecError::ambiguous(key, "more than one value for the same path")),
    }
}

fn descend<'a>(node: &'a mut Node, segment: &Segment, key: &str) -> Result<&'a mut Node, CodecError> {
    match segment {
        Segment::Index(index) => {
            if *index > MAX_LIST_INDEX {
                return Err(CodecError::Decode {
                    key: key.to_string(),
                    reason: format!("list index {index} exceeds {MAX_LIST_INDEX}"),
                });
            }
            if matches!(node, Node::Null) {
                *node = Node::List(Vec::new());
            }
            match node {
                Node::List(items) => {
                    if items.len() <= *index {
                        items.resize(*index + 1, Node::Null);
                    }
                    Ok(&mut items[*index])
                }
                _ => Err(CodecError::ambiguous(
                    key,
                    "a list index follows a path that is not a list",
                )),
            }
        }
        Segment::Field(name) | Segment::Key(name) => {
            if matches!(node, Node::Null) {
                *node = Node::Map(Vec::new());
            }
            match node {
                Node::Map(entries) => {
                    let pos = match entries.iter().position(|(k, _)| k == name) {
                        Some(pos) => pos,
                        None => {
                            entries.push((name.clone(), Node::Null));
                            entries.len() - 1
                        }
                    };
                    Ok(&mut entries[pos].1)
                }
                _ => Err(CodecError::ambiguous(
                    key,
                    format!("'{name}' is nested under a path that is not a map"),
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{Collection, Listing, Nested, Plain, Server};
    use crate::shape::{Described, Field, Shape, inspect};

    fn flat(pairs: &[(&str, &str)]) -> FlatMapping {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn s(v: &str) -> Node {
        Node::Str(v.into())
    }

    fn map(entries: Vec<(&str, Node)>) -> Node {
        Node::Map(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn untyped_nesting() {
        let node = unflatten(&flat(&[("database.url", "pg://")]), None, ".").unwrap();
        assert_eq!(node, map(vec![("database", map(vec![("url", s("pg://"))]))]));
    }

    #[test]
    fn index_markers_build_lists_in_order() {
        let node = unflatten(
            &flat(&[("foo[1]_name", "baz"), ("foo[0]_name", "bar")]),
            None,
            "_",
        )
        .unwrap();
        assert_eq!(
            node,
            map(vec![(
                "foo",
                Node::List(vec![
                    map(vec![("name", s("bar"))]),
                    map(vec![("name", s("baz"))]),
                ])
            )])
        );
    }

    #[test]
    fn gaps_are_null_placeholders() {
        let node = unflatten(&flat(&[("tags[2]", "c")]), None, ".").unwrap();
        assert_eq!(
            node,
            map(vec![("tags", Node::List(vec![Node::Null, Node::Null, s("c")]))])
        );
    }

    #[test]
    fn leaf_then_child_is_ambiguous() {
        let err = unflatten(&flat(&[("foo", "x"), ("foo_bar", "y")]), None, "_").unwrap_err();
        assert!(matches!(err, CodecError::AmbiguousPath { path, .. } if path == "foo_bar"));
    }

    #[test]
    fn child_then_leaf_is_ambiguous() {
        let err = unflatten(&flat(&[("a.b", "y"), ("a", "x")]), None, ".").unwrap_err();
        assert!(matches!(err, CodecError::AmbiguousPath { .. }));
    }

    #[test]
    fn list_then_map_is_ambiguous() {
        let err = unflatten(&flat(&[("foo[0]", "x"), ("foo_bar", "y")]), None, "_").unwrap_err();
        assert!(matches!(err, CodecError::AmbiguousPath { .. }));
    }

    #[test]
    fn scalar_field_with_nested_key_is_ambiguous() {
        let ts = inspect(&Plain::shape(), "_");
        let err = unflatten(&flat(&[("foo", "x"), ("foo_bar", "y")]), Some(&ts), "_").unwrap_err();
        assert!(matches!(err, CodecError::AmbiguousPath { path, .. } if path == "foo_bar"));
    }

    #[test]
    fn index_on_non_list_is_ambiguous() {
        let ts = inspect(&Plain::shape(), "_");
        let err = unflatten(&flat(&[("foo[0]", "x")]), Some(&ts), "_").unwrap_err();
        assert!(matches!(err, CodecError::AmbiguousPath { .. }));
    }

    #[test]
    fn shape_keeps_underscored_field_names_whole() {
        let ts = inspect(&Server::shape(), "_");
        let node = unflatten(&flat(&[("database_pool_size", "20")]), Some(&ts), "_").unwrap();
        assert_eq!(
            node,
            map(vec![("database", map(vec![("pool_size", Node::Int(20))]))])
        );
    }

    #[test]
    fn shape_types_bools_and_lists() {
        let ts = inspect(&Listing::shape(), "_");
        let node = unflatten(
            &flat(&[("enabled", "TRUE"), ("tags", "bar,baz")]),
            Some(&ts),
            "_",
        )
        .unwrap();
        assert_eq!(node.get("enabled"), Some(&Node::Bool(true)));
        assert_eq!(
            node.get("tags"),
            Some(&Node::List(vec![s("bar"), s("baz")]))
        );
    }

    #[test]
    fn shape_types_numbers() {
        let shape = Shape::record([
            Field::of::<Vec<u16>>("ports"),
            Field::of::<f64>("ratio"),
            Field::of::<u64>("big"),
            Field::of::<i32>("offset"),
        ]);
        let ts = inspect(&shape, "_");
        let node = unflatten(
            &flat(&[
                ("ports", "80,443"),
                ("ratio", "0.5"),
                ("big", "18446744073709551615"),
                ("offset", "x"),
            ]),
            Some(&ts),
            "_",
        )
        .unwrap();
        assert_eq!(
            node.get("ports"),
            Some(&Node::List(vec![Node::Int(80), Node::Int(443)]))
        );
        assert_eq!(node.get("ratio"), Some(&Node::Float(0.5)));
        assert_eq!(node.get("big"), Some(&Node::UInt(u64::MAX)));
        assert_eq!(node.get("offset"), Some(&s("x")));
    }

    #[test]
    fn map_at_the_root_takes_whole_keys() {
        let ts = inspect(&std::collections::HashMap::<String, String>::shape(), "_");
        let node = unflatten(&flat(&[("a_b", "1")]), Some(&ts), "_").unwrap();
        assert_eq!(node, map(vec![("a_b", s("1"))]));
    }

    #[test]
    fn empty_list_value_is_empty_list() {
        let ts = inspect(&Listing::shape(), "_");
        let node = unflatten(&flat(&[("tags", "")]), Some(&ts), "_").unwrap();
        assert_eq!(node.get("tags"), Some(&Node::List(vec![])));
    }

    #[test]
    fn map_keys_of_leaf_maps_keep_separators() {
        let ts = inspect(&Collection::shape(), ".");
        let node = unflatten(&flat(&[("labels.app.kubernetes.io", "web")]), Some(&ts), ".").unwrap();
        assert_eq!(
            node,
            map(vec![("labels", map(vec![("app.kubernetes.io", s("web"))]))])
        );
    }

    #[test]
    fn map_of_records_takes_one_segment() {
        let ts = inspect(&Nested::shape(), "_");
        let resolved = resolve("foo_name1_bar_value", Some(&ts), "_").unwrap();
        assert_eq!(
            resolved.segments,
            vec![
                Segment::Field("foo".into()),
                Segment::Key("name1".into()),
                Segment::Field("bar".into()),
                Segment::Field("value".into()),
            ]
        );
        assert_eq!(resolved.pattern.as_deref(), Some("foo_<name>_bar_value"));
    }

    #[test]
    fn unknown_keys_fall_back_to_plain_split() {
        let ts = inspect(&Plain::shape(), "_");
        let resolved = resolve("other_thing", Some(&ts), "_").unwrap();
        assert_eq!(
            resolved.segments,
            vec![Segment::Field("other".into()), Segment::Field("thing".into())]
        );
        assert_eq!(resolved.pattern, None);
    }

    #[test]
    fn oversized_index_rejected() {
        let err = unflatten(&flat(&[("tags[999999]", "x")]), None, ".").unwrap_err();
        assert!(matches!(err, CodecError::Decode { .. }));
    }

    #[test]
    fn empty_key_is_malformed() {
        let err = unflatten(&flat(&[("", "x")]), None, ".").unwrap_err();
        assert!(matches!(err, CodecError::MalformedToken { .. }));
    }
}
