//! Flatten a [`Node`] tree into path → text pairs.
//!
//! `Outer { database: Inner { url: "pg://" } }` → `[("database.url", "pg://")]`
//!
//! The result is a `BTreeMap`, so iteration is always in sorted key order no
//! matter how the value was built.

use std::collections::BTreeMap;

use crate::node::Node;
use crate::path::{PathStyle, Segment};
use crate::types::ScalarLists;

/// Canonical path → scalar text.
pub type FlatMapping = BTreeMap<String, String>;

/// Separator used when a list of scalars is written as one value.
pub const LIST_DELIMITER: char = ',';

/// How paths are rendered and which leaves are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatOptions {
    pub style: PathStyle,
    pub scalar_lists: ScalarLists,
    /// Drop leaves whose text is empty.
    pub omit_empty: bool,
}

impl FlatOptions {
    pub fn new(style: PathStyle) -> Self {
        Self {
            style,
            scalar_lists: ScalarLists::default(),
            omit_empty: false,
        }
    }

    /// `FOO_BAR=a,b`: upper-case, `_`-separated, scalar lists joined.
    pub fn env() -> Self {
        Self::new(PathStyle::env()).scalar_lists(ScalarLists::Joined(LIST_DELIMITER))
    }

    /// `foo.bar=a,b`: names as declared, `.`-separated, scalar lists joined.
    pub fn flag() -> Self {
        Self::new(PathStyle::flag()).scalar_lists(ScalarLists::Joined(LIST_DELIMITER))
    }

    pub fn scalar_lists(mut self, scalar_lists: ScalarLists) -> Self {
        self.scalar_lists = scalar_lists;
        self
    }

    pub fn omit_empty(mut self, omit_empty: bool) -> Self {
        self.omit_empty = omit_empty;
        self
    }
}

/// Flatten `node` into one entry per reachable leaf.
///
/// `Null` leaves (absent optionals) produce no entry; zero values do.
pub fn flatten(node: &Node, options: &FlatOptions) -> FlatMapping {
    let mut out = FlatMapping::new();
    walk(node, "", options, &mut out);
    out
}

fn walk(node: &Node, path: &str, options: &FlatOptions, out: &mut FlatMapping) {
    match node {
        Node::Null => {}
        Node::Map(entries) => {
            for (key, value) in entries {
                let child = options.style.push(path, &Segment::Key(key.clone()));
                walk(value, &child, options, out);
            }
        }
        Node::List(items) => match options.scalar_lists {
            ScalarLists::Joined(sep) if items.iter().all(Node::is_scalar) => {
                let joined = items
                    .iter()
                    .filter_map(Node::text)
                    .collect::<Vec<_>>()
                    .join(&sep.to_string());
                emit(path, joined, options, out);
            }
            _ => {
                for (i, item) in items.iter().enumerate() {
                    let child = options.style.push(path, &Segment::Index(i));
                    walk(item, &child, options, out);
                }
            }
        },
        scalar => {
            if let Some(text) = scalar.text() {
                emit(path, text, options, out);
            }
        }
    }
}

fn emit(path: &str, text: String, options: &FlatOptions, out: &mut FlatMapping) {
    if options.omit_empty && text.is_empty() {
        return;
    }
    out.insert(path.to_string(), text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::to_node;
    use serde::Serialize;
    use std::collections::HashMap;
    use std::time::Duration;

    fn dotted() -> FlatOptions {
        FlatOptions::new(PathStyle::flag())
    }

    fn pairs(flat: &FlatMapping) -> Vec<(&str, &str)> {
        flat.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }

    #[test]
    fn flat_struct() {
        #[derive(Serialize)]
        struct Args {
            host: String,
            port: u16,
        }
        let node = to_node(&Args {
            host: "0.0.0.0".into(),
            port: 3000,
        })
        .unwrap();
        let flat = flatten(&node, &dotted());
        assert_eq!(pairs(&flat), vec![("host", "0.0.0.0"), ("port", "3000")]);
    }

    #[test]
    fn option_none_emits_nothing() {
        #[derive(Serialize)]
        struct Args {
            host: Option<String>,
            port: u16,
        }
        let node = to_node(&Args {
            host: None,
            port: 0,
        })
        .unwrap();
        let flat = flatten(&node, &dotted());
        assert_eq!(pairs(&flat), vec![("port", "0")]);
    }

    #[test]
    fn nested_struct() {
        #[derive(Serialize)]
        struct Inner {
            url: String,
        }
        #[derive(Serialize)]
        struct Outer {
            database: Inner,
        }
        let node = to_node(&Outer {
            database: Inner {
                url: "pg://".into(),
            },
        })
        .unwrap();
        let flat = flatten(&node, &dotted());
        assert_eq!(pairs(&flat), vec![("database.url", "pg://")]);
    }

    #[test]
    fn env_style_keys_are_sorted_and_upper_cased() {
        #[derive(Serialize)]
        struct Flags {
            foo: bool,
            bar: bool,
        }
        let node = to_node(&Flags {
            foo: true,
            bar: true,
        })
        .unwrap();
        let flat = flatten(&node, &FlatOptions::env());
        assert_eq!(pairs(&flat), vec![("BAR", "true"), ("FOO", "true")]);
    }

    #[test]
    fn hashmap_entries_become_segments() {
        let mut map = HashMap::new();
        map.insert("name".to_string(), "bar".to_string());
        #[derive(Serialize)]
        struct Holder {
            foo: HashMap<String, String>,
        }
        let node = to_node(&Holder { foo: map }).unwrap();
        let flat = flatten(&node, &FlatOptions::env());
        assert_eq!(pairs(&flat), vec![("FOO_NAME", "bar")]);
    }

    #[test]
    fn records_in_lists_are_indexed() {
        #[derive(Serialize)]
        struct Item {
            name: String,
        }
        #[derive(Serialize)]
        struct Holder {
            foo: Vec<Item>,
        }
        let node = to_node(&Holder {
            foo: vec![Item { name: "bar".into() }, Item { name: "baz".into() }],
        })
        .unwrap();
        let flat = flatten(&node, &FlatOptions::env());
        assert_eq!(
            pairs(&flat),
            vec![("FOO[0]_NAME", "bar"), ("FOO[1]_NAME", "baz")]
        );
    }

    #[test]
    fn scalar_lists_joined_or_indexed() {
        let node = Node::Map(vec![(
            "tags".into(),
            Node::List(vec![Node::Str("bar".into()), Node::Str("baz".into())]),
        )]);
        let joined = flatten(&node, &FlatOptions::env());
        assert_eq!(pairs(&joined), vec![("TAGS", "bar,baz")]);

        let indexed = flatten(&node, &dotted());
        assert_eq!(pairs(&indexed), vec![("tags[0]", "bar"), ("tags[1]", "baz")]);
    }

    #[test]
    fn empty_joined_list_is_empty_value() {
        let node = Node::Map(vec![("tags".into(), Node::List(vec![]))]);
        assert_eq!(pairs(&flatten(&node, &FlatOptions::env())), vec![("TAGS", "")]);
        assert!(flatten(&node, &dotted()).is_empty());
    }

    #[test]
    fn omit_empty_drops_blank_leaves() {
        let node = Node::Map(vec![
            ("username".into(), Node::Str("sraph".into())),
            ("password".into(), Node::Str(String::new())),
        ]);
        let kept = flatten(&node, &dotted());
        assert_eq!(kept.len(), 2);
        let omitted = flatten(&node, &dotted().omit_empty(true));
        assert_eq!(pairs(&omitted), vec![("username", "sraph")]);
    }

    #[test]
    fn empty_struct() {
        #[derive(Serialize)]
        struct Empty {}
        let flat = flatten(&to_node(&Empty {}).unwrap(), &dotted());
        assert!(flat.is_empty());
    }

    #[test]
    fn well_known_scalars_use_text_forms() {
        #[derive(Serialize)]
        struct Timing {
            timeout: Duration,
            rate: f64,
        }
        let node = to_node(&Timing {
            timeout: Duration::new(120, 22),
            rate: 1.5,
        })
        .unwrap();
        let flat = flatten(&node, &dotted());
        assert_eq!(
            pairs(&flat),
            vec![("rate", "1.5"), ("timeout", "2m0.000000022s")]
        );
    }

    #[test]
    fn deterministic_output() {
        let node = Node::Map(vec![
            ("b".into(), Node::Int(2)),
            ("a".into(), Node::Map(vec![("z".into(), Node::Int(1))])),
        ]);
        let first = flatten(&node, &dotted());
        let second = flatten(&node, &dotted());
        assert_eq!(first, second);
        assert_eq!(pairs(&first), vec![("a.z", "1"), ("b", "2")]);
    }
}
