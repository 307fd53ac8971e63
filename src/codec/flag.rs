//! Command-line style `--key=value` tokens separated by single spaces.
//!
//! ```text
//! --database.pool_size=20 --debug=true --tags=bar,baz
//! ```
//!
//! Encoding goes through the JSON codec first, so keys and scalar forms are
//! the ones JSON produces (durations read `120.000000022s`). Decoding accepts
//! bare boolean flags (`--debug`) and repeated list flags
//! (`--tag=a --tag=b`), both recognised from the target's declared shape.
//!
//! Values are written as they are, without quoting. A value containing
//! whitespace splits into extra tokens and does not read back.

use std::collections::btree_map::Entry;

use tracing::debug;

use super::json::JsonCodec;
use super::{Codec, utf8};
use crate::error::CodecError;
use crate::flatten::{FlatMapping, FlatOptions, LIST_DELIMITER, flatten};
use crate::node::Node;
use crate::record::{Payload, Target};
use crate::shape::{TypeShape, inspect};
use crate::types::Kind;
use crate::unflatten::unflatten;

/// Name registered for the flag codec.
pub const NAME: &str = "flag";

const SEPARATOR: &str = ".";

#[derive(Debug, Clone, Copy, Default)]
pub struct FlagCodec;

impl FlagCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for FlagCodec {
    fn name(&self) -> &str {
        NAME
    }

    fn marshal(&self, payload: Payload<'_>) -> Result<Vec<u8>, CodecError> {
        let json = JsonCodec.marshal(payload)?;
        let node: Node = serde_json::from_slice(&json)?;
        let flat = flatten(&node, &FlatOptions::flag());
        debug!(codec = NAME, keys = flat.len(), "encoded flags");
        let tokens: Vec<String> = flat
            .iter()
            .map(|(key, value)| format!("--{key}={value}"))
            .collect();
        Ok(tokens.join(" ").into_bytes())
    }

    fn unmarshal(&self, data: &[u8], mut target: Target<'_>) -> Result<(), CodecError> {
        let shape = inspect(&target.shape(), SEPARATOR);
        let flat = parse_flags(utf8(data)?.split_whitespace(), Some(&shape))?;
        debug!(codec = NAME, keys = flat.len(), "decoding flags");
        let node = unflatten(&flat, Some(&shape), SEPARATOR)?;
        target.assign(node)
    }
}

/// Collect `--key=value` tokens into key → value.
///
/// Leading dashes are optional. A token without `=` is `true` when `shape`
/// declares a bool at that key, and malformed otherwise. Repeating a key
/// declared as a list appends to it; repeating any other key keeps the last.
pub fn parse_flags<'a>(
    tokens: impl IntoIterator<Item = &'a str>,
    shape: Option<&TypeShape>,
) -> Result<FlatMapping, CodecError> {
    let kind_of = |key: &str| shape.and_then(|s| s.kind_of(key));
    let mut flags = FlatMapping::new();
    for token in tokens {
        let body = token.trim_start_matches('-');
        let (key, value) = match body.split_once('=') {
            Some((key, value)) => (key, value.to_string()),
            None if !body.is_empty() && kind_of(body) == Some(Kind::Bool) => (body, "true".to_string()),
            None => {
                return Err(CodecError::MalformedToken {
                    token: token.to_string(),
                });
            }
        };
        if key.is_empty() {
            return Err(CodecError::MalformedToken {
                token: token.to_string(),
            });
        }
        let list = kind_of(key) == Some(Kind::List);
        match flags.entry(key.to_string()) {
            Entry::Occupied(mut existing) if list => {
                let joined = existing.get_mut();
                joined.push(LIST_DELIMITER);
                joined.push_str(&value);
            }
            Entry::Occupied(mut existing) => {
                existing.insert(value);
            }
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }
    }
    Ok(flags)
}
