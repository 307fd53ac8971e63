//! `KEY=value` lines, one per leaf, as found in `.env` files.
//!
//! ```text
//! DATABASE_POOL_SIZE=20
//! DATABASE_URL=postgres://db
//! TAGS=bar,baz
//! ```
//!
//! Names are upper-cased and joined with `_`; list indices are glued on as
//! `ITEMS[0]_NAME`. Decoding reads the same lines back, plus what dotenv
//! files commonly contain: blank lines, `#` comments, `export ` prefixes and
//! quoted values.

use std::borrow::Cow;

use tracing::debug;

use super::{Codec, utf8};
use crate::error::CodecError;
use crate::flatten::{FlatMapping, FlatOptions, LIST_DELIMITER, flatten};
use crate::path::PathStyle;
use crate::record::{Payload, Target};
use crate::shape::inspect;
use crate::types::ScalarLists;
use crate::unflatten::unflatten;

/// Name registered for the env codec.
pub const NAME: &str = "env";

const SEPARATOR: &str = "_";

#[derive(Debug, Clone, Default)]
pub struct EnvCodec {
    prefix: Option<String>,
}

impl EnvCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only read and write variables named `{prefix}_...`.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    /// Flatten a payload into variable name → value.
    pub fn encode_vars(&self, payload: Payload<'_>) -> Result<FlatMapping, CodecError> {
        let options = if payload.is_fields() {
            // Messages keep their declared field names.
            FlatOptions::new(PathStyle::new(SEPARATOR))
                .scalar_lists(ScalarLists::Joined(LIST_DELIMITER))
        } else {
            FlatOptions::env()
        };
        let flat = flatten(&payload.to_node()?, &options);
        Ok(match &self.prefix {
            Some(prefix) => flat
                .into_iter()
                .map(|(key, value)| (format!("{prefix}{SEPARATOR}{key}"), value))
                .collect(),
            None => flat,
        })
    }

    /// Decode from `(name, value)` pairs such as `std::env::vars()`.
    pub fn decode_vars(
        &self,
        vars: impl IntoIterator<Item = (String, String)>,
        target: Target<'_>,
    ) -> Result<(), CodecError> {
        self.decode_mapping(vars.into_iter().collect(), target)
    }

    fn decode_mapping(&self, vars: FlatMapping, mut target: Target<'_>) -> Result<(), CodecError> {
        let fields = target.is_fields();
        let flat: FlatMapping = vars
            .into_iter()
            .filter_map(|(key, value)| {
                let key = match &self.prefix {
                    Some(prefix) => key
                        .strip_prefix(prefix.as_str())?
                        .strip_prefix(SEPARATOR)?
                        .to_string(),
                    None => key,
                };
                let key = if fields { key } else { key.to_lowercase() };
                Some((key, value))
            })
            .collect();
        debug!(codec = NAME, keys = flat.len(), "decoding variables");
        let shape = inspect(&target.shape(), SEPARATOR);
        let node = unflatten(&flat, Some(&shape), SEPARATOR)?;
        target.assign(node)
    }
}

impl Codec for EnvCodec {
    fn name(&self) -> &str {
        NAME
    }

    fn marshal(&self, payload: Payload<'_>) -> Result<Vec<u8>, CodecError> {
        let vars = self.encode_vars(payload)?;
        debug!(codec = NAME, keys = vars.len(), "encoded variables");
        let lines: Vec<String> = vars
            .iter()
            .map(|(key, value)| format!("{key}={}", quote(value)))
            .collect();
        Ok(lines.join("\n").into_bytes())
    }

    fn unmarshal(&self, data: &[u8], target: Target<'_>) -> Result<(), CodecError> {
        let vars = parse_dotenv(utf8(data)?)?;
        self.decode_mapping(vars, target)
    }
}

/// Parse dotenv text into name → value. Later assignments win.
pub fn parse_dotenv(text: &str) -> Result<FlatMapping, CodecError> {
    let mut vars = FlatMapping::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            return Err(CodecError::MalformedToken {
                token: line.to_string(),
            });
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(CodecError::MalformedToken {
                token: line.to_string(),
            });
        }
        vars.insert(key.to_string(), unquote(value.trim_start()));
    }
    Ok(vars)
}

fn unquote(value: &str) -> String {
    if let Some(rest) = value.strip_prefix('"') {
        let mut out = String::new();
        let mut chars = rest.chars();
        while let Some(c) = chars.next() {
            match c {
                '"' => return out,
                '\\' => match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(other) => out.push(other),
                    None => out.push('\\'),
                },
                c => out.push(c),
            }
        }
        // Unterminated: keep what was read.
        return out;
    }
    if let Some(rest) = value.strip_prefix('\'') {
        return rest.split('\'').next().unwrap_or_default().to_string();
    }
    let value = match value.find(" #") {
        Some(pos) => &value[..pos],
        None => value,
    };
    value.trim_end().to_string()
}

/// Double-quote values that would not read back verbatim.
fn quote(value: &str) -> Cow<'_, str> {
    let plain = !value.contains(['\n', '\t', '"', '\\'])
        && !value.contains(" #")
        && !value.starts_with(['\'', '"'])
        && value.trim() == value;
    if plain {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('"');
    Cow::Owned(out)
}
