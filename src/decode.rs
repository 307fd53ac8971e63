//! Weakly-typed decoding of a [`Node`] into any `Deserialize` type.
//!
//! Flat formats carry only text, so the decoder is lenient where the target
//! type asks for more: `"20"` fills a `u16`, `"true"` a `bool`, `"a,b"` a
//! `Vec<String>`, `"2m0s"` a `Duration`, an RFC 3339 string a `SystemTime`
//! and base64 a byte buffer. Absent fields decode as zero values, and field
//! names match regardless of ASCII case.

use std::fmt::Display;
use std::str::FromStr;
use std::time::{Duration, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess,
    VariantAccess, Visitor,
};
use tracing::debug;

use crate::error::CodecError;
use crate::flatten::LIST_DELIMITER;
use crate::node::Node;
use crate::scalar;

const DURATION_FIELDS: &[&str] = &["secs", "nanos"];
const SYSTEM_TIME_FIELDS: &[&str] = &["secs_since_epoch", "nanos_since_epoch"];

/// Decode `node` into `T`, coercing text into the types `T` declares.
///
/// Keys `T` does not declare are skipped and logged at debug level, unless
/// `T` denies unknown fields, in which case decoding fails with
/// [`CodecError::UnknownField`].
pub fn from_node<T: DeserializeOwned>(node: Node) -> Result<T, CodecError> {
    serde_ignored::deserialize(NodeDeserializer::new(node, String::new()), |path| {
        debug!(path = %path, "ignoring key the target does not declare");
    })
}

/// Serde `Deserializer` over an owned [`Node`]. `path` names the location
/// for error messages, dotted with `[i]` for list elements.
pub struct NodeDeserializer {
    node: Node,
    path: String,
}

impl NodeDeserializer {
    pub fn new(node: Node, path: String) -> Self {
        Self { node, path }
    }

    fn integer<T>(&self) -> Result<T, CodecError>
    where
        T: TryFrom<i64> + TryFrom<u64> + FromStr,
        <T as FromStr>::Err: Display,
    {
        let out_of_range = || CodecError::Message(format!("{} is out of range", describe(&self.node)));
        match &self.node {
            Node::Null => T::try_from(0u64).map_err(|_| out_of_range()),
            Node::Bool(b) => T::try_from(u64::from(*b)).map_err(|_| out_of_range()),
            Node::Int(i) => T::try_from(*i).map_err(|_| out_of_range()),
            Node::UInt(u) => T::try_from(*u).map_err(|_| out_of_range()),
            Node::Float(f) if f.fract() == 0.0 => T::try_from(*f as i64).map_err(|_| out_of_range()),
            Node::Str(s) if s.trim().is_empty() => T::try_from(0u64).map_err(|_| out_of_range()),
            Node::Str(s) => s
                .trim()
                .parse::<T>()
                .map_err(|e| CodecError::Message(format!("invalid number '{s}': {e}"))),
            other => Err(unexpected(other, "an integer")),
        }
    }

    fn float(&self) -> Result<f64, CodecError> {
        match &self.node {
            Node::Null => Ok(0.0),
            Node::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Node::Int(i) => Ok(*i as f64),
            Node::UInt(u) => Ok(*u as f64),
            Node::Float(f) => Ok(*f),
            Node::Str(s) if s.trim().is_empty() => Ok(0.0),
            Node::Str(s) => s
                .trim()
                .parse()
                .map_err(|e| CodecError::Message(format!("invalid number '{s}': {e}"))),
            other => Err(unexpected(other, "a number")),
        }
    }

    fn boolean(&self) -> Result<bool, CodecError> {
        match &self.node {
            Node::Null => Ok(false),
            Node::Bool(b) => Ok(*b),
            Node::Int(i) => Ok(*i != 0),
            Node::UInt(u) => Ok(*u != 0),
            Node::Float(f) => Ok(*f != 0.0),
            Node::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "t" | "true" => Ok(true),
                "" | "0" | "f" | "false" => Ok(false),
                _ => Err(CodecError::Message(format!("invalid boolean '{s}'"))),
            },
            other => Err(unexpected(other, "a boolean")),
        }
    }

    fn into_text(self) -> Result<String, CodecError> {
        match self.node {
            Node::Null => Ok(String::new()),
            Node::Str(s) => Ok(s),
            other => other.text().ok_or_else(|| unexpected(&other, "a string")),
        }
    }

    /// `None` when the node should decode as a plain record instead.
    fn duration(&self) -> Result<Option<Duration>, CodecError> {
        match &self.node {
            Node::Null => Ok(Some(Duration::ZERO)),
            Node::Duration(d) => Ok(Some(*d)),
            Node::UInt(u) => Ok(Some(Duration::from_nanos(*u))),
            Node::Int(i) => u64::try_from(*i)
                .map(|n| Some(Duration::from_nanos(n)))
                .map_err(|_| CodecError::Message(format!("negative duration {i}"))),
            Node::Str(s) => scalar::parse_duration(s)
                .map(Some)
                .map_err(CodecError::Message),
            _ => Ok(None),
        }
    }

    /// Time since the epoch, or `None` when the node is a plain record.
    fn timestamp(&self) -> Result<Option<Duration>, CodecError> {
        let time = match &self.node {
            Node::Null => return Ok(Some(Duration::ZERO)),
            Node::Timestamp(t) => *t,
            Node::Str(s) => scalar::parse_timestamp(s).map_err(CodecError::Message)?,
            _ => return Ok(None),
        };
        time.duration_since(UNIX_EPOCH)
            .map(Some)
            .map_err(|_| CodecError::Message("timestamp is before the Unix epoch".into()))
    }

    fn time_parts<'de, V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        since: Duration,
        visitor: V,
    ) -> Result<V::Value, CodecError> {
        let entries = vec![
            (fields[0].to_string(), Node::UInt(since.as_secs())),
            (fields[1].to_string(), Node::UInt(u64::from(since.subsec_nanos()))),
        ];
        visitor.visit_map(MapNode::new(entries, self.path))
    }
}

macro_rules! weak_integer {
    ($($method:ident => $ty:ty, $visit:ident;)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                let value: $ty = self.integer()?;
                visitor.$visit(value)
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for NodeDeserializer {
    type Error = CodecError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.node {
            Node::Null => visitor.visit_unit(),
            Node::Bool(b) => visitor.visit_bool(b),
            Node::Int(i) => visitor.visit_i64(i),
            Node::UInt(u) => visitor.visit_u64(u),
            Node::Float(f) => visitor.visit_f64(f),
            Node::Str(s) => visitor.visit_string(s),
            Node::Bytes(b) => visitor.visit_byte_buf(b),
            Node::Duration(d) => visitor.visit_string(scalar::format_duration(d)),
            Node::Timestamp(t) => match scalar::format_timestamp(t) {
                Some(text) => visitor.visit_string(text),
                None => Err(CodecError::UnsupportedValue(
                    "timestamp is outside years 0 to 9999".into(),
                )),
            },
            Node::List(items) => visitor.visit_seq(SeqNode::new(items, self.path)),
            Node::Map(entries) => visitor.visit_map(MapNode::new(entries, self.path)),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_bool(self.boolean()?)
    }

    weak_integer! {
        deserialize_i8 => i8, visit_i8;
        deserialize_i16 => i16, visit_i16;
        deserialize_i32 => i32, visit_i32;
        deserialize_i64 => i64, visit_i64;
        deserialize_u8 => u8, visit_u8;
        deserialize_u16 => u16, visit_u16;
        deserialize_u32 => u32, visit_u32;
        deserialize_u64 => u64, visit_u64;
        deserialize_i128 => i128, visit_i128;
        deserialize_u128 => u128, visit_u128;
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_f32(self.float()? as f32)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_f64(self.float()?)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let text = self.into_text()?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(CodecError::Message(format!(
                "expected a single character, found '{text}'"
            ))),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_string(self.into_text()?)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.node {
            Node::Null => visitor.visit_byte_buf(Vec::new()),
            Node::Bytes(b) => visitor.visit_byte_buf(b),
            Node::Str(s) => {
                let bytes = BASE64
                    .decode(s.trim())
                    .map_err(|e| CodecError::Message(format!("invalid base64 '{s}': {e}")))?;
                visitor.visit_byte_buf(bytes)
            }
            other => Err(unexpected(&other, "bytes")),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.node {
            Node::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    /// Lists pass through; a string is split on commas; any other scalar
    /// becomes a one-element list.
    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let items = match self.node {
            Node::List(items) => items,
            Node::Null => Vec::new(),
            Node::Str(s) if s.is_empty() => Vec::new(),
            Node::Str(s) => s
                .split(LIST_DELIMITER)
                .map(|part| Node::Str(part.to_string()))
                .collect(),
            other @ Node::Map(_) => return Err(unexpected(&other, "a list")),
            scalar => vec![scalar],
        };
        visitor.visit_seq(SeqNode::new(items, self.path))
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.node {
            Node::Map(entries) => visitor.visit_map(MapNode::new(entries, self.path)),
            Node::Null => visitor.visit_map(MapNode::new(Vec::new(), self.path)),
            other => Err(unexpected(&other, "a map")),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        if name == "Duration" && fields == DURATION_FIELDS {
            if let Some(d) = self.duration()? {
                return self.time_parts(fields, d, visitor);
            }
        } else if name == "SystemTime" && fields == SYSTEM_TIME_FIELDS {
            if let Some(since) = self.timestamp()? {
                return self.time_parts(fields, since, visitor);
            }
        }
        match self.node {
            Node::Map(entries) => visitor.visit_map(MapNode::record(entries, fields, self.path)),
            Node::Null => visitor.visit_map(MapNode::record(Vec::new(), fields, self.path)),
            other => Err(unexpected(&other, "a record")),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        let (variant, value) = match self.node {
            // The first variant is the zero value.
            Node::Null => match variants.first() {
                Some(first) => (first.to_string(), None),
                None => return Err(CodecError::Message("enum has no variants".into())),
            },
            Node::Str(s) => (s, None),
            Node::Map(entries) if entries.len() == 1 => {
                let mut entries = entries.into_iter();
                match entries.next() {
                    Some((variant, value)) => (variant, Some(value)),
                    None => return Err(CodecError::Message("empty enum map".into())),
                }
            }
            other => return Err(unexpected(&other, "an enum variant")),
        };
        let variant = variants
            .iter()
            .find(|v| v.eq_ignore_ascii_case(&variant))
            .map_or(variant, |v| v.to_string());
        visitor.visit_enum(EnumNode {
            variant,
            value,
            path: self.path,
        })
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }
}

fn describe(node: &Node) -> String {
    match node {
        Node::Null => "nothing".into(),
        Node::List(_) => "a list".into(),
        Node::Map(_) => "a map".into(),
        scalar => format!("'{}'", scalar.text().unwrap_or_default()),
    }
}

fn unexpected(node: &Node, expected: &str) -> CodecError {
    CodecError::Message(format!("expected {expected}, found {}", describe(node)))
}

fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

// --- SeqAccess ---

struct SeqNode {
    items: std::vec::IntoIter<Node>,
    index: usize,
    path: String,
}

impl SeqNode {
    fn new(items: Vec<Node>, path: String) -> Self {
        Self {
            items: items.into_iter(),
            index: 0,
            path,
        }
    }
}

impl<'de> SeqAccess<'de> for SeqNode {
    type Error = CodecError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Self::Error> {
        let Some(node) = self.items.next() else {
            return Ok(None);
        };
        let path = format!("{}[{}]", self.path, self.index);
        self.index += 1;
        seed.deserialize(NodeDeserializer::new(node, path.clone()))
            .map(Some)
            .map_err(|e| e.at(&path))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

// --- MapAccess ---

struct MapNode {
    entries: std::vec::IntoIter<(String, Node)>,
    pending: Option<(String, Node)>,
    path: String,
}

impl MapNode {
    fn new(entries: Vec<(String, Node)>, path: String) -> Self {
        Self {
            entries: entries.into_iter(),
            pending: None,
            path,
        }
    }

    /// Entries of a record: keys renamed to the declared spelling when they
    /// match ignoring ASCII case, and every declared field that is missing
    /// added as `Null` so it decodes to its zero value.
    fn record(entries: Vec<(String, Node)>, fields: &'static [&'static str], path: String) -> Self {
        let mut out: Vec<(String, Node)> = entries
            .into_iter()
            .map(|(key, value)| {
                let declared = fields
                    .iter()
                    .find(|f| **f == key)
                    .or_else(|| fields.iter().find(|f| f.eq_ignore_ascii_case(&key)));
                match declared {
                    Some(name) => (name.to_string(), value),
                    None => (key, value),
                }
            })
            .collect();
        for field in fields {
            if !out.iter().any(|(k, _)| k == field) {
                out.push((field.to_string(), Node::Null));
            }
        }
        Self::new(out, path)
    }
}

impl<'de> MapAccess<'de> for MapNode {
    type Error = CodecError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        let Some((key, value)) = self.entries.next() else {
            return Ok(None);
        };
        let path = child(&self.path, &key);
        let decoded = seed
            .deserialize(NodeDeserializer::new(Node::Str(key.clone()), path.clone()))
            .map_err(|e| e.at(&path))?;
        self.pending = Some((path, value));
        Ok(Some(decoded))
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, Self::Error> {
        let (path, value) = self
            .pending
            .take()
            .ok_or_else(|| CodecError::Message("map value requested before its key".into()))?;
        seed.deserialize(NodeDeserializer::new(value, path.clone()))
            .map_err(|e| e.at(&path))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

// --- EnumAccess ---

struct EnumNode {
    variant: String,
    value: Option<Node>,
    path: String,
}

impl<'de> EnumAccess<'de> for EnumNode {
    type Error = CodecError;
    type Variant = VariantNode;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, Self::Variant), Self::Error> {
        let deserializer: de::value::StringDeserializer<CodecError> =
            self.variant.into_deserializer();
        let variant = seed.deserialize(deserializer)?;
        Ok((
            variant,
            VariantNode {
                value: self.value.unwrap_or(Node::Null),
                path: self.path,
            },
        ))
    }
}

struct VariantNode {
    value: Node,
    path: String,
}

impl<'de> VariantAccess<'de> for VariantNode {
    type Error = CodecError;

    fn unit_variant(self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(
        self,
        seed: T,
    ) -> Result<T::Value, Self::Error> {
        seed.deserialize(NodeDeserializer::new(self.value, self.path))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, Self::Error> {
        de::Deserializer::deserialize_seq(NodeDeserializer::new(self.value, self.path), visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        de::Deserializer::deserialize_struct(
            NodeDeserializer::new(self.value, self.path),
            "",
            fields,
            visitor,
        )
    }
}
