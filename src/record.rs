//! The two ways a value can be handed to a codec.
//!
//! Most values go through serde: they are captured as a [`Node`], flattened,
//! and decoded back with the weak decoder. Values that track field presence
//! (generated message types, for instance) implement [`FieldAccessor`]
//! instead, and are read and written field by field so an unset field stays
//! distinguishable from one explicitly set to an empty value.
//!
//! The choice is made once per call by building a [`Payload`] or [`Target`].

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::decode::from_node;
use crate::error::CodecError;
use crate::merge::deep_merge;
use crate::node::{self, Node};
use crate::shape::{Described, Field, Shape};

/// A serde value with a declared shape.
///
/// Blanket-implemented for every `Serialize + DeserializeOwned + Described`
/// type; the trait exists so codecs can hold one behind `dyn`.
pub trait Record {
    fn to_node(&self) -> Result<Node, CodecError>;

    fn shape(&self) -> Shape;

    /// Overwrite `self` with `node` laid over its current value.
    ///
    /// Keys absent from `node` keep their current values. On error `self`
    /// is left untouched.
    fn assign(&mut self, node: Node) -> Result<(), CodecError>;
}

impl<T> Record for T
where
    T: Serialize + DeserializeOwned + Described,
{
    fn to_node(&self) -> Result<Node, CodecError> {
        node::to_node(self)
    }

    fn shape(&self) -> Shape {
        T::shape()
    }

    fn assign(&mut self, node: Node) -> Result<(), CodecError> {
        let merged = deep_merge(node::to_node(self)?, node);
        *self = from_node(merged)?;
        Ok(())
    }
}

/// Whether a field holds one value, a list, or a string-keyed map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Singular,
    Repeated,
    Map,
}

/// A declared field of a [`FieldAccessor`].
///
/// A `Shape::Record` shape marks a nested message, reached through
/// [`FieldAccessor::message`] rather than `get`/`set`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub shape: Shape,
}

impl FieldDescriptor {
    pub fn new(name: &str, shape: Shape) -> Self {
        Self {
            name: name.to_string(),
            shape,
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        match self.shape {
            Shape::List(_) => Cardinality::Repeated,
            Shape::Map(_) => Cardinality::Map,
            _ => Cardinality::Singular,
        }
    }

    pub fn is_message(&self) -> bool {
        matches!(self.shape, Shape::Record(_))
    }
}

/// Direct, presence-aware access to a message's fields.
///
/// Repeated fields are `Node::List`, map fields `Node::Map`, everything else a
/// scalar node. `set` receives text-typed nodes from flat formats;
/// implementations typically convert them with [`from_node`].
pub trait FieldAccessor {
    /// Declared fields, in declaration order.
    fn fields(&self) -> Vec<FieldDescriptor>;

    /// Current value, or `None` when the field is unset.
    fn get(&self, name: &str) -> Option<Node>;

    fn set(&mut self, name: &str, value: Node) -> Result<(), CodecError>;

    /// Nested message, or `None` when it is unset.
    fn message(&self, name: &str) -> Option<&dyn FieldAccessor>;

    /// Nested message, created empty when unset.
    fn message_mut(&mut self, name: &str) -> Option<&mut dyn FieldAccessor>;
}

/// Value being encoded.
#[derive(Clone, Copy)]
pub enum Payload<'a> {
    Fields(&'a dyn FieldAccessor),
    Generic(&'a dyn Record),
}

impl Payload<'_> {
    pub fn to_node(&self) -> Result<Node, CodecError> {
        match self {
            Payload::Fields(accessor) => Ok(accessor_node(*accessor)),
            Payload::Generic(record) => record.to_node(),
        }
    }

    pub fn is_fields(&self) -> bool {
        matches!(self, Payload::Fields(_))
    }
}

/// Value being decoded into.
pub enum Target<'a> {
    Fields(&'a mut dyn FieldAccessor),
    Generic(&'a mut dyn Record),
}

impl Target<'_> {
    pub fn shape(&self) -> Shape {
        match self {
            Target::Fields(accessor) => accessor_shape(&**accessor),
            Target::Generic(record) => record.shape(),
        }
    }

    pub fn is_fields(&self) -> bool {
        matches!(self, Target::Fields(_))
    }

    /// Store a decoded tree.
    ///
    /// Generic targets are replaced only when the whole tree decodes. Field
    /// accessors are written field by field, so fields set before a failing
    /// one keep their new values.
    pub fn assign(&mut self, node: Node) -> Result<(), CodecError> {
        match self {
            Target::Fields(accessor) => assign_fields(&mut **accessor, node, ""),
            Target::Generic(record) => record.assign(node),
        }
    }
}

/// Capture the set fields of `accessor` as a map, keyed by declared name.
pub fn accessor_node(accessor: &dyn FieldAccessor) -> Node {
    let mut entries = Vec::new();
    for field in accessor.fields() {
        let value = if field.is_message() {
            accessor.message(&field.name).map(accessor_node)
        } else {
            accessor.get(&field.name)
        };
        if let Some(value) = value {
            entries.push((field.name, value));
        }
    }
    Node::Map(entries)
}

/// Record shape built from the accessor's descriptors.
pub fn accessor_shape(accessor: &dyn FieldAccessor) -> Shape {
    Shape::record(
        accessor
            .fields()
            .into_iter()
            .map(|field| Field::new(&field.name, field.shape)),
    )
}

fn assign_fields(accessor: &mut dyn FieldAccessor, node: Node, path: &str) -> Result<(), CodecError> {
    let Node::Map(entries) = node else {
        return Err(CodecError::Decode {
            key: path.to_string(),
            reason: "expected a map of fields".into(),
        });
    };
    let fields = accessor.fields();
    for (key, value) in entries {
        let key_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };
        let Some(field) = fields
            .iter()
            .find(|f| f.name == key)
            .or_else(|| fields.iter().find(|f| f.name.eq_ignore_ascii_case(&key)))
        else {
            debug!(key = %key_path, "ignoring key the message does not declare");
            continue;
        };
        if field.is_message() {
            match accessor.message_mut(&field.name) {
                Some(message) => assign_fields(message, value, &key_path)?,
                None => debug!(key = %key_path, "message field is not writable"),
            }
        } else {
            accessor
                .set(&field.name, value)
                .map_err(|e| e.at(&key_path))?;
        }
    }
    Ok(())
}
