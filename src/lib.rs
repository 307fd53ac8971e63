//! Pluggable codecs that move structured values through flat text formats.
//!
//! flatcodec turns a nested value (a struct of structs, lists and maps) into
//! environment-variable lines, command-line flags or a form body, and reads
//! those flat formats back into the same nested value. JSON, TOML and YAML
//! codecs share the same contract so callers can pick a format by name.
//!
//! ```
//! use flatcodec::{CodecExt, Described, EnvCodec, Field, Shape};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
//! struct Server {
//!     port: u16,
//!     tags: Vec<String>,
//! }
//!
//! impl Described for Server {
//!     fn shape() -> Shape {
//!         Shape::record([Field::of::<u16>("port"), Field::of::<Vec<String>>("tags")])
//!     }
//! }
//!
//! let server = Server { port: 8080, tags: vec!["a".into(), "b".into()] };
//! let text = EnvCodec::new().encode(&server).unwrap();
//! assert_eq!(text, b"PORT=8080\nTAGS=a,b");
//!
//! let back: Server = EnvCodec::new().decode(&text).unwrap();
//! assert_eq!(back, server);
//! ```
//!
//! # Pipeline
//!
//! ```text
//! encode:  value ─► Node ─► flatten ─► FlatMapping (sorted) ─► text
//! decode:  text ─► FlatMapping ─► unflatten (guided by TypeShape) ─► Node ─► weak decode ─► value
//! ```
//!
//! - [`Node`] is the in-memory tree every codec works on. Any `Serialize`
//!   value is captured with [`to_node`]; `Node` is itself serde-compatible,
//!   so the JSON, TOML and YAML codecs hand it straight to their library.
//! - [`flatten`] walks a tree depth first and emits one `path → text` entry
//!   per leaf. Output is a `BTreeMap`, so key order is always sorted.
//! - [`unflatten`] rebuilds the tree from flat keys. Flat keys are lossy:
//!   `FOO_BAR` could be field `foo_bar` or field `bar` inside `foo`. The
//!   [`TypeShape`] built by [`inspect`] settles it by preferring the longest
//!   declared field name.
//! - [`from_node`] is a forgiving serde deserializer. Flat formats only carry
//!   text, so it parses `"8080"` into a `u16`, `"a,b"` into a list,
//!   `"2m0s"` into a `Duration` and base64 into bytes, and it matches field
//!   names without regard to case.
//!
//! # Declaring shapes
//!
//! Decoding needs to know which keys are lists, maps or nested records before
//! any value exists. Types describe themselves through [`Described`], which
//! is implemented for primitives, strings, `Vec`, string-keyed maps,
//! `Option`, `Box`, `Duration` and `SystemTime`. Records list their fields:
//!
//! ```ignore
//! impl Described for Database {
//!     fn shape() -> Shape {
//!         Shape::record([
//!             Field::of::<Option<String>>("url"),
//!             Field::of::<usize>("pool_size"),
//!         ])
//!     }
//! }
//! ```
//!
//! # Two kinds of value
//!
//! Plain serde types go through the [`Record`] capability. Message types that
//! track field presence implement [`FieldAccessor`] instead, and are read and
//! written field by field: unset fields are left out of the output and an
//! explicitly empty field is written as `KEY=`. The choice is made per call
//! with [`Payload`] and [`Target`]:
//!
//! ```ignore
//! let bytes = codec.marshal(Payload::Fields(&message))?;
//! codec.unmarshal(&bytes, Target::Fields(&mut message))?;
//! ```
//!
//! # Codecs
//!
//! | name | codec | output |
//! |------|-------|--------|
//! | `env` | [`EnvCodec`] | `DATABASE_POOL_SIZE=20` lines |
//! | `flag` | [`FlagCodec`] | `--database.pool_size=20` tokens |
//! | `x-www-form-urlencoded`, `form` | `FormCodec` | `database.pool_size=20&tags=a` |
//! | `json` | [`JsonCodec`] | JSON object |
//! | `toml` | [`TomlCodec`] | TOML document |
//! | `yaml`, `yml` | `YamlCodec` | YAML document |
//!
//! A [`Registry`] maps content-subtypes to codecs. Names are matched
//! lower-cased, unregistered names fall back to the built-ins, and anything
//! else gets a codec that fails with [`CodecError::UnsupportedCodec`].
//!
//! # Cargo features
//!
//! - `form` (default): the form codec, via `percent-encoding`.
//! - `yaml` (default): the YAML codec, via `serde_yaml`.
//! - `rich-errors`: derive `miette::Diagnostic` on [`CodecError`].
//!
//! # Logging
//!
//! Every encode and decode emits a `tracing` event at `debug` level with the
//! codec name and key count. Keys a decode ignores are reported at `debug`
//! as well, and per-key path resolution at `trace`.

pub mod codec;
pub mod decode;
pub mod error;
pub mod flatten;
pub mod merge;
pub mod node;
pub mod path;
pub mod record;
pub mod registry;
pub mod scalar;
pub mod shape;
pub mod types;
pub mod unflatten;

#[cfg(test)]
mod fixtures;

pub use codec::{Codec, CodecExt, EnvCodec, FlagCodec, JsonCodec, TomlCodec};
#[cfg(feature = "form")]
pub use codec::FormCodec;
#[cfg(feature = "yaml")]
pub use codec::YamlCodec;
pub use decode::from_node;
pub use error::CodecError;
pub use flatten::{FlatMapping, FlatOptions, flatten};
pub use merge::deep_merge;
pub use node::{Node, to_node};
pub use path::{PathStyle, Segment};
pub use record::{Cardinality, FieldAccessor, FieldDescriptor, Payload, Record, Target};
pub use registry::{Registry, RegistryBuilder};
pub use shape::{Described, Field, Shape, TypeShape, inspect};
pub use types::{Case, Kind, ScalarLists};
pub use unflatten::unflatten;
