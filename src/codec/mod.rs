//! The uniform codec contract and its implementations.
//!
//! Every codec turns a [`Payload`] into bytes and bytes back into a
//! [`Target`]. [`CodecExt`] wraps both ends for plain serde types.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;
use crate::record::{Payload, Target};
use crate::shape::Described;

pub mod env;
pub mod flag;
#[cfg(feature = "form")]
pub mod form;
pub mod json;
pub mod toml;
#[cfg(feature = "yaml")]
pub mod yaml;

pub use env::EnvCodec;
pub use flag::FlagCodec;
#[cfg(feature = "form")]
pub use form::FormCodec;
pub use json::JsonCodec;
pub use self::toml::TomlCodec;
#[cfg(feature = "yaml")]
pub use yaml::YamlCodec;

/// Converts values to and from one wire representation.
///
/// Implementations hold no mutable state and may be called concurrently.
pub trait Codec: Send + Sync {
    /// Content-subtype this codec answers to, e.g. `env` or `json`.
    fn name(&self) -> &str;

    fn marshal(&self, payload: Payload<'_>) -> Result<Vec<u8>, CodecError>;

    fn unmarshal(&self, data: &[u8], target: Target<'_>) -> Result<(), CodecError>;
}

/// Typed helpers over [`Codec`] for serde values.
pub trait CodecExt: Codec {
    fn encode<T>(&self, value: &T) -> Result<Vec<u8>, CodecError>
    where
        T: Serialize + DeserializeOwned + Described,
    {
        self.marshal(Payload::Generic(value))
    }

    /// Decode into a fresh `T::default()`.
    fn decode<T>(&self, data: &[u8]) -> Result<T, CodecError>
    where
        T: Serialize + DeserializeOwned + Described + Default,
    {
        let mut value = T::default();
        self.decode_into(data, &mut value)?;
        Ok(value)
    }

    /// Decode over an existing value; keys absent from `data` keep their values.
    fn decode_into<T>(&self, data: &[u8], value: &mut T) -> Result<(), CodecError>
    where
        T: Serialize + DeserializeOwned + Described,
    {
        self.unmarshal(data, Target::Generic(value))
    }
}

impl<C: Codec + ?Sized> CodecExt for C {}

/// Payload bytes as text.
pub(crate) fn utf8(data: &[u8]) -> Result<&str, CodecError> {
    Ok(std::str::from_utf8(data)?)
}
