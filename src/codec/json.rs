//! JSON via `serde_json`.
//!
//! Bytes are base64 strings, durations `<seconds>s` and timestamps RFC 3339,
//! matching the text the flat codecs accept.

use tracing::debug;

use super::Codec;
use crate::error::CodecError;
use crate::node::Node;
use crate::record::{Payload, Target};

/// Name registered for the JSON codec.
pub const NAME: &str = "json";

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &str {
        NAME
    }

    fn marshal(&self, payload: Payload<'_>) -> Result<Vec<u8>, CodecError> {
        let node = payload.to_node()?;
        debug!(codec = NAME, "encoding");
        Ok(serde_json::to_vec(&node)?)
    }

    fn unmarshal(&self, data: &[u8], mut target: Target<'_>) -> Result<(), CodecError> {
        let node: Node = serde_json::from_slice(data)?;
        debug!(codec = NAME, "decoding");
        target.assign(node)
    }
}
