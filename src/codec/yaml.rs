//! YAML via `serde_yaml`.

use tracing::debug;

use super::Codec;
use crate::error::CodecError;
use crate::node::Node;
use crate::record::{Payload, Target};

/// Name registered for the YAML codec; `yml` is accepted as an alias.
pub const NAME: &str = "yaml";

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn name(&self) -> &str {
        NAME
    }

    fn marshal(&self, payload: Payload<'_>) -> Result<Vec<u8>, CodecError> {
        let node = payload.to_node()?;
        debug!(codec = NAME, "encoding");
        Ok(serde_yaml::to_string(&node)?.into_bytes())
    }

    fn unmarshal(&self, data: &[u8], mut target: Target<'_>) -> Result<(), CodecError> {
        let node: Node = serde_yaml::from_slice(data)?;
        debug!(codec = NAME, "decoding");
        target.assign(node)
    }
}
