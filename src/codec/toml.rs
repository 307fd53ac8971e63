//! TOML via the `toml` crate.

use tracing::debug;

use super::{Codec, utf8};
use crate::error::CodecError;
use crate::node::Node;
use crate::record::{Payload, Target};

/// Name registered for the TOML codec.
pub const NAME: &str = "toml";

#[derive(Debug, Clone, Copy, Default)]
pub struct TomlCodec;

impl Codec for TomlCodec {
    fn name(&self) -> &str {
        NAME
    }

    fn marshal(&self, payload: Payload<'_>) -> Result<Vec<u8>, CodecError> {
        let node = prune_nulls(payload.to_node()?);
        debug!(codec = NAME, "encoding");
        Ok(toml::to_string(&node)?.into_bytes())
    }

    fn unmarshal(&self, data: &[u8], mut target: Target<'_>) -> Result<(), CodecError> {
        let node: Node = toml::from_str(utf8(data)?)?;
        debug!(codec = NAME, "decoding");
        target.assign(node)
    }
}

/// TOML has no null: drop absent entries and list gaps.
fn prune_nulls(node: Node) -> Node {
    match node {
        Node::Map(entries) => Node::Map(
            entries
                .into_iter()
                .filter(|(_, v)| !matches!(v, Node::Null))
                .map(|(k, v)| (k, prune_nulls(v)))
                .collect(),
        ),
        Node::List(items) => Node::List(
            items
                .into_iter()
                .filter(|v| !matches!(v, Node::Null))
                .map(prune_nulls)
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecExt;
    use crate::fixtures::test::{Database, Server};

    #[test]
    fn round_trip_nested_table() {
        let server = Server {
            host: "localhost".into(),
            port: 8080,
            debug: true,
            database: Database {
                url: Some("pg://".into()),
                pool_size: 5,
            },
        };
        let out = TomlCodec.encode(&server).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.contains("[database]"));
        let back: Server = TomlCodec.decode(&out).unwrap();
        assert_eq!(back, server);
    }

    #[test]
    fn nulls_are_dropped() {
        let node = Node::Map(vec![
            ("a".into(), Node::Null),
            ("b".into(), Node::List(vec![Node::Null, Node::Int(1)])),
        ]);
        assert_eq!(
            prune_nulls(node),
            Node::Map(vec![("b".into(), Node::List(vec![Node::Int(1)]))])
        );
    }

    #[test]
    fn parse_error_is_reported() {
        let err = TomlCodec.decode::<Server>(b"port = ").unwrap_err();
        assert!(matches!(err, CodecError::TomlParse(_)));
    }
}
