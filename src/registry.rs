use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::codec::{Codec, EnvCodec, FlagCodec, JsonCodec, TomlCodec};
use crate::error::CodecError;
use crate::record::{Payload, Target};

/// Codecs by content-subtype.
///
/// Lookups never fail: names nobody registered fall back to the built-in
/// codec of that name, and then to an [`Unsupported`] codec that reports
/// the miss when it is used.
///
/// ```
/// use flatcodec::Registry;
///
/// let registry = Registry::builder().build().unwrap();
/// assert_eq!(registry.get("JSON").name(), "json");
/// assert_eq!(registry.get("xml").name(), "xml");
/// ```
#[derive(Clone, Default)]
pub struct Registry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Codec for `subtype`, matched lower-cased.
    pub fn get(&self, subtype: &str) -> Arc<dyn Codec> {
        let name = subtype.to_ascii_lowercase();
        if let Some(codec) = self.codecs.get(&name) {
            return Arc::clone(codec);
        }
        if let Some(codec) = builtin(&name) {
            return codec;
        }
        debug!(subtype = %name, "no codec registered");
        Arc::new(Unsupported { name })
    }

    /// Registered names, sorted. Built-ins are not listed.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let mut names: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names.into_iter()
    }
}

/// Builder for [`Registry`]. Names are checked in [`build`](Self::build).
#[derive(Default)]
pub struct RegistryBuilder {
    codecs: Vec<Arc<dyn Codec>>,
}

impl RegistryBuilder {
    /// Register `codec` under its own [`Codec::name`].
    pub fn register(self, codec: impl Codec + 'static) -> Self {
        self.register_arc(Arc::new(codec))
    }

    pub fn register_arc(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codecs.push(codec);
        self
    }

    /// Fails on an empty name or on two codecs claiming the same name.
    pub fn build(self) -> Result<Registry, CodecError> {
        let mut codecs = HashMap::with_capacity(self.codecs.len());
        for codec in self.codecs {
            let name = codec.name().trim().to_ascii_lowercase();
            if name.is_empty() {
                return Err(CodecError::InvalidRegistration(
                    "codec name is empty".into(),
                ));
            }
            if codecs.contains_key(&name) {
                return Err(CodecError::InvalidRegistration(format!(
                    "'{name}' is registered twice"
                )));
            }
            debug!(codec = %name, "registered codec");
            codecs.insert(name, codec);
        }
        Ok(Registry { codecs })
    }
}

/// Built-in codec for a lower-cased `name`, including aliases.
pub fn builtin(name: &str) -> Option<Arc<dyn Codec>> {
    let codec: Arc<dyn Codec> = match name {
        "json" => Arc::new(JsonCodec),
        "toml" => Arc::new(TomlCodec),
        "flag" => Arc::new(FlagCodec),
        "env" => Arc::new(EnvCodec::new()),
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => Arc::new(crate::codec::YamlCodec),
        #[cfg(feature = "form")]
        "form" | "x-www-form-urlencoded" => Arc::new(crate::codec::FormCodec),
        _ => return None,
    };
    Some(codec)
}

/// Stand-in for a subtype with no codec; every call fails.
#[derive(Debug, Clone)]
pub struct Unsupported {
    name: String,
}

impl Codec for Unsupported {
    fn name(&self) -> &str {
        &self.name
    }

    fn marshal(&self, _payload: Payload<'_>) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::UnsupportedCodec(self.name.clone()))
    }

    fn unmarshal(&self, _data: &[u8], _target: Target<'_>) -> Result<(), CodecError> {
        Err(CodecError::UnsupportedCodec(self.name.clone()))
    }
}
