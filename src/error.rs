use std::fmt;

use serde::{de, ser};
use thiserror::Error;

#[derive(Debug, Error)]
#[cfg_attr(feature = "rich-errors", derive(miette::Diagnostic))]
pub enum CodecError {
    #[error("Malformed token '{token}': expected key=value")]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(help("every entry needs an '=' between the key and its value"))
    )]
    MalformedToken { token: String },

    #[error("Ambiguous path '{path}': {reason}")]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(help("a key cannot be both a value and a container"))
    )]
    AmbiguousPath { path: String, reason: String },

    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),

    #[error("Invalid value for '{key}': {reason}")]
    Decode { key: String, reason: String },

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("Invalid codec registration: {0}")]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(help("codec names must be non-empty; they are matched lower-cased"))
    )]
    InvalidRegistration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[cfg(feature = "yaml")]
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("{0}")]
    Message(String),
}

impl CodecError {
    pub(crate) fn ambiguous(path: &str, reason: impl Into<String>) -> Self {
        CodecError::AmbiguousPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Attach the path being decoded to an error raised by serde.
    ///
    /// Errors that already carry a key keep the innermost one.
    pub(crate) fn at(self, key: &str) -> Self {
        match self {
            CodecError::Message(reason) if !key.is_empty() => CodecError::Decode {
                key: key.to_string(),
                reason,
            },
            other => other,
        }
    }
}

impl ser::Error for CodecError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        CodecError::Message(msg.to_string())
    }
}

impl de::Error for CodecError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        CodecError::Message(msg.to_string())
    }

    fn unknown_field(field: &str, _expected: &'static [&'static str]) -> Self {
        CodecError::UnknownField(field.to_string())
    }
}
