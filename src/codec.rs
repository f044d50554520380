//! String encoding of bound values.
//!
//! The codec is picked once, from the `parse` option, when a binding is
//! created, so every read and write of that binding agrees on the format.

use serde::de::{DeserializeOwned, IntoDeserializer};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Encoding between bound values and stored strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Stored strings are the value; nothing is decoded.
    Raw,
    /// Stored strings are JSON documents.
    Json,
}

impl Codec {
    /// The codec for a binding with the given `parse` option.
    #[must_use]
    pub fn for_parse(parse: bool) -> Self {
        if parse {
            Self::Json
        } else {
            Self::Raw
        }
    }

    /// Turn a stored string into a value.
    pub fn decode<T: DeserializeOwned>(self, key: &str, raw: &str) -> Result<T> {
        match self {
            Self::Raw => {
                let de: serde::de::value::StrDeserializer<'_, serde_json::Error> = raw.into_deserializer();
                T::deserialize(de).map_err(|source| Error::Cast {
                    key: key.to_owned(),
                    source,
                })
            }
            Self::Json => serde_json::from_str(raw).map_err(|source| Error::Decode {
                key: key.to_owned(),
                source,
            }),
        }
    }

    /// Turn a value into the string to store.
    ///
    /// In raw mode strings are stored verbatim and numbers and booleans as
    /// their textual form; anything structured is rejected.
    pub fn encode<T: Serialize>(self, key: &str, value: &T) -> Result<String> {
        match self {
            Self::Raw => {
                let value = serde_json::to_value(value).map_err(|source| Error::Encode {
                    key: key.to_owned(),
                    source,
                })?;
                match value {
                    Value::String(s) => Ok(s),
                    Value::Number(n) => Ok(n.to_string()),
                    Value::Bool(b) => Ok(b.to_string()),
                    Value::Null | Value::Array(_) | Value::Object(_) => Err(Error::NotAString {
                        key: key.to_owned(),
                    }),
                }
            }
            Self::Json => serde_json::to_string(value).map_err(|source| Error::Encode {
                key: key.to_owned(),
                source,
            }),
        }
    }
}
