//! # Attribute Values
//!
//! The decoder turns every node of the request tree into an [`AttrValue`].
//! Consumers pattern-match on the variant; there is no runtime type
//! probing. Kinds the synthesizer has no use for (arrays, reals, UIDs) are
//! kept as [`AttrValue::Opaque`] with their kind name so a diagnostic dump
//! still shows that the key was present.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::temporal::Timestamp;

/// A decoded request value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    /// UTF-8 string.
    String(String),
    /// Signed integer.
    Integer(i64),
    /// Boolean flag.
    Boolean(bool),
    /// Raw bytes (a `<data>` node that was not itself a sub-document).
    Bytes(Vec<u8>),
    /// Date node.
    Date(Timestamp),
    /// Nested dictionary.
    Dict(BTreeMap<String, AttrValue>),
    /// A value kind the synthesizer does not interpret.
    Opaque(String),
}

impl AttrValue {
    /// Short name of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Boolean(_) => "boolean",
            Self::Bytes(_) => "bytes",
            Self::Date(_) => "date",
            Self::Dict(_) => "dict",
            Self::Opaque(_) => "opaque",
        }
    }

    /// Borrow as a string if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Render a scalar as identifier text.
    ///
    /// Integers are rendered in decimal since some captures carry IMEI or
    /// IMSI as `<integer>`. Blobs, dicts and opaque values have no textual
    /// identifier form.
    pub fn to_identifier(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Integer(n) => Some(n.to_string()),
            Self::Boolean(b) => Some(b.to_string()),
            Self::Date(ts) => Some(ts.to_iso8601()),
            Self::Bytes(_) | Self::Dict(_) | Self::Opaque(_) => None,
        }
    }
}
