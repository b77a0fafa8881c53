//! # Device Attributes
//!
//! `DeviceAttributes` is the immutable, flat view of a decoded activation
//! request. It is built once per session by [`DeviceAttributes::resolve`],
//! which enforces the mandatory identifiers and fills defaultable ones from
//! a [`FallbackTable`].
//!
//! ## Mandatory vs defaultable
//!
//! `SerialNumber`, `ProductType` and `UniqueDeviceID` must be present. The
//! certificate subject and ticket binding are meaningless without them.
//! Everything else the account token names may be substituted from the
//! fallback table, and a substitution never replaces a value that was in
//! the request.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ActivationError;
use crate::value::AttrValue;

/// Attribute keys as they appear in request and token documents.
pub mod keys {
    /// Device serial number.
    pub const SERIAL_NUMBER: &str = "SerialNumber";
    /// 40-hex-character unique device identifier.
    pub const UNIQUE_DEVICE_ID: &str = "UniqueDeviceID";
    /// Hardware model, e.g. `iPhone10,3`.
    pub const PRODUCT_TYPE: &str = "ProductType";
    /// Per-request nonce from the device.
    pub const ACTIVATION_RANDOMNESS: &str = "ActivationRandomness";
    /// Primary IMEI.
    pub const IMEI: &str = "InternationalMobileEquipmentIdentity";
    /// Secondary IMEI on dual-SIM hardware.
    pub const IMEI2: &str = "InternationalMobileEquipmentIdentity2";
    /// Mobile equipment identifier.
    pub const MEID: &str = "MobileEquipmentIdentifier";
    /// SIM card serial.
    pub const ICCID: &str = "IntegratedCircuitCardIdentity";
    /// Subscriber identity.
    pub const IMSI: &str = "InternationalMobileSubscriberIdentity";
}

/// Identifiers without which no record can be built.
pub const MANDATORY_FIELDS: [&str; 3] = [
    keys::SERIAL_NUMBER,
    keys::PRODUCT_TYPE,
    keys::UNIQUE_DEVICE_ID,
];

/// Identifiers that may be filled from the fallback table.
pub const DEFAULTABLE_FIELDS: [&str; 6] = [
    keys::ACTIVATION_RANDOMNESS,
    keys::IMEI,
    keys::IMEI2,
    keys::MEID,
    keys::ICCID,
    keys::IMSI,
];

/// Placeholder identifiers for defaultable fields missing from a capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackTable {
    /// Placeholder activation randomness (UUID-shaped).
    pub activation_randomness: String,
    /// Placeholder IMEI.
    pub imei: String,
    /// Placeholder secondary IMEI.
    pub imei2: String,
    /// Placeholder MEID.
    pub meid: String,
    /// Placeholder ICCID.
    pub iccid: String,
    /// Placeholder IMSI.
    pub imsi: String,
}

impl Default for FallbackTable {
    fn default() -> Self {
        Self {
            activation_randomness: "00000000-0000-0000-0000-000000000000".to_string(),
            imei: "000000000000000".to_string(),
            imei2: "000000000000000".to_string(),
            meid: "00000000000000".to_string(),
            iccid: "0000000000000000000".to_string(),
            imsi: "000000000000000".to_string(),
        }
    }
}

impl FallbackTable {
    /// Placeholder for a defaultable key, `None` for any other key.
    pub fn placeholder(&self, key: &str) -> Option<&str> {
        let value = match key {
            keys::ACTIVATION_RANDOMNESS => &self.activation_randomness,
            keys::IMEI => &self.imei,
            keys::IMEI2 => &self.imei2,
            keys::MEID => &self.meid,
            keys::ICCID => &self.iccid,
            keys::IMSI => &self.imsi,
            _ => return None,
        };
        Some(value.as_str())
    }
}

/// Flat, immutable device attributes for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAttributes {
    fields: BTreeMap<String, AttrValue>,
    substituted: BTreeSet<String>,
    #[serde(default)]
    blank: BTreeSet<String>,
}

impl DeviceAttributes {
    /// Validate a decoded mapping and fill defaultable gaps.
    ///
    /// # Errors
    ///
    /// `ActivationError::MissingIdentifier` naming the first mandatory field
    /// that is absent, empty, or has no textual form.
    pub fn resolve(
        mut fields: BTreeMap<String, AttrValue>,
        fallback: &FallbackTable,
    ) -> Result<Self, ActivationError> {
        for field in MANDATORY_FIELDS {
            let present = fields
                .get(field)
                .and_then(AttrValue::to_identifier)
                .is_some_and(|s| !s.trim().is_empty());
            if !present {
                return Err(ActivationError::MissingIdentifier { field });
            }
        }

        let mut substituted = BTreeSet::new();
        let mut blank = BTreeSet::new();
        for field in DEFAULTABLE_FIELDS {
            if let Some(value) = fields.get(field) {
                if value.to_identifier().is_none() {
                    tracing::warn!(
                        field,
                        kind = value.kind(),
                        "identifier has no text form; rendering it empty"
                    );
                    blank.insert(field.to_string());
                }
                continue;
            }
            if let Some(placeholder) = fallback.placeholder(field) {
                tracing::warn!(field, "identifier absent from request; using placeholder");
                fields.insert(field.to_string(), AttrValue::String(placeholder.to_string()));
                substituted.insert(field.to_string());
            }
        }

        Ok(Self {
            fields,
            substituted,
            blank,
        })
    }

    /// Build from string pairs, mainly for callers that already hold parsed
    /// identifiers.
    pub fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
        fallback: &FallbackTable,
    ) -> Result<Self, ActivationError> {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), AttrValue::String(v.to_string())))
            .collect();
        Self::resolve(fields, fallback)
    }

    /// Raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.fields.get(key)
    }

    /// Textual form of `key`, empty when the key has none.
    ///
    /// Mandatory keys always have a textual form after
    /// [`resolve`](Self::resolve). A present defaultable key that arrived as
    /// a blob or dict renders empty.
    pub fn text(&self, key: &str) -> String {
        self.fields
            .get(key)
            .and_then(AttrValue::to_identifier)
            .unwrap_or_default()
    }

    /// Device serial number.
    pub fn serial_number(&self) -> String {
        self.text(keys::SERIAL_NUMBER)
    }

    /// Unique device identifier.
    pub fn unique_device_id(&self) -> String {
        self.text(keys::UNIQUE_DEVICE_ID)
    }

    /// Product type.
    pub fn product_type(&self) -> String {
        self.text(keys::PRODUCT_TYPE)
    }

    /// Activation randomness.
    pub fn activation_randomness(&self) -> String {
        self.text(keys::ACTIVATION_RANDOMNESS)
    }

    /// Whether `key` was filled from the fallback table.
    pub fn is_substituted(&self, key: &str) -> bool {
        self.substituted.contains(key)
    }

    /// Keys filled from the fallback table, sorted.
    pub fn substituted(&self) -> impl Iterator<Item = &str> {
        self.substituted.iter().map(String::as_str)
    }

    /// Defaultable keys present in the request in a form with no text
    /// (a blob, dict or opaque value). They render as empty strings.
    pub fn blank(&self) -> impl Iterator<Item = &str> {
        self.blank.iter().map(String::as_str)
    }

    /// All decoded entries, sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
