//! # Activation Record
//!
//! The final document: one property-list dictionary with eight keys in a
//! fixed order. The flag is a `<true/>`/`<false/>` node; every other value
//! is a `<data>` blob.

use std::io::Cursor;

use actrec_core::ActivationError;
use plist::{Dictionary, Value};

/// Top-level record keys.
pub mod record_keys {
    /// Boolean flag, always set in synthesized records.
    pub const UNBRICK: &str = "unbrick";
    /// DER server certificate; its key signs the token and ticket.
    pub const ACCOUNT_TOKEN_CERTIFICATE: &str = "AccountTokenCertificate";
    /// DER device certificate issued by the Device CA.
    pub const DEVICE_CERTIFICATE: &str = "DeviceCertificate";
    /// Opaque regulatory blob from configuration.
    pub const REGULATORY_INFO: &str = "RegulatoryInfo";
    /// Opaque FairPlay blob from configuration.
    pub const FAIRPLAY_KEY_DATA: &str = "FairPlayKeyData";
    /// Rendered account token text.
    pub const ACCOUNT_TOKEN: &str = "AccountToken";
    /// PKCS#1 v1.5 SHA-256 signature over the account token.
    pub const ACCOUNT_TOKEN_SIGNATURE: &str = "AccountTokenSignature";
    /// PEM bundle: device, Device CA, Root CA.
    pub const UNIQUE_DEVICE_CERTIFICATE: &str = "UniqueDeviceCertificate";
}

/// Record keys in document order.
pub const RECORD_KEYS: [&str; 8] = [
    record_keys::UNBRICK,
    record_keys::ACCOUNT_TOKEN_CERTIFICATE,
    record_keys::DEVICE_CERTIFICATE,
    record_keys::REGULATORY_INFO,
    record_keys::FAIRPLAY_KEY_DATA,
    record_keys::ACCOUNT_TOKEN,
    record_keys::ACCOUNT_TOKEN_SIGNATURE,
    record_keys::UNIQUE_DEVICE_CERTIFICATE,
];

/// A complete activation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRecord {
    /// `unbrick` flag.
    pub unbrick: bool,
    /// DER of the activation server certificate.
    pub account_token_certificate: Vec<u8>,
    /// DER of the device certificate.
    pub device_certificate: Vec<u8>,
    /// Regulatory JSON.
    pub regulatory_info: Vec<u8>,
    /// Opaque FairPlay container.
    pub fairplay_key_data: Vec<u8>,
    /// Rendered account token.
    pub account_token: Vec<u8>,
    /// PKCS#1 v1.5 / SHA-256 signature over `account_token`.
    pub account_token_signature: Vec<u8>,
    /// PEM bundle: device certificate, Device CA, Root CA.
    pub unique_device_certificate: Vec<u8>,
}

impl ActivationRecord {
    /// The seven blob fields in document order.
    pub fn blobs(&self) -> [(&'static str, &[u8]); 7] {
        [
            (
                record_keys::ACCOUNT_TOKEN_CERTIFICATE,
                &self.account_token_certificate,
            ),
            (record_keys::DEVICE_CERTIFICATE, &self.device_certificate),
            (record_keys::REGULATORY_INFO, &self.regulatory_info),
            (record_keys::FAIRPLAY_KEY_DATA, &self.fairplay_key_data),
            (record_keys::ACCOUNT_TOKEN, &self.account_token),
            (
                record_keys::ACCOUNT_TOKEN_SIGNATURE,
                &self.account_token_signature,
            ),
            (
                record_keys::UNIQUE_DEVICE_CERTIFICATE,
                &self.unique_device_certificate,
            ),
        ]
    }

    /// The record as an ordered property-list dictionary.
    pub fn to_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.insert(record_keys::UNBRICK.to_string(), Value::Boolean(self.unbrick));
        for (key, blob) in self.blobs() {
            dict.insert(key.to_string(), Value::Data(blob.to_vec()));
        }
        dict
    }

    /// XML property list.
    pub fn to_xml(&self) -> Result<Vec<u8>, ActivationError> {
        let mut buf = Vec::new();
        Value::Dictionary(self.to_dictionary())
            .to_writer_xml(&mut buf)
            .map_err(|e| ActivationError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Binary property list.
    pub fn to_binary(&self) -> Result<Vec<u8>, ActivationError> {
        let mut buf = Vec::new();
        Value::Dictionary(self.to_dictionary())
            .to_writer_binary(&mut buf)
            .map_err(|e| ActivationError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Read a record back from XML or binary property-list bytes.
    pub fn from_plist_bytes(bytes: &[u8]) -> Result<Self, ActivationError> {
        let dict = Value::from_reader(Cursor::new(bytes))
            .map_err(|e| ActivationError::Decode(format!("record is not a property list: {e}")))?
            .into_dictionary()
            .ok_or_else(|| ActivationError::Decode("record root is not a dictionary".into()))?;

        let unbrick = dict
            .get(record_keys::UNBRICK)
            .and_then(Value::as_boolean)
            .ok_or_else(|| missing(record_keys::UNBRICK))?;
        let blob = |key: &'static str| -> Result<Vec<u8>, ActivationError> {
            dict.get(key)
                .and_then(Value::as_data)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| missing(key))
        };

        Ok(Self {
            unbrick,
            account_token_certificate: blob(record_keys::ACCOUNT_TOKEN_CERTIFICATE)?,
            device_certificate: blob(record_keys::DEVICE_CERTIFICATE)?,
            regulatory_info: blob(record_keys::REGULATORY_INFO)?,
            fairplay_key_data: blob(record_keys::FAIRPLAY_KEY_DATA)?,
            account_token: blob(record_keys::ACCOUNT_TOKEN)?,
            account_token_signature: blob(record_keys::ACCOUNT_TOKEN_SIGNATURE)?,
            unique_device_certificate: blob(record_keys::UNIQUE_DEVICE_CERTIFICATE)?,
        })
    }
}

fn missing(key: &str) -> ActivationError {
    ActivationError::Decode(format!("record field {key} missing or of the wrong kind"))
}
