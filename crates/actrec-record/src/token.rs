//! # Account Token
//!
//! The account token is a fixed-order, old-style property-list text block:
//!
//! ```text
//! {
//! 	"InternationalMobileEquipmentIdentity" = "…";
//! 	"ActivationTicket" = "…";
//! 	…
//! 	"PostponementInfo" = {};
//! 	…
//! }
//! ```
//!
//! Field order and bytes are part of the wire contract: the signature is
//! computed over exactly these bytes. Values are quoted; `"` and `\` inside
//! a value are backslash-escaped, `\n`, `\r` and `\t` use their letter
//! escapes and any other control character becomes `\Uxxxx`, so every field
//! stays on its own line.

use actrec_core::{keys, ActivationError, DeviceAttributes, SynthesisConfig};
use actrec_crypto::{sign_pkcs1_sha256, CertifiedKey};

use crate::ticket::SignedTicket;

/// Token keys that are not device attributes.
pub mod token_keys {
    /// Base64 CMS ticket.
    pub const ACTIVATION_TICKET: &str = "ActivationTicket";
    /// Phone-number notification endpoint.
    pub const PHONE_NUMBER_NOTIFICATION_URL: &str = "PhoneNumberNotificationURL";
    /// Activity endpoint.
    pub const ACTIVITY_URL: &str = "ActivityURL";
    /// Always an empty dictionary.
    pub const POSTPONEMENT_INFO: &str = "PostponementInfo";
}

/// One token line's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValue {
    /// A quoted string.
    Text(String),
    /// The empty dictionary `{}`.
    EmptyDict,
}

/// The account token fields in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountTokenPayload {
    fields: Vec<(&'static str, TokenValue)>,
}

impl AccountTokenPayload {
    /// Assemble the token for `attrs` around `ticket`.
    pub fn new(attrs: &DeviceAttributes, ticket: &SignedTicket, config: &SynthesisConfig) -> Self {
        let text = |key: &'static str| (key, TokenValue::Text(attrs.text(key)));
        let fields = vec![
            text(keys::IMEI),
            (
                token_keys::ACTIVATION_TICKET,
                TokenValue::Text(ticket.to_base64()),
            ),
            (
                token_keys::PHONE_NUMBER_NOTIFICATION_URL,
                TokenValue::Text(config.notification_url.clone()),
            ),
            (
                token_keys::ACTIVITY_URL,
                TokenValue::Text(config.activity_url.clone()),
            ),
            text(keys::IMSI),
            text(keys::PRODUCT_TYPE),
            text(keys::UNIQUE_DEVICE_ID),
            text(keys::SERIAL_NUMBER),
            text(keys::MEID),
            text(keys::IMEI2),
            (token_keys::POSTPONEMENT_INFO, TokenValue::EmptyDict),
            text(keys::ACTIVATION_RANDOMNESS),
            text(keys::ICCID),
        ];
        Self { fields }
    }

    /// Keys in wire order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(k, _)| *k)
    }

    /// Value of `key`.
    pub fn get(&self, key: &str) -> Option<&TokenValue> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// The exact bytes that are signed and embedded in the record.
    pub fn render(&self) -> String {
        let mut out = String::from("{\n");
        for (key, value) in &self.fields {
            match value {
                TokenValue::Text(text) => {
                    out.push_str(&format!("\t\"{key}\" = \"{}\";\n", escape(text)));
                }
                TokenValue::EmptyDict => out.push_str(&format!("\t\"{key}\" = {{}};\n")),
            }
        }
        out.push('}');
        out
    }

    /// Render and sign with the server key.
    pub fn sign(&self, server: &CertifiedKey) -> Result<SignedToken, ActivationError> {
        let payload = self.render().into_bytes();
        let signature = sign_pkcs1_sha256(server, &payload)?;
        Ok(SignedToken { payload, signature })
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\U{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Rendered token bytes and their PKCS#1 v1.5 / SHA-256 signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken {
    /// `AccountToken` bytes.
    pub payload: Vec<u8>,
    /// `AccountTokenSignature` bytes.
    pub signature: Vec<u8>,
}

/// Parse a rendered token back into `(key, value)` lines, `{}` values as
/// `None`. Used by `inspect` and tests.
pub fn parse_rendered(token: &str) -> Option<Vec<(String, Option<String>)>> {
    let body = token.strip_prefix("{\n")?.strip_suffix('}')?;
    body.lines()
        .map(|line| {
            let line = line.strip_prefix('\t')?.strip_suffix(';')?;
            let (key, value) = line.split_once(" = ")?;
            let key = key.strip_prefix('"')?.strip_suffix('"')?.to_string();
            if value == "{}" {
                return Some((key, None));
            }
            let value = value.strip_prefix('"')?.strip_suffix('"')?;
            Some((key, Some(unescape(value))))
        })
        .collect()
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('U') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32);
                match decoded {
                    Some(decoded) if hex.len() == 4 => out.push(decoded),
                    _ => {
                        out.push('U');
                        out.push_str(&hex);
                    }
                }
            }
            Some(next) => out.push(next),
            None => {}
        }
    }
    out
}
