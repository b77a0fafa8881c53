//! # Activation Ticket
//!
//! The ticket binds the device identity to the session: canonical JSON of
//! `ActivationRandomness`, `IssuedAt` (epoch seconds) and `UniqueDeviceID`,
//! wrapped in a CMS signed-data envelope signed by the activation server
//! key. It is embedded in the account token as base64.

use actrec_core::{ActivationError, CanonicalBytes, DeviceAttributes, Timestamp};
use actrec_crypto::{sign_envelope, CertifiedKey, CryptoError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use zeroize::Zeroize;

#[derive(Serialize)]
struct TicketContent<'a> {
    #[serde(rename = "ActivationRandomness")]
    activation_randomness: &'a str,
    #[serde(rename = "IssuedAt")]
    issued_at: i64,
    #[serde(rename = "UniqueDeviceID")]
    unique_device_id: &'a str,
}

/// Canonical bytes the ticket signs.
pub fn ticket_content(
    attrs: &DeviceAttributes,
    issued_at: Timestamp,
) -> Result<CanonicalBytes, ActivationError> {
    let randomness = attrs.activation_randomness();
    let udid = attrs.unique_device_id();
    Ok(CanonicalBytes::new(&TicketContent {
        activation_randomness: &randomness,
        issued_at: issued_at.epoch_secs(),
        unique_device_id: &udid,
    })?)
}

/// A DER-encoded CMS signed-data ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTicket {
    der: Vec<u8>,
}

impl SignedTicket {
    /// Sign a ticket for `attrs` with the server key.
    pub fn issue(
        attrs: &DeviceAttributes,
        issued_at: Timestamp,
        server: &CertifiedKey,
    ) -> Result<Self, ActivationError> {
        let content = ticket_content(attrs, issued_at)?;
        let der = sign_envelope(&content, server).map_err(|e| match e {
            CryptoError::Encoding(m) => ActivationError::Signing(m),
            other => other.into(),
        })?;
        let mut plain = content.into_vec();
        plain.zeroize();
        Ok(Self { der })
    }

    /// Wrap an existing DER envelope, for example one read back from a
    /// record.
    pub fn from_der(der: Vec<u8>) -> Self {
        Self { der }
    }

    /// DER bytes.
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// Standard base64 of the DER bytes, as embedded in the token.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.der)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actrec_core::{keys, FallbackTable, ValidityDays};
    use actrec_crypto::{session_rng, verify_envelope, SerialAllocator, TrustChain};

    fn attrs() -> DeviceAttributes {
        DeviceAttributes::from_pairs(
            [
                (keys::SERIAL_NUMBER, "C00000000000"),
                (keys::PRODUCT_TYPE, "iPhone0,0"),
                (keys::UNIQUE_DEVICE_ID, "abc"),
                (keys::ACTIVATION_RANDOMNESS, "rnd"),
            ],
            &FallbackTable::default(),
        )
        .unwrap()
    }

    fn issued_at() -> Timestamp {
        Timestamp::parse("2026-01-15T12:00:00Z").unwrap()
    }

    #[test]
    fn content_is_canonical_json() {
        let content = ticket_content(&attrs(), issued_at()).unwrap();
        let expected = format!(
            r#"{{"ActivationRandomness":"rnd","IssuedAt":{},"UniqueDeviceID":"abc"}}"#,
            issued_at().epoch_secs()
        );
        assert_eq!(content.as_bytes(), expected.as_bytes());
    }

    #[test]
    fn ticket_verifies_and_carries_content() {
        let mut rng = session_rng(Some([41u8; 32]));
        let mut serials = SerialAllocator::seeded_from(issued_at());
        let chain = TrustChain::build(
            &mut rng,
            1024,
            &mut serials,
            issued_at(),
            &ValidityDays::default(),
        )
        .unwrap();
        let ticket = SignedTicket::issue(&attrs(), issued_at(), chain.root()).unwrap();
        let opened = verify_envelope(ticket.as_der()).unwrap();
        assert_eq!(
            opened.content,
            ticket_content(&attrs(), issued_at()).unwrap().as_bytes()
        );

        let decoded = STANDARD.decode(ticket.to_base64()).unwrap();
        assert_eq!(decoded, ticket.as_der());
    }
}
