//! # Verify Subcommand
//!
//! Checks that a record is internally consistent:
//!
//! - `AccountTokenSignature` verifies over `AccountToken` under the key of
//!   `AccountTokenCertificate`.
//! - The `ActivationTicket` named in the token is a signed envelope whose
//!   signer is `AccountTokenCertificate`.
//! - `UniqueDeviceCertificate` is a chain ending in a self-signed root with
//!   `DeviceCertificate` as its leaf.
//!
//! Each check prints one `OK:`/`FAIL:` line; the exit code is 1 when any
//! check fails.

use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::Args;

use actrec_crypto::{
    decode_certificate, parse_pem_bundle, public_key_from_certificate, verify_chain,
    verify_envelope, verify_pkcs1_sha256, CryptoError,
};
use actrec_record::{parse_rendered, token_keys, ActivationRecord};

/// Arguments for `actrec verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Record property list (XML or binary).
    #[arg(value_name = "FILE")]
    pub record: PathBuf,
}

/// Outcome of one consistency check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    /// Short name of the property checked.
    pub name: &'static str,
    /// `Err` carries the reason the check failed.
    pub outcome: Result<(), String>,
}

impl Check {
    fn new(name: &'static str, outcome: Result<(), CryptoError>) -> Self {
        Self {
            name,
            outcome: outcome.map_err(|e| e.to_string()),
        }
    }

    /// Whether the check succeeded.
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Run every consistency check against `record`.
pub fn verify_record(record: &ActivationRecord) -> Vec<Check> {
    vec![
        Check::new("account token signature", check_token_signature(record)),
        Check::new("activation ticket", check_ticket(record)),
        Check::new("certificate chain", check_chain(record)),
    ]
}

/// Execute the verify subcommand.
pub fn run_verify(args: &VerifyArgs) -> Result<u8> {
    let bytes = std::fs::read(&args.record)
        .with_context(|| format!("failed to read record: {}", args.record.display()))?;
    let record = ActivationRecord::from_plist_bytes(&bytes)
        .with_context(|| format!("failed to decode record: {}", args.record.display()))?;

    let checks = verify_record(&record);
    for check in &checks {
        match &check.outcome {
            Ok(()) => println!("OK: {}", check.name),
            Err(reason) => println!("FAIL: {}: {reason}", check.name),
        }
    }
    let failed = checks.iter().filter(|c| !c.passed()).count();
    tracing::info!(checks = checks.len(), failed, "record verified");
    Ok(if failed == 0 { 0 } else { 1 })
}

fn check_token_signature(record: &ActivationRecord) -> Result<(), CryptoError> {
    let server = decode_certificate(&record.account_token_certificate)?;
    let public_key = public_key_from_certificate(&server)?;
    verify_pkcs1_sha256(
        &public_key,
        &record.account_token,
        &record.account_token_signature,
    )
}

fn check_ticket(record: &ActivationRecord) -> Result<(), CryptoError> {
    let token = std::str::from_utf8(&record.account_token)
        .map_err(|e| fail(format!("account token is not UTF-8: {e}")))?;
    let fields =
        parse_rendered(token).ok_or_else(|| fail("account token is not well formed".into()))?;
    let ticket_b64 = fields
        .into_iter()
        .find(|(key, _)| key == token_keys::ACTIVATION_TICKET)
        .and_then(|(_, value)| value)
        .ok_or_else(|| fail("account token has no ActivationTicket".into()))?;
    let der = STANDARD
        .decode(ticket_b64.as_bytes())
        .map_err(|e| fail(format!("ActivationTicket is not base64: {e}")))?;

    let opened = verify_envelope(&der)?;
    let server = decode_certificate(&record.account_token_certificate)?;
    if opened.signer_certificate != server {
        return Err(fail(
            "ticket signer is not the account token certificate".into(),
        ));
    }
    Ok(())
}

fn check_chain(record: &ActivationRecord) -> Result<(), CryptoError> {
    let bundle = parse_pem_bundle(&record.unique_device_certificate)?;
    let device = decode_certificate(&record.device_certificate)?;
    if bundle.first() != Some(&device) {
        return Err(fail(
            "bundle does not start with the device certificate".into(),
        ));
    }
    verify_chain(&bundle)
}

fn fail(reason: String) -> CryptoError {
    CryptoError::VerificationFailed(reason)
}
