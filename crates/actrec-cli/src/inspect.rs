//! # Inspect Subcommand
//!
//! Prints the contents of a record: each field with its size, the subjects
//! and issuers of the embedded certificates, and the account token lines.
//! `--json` emits the same facts as one JSON document.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use actrec_crypto::{decode_certificate, parse_pem_bundle, CertificateSummary};
use actrec_record::{parse_rendered, record_keys, ActivationRecord};

/// Arguments for `actrec inspect`.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Record property list (XML or binary).
    #[arg(value_name = "FILE")]
    pub record: PathBuf,

    /// Emit JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// What `inspect` reports about a record.
#[derive(Debug, Serialize)]
pub struct RecordReport {
    /// Value of the `unbrick` flag.
    pub unbrick: bool,
    /// Field name and size in bytes, in document order.
    pub fields: Vec<(String, usize)>,
    /// Certificates keyed by where they were found.
    pub certificates: Vec<CertificateReport>,
    /// Account token lines. `None` values are the empty dictionary.
    pub token: Vec<(String, Option<String>)>,
}

/// One certificate found in a record.
#[derive(Debug, Serialize)]
pub struct CertificateReport {
    /// Record key holding the certificate; bundle entries carry their
    /// index, as in `UniqueDeviceCertificate[1]`.
    pub source: String,
    /// RFC 4514 subject.
    pub subject: String,
    /// RFC 4514 issuer.
    pub issuer: String,
    /// Serial number as lowercase hex.
    pub serial: String,
    /// Start of validity, ISO 8601.
    pub not_before: String,
    /// End of validity, ISO 8601.
    pub not_after: String,
}

impl CertificateReport {
    fn new(source: String, summary: CertificateSummary) -> Self {
        Self {
            source,
            subject: summary.subject,
            issuer: summary.issuer,
            serial: summary.serial,
            not_before: summary.not_before,
            not_after: summary.not_after,
        }
    }
}

/// Collect the report for `record`.
pub fn inspect_record(record: &ActivationRecord) -> Result<RecordReport> {
    let fields = record
        .blobs()
        .iter()
        .map(|(key, blob)| (key.to_string(), blob.len()))
        .collect();

    let mut certificates = Vec::new();
    for (source, der) in [
        (
            record_keys::ACCOUNT_TOKEN_CERTIFICATE,
            &record.account_token_certificate,
        ),
        (record_keys::DEVICE_CERTIFICATE, &record.device_certificate),
    ] {
        let cert = decode_certificate(der).with_context(|| format!("{source} is not a certificate"))?;
        certificates.push(CertificateReport::new(
            source.to_string(),
            CertificateSummary::of(&cert),
        ));
    }
    let bundle = parse_pem_bundle(&record.unique_device_certificate).with_context(|| {
        format!(
            "{} is not a PEM bundle",
            record_keys::UNIQUE_DEVICE_CERTIFICATE
        )
    })?;
    for (i, cert) in bundle.iter().enumerate() {
        certificates.push(CertificateReport::new(
            format!("{}[{i}]", record_keys::UNIQUE_DEVICE_CERTIFICATE),
            CertificateSummary::of(cert),
        ));
    }

    let token = std::str::from_utf8(&record.account_token)
        .ok()
        .and_then(parse_rendered)
        .context("account token is not well formed")?;

    Ok(RecordReport {
        unbrick: record.unbrick,
        fields,
        certificates,
        token,
    })
}

/// Execute the inspect subcommand.
pub fn run_inspect(args: &InspectArgs) -> Result<u8> {
    let bytes = std::fs::read(&args.record)
        .with_context(|| format!("failed to read record: {}", args.record.display()))?;
    let record = ActivationRecord::from_plist_bytes(&bytes)
        .with_context(|| format!("failed to decode record: {}", args.record.display()))?;
    let report = inspect_record(&record)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(0);
    }

    println!("Record: {}", args.record.display());
    println!("  {}: {}", record_keys::UNBRICK, report.unbrick);
    for (key, len) in &report.fields {
        println!("  {key}: {len} bytes");
    }
    println!("Certificates ({}):", report.certificates.len());
    for cert in &report.certificates {
        println!("  {}", cert.source);
        println!("    Subject: {}", cert.subject);
        println!("    Issuer:  {}", cert.issuer);
        println!("    Serial:  {}", cert.serial);
        println!("    Valid:   {} .. {}", cert.not_before, cert.not_after);
    }
    println!("Account token ({} fields):", report.token.len());
    for (key, value) in &report.token {
        match value {
            Some(value) => println!("  {key} = {}", abbreviate(value)),
            None => println!("  {key} = {{}}"),
        }
    }
    Ok(0)
}

/// Long values (the base64 ticket) are cut to keep one field per line.
fn abbreviate(value: &str) -> String {
    const MAX: usize = 64;
    match value.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}… ({} chars)", &value[..cut], value.chars().count()),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actrec_core::{keys, DeviceAttributes, FallbackTable, FixedClock, SynthesisConfig, Timestamp};
    use actrec_record::{generate_from_attributes, RECORD_KEYS};

    fn record() -> ActivationRecord {
        let attrs = DeviceAttributes::from_pairs(
            [
                (keys::SERIAL_NUMBER, "C00000000000"),
                (keys::PRODUCT_TYPE, "iPhone0,0"),
                (keys::UNIQUE_DEVICE_ID, "inspect-udid"),
            ],
            &FallbackTable::default(),
        )
        .unwrap();
        let config = SynthesisConfig {
            key_bits: 1024,
            rng_seed: Some([81u8; 32]),
            ..SynthesisConfig::default()
        };
        let clock = FixedClock::new(Timestamp::parse("2026-01-15T12:00:00Z").unwrap());
        generate_from_attributes(&attrs, &config, &clock)
            .unwrap()
            .record
    }

    #[test]
    fn report_covers_fields_certificates_and_token() {
        let report = inspect_record(&record()).unwrap();
        assert!(report.unbrick);
        assert_eq!(report.fields.len(), RECORD_KEYS.len() - 1);
        assert!(report.fields.iter().all(|(_, len)| *len > 0));
        // Server, device, then the three bundle entries.
        assert_eq!(report.certificates.len(), 5);
        assert!(report.certificates[1].subject.contains("C00000000000"));
        assert_eq!(report.token.len(), 13);
    }

    #[test]
    fn json_output_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.plist");
        std::fs::write(&path, record().to_xml().unwrap()).unwrap();
        let args = InspectArgs {
            record: path,
            json: true,
        };
        assert_eq!(run_inspect(&args).unwrap(), 0);
    }

    #[test]
    fn abbreviates_long_values() {
        assert_eq!(abbreviate("short"), "short");
        let long = "x".repeat(100);
        let cut = abbreviate(&long);
        assert!(cut.starts_with(&"x".repeat(64)));
        assert!(cut.ends_with("(100 chars)"));
    }

    #[test]
    fn garbage_certificate_is_reported() {
        let mut record = record();
        record.device_certificate = b"nope".to_vec();
        let err = inspect_record(&record).unwrap_err();
        assert!(format!("{err:#}").contains(record_keys::DEVICE_CERTIFICATE));
    }
}
