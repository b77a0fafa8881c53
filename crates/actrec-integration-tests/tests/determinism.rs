//! # Determinism
//!
//! With a fixed clock and a fixed RNG seed every artifact is reproducible
//! byte for byte. Changing only the seed changes the keys, so the ticket
//! (a signed envelope embedding the server certificate) changes while every
//! other account token field stays the same. Unseeded sessions share
//! nothing: concurrent runs over one configuration draw independent keys.

use actrec_core::{keys, DeviceAttributes, FallbackTable, FixedClock, SynthesisConfig, Timestamp};
use actrec_record::{generate_from_attributes, token_keys, SessionArtifacts};
use proptest::prelude::*;

fn attrs(udid: &str) -> DeviceAttributes {
    DeviceAttributes::from_pairs(
        [
            (keys::SERIAL_NUMBER, "C00000000000"),
            (keys::PRODUCT_TYPE, "iPhone0,0"),
            (keys::UNIQUE_DEVICE_ID, udid),
            (keys::ACTIVATION_RANDOMNESS, "0".repeat(36).as_str()),
        ],
        &FallbackTable::default(),
    )
    .unwrap()
}

fn run(seed: [u8; 32], at: Timestamp) -> SessionArtifacts {
    let config = SynthesisConfig {
        key_bits: 1024,
        rng_seed: Some(seed),
        ..SynthesisConfig::default()
    };
    generate_from_attributes(&attrs(&"0".repeat(40)), &config, &FixedClock::new(at)).unwrap()
}

fn at() -> Timestamp {
    Timestamp::parse("2026-01-15T12:00:00Z").unwrap()
}

#[test]
fn same_seed_and_clock_give_identical_bytes() {
    let a = run([9u8; 32], at());
    let b = run([9u8; 32], at());
    assert_eq!(a.document, b.document);
    assert_eq!(a.ticket, b.ticket);
    assert_eq!(a.signed_token, b.signed_token);
    assert_eq!(a.root_certificate, b.root_certificate);
}

#[test]
fn different_seeds_differ_only_in_ticket() {
    let a = run([10u8; 32], at());
    let b = run([11u8; 32], at());
    assert_ne!(a.document, b.document);

    let a_keys: Vec<&str> = a.token.keys().collect();
    let b_keys: Vec<&str> = b.token.keys().collect();
    assert_eq!(a_keys, b_keys);
    for key in a_keys {
        if key == token_keys::ACTIVATION_TICKET {
            assert_ne!(a.token.get(key), b.token.get(key));
        } else {
            assert_eq!(a.token.get(key), b.token.get(key), "{key} differs");
        }
    }
}

#[test]
fn issuance_time_changes_certificates() {
    let a = run([12u8; 32], at());
    let b = run([12u8; 32], at().plus_days(1));
    assert_ne!(
        a.device_certificate.tbs_certificate.validity,
        b.device_certificate.tbs_certificate.validity
    );
}

#[test]
fn unseeded_sessions_run_in_parallel_with_distinct_keys() {
    let config = SynthesisConfig {
        key_bits: 1024,
        rng_seed: None,
        ..SynthesisConfig::default()
    };
    let attributes = attrs(&"0".repeat(40));

    let sessions: Vec<SessionArtifacts> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..3)
            .map(|_| {
                scope.spawn(|| {
                    generate_from_attributes(&attributes, &config, &FixedClock::new(at()))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });

    assert_eq!(sessions.len(), 3);
    for (i, a) in sessions.iter().enumerate() {
        for b in &sessions[i + 1..] {
            assert_ne!(
                a.root_certificate.tbs_certificate.subject_public_key_info,
                b.root_certificate.tbs_certificate.subject_public_key_info
            );
            assert_ne!(
                a.server_certificate.tbs_certificate.subject_public_key_info,
                b.server_certificate.tbs_certificate.subject_public_key_info
            );
            assert_ne!(a.document, b.document);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(4))]

    #[test]
    fn token_fields_other_than_ticket_depend_only_on_attributes(seed in any::<[u8; 32]>()) {
        let baseline = run([0u8; 32], at());
        let other = run(seed, at());
        for key in baseline.token.keys() {
            if key != token_keys::ACTIVATION_TICKET {
                prop_assert_eq!(baseline.token.get(key), other.token.get(key));
            }
        }
    }
}
