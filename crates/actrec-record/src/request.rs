//! # Request Decoder
//!
//! Turns an activation request property list (XML or binary) into a flat
//! attribute map.
//!
//! Two request shapes are accepted:
//!
//! - a dictionary of identifiers, possibly grouped into nested
//!   dictionaries, which are flattened;
//! - a dictionary carrying the identifiers inside a `<data>` blob that is
//!   itself a property-list dictionary (raw, or as base64 text). The blob
//!   is expanded once; blobs inside the expanded document stay as bytes.
//!
//! Within a dictionary, scalar entries are taken before nested dictionaries
//! and blobs are descended, in document order. The first occurrence of a
//! key wins.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::time::SystemTime;

use actrec_core::{ActivationError, AttrValue, DeviceAttributes, FallbackTable, Timestamp};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use plist::{Dictionary, Value};

/// Deepest dictionary nesting the decoder follows.
pub const MAX_DEPTH: usize = 8;

/// Decode request bytes into a flat attribute map.
pub fn decode_request(bytes: &[u8]) -> Result<BTreeMap<String, AttrValue>, ActivationError> {
    let root = parse_dictionary(bytes)
        .map_err(|e| ActivationError::Decode(format!("request is not a property list: {e}")))?
        .ok_or_else(|| ActivationError::Decode("request root is not a dictionary".into()))?;

    let mut fields = BTreeMap::new();
    flatten(&root, 0, true, &mut fields)?;
    tracing::debug!(fields = fields.len(), "request decoded");
    Ok(fields)
}

/// Decode request bytes and resolve them against the fallback table.
pub fn decode_attributes(
    bytes: &[u8],
    fallback: &FallbackTable,
) -> Result<DeviceAttributes, ActivationError> {
    let attrs = DeviceAttributes::resolve(decode_request(bytes)?, fallback)?;
    for (key, value) in attrs.iter() {
        tracing::trace!(key, kind = value.kind(), "request attribute");
    }
    Ok(attrs)
}

/// `Ok(None)` when the bytes are a property list whose root is not a
/// dictionary.
fn parse_dictionary(bytes: &[u8]) -> Result<Option<Dictionary>, plist::Error> {
    Ok(Value::from_reader(Cursor::new(bytes))?.into_dictionary())
}

fn flatten(
    dict: &Dictionary,
    depth: usize,
    expand_blobs: bool,
    out: &mut BTreeMap<String, AttrValue>,
) -> Result<(), ActivationError> {
    if depth >= MAX_DEPTH {
        return Err(ActivationError::Decode(format!(
            "dictionary nesting deeper than {MAX_DEPTH}"
        )));
    }

    let mut nested: Vec<(Dictionary, bool)> = Vec::new();
    for (key, value) in dict.iter() {
        match value {
            Value::Dictionary(inner) => nested.push((inner.clone(), expand_blobs)),
            Value::Data(blob) if expand_blobs => match embedded_document(blob) {
                Some(inner) => {
                    tracing::debug!(key = key.as_str(), "expanding embedded request document");
                    nested.push((inner, false));
                }
                None => insert_first(out, key, AttrValue::Bytes(blob.clone())),
            },
            leaf => insert_first(out, key, leaf_value(leaf)),
        }
    }

    for (inner, expand) in nested {
        flatten(&inner, depth + 1, expand, out)?;
    }
    Ok(())
}

fn insert_first(out: &mut BTreeMap<String, AttrValue>, key: &str, value: AttrValue) {
    out.entry(key.to_string()).or_insert(value);
}

/// A blob holding a property-list dictionary, raw or base64-encoded.
fn embedded_document(blob: &[u8]) -> Option<Dictionary> {
    if let Ok(Some(dict)) = parse_dictionary(blob) {
        return Some(dict);
    }
    let text: Vec<u8> = blob
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let decoded = STANDARD.decode(text).ok()?;
    parse_dictionary(&decoded).ok().flatten()
}

fn leaf_value(value: &Value) -> AttrValue {
    match value {
        Value::String(s) => AttrValue::String(s.clone()),
        Value::Boolean(b) => AttrValue::Boolean(*b),
        Value::Integer(n) => match n.as_signed() {
            Some(n) => AttrValue::Integer(n),
            None => AttrValue::Opaque("integer".into()),
        },
        Value::Data(blob) => AttrValue::Bytes(blob.clone()),
        Value::Date(date) => {
            let at: DateTime<Utc> = SystemTime::from(*date).into();
            AttrValue::Date(Timestamp::from_utc(at))
        }
        Value::Dictionary(_) => AttrValue::Opaque("dictionary".into()),
        Value::Array(_) => AttrValue::Opaque("array".into()),
        Value::Real(_) => AttrValue::Opaque("real".into()),
        Value::Uid(_) => AttrValue::Opaque("uid".into()),
        _ => AttrValue::Opaque("unknown".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actrec_core::keys;

    fn xml(dict: Dictionary) -> Vec<u8> {
        let mut buf = Vec::new();
        Value::Dictionary(dict).to_writer_xml(&mut buf).unwrap();
        buf
    }

    fn identity() -> Dictionary {
        let mut d = Dictionary::new();
        d.insert(keys::SERIAL_NUMBER.into(), Value::String("C00000000000".into()));
        d.insert(keys::PRODUCT_TYPE.into(), Value::String("iPhone0,0".into()));
        d.insert(keys::UNIQUE_DEVICE_ID.into(), Value::String("0".repeat(40)));
        d
    }

    #[test]
    fn flat_dictionary() {
        let fields = decode_request(&xml(identity())).unwrap();
        assert_eq!(
            fields.get(keys::SERIAL_NUMBER),
            Some(&AttrValue::String("C00000000000".into()))
        );
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn binary_plist_is_accepted() {
        let mut buf = Vec::new();
        Value::Dictionary(identity()).to_writer_binary(&mut buf).unwrap();
        let fields = decode_request(&buf).unwrap();
        assert_eq!(
            fields.get(keys::PRODUCT_TYPE),
            Some(&AttrValue::String("iPhone0,0".into()))
        );
    }

    #[test]
    fn nested_dictionaries_are_flattened() {
        let mut outer = Dictionary::new();
        outer.insert("DeviceID".into(), Value::Dictionary(identity()));
        let fields = decode_request(&xml(outer)).unwrap();
        assert_eq!(
            fields.get(keys::UNIQUE_DEVICE_ID),
            Some(&AttrValue::String("0".repeat(40)))
        );
    }

    #[test]
    fn outer_scalar_beats_nested_duplicate() {
        let mut outer = Dictionary::new();
        outer.insert("Nested".into(), Value::Dictionary(identity()));
        outer.insert(keys::SERIAL_NUMBER.into(), Value::String("OUTER".into()));
        let fields = decode_request(&xml(outer)).unwrap();
        assert_eq!(
            fields.get(keys::SERIAL_NUMBER),
            Some(&AttrValue::String("OUTER".into()))
        );
    }

    #[test]
    fn embedded_blob_is_expanded_once() {
        let mut inner = identity();
        let mut deeper = Dictionary::new();
        deeper.insert("Hidden".into(), Value::String("x".into()));
        inner.insert("Blob".into(), Value::Data(xml(deeper)));

        let mut outer = Dictionary::new();
        outer.insert("ActivationInfoXML".into(), Value::Data(xml(inner)));
        outer.insert("ActivationInfoComplete".into(), Value::Boolean(true));

        let fields = decode_request(&xml(outer)).unwrap();
        assert_eq!(
            fields.get(keys::SERIAL_NUMBER),
            Some(&AttrValue::String("C00000000000".into()))
        );
        assert!(matches!(fields.get("Blob"), Some(AttrValue::Bytes(_))));
        assert!(!fields.contains_key("Hidden"));
        assert!(!fields.contains_key("ActivationInfoXML"));
        assert_eq!(
            fields.get("ActivationInfoComplete"),
            Some(&AttrValue::Boolean(true))
        );
    }

    #[test]
    fn base64_text_blob_is_expanded() {
        let encoded = STANDARD.encode(xml(identity()));
        let mut outer = Dictionary::new();
        outer.insert("ActivationInfoXML".into(), Value::Data(encoded.into_bytes()));
        let fields = decode_request(&xml(outer)).unwrap();
        assert_eq!(
            fields.get(keys::PRODUCT_TYPE),
            Some(&AttrValue::String("iPhone0,0".into()))
        );
    }

    #[test]
    fn plain_blob_stays_bytes() {
        let mut d = identity();
        d.insert("Nonce".into(), Value::Data(vec![0xde, 0xad]));
        let fields = decode_request(&xml(d)).unwrap();
        assert_eq!(fields.get("Nonce"), Some(&AttrValue::Bytes(vec![0xde, 0xad])));
    }

    #[test]
    fn unsupported_kinds_are_opaque() {
        let mut d = identity();
        d.insert("List".into(), Value::Array(vec![Value::Integer(1i64.into())]));
        d.insert("Ratio".into(), Value::Real(0.5));
        d.insert("Count".into(), Value::Integer(7i64.into()));
        let fields = decode_request(&xml(d)).unwrap();
        assert_eq!(fields.get("List"), Some(&AttrValue::Opaque("array".into())));
        assert_eq!(fields.get("Ratio"), Some(&AttrValue::Opaque("real".into())));
        assert_eq!(fields.get("Count"), Some(&AttrValue::Integer(7)));
    }

    #[test]
    fn array_root_is_decode_error() {
        let mut buf = Vec::new();
        Value::Array(vec![]).to_writer_xml(&mut buf).unwrap();
        assert!(matches!(
            decode_request(&buf),
            Err(ActivationError::Decode(_))
        ));
    }

    #[test]
    fn garbage_is_decode_error() {
        assert!(matches!(
            decode_request(b"definitely not a plist"),
            Err(ActivationError::Decode(_))
        ));
    }

    #[test]
    fn excessive_nesting_is_decode_error() {
        let mut d = identity();
        for i in 0..MAX_DEPTH {
            let mut outer = Dictionary::new();
            outer.insert(format!("Level{i}"), Value::Dictionary(d));
            d = outer;
        }
        assert!(matches!(
            decode_request(&xml(d)),
            Err(ActivationError::Decode(_))
        ));
    }

    #[test]
    fn array_identifier_decodes_as_blank_opaque() {
        let mut d = identity();
        d.insert(
            keys::IMEI.into(),
            Value::Array(vec![Value::String("356938035643809".into())]),
        );
        let attrs = decode_attributes(&xml(d), &FallbackTable::default()).unwrap();
        let kinds: Vec<(&str, &str)> = attrs.iter().map(|(k, v)| (k, v.kind())).collect();
        assert!(kinds.contains(&(keys::IMEI, "opaque")));
        assert!(kinds.contains(&(keys::SERIAL_NUMBER, "string")));
        assert_eq!(attrs.blank().collect::<Vec<_>>(), vec![keys::IMEI]);
        assert_eq!(attrs.text(keys::IMEI), "");
    }

    #[test]
    fn missing_udid_is_reported_by_name() {
        let mut d = identity();
        d.remove(keys::UNIQUE_DEVICE_ID);
        let err = decode_attributes(&xml(d), &FallbackTable::default()).unwrap_err();
        assert!(matches!(
            err,
            ActivationError::MissingIdentifier {
                field: keys::UNIQUE_DEVICE_ID
            }
        ));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn string_fields_survive_decoding(
                entries in proptest::collection::btree_map("[A-Za-z]{1,12}", "[A-Za-z0-9,.:/-]{0,24}", 0..12)
            ) {
                let mut d = Dictionary::new();
                for (k, v) in &entries {
                    d.insert(k.clone(), Value::String(v.clone()));
                }
                let fields = decode_request(&xml(d)).unwrap();
                prop_assert_eq!(fields.len(), entries.len());
                for (k, v) in &entries {
                    prop_assert_eq!(fields.get(k), Some(&AttrValue::String(v.clone())));
                }
            }
        }
    }
}
