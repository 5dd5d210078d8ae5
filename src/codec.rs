//! Wire encoding for submissions and listings.

use serde_json::{Map, Value};

use crate::difficulty::{self, Difficulty};
use crate::error::{PowError, Result};
use crate::hasher::{HASH_LEN, WorkHasher};
use crate::types::{AuxBindings, ContentEntry, Digest, Nonce, SubmissionRecord, WireSchema};

/// Lowercase hex, two digits per byte, no prefix or separators.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode a 32-byte value, naming `field` in the error.
pub fn decode_hash(field: &'static str, s: &str) -> Result<[u8; HASH_LEN]> {
    let mut out = [0u8; HASH_LEN];
    hex::decode_to_slice(s, &mut out).map_err(|e| PowError::invalid_hex(field, e))?;
    Ok(out)
}

/// The external identifier of accepted content: its work hash in hex.
pub fn content_id(work_hash: &Digest) -> String {
    to_hex(work_hash)
}

/// Build the record for a solved search. An empty tag hashes like no tag and
/// is left out of the record.
pub fn encode_submission(
    val: &str,
    aux: &AuxBindings,
    nonce: &Nonce,
    work_hash: &Digest,
) -> SubmissionRecord {
    SubmissionRecord {
        val: val.to_string(),
        tag: aux.tag().filter(|t| !t.is_empty()).map(str::to_string),
        time: aux.time(),
        nonce_hex: to_hex(nonce),
        work_hex: to_hex(work_hash),
    }
}

/// Render a record as the JSON body for a given schema.
pub fn to_wire(record: &SubmissionRecord, schema: WireSchema) -> Value {
    let mut body = Map::new();
    body.insert("val".into(), Value::String(record.val.clone()));
    if let Some(tag) = &record.tag {
        body.insert("tag".into(), Value::String(tag.clone()));
    }
    if let Some(time) = record.time {
        body.insert("time".into(), Value::from(time));
    }
    body.insert(schema.nonce_key().into(), Value::String(record.nonce_hex.clone()));
    body.insert(schema.work_key().into(), Value::String(record.work_hex.clone()));
    Value::Object(body)
}

/// Recompute a record's proof from its plaintext fields.
///
/// Returns `Ok(false)` for well-formed records whose work does not check out;
/// errors only on undecodable hex.
pub fn verify_submission<H: WorkHasher + ?Sized>(
    hasher: &H,
    record: &SubmissionRecord,
    difficulty: Difficulty,
) -> Result<bool> {
    let nonce = decode_hash("nonce", &record.nonce_hex)?;
    let work = decode_hash("work", &record.work_hex)?;
    let aux = AuxBindings::from_parts(record.tag.clone(), record.time);
    let load_hash = aux.load_hash(hasher, record.val.as_bytes());
    Ok(difficulty::verify(hasher, &load_hash, &nonce, &work, difficulty))
}

pub fn decode_list_response(bytes: &[u8]) -> Result<Vec<ContentEntry>> {
    serde_json::from_slice(bytes).map_err(|e| PowError::MalformedResponse(e.to_string()))
}

/// Newest first. Entries with equal `added` keep their input order.
pub fn sort_by_recency_descending(mut entries: Vec<ContentEntry>) -> Vec<ContentEntry> {
    entries.sort_by(|a, b| b.added.total_cmp(&a.added));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::Sha256Hasher;
    use crate::miner::{CancelToken, Miner};
    use crate::prng::Entropy;

    fn entry(val: &str, added: f64) -> ContentEntry {
        ContentEntry { val: val.into(), added, work: None, salt: None }
    }

    #[test]
    fn hex_is_lowercase_and_padded() {
        assert_eq!(to_hex(&[0x00, 0x0a, 0xff, 0xB0]), "000affb0");
        assert_eq!(to_hex(&[]), "");
    }

    #[test]
    fn decode_hash_rejects_bad_input() {
        assert!(matches!(decode_hash("work", "zz"), Err(PowError::InvalidHex { field: "work", .. })));
        assert!(decode_hash("work", &"ab".repeat(31)).is_err());
        assert_eq!(decode_hash("work", &"AB".repeat(32)).unwrap(), [0xab; 32]);
    }

    #[test]
    fn sort_is_stable_and_descending() {
        let sorted = sort_by_recency_descending(vec![entry("a", 5.0), entry("b", 5.0), entry("c", 9.0)]);
        let vals: Vec<_> = sorted.iter().map(|e| e.val.as_str()).collect();
        assert_eq!(vals, ["c", "a", "b"]);
    }

    #[test]
    fn malformed_listing() {
        assert!(matches!(decode_list_response(b"{not json"), Err(PowError::MalformedResponse(_))));
        assert!(matches!(decode_list_response(br#"{"val":"a","added":1}"#), Err(PowError::MalformedResponse(_))));
        assert!(matches!(decode_list_response(br#"[{"val":"a"}]"#), Err(PowError::MalformedResponse(_))));
        assert!(matches!(decode_list_response(b"[1, 2]"), Err(PowError::MalformedResponse(_))));
    }

    #[test]
    fn listing_accepts_gateway_shape() {
        let body = br#"[{"val":"hi","time":42,"salt":"00","work":"11"},{"val":"yo","added":7,"extra":true}]"#;
        let entries = decode_list_response(body).unwrap();
        assert_eq!(entries[0].added, 42.0);
        assert_eq!(entries[0].work.as_deref(), Some("11"));
        assert_eq!(entries[1], entry("yo", 7.0));
        assert!(decode_list_response(b"[]").unwrap().is_empty());
    }

    #[test]
    fn listing_accepts_fractional_and_exponent_numbers() {
        let body = br#"[{"val":"a","added":1700000000000.5},{"val":"b","added":1.7e12},{"val":"c","added":1700000000001}]"#;
        let sorted = sort_by_recency_descending(decode_list_response(body).unwrap());
        let vals: Vec<_> = sorted.iter().map(|e| e.val.as_str()).collect();
        assert_eq!(vals, ["c", "a", "b"]);
        assert_eq!(sorted[2].added, 1.7e12);
    }

    #[test]
    fn wire_keys_follow_schema() {
        let rec = encode_submission("v", &AuxBindings::timed(3), &[1; 32], &[2; 32]);
        let canonical = to_wire(&rec, WireSchema::Canonical);
        assert_eq!(canonical["nonce"], "01".repeat(32));
        assert_eq!(canonical["work"], "02".repeat(32));
        assert_eq!(canonical["time"], 3);
        assert!(canonical.get("tag").is_none());

        let salted = to_wire(&rec, WireSchema::Salted);
        assert!(salted.get("nonce").is_none());
        assert_eq!(salted["salt"], "01".repeat(32));

        let legacy = to_wire(&encode_submission("v", &AuxBindings::None, &[1; 32], &[2; 32]), WireSchema::HexSuffixed);
        assert_eq!(legacy.as_object().unwrap().len(), 3);
        assert_eq!(legacy["workhex"], "02".repeat(32));
    }

    #[test]
    fn empty_tag_is_omitted_but_still_verifies() {
        let aux = AuxBindings::TaggedTimed { tag: String::new(), time: 9 };
        let load = aux.load_hash(&Sha256Hasher, b"v");
        let work = difficulty::work_hash(&Sha256Hasher, &load, &[7; 32]);
        let rec = encode_submission("v", &aux, &[7; 32], &work);
        assert_eq!((rec.tag.as_deref(), rec.time), (None, Some(9)));
        assert!(verify_submission(&Sha256Hasher, &rec, Difficulty::ZERO).unwrap());

        let tagged = encode_submission("v", &AuxBindings::tagged("t"), &[7; 32], &work);
        assert_eq!(to_wire(&tagged, WireSchema::Salted)["tag"], "t");
    }

    #[test]
    fn mined_record_verifies_and_tampering_fails() {
        let miner = Miner::new().entropy(Entropy::Seeded([3; 16]));
        let aux = AuxBindings::TaggedTimed { tag: "board".into(), time: 1_720_000_000_123 };
        let d = Difficulty::new(1).unwrap();
        let sol = miner.solve(b"post body", &aux, d, &CancelToken::new()).unwrap();

        let rec = encode_submission("post body", &aux, &sol.nonce, &sol.work_hash);
        assert_eq!(rec.work_hex.len(), 64);
        assert!(verify_submission(&Sha256Hasher, &rec, d).unwrap());

        let mut wrong_time = rec.clone();
        wrong_time.time = Some(1_720_000_000_124);
        assert!(!verify_submission(&Sha256Hasher, &wrong_time, d).unwrap());

        let mut wrong_val = rec;
        wrong_val.val.push('!');
        assert!(!verify_submission(&Sha256Hasher, &wrong_val, d).unwrap());
    }
}
