//! Normalize raw queue payloads into canonical [`Message`]s.
//!
//! Producers disagree on field naming: newer ones send canonical snake_case
//! keys, legacy ones send `ID`/`DocumentId`/`PictureID`-style keys. Each
//! canonical field is resolved through an ordered alias list (canonical key
//! first, then each legacy alias; the first non-empty value wins), falling
//! back to the field's sentinel default. Only a payload that cannot be decoded
//! into a key/value bag at all is rejected.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use depesche_core::message::{
    format_time, ContentType, Message, DEFAULT_NOTE, DEFAULT_STATUS, UNKNOWN_CONTENT_ID,
    UNKNOWN_FILE, UNKNOWN_JOB_ID,
};

use crate::error::QueueError;

/// A raw payload in one of the shapes producers deliver.
#[derive(Debug, Clone)]
pub enum RawPayload {
    /// Already-decoded structured data.
    Structured(Value),
    /// Serialized text form (JSON).
    Text(String),
    /// Serialized binary form (MessagePack).
    Binary(Vec<u8>),
}

/// Alias chain for `job_id`, canonical key first.
const JOB_ID_KEYS: &[&str] = &["job_id", "ID"];

/// Alias chain for `content_id`, canonical key first.
const CONTENT_ID_KEYS: &[&str] = &[
    "content_id",
    "DocumentId",
    "PictureID",
    "AudioID",
    "VideoID",
];

/// Alias chain for `file_name`, canonical key first.
const FILE_NAME_KEYS: &[&str] = &["file_name", "FileName"];

/// Ordered (identifying key, resolved type) rules for inferring
/// `content_type` when no explicit value is present.
///
/// The order is a fixed precedence, not an accident: when a payload
/// incorrectly carries more than one identifying key, the first matching
/// rule wins (Document > Picture > Audio > Video).
const CONTENT_TYPE_RULES: &[(&str, ContentType)] = &[
    ("DocumentId", ContentType::Document),
    ("PictureID", ContentType::Picture),
    ("AudioID", ContentType::Audio),
    ("VideoID", ContentType::Video),
];

/// Decode a raw payload into a key/value bag.
///
/// Non-object shapes (arrays, bare scalars, garbage bytes) are the only
/// rejection path in normalization.
fn decode(raw: &RawPayload) -> Result<Map<String, Value>, QueueError> {
    let value = match raw {
        RawPayload::Structured(v) => v.clone(),
        RawPayload::Text(s) => serde_json::from_str(s)
            .map_err(|e| QueueError::Decode(format!("invalid JSON payload: {e}")))?,
        RawPayload::Binary(bytes) => rmp_serde::from_slice(bytes)
            .map_err(|e| QueueError::Decode(format!("invalid MessagePack payload: {e}")))?,
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(QueueError::Decode(format!(
            "payload is not a key/value object (got {})",
            type_name(&other)
        ))),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Coerce a JSON value to a non-empty string field, if possible.
///
/// Legacy producers occasionally send numeric IDs; those are rendered as
/// text. Empty strings, nulls and compound values never win an alias probe.
fn as_field(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Probe an alias chain in priority order; first non-empty value wins.
fn probe(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| obj.get(*k).and_then(as_field))
}

/// Resolve `content_type`: explicit value first, then the ordered
/// key-presence rules, then the sentinel.
fn resolve_content_type(obj: &Map<String, Value>) -> ContentType {
    if let Some(label) = obj.get("content_type").and_then(as_field) {
        return ContentType::from_label(&label);
    }

    CONTENT_TYPE_RULES
        .iter()
        .find(|(key, _)| obj.contains_key(*key))
        .map(|(_, ct)| *ct)
        .unwrap_or(ContentType::Unknown)
}

/// Normalize a raw payload into a canonical [`Message`] using the current
/// wall clock for the ingestion-time fallback.
pub fn normalize(raw: &RawPayload) -> Result<Message, QueueError> {
    normalize_at(raw, Utc::now())
}

/// Normalize with an explicit ingestion instant.
///
/// A supplied `time` value is kept verbatim; producers own their own
/// timestamp format. Only the generated fallback uses the canonical
/// sortable pattern.
pub fn normalize_at(raw: &RawPayload, ingested_at: DateTime<Utc>) -> Result<Message, QueueError> {
    let obj = decode(raw)?;

    Ok(Message {
        time: probe(&obj, &["time"]).unwrap_or_else(|| format_time(ingested_at)),
        job_id: probe(&obj, JOB_ID_KEYS).unwrap_or_else(|| UNKNOWN_JOB_ID.to_string()),
        content_id: probe(&obj, CONTENT_ID_KEYS).unwrap_or_else(|| UNKNOWN_CONTENT_ID.to_string()),
        content_type: resolve_content_type(&obj),
        file_name: probe(&obj, FILE_NAME_KEYS).unwrap_or_else(|| UNKNOWN_FILE.to_string()),
        status: probe(&obj, &["status"]).unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        message: probe(&obj, &["message"]).unwrap_or_else(|| DEFAULT_NOTE.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(body: &str) -> RawPayload {
        RawPayload::Text(body.to_string())
    }

    fn at() -> DateTime<Utc> {
        "2025-06-14T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn legacy_picture_payload_normalizes_fully() {
        let raw = text(r#"{"ID": "J1", "PictureID": "P9", "FileName": "a.png"}"#);
        let msg = normalize_at(&raw, at()).unwrap();

        assert_eq!(msg.job_id, "J1");
        assert_eq!(msg.content_id, "P9");
        assert_eq!(msg.content_type, ContentType::Picture);
        assert_eq!(msg.file_name, "a.png");
        assert_eq!(msg.status, "Processed");
        assert_eq!(msg.message, "No additional information");
        assert_eq!(msg.time, "2025-06-14 12:00:00");
        assert!(msg.is_persistence_valid());
    }

    #[test]
    fn empty_payload_yields_all_sentinels() {
        let msg = normalize_at(&text("{}"), at()).unwrap();

        assert_eq!(msg.job_id, UNKNOWN_JOB_ID);
        assert_eq!(msg.content_id, UNKNOWN_CONTENT_ID);
        assert_eq!(msg.content_type, ContentType::Unknown);
        assert_eq!(msg.file_name, UNKNOWN_FILE);
        assert!(!msg.is_persistence_valid());
    }

    #[test]
    fn canonical_keys_win_over_legacy_aliases() {
        let raw = text(r#"{"job_id": "J-new", "ID": "J-old", "content_id": "C-new", "DocumentId": "C-old"}"#);
        let msg = normalize_at(&raw, at()).unwrap();

        assert_eq!(msg.job_id, "J-new");
        assert_eq!(msg.content_id, "C-new");
    }

    #[test]
    fn empty_canonical_value_falls_through_to_alias() {
        let raw = text(r#"{"job_id": "", "ID": "J7"}"#);
        let msg = normalize_at(&raw, at()).unwrap();
        assert_eq!(msg.job_id, "J7");
    }

    #[test]
    fn numeric_ids_are_coerced_to_text() {
        let raw = text(r#"{"ID": 1042, "DocumentId": 77}"#);
        let msg = normalize_at(&raw, at()).unwrap();
        assert_eq!(msg.job_id, "1042");
        assert_eq!(msg.content_id, "77");
    }

    #[test]
    fn content_type_precedence_document_over_picture() {
        // A payload incorrectly carrying two identifying keys resolves by
        // fixed precedence, not by map iteration order.
        let raw = text(r#"{"PictureID": "P1", "DocumentId": "D1"}"#);
        let msg = normalize_at(&raw, at()).unwrap();
        assert_eq!(msg.content_type, ContentType::Document);
        // content_id follows its own alias chain: DocumentId outranks PictureID.
        assert_eq!(msg.content_id, "D1");
    }

    #[test]
    fn content_type_precedence_audio_over_video() {
        let raw = text(r#"{"VideoID": "V1", "AudioID": "A1"}"#);
        let msg = normalize_at(&raw, at()).unwrap();
        assert_eq!(msg.content_type, ContentType::Audio);
    }

    #[test]
    fn explicit_content_type_overrides_inference() {
        let raw = text(r#"{"content_type": "Video", "DocumentId": "D1"}"#);
        let msg = normalize_at(&raw, at()).unwrap();
        assert_eq!(msg.content_type, ContentType::Video);
    }

    #[test]
    fn unrecognized_explicit_content_type_is_unknown() {
        let raw = text(r#"{"content_type": "Hologram", "job_id": "J1"}"#);
        let msg = normalize_at(&raw, at()).unwrap();
        assert_eq!(msg.content_type, ContentType::Unknown);
        // Still persistence-valid through job_id.
        assert!(msg.is_persistence_valid());
    }

    #[test]
    fn supplied_time_is_kept_verbatim() {
        let raw = text(r#"{"time": "06/14/2025, 01:02:03 PM", "job_id": "J1"}"#);
        let msg = normalize_at(&raw, at()).unwrap();
        assert_eq!(msg.time, "06/14/2025, 01:02:03 PM");
    }

    #[test]
    fn structured_payload_is_used_as_is() {
        let raw = RawPayload::Structured(serde_json::json!({
            "AudioID": "A3",
            "status": "Failed",
            "message": "transcoding error"
        }));
        let msg = normalize_at(&raw, at()).unwrap();

        assert_eq!(msg.content_id, "A3");
        assert_eq!(msg.content_type, ContentType::Audio);
        assert_eq!(msg.status, "Failed");
        assert_eq!(msg.message, "transcoding error");
    }

    #[test]
    fn binary_payload_decodes_like_text() {
        let value = serde_json::json!({"ID": "J9", "VideoID": "V2", "FileName": "clip.mp4"});
        let bytes = rmp_serde::to_vec(&value).unwrap();

        let from_binary = normalize_at(&RawPayload::Binary(bytes), at()).unwrap();
        let from_text = normalize_at(&text(&value.to_string()), at()).unwrap();

        assert_eq!(from_binary, from_text);
        assert_eq!(from_binary.content_type, ContentType::Video);
    }

    #[test]
    fn invalid_json_is_a_decode_error() {
        let err = normalize_at(&text("not json at all"), at()).unwrap_err();
        assert!(matches!(err, QueueError::Decode(_)));
    }

    #[test]
    fn non_object_payloads_are_decode_errors() {
        for body in ["[1, 2, 3]", "\"bare string\"", "42", "null"] {
            let err = normalize_at(&text(body), at()).unwrap_err();
            assert!(matches!(err, QueueError::Decode(_)), "body: {body}");
        }
    }

    #[test]
    fn garbage_binary_is_a_decode_error() {
        let err = normalize_at(&RawPayload::Binary(vec![0xc1, 0xff, 0x00]), at()).unwrap_err();
        assert!(matches!(err, QueueError::Decode(_)));
    }

    #[test]
    fn null_and_compound_values_never_win_a_probe() {
        let raw = text(r#"{"job_id": null, "content_id": {"nested": true}, "file_name": ["a"]}"#);
        let msg = normalize_at(&raw, at()).unwrap();

        assert_eq!(msg.job_id, UNKNOWN_JOB_ID);
        assert_eq!(msg.content_id, UNKNOWN_CONTENT_ID);
        assert_eq!(msg.file_name, UNKNOWN_FILE);
    }
}
