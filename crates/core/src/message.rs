use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Sentinel used when no job identifier can be resolved from a payload.
pub const UNKNOWN_JOB_ID: &str = "Unknown JobID";
/// Sentinel used when no content identifier can be resolved from a payload.
pub const UNKNOWN_CONTENT_ID: &str = "Unknown ContentID";
/// Sentinel used when no file name can be resolved from a payload.
pub const UNKNOWN_FILE: &str = "Unknown File";
/// Default status for payloads that carry none.
pub const DEFAULT_STATUS: &str = "Processed";
/// Default free-form note for payloads that carry none.
pub const DEFAULT_NOTE: &str = "No additional information";

/// Textual pattern for ingestion-time timestamps.
///
/// Producers send `time` as an opaque string which we keep verbatim. When we
/// have to generate a timestamp ourselves, this pattern keeps lexicographic
/// order identical to chronological order, so the store's string sort on
/// `time` stays meaningful for generated values.
pub const TIME_PATTERN: &str = "%Y-%m-%d %H:%M:%S";

/// Format a wall-clock instant in the canonical `time` pattern.
pub fn format_time(at: DateTime<Utc>) -> String {
    at.format(TIME_PATTERN).to_string()
}

/// The kind of artifact a job-status event refers to.
///
/// Serialized as its display label everywhere (wire, store, logs); the
/// `Unknown` label doubles as the sentinel for the validity predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Document,
    Picture,
    Audio,
    Video,
    Unknown,
}

impl ContentType {
    /// The canonical label for this type.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Document => "Document",
            Self::Picture => "Picture",
            Self::Audio => "Audio",
            Self::Video => "Video",
            Self::Unknown => "Unknown Type",
        }
    }

    /// Parse a producer-supplied label. Anything unrecognized maps to
    /// `Unknown` rather than failing; normalization is best-effort.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Document" => Self::Document,
            "Picture" => Self::Picture,
            "Audio" => Self::Audio,
            "Video" => Self::Video,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

impl Serialize for ContentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_label())
    }
}

impl<'de> Deserialize<'de> for ContentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Self::from_label(&label))
    }
}

/// Canonical job-status record, immutable once constructed.
///
/// Built exactly once by the normalizer from a single raw payload, then
/// consumed independently by the persistence gateway (durable copy) and the
/// broadcast relay (ephemeral push). Fields that could not be resolved hold
/// their sentinel defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Producer-supplied timestamp string, or ingestion time when absent.
    pub time: String,
    /// Identifies the originating job.
    pub job_id: String,
    /// Identifies the artifact (document/picture/audio/video).
    pub content_id: String,
    /// Kind of artifact, derived from identifying keys when absent.
    pub content_type: ContentType,
    /// Original file name.
    pub file_name: String,
    /// Free-form processing status.
    pub status: String,
    /// Free-form human note.
    pub message: String,
}

impl Message {
    /// Whether this record is eligible for durable storage.
    ///
    /// At least one of the three identifying fields must carry real data;
    /// a record that is sentinel in all three says nothing about any job.
    /// Invalid records are still offered to the live relay; in-flight
    /// anomalies are worth showing even when they are not worth keeping.
    pub fn is_persistence_valid(&self) -> bool {
        self.job_id != UNKNOWN_JOB_ID
            || self.content_id != UNKNOWN_CONTENT_ID
            || self.content_type != ContentType::Unknown
    }
}
