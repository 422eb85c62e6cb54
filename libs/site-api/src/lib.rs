pub mod price;

use serde::{Deserialize, Serialize};

pub use price::{PricePoint, PriceRange};

/// A single durable event as it is stored and broadcast.
///
/// Records are free-form JSON documents; the log and the hub never look inside.
pub type Record = serde_json::Value;

/// Maximum size of a submitted text entry, in bytes.
pub const MAX_SUBMISSION_BYTES: usize = 1024;

// ═══════════════════════════════════════════════════════════════
//  Time helpers
// ═══════════════════════════════════════════════════════════════

/// Current wall-clock time in unix milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Current UTC time formatted for persisted records.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

// ═══════════════════════════════════════════════════════════════
//  Persisted documents
// ═══════════════════════════════════════════════════════════════

/// A text "video" entry submitted by a visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSubmission {
    pub timestamp: String,
    pub text: String,
}

impl VideoSubmission {
    /// Stamp `text` with the current time.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp_now(),
            text: text.into(),
        }
    }
}

/// An RSVP registration. Persisted only, never broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rsvp {
    pub timestamp: String,
    pub ip: String,
    pub email: String,
    #[serde(rename = "paymentIntent")]
    pub payment_intent: String,
}
