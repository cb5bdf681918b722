//! Metric names and recording helpers for the Firestore client.

use metrics::{counter, histogram};

pub const REQUESTS_TOTAL: &str = "jboard_firestore_requests_total";
pub const REQUEST_DURATION_MS: &str = "jboard_firestore_request_duration_ms";
pub const RETRIES_TOTAL: &str = "jboard_firestore_retries_total";
pub const DOCUMENTS_RETURNED_TOTAL: &str = "jboard_firestore_documents_returned_total";

/// Record one REST request with its resolved HTTP status and latency.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
    histogram!(REQUEST_DURATION_MS, "operation" => operation.to_string()).record(latency_ms);
}

/// Record a retry attempt scheduled by the backoff loop.
pub fn record_retry(operation: &str) {
    counter!(RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}

/// Record how many documents a list or query operation returned.
pub fn record_documents_returned(collection: &str, count: u64) {
    counter!(DOCUMENTS_RETURNED_TOTAL, "collection" => collection.to_string()).increment(count);
}
