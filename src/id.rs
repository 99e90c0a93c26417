//! ID generation utilities for Refinr
//!
//! Provides functions for generating unique identifiers for runs, iterations,
//! and persisted documents.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate a unique run ID
///
/// Format: `{timestamp_ms}-{random_hex}`
/// Example: `1738300800123-a1b2`
pub fn generate_run_id() -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("{}-{:04x}", timestamp, random)
}

/// Generate the ledger ID of an iteration within a run
///
/// Format: `{run_id}-iter-{index:03}`
/// Example: For run "1738300800123-a1b2" and index 2: "1738300800123-a1b2-iter-002"
pub fn generate_iteration_id(run_id: &str, index: u32) -> String {
    format!("{}-iter-{:03}", run_id, index)
}

/// Generate a document ID for a persisted artifact
///
/// Format: `doc-{timestamp_ms}-{random_hex}`
pub fn generate_document_id() -> String {
    let timestamp = now_ms();
    let random: u32 = rand::rng().random();
    format!("doc-{}-{:08x}", timestamp, random)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_returns_reasonable_timestamp() {
        let ts = now_ms();
        // Should be after 2020-01-01 and before 2100-01-01
        assert!(ts > 1577836800000);
        assert!(ts < 4102444800000);
    }

    #[test]
    fn test_generate_run_id_format() {
        let id = generate_run_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[1].len(), 4);
        assert!(parts[1].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_run_id_uniqueness() {
        let id1 = generate_run_id();
        let id2 = generate_run_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_generate_iteration_id_format() {
        let id = generate_iteration_id("1738300800123-a1b2", 2);
        assert_eq!(id, "1738300800123-a1b2-iter-002");
    }

    #[test]
    fn test_generate_iteration_id_padding() {
        assert!(generate_iteration_id("run", 1).ends_with("-iter-001"));
        assert!(generate_iteration_id("run", 120).ends_with("-iter-120"));
    }

    #[test]
    fn test_generate_document_id_format() {
        let id = generate_document_id();
        assert!(id.starts_with("doc-"));
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 8);
    }
}
