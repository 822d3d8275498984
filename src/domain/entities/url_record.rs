//! URL record entity: a short code mapped to its target URL.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A shortened URL as stored by the repository.
///
/// `click_count` reflects the repository state at the time the record was
/// read. Cached copies are dropped after every applied click rather than
/// updated, so a cached record may lag behind by the clicks in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlRecord {
    pub id: i64,
    pub short_code: String,
    pub long_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub click_count: i64,
}

impl UrlRecord {
    /// Creates a record that has not been clicked yet.
    pub fn new(
        id: i64,
        short_code: impl Into<String>,
        long_url: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            short_code: short_code.into(),
            long_url: long_url.into(),
            created_at,
            updated_at: created_at,
            click_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_record_creation() {
        let now = Utc::now();
        let record = UrlRecord::new(1, "abc123", "https://example.com", now);

        assert_eq!(record.id, 1);
        assert_eq!(record.short_code, "abc123");
        assert_eq!(record.long_url, "https://example.com");
        assert_eq!(record.created_at, now);
        assert_eq!(record.updated_at, now);
        assert_eq!(record.click_count, 0);
    }

    #[test]
    fn test_url_record_serializes_click_count() {
        let record = UrlRecord::new(7, "xyz", "https://rust-lang.org", Utc::now());
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["short_code"], "xyz");
        assert_eq!(json["click_count"], 0);
    }
}
