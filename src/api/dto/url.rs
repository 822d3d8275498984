//! DTOs for short URL endpoints.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use validator::Validate;

use crate::domain::entities::UrlRecord;

/// Letters, digits, `-` and `_`.
static SHORT_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Request to register a long URL under a chosen short code.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUrlRequest {
    /// The original URL (must be a valid absolute URL).
    #[validate(url(message = "Invalid URL format"), length(max = 2048))]
    pub url: String,

    #[validate(
        length(min = 3, max = 32, message = "Code must be 3 to 32 characters"),
        regex(path = "*SHORT_CODE_REGEX", message = "Code may contain letters, digits, '-' and '_'")
    )]
    pub code: String,
}

/// A stored short URL as returned by the API.
#[derive(Debug, Serialize)]
pub struct UrlResponse {
    pub id: i64,
    pub code: String,
    pub long_url: String,
    pub click_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UrlRecord> for UrlResponse {
    fn from(record: UrlRecord) -> Self {
        Self {
            id: record.id,
            code: record.short_code,
            long_url: record.long_url,
            click_count: record.click_count,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
