//! Click entities: the request metadata captured on a redirect and the
//! stored click row.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Client metadata captured when a short code is followed.
///
/// Built by the redirect handler and carried inside the click task, so the
/// HTTP response never waits for it to be written. Every field is optional
/// to tolerate missing headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickEvent {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

impl ClickEvent {
    pub fn new(ip: Option<String>, user_agent: Option<&str>, referer: Option<&str>) -> Self {
        Self {
            ip,
            user_agent: user_agent.map(|s| s.to_string()),
            referer: referer.map(|s| s.to_string()),
        }
    }
}

/// A recorded click, as returned by the click listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Click {
    pub id: i64,
    pub url_id: i64,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub clicked_at: DateTime<Utc>,
}
