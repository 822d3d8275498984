//! DTOs for the click listing endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::services::ClickPage;
use crate::domain::entities::Click;

/// Query parameters of `GET /api/urls/{code}/clicks`.
///
/// Both are optional. Out-of-range values are clamped rather than rejected:
/// `page` to at least 1 and `size` to `5..=200`.
#[derive(Debug, Default, Deserialize)]
pub struct ClickListParams {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub size: Option<i64>,
}

/// One click as returned by the API.
#[derive(Debug, Serialize)]
pub struct ClickResponse {
    pub id: i64,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub clicked_at: DateTime<Utc>,
}

impl From<Click> for ClickResponse {
    fn from(click: Click) -> Self {
        Self {
            id: click.id,
            ip: click.ip,
            user_agent: click.user_agent,
            referer: click.referer,
            clicked_at: click.clicked_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

/// A page of clicks with the effective paging values.
#[derive(Debug, Serialize)]
pub struct ClickListResponse {
    pub items: Vec<ClickResponse>,
    pub pagination: PaginationMeta,
}

impl From<ClickPage> for ClickListResponse {
    fn from(page: ClickPage) -> Self {
        Self {
            items: page.items.into_iter().map(ClickResponse::from).collect(),
            pagination: PaginationMeta {
                page: page.page,
                size: page.size,
                total: page.total,
            },
        }
    }
}
