//! Handlers for creating and inspecting short URLs.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use validator::Validate;

use crate::api::dto::click::{ClickListParams, ClickListResponse};
use crate::api::dto::url::{CreateUrlRequest, UrlResponse};
use crate::application::services::url_store::{MIN_CLICK_PAGE, MIN_CLICK_PAGE_SIZE};
use crate::error::AppError;
use crate::state::AppState;

/// Registers a long URL under the requested short code.
///
/// # Endpoint
///
/// `POST /api/urls`
///
/// # Request Body
///
/// ```json
/// {
///   "url": "https://example.com/some/long/path",
///   "code": "promo-2024"
/// }
/// ```
///
/// # Errors
///
/// - 400 Bad Request if validation fails
/// - 409 Conflict if the code is already taken
pub async fn create_url_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateUrlRequest>,
) -> Result<(StatusCode, Json<UrlResponse>), AppError> {
    payload.validate()?;

    let record = state.store.create(&payload.url, &payload.code).await?;

    Ok((StatusCode::CREATED, Json(record.into())))
}

/// Returns a short URL with its click count, without counting a click.
///
/// # Endpoint
///
/// `GET /api/urls/{code}`
///
/// The count may lag behind redirects still waiting in the click queue.
///
/// # Errors
///
/// Returns 404 Not Found if the short code doesn't exist.
pub async fn get_url_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<UrlResponse>, AppError> {
    let record = state.store.resolve(&code).await?;

    Ok(Json(record.into()))
}

/// Lists the clicks recorded for a short code, newest first.
///
/// # Endpoint
///
/// `GET /api/urls/{code}/clicks?page=1&size=20`
///
/// Without paging parameters the first page of five clicks is returned.
///
/// Missing or out-of-range paging values are clamped: `page` to at least 1,
/// `size` to `5..=200`. The response echoes the values actually used.
///
/// # Errors
///
/// - 400 Bad Request if `page` or `size` is not an integer
/// - 404 Not Found if the short code doesn't exist
pub async fn list_clicks_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
    Query(params): Query<ClickListParams>,
) -> Result<Json<ClickListResponse>, AppError> {
    let page = state
        .store
        .list_clicks(
            &code,
            params.page.unwrap_or(i64::from(MIN_CLICK_PAGE)),
            params.size.unwrap_or(i64::from(MIN_CLICK_PAGE_SIZE)),
        )
        .await?;

    Ok(Json(page.into()))
}
