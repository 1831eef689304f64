use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Default number of notifications returned.
const DEFAULT_EVENT_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct EventParams {
    pub limit: Option<usize>,
    /// Return notifications after this sequence number, oldest first.
    pub after: Option<u64>,
}

/// GET /api/v1/events
///
/// Without `after`, returns the newest notifications first.
pub async fn list_events(
    _user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<EventParams>,
) -> AppResult<impl IntoResponse> {
    let notifications = match params.after {
        Some(after) => state.recorder.since(after).await,
        None => {
            state
                .recorder
                .recent(params.limit.unwrap_or(DEFAULT_EVENT_LIMIT))
                .await
        }
    };
    Ok(Json(DataResponse {
        data: notifications,
    }))
}
