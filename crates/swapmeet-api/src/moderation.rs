use axum::{
    Extension,
    extract::State,
    response::IntoResponse,
};
use serde::Deserialize;

use swapmeet_chat::ModerationAction;
use swapmeet_types::api::{CountResponse, ModerationRequest, ModerationResponse, ReviewQueueResponse};
use swapmeet_types::models::MessageId;

use crate::error::{ApiResult, blocking, ok};
use crate::extract::{ApiJson, ApiQuery};
use crate::middleware::Caller;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReviewQuery {
    pub cursor: Option<MessageId>,
    #[serde(default)]
    pub limit: i64,
}

pub async fn list_pending(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiQuery(query): ApiQuery<ReviewQuery>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let page = blocking(move || chat.review.list_pending(caller.id, query.cursor, query.limit)).await?;
    Ok(ok(ReviewQueueResponse {
        messages: page.items,
        next_cursor: page.next_cursor,
        moderated_groups: page.moderated_groups,
    }))
}

pub async fn pending_count(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let count = blocking(move || chat.review.pending_count(caller.id)).await?;
    Ok(ok(CountResponse { count }))
}

pub async fn moderate(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiJson(req): ApiJson<ModerationRequest>,
) -> ApiResult<impl IntoResponse> {
    let action: ModerationAction = req.action.parse()?;

    let chat = state.chat.clone();
    let outcome = blocking(move || {
        chat.moderation
            .apply(req.id, caller.id, action, req.reason.as_deref())
    })
    .await?;

    Ok(ok(ModerationResponse {
        action: outcome.action.to_string(),
        message_id: outcome.message_id,
        cascaded: outcome.cascaded,
        swept: outcome.swept,
        rooms_recounted: outcome.rooms_recounted,
        changed: outcome.changed,
    }))
}
