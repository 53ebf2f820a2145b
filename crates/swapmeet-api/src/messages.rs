use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use swapmeet_chat::review::clamp_limit;
use swapmeet_types::api::{MessageListResponse, PatchMessageRequest, PostMessageRequest};
use swapmeet_types::models::{MessageId, MessageKind, RoomId};

use crate::error::{ApiResult, blocking, ok};
use crate::extract::{ApiJson, ApiQuery};
use crate::middleware::Caller;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    /// Return messages older than this id.
    pub before: Option<MessageId>,
    #[serde(default)]
    pub limit: i64,
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(room_id): Path<RoomId>,
    ApiQuery(query): ApiQuery<MessageQuery>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let limit = query.limit;
    let messages = blocking(move || chat.messages.list(room_id, caller.id, query.before, limit)).await?;

    let next_before = if messages.len() as u32 == clamp_limit(limit) {
        messages.last().map(|m| m.id)
    } else {
        None
    };
    Ok(ok(MessageListResponse {
        messages,
        next_before,
    }))
}

pub async fn post_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(room_id): Path<RoomId>,
    ApiJson(req): ApiJson<PostMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let kind = req.kind.unwrap_or(MessageKind::Default);
    let message = blocking(move || chat.messages.post(room_id, caller.id, &req.message, kind)).await?;
    Ok((StatusCode::CREATED, ok(message)))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(message_id): Path<MessageId>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    blocking(move || chat.messages.delete(message_id, caller.id)).await?;
    Ok(ok(()))
}

pub async fn patch_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(message_id): Path<MessageId>,
    ApiJson(req): ApiJson<PatchMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let message =
        blocking(move || chat.messages.set_reply_expected(message_id, caller.id, req.reply_expected)).await?;
    Ok(ok(message))
}
