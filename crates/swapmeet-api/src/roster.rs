use axum::{
    Extension,
    extract::{Path, State},
    response::IntoResponse,
};

use swapmeet_chat::Watermark;
use swapmeet_types::api::{NudgeResponse, PresenceResponse, TypingResponse, UpdatePresenceRequest};
use swapmeet_types::models::RoomId;

use crate::error::{ApiResult, blocking, ok};
use crate::extract::ApiJson;
use crate::middleware::Caller;
use crate::state::AppState;

pub async fn update_presence(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(room_id): Path<RoomId>,
    ApiJson(req): ApiJson<UpdatePresenceRequest>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let watermark = req.last_msg_seen.map(|message| Watermark {
        message,
        allow_back: req.allow_back,
    });

    let update = blocking(move || {
        chat.roster.update_presence(
            room_id,
            caller.id,
            req.status,
            watermark,
            caller.address.as_deref(),
        )
    })
    .await?;

    Ok(ok(PresenceResponse {
        roster: update.roster,
        unseen: update.unseen,
    }))
}

pub async fn nudge(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(room_id): Path<RoomId>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let outcome = blocking(move || chat.engagement.nudge(room_id, caller.id)).await?;
    Ok(ok(NudgeResponse {
        id: outcome.id,
        created: outcome.created,
    }))
}

pub async fn typing(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(room_id): Path<RoomId>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let count = blocking(move || chat.engagement.typing(room_id, caller.id)).await?;
    Ok(ok(TypingResponse { count }))
}
