use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use swapmeet_chat::RoomFilters;
use swapmeet_types::api::{CountResponse, OpenRoomRequest, OpenRoomResponse, RoomListResponse};
use swapmeet_types::models::{RoomId, RoomType};

use crate::error::{ApiError, ApiResult, blocking, ok};
use crate::extract::{ApiJson, ApiQuery};
use crate::middleware::Caller;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RoomListQuery {
    /// Comma-separated room types, e.g. `User2User,User2Mod`.
    pub types: Option<String>,
    pub search: Option<String>,
    /// Activity window in days.
    pub age: Option<i64>,
    #[serde(default)]
    pub include_closed: bool,
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: i64,
}

fn parse_types(raw: &str) -> ApiResult<Vec<RoomType>> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<RoomType>().map_err(|e| ApiError::invalid(e.to_string())))
        .collect()
}

/// Token that fires if the client goes away before the reads finish.
fn request_token() -> (CancellationToken, tokio_util::sync::DropGuard) {
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    (token, guard)
}

pub async fn list_rooms(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiQuery(query): ApiQuery<RoomListQuery>,
) -> ApiResult<impl IntoResponse> {
    let filters = RoomFilters {
        types: query.types.as_deref().map(parse_types).transpose()?,
        search: query.search,
        active_days: query.age.filter(|d| *d > 0),
        include_closed: query.include_closed,
        cursor: query.cursor,
        limit: query.limit,
    };

    let (cancel, _guard) = request_token();
    let page = state.chat.aggregation.list_rooms(caller.id, filters, &cancel).await?;
    Ok(ok(RoomListResponse {
        rooms: page.rooms,
        next_cursor: page.next_cursor,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct UnseenQuery {
    /// Comma-separated room types. All types when absent.
    pub types: Option<String>,
}

pub async fn unseen_total(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiQuery(query): ApiQuery<UnseenQuery>,
) -> ApiResult<impl IntoResponse> {
    let types = query.types.as_deref().map(parse_types).transpose()?;
    let (cancel, _guard) = request_token();
    let count = state.chat.aggregation.unseen_total(caller.id, types, &cancel).await?;
    Ok(ok(CountResponse { count }))
}

pub async fn get_room(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(room_id): Path<RoomId>,
) -> ApiResult<impl IntoResponse> {
    let (cancel, _guard) = request_token();
    let detail = state.chat.aggregation.room_detail(caller.id, room_id, &cancel).await?;
    Ok(ok(detail))
}

pub async fn open_room(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    ApiJson(req): ApiJson<OpenRoomRequest>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let (room, created) = blocking(move || chat.open_direct_room(caller.id, req.user_id)).await?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, ok(OpenRoomResponse { id: room.id, created })))
}
