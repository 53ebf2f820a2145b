pub mod error;
pub mod extract;
pub mod messages;
pub mod middleware;
pub mod moderation;
pub mod rooms;
pub mod roster;
pub mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};

use crate::middleware::require_auth;
use crate::state::AppState;

/// Every chat route, behind bearer authentication.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat/rooms", get(rooms::list_rooms).put(rooms::open_room))
        .route("/chat/rooms/unseen", get(rooms::unseen_total))
        .route("/chat/rooms/{room_id}", get(rooms::get_room))
        .route("/chat/rooms/{room_id}/presence", post(roster::update_presence))
        .route("/chat/rooms/{room_id}/nudge", post(roster::nudge))
        .route("/chat/rooms/{room_id}/typing", post(roster::typing))
        .route(
            "/chat/rooms/{room_id}/messages",
            get(messages::list_messages).post(messages::post_message),
        )
        .route(
            "/chat/messages/{message_id}",
            delete(messages::delete_message).patch(messages::patch_message),
        )
        .route("/chat/review", get(moderation::list_pending).post(moderation::moderate))
        .route("/chat/review/count", get(moderation::pending_count))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
}
