use serde::{Deserialize, Serialize};

use crate::models::{
    ChatMessage, GroupId, MessageId, MessageKind, ReviewItem, RoomId, RoomSummary, RosterEntry,
    RosterStatus, UserId,
};

// -- JWT Claims --

/// Caller identity carried by bearer tokens. Tokens are issued by the
/// session service; this backend only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub exp: usize,
}

// -- Envelope --

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub ok: bool,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self { ok: true, data }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: ErrorBody,
}

// -- Rooms --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenRoomRequest {
    pub user_id: UserId,
}

#[derive(Debug, Serialize)]
pub struct OpenRoomResponse {
    pub id: RoomId,
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomSummary>,
    pub next_cursor: Option<String>,
}

// -- Roster --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePresenceRequest {
    pub status: Option<RosterStatus>,
    pub last_msg_seen: Option<MessageId>,
    #[serde(default)]
    pub allow_back: bool,
}

#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub roster: Vec<RosterEntry>,
    pub unseen: i64,
}

#[derive(Debug, Serialize)]
pub struct NudgeResponse {
    pub id: MessageId,
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct TypingResponse {
    pub count: u64,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostMessageRequest {
    pub message: String,
    pub kind: Option<MessageKind>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchMessageRequest {
    pub reply_expected: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<ChatMessage>,
    pub next_before: Option<MessageId>,
}

// -- Moderation --

/// `action` is kept as a string here so that unknown names surface as an
/// InvalidArgument error rather than a body-parsing rejection.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModerationRequest {
    pub id: MessageId,
    pub action: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ModerationResponse {
    pub action: String,
    pub message_id: MessageId,
    pub cascaded: Vec<MessageId>,
    pub swept: Vec<MessageId>,
    pub rooms_recounted: Vec<RoomId>,
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct ReviewQueueResponse {
    pub messages: Vec<ReviewItem>,
    pub next_cursor: Option<MessageId>,
    pub moderated_groups: Vec<GroupId>,
}

// -- Dashboard counts --

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}
