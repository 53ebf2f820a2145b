use serde::{Deserialize, Serialize};

use crate::models::{MessageId, RoomId, UserId};

/// Events published by the chat core for analytics and notification consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChatEvent {
    /// A member opened (or reopened) a direct room
    DirectRoomOpened {
        room_id: RoomId,
        user_id: UserId,
        other_user_id: UserId,
        created: bool,
    },

    /// A member prodded the other side of a room
    Nudged {
        room_id: RoomId,
        message_id: MessageId,
        from_user: UserId,
        to_user: Option<UserId>,
    },

    /// A moderator claimed a message for review
    MessageHeld {
        message_id: MessageId,
        moderator_id: UserId,
    },

    /// A moderator dropped a claim
    MessageReleased {
        message_id: MessageId,
        moderator_id: UserId,
    },

    /// A pending message was let through
    MessageApproved {
        message_id: MessageId,
        room_id: RoomId,
        moderator_id: UserId,
        all_future: bool,
    },

    /// A pending message was refused, along with any identical flood copies
    MessageRejected {
        message_id: MessageId,
        room_id: RoomId,
        moderator_id: UserId,
        swept: Vec<MessageId>,
    },

    /// Contact details were scrubbed from a message body
    MessageRedacted {
        message_id: MessageId,
        moderator_id: UserId,
    },
}

impl ChatEvent {
    /// Returns the room the event concerns, when it is room-scoped.
    pub fn room_id(&self) -> Option<RoomId> {
        match self {
            Self::DirectRoomOpened { room_id, .. } => Some(*room_id),
            Self::Nudged { room_id, .. } => Some(*room_id),
            Self::MessageApproved { room_id, .. } => Some(*room_id),
            Self::MessageRejected { room_id, .. } => Some(*room_id),
            // Hold, release and redact are keyed by message only
            _ => None,
        }
    }
}
