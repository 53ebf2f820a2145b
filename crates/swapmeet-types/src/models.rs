use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type RoomId = i64;
pub type MessageId = i64;
pub type UserId = i64;
pub type GroupId = i64;

/// Returned by the `FromStr` impls below when a stored or client-supplied
/// name does not match any variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// Generates `as_str`, `Display` and `FromStr` for a fieldless enum whose
/// stored form is the variant name.
macro_rules! string_enum {
    ($ty:ident, $label:literal, { $($variant:ident),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => stringify!($variant),)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($variant) => Ok($ty::$variant),)+
                    _ => Err(UnknownVariant { kind: $label, value: s.to_string() }),
                }
            }
        }
    };
}

// -- Rooms --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomType {
    User2User,
    User2Mod,
    Mod2Mod,
    Group,
}

string_enum!(RoomType, "room type", { User2User, User2Mod, Mod2Mod, Group });

impl RoomType {
    /// Rooms owned by a group rather than by two members.
    pub fn is_group_owned(&self) -> bool {
        matches!(self, RoomType::User2Mod | RoomType::Mod2Mod | RoomType::Group)
    }

    pub const ALL: [RoomType; 4] = [
        RoomType::User2User,
        RoomType::User2Mod,
        RoomType::Mod2Mod,
        RoomType::Group,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub chat_type: RoomType,
    pub user1: Option<UserId>,
    pub user2: Option<UserId>,
    pub group_id: Option<GroupId>,
    pub latest_message_at: DateTime<Utc>,
    pub msg_valid: i64,
    pub msg_invalid: i64,
}

impl Room {
    pub fn is_participant(&self, user: UserId) -> bool {
        self.user1 == Some(user) || self.user2 == Some(user)
    }

    /// The participant that is not `me`, if the room has one.
    pub fn other_participant(&self, me: UserId) -> Option<UserId> {
        if self.user1 == Some(me) {
            self.user2
        } else if self.user2 == Some(me) {
            self.user1
        } else {
            // Observers (moderators) see the member side of the room.
            self.user1.or(self.user2)
        }
    }
}

// -- Roster --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RosterStatus {
    Online,
    Typing,
    Away,
    Blocked,
    Closed,
}

string_enum!(RosterStatus, "roster status", { Online, Typing, Away, Blocked, Closed });

impl RosterStatus {
    /// Statuses that hide a room from the default room list.
    pub fn hides_room(&self) -> bool {
        matches!(self, RosterStatus::Blocked | RosterStatus::Closed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub status: RosterStatus,
    pub last_msg_seen: Option<MessageId>,
    pub last_typing_at: Option<DateTime<Utc>>,
    pub last_ip: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// -- Messages --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Default,
    Interested,
    Promised,
    Reneged,
    Completed,
    Image,
    Address,
    Nudge,
    ReportedUser,
    ModMail,
    System,
}

string_enum!(MessageKind, "message kind", {
    Default,
    Interested,
    Promised,
    Reneged,
    Completed,
    Image,
    Address,
    Nudge,
    ReportedUser,
    ModMail,
    System,
});

/// Review position of a message, derived from its two review flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewState {
    Pending,
    Approved,
    Rejected,
}

impl ReviewState {
    pub fn from_flags(review_required: bool, review_rejected: bool) -> Self {
        match (review_required, review_rejected) {
            (_, true) => ReviewState::Rejected,
            (true, false) => ReviewState::Pending,
            (false, false) => ReviewState::Approved,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub kind: MessageKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub review_required: bool,
    pub review_rejected: bool,
    pub processing_successful: bool,
    pub seen_by_all: bool,
    pub reply_expected: bool,
    pub reply_received: bool,
    pub report_reason: Option<String>,
    pub deleted: bool,
}

impl ChatMessage {
    pub fn review_state(&self) -> ReviewState {
        ReviewState::from_flags(self.review_required, self.review_rejected)
    }

    /// Counted in `msg_valid` and visible to every participant.
    pub fn is_valid(&self) -> bool {
        !self.deleted && !self.review_required && !self.review_rejected && self.processing_successful
    }
}

// -- Read models --

/// Which entity's picture represents a room. Turning this into a URL is the
/// image service's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "image_id", rename_all = "snake_case")]
pub enum IconSource {
    Group(i64),
    User(i64),
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub chat_type: RoomType,
    pub name: String,
    pub unseen: i64,
    pub last_msg: Option<MessageId>,
    pub last_date: Option<DateTime<Utc>>,
    pub snippet: String,
    pub last_kind: Option<MessageKind>,
    pub last_msg_seen: Option<MessageId>,
    pub other_user_id: Option<UserId>,
    pub group_id: Option<GroupId>,
    pub icon: IconSource,
    pub status: Option<RosterStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDetail {
    pub room: Room,
    pub name: String,
    pub unseen: i64,
    pub last_msg_seen: Option<MessageId>,
    pub other_user_id: Option<UserId>,
}

/// Minimal room context attached to every review queue entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRoomContext {
    pub id: RoomId,
    pub chat_type: RoomType,
    pub user1: Option<UserId>,
    pub user2: Option<UserId>,
    pub group_id: Option<GroupId>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: MessageId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub kind: MessageKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub report_reason: Option<String>,
    pub held_by: Option<UserId>,
    pub room: ReviewRoomContext,
}
