#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use swapmeet_chat::{ChatService, EventBus};
use swapmeet_db::Database;
use swapmeet_db::models::NewMessage;
use swapmeet_db::queries::{messages, rooms};
use swapmeet_types::models::{ChatMessage, GroupId, MessageId, MessageKind, Room, RoomId, RoomType, UserId};

pub const ANN: UserId = 1;
pub const BOB: UserId = 2;
pub const CAT: UserId = 3;
pub const DAN: UserId = 4;
pub const MOD_A: UserId = 10;
pub const MOD_B: UserId = 11;
pub const OUTSIDER_MOD: UserId = 12;

pub const NORTH: GroupId = 100;
pub const SOUTH: GroupId = 200;

pub struct Fixture {
    pub db: Arc<Database>,
    pub chat: ChatService,
}

/// Ann, Bob, Cat and Dan are members of North; Mod A and Mod B moderate it.
/// The outsider moderates South only.
pub fn fixture() -> Fixture {
    let db = Arc::new(Database::open_in_memory().unwrap());

    for (id, name) in [
        (ANN, "Ann Example"),
        (BOB, "Bob Example-g100"),
        (CAT, "Cat Example"),
        (DAN, "Dan Example"),
        (MOD_A, "Mod A"),
        (MOD_B, "Mod B"),
        (OUTSIDER_MOD, "Outsider"),
    ] {
        db.create_user(id, name).unwrap();
    }
    db.create_group(NORTH, "north", Some("North Freegle"), Some(55)).unwrap();
    db.create_group(SOUTH, "south", Some("South Freegle"), None).unwrap();

    for member in [ANN, BOB, CAT, DAN] {
        db.add_membership(member, NORTH, "Member").unwrap();
    }
    db.add_membership(MOD_A, NORTH, "Moderator").unwrap();
    db.add_membership(MOD_B, NORTH, "Owner").unwrap();
    db.add_membership(OUTSIDER_MOD, SOUTH, "Moderator").unwrap();

    let chat = ChatService::with_database(db.clone(), EventBus::default(), Duration::from_secs(5));
    Fixture { db, chat }
}

impl Fixture {
    pub fn direct_room(&self, a: UserId, b: UserId) -> Room {
        self.chat.rooms.resolve_or_create_direct_room(a, b).unwrap().0
    }

    pub fn group_room(&self, chat_type: RoomType, user1: Option<UserId>, group: GroupId) -> Room {
        let id = self
            .db
            .with_conn_mut(|conn| rooms::insert_room(conn, chat_type, user1, None, Some(group), Utc::now()))
            .unwrap();
        self.chat.rooms.get(id).unwrap()
    }

    /// Inserts a message directly, bypassing the posting rules.
    pub fn insert(
        &self,
        room: RoomId,
        author: UserId,
        text: &str,
        kind: MessageKind,
        pending: bool,
        created_at: DateTime<Utc>,
    ) -> MessageId {
        self.db
            .with_conn_mut(|conn| {
                let id = messages::insert_message(
                    conn,
                    &NewMessage {
                        room_id: room,
                        user_id: author,
                        kind,
                        message: text,
                        ref_item_type: None,
                        created_at,
                        review_required: pending,
                        reply_expected: false,
                    },
                )?;
                rooms::recount_messages(conn, room, Utc::now())?;
                Ok(id)
            })
            .unwrap()
    }

    pub fn pending(&self, room: RoomId, author: UserId, text: &str) -> MessageId {
        self.insert(room, author, text, MessageKind::Default, true, Utc::now())
    }

    pub fn approved(&self, room: RoomId, author: UserId, text: &str) -> MessageId {
        self.insert(room, author, text, MessageKind::Default, false, Utc::now())
    }

    pub fn message(&self, id: MessageId) -> ChatMessage {
        self.db
            .with_conn(|conn| messages::get_message(conn, id))
            .unwrap()
            .unwrap()
    }

    pub fn room(&self, id: RoomId) -> Room {
        self.chat.rooms.get(id).unwrap()
    }

    /// Non-deleted messages in the room, by direct count.
    pub fn live_messages(&self, room: RoomId) -> i64 {
        self.db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM chat_messages WHERE room_id = ?1 AND deleted = 0",
                    [room],
                    |r| r.get(0),
                )?)
            })
            .unwrap()
    }
}
