//! Query functions. Everything here takes a borrowed `Connection` so callers
//! can compose several of them inside one `Database::with_tx` boundary.

pub mod directory;
pub mod holds;
pub mod messages;
pub mod review;
pub mod rooms;
pub mod roster;
pub mod summary;

use anyhow::Result;
use rusqlite::Row;

use swapmeet_types::models::{ChatMessage, Room, RosterEntry};

use crate::models::{enum_col, opt_time_col, time_col};

pub(crate) const ROOM_COLUMNS: &str =
    "r.id, r.chat_type, r.user1, r.user2, r.group_id, r.latest_message_at, r.msg_valid, r.msg_invalid";

pub(crate) fn room_from_row(row: &Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: row.get(0)?,
        chat_type: enum_col(row, 1)?,
        user1: row.get(2)?,
        user2: row.get(3)?,
        group_id: row.get(4)?,
        latest_message_at: time_col(row, 5)?,
        msg_valid: row.get(6)?,
        msg_invalid: row.get(7)?,
    })
}

pub(crate) const MESSAGE_COLUMNS: &str = "m.id, m.room_id, m.user_id, m.kind, m.message, m.created_at, \
     m.review_required, m.review_rejected, m.processing_successful, m.seen_by_all, \
     m.reply_expected, m.reply_received, m.report_reason, m.deleted";

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: row.get(0)?,
        room_id: row.get(1)?,
        user_id: row.get(2)?,
        kind: enum_col(row, 3)?,
        message: row.get(4)?,
        created_at: time_col(row, 5)?,
        review_required: row.get(6)?,
        review_rejected: row.get(7)?,
        processing_successful: row.get(8)?,
        seen_by_all: row.get(9)?,
        reply_expected: row.get(10)?,
        reply_received: row.get(11)?,
        report_reason: row.get(12)?,
        deleted: row.get(13)?,
    })
}

pub(crate) const ROSTER_COLUMNS: &str =
    "room_id, user_id, status, last_msg_seen, last_typing_at, last_ip, updated_at";

pub(crate) fn roster_from_row(row: &Row<'_>) -> rusqlite::Result<RosterEntry> {
    Ok(RosterEntry {
        room_id: row.get(0)?,
        user_id: row.get(1)?,
        status: enum_col(row, 2)?,
        last_msg_seen: row.get(3)?,
        last_typing_at: opt_time_col(row, 4)?,
        last_ip: row.get(5)?,
        updated_at: time_col(row, 6)?,
    })
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
