use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, params};

use swapmeet_types::models::{ChatMessage, MessageId, RoomId, UserId};

use super::rooms::valid_message;
use super::{MESSAGE_COLUMNS, OptionalExt, message_from_row};
use crate::models::{NewMessage, to_db_time};

pub fn get_message(conn: &Connection, id: MessageId) -> Result<Option<ChatMessage>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM chat_messages m WHERE m.id = ?1");
    conn.query_row(&sql, [id], message_from_row).optional()
}

pub fn insert_message(conn: &Connection, msg: &NewMessage<'_>) -> Result<MessageId> {
    conn.execute(
        "INSERT INTO chat_messages
            (room_id, user_id, kind, message, ref_item_type, created_at, review_required, reply_expected)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            msg.room_id,
            msg.user_id,
            msg.kind.as_str(),
            msg.message,
            msg.ref_item_type,
            to_db_time(msg.created_at),
            msg.review_required,
            msg.reply_expected,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Newest non-deleted message in the room.
pub fn latest_message(conn: &Connection, room: RoomId) -> Result<Option<ChatMessage>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM chat_messages m
         WHERE m.room_id = ?1 AND m.deleted = 0
         ORDER BY m.id DESC
         LIMIT 1"
    );
    conn.query_row(&sql, [room], message_from_row).optional()
}

/// Messages `viewer` may read: their own plus every valid one, newest first.
pub fn list_for_viewer(
    conn: &Connection,
    room: RoomId,
    viewer: UserId,
    before: Option<MessageId>,
    limit: u32,
) -> Result<Vec<ChatMessage>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM chat_messages m
         WHERE m.room_id = ?1 AND m.deleted = 0
           AND (m.user_id = ?2 OR ({}))
           AND m.id < ?3
         ORDER BY m.id DESC
         LIMIT ?4",
        valid_message("m")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![room, viewer, before.unwrap_or(i64::MAX), limit],
            message_from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Whether the room has a Pending message other than `except`.
pub fn has_other_pending(conn: &Connection, room: RoomId, except: Option<MessageId>) -> Result<bool> {
    let found: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM chat_messages
                        WHERE room_id = ?1 AND review_required = 1 AND review_rejected = 0
                          AND deleted = 0 AND id != ?2)",
        params![room, except.unwrap_or(0)],
        |row| row.get(0),
    )?;
    Ok(found)
}

/// Soft delete. The kind is reset so that deleted offers or promises stop
/// driving any kind-specific display.
pub fn soft_delete(conn: &Connection, id: MessageId) -> Result<usize> {
    let n = conn.execute(
        "UPDATE chat_messages SET deleted = 1, kind = 'Default' WHERE id = ?1 AND deleted = 0",
        [id],
    )?;
    Ok(n)
}

pub fn update_text(conn: &Connection, id: MessageId, text: &str) -> Result<usize> {
    let n = conn.execute(
        "UPDATE chat_messages SET message = ?2 WHERE id = ?1",
        params![id, text],
    )?;
    Ok(n)
}

pub fn set_reply_expected(conn: &Connection, id: MessageId, expected: bool) -> Result<usize> {
    let n = conn.execute(
        "UPDATE chat_messages SET reply_expected = ?2 WHERE id = ?1 AND deleted = 0",
        params![id, expected],
    )?;
    Ok(n)
}

/// Pushes `created_at` to `now` for messages in the room newer than
/// `window` that have not gone out in a notification batch yet.
pub fn delay_unmailed(
    conn: &Connection,
    room: RoomId,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<usize> {
    let n = conn.execute(
        "UPDATE chat_messages SET created_at = ?3
         WHERE room_id = ?1 AND mailed_to_all = 0 AND deleted = 0 AND created_at >= ?2",
        params![room, to_db_time(now - window), to_db_time(now)],
    )?;
    Ok(n)
}

/// Marks earlier messages from others as answered once `author` replies.
pub fn mark_replied(conn: &Connection, room: RoomId, author: UserId, upto: MessageId) -> Result<usize> {
    let n = conn.execute(
        "UPDATE chat_messages SET reply_received = 1
         WHERE room_id = ?1 AND user_id != ?2 AND id < ?3
           AND reply_expected = 1 AND reply_received = 0",
        params![room, author, upto],
    )?;
    Ok(n)
}
