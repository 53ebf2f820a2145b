//! Batched reads behind the room list. Each function covers a whole page of
//! rooms in one statement and touches a different table.

use std::collections::HashMap;

use anyhow::Result;
use rusqlite::Connection;
use rusqlite::types::Value;
use rusqlite::params_from_iter;

use swapmeet_types::models::{MessageId, RoomId, UserId};

use super::rooms::valid_message;
use crate::models::{LastMessageRow, enum_col, placeholders, time_col};

fn with_user(user: UserId, rooms: &[RoomId]) -> Vec<Value> {
    std::iter::once(Value::Integer(user))
        .chain(rooms.iter().map(|r| Value::Integer(*r)))
        .collect()
}

/// Unseen valid messages per room for `user`. Rooms with none are absent.
pub fn unseen_counts(conn: &Connection, user: UserId, rooms: &[RoomId]) -> Result<HashMap<RoomId, i64>> {
    if rooms.is_empty() {
        return Ok(HashMap::new());
    }
    let sql = format!(
        "SELECT m.room_id, COUNT(*)
         FROM chat_messages m
         LEFT JOIN chat_roster ro ON ro.room_id = m.room_id AND ro.user_id = ?1
         WHERE m.room_id IN ({}) AND m.user_id != ?1 AND {}
           AND m.id > COALESCE(ro.last_msg_seen, 0)
         GROUP BY m.room_id",
        placeholders(2, rooms.len()),
        valid_message("m")
    );
    let mut stmt = conn.prepare(&sql)?;
    let counts = stmt
        .query_map(params_from_iter(with_user(user, rooms).iter()), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;
    Ok(counts)
}

/// Newest message per room that `user` can read: their own, or valid.
pub fn last_messages(
    conn: &Connection,
    user: UserId,
    rooms: &[RoomId],
) -> Result<HashMap<RoomId, LastMessageRow>> {
    if rooms.is_empty() {
        return Ok(HashMap::new());
    }
    let sql = format!(
        "SELECT m.room_id, m.id, m.created_at, m.message, m.kind, m.ref_item_type
         FROM chat_messages m
         WHERE m.id IN (
             SELECT MAX(id) FROM chat_messages
             WHERE room_id IN ({}) AND deleted = 0
               AND (user_id = ?1 OR ({}))
             GROUP BY room_id
         )",
        placeholders(2, rooms.len()),
        valid_message("")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(with_user(user, rooms).iter()), |row| {
            Ok(LastMessageRow {
                room_id: row.get(0)?,
                id: row.get(1)?,
                created_at: time_col(row, 2)?,
                message: row.get(3)?,
                kind: enum_col(row, 4)?,
                ref_item_type: row.get(5)?,
            })
        })?
        .map(|r| r.map(|row| (row.room_id, row)))
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

/// The caller's read watermark per room, where one is set.
pub fn last_seen(conn: &Connection, user: UserId, rooms: &[RoomId]) -> Result<HashMap<RoomId, MessageId>> {
    if rooms.is_empty() {
        return Ok(HashMap::new());
    }
    let sql = format!(
        "SELECT room_id, last_msg_seen FROM chat_roster
         WHERE user_id = ?1 AND room_id IN ({}) AND last_msg_seen IS NOT NULL",
        placeholders(2, rooms.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let seen = stmt
        .query_map(params_from_iter(with_user(user, rooms).iter()), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;
    Ok(seen)
}
