use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use swapmeet_types::models::{MessageId, RoomId, RosterEntry, RosterStatus, UserId};

use super::rooms::valid_message;
use super::{OptionalExt, ROSTER_COLUMNS, roster_from_row};
use crate::models::to_db_time;

/// Insert or overwrite the status for (room, user). A Closed write never
/// replaces Blocked.
pub fn upsert_presence(
    conn: &Connection,
    room: RoomId,
    user: UserId,
    status: RosterStatus,
    source_address: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO chat_roster (room_id, user_id, status, last_ip, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(room_id, user_id) DO UPDATE SET
            status = CASE
                WHEN chat_roster.status = 'Blocked' AND excluded.status = 'Closed' THEN 'Blocked'
                ELSE excluded.status
            END,
            last_ip = COALESCE(excluded.last_ip, chat_roster.last_ip),
            updated_at = excluded.updated_at",
        params![room, user, status.as_str(), source_address, to_db_time(now)],
    )?;
    Ok(())
}

/// Creates Online entries for users that have none yet.
pub fn seed_roster(conn: &Connection, room: RoomId, users: &[UserId], now: DateTime<Utc>) -> Result<()> {
    let ts = to_db_time(now);
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO chat_roster (room_id, user_id, status, updated_at)
         VALUES (?1, ?2, 'Online', ?3)",
    )?;
    for user in users {
        stmt.execute(params![room, user, ts])?;
    }
    Ok(())
}

/// Moves the read watermark in one conditional write: forward only unless
/// `allow_back`. Returns the watermark now stored.
pub fn advance_watermark(
    conn: &Connection,
    room: RoomId,
    user: UserId,
    message: MessageId,
    allow_back: bool,
    now: DateTime<Utc>,
) -> Result<MessageId> {
    let stored = conn.query_row(
        "INSERT INTO chat_roster (room_id, user_id, status, last_msg_seen, updated_at)
         VALUES (?1, ?2, 'Online', ?3, ?5)
         ON CONFLICT(room_id, user_id) DO UPDATE SET
            last_msg_seen = CASE
                WHEN ?4 OR chat_roster.last_msg_seen IS NULL
                     OR excluded.last_msg_seen > chat_roster.last_msg_seen
                THEN excluded.last_msg_seen
                ELSE chat_roster.last_msg_seen
            END,
            updated_at = excluded.updated_at
         RETURNING last_msg_seen",
        params![room, user, message, allow_back, to_db_time(now)],
        |row| row.get(0),
    )?;
    Ok(stored)
}

/// Sets `seen_by_all` on messages up to `upto` once every other roster
/// member's watermark has reached them. Never clears the flag.
pub fn mark_seen_by_all(conn: &Connection, room: RoomId, upto: MessageId) -> Result<usize> {
    let n = conn.execute(
        "UPDATE chat_messages SET seen_by_all = 1
         WHERE room_id = ?1 AND id <= ?2 AND seen_by_all = 0
           AND NOT EXISTS (
               SELECT 1 FROM chat_roster ro
               WHERE ro.room_id = ?1
                 AND ro.user_id != chat_messages.user_id
                 AND (ro.last_msg_seen IS NULL OR ro.last_msg_seen < chat_messages.id)
           )",
        params![room, upto],
    )?;
    Ok(n)
}

/// Valid messages from others past the user's watermark.
pub fn unseen_count(conn: &Connection, room: RoomId, user: UserId) -> Result<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM chat_messages m
         WHERE m.room_id = ?1 AND m.user_id != ?2 AND {}
           AND m.id > COALESCE(
               (SELECT last_msg_seen FROM chat_roster WHERE room_id = ?1 AND user_id = ?2), 0)",
        valid_message("m")
    );
    let count = conn.query_row(&sql, params![room, user], |row| row.get(0))?;
    Ok(count)
}

pub fn roster_for_room(conn: &Connection, room: RoomId) -> Result<Vec<RosterEntry>> {
    let sql = format!(
        "SELECT {ROSTER_COLUMNS} FROM chat_roster WHERE room_id = ?1 ORDER BY user_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([room], roster_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_entry(conn: &Connection, room: RoomId, user: UserId) -> Result<Option<RosterEntry>> {
    let sql = format!(
        "SELECT {ROSTER_COLUMNS} FROM chat_roster WHERE room_id = ?1 AND user_id = ?2"
    );
    conn.query_row(&sql, params![room, user], roster_from_row)
        .optional()
}

/// Stamps `last_typing_at`, creating the entry if needed. Status is left
/// alone on existing entries.
pub fn touch_typing(conn: &Connection, room: RoomId, user: UserId, now: DateTime<Utc>) -> Result<()> {
    let ts = to_db_time(now);
    conn.execute(
        "INSERT INTO chat_roster (room_id, user_id, status, last_typing_at, updated_at)
         VALUES (?1, ?2, 'Typing', ?3, ?3)
         ON CONFLICT(room_id, user_id) DO UPDATE SET
            last_typing_at = excluded.last_typing_at,
            updated_at = excluded.updated_at",
        params![room, user, ts],
    )?;
    Ok(())
}
