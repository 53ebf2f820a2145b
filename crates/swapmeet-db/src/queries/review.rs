use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};

use swapmeet_types::models::{GroupId, MessageId, Room, RoomId, UserId};

use super::ROOM_COLUMNS;
use crate::models::{PendingRow, enum_col, time_col, to_db_time};

/// Pending and not held by anyone other than `actor`.
const PENDING_UNHELD: &str = "id = ?1 AND review_required = 1 AND review_rejected = 0 AND deleted = 0
     AND NOT EXISTS (SELECT 1 FROM message_holds h WHERE h.message_id = ?1 AND h.held_by != ?2)";

/// Pending → Approved in a single guarded write. Zero rows means the message
/// was not Pending or someone else holds it.
pub fn approve_if_unheld(conn: &Connection, id: MessageId, actor: UserId) -> Result<usize> {
    let sql = format!(
        "UPDATE chat_messages SET review_required = 0, reviewed_by = ?2 WHERE {PENDING_UNHELD}"
    );
    Ok(conn.execute(&sql, params![id, actor])?)
}

/// Pending → Rejected under the same guard as approval.
pub fn reject_if_unheld(
    conn: &Connection,
    id: MessageId,
    actor: UserId,
    reason: Option<&str>,
) -> Result<usize> {
    let sql = format!(
        "UPDATE chat_messages
         SET review_required = 0, review_rejected = 1, reviewed_by = ?2,
             report_reason = COALESCE(?3, report_reason)
         WHERE {PENDING_UNHELD}"
    );
    Ok(conn.execute(&sql, params![id, actor, reason])?)
}

/// Approves ModMail that was queued behind `after` in the same room.
pub fn approve_modmail_after(
    conn: &Connection,
    room: RoomId,
    after: MessageId,
    actor: UserId,
) -> Result<Vec<MessageId>> {
    let mut stmt = conn.prepare(
        "UPDATE chat_messages SET review_required = 0, reviewed_by = ?3
         WHERE room_id = ?1 AND id > ?2 AND kind = 'ModMail'
           AND review_required = 1 AND review_rejected = 0 AND deleted = 0
         RETURNING id",
    )?;
    let ids = stmt
        .query_map(params![room, after, actor], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Rejects every other Pending message with exactly `text` created at or
/// after `since`, in any room. Returns the (message, room) pairs swept.
pub fn reject_flood_copies(
    conn: &Connection,
    text: &str,
    since: DateTime<Utc>,
    except: MessageId,
    actor: UserId,
) -> Result<Vec<(MessageId, RoomId)>> {
    let mut stmt = conn.prepare(
        "UPDATE chat_messages SET review_required = 0, review_rejected = 1, reviewed_by = ?4
         WHERE message = ?1 AND created_at >= ?2 AND id != ?3
           AND review_required = 1 AND review_rejected = 0 AND deleted = 0
         RETURNING id, room_id",
    )?;
    let mut swept = stmt
        .query_map(params![text, to_db_time(since), except, actor], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<std::result::Result<Vec<(MessageId, RoomId)>, _>>()?;
    swept.sort_unstable();
    Ok(swept)
}

/// Shared WHERE clause for the review queue. Expects the moderated group
/// ids to be bound first.
fn pending_scope(groups: usize) -> String {
    let marks = vec!["?"; groups].join(", ");
    format!(
        "m.review_required = 1 AND m.review_rejected = 0 AND m.deleted = 0
         AND u.deleted_at IS NULL
         AND (
             (r.chat_type IN ('User2Mod', 'Mod2Mod', 'Group') AND r.group_id IN ({marks}))
             OR (r.chat_type = 'User2User' AND EXISTS (
                 SELECT 1 FROM memberships ms
                 WHERE ms.user_id IN (r.user1, r.user2) AND ms.group_id IN ({marks})))
         )"
    )
}

/// Oldest-first page of the review queue for the given moderated groups.
pub fn list_pending(
    conn: &Connection,
    groups: &[GroupId],
    after: MessageId,
    limit: u32,
) -> Result<Vec<(PendingRow, Room)>> {
    if groups.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "SELECT m.id, m.room_id, m.user_id, m.kind, m.message, m.created_at, m.report_reason,
                h.held_by, {ROOM_COLUMNS}
         FROM chat_messages m
         JOIN users u ON u.id = m.user_id
         JOIN chat_rooms r ON r.id = m.room_id
         LEFT JOIN message_holds h ON h.message_id = m.id
         WHERE {} AND m.id > ?
         ORDER BY m.id ASC
         LIMIT ?",
        pending_scope(groups.len())
    );

    let mut values: Vec<Value> = Vec::with_capacity(groups.len() * 2 + 2);
    for _ in 0..2 {
        values.extend(groups.iter().map(|g| Value::Integer(*g)));
    }
    values.push(Value::Integer(after));
    values.push(Value::Integer(i64::from(limit)));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            let pending = PendingRow {
                id: row.get(0)?,
                room_id: row.get(1)?,
                user_id: row.get(2)?,
                kind: enum_col(row, 3)?,
                message: row.get(4)?,
                created_at: time_col(row, 5)?,
                report_reason: row.get(6)?,
                held_by: row.get(7)?,
            };
            let room = Room {
                id: row.get(8)?,
                chat_type: enum_col(row, 9)?,
                user1: row.get(10)?,
                user2: row.get(11)?,
                group_id: row.get(12)?,
                latest_message_at: time_col(row, 13)?,
                msg_valid: row.get(14)?,
                msg_invalid: row.get(15)?,
            };
            Ok((pending, room))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn pending_count(conn: &Connection, groups: &[GroupId]) -> Result<i64> {
    if groups.is_empty() {
        return Ok(0);
    }

    let sql = format!(
        "SELECT COUNT(*)
         FROM chat_messages m
         JOIN users u ON u.id = m.user_id
         JOIN chat_rooms r ON r.id = m.room_id
         WHERE {}",
        pending_scope(groups.len())
    );
    let values: Vec<Value> = groups
        .iter()
        .chain(groups.iter())
        .map(|g| Value::Integer(*g))
        .collect();
    let count = conn.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
    Ok(count)
}
