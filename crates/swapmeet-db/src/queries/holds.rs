use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use swapmeet_types::models::{MessageId, UserId};

use super::OptionalExt;
use crate::models::to_db_time;

/// Result of trying to claim a message for review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldClaim {
    Acquired,
    AlreadyHeld,
    HeldByOther(UserId),
}

/// Claims the message for `actor` unless someone already holds it. A claim
/// the actor already owns is left untouched.
pub fn acquire(conn: &Connection, message: MessageId, actor: UserId, now: DateTime<Utc>) -> Result<HoldClaim> {
    let written = conn.execute(
        "INSERT INTO message_holds (message_id, held_by, held_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(message_id) DO NOTHING",
        params![message, actor, to_db_time(now)],
    )?;
    if written > 0 {
        return Ok(HoldClaim::Acquired);
    }

    match holder(conn, message)? {
        Some(owner) if owner == actor => Ok(HoldClaim::AlreadyHeld),
        Some(owner) => Ok(HoldClaim::HeldByOther(owner)),
        None => bail!("hold on message {} conflicted but has no owner", message),
    }
}

pub fn release(conn: &Connection, message: MessageId) -> Result<usize> {
    Ok(conn.execute("DELETE FROM message_holds WHERE message_id = ?1", [message])?)
}

pub fn release_many(conn: &Connection, messages: &[MessageId]) -> Result<usize> {
    let mut stmt = conn.prepare("DELETE FROM message_holds WHERE message_id = ?1")?;
    let mut n = 0;
    for id in messages {
        n += stmt.execute([id])?;
    }
    Ok(n)
}

pub fn holder(conn: &Connection, message: MessageId) -> Result<Option<UserId>> {
    conn.query_row(
        "SELECT held_by FROM message_holds WHERE message_id = ?1",
        [message],
        |row| row.get(0),
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::models::NewMessage;
    use crate::queries::{messages, rooms};
    use swapmeet_types::models::{MessageKind, RoomType};

    #[test]
    fn second_moderator_cannot_take_hold() {
        let db = Database::open_in_memory().unwrap();
        for id in 1..=3 {
            db.create_user(id, "x").unwrap();
        }
        db.with_conn_mut(|conn| {
            let now = Utc::now();
            let room = rooms::insert_room(conn, RoomType::User2User, Some(1), Some(2), None, now)?;
            let id = messages::insert_message(
                conn,
                &NewMessage {
                    room_id: room,
                    user_id: 1,
                    kind: MessageKind::Default,
                    message: "hi",
                    ref_item_type: None,
                    created_at: now,
                    review_required: true,
                    reply_expected: false,
                },
            )?;

            assert_eq!(acquire(conn, id, 2, now)?, HoldClaim::Acquired);
            assert_eq!(acquire(conn, id, 2, now)?, HoldClaim::AlreadyHeld);
            assert_eq!(acquire(conn, id, 3, now)?, HoldClaim::HeldByOther(2));
            assert_eq!(holder(conn, id)?, Some(2));

            assert_eq!(release(conn, id)?, 1);
            assert_eq!(acquire(conn, id, 3, now)?, HoldClaim::Acquired);
            assert_eq!(holder(conn, id)?, Some(3));
            Ok(())
        })
        .unwrap();
    }
}
