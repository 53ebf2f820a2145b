use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};

use swapmeet_types::models::{GroupId, Room, RoomId, RoomType, RosterStatus, UserId};

use super::{OptionalExt, ROOM_COLUMNS, room_from_row};
use crate::models::{opt_enum_col, to_db_time};

/// Predicate for a message that counts towards `msg_valid`, with columns
/// qualified by `alias` when one is given.
pub(crate) fn valid_message(alias: &str) -> String {
    let p = if alias.is_empty() { String::new() } else { format!("{alias}.") };
    format!(
        "{p}deleted = 0 AND {p}review_required = 0 AND {p}review_rejected = 0 \
         AND {p}processing_successful = 1"
    )
}

pub fn get_room(conn: &Connection, id: RoomId) -> Result<Option<Room>> {
    let sql = format!("SELECT {ROOM_COLUMNS} FROM chat_rooms r WHERE r.id = ?1");
    conn.query_row(&sql, [id], room_from_row).optional()
}

/// User2User room between the pair, in either order. Oldest wins if a
/// legacy duplicate exists.
pub fn find_direct_room(conn: &Connection, a: UserId, b: UserId) -> Result<Option<Room>> {
    let sql = format!(
        "SELECT {ROOM_COLUMNS} FROM chat_rooms r
         WHERE r.chat_type = 'User2User'
           AND ((r.user1 = ?1 AND r.user2 = ?2) OR (r.user1 = ?2 AND r.user2 = ?1))
         ORDER BY r.id
         LIMIT 1"
    );
    conn.query_row(&sql, params![a, b], room_from_row).optional()
}

pub fn insert_room(
    conn: &Connection,
    chat_type: RoomType,
    user1: Option<UserId>,
    user2: Option<UserId>,
    group_id: Option<GroupId>,
    now: DateTime<Utc>,
) -> Result<RoomId> {
    let ts = to_db_time(now);
    conn.execute(
        "INSERT INTO chat_rooms (chat_type, user1, user2, group_id, latest_message_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![chat_type.as_str(), user1, user2, group_id, ts],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Recomputes both counters from the message table and bumps latest
/// activity. Mod2Mod rooms always store zero invalid messages.
pub fn recount_messages(conn: &Connection, id: RoomId, now: DateTime<Utc>) -> Result<usize> {
    let sql = format!(
        "UPDATE chat_rooms SET
            msg_valid = (SELECT COUNT(*) FROM chat_messages
                         WHERE room_id = ?1 AND {}),
            msg_invalid = CASE WHEN chat_type = 'Mod2Mod' THEN 0 ELSE
                          (SELECT COUNT(*) FROM chat_messages
                           WHERE room_id = ?1 AND deleted = 0
                             AND NOT (review_required = 0 AND review_rejected = 0
                                      AND processing_successful = 1)) END,
            latest_message_at = ?2
         WHERE id = ?1",
        valid_message("")
    );
    let n = conn.execute(&sql, params![id, to_db_time(now)])?;
    Ok(n)
}

/// Filters for a caller's room list. `after` is the keyset position of the
/// last room of the previous page.
pub struct RoomQuery<'a> {
    pub user_id: UserId,
    pub moderated_groups: &'a [GroupId],
    pub types: &'a [RoomType],
    pub since: DateTime<Utc>,
    pub search: Option<&'a str>,
    pub include_closed: bool,
    pub after: Option<(DateTime<Utc>, RoomId)>,
    pub limit: u32,
}

/// Participation or group ownership, narrowed to `types`. Binds `?1` to the
/// caller and appends the remaining parameters to `values`.
fn membership_clause(moderated_groups: &[GroupId], types: &[RoomType], values: &mut Vec<Value>) -> String {
    let mut membership =
        String::from("((r.user1 = ?1 OR r.user2 = ?1) AND r.chat_type IN ('User2User', 'User2Mod', 'Mod2Mod', 'Group'))");
    if !moderated_groups.is_empty() {
        let marks = vec!["?"; moderated_groups.len()].join(", ");
        membership = format!(
            "({membership} OR (r.chat_type IN ('User2Mod', 'Mod2Mod', 'Group') AND r.group_id IN ({marks})))"
        );
        values.extend(moderated_groups.iter().map(|g| Value::Integer(*g)));
    }

    let type_marks = vec!["?"; types.len()].join(", ");
    values.extend(types.iter().map(|t| Value::Text(t.as_str().to_string())));
    format!("{membership} AND r.chat_type IN ({type_marks})")
}

/// Every open room of the caller's active since `since`, unpaged.
pub fn open_room_ids_for_user(
    conn: &Connection,
    user: UserId,
    moderated_groups: &[GroupId],
    types: &[RoomType],
    since: DateTime<Utc>,
) -> Result<Vec<RoomId>> {
    if types.is_empty() {
        return Ok(vec![]);
    }

    let mut values: Vec<Value> = vec![Value::Integer(user)];
    let membership = membership_clause(moderated_groups, types, &mut values);
    let sql = format!(
        "SELECT r.id
         FROM chat_rooms r
         LEFT JOIN chat_roster ro ON ro.room_id = r.id AND ro.user_id = ?1
         WHERE {membership}
           AND r.latest_message_at >= ?
           AND (ro.status IS NULL OR ro.status NOT IN ('Closed', 'Blocked'))"
    );
    values.push(Value::Text(to_db_time(since)));

    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(params_from_iter(values.iter()), |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Rooms the caller takes part in directly plus rooms owned by groups they
/// moderate, newest activity first, with the caller's roster status.
pub fn list_rooms_for_user(
    conn: &Connection,
    q: &RoomQuery<'_>,
) -> Result<Vec<(Room, Option<RosterStatus>)>> {
    if q.types.is_empty() {
        return Ok(vec![]);
    }

    let mut values: Vec<Value> = vec![Value::Integer(q.user_id)];
    let membership = membership_clause(q.moderated_groups, q.types, &mut values);

    let mut sql = format!(
        "SELECT {ROOM_COLUMNS}, ro.status
         FROM chat_rooms r
         LEFT JOIN chat_roster ro ON ro.room_id = r.id AND ro.user_id = ?1
         WHERE {membership}
           AND r.latest_message_at >= ?"
    );
    values.push(Value::Text(to_db_time(q.since)));

    if !q.include_closed {
        sql.push_str(" AND (ro.status IS NULL OR ro.status NOT IN ('Closed', 'Blocked'))");
    }

    if let Some(search) = q.search.filter(|s| !s.trim().is_empty()) {
        sql.push_str(
            " AND (EXISTS (SELECT 1 FROM chat_messages m
                           WHERE m.room_id = r.id AND m.deleted = 0
                             AND instr(lower(m.message), lower(?)) > 0)
                   OR EXISTS (SELECT 1 FROM users u
                              WHERE u.id IN (r.user1, r.user2)
                                AND instr(lower(COALESCE(u.fullname, '') || ' ' || COALESCE(u.firstname, '')
                                          || ' ' || COALESCE(u.lastname, '')), lower(?)) > 0))",
        );
        values.push(Value::Text(search.trim().to_string()));
        values.push(Value::Text(search.trim().to_string()));
    }

    if let Some((at, id)) = q.after {
        sql.push_str(" AND (r.latest_message_at < ? OR (r.latest_message_at = ? AND r.id < ?))");
        let ts = to_db_time(at);
        values.push(Value::Text(ts.clone()));
        values.push(Value::Text(ts));
        values.push(Value::Integer(id));
    }

    sql.push_str(" ORDER BY r.latest_message_at DESC, r.id DESC LIMIT ?");
    values.push(Value::Integer(i64::from(q.limit)));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            Ok((room_from_row(row)?, opt_enum_col(row, 8)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::models::{NewMessage, to_db_time};
    use crate::queries::messages;
    use chrono::Duration;
    use swapmeet_types::models::MessageKind;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        for (id, name) in [(1, "Ann"), (2, "Bob"), (3, "Cat")] {
            db.create_user(id, name).unwrap();
        }
        db.create_group(10, "north", Some("North Freegle"), None).unwrap();
        db
    }

    #[test]
    fn direct_room_lookup_ignores_order() {
        let db = seeded();
        db.with_conn_mut(|conn| {
            let id = insert_room(conn, RoomType::User2User, Some(1), Some(2), None, Utc::now())?;
            assert_eq!(find_direct_room(conn, 2, 1)?.map(|r| r.id), Some(id));
            assert!(find_direct_room(conn, 1, 3)?.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn mod2mod_recount_pins_invalid_to_zero() {
        let db = seeded();
        db.with_conn_mut(|conn| {
            let now = Utc::now();
            let room = insert_room(conn, RoomType::Mod2Mod, Some(1), Some(2), Some(10), now)?;
            for pending in [false, true, true] {
                messages::insert_message(
                    conn,
                    &NewMessage {
                        room_id: room,
                        user_id: 1,
                        kind: MessageKind::Default,
                        message: "hi",
                        ref_item_type: None,
                        created_at: now,
                        review_required: pending,
                        reply_expected: false,
                    },
                )?;
            }
            recount_messages(conn, room, now)?;
            let r = get_room(conn, room)?.unwrap();
            assert_eq!((r.msg_valid, r.msg_invalid), (1, 0));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn room_list_pages_by_activity_then_id() {
        let db = seeded();
        db.with_conn_mut(|conn| {
            let now = Utc::now();
            let a = insert_room(conn, RoomType::User2User, Some(1), Some(2), None, now)?;
            let b = insert_room(conn, RoomType::User2User, Some(1), Some(3), None, now)?;
            let old = insert_room(conn, RoomType::User2User, Some(2), Some(1), None, now)?;
            conn.execute(
                "UPDATE chat_rooms SET latest_message_at = ?2 WHERE id = ?1",
                params![old, to_db_time(now - Duration::days(90))],
            )?;

            let mut q = RoomQuery {
                user_id: 1,
                moderated_groups: &[],
                types: &RoomType::ALL,
                since: now - Duration::days(31),
                search: None,
                include_closed: false,
                after: None,
                limit: 1,
            };
            let first = list_rooms_for_user(conn, &q)?;
            assert_eq!(first[0].0.id, b);

            q.after = Some((first[0].0.latest_message_at, first[0].0.id));
            let second = list_rooms_for_user(conn, &q)?;
            assert_eq!(second[0].0.id, a);

            q.after = Some((second[0].0.latest_message_at, second[0].0.id));
            assert!(list_rooms_for_user(conn, &q)?.is_empty());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn open_room_ids_skip_closed_and_stale_rooms() {
        let db = seeded();
        db.with_conn_mut(|conn| {
            let now = Utc::now();
            let open = insert_room(conn, RoomType::User2User, Some(1), Some(2), None, now)?;
            let closed = insert_room(conn, RoomType::User2User, Some(1), Some(3), None, now)?;
            let group = insert_room(conn, RoomType::User2Mod, Some(2), None, Some(10), now)?;
            let stale = insert_room(conn, RoomType::User2Mod, Some(3), None, Some(10), now)?;
            conn.execute(
                "UPDATE chat_rooms SET latest_message_at = ?2 WHERE id = ?1",
                params![stale, to_db_time(now - Duration::days(400))],
            )?;
            conn.execute(
                "INSERT INTO chat_roster (room_id, user_id, status, updated_at) VALUES (?1, 1, 'Closed', ?2)",
                params![closed, to_db_time(now)],
            )?;

            let since = now - Duration::days(365);
            let mut ids = open_room_ids_for_user(conn, 1, &[10], &RoomType::ALL, since)?;
            ids.sort_unstable();
            assert_eq!(ids, vec![open, group]);

            assert_eq!(open_room_ids_for_user(conn, 1, &[], &RoomType::ALL, since)?, vec![open]);
            assert_eq!(open_room_ids_for_user(conn, 1, &[10], &[RoomType::User2Mod], since)?, vec![group]);
            Ok(())
        })
        .unwrap();
    }
}
