//! Read access to member and group data owned by the membership service,
//! plus the few writes chat makes to it.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params, params_from_iter};

use swapmeet_types::models::{GroupId, UserId};

use super::OptionalExt;
use crate::Database;
use crate::models::{GroupRow, UserRow, placeholders, to_db_time};

const USER_COLUMNS: &str =
    "id, firstname, lastname, fullname, deleted_at IS NOT NULL, chat_mod_status, profile_image_id, use_profile";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        firstname: row.get(1)?,
        lastname: row.get(2)?,
        fullname: row.get(3)?,
        deleted: row.get(4)?,
        chat_mod_status: row.get(5)?,
        profile_image_id: row.get(6)?,
        use_profile: row.get(7)?,
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<GroupRow> {
    Ok(GroupRow {
        id: row.get(0)?,
        nameshort: row.get(1)?,
        namefull: row.get(2)?,
        image_id: row.get(3)?,
    })
}

/// Roles that carry moderation standing in a group.
const MODERATOR_ROLES: &str = "('Moderator', 'Owner')";

pub fn get_user(conn: &Connection, id: UserId) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    conn.query_row(&sql, [id], user_from_row).optional()
}

pub fn users_by_ids(conn: &Connection, ids: &[UserId]) -> Result<Vec<UserRow>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id IN ({})",
        placeholders(1, ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(ids.iter()), user_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_group(conn: &Connection, id: GroupId) -> Result<Option<GroupRow>> {
    conn.query_row(
        "SELECT id, nameshort, namefull, image_id FROM community_groups WHERE id = ?1",
        [id],
        group_from_row,
    )
    .optional()
}

pub fn groups_by_ids(conn: &Connection, ids: &[GroupId]) -> Result<Vec<GroupRow>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let sql = format!(
        "SELECT id, nameshort, namefull, image_id FROM community_groups WHERE id IN ({})",
        placeholders(1, ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(ids.iter()), group_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn moderated_groups(conn: &Connection, user: UserId) -> Result<Vec<GroupId>> {
    let sql = format!(
        "SELECT group_id FROM memberships WHERE user_id = ?1 AND role IN {MODERATOR_ROLES} ORDER BY group_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map([user], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

pub fn is_moderator_of(conn: &Connection, user: UserId, group: GroupId) -> Result<bool> {
    let sql = format!(
        "SELECT EXISTS (SELECT 1 FROM memberships
                        WHERE user_id = ?1 AND group_id = ?2 AND role IN {MODERATOR_ROLES})"
    );
    Ok(conn.query_row(&sql, params![user, group], |row| row.get(0))?)
}

/// Every group the user belongs to, whatever the role.
pub fn groups_of_user(conn: &Connection, user: UserId) -> Result<Vec<GroupId>> {
    let mut stmt =
        conn.prepare("SELECT group_id FROM memberships WHERE user_id = ?1 ORDER BY group_id")?;
    let ids = stmt
        .query_map([user], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

pub fn set_chat_mod_status(conn: &Connection, user: UserId, status: &str) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE users SET chat_mod_status = ?2 WHERE id = ?1",
        params![user, status],
    )?)
}

pub fn record_nudge(
    conn: &Connection,
    from: UserId,
    to: Option<UserId>,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO user_nudges (from_user, to_user, created_at) VALUES (?1, ?2, ?3)",
        params![from, to, to_db_time(now)],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    // -- Directory mirror --

    pub fn create_user(&self, id: UserId, fullname: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, fullname) VALUES (?1, ?2)",
                params![id, fullname],
            )?;
            Ok(())
        })
    }

    pub fn create_group(
        &self,
        id: GroupId,
        nameshort: &str,
        namefull: Option<&str>,
        image_id: Option<i64>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO community_groups (id, nameshort, namefull, image_id) VALUES (?1, ?2, ?3, ?4)",
                params![id, nameshort, namefull, image_id],
            )?;
            Ok(())
        })
    }

    pub fn add_membership(&self, user: UserId, group: GroupId, role: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO memberships (user_id, group_id, role) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, group_id) DO UPDATE SET role = excluded.role",
                params![user, group, role],
            )?;
            Ok(())
        })
    }

    /// Mirrors an account closure from the membership service.
    pub fn mark_user_deleted(&self, id: UserId, at: DateTime<Utc>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET deleted_at = ?2 WHERE id = ?1",
                params![id, to_db_time(at)],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: UserId) -> Result<Option<UserRow>> {
        self.with_conn(|conn| get_user(conn, id))
    }

    pub fn moderated_groups(&self, user: UserId) -> Result<Vec<GroupId>> {
        self.with_conn(|conn| moderated_groups(conn, user))
    }
}
