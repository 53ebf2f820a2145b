//! Row types for the collaborator tables and read-side aggregates, plus the
//! column conversions shared by every query module. Rooms, messages and
//! roster entries map straight onto the `swapmeet-types` models.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

use swapmeet_types::models::{GroupId, MessageId, MessageKind, RoomId, UserId};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: UserId,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub fullname: Option<String>,
    pub deleted: bool,
    pub chat_mod_status: String,
    pub profile_image_id: Option<i64>,
    pub use_profile: bool,
}

impl UserRow {
    /// Full name if set, otherwise first and last name joined.
    pub fn display_name(&self) -> String {
        match self.fullname.as_deref() {
            Some(full) if !full.is_empty() => full.to_string(),
            _ => format!(
                "{} {}",
                self.firstname.as_deref().unwrap_or_default(),
                self.lastname.as_deref().unwrap_or_default()
            )
            .trim()
            .to_string(),
        }
    }

    pub fn is_unmoderated(&self) -> bool {
        self.chat_mod_status == CHAT_MOD_UNMODERATED
    }
}

pub const CHAT_MOD_MODERATED: &str = "Moderated";
pub const CHAT_MOD_UNMODERATED: &str = "Unmoderated";

#[derive(Debug, Clone)]
pub struct GroupRow {
    pub id: GroupId,
    pub nameshort: String,
    pub namefull: Option<String>,
    pub image_id: Option<i64>,
}

/// Message awaiting review, joined with the room it lives in.
#[derive(Debug, Clone)]
pub struct PendingRow {
    pub id: MessageId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub kind: MessageKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub report_reason: Option<String>,
    pub held_by: Option<UserId>,
}

#[derive(Debug, Clone)]
pub struct LastMessageRow {
    pub room_id: RoomId,
    pub id: MessageId,
    pub created_at: DateTime<Utc>,
    pub message: String,
    pub kind: MessageKind,
    pub ref_item_type: Option<String>,
}

/// Insert payload for `chat_messages`.
pub struct NewMessage<'a> {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub kind: MessageKind,
    pub message: &'a str,
    pub ref_item_type: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub review_required: bool,
    pub reply_expected: bool,
}

// -- Column conversions --

/// Timestamps are stored as fixed-width RFC 3339 UTC so that string order
/// matches time order.
pub fn to_db_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_db_time(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| {
            // Rows written by hand or by SQLite's datetime('now') carry no zone.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
}

pub(crate) fn time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_db_time(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        parse_db_time(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub(crate) fn enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        s.parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// `?1, ?2, …` placeholders for an IN list starting at `first`.
pub(crate) fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}
