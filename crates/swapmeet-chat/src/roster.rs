use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use swapmeet_db::Database;
use swapmeet_db::queries::roster;
use swapmeet_types::models::{MessageId, RoomId, RosterEntry, RosterStatus, UserId};

use crate::error::ChatResult;
use crate::rooms::RoomStore;

/// Result of an `UpdatePresence` call.
#[derive(Debug, Clone)]
pub struct PresenceUpdate {
    pub roster: Vec<RosterEntry>,
    pub unseen: i64,
}

/// Watermark change requested alongside a presence update.
#[derive(Debug, Clone, Copy)]
pub struct Watermark {
    pub message: MessageId,
    pub allow_back: bool,
}

/// Per-(room, user) presence and read state.
#[derive(Clone)]
pub struct RosterManager {
    db: Arc<Database>,
    rooms: RoomStore,
}

impl RosterManager {
    pub fn new(rooms: RoomStore) -> Self {
        Self {
            db: rooms.db().clone(),
            rooms,
        }
    }

    pub fn upsert_presence(
        &self,
        room: RoomId,
        user: UserId,
        status: RosterStatus,
        source_address: Option<&str>,
    ) -> ChatResult<()> {
        self.db.with_conn_mut(|conn| {
            roster::upsert_presence(conn, room, user, status, source_address, Utc::now())
        })?;
        Ok(())
    }

    /// Moves the user's watermark and refreshes `seen_by_all` for everything
    /// up to it. Returns the stored watermark.
    pub fn advance_watermark(
        &self,
        room: RoomId,
        user: UserId,
        message: MessageId,
        allow_back: bool,
    ) -> ChatResult<MessageId> {
        let stored = self.db.with_tx(|conn| -> ChatResult<MessageId> {
            let stored = roster::advance_watermark(conn, room, user, message, allow_back, Utc::now())?;
            roster::mark_seen_by_all(conn, room, stored)?;
            Ok(stored)
        })?;
        Ok(stored)
    }

    pub fn unseen_count(&self, room: RoomId, user: UserId) -> ChatResult<i64> {
        Ok(self.db.with_conn(|conn| roster::unseen_count(conn, room, user))?)
    }

    pub fn roster(&self, room: RoomId) -> ChatResult<Vec<RosterEntry>> {
        Ok(self.db.with_conn(|conn| roster::roster_for_room(conn, room))?)
    }

    /// The `UpdatePresence` operation: visibility, status upsert, optional
    /// watermark move, then the fresh roster and unseen count.
    pub fn update_presence(
        &self,
        room: RoomId,
        caller: UserId,
        status: Option<RosterStatus>,
        watermark: Option<Watermark>,
        source_address: Option<&str>,
    ) -> ChatResult<PresenceUpdate> {
        self.rooms.require_visible(caller, room)?;

        let status = status.unwrap_or(RosterStatus::Online);
        self.db.with_tx(|conn| -> ChatResult<()> {
            let now = Utc::now();
            roster::upsert_presence(conn, room, caller, status, source_address, now)?;
            if let Some(mark) = watermark {
                let stored =
                    roster::advance_watermark(conn, room, caller, mark.message, mark.allow_back, now)?;
                let flagged = roster::mark_seen_by_all(conn, room, stored)?;
                debug!("Room {} watermark for {} at {}, {} newly seen by all", room, caller, stored, flagged);
            }
            Ok(())
        })?;

        let (roster, unseen) = self.db.with_conn(|conn| {
            Ok((
                roster::roster_for_room(conn, room)?,
                roster::unseen_count(conn, room, caller)?,
            ))
        })?;
        Ok(PresenceUpdate { roster, unseen })
    }
}
