use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use swapmeet_db::Database;
use swapmeet_db::queries::{directory, rooms, roster};
use swapmeet_types::models::{GroupId, Room, RoomId, RoomType, UserId};

use crate::directory::ModeratorDirectory;
use crate::display;
use crate::error::{ChatError, ChatResult};

/// Room identity, participants and visibility.
#[derive(Clone)]
pub struct RoomStore {
    db: Arc<Database>,
    directory: Arc<dyn ModeratorDirectory>,
}

impl RoomStore {
    pub fn new(db: Arc<Database>, directory: Arc<dyn ModeratorDirectory>) -> Self {
        Self { db, directory }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn directory(&self) -> &Arc<dyn ModeratorDirectory> {
        &self.directory
    }

    pub fn get(&self, id: RoomId) -> ChatResult<Room> {
        self.db
            .with_conn(|conn| rooms::get_room(conn, id))?
            .ok_or_else(|| ChatError::room_not_found(id))
    }

    /// Returns the User2User room for the pair, creating it (and both roster
    /// entries) on first contact. The bool is true when the room is new.
    pub fn resolve_or_create_direct_room(&self, a: UserId, b: UserId) -> ChatResult<(Room, bool)> {
        if a == b {
            return Err(ChatError::InvalidArgument(
                "cannot open a conversation with yourself".into(),
            ));
        }

        self.db.with_tx(|conn| {
            if directory::get_user(conn, b)?.is_none() {
                return Err(ChatError::NotFound(format!("user {}", b)));
            }

            if let Some(room) = rooms::find_direct_room(conn, a, b)? {
                return Ok((room, false));
            }

            let now = Utc::now();
            let id = rooms::insert_room(conn, RoomType::User2User, Some(a), Some(b), None, now)?;
            roster::seed_roster(conn, id, &[a, b], now)?;

            let room = rooms::get_room(conn, id)?.ok_or_else(|| ChatError::room_not_found(id))?;
            info!("Opened direct room {} between {} and {}", id, a, b);
            Ok((room, true))
        })
    }

    /// Whether `caller` may read or act on the room.
    pub fn visibility_check(&self, caller: UserId, room: &Room) -> ChatResult<bool> {
        if room.is_participant(caller) {
            return Ok(true);
        }
        match (room.chat_type.is_group_owned(), room.group_id) {
            (true, Some(group)) => Ok(self.directory.is_moderator_of(caller, group)?),
            _ => Ok(false),
        }
    }

    /// Loads the room and checks the caller may see it.
    pub fn require_visible(&self, caller: UserId, id: RoomId) -> ChatResult<Room> {
        let room = self.get(id)?;
        if !self.visibility_check(caller, &room)? {
            return Err(ChatError::Forbidden(format!("no access to room {}", id)));
        }
        Ok(room)
    }

    pub fn display_name(&self, room: &Room, perspective: UserId) -> ChatResult<String> {
        let (users, groups) = self.db.with_conn(|conn| {
            let ids: Vec<UserId> = room.user1.into_iter().chain(room.user2).collect();
            let users = directory::users_by_ids(conn, &ids)?;
            let groups = match room.group_id {
                Some(g) => directory::get_group(conn, g)?.into_iter().collect(),
                None => vec![],
            };
            Ok((users, groups))
        })?;

        let users: HashMap<_, _> = users.into_iter().map(|u| (u.id, u)).collect();
        let groups: HashMap<_, _> = groups.into_iter().map(|g| (g.id, g)).collect();
        Ok(display::room_name(room, perspective, &users, &groups))
    }

    /// Groups whose moderators have standing over the room: the owning group
    /// plus every group either direct participant belongs to.
    pub fn associated_groups(&self, room: &Room) -> ChatResult<Vec<GroupId>> {
        let mut groups: Vec<GroupId> = room.group_id.into_iter().collect();
        self.db.with_conn(|conn| {
            for user in room.user1.into_iter().chain(room.user2) {
                groups.extend(directory::groups_of_user(conn, user)?);
            }
            Ok(())
        })?;
        groups.sort_unstable();
        groups.dedup();
        Ok(groups)
    }
}
