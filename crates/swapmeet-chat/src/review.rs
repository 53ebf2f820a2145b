use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use swapmeet_db::Database;
use swapmeet_db::queries::{directory, review};
use swapmeet_types::models::{GroupId, MessageId, ReviewItem, ReviewRoomContext, UserId};

use crate::directory::ModeratorDirectory;
use crate::display;
use crate::error::ChatResult;

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Out-of-range limits fall back to the default page size.
pub fn clamp_limit(limit: i64) -> u32 {
    if limit <= 0 || limit > MAX_PAGE_SIZE {
        DEFAULT_PAGE_SIZE
    } else {
        limit as u32
    }
}

#[derive(Debug, Clone)]
pub struct ReviewPage {
    pub items: Vec<ReviewItem>,
    pub next_cursor: Option<MessageId>,
    pub moderated_groups: Vec<GroupId>,
}

/// Messages awaiting a moderation decision, scoped to the caller's groups.
#[derive(Clone)]
pub struct ReviewQueue {
    db: Arc<Database>,
    directory: Arc<dyn ModeratorDirectory>,
}

impl ReviewQueue {
    pub fn new(db: Arc<Database>, directory: Arc<dyn ModeratorDirectory>) -> Self {
        Self { db, directory }
    }

    /// Oldest-first page after `cursor`. Moderators of nothing get an empty
    /// page.
    pub fn list_pending(
        &self,
        moderator: UserId,
        cursor: Option<MessageId>,
        limit: i64,
    ) -> ChatResult<ReviewPage> {
        let groups = self.directory.moderated_groups(moderator)?;
        if groups.is_empty() {
            return Ok(ReviewPage {
                items: vec![],
                next_cursor: None,
                moderated_groups: groups,
            });
        }

        let limit = clamp_limit(limit);
        let (rows, users, group_rows) = self.db.with_conn(|conn| {
            let rows = review::list_pending(conn, &groups, cursor.unwrap_or(0), limit)?;

            let mut user_ids: Vec<UserId> = rows
                .iter()
                .flat_map(|(_, room)| room.user1.into_iter().chain(room.user2))
                .collect();
            user_ids.sort_unstable();
            user_ids.dedup();

            let mut group_ids: Vec<GroupId> = rows.iter().filter_map(|(_, room)| room.group_id).collect();
            group_ids.sort_unstable();
            group_ids.dedup();

            Ok((
                rows,
                directory::users_by_ids(conn, &user_ids)?,
                directory::groups_by_ids(conn, &group_ids)?,
            ))
        })?;

        let users: HashMap<_, _> = users.into_iter().map(|u| (u.id, u)).collect();
        let group_rows: HashMap<_, _> = group_rows.into_iter().map(|g| (g.id, g)).collect();

        let items: Vec<ReviewItem> = rows
            .into_iter()
            .map(|(msg, room)| ReviewItem {
                id: msg.id,
                room_id: msg.room_id,
                user_id: msg.user_id,
                kind: msg.kind,
                message: msg.message,
                created_at: msg.created_at,
                report_reason: msg.report_reason,
                held_by: msg.held_by,
                room: ReviewRoomContext {
                    id: room.id,
                    chat_type: room.chat_type,
                    user1: room.user1,
                    user2: room.user2,
                    group_id: room.group_id,
                    name: display::room_name(&room, moderator, &users, &group_rows),
                },
            })
            .collect();

        debug!("Review page for {}: {} messages", moderator, items.len());
        Ok(ReviewPage {
            next_cursor: items.last().map(|m| m.id),
            items,
            moderated_groups: groups,
        })
    }

    pub fn pending_count(&self, moderator: UserId) -> ChatResult<i64> {
        let groups = self.directory.moderated_groups(moderator)?;
        Ok(self.db.with_conn(|conn| review::pending_count(conn, &groups))?)
    }
}
