//! Read-side composition for room lists and room detail. Independent reads
//! run as concurrent blocking tasks joined at a barrier, sharing one
//! cancellation token and one deadline.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use swapmeet_db::Database;
use swapmeet_db::models::{GroupRow, UserRow, parse_db_time, to_db_time};
use swapmeet_db::queries::rooms::RoomQuery;
use swapmeet_db::queries::{directory, rooms, roster, summary};
use swapmeet_types::models::{
    GroupId, IconSource, MessageId, Room, RoomDetail, RoomId, RoomSummary, RoomType, UserId,
};

use crate::display;
use crate::error::{ChatError, ChatResult};
use crate::review::clamp_limit;
use crate::rooms::RoomStore;

/// Activity window for members' room lists.
pub const MEMBER_ACTIVE_DAYS: i64 = 31;
/// Moderators see a year of group conversations.
pub const MODERATOR_ACTIVE_DAYS: i64 = 365;

#[derive(Debug, Clone, Default)]
pub struct RoomFilters {
    /// Room types to include. `None` means all of them.
    pub types: Option<Vec<RoomType>>,
    pub search: Option<String>,
    pub active_days: Option<i64>,
    pub include_closed: bool,
    pub cursor: Option<String>,
    pub limit: i64,
}

#[derive(Debug, Clone)]
pub struct RoomPage {
    pub rooms: Vec<RoomSummary>,
    pub next_cursor: Option<String>,
}

/// Keyset position in a room list: (latest activity, room id).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomCursor {
    pub at: DateTime<Utc>,
    pub id: RoomId,
}

impl RoomCursor {
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{}|{}", to_db_time(self.at), self.id))
    }

    pub fn decode(s: &str) -> anyhow::Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .context("Invalid cursor: not valid base64")?;
        let raw = String::from_utf8(bytes).context("Invalid cursor: not text")?;
        let (at, id) = raw
            .split_once('|')
            .ok_or_else(|| anyhow!("Invalid cursor: missing separator"))?;
        Ok(Self {
            at: parse_db_time(at).context("Invalid cursor: bad timestamp")?,
            id: id.parse().context("Invalid cursor: bad room id")?,
        })
    }
}

/// Runs a read on a blocking thread unless the fan-out was already
/// cancelled.
async fn read<T, F>(db: Arc<Database>, token: CancellationToken, f: F) -> ChatResult<T>
where
    F: FnOnce(&Connection) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        if token.is_cancelled() {
            return Err(ChatError::Internal(anyhow!("read cancelled")));
        }
        Ok(db.with_conn(f)?)
    })
    .await
    .map_err(|e| ChatError::Internal(anyhow!("read task failed: {}", e)))?
}

type Names = (Vec<UserRow>, Vec<GroupRow>);

fn names_for(conn: &Connection, users: &[UserId], groups: &[GroupId]) -> anyhow::Result<Names> {
    Ok((
        directory::users_by_ids(conn, users)?,
        directory::groups_by_ids(conn, groups)?,
    ))
}

fn index_names(names: Names) -> (HashMap<UserId, UserRow>, HashMap<GroupId, GroupRow>) {
    let (users, groups) = names;
    (
        users.into_iter().map(|u| (u.id, u)).collect(),
        groups.into_iter().map(|g| (g.id, g)).collect(),
    )
}

#[derive(Clone)]
pub struct AggregationService {
    db: Arc<Database>,
    rooms: RoomStore,
    timeout: Duration,
}

impl AggregationService {
    pub fn new(rooms: RoomStore, timeout: Duration) -> Self {
        Self {
            db: rooms.db().clone(),
            rooms,
            timeout,
        }
    }

    /// Awaits a fan-out under the service deadline and the caller's token.
    /// Either one firing cancels every sibling read.
    async fn bounded<T>(
        &self,
        parent: &CancellationToken,
        token: &CancellationToken,
        fanout: impl Future<Output = ChatResult<T>>,
    ) -> ChatResult<T> {
        let result = tokio::select! {
            res = tokio::time::timeout(self.timeout, fanout) => match res {
                Ok(inner) => inner,
                Err(_) => {
                    warn!("Aggregation reads exceeded {:?}", self.timeout);
                    Err(ChatError::Internal(anyhow!("aggregation timed out")))
                }
            },
            _ = parent.cancelled() => Err(ChatError::Internal(anyhow!("request cancelled"))),
        };

        if result.is_err() {
            token.cancel();
        }
        result
    }

    /// The caller's rooms with per-room unseen counts, last message, read
    /// watermark and display details.
    pub async fn list_rooms(
        &self,
        caller: UserId,
        filters: RoomFilters,
        cancel: &CancellationToken,
    ) -> ChatResult<RoomPage> {
        let after = filters
            .cursor
            .as_deref()
            .map(RoomCursor::decode)
            .transpose()
            .map_err(|e| ChatError::InvalidArgument(e.to_string()))?;
        let limit = clamp_limit(filters.limit);

        let directory = self.rooms.directory().clone();
        let db = self.db.clone();
        let listing = tokio::task::spawn_blocking(move || -> ChatResult<_> {
            let moderated = directory.moderated_groups(caller)?;
            let active_days = filters.active_days.unwrap_or(if moderated.is_empty() {
                MEMBER_ACTIVE_DAYS
            } else {
                MODERATOR_ACTIVE_DAYS
            });
            let types = filters.types.unwrap_or_else(|| RoomType::ALL.to_vec());
            let query = RoomQuery {
                user_id: caller,
                moderated_groups: &moderated,
                types: &types,
                since: Utc::now() - chrono::Duration::days(active_days),
                search: filters.search.as_deref(),
                include_closed: filters.include_closed,
                after: after.map(|c| (c.at, c.id)),
                limit,
            };
            Ok(db.with_conn(|conn| rooms::list_rooms_for_user(conn, &query))?)
        });
        let listed = tokio::select! {
            res = listing => res.map_err(|e| ChatError::Internal(anyhow!("room listing failed: {}", e)))??,
            _ = cancel.cancelled() => return Err(ChatError::Internal(anyhow!("request cancelled"))),
        };

        if listed.is_empty() {
            return Ok(RoomPage {
                rooms: vec![],
                next_cursor: None,
            });
        }

        let room_ids: Vec<RoomId> = listed.iter().map(|(r, _)| r.id).collect();
        let mut user_ids: Vec<UserId> = listed
            .iter()
            .filter_map(|(r, _)| display::other_user(r, caller))
            .collect();
        user_ids.sort_unstable();
        user_ids.dedup();
        let mut group_ids: Vec<GroupId> = listed.iter().filter_map(|(r, _)| r.group_id).collect();
        group_ids.sort_unstable();
        group_ids.dedup();

        let token = cancel.child_token();
        let fanout = {
            let (ids_a, ids_b, ids_c) = (room_ids.clone(), room_ids.clone(), room_ids);
            let db = &self.db;
            let token = &token;
            async move {
                tokio::try_join!(
                    read(db.clone(), token.clone(), move |c| summary::unseen_counts(c, caller, &ids_a)),
                    read(db.clone(), token.clone(), move |c| summary::last_messages(c, caller, &ids_b)),
                    read(db.clone(), token.clone(), move |c| summary::last_seen(c, caller, &ids_c)),
                    read(db.clone(), token.clone(), move |c| names_for(c, &user_ids, &group_ids)),
                )
            }
        };
        let (unseen, last, seen, names) = self.bounded(cancel, &token, fanout).await?;
        let (users, groups) = index_names(names);

        let next_cursor = if listed.len() as u32 == limit {
            listed.last().map(|(r, _)| {
                RoomCursor {
                    at: r.latest_message_at,
                    id: r.id,
                }
                .encode()
            })
        } else {
            None
        };

        let summaries: Vec<RoomSummary> = listed
            .into_iter()
            .map(|(room, status)| {
                let other = display::other_user(&room, caller);
                let other_gone = other.is_some_and(|id| users.get(&id).is_none_or(|u| u.deleted));
                let last = last.get(&room.id);

                RoomSummary {
                    id: room.id,
                    chat_type: room.chat_type,
                    name: display::room_name(&room, caller, &users, &groups),
                    unseen: if other_gone { 0 } else { unseen.get(&room.id).copied().unwrap_or(0) },
                    last_msg: last.map(|m| m.id),
                    last_date: last.map(|m| m.created_at),
                    snippet: match last {
                        Some(m) if !other_gone => {
                            display::snippet(m.kind, &m.message, m.ref_item_type.as_deref())
                        }
                        _ => String::new(),
                    },
                    last_kind: last.map(|m| m.kind),
                    last_msg_seen: seen.get(&room.id).copied(),
                    other_user_id: other,
                    group_id: room.group_id,
                    icon: if other_gone {
                        IconSource::Default
                    } else {
                        display::icon_for(&room, caller, &users, &groups)
                    },
                    status,
                }
            })
            .collect();

        debug!("Listed {} rooms for {}", summaries.len(), caller);
        Ok(RoomPage {
            rooms: summaries,
            next_cursor,
        })
    }

    /// One unread total across every open room the caller would see in their
    /// room list, for dashboard badges.
    pub async fn unseen_total(
        &self,
        caller: UserId,
        types: Option<Vec<RoomType>>,
        cancel: &CancellationToken,
    ) -> ChatResult<i64> {
        let directory = self.rooms.directory().clone();
        let moderated = tokio::task::spawn_blocking(move || directory.moderated_groups(caller))
            .await
            .map_err(|e| ChatError::Internal(anyhow!("moderator lookup failed: {}", e)))??;

        let active_days = if moderated.is_empty() {
            MEMBER_ACTIVE_DAYS
        } else {
            MODERATOR_ACTIVE_DAYS
        };
        let since = Utc::now() - chrono::Duration::days(active_days);
        let types = types.unwrap_or_else(|| RoomType::ALL.to_vec());

        let token = cancel.child_token();
        let counting = read(self.db.clone(), token.clone(), move |c| {
            let ids = rooms::open_room_ids_for_user(c, caller, &moderated, &types, since)?;
            let counts = summary::unseen_counts(c, caller, &ids)?;
            Ok(counts.values().sum::<i64>())
        });
        let total = self.bounded(cancel, &token, counting).await?;

        debug!("User {} has {} unseen messages", caller, total);
        Ok(total)
    }

    /// The `GetRoom` read: visibility, then unseen count, watermark and
    /// naming fetched side by side.
    pub async fn room_detail(
        &self,
        caller: UserId,
        room_id: RoomId,
        cancel: &CancellationToken,
    ) -> ChatResult<RoomDetail> {
        let store = self.rooms.clone();
        let room: Room = tokio::task::spawn_blocking(move || store.require_visible(caller, room_id))
            .await
            .map_err(|e| ChatError::Internal(anyhow!("room lookup failed: {}", e)))??;

        let users: Vec<UserId> = room.user1.into_iter().chain(room.user2).collect();
        let groups: Vec<GroupId> = room.group_id.into_iter().collect();

        let token = cancel.child_token();
        let fanout = {
            let db = &self.db;
            let token = &token;
            async move {
                tokio::try_join!(
                    read(db.clone(), token.clone(), move |c| roster::unseen_count(c, room_id, caller)),
                    read(db.clone(), token.clone(), move |c| {
                        Ok(roster::get_entry(c, room_id, caller)?.and_then(|e| e.last_msg_seen))
                    }),
                    read(db.clone(), token.clone(), move |c| names_for(c, &users, &groups)),
                )
            }
        };
        let (unseen, last_msg_seen, names): (i64, Option<MessageId>, Names) =
            self.bounded(cancel, &token, fanout).await?;
        let (users, groups) = index_names(names);

        Ok(RoomDetail {
            name: display::room_name(&room, caller, &users, &groups),
            other_user_id: display::other_user(&room, caller),
            unseen,
            last_msg_seen,
            room,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cursor_round_trips_and_rejects_garbage() {
        let cursor = RoomCursor {
            at: Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap(),
            id: 42,
        };
        assert_eq!(RoomCursor::decode(&cursor.encode()).unwrap(), cursor);
        assert!(RoomCursor::decode("not a cursor!").is_err());
        assert!(RoomCursor::decode(&URL_SAFE_NO_PAD.encode("2026-01-01")).is_err());
    }

    #[tokio::test]
    async fn cancelled_request_fails_fast() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.create_user(1, "Ann").unwrap();
        db.create_user(2, "Bob").unwrap();
        let rooms = RoomStore::new(db.clone(), db);
        let (room, _) = rooms.resolve_or_create_direct_room(1, 2).unwrap();
        let service = AggregationService::new(rooms, Duration::from_secs(5));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = service.room_detail(1, room.id, &cancel).await.unwrap_err();
        assert!(matches!(err, ChatError::Internal(_)));
    }

    #[tokio::test]
    async fn bad_cursor_is_invalid_argument() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let service = AggregationService::new(RoomStore::new(db.clone(), db), Duration::from_secs(5));
        let filters = RoomFilters {
            cursor: Some("%%%".into()),
            ..Default::default()
        };
        let err = service
            .list_rooms(1, filters, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::InvalidArgument(_)));
    }
}
