use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use swapmeet_db::Database;
use swapmeet_db::models::NewMessage;
use swapmeet_db::queries::{directory, messages, rooms, roster};
use swapmeet_types::events::ChatEvent;
use swapmeet_types::models::{MessageId, MessageKind, RoomId, UserId};

use crate::error::{ChatError, ChatResult};
use crate::events::EventBus;
use crate::rooms::RoomStore;

/// Messages younger than this are held back from notification mail while
/// someone in the room is typing.
const TYPING_DELAY_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NudgeOutcome {
    pub id: MessageId,
    /// False when the caller's previous nudge was still the latest message.
    pub created: bool,
}

/// Nudges and typing signals.
#[derive(Clone)]
pub struct EngagementTracker {
    db: Arc<Database>,
    rooms: RoomStore,
    events: EventBus,
}

impl EngagementTracker {
    pub fn new(rooms: RoomStore, events: EventBus) -> Self {
        Self {
            db: rooms.db().clone(),
            rooms,
            events,
        }
    }

    /// Prods the other participant. Repeated nudges with nothing in between
    /// collapse into the first one.
    pub fn nudge(&self, room_id: RoomId, actor: UserId) -> ChatResult<NudgeOutcome> {
        let room = self.rooms.get(room_id)?;
        if !room.is_participant(actor) {
            return Err(ChatError::Forbidden(format!(
                "only participants can nudge in room {}",
                room_id
            )));
        }
        let other = room.other_participant(actor);

        let outcome = self.db.with_tx(|conn| -> ChatResult<NudgeOutcome> {
            if let Some(last) = messages::latest_message(conn, room_id)? {
                if last.kind == MessageKind::Nudge && last.user_id == actor {
                    return Ok(NudgeOutcome {
                        id: last.id,
                        created: false,
                    });
                }
            }

            let now = Utc::now();
            let id = messages::insert_message(
                conn,
                &NewMessage {
                    room_id,
                    user_id: actor,
                    kind: MessageKind::Nudge,
                    message: "",
                    ref_item_type: None,
                    created_at: now,
                    review_required: false,
                    reply_expected: true,
                },
            )?;
            rooms::recount_messages(conn, room_id, now)?;
            directory::record_nudge(conn, actor, other, now)?;
            Ok(NudgeOutcome { id, created: true })
        })?;

        if outcome.created {
            info!("User {} nudged room {} (message {})", actor, room_id, outcome.id);
            self.events.publish(ChatEvent::Nudged {
                room_id,
                message_id: outcome.id,
                from_user: actor,
                to_user: other,
            });
        }
        Ok(outcome)
    }

    /// Delays pending notification mail for the room and stamps the caller's
    /// typing time. Store failures are logged, not returned. Returns how
    /// many messages were delayed.
    pub fn typing(&self, room_id: RoomId, actor: UserId) -> ChatResult<u64> {
        self.rooms.require_visible(actor, room_id)?;
        let now = Utc::now();

        let delayed = match self.db.with_conn_mut(|conn| {
            messages::delay_unmailed(conn, room_id, now, Duration::seconds(TYPING_DELAY_SECS))
        }) {
            Ok(n) => n as u64,
            Err(e) => {
                warn!("Failed to delay messages in room {}: {}", room_id, e);
                0
            }
        };

        if let Err(e) = self
            .db
            .with_conn_mut(|conn| roster::touch_typing(conn, room_id, actor, now))
        {
            warn!("Failed to record typing for {} in room {}: {}", actor, room_id, e);
        }

        Ok(delayed)
    }
}
