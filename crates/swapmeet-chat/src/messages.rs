use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use swapmeet_db::Database;
use swapmeet_db::models::NewMessage;
use swapmeet_db::queries::{directory, messages, rooms, roster};
use swapmeet_types::models::{ChatMessage, MessageId, MessageKind, RoomId, RoomType, UserId};

use crate::error::{ChatError, ChatResult};
use crate::review::clamp_limit;
use crate::rooms::RoomStore;

/// Posting, reading and withdrawing messages.
#[derive(Clone)]
pub struct MessageService {
    db: Arc<Database>,
    rooms: RoomStore,
}

impl MessageService {
    pub fn new(rooms: RoomStore) -> Self {
        Self {
            db: rooms.db().clone(),
            rooms,
        }
    }

    pub fn post(
        &self,
        room_id: RoomId,
        author: UserId,
        text: &str,
        kind: MessageKind,
    ) -> ChatResult<ChatMessage> {
        match kind {
            MessageKind::System | MessageKind::Nudge => {
                return Err(ChatError::InvalidArgument(format!(
                    "{} messages cannot be posted directly",
                    kind
                )));
            }
            MessageKind::Image => {}
            _ if text.trim().is_empty() => {
                return Err(ChatError::InvalidArgument("message text is required".into()));
            }
            _ => {}
        }

        let room = self.rooms.require_visible(author, room_id)?;

        let message = self.db.with_tx(|conn| -> ChatResult<ChatMessage> {
            let moderated_author = directory::get_user(conn, author)?
                .map(|u| !u.is_unmoderated())
                .unwrap_or(true);

            let review_required = match kind {
                // Follow-ups queue behind whatever is already awaiting review.
                MessageKind::ModMail => messages::has_other_pending(conn, room_id, None)?,
                _ => moderated_author && room.chat_type == RoomType::User2User,
            };

            let now = Utc::now();
            let id = messages::insert_message(
                conn,
                &NewMessage {
                    room_id,
                    user_id: author,
                    kind,
                    message: text,
                    ref_item_type: None,
                    created_at: now,
                    review_required,
                    reply_expected: false,
                },
            )?;

            messages::mark_replied(conn, room_id, author, id)?;
            rooms::recount_messages(conn, room_id, now)?;

            // Authors have read everything up to their own message.
            let seen = roster::advance_watermark(conn, room_id, author, id, false, now)?;
            roster::mark_seen_by_all(conn, room_id, seen)?;

            messages::get_message(conn, id)?.ok_or_else(|| ChatError::message_not_found(id))
        })?;

        info!(
            "User {} posted message {} in room {} ({:?})",
            author,
            message.id,
            room_id,
            message.review_state()
        );
        Ok(message)
    }

    /// Newest-first page of what `caller` can read in the room.
    pub fn list(
        &self,
        room_id: RoomId,
        caller: UserId,
        before: Option<MessageId>,
        limit: i64,
    ) -> ChatResult<Vec<ChatMessage>> {
        self.rooms.require_visible(caller, room_id)?;
        let limit = clamp_limit(limit);
        Ok(self
            .db
            .with_conn(|conn| messages::list_for_viewer(conn, room_id, caller, before, limit))?)
    }

    /// Soft-deletes the caller's own message.
    pub fn delete(&self, message: MessageId, caller: UserId) -> ChatResult<()> {
        self.db.with_tx(|conn| -> ChatResult<()> {
            let msg = messages::get_message(conn, message)?
                .filter(|m| !m.deleted)
                .ok_or_else(|| ChatError::message_not_found(message))?;
            if msg.user_id != caller {
                return Err(ChatError::Forbidden(format!(
                    "message {} belongs to another user",
                    message
                )));
            }

            messages::soft_delete(conn, message)?;
            rooms::recount_messages(conn, msg.room_id, Utc::now())?;
            Ok(())
        })?;

        info!("User {} deleted message {}", caller, message);
        Ok(())
    }

    /// Lets the author flag whether their message is waiting on an answer.
    pub fn set_reply_expected(
        &self,
        message: MessageId,
        caller: UserId,
        expected: bool,
    ) -> ChatResult<ChatMessage> {
        let updated = self.db.with_tx(|conn| -> ChatResult<ChatMessage> {
            let msg = messages::get_message(conn, message)?
                .filter(|m| !m.deleted)
                .ok_or_else(|| ChatError::message_not_found(message))?;
            if msg.user_id != caller {
                return Err(ChatError::Forbidden(format!(
                    "message {} belongs to another user",
                    message
                )));
            }

            messages::set_reply_expected(conn, message, expected)?;
            messages::get_message(conn, message)?.ok_or_else(|| ChatError::message_not_found(message))
        })?;

        debug!("User {} set reply_expected={} on message {}", caller, expected, message);
        Ok(updated)
    }
}
