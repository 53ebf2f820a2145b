use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::{Duration, Utc};
use rusqlite::Connection;
use tracing::{info, warn};

use swapmeet_db::Database;
use swapmeet_db::models::CHAT_MOD_UNMODERATED;
use swapmeet_db::queries::holds::{self, HoldClaim};
use swapmeet_db::queries::{directory, messages, review, rooms};
use swapmeet_types::events::ChatEvent;
use swapmeet_types::models::{ChatMessage, MessageId, ReviewState, RoomId, UserId};

use crate::error::{ChatError, ChatResult};
use crate::events::EventBus;
use crate::redact::redact_emails;
use crate::rooms::RoomStore;

/// Identical pending text within this window is treated as one flood.
const FLOOD_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Hold,
    Release,
    Approve,
    ApproveAllFuture,
    Reject,
    Redact,
}

impl ModerationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationAction::Hold => "Hold",
            ModerationAction::Release => "Release",
            ModerationAction::Approve => "Approve",
            ModerationAction::ApproveAllFuture => "ApproveAllFuture",
            ModerationAction::Reject => "Reject",
            ModerationAction::Redact => "Redact",
        }
    }
}

impl fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModerationAction {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Hold" => Ok(ModerationAction::Hold),
            "Release" => Ok(ModerationAction::Release),
            "Approve" => Ok(ModerationAction::Approve),
            "ApproveAllFuture" => Ok(ModerationAction::ApproveAllFuture),
            "Reject" => Ok(ModerationAction::Reject),
            "Redact" => Ok(ModerationAction::Redact),
            other => Err(ChatError::InvalidArgument(format!("unknown action: {}", other))),
        }
    }
}

/// What a moderation call changed.
#[derive(Debug, Clone)]
pub struct ModerationOutcome {
    pub action: ModerationAction,
    pub message_id: MessageId,
    /// False when the call was accepted but had nothing to do.
    pub changed: bool,
    /// ModMail follow-ups approved along with the decision.
    pub cascaded: Vec<MessageId>,
    /// Flood copies rejected along with the decision.
    pub swept: Vec<MessageId>,
    pub rooms_recounted: Vec<RoomId>,
}

impl ModerationOutcome {
    fn new(action: ModerationAction, message_id: MessageId, changed: bool) -> Self {
        Self {
            action,
            message_id,
            changed,
            cascaded: vec![],
            swept: vec![],
            rooms_recounted: vec![],
        }
    }
}

/// Review state transitions, holds and redaction.
#[derive(Clone)]
pub struct ModerationEngine {
    db: Arc<Database>,
    rooms: RoomStore,
    events: EventBus,
}

impl ModerationEngine {
    pub fn new(rooms: RoomStore, events: EventBus) -> Self {
        Self {
            db: rooms.db().clone(),
            rooms,
            events,
        }
    }

    pub fn apply(
        &self,
        message: MessageId,
        actor: UserId,
        action: ModerationAction,
        reason: Option<&str>,
    ) -> ChatResult<ModerationOutcome> {
        let msg = self
            .db
            .with_conn(|conn| messages::get_message(conn, message))?
            .filter(|m| !m.deleted)
            .ok_or_else(|| ChatError::message_not_found(message))?;

        let room = self.rooms.get(msg.room_id)?;
        let groups = self.rooms.associated_groups(&room)?;
        if !self.rooms.directory().moderates_any(actor, &groups)? {
            return Err(ChatError::Forbidden(format!(
                "not a moderator for message {}",
                message
            )));
        }

        let outcome = match action {
            ModerationAction::Hold => self.hold(&msg, actor)?,
            ModerationAction::Release => self.release(&msg, actor)?,
            ModerationAction::Approve => self.approve(&msg, actor, false)?,
            ModerationAction::ApproveAllFuture => self.approve(&msg, actor, true)?,
            ModerationAction::Reject => self.reject(&msg, actor, reason)?,
            ModerationAction::Redact => self.redact(&msg, actor)?,
        };

        info!(
            "Moderator {} applied {} to message {} (changed: {})",
            actor, action, message, outcome.changed
        );
        Ok(outcome)
    }

    fn hold(&self, msg: &ChatMessage, actor: UserId) -> ChatResult<ModerationOutcome> {
        let claim = self.db.with_tx(|conn| -> ChatResult<HoldClaim> {
            require_pending(conn, msg.id)?;
            match holds::acquire(conn, msg.id, actor, Utc::now())? {
                HoldClaim::HeldByOther(_) => Err(ChatError::Conflict(format!(
                    "message {} is held by another moderator",
                    msg.id
                ))),
                claim => Ok(claim),
            }
        })?;

        if claim == HoldClaim::AlreadyHeld {
            return Ok(ModerationOutcome::new(ModerationAction::Hold, msg.id, false));
        }

        self.events.publish(ChatEvent::MessageHeld {
            message_id: msg.id,
            moderator_id: actor,
        });
        Ok(ModerationOutcome::new(ModerationAction::Hold, msg.id, true))
    }

    /// Any moderator with standing may clear any hold.
    fn release(&self, msg: &ChatMessage, actor: UserId) -> ChatResult<ModerationOutcome> {
        let removed = self.db.with_conn_mut(|conn| holds::release(conn, msg.id))?;
        if removed > 0 {
            self.events.publish(ChatEvent::MessageReleased {
                message_id: msg.id,
                moderator_id: actor,
            });
        }
        Ok(ModerationOutcome::new(ModerationAction::Release, msg.id, removed > 0))
    }

    fn approve(&self, msg: &ChatMessage, actor: UserId, all_future: bool) -> ChatResult<ModerationOutcome> {
        let action = if all_future {
            ModerationAction::ApproveAllFuture
        } else {
            ModerationAction::Approve
        };

        let outcome = self.db.with_tx(|conn| -> ChatResult<ModerationOutcome> {
            if review::approve_if_unheld(conn, msg.id, actor)? == 0 {
                return Err(classify_refusal(conn, msg.id, actor)?);
            }

            let mut outcome = ModerationOutcome::new(action, msg.id, true);
            outcome.cascaded = review::approve_modmail_after(conn, msg.room_id, msg.id, actor)?;

            rooms::recount_messages(conn, msg.room_id, Utc::now())?;
            outcome.rooms_recounted.push(msg.room_id);
            holds::release(conn, msg.id)?;

            if all_future {
                directory::set_chat_mod_status(conn, msg.user_id, CHAT_MOD_UNMODERATED)?;
            }
            Ok(outcome)
        })?;

        self.events.publish(ChatEvent::MessageApproved {
            message_id: msg.id,
            room_id: msg.room_id,
            moderator_id: actor,
            all_future,
        });
        Ok(outcome)
    }

    fn reject(&self, msg: &ChatMessage, actor: UserId, reason: Option<&str>) -> ChatResult<ModerationOutcome> {
        let outcome = self.db.with_tx(|conn| -> ChatResult<ModerationOutcome> {
            if review::reject_if_unheld(conn, msg.id, actor, reason)? == 0 {
                return Err(classify_refusal(conn, msg.id, actor)?);
            }

            let mut outcome = ModerationOutcome::new(ModerationAction::Reject, msg.id, true);
            outcome.cascaded = review::approve_modmail_after(conn, msg.room_id, msg.id, actor)?;

            let now = Utc::now();
            let mut touched = vec![msg.room_id];

            // Blank bodies (images, nudges) are not spam copies of each other.
            if !msg.message.trim().is_empty() {
                let since = now - Duration::hours(FLOOD_WINDOW_HOURS);
                let copies = review::reject_flood_copies(conn, &msg.message, since, msg.id, actor)?;
                for (id, room) in copies {
                    outcome.swept.push(id);
                    touched.push(room);
                }
            }

            holds::release(conn, msg.id)?;
            holds::release_many(conn, &outcome.swept)?;

            touched.sort_unstable();
            touched.dedup();
            for room in &touched {
                rooms::recount_messages(conn, *room, now)?;
            }
            outcome.rooms_recounted = touched;
            Ok(outcome)
        })?;

        if !outcome.swept.is_empty() {
            warn!(
                "Rejecting message {} swept {} identical pending messages across {} rooms",
                msg.id,
                outcome.swept.len(),
                outcome.rooms_recounted.len()
            );
        }

        self.events.publish(ChatEvent::MessageRejected {
            message_id: msg.id,
            room_id: msg.room_id,
            moderator_id: actor,
            swept: outcome.swept.clone(),
        });
        Ok(outcome)
    }

    /// Scrubs addresses from a pending message and ends the hold. When there
    /// is nothing to scrub nothing is written and the hold stays.
    fn redact(&self, msg: &ChatMessage, actor: UserId) -> ChatResult<ModerationOutcome> {
        let changed = self.db.with_tx(|conn| -> ChatResult<bool> {
            let current = require_pending(conn, msg.id)?;
            if let Some(holder) = holds::holder(conn, msg.id)? {
                if holder != actor {
                    return Err(ChatError::Conflict(format!(
                        "message {} is held by another moderator",
                        msg.id
                    )));
                }
            }

            match redact_emails(&current.message) {
                Some(clean) => {
                    messages::update_text(conn, msg.id, &clean)?;
                    holds::release(conn, msg.id)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        })?;

        if changed {
            self.events.publish(ChatEvent::MessageRedacted {
                message_id: msg.id,
                moderator_id: actor,
            });
        }
        Ok(ModerationOutcome::new(ModerationAction::Redact, msg.id, changed))
    }
}

/// Loads the message and insists it is still awaiting review.
fn require_pending(conn: &Connection, id: MessageId) -> ChatResult<ChatMessage> {
    messages::get_message(conn, id)?
        .filter(|m| !m.deleted && m.review_state() == ReviewState::Pending)
        .ok_or_else(|| ChatError::NotFound(format!("message {} is not pending review", id)))
}

/// Works out why a guarded transition wrote nothing.
fn classify_refusal(conn: &Connection, id: MessageId, actor: UserId) -> ChatResult<ChatError> {
    require_pending(conn, id)?;
    match holds::holder(conn, id)? {
        Some(holder) if holder != actor => Ok(ChatError::Conflict(format!(
            "message {} is held by another moderator",
            id
        ))),
        _ => Ok(ChatError::Internal(anyhow!(
            "review transition for message {} did not apply",
            id
        ))),
    }
}
