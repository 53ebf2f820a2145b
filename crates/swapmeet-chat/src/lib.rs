pub mod aggregation;
pub mod directory;
pub mod display;
pub mod engagement;
pub mod error;
pub mod events;
pub mod messages;
pub mod moderation;
pub mod redact;
pub mod review;
pub mod rooms;
pub mod roster;

use std::sync::Arc;
use std::time::Duration;

use swapmeet_db::Database;
use swapmeet_types::events::ChatEvent;
use swapmeet_types::models::{Room, UserId};

pub use aggregation::{AggregationService, RoomFilters, RoomPage};
pub use directory::ModeratorDirectory;
pub use engagement::{EngagementTracker, NudgeOutcome};
pub use error::{ChatError, ChatResult};
pub use events::EventBus;
pub use messages::MessageService;
pub use moderation::{ModerationAction, ModerationEngine, ModerationOutcome};
pub use review::{ReviewPage, ReviewQueue};
pub use rooms::RoomStore;
pub use roster::{PresenceUpdate, RosterManager, Watermark};

/// Every chat component wired to one store, directory and event bus.
#[derive(Clone)]
pub struct ChatService {
    pub rooms: RoomStore,
    pub roster: RosterManager,
    pub review: ReviewQueue,
    pub moderation: ModerationEngine,
    pub engagement: EngagementTracker,
    pub aggregation: AggregationService,
    pub messages: MessageService,
    pub events: EventBus,
}

impl ChatService {
    pub fn new(
        db: Arc<Database>,
        directory: Arc<dyn ModeratorDirectory>,
        events: EventBus,
        aggregation_timeout: Duration,
    ) -> Self {
        let rooms = RoomStore::new(db.clone(), directory.clone());
        Self {
            roster: RosterManager::new(rooms.clone()),
            review: ReviewQueue::new(db, directory),
            moderation: ModerationEngine::new(rooms.clone(), events.clone()),
            engagement: EngagementTracker::new(rooms.clone(), events.clone()),
            aggregation: AggregationService::new(rooms.clone(), aggregation_timeout),
            messages: MessageService::new(rooms.clone()),
            rooms,
            events,
        }
    }

    /// Service backed by the mirrored membership table for standing.
    pub fn with_database(db: Arc<Database>, events: EventBus, aggregation_timeout: Duration) -> Self {
        let directory: Arc<dyn ModeratorDirectory> = db.clone();
        Self::new(db, directory, events, aggregation_timeout)
    }

    /// Opens (or reopens) the caller's direct room with `other` and
    /// announces it.
    pub fn open_direct_room(&self, caller: UserId, other: UserId) -> ChatResult<(Room, bool)> {
        let (room, created) = self.rooms.resolve_or_create_direct_room(caller, other)?;
        self.events.publish(ChatEvent::DirectRoomOpened {
            room_id: room.id,
            user_id: caller,
            other_user_id: other,
            created,
        });
        Ok((room, created))
    }
}
