use anyhow::Result;

use swapmeet_db::Database;
use swapmeet_db::queries::directory;
use swapmeet_types::models::{GroupId, UserId};

/// Group moderation standing, owned by the membership service.
pub trait ModeratorDirectory: Send + Sync {
    fn is_moderator_of(&self, user: UserId, group: GroupId) -> Result<bool>;

    fn moderated_groups(&self, user: UserId) -> Result<Vec<GroupId>>;

    /// True when `user` moderates at least one of `groups`.
    fn moderates_any(&self, user: UserId, groups: &[GroupId]) -> Result<bool> {
        for group in groups {
            if self.is_moderator_of(user, *group)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Reads standing from the mirrored membership table.
impl ModeratorDirectory for Database {
    fn is_moderator_of(&self, user: UserId, group: GroupId) -> Result<bool> {
        self.with_conn(|conn| directory::is_moderator_of(conn, user, group))
    }

    fn moderated_groups(&self, user: UserId) -> Result<Vec<GroupId>> {
        self.with_conn(|conn| directory::moderated_groups(conn, user))
    }
}
