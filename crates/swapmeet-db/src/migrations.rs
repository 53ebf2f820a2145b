use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Member and group data is owned by the membership service and
        -- mirrored here read-mostly.
        CREATE TABLE IF NOT EXISTS users (
            id                  INTEGER PRIMARY KEY,
            firstname           TEXT,
            lastname            TEXT,
            fullname            TEXT,
            deleted_at          TEXT,
            chat_mod_status     TEXT NOT NULL DEFAULT 'Moderated',
            profile_image_id    INTEGER,
            use_profile         INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS community_groups (
            id          INTEGER PRIMARY KEY,
            nameshort   TEXT NOT NULL,
            namefull    TEXT,
            image_id    INTEGER
        );

        CREATE TABLE IF NOT EXISTS memberships (
            user_id     INTEGER NOT NULL REFERENCES users(id),
            group_id    INTEGER NOT NULL REFERENCES community_groups(id),
            role        TEXT NOT NULL DEFAULT 'Member',
            PRIMARY KEY (user_id, group_id)
        );

        CREATE INDEX IF NOT EXISTS idx_memberships_group
            ON memberships(group_id, role);

        CREATE TABLE IF NOT EXISTS chat_rooms (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_type           TEXT NOT NULL,
            user1               INTEGER REFERENCES users(id),
            user2               INTEGER REFERENCES users(id),
            group_id            INTEGER REFERENCES community_groups(id),
            latest_message_at   TEXT NOT NULL,
            msg_valid           INTEGER NOT NULL DEFAULT 0,
            msg_invalid         INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_rooms_user1 ON chat_rooms(user1, user2, chat_type);
        CREATE INDEX IF NOT EXISTS idx_rooms_user2 ON chat_rooms(user2, chat_type);
        CREATE INDEX IF NOT EXISTS idx_rooms_group ON chat_rooms(group_id, chat_type);

        -- AUTOINCREMENT so ids are never reused: message order is id order.
        CREATE TABLE IF NOT EXISTS chat_messages (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            room_id                 INTEGER NOT NULL REFERENCES chat_rooms(id),
            user_id                 INTEGER NOT NULL REFERENCES users(id),
            kind                    TEXT NOT NULL DEFAULT 'Default',
            message                 TEXT NOT NULL DEFAULT '',
            ref_item_type           TEXT,
            created_at              TEXT NOT NULL,
            review_required         INTEGER NOT NULL DEFAULT 0,
            review_rejected         INTEGER NOT NULL DEFAULT 0,
            reviewed_by             INTEGER REFERENCES users(id),
            report_reason           TEXT,
            processing_successful   INTEGER NOT NULL DEFAULT 1,
            seen_by_all             INTEGER NOT NULL DEFAULT 0,
            mailed_to_all           INTEGER NOT NULL DEFAULT 0,
            reply_expected          INTEGER NOT NULL DEFAULT 0,
            reply_received          INTEGER NOT NULL DEFAULT 0,
            deleted                 INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_messages_room
            ON chat_messages(room_id, id);

        CREATE INDEX IF NOT EXISTS idx_messages_review
            ON chat_messages(review_required, review_rejected, id);

        CREATE INDEX IF NOT EXISTS idx_messages_flood
            ON chat_messages(review_required, created_at);

        CREATE TABLE IF NOT EXISTS message_holds (
            message_id  INTEGER PRIMARY KEY REFERENCES chat_messages(id),
            held_by     INTEGER NOT NULL REFERENCES users(id),
            held_at     TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chat_roster (
            room_id         INTEGER NOT NULL REFERENCES chat_rooms(id),
            user_id         INTEGER NOT NULL REFERENCES users(id),
            status          TEXT NOT NULL DEFAULT 'Online',
            last_msg_seen   INTEGER,
            last_typing_at  TEXT,
            last_ip         TEXT,
            updated_at      TEXT NOT NULL,
            PRIMARY KEY (room_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_roster_user
            ON chat_roster(user_id, room_id);

        CREATE TABLE IF NOT EXISTS user_nudges (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            from_user   INTEGER NOT NULL REFERENCES users(id),
            to_user     INTEGER REFERENCES users(id),
            created_at  TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
