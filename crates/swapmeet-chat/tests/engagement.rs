mod common;

use chrono::{Duration, Utc};

use common::*;
use swapmeet_types::events::ChatEvent;
use swapmeet_types::models::MessageKind;

fn nudges_in(f: &Fixture, room: i64) -> i64 {
    f.db
        .with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM chat_messages WHERE room_id = ?1 AND kind = 'Nudge'",
                [room],
                |r| r.get(0),
            )?)
        })
        .unwrap()
}

#[test]
fn repeated_nudges_collapse() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);
    f.approved(room.id, BOB, "I can collect tomorrow");
    let mut events = f.chat.events.subscribe();

    let first = f.chat.engagement.nudge(room.id, ANN).unwrap();
    let second = f.chat.engagement.nudge(room.id, ANN).unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.id, second.id);
    assert_eq!(nudges_in(&f, room.id), 1);

    let nudge = f.message(first.id);
    assert_eq!(nudge.kind, MessageKind::Nudge);
    assert!(nudge.reply_expected);

    match events.try_recv().unwrap() {
        ChatEvent::Nudged { from_user, to_user, .. } => {
            assert_eq!(from_user, ANN);
            assert_eq!(to_user, Some(BOB));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(events.try_recv().is_err());
}

#[test]
fn a_reply_answers_the_nudge_and_allows_another() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);

    let first = f.chat.engagement.nudge(room.id, ANN).unwrap();
    f.chat
        .messages
        .post(room.id, BOB, "sorry, been busy", MessageKind::Default)
        .unwrap();
    assert!(f.message(first.id).reply_received);

    let second = f.chat.engagement.nudge(room.id, ANN).unwrap();
    assert!(second.created);
    assert_ne!(first.id, second.id);
    assert_eq!(nudges_in(&f, room.id), 2);
}

#[test]
fn nudges_count_as_room_activity() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);
    let before = f.room(room.id);

    f.chat.engagement.nudge(room.id, BOB).unwrap();

    let after = f.room(room.id);
    assert_eq!(after.msg_valid, before.msg_valid + 1);
    assert!(after.latest_message_at >= before.latest_message_at);
}

#[test]
fn typing_pushes_back_recent_unmailed_messages() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);
    let recent_at = Utc::now() - Duration::seconds(10);
    let recent = f.insert(room.id, ANN, "just now", MessageKind::Default, false, recent_at);
    let old = f.insert(
        room.id,
        ANN,
        "an hour ago",
        MessageKind::Default,
        false,
        Utc::now() - Duration::hours(1),
    );

    let delayed = f.chat.engagement.typing(room.id, BOB).unwrap();
    assert_eq!(delayed, 1);
    assert!(f.message(recent).created_at > recent_at);
    assert!(f.message(old).created_at < recent_at);
}

#[test]
fn moderators_may_type_in_group_rooms() {
    let f = fixture();
    let room = f.group_room(swapmeet_types::models::RoomType::User2Mod, Some(ANN), NORTH);
    assert_eq!(f.chat.engagement.typing(room.id, MOD_B).unwrap(), 0);
    assert!(f.chat.engagement.typing(room.id, CAT).is_err());
}
