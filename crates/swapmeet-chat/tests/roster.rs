mod common;

use common::*;
use swapmeet_chat::Watermark;
use swapmeet_types::models::RosterStatus;

#[test]
fn seen_by_all_follows_the_slowest_reader() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);
    let first = f.approved(room.id, ANN, "sofa available");
    let second = f.approved(room.id, ANN, "collection after 5pm");
    let reply = f.approved(room.id, BOB, "I'd love it");

    assert_eq!(f.chat.roster.unseen_count(room.id, BOB).unwrap(), 2);
    assert_eq!(f.chat.roster.unseen_count(room.id, ANN).unwrap(), 1);

    f.chat.roster.advance_watermark(room.id, BOB, first, false).unwrap();
    assert!(f.message(first).seen_by_all);
    assert!(!f.message(second).seen_by_all);
    assert_eq!(f.chat.roster.unseen_count(room.id, BOB).unwrap(), 1);

    f.chat.roster.advance_watermark(room.id, BOB, reply, false).unwrap();
    assert!(f.message(second).seen_by_all);
    // Bob's own reply waits for Ann
    assert!(!f.message(reply).seen_by_all);

    f.chat.roster.advance_watermark(room.id, ANN, reply, false).unwrap();
    assert!(f.message(reply).seen_by_all);
}

#[test]
fn seen_by_all_never_reverts() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);
    let first = f.approved(room.id, ANN, "one");
    let second = f.approved(room.id, ANN, "two");

    f.chat.roster.advance_watermark(room.id, BOB, second, false).unwrap();
    assert!(f.message(second).seen_by_all);

    let stored = f.chat.roster.advance_watermark(room.id, BOB, first, true).unwrap();
    assert_eq!(stored, first);
    assert!(f.message(second).seen_by_all);
    assert_eq!(f.chat.roster.unseen_count(room.id, BOB).unwrap(), 1);
}

#[test]
fn watermark_only_moves_back_when_asked() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);

    let update = f
        .chat
        .roster
        .update_presence(room.id, ANN, None, Some(Watermark { message: 5, allow_back: false }), None)
        .unwrap();
    let ann = update.roster.iter().find(|e| e.user_id == ANN).unwrap();
    assert_eq!(ann.last_msg_seen, Some(5));

    let update = f
        .chat
        .roster
        .update_presence(room.id, ANN, None, Some(Watermark { message: 3, allow_back: false }), None)
        .unwrap();
    let ann = update.roster.iter().find(|e| e.user_id == ANN).unwrap();
    assert_eq!(ann.last_msg_seen, Some(5));
}

#[test]
fn closing_does_not_unblock() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);

    f.chat
        .roster
        .update_presence(room.id, ANN, Some(RosterStatus::Blocked), None, None)
        .unwrap();
    let update = f
        .chat
        .roster
        .update_presence(room.id, ANN, Some(RosterStatus::Closed), None, None)
        .unwrap();
    let ann = update.roster.iter().find(|e| e.user_id == ANN).unwrap();
    assert_eq!(ann.status, RosterStatus::Blocked);

    let update = f
        .chat
        .roster
        .update_presence(room.id, ANN, Some(RosterStatus::Online), None, None)
        .unwrap();
    let ann = update.roster.iter().find(|e| e.user_id == ANN).unwrap();
    assert_eq!(ann.status, RosterStatus::Online);
}

#[test]
fn moderators_join_group_rooms_through_presence() {
    let f = fixture();
    let room = f.group_room(swapmeet_types::models::RoomType::User2Mod, Some(ANN), NORTH);

    let update = f.chat.roster.update_presence(room.id, MOD_A, None, None, None).unwrap();
    assert!(update.roster.iter().any(|e| e.user_id == MOD_A));

    assert!(f
        .chat
        .roster
        .update_presence(room.id, OUTSIDER_MOD, None, None, None)
        .is_err());
}
