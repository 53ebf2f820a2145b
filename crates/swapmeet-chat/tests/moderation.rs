mod common;

use chrono::{Duration, Utc};

use common::*;
use swapmeet_chat::{ChatError, ModerationAction};
use swapmeet_db::queries::holds;
use swapmeet_types::events::ChatEvent;
use swapmeet_types::models::{MessageKind, ReviewState, RoomType};

use ModerationAction::*;

#[test]
fn foreign_hold_blocks_exclusive_transitions() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);
    let msg = f.pending(room.id, ANN, "hello there");

    f.chat.moderation.apply(msg, MOD_A, Hold, None).unwrap();

    for action in [Hold, Approve, ApproveAllFuture, Reject, Redact] {
        let err = f.chat.moderation.apply(msg, MOD_B, action, None).unwrap_err();
        assert!(matches!(err, ChatError::Conflict(_)), "{action} should conflict, got {err:?}");
    }
    assert_eq!(f.message(msg).review_state(), ReviewState::Pending);

    let outcome = f.chat.moderation.apply(msg, MOD_A, Approve, None).unwrap();
    assert!(outcome.changed);
    assert_eq!(f.message(msg).review_state(), ReviewState::Approved);

    // Hold is cleared by the decision
    let hold = f.db.with_conn(|conn| holds::holder(conn, msg)).unwrap();
    assert_eq!(hold, None);
}

#[test]
fn re_hold_by_the_same_moderator_is_a_no_op() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);
    let msg = f.pending(room.id, ANN, "hello");

    let mut events = f.chat.events.subscribe();
    let first = f.chat.moderation.apply(msg, MOD_A, Hold, None).unwrap();
    assert!(first.changed);
    let second = f.chat.moderation.apply(msg, MOD_A, Hold, None).unwrap();
    assert!(!second.changed);

    let hold = f.db.with_conn(|conn| holds::holder(conn, msg)).unwrap();
    assert_eq!(hold, Some(MOD_A));

    assert!(matches!(events.try_recv().unwrap(), ChatEvent::MessageHeld { .. }));
    assert!(events.try_recv().is_err());
}

#[test]
fn release_is_permissive() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);
    let msg = f.pending(room.id, ANN, "hello");

    f.chat.moderation.apply(msg, MOD_A, Hold, None).unwrap();
    let released = f.chat.moderation.apply(msg, MOD_B, Release, None).unwrap();
    assert!(released.changed);

    f.chat.moderation.apply(msg, MOD_B, Hold, None).unwrap();
    let again = f.chat.moderation.apply(msg, MOD_B, Release, None).unwrap();
    assert!(again.changed);
    let idle = f.chat.moderation.apply(msg, MOD_B, Release, None).unwrap();
    assert!(!idle.changed);
}

#[test]
fn decided_messages_cannot_be_decided_again() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);
    let approved = f.pending(room.id, ANN, "first");
    let rejected = f.pending(room.id, ANN, "second");

    f.chat.moderation.apply(approved, MOD_A, Approve, None).unwrap();
    f.chat.moderation.apply(rejected, MOD_A, Reject, Some("spam")).unwrap();

    for (id, action) in [
        (approved, Approve),
        (approved, Reject),
        (approved, Hold),
        (approved, Redact),
        (rejected, Approve),
        (rejected, Reject),
    ] {
        let err = f.chat.moderation.apply(id, MOD_A, action, None).unwrap_err();
        assert!(matches!(err, ChatError::NotFound(_)), "{action} on {id}: {err:?}");
    }

    let stored = f.message(rejected);
    assert_eq!(stored.review_state(), ReviewState::Rejected);
    assert_eq!(stored.report_reason.as_deref(), Some("spam"));
}

#[test]
fn standing_is_required() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);
    let msg = f.pending(room.id, ANN, "hello");

    let err = f.chat.moderation.apply(msg, OUTSIDER_MOD, Approve, None).unwrap_err();
    assert!(matches!(err, ChatError::Forbidden(_)));
    let err = f.chat.moderation.apply(msg, CAT, Hold, None).unwrap_err();
    assert!(matches!(err, ChatError::Forbidden(_)));
    let err = f.chat.moderation.apply(999_999, MOD_A, Approve, None).unwrap_err();
    assert!(matches!(err, ChatError::NotFound(_)));
}

#[test]
fn counters_track_every_transition() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);
    let ids: Vec<_> = (0..6).map(|i| f.pending(room.id, ANN, &format!("message {i}"))).collect();
    f.approved(room.id, BOB, "reply");

    let plan = [Approve, Reject, Approve, Reject, ApproveAllFuture];
    for (id, action) in ids.iter().zip(plan) {
        f.chat.moderation.apply(*id, MOD_A, action, None).unwrap();
        let r = f.room(room.id);
        assert_eq!(r.msg_valid + r.msg_invalid, f.live_messages(room.id));
    }

    let r = f.room(room.id);
    // Three approvals plus Bob's reply; two rejected plus one still pending
    assert_eq!((r.msg_valid, r.msg_invalid), (4, 3));
}

#[test]
fn mod2mod_rooms_never_count_invalid() {
    let f = fixture();
    let room = f.group_room(RoomType::Mod2Mod, Some(MOD_A), NORTH);
    let a = f.pending(room.id, MOD_A, "one");
    let b = f.pending(room.id, MOD_A, "two");
    f.pending(room.id, MOD_A, "three");

    f.chat.moderation.apply(a, MOD_B, Approve, None).unwrap();
    f.chat.moderation.apply(b, MOD_B, Reject, None).unwrap();

    let r = f.room(room.id);
    assert_eq!(r.msg_invalid, 0);
    assert_eq!(r.msg_valid, 1);
}

#[test]
fn rejecting_spam_sweeps_identical_copies_everywhere() {
    let f = fixture();
    let rooms = [
        f.direct_room(ANN, BOB),
        f.direct_room(CAT, DAN),
        f.direct_room(ANN, CAT),
    ];
    let an_hour_ago = Utc::now() - Duration::minutes(50);
    let ids: Vec<_> = rooms
        .iter()
        .map(|r| f.insert(r.id, ANN, "Buy now!!!", MessageKind::Default, true, an_hour_ago))
        .collect();
    let unrelated = f.pending(rooms[0].id, ANN, "Is the bike still available?");

    let mut events = f.chat.events.subscribe();
    let outcome = f.chat.moderation.apply(ids[0], MOD_A, Reject, None).unwrap();

    let mut swept = outcome.swept.clone();
    swept.sort_unstable();
    assert_eq!(swept, vec![ids[1], ids[2]]);

    let mut recounted = outcome.rooms_recounted.clone();
    recounted.sort_unstable();
    let mut expected: Vec<_> = rooms.iter().map(|r| r.id).collect();
    expected.sort_unstable();
    assert_eq!(recounted, expected);

    for id in &ids {
        assert_eq!(f.message(*id).review_state(), ReviewState::Rejected);
    }
    assert_eq!(f.message(unrelated).review_state(), ReviewState::Pending);

    for r in &rooms {
        let room = f.room(r.id);
        assert_eq!(room.msg_valid + room.msg_invalid, f.live_messages(r.id));
        assert_eq!(room.msg_valid, 0);
    }

    match events.try_recv().unwrap() {
        ChatEvent::MessageRejected { message_id, swept, .. } => {
            assert_eq!(message_id, ids[0]);
            assert_eq!(swept.len(), 2);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn flood_sweep_ignores_old_copies() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);
    let fresh = f.pending(room.id, ANN, "Buy now!!!");
    let stale = f.insert(
        room.id,
        ANN,
        "Buy now!!!",
        MessageKind::Default,
        true,
        Utc::now() - Duration::hours(30),
    );

    let outcome = f.chat.moderation.apply(fresh, MOD_A, Reject, None).unwrap();
    assert!(outcome.swept.is_empty());
    assert_eq!(f.message(stale).review_state(), ReviewState::Pending);
}

#[test]
fn later_modmail_follows_the_decision() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);
    let earlier_mail = f.insert(room.id, MOD_A, "earlier", MessageKind::ModMail, true, Utc::now());
    let trigger = f.pending(room.id, ANN, "questionable");
    let mail = f.insert(room.id, MOD_A, "please be polite", MessageKind::ModMail, true, Utc::now());
    let other = f.pending(room.id, ANN, "another one");

    let outcome = f.chat.moderation.apply(trigger, MOD_A, Reject, None).unwrap();
    assert_eq!(outcome.cascaded, vec![mail]);

    assert_eq!(f.message(mail).review_state(), ReviewState::Approved);
    assert_eq!(f.message(earlier_mail).review_state(), ReviewState::Pending);
    assert_eq!(f.message(other).review_state(), ReviewState::Pending);
}

#[test]
fn approve_all_future_exempts_the_author() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);
    let first = f.chat.messages.post(room.id, ANN, "hi Bob", MessageKind::Default).unwrap();
    assert_eq!(first.review_state(), ReviewState::Pending);

    f.chat.moderation.apply(first.id, MOD_A, ApproveAllFuture, None).unwrap();

    let next = f.chat.messages.post(room.id, ANN, "still there?", MessageKind::Default).unwrap();
    assert_eq!(next.review_state(), ReviewState::Approved);
    assert!(f.db.get_user(ANN).unwrap().unwrap().is_unmoderated());
}

#[test]
fn redact_scrubs_addresses_and_ends_the_hold() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);
    let msg = f.pending(room.id, ANN, "email me on ann@example.org or call");

    f.chat.moderation.apply(msg, MOD_A, Hold, None).unwrap();
    let outcome = f.chat.moderation.apply(msg, MOD_A, Redact, None).unwrap();
    assert!(outcome.changed);

    let stored = f.message(msg);
    assert_eq!(stored.message, "email me on (email removed) or call");
    assert_eq!(stored.review_state(), ReviewState::Pending);
    let hold = f.db.with_conn(|conn| holds::holder(conn, msg)).unwrap();
    assert_eq!(hold, None);

    // Another moderator can now decide it
    let approved = f.chat.moderation.apply(msg, MOD_B, Approve, None).unwrap();
    assert!(approved.changed);
    assert_eq!(f.message(msg).review_state(), ReviewState::Approved);
}

#[test]
fn redact_with_nothing_to_scrub_keeps_the_hold() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);
    let msg = f.pending(room.id, ANN, "is the lamp still free?");

    f.chat.moderation.apply(msg, MOD_A, Hold, None).unwrap();
    let outcome = f.chat.moderation.apply(msg, MOD_A, Redact, None).unwrap();
    assert!(!outcome.changed);

    let hold = f.db.with_conn(|conn| holds::holder(conn, msg)).unwrap();
    assert_eq!(hold, Some(MOD_A));
}

#[test]
fn group_owned_rooms_are_moderated_by_their_group() {
    let f = fixture();
    let room = f.group_room(RoomType::User2Mod, Some(ANN), NORTH);
    let msg = f.pending(room.id, ANN, "question for the volunteers");

    let err = f.chat.moderation.apply(msg, OUTSIDER_MOD, Hold, None).unwrap_err();
    assert!(matches!(err, ChatError::Forbidden(_)));
    f.chat.moderation.apply(msg, MOD_B, Approve, None).unwrap();
}

#[test]
fn concurrent_approvals_apply_once() {
    let f = fixture();
    let room = f.direct_room(ANN, BOB);
    let msg = f.pending(room.id, ANN, "race me");

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = [MOD_A, MOD_B]
            .into_iter()
            .map(|actor| {
                let engine = f.chat.moderation.clone();
                s.spawn(move || engine.apply(msg, actor, Approve, None))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, ChatError::NotFound(_))));
}
