//! Presentation rules shared by single-room and list reads: room names,
//! snippets and icon sources. Pure functions over pre-fetched rows.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use swapmeet_db::models::{GroupRow, UserRow};
use swapmeet_types::models::{GroupId, IconSource, MessageKind, Room, RoomType, UserId};

const SNIPPET_CHARS: usize = 30;

lazy_static! {
    // Names carry a "-g<group>" tag when an account was created through a
    // group's own signup page.
    static ref GROUP_TAG: Regex = Regex::new(r"^([\s\S]+?)-g[0-9]+$").unwrap();

    // Emoji arrive from clients encoded as \u....\u/ runs.
    static ref ENCODED_EMOJI: Regex = Regex::new(r"\\u.*?\\u/").unwrap();
}

pub fn strip_group_tag(name: &str) -> String {
    GROUP_TAG.replace(name, "$1").into_owned()
}

/// Name for a member as seen by others. Closed accounts are anonymised.
pub fn user_name(user: Option<&UserRow>, id: UserId) -> String {
    match user {
        Some(u) if !u.deleted => strip_group_tag(&u.display_name()),
        _ => format!("Deleted User #{}", id),
    }
}

/// The member on the far side of the room from `me`. Mod2Mod rooms have
/// no single counterpart.
pub fn other_user(room: &Room, me: UserId) -> Option<UserId> {
    match room.chat_type {
        RoomType::Mod2Mod => None,
        RoomType::User2Mod => room.user1.filter(|u| *u != me),
        RoomType::User2User | RoomType::Group => room.other_participant(me),
    }
}

pub fn room_name(
    room: &Room,
    perspective: UserId,
    users: &HashMap<UserId, UserRow>,
    groups: &HashMap<GroupId, GroupRow>,
) -> String {
    let group = room.group_id.and_then(|g| groups.get(&g));

    match room.chat_type {
        RoomType::User2Mod => group
            .map(|g| {
                let name = g.namefull.as_deref().filter(|n| !n.is_empty()).unwrap_or(&g.nameshort);
                format!("{} Volunteers", name)
            })
            .unwrap_or_default(),
        RoomType::Mod2Mod => group
            .map(|g| format!("{} Mods", g.nameshort))
            .unwrap_or_default(),
        RoomType::User2User | RoomType::Group => match other_user(room, perspective) {
            Some(other) => user_name(users.get(&other), other),
            None => group
                .map(|g| g.namefull.clone().unwrap_or_else(|| g.nameshort.clone()))
                .unwrap_or_default(),
        },
    }
}

fn without_emoji(text: &str) -> String {
    let stripped = ENCODED_EMOJI.replace_all(text, "");
    if stripped.is_empty() {
        // Emoji only: let the client render them.
        text.to_string()
    } else {
        stripped.into_owned()
    }
}

fn truncate_chars(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    }
}

/// One-line preview of the last message in a room.
pub fn snippet(kind: MessageKind, text: &str, ref_item_type: Option<&str>) -> String {
    match kind {
        MessageKind::Address => "Address sent".to_string(),
        MessageKind::Nudge => "Nudged".to_string(),
        MessageKind::Completed => {
            if ref_item_type == Some("Offer") {
                if text.is_empty() {
                    "Item marked as TAKEN".to_string()
                } else {
                    truncate_chars(without_emoji(text), SNIPPET_CHARS)
                }
            } else {
                "Item marked as RECEIVED".to_string()
            }
        }
        MessageKind::Promised => "Item promised".to_string(),
        MessageKind::Reneged => "Promise cancelled".to_string(),
        MessageKind::Image => "Image".to_string(),
        _ => truncate_chars(without_emoji(text), SNIPPET_CHARS),
    }
}

pub fn icon_for(
    room: &Room,
    perspective: UserId,
    users: &HashMap<UserId, UserRow>,
    groups: &HashMap<GroupId, GroupRow>,
) -> IconSource {
    if room.chat_type == RoomType::User2Mod {
        return room
            .group_id
            .and_then(|g| groups.get(&g))
            .and_then(|g| g.image_id)
            .filter(|id| *id > 0)
            .map(IconSource::Group)
            .unwrap_or(IconSource::Default);
    }

    other_user(room, perspective)
        .and_then(|id| users.get(&id))
        .filter(|u| !u.deleted && u.use_profile)
        .and_then(|u| u.profile_image_id)
        .filter(|id| *id > 0)
        .map(IconSource::User)
        .unwrap_or(IconSource::Default)
}
