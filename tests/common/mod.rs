// =============================================================================
// Matrixon Timeline - Integration Test Fixtures
// =============================================================================
//
// Project: Matrixon - Ultra High Performance Matrix NextServer (Synapse Alternative)
// Author: arkSong (arksong2018@gmail.com) - Founder of Matrixon Innovation Project
// Contributors: Matrixon Development Team
// Date: 2024-12-11
// Version: 0.11.0-alpha
// License: Apache 2.0 / MIT
//
// =============================================================================

#![allow(dead_code)]

use matrixon_timeline::{
    ruma::{
        events::room::member::{MembershipState, RoomMemberEventContent},
        room_id, RoomId, UserId,
    },
    Event,
};
use serde_json::json;

pub fn room() -> &'static RoomId {
    room_id!("!integration:matrixon.local")
}

/// Builds an event the way the sync pipeline hands it over.
pub fn sync_message(event_id: &str, sender: &UserId, origin_server_ts: u64) -> Event {
    Event::from_sync_json(
        room(),
        json!({
            "event_id": event_id,
            "sender": sender,
            "type": "m.room.message",
            "origin_server_ts": origin_server_ts,
            "content": { "msgtype": "m.text", "body": event_id }
        }),
    )
    .expect("valid sync event")
}

pub fn sync_state(event_id: &str, kind: &str, state_key: &str, content: serde_json::Value) -> Event {
    Event::from_sync_json(
        room(),
        json!({
            "event_id": event_id,
            "sender": "@creator:matrixon.local",
            "type": kind,
            "state_key": state_key,
            "origin_server_ts": 1u64,
            "content": content
        }),
    )
    .expect("valid sync state event")
}

pub fn member(display_name: &str) -> RoomMemberEventContent {
    let mut content = RoomMemberEventContent::new(MembershipState::Join);
    content.displayname = Some(display_name.to_owned());
    content
}
