// =============================================================================
// Matrixon Timeline - Test Utils Module
// =============================================================================
//
// Project: Matrixon - Ultra High Performance Matrix NextServer (Synapse Alternative)
// Author: arkSong (arksong2018@gmail.com) - Founder of Matrixon Innovation Project
// Contributors: Matrixon Development Team
// Date: 2024-12-11
// Version: 0.11.0-alpha
// License: Apache 2.0 / MIT
//
// Description:
//   Fixtures shared by the unit tests: a detached transaction, a fixed
//   room, event builders and linked chunk chains.
//
// =============================================================================

use ruma::{
    events::{
        room::member::{MembershipState, RoomMemberEventContent},
        TimelineEventType,
    },
    room_id, user_id, EventId, MilliSecondsSinceUnixEpoch, RoomId, UInt, UserId,
};
use serde_json::json;

use crate::{
    database::Transaction,
    service::rooms::chunks::{self, Chunk, Data as _},
    Event,
};

/// A transaction over an empty store that is never committed.
pub type TestDb = Transaction<'static>;

pub fn room() -> &'static RoomId {
    room_id!("!room:matrixon.local")
}

pub fn ts(ms: u64) -> MilliSecondsSinceUnixEpoch {
    MilliSecondsSinceUnixEpoch(UInt::try_from(ms).expect("timestamp fits in UInt"))
}

/// A text message in [`room`].
pub fn message(event_id: &str, sender: &UserId, origin_server_ts: Option<u64>) -> Event {
    let event = Event::new(
        EventId::parse(event_id).expect("valid event id"),
        room().to_owned(),
        sender.to_owned(),
        TimelineEventType::RoomMessage,
        json!({ "msgtype": "m.text", "body": event_id }),
    );
    match origin_server_ts {
        Some(ms) => event.with_origin_server_ts(ts(ms)),
        None => event,
    }
}

/// A state event in [`room`] sent by the room creator.
pub fn state_event(event_id: &str, kind: TimelineEventType, state_key: &str) -> Event {
    Event::new(
        EventId::parse(event_id).expect("valid event id"),
        room().to_owned(),
        user_id!("@creator:matrixon.local").to_owned(),
        kind,
        json!({}),
    )
    .with_state_key(state_key)
    .with_origin_server_ts(ts(1))
}

/// Joined member content with a display name.
pub fn member(display_name: &str) -> RoomMemberEventContent {
    let mut content = RoomMemberEventContent::new(MembershipState::Join);
    content.displayname = Some(display_name.to_owned());
    content
}

/// `len` chunks of [`room`] linked oldest first, re-read after linking.
pub fn chunk_chain(db: &mut TestDb, len: usize) -> Vec<Chunk> {
    let ids: Vec<_> = (0..len)
        .map(|_| chunks::create_chunk(db, room(), None, None).expect("chunk created").id)
        .collect();
    for pair in ids.windows(2) {
        chunks::link_chunks(db, pair[0], pair[1]).expect("chunks linked");
    }
    ids.into_iter()
        .map(|id| db.get_chunk(id).expect("chunk readable").expect("chunk exists"))
        .collect()
}
