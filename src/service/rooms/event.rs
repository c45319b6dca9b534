// =============================================================================
// Matrixon Timeline - Event Record Module
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
//   Immutable event records as delivered by sync or pagination. Timeline
//   entries and chunk state sets refer to these records by event id.
//
// =============================================================================

use ruma::{
    events::TimelineEventType, EventId, MilliSecondsSinceUnixEpoch, OwnedEventId, OwnedRoomId,
    OwnedUserId, RoomId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// Direction in which a batch of events was fetched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaginationDirection {
    /// Towards newer events and the live edge of the room.
    Forwards,
    /// Towards older history.
    Backwards,
}

impl PaginationDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaginationDirection::Forwards => "forwards",
            PaginationDirection::Backwards => "backwards",
        }
    }
}

/// A room event. Never mutated once stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: OwnedEventId,
    pub room_id: OwnedRoomId,
    pub sender: OwnedUserId,
    #[serde(rename = "type")]
    pub kind: TimelineEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    /// Absent for local echoes that the server has not acknowledged yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_server_ts: Option<MilliSecondsSinceUnixEpoch>,
    #[serde(default)]
    pub content: JsonValue,
}

/// Shape of an event inside a sync or `/messages` response, where the room
/// id is implied by the enclosing section.
#[derive(Deserialize)]
struct SyncEvent {
    event_id: OwnedEventId,
    sender: OwnedUserId,
    #[serde(rename = "type")]
    kind: TimelineEventType,
    #[serde(default)]
    state_key: Option<String>,
    #[serde(default)]
    origin_server_ts: Option<MilliSecondsSinceUnixEpoch>,
    #[serde(default)]
    content: JsonValue,
}

impl Event {
    pub fn new(
        event_id: OwnedEventId,
        room_id: OwnedRoomId,
        sender: OwnedUserId,
        kind: TimelineEventType,
        content: JsonValue,
    ) -> Self {
        Self {
            event_id,
            room_id,
            sender,
            kind,
            state_key: None,
            origin_server_ts: None,
            content,
        }
    }

    pub fn with_state_key(mut self, state_key: impl Into<String>) -> Self {
        self.state_key = Some(state_key.into());
        self
    }

    pub fn with_origin_server_ts(mut self, origin_server_ts: MilliSecondsSinceUnixEpoch) -> Self {
        self.origin_server_ts = Some(origin_server_ts);
        self
    }

    /// Parses an event from a sync timeline or pagination chunk.
    ///
    /// Rejects events without a valid `event_id`, `sender` or `type`.
    pub fn from_sync_json(room_id: &RoomId, json: JsonValue) -> Result<Self> {
        let raw: SyncEvent = serde_json::from_value(json)
            .map_err(|e| Error::InvalidEvent(format!("malformed sync event: {e}")))?;

        Ok(Self {
            event_id: raw.event_id,
            room_id: room_id.to_owned(),
            sender: raw.sender,
            kind: raw.kind,
            state_key: raw.state_key,
            origin_server_ts: raw.origin_server_ts,
            content: raw.content,
        })
    }

    pub fn is_state(&self) -> bool {
        self.state_key.is_some()
    }
}

pub trait Data {
    /// Returns the stored event, if any.
    fn get_event(&self, room_id: &RoomId, event_id: &EventId) -> Result<Option<Event>>;

    /// Stores the event under `(room_id, event_id)`.
    fn put_event(&mut self, event: &Event) -> Result<()>;
}

/// Stores `event` unless a record with the same id already exists.
pub(crate) fn ensure_stored<D: Data + ?Sized>(db: &mut D, event: &Event) -> Result<()> {
    if db.get_event(&event.room_id, &event.event_id)?.is_none() {
        db.put_event(event)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruma::room_id;
    use serde_json::json;

    #[test]
    fn test_from_sync_json() {
        let event = Event::from_sync_json(
            room_id!("!room:matrixon.local"),
            json!({
                "event_id": "$topic:matrixon.local",
                "sender": "@alice:matrixon.local",
                "type": "m.room.topic",
                "state_key": "",
                "origin_server_ts": 1_700_000_000_000u64,
                "content": { "topic": "Chunks" }
            }),
        )
        .unwrap();

        assert_eq!(event.event_id.as_str(), "$topic:matrixon.local");
        assert_eq!(event.room_id.as_str(), "!room:matrixon.local");
        assert_eq!(event.kind, TimelineEventType::RoomTopic);
        assert_eq!(event.state_key.as_deref(), Some(""));
        assert!(event.is_state());
        assert!(event.origin_server_ts.is_some());
    }

    #[test]
    fn test_from_sync_json_without_timestamp() {
        let event = Event::from_sync_json(
            room_id!("!room:matrixon.local"),
            json!({
                "event_id": "$local:matrixon.local",
                "sender": "@alice:matrixon.local",
                "type": "m.room.message",
                "content": { "body": "pending", "msgtype": "m.text" }
            }),
        )
        .unwrap();

        assert!(event.origin_server_ts.is_none());
        assert!(!event.is_state());
    }

    #[test]
    fn test_from_sync_json_rejects_empty_event_id() {
        let result = Event::from_sync_json(
            room_id!("!room:matrixon.local"),
            json!({
                "event_id": "",
                "sender": "@alice:matrixon.local",
                "type": "m.room.message",
                "content": {}
            }),
        );

        assert!(matches!(result, Err(Error::InvalidEvent(_))));
    }
}
