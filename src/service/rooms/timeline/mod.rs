// =============================================================================
// Matrixon Timeline - Timeline Insertion Module
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
//   Inserts events into chunks. Each insertion assigns a chunk-local
//   display index, a room-wide local id, wires the read receipt summary and
//   annotations of the event, and stamps sender display metadata. Room
//   state is tracked separately per chunk and only moves forward.
//
// =============================================================================

use ruma::{EventId, OwnedEventId, OwnedMxcUri, OwnedRoomId, RoomId};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::{
    metrics,
    service::rooms::{
        self, annotations,
        annotations::EventAnnotationsSummary,
        chunks::{self, Chunk, ChunkId},
        edus::read_receipt::{self, ReadReceiptsSummary},
        event::{self, Event, PaginationDirection},
        state_cache::{self, MemberSnapshots},
    },
    Error, Result,
};

/// An event placed in one chunk of a room timeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEventEntry {
    /// Room-wide surrogate key, strictly increasing in insertion order.
    pub local_id: u64,
    pub event_id: OwnedEventId,
    pub room_id: OwnedRoomId,
    pub chunk_id: ChunkId,
    /// Position inside the chunk. Not comparable across chunks.
    pub display_index: i64,
    /// Key of the read receipt summary, `None` for thread-owned entries.
    pub read_receipts: Option<OwnedEventId>,
    /// Key of the annotations summary, if the event was annotated.
    pub annotations: Option<OwnedEventId>,
    pub sender_name: Option<String>,
    pub sender_avatar: Option<OwnedMxcUri>,
    pub is_unique_display_name: bool,
    pub owned_by_thread_chunk: bool,
}

impl TimelineEventEntry {
    /// The event record this entry wraps.
    pub fn event<D: event::Data + ?Sized>(&self, db: &D) -> Result<Event> {
        db.get_event(&self.room_id, &self.event_id)?
            .ok_or_else(|| Error::bad_database("Timeline entry references a missing event."))
    }

    pub fn read_receipts_summary<D: read_receipt::Data + ?Sized>(
        &self,
        db: &D,
    ) -> Result<Option<ReadReceiptsSummary>> {
        match &self.read_receipts {
            Some(event_id) => db.receipts_summary(&self.room_id, event_id),
            None => Ok(None),
        }
    }

    pub fn annotations_summary<D: annotations::Data + ?Sized>(
        &self,
        db: &D,
    ) -> Result<Option<EventAnnotationsSummary>> {
        match &self.annotations {
            Some(event_id) => db.annotations_summary(&self.room_id, event_id),
            None => Ok(None),
        }
    }
}

pub trait Data {
    /// Allocates the next local id of the room.
    fn next_local_id(&mut self, room_id: &RoomId) -> Result<u64>;

    fn timeline_event(&self, chunk_id: ChunkId, event_id: &EventId) -> Result<Option<TimelineEventEntry>>;

    /// Creates or replaces the entry under `(entry.chunk_id, entry.event_id)`.
    fn put_timeline_event(&mut self, entry: &TimelineEventEntry) -> Result<()>;

    /// Every entry of the chunk, sorted by display index.
    fn timeline_events(&self, chunk_id: ChunkId) -> Result<Vec<TimelineEventEntry>>;

    /// Lowest and highest display index of the chunk, `None` when empty.
    /// Kept up to date by `put_timeline_event`, so no entry is decoded.
    fn display_index_range(&self, chunk_id: ChunkId) -> Result<Option<(i64, i64)>>;
}

/// Display index for the next entry of `chunk_id`: one past the highest
/// going forwards, one before the lowest going backwards. An empty chunk
/// counts as holding index 0.
pub fn next_display_index<D: Data + ?Sized>(
    db: &D,
    chunk_id: ChunkId,
    direction: PaginationDirection,
) -> Result<i64> {
    let (low, high) = db.display_index_range(chunk_id)?.unwrap_or((0, 0));
    Ok(match direction {
        PaginationDirection::Forwards => high + 1,
        PaginationDirection::Backwards => low - 1,
    })
}

/// Places `event` in `chunk` with the next display index in `direction`
/// and picks up the annotations gathered for it.
///
/// Returns `None` without touching anything when the chunk already holds
/// the event. Callers must treat that as "already present". An event of
/// another room is rejected, since its record would be stored under a room
/// the entry does not point at.
#[instrument(level = "debug", skip_all, fields(chunk = %chunk.id, event = %event.event_id))]
pub fn attach_event<D>(
    db: &mut D,
    chunk: &Chunk,
    event: &Event,
    direction: PaginationDirection,
) -> Result<Option<TimelineEventEntry>>
where
    D: Data + annotations::Data + event::Data + ?Sized,
{
    if *event.room_id != *chunk.room_id {
        return Err(Error::InvalidEvent(format!(
            "{} belongs to {}, not {}",
            event.event_id, event.room_id, chunk.room_id
        )));
    }
    if db.timeline_event(chunk.id, &event.event_id)?.is_some() {
        debug!("Event already in chunk, skipping");
        metrics::record_duplicate_skipped();
        return Ok(None);
    }

    event::ensure_stored(db, event)?;
    let display_index = next_display_index(db, chunk.id, direction)?;
    let local_id = db.next_local_id(&chunk.room_id)?;
    let annotations = annotations::attach(db, &chunk.room_id, &event.event_id, &event.sender)?
        .map(|summary| summary.event_id);

    let entry = TimelineEventEntry {
        local_id,
        event_id: event.event_id.clone(),
        room_id: chunk.room_id.clone(),
        chunk_id: chunk.id,
        display_index,
        read_receipts: None,
        annotations,
        sender_name: None,
        sender_avatar: None,
        is_unique_display_name: true,
        owned_by_thread_chunk: false,
    };
    db.put_timeline_event(&entry)?;
    metrics::record_event_inserted(direction);

    trace!(local_id, display_index, "Attached event");
    Ok(Some(entry))
}

/// Inserts `event` into `chunk`.
///
/// Besides [`attach_event`], moves the sender's read receipt onto the
/// event unless the entry belongs to a thread view, and stamps the sender's
/// name and avatar from `member_snapshots`.
#[instrument(level = "debug", skip_all, fields(chunk = %chunk.id, event = %event.event_id, direction = direction.as_str()))]
pub fn insert_timeline_event<D: rooms::Data + ?Sized>(
    db: &mut D,
    chunk: &Chunk,
    room_id: &RoomId,
    event: &Event,
    direction: PaginationDirection,
    owned_by_thread_chunk: bool,
    member_snapshots: Option<&MemberSnapshots>,
) -> Result<Option<TimelineEventEntry>> {
    if *chunk.room_id != *room_id {
        return Err(Error::InvalidState(format!(
            "{} belongs to {}, not {room_id}",
            chunk.id, chunk.room_id
        )));
    }

    let Some(mut entry) = attach_event(db, chunk, event, direction)? else {
        return Ok(None);
    };

    if !owned_by_thread_chunk {
        let summary = read_receipt::resolve_receipt_summary(db, room_id, event, &event.sender)?;
        entry.read_receipts = Some(summary.event_id);
    }

    let content = member_snapshots
        .and_then(|batch| batch.get(&event.sender))
        .and_then(Option::as_ref);
    entry.sender_name = content.and_then(|c| c.displayname.clone());
    entry.sender_avatar = content.and_then(|c| c.avatar_url.clone());
    entry.is_unique_display_name = match (entry.sender_name.as_deref(), member_snapshots) {
        (Some(name), Some(batch)) => state_cache::is_display_name_unique(
            db,
            room_id,
            chunk.is_last_forward,
            &event.sender,
            name,
            batch,
        )?,
        _ => true,
    };
    entry.owned_by_thread_chunk = owned_by_thread_chunk;

    db.put_timeline_event(&entry)?;
    Ok(Some(entry))
}

/// Records `event` as current state of `chunk`, replacing the previous
/// event with the same type and state key.
///
/// Only forward insertions change chunk state; older history and events
/// without a state key leave it alone.
pub fn upsert_state_event<D>(
    db: &mut D,
    chunk: &mut Chunk,
    room_id: &RoomId,
    event: &Event,
    direction: PaginationDirection,
) -> Result<()>
where
    D: chunks::Data + event::Data + ?Sized,
{
    if direction == PaginationDirection::Backwards {
        trace!("We don't keep chunk state events when paginating backward");
        return Ok(());
    }
    let Some(state_key) = event.state_key.as_deref() else {
        return Ok(());
    };

    event::ensure_stored(db, event)?;

    let mut state_events = Vec::with_capacity(chunk.state_events.len() + 1);
    for event_id in &chunk.state_events {
        let past = db
            .get_event(room_id, event_id)?
            .ok_or_else(|| Error::bad_database("Chunk state references a missing event."))?;
        let replaced = *past.room_id == *room_id
            && past.state_key.as_deref() == Some(state_key)
            && past.kind == event.kind;
        if !replaced {
            state_events.push(event_id.clone());
        }
    }
    state_events.push(event.event_id.clone());

    chunk.state_events = state_events;
    db.put_chunk(chunk)
}

/// The chunk of `room_id` holding `event_id`, if any.
pub fn find_including_event<D>(db: &D, room_id: &RoomId, event_id: &EventId) -> Result<Option<Chunk>>
where
    D: chunks::Data + Data + ?Sized,
{
    for chunk in chunks::chunks_in_room(db, room_id)? {
        if db.timeline_event(chunk.id, event_id)?.is_some() {
            return Ok(Some(chunk));
        }
    }
    Ok(None)
}
