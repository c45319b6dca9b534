// =============================================================================
// Matrixon Timeline - Timeline Entry Storage Module
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
//   Timeline entries keyed by chunk id and event id, the display index
//   bounds of each chunk, plus the room-wide local id counters.
//
// =============================================================================

use ruma::{EventId, RoomId};

use crate::{
    database::{
        abstraction::{decode, encode, key, prefix},
        Transaction,
    },
    service::{
        self,
        rooms::{
            chunks::ChunkId,
            timeline::{Data as _, TimelineEventEntry},
        },
    },
    Result,
};

impl service::rooms::timeline::Data for Transaction<'_> {
    fn next_local_id(&mut self, room_id: &RoomId) -> Result<u64> {
        self.trees_mut()
            .counters
            .increment(&key(&[b"localid", room_id.as_bytes()]))
    }

    fn timeline_event(&self, chunk_id: ChunkId, event_id: &EventId) -> Result<Option<TimelineEventEntry>> {
        self.trees()
            .chunkideventid_timelineevent
            .get(&key(&[&chunk_id.0.to_be_bytes(), event_id.as_bytes()]))
            .map(|bytes| decode(bytes, "Invalid entry in chunkideventid_timelineevent."))
            .transpose()
    }

    fn put_timeline_event(&mut self, entry: &TimelineEventEntry) -> Result<()> {
        let value = encode(entry)?;
        let index = entry.display_index;
        let range = match self.display_index_range(entry.chunk_id)? {
            Some((low, high)) => (low.min(index), high.max(index)),
            None => (index, index),
        };
        let range = encode(&range)?;

        let chunk = entry.chunk_id.0.to_be_bytes();
        let trees = self.trees_mut();
        trees
            .chunkideventid_timelineevent
            .insert(key(&[&chunk, entry.event_id.as_bytes()]), value);
        trees.chunkid_displayrange.insert(chunk.to_vec(), range);
        Ok(())
    }

    fn display_index_range(&self, chunk_id: ChunkId) -> Result<Option<(i64, i64)>> {
        self.trees()
            .chunkid_displayrange
            .get(&chunk_id.0.to_be_bytes())
            .map(|bytes| decode(bytes, "Invalid range in chunkid_displayrange."))
            .transpose()
    }

    fn timeline_events(&self, chunk_id: ChunkId) -> Result<Vec<TimelineEventEntry>> {
        let chunk = prefix(&[&chunk_id.0.to_be_bytes()]);
        let mut entries = self
            .trees()
            .chunkideventid_timelineevent
            .scan_prefix(&chunk)
            .map(|(_, bytes)| decode::<TimelineEventEntry>(bytes, "Invalid entry in chunkideventid_timelineevent."))
            .collect::<Result<Vec<_>>>()?;

        entries.sort_by_key(|entry| entry.display_index);
        Ok(entries)
    }
}
