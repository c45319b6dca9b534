// =============================================================================
// Matrixon Timeline - Chunk Storage Module
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
//   Chunk records by id, plus a per-room index of chunk ids.
//
// =============================================================================

use ruma::RoomId;

use crate::{
    database::{
        abstraction::{decode, encode, key, prefix, u64_from_bytes},
        Transaction,
    },
    service::rooms::chunks::{Chunk, ChunkId, Data as _},
    Error, Result,
};

impl crate::service::rooms::chunks::Data for Transaction<'_> {
    fn next_chunk_id(&mut self) -> Result<ChunkId> {
        self.trees_mut().counters.increment(b"chunkid").map(ChunkId)
    }

    fn get_chunk(&self, chunk_id: ChunkId) -> Result<Option<Chunk>> {
        self.trees()
            .chunkid_chunk
            .get(&chunk_id.0.to_be_bytes())
            .map(|bytes| decode(bytes, "Invalid chunk in chunkid_chunk."))
            .transpose()
    }

    fn put_chunk(&mut self, chunk: &Chunk) -> Result<()> {
        let value = encode(chunk)?;
        let id = chunk.id.0.to_be_bytes();
        let trees = self.trees_mut();
        trees.chunkid_chunk.insert(id.to_vec(), value);
        trees
            .roomid_chunkid
            .insert(key(&[chunk.room_id.as_bytes(), &id]), Vec::new());
        Ok(())
    }

    fn remove_chunk(&mut self, chunk_id: ChunkId) -> Result<()> {
        let Some(chunk) = self.get_chunk(chunk_id)? else {
            return Ok(());
        };
        let id = chunk_id.0.to_be_bytes();
        let entries = prefix(&[&id]);

        let trees = self.trees_mut();
        let entry_keys: Vec<Vec<u8>> = trees
            .chunkideventid_timelineevent
            .scan_prefix(&entries)
            .map(|(k, _)| k.to_vec())
            .collect();
        for entry_key in entry_keys {
            trees.chunkideventid_timelineevent.remove(&entry_key);
        }
        trees.chunkid_displayrange.remove(&id);
        trees.roomid_chunkid.remove(&key(&[chunk.room_id.as_bytes(), &id]));
        trees.chunkid_chunk.remove(&id);
        Ok(())
    }

    fn room_chunk_ids(&self, room_id: &RoomId) -> Result<Vec<ChunkId>> {
        let room = prefix(&[room_id.as_bytes()]);
        self.trees()
            .roomid_chunkid
            .scan_prefix(&room)
            .map(|(k, _)| {
                u64_from_bytes(&k[room.len()..])
                    .map(ChunkId)
                    .ok_or_else(|| Error::bad_database("Invalid chunk id in roomid_chunkid."))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        service::rooms::{
            chunks::{self, Data as _},
            timeline::Data as _,
        },
        test_utils::{message, room, TestDb},
    };
    use ruma::{room_id, user_id};

    #[test]
    fn test_room_index_keeps_allocation_order() {
        let mut db = TestDb::default();
        let other = room_id!("!other:matrixon.local");
        let a = chunks::create_chunk(&mut db, room(), None, None).unwrap();
        let b = chunks::create_chunk(&mut db, other, None, None).unwrap();
        let c = chunks::create_chunk(&mut db, room(), Some("t1".to_owned()), None).unwrap();

        assert_eq!(db.room_chunk_ids(room()).unwrap(), vec![a.id, c.id]);
        assert_eq!(db.room_chunk_ids(other).unwrap(), vec![b.id]);
        assert_eq!(db.get_chunk(c.id).unwrap().unwrap().prev_token.as_deref(), Some("t1"));
    }

    #[test]
    fn test_remove_chunk_drops_entries() {
        let mut db = TestDb::default();
        let chunk = chunks::create_chunk(&mut db, room(), None, None).unwrap();
        let event = message("$e:matrixon.local", user_id!("@alice:matrixon.local"), Some(1));
        crate::service::rooms::timeline::attach_event(
            &mut db,
            &chunk,
            &event,
            crate::PaginationDirection::Forwards,
        )
        .unwrap();

        db.remove_chunk(chunk.id).unwrap();

        assert!(db.get_chunk(chunk.id).unwrap().is_none());
        assert!(db.room_chunk_ids(room()).unwrap().is_empty());
        assert!(db.timeline_events(chunk.id).unwrap().is_empty());
        assert_eq!(db.display_index_range(chunk.id).unwrap(), None);
    }
}
