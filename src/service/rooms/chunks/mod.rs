// =============================================================================
// Matrixon Timeline - Chunk Graph Module
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
//   A room timeline is stored as chunks of contiguous events. Chunks are
//   linked to their older (`prev_chunk`) and newer (`next_chunk`)
//   neighbours by id, and one chunk per room marks the live edge. Links
//   come from paginated server data and can be wrong, so every walk over
//   them carries a visited set and reports loops instead of following them.
//
// =============================================================================

use std::{collections::HashSet, fmt};

use ruma::{OwnedEventId, OwnedRoomId, RoomId};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use crate::{metrics, Error, Result};

/// Stable arena key of a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId(pub u64);

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub room_id: OwnedRoomId,
    /// Token to paginate further back from this chunk.
    pub prev_token: Option<String>,
    /// Token to paginate further forward from this chunk.
    pub next_token: Option<String>,
    /// Older neighbour.
    pub prev_chunk: Option<ChunkId>,
    /// Newer neighbour.
    pub next_chunk: Option<ChunkId>,
    /// Whether this chunk holds the live edge of the room.
    pub is_last_forward: bool,
    /// Whether backwards pagination reached the room creation.
    pub is_last_backward: bool,
    /// Current room state as of the live edge, by event id.
    #[serde(default)]
    pub state_events: Vec<OwnedEventId>,
}

impl Chunk {
    pub fn new(id: ChunkId, room_id: OwnedRoomId) -> Self {
        Self {
            id,
            room_id,
            prev_token: None,
            next_token: None,
            prev_chunk: None,
            next_chunk: None,
            is_last_forward: false,
            is_last_backward: false,
            state_events: Vec::new(),
        }
    }
}

pub trait Data {
    /// Allocates a fresh chunk id.
    fn next_chunk_id(&mut self) -> Result<ChunkId>;

    fn get_chunk(&self, chunk_id: ChunkId) -> Result<Option<Chunk>>;

    /// Creates or replaces the chunk record.
    fn put_chunk(&mut self, chunk: &Chunk) -> Result<()>;

    /// Deletes the chunk record, its entries and its room index entry.
    /// Neighbour links are left to [`remove_chunk`].
    fn remove_chunk(&mut self, chunk_id: ChunkId) -> Result<()>;

    /// Ids of every chunk of the room, in allocation order.
    fn room_chunk_ids(&self, room_id: &RoomId) -> Result<Vec<ChunkId>>;
}

/// Which link a walk follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkDirection {
    /// Towards older chunks.
    Prev,
    /// Towards newer chunks.
    Next,
}

impl LinkDirection {
    fn follow(self, chunk: &Chunk) -> Option<ChunkId> {
        match self {
            LinkDirection::Prev => chunk.prev_chunk,
            LinkDirection::Next => chunk.next_chunk,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LinkDirection::Prev => "prev",
            LinkDirection::Next => "next",
        }
    }
}

/// Outcome of a link walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Traversal {
    /// The predicate held for this chunk.
    Matched(ChunkId),
    /// The chain ended without a match.
    Exhausted,
    /// The walk came back to a chunk it had already seen.
    CycleDetected(ChunkId),
}

impl Traversal {
    pub fn matched(self) -> bool {
        matches!(self, Traversal::Matched(_))
    }
}

/// Walks the links of `start` in `direction`, not including `start` itself,
/// until `predicate` holds, the chain ends or a chunk repeats.
///
/// A repeated chunk means the link graph is corrupt: it is logged and
/// counted under [`metrics::CHUNK_GRAPH_CYCLES`], never followed.
pub fn walk_links<D, F>(
    db: &D,
    start: &Chunk,
    direction: LinkDirection,
    mut predicate: F,
) -> Result<Traversal>
where
    D: Data + ?Sized,
    F: FnMut(&Chunk) -> bool,
{
    let mut visited = HashSet::from([start.id]);
    let mut cursor = direction.follow(start);

    while let Some(chunk_id) = cursor {
        if !visited.insert(chunk_id) {
            error!(
                start = %start.id,
                at = %chunk_id,
                direction = direction.as_str(),
                "Infinite loop detected in chunk links"
            );
            metrics::record_chunk_graph_cycle(direction);
            return Ok(Traversal::CycleDetected(chunk_id));
        }

        let Some(chunk) = db.get_chunk(chunk_id)? else {
            warn!(start = %start.id, missing = %chunk_id, "Chunk link points to a missing chunk");
            return Ok(Traversal::Exhausted);
        };

        if predicate(&chunk) {
            return Ok(Traversal::Matched(chunk_id));
        }
        cursor = direction.follow(&chunk);
    }

    Ok(Traversal::Exhausted)
}

/// Whether any older chunk reachable from `start` satisfies `predicate`.
pub fn any_prev_chunk_satisfies<D, F>(db: &D, start: &Chunk, predicate: F) -> Result<bool>
where
    D: Data + ?Sized,
    F: FnMut(&Chunk) -> bool,
{
    walk_links(db, start, LinkDirection::Prev, predicate).map(Traversal::matched)
}

/// Whether any newer chunk reachable from `start` satisfies `predicate`.
pub fn any_next_chunk_satisfies<D, F>(db: &D, start: &Chunk, predicate: F) -> Result<bool>
where
    D: Data + ?Sized,
    F: FnMut(&Chunk) -> bool,
{
    walk_links(db, start, LinkDirection::Next, predicate).map(Traversal::matched)
}

/// Best-effort "is `a` more recent than `b`".
///
/// Returns `false` whenever the graph does not prove it, so two unrelated
/// chunks are each reported as not more recent than the other.
#[instrument(level = "debug", skip_all, fields(a = %a.id, b = %b.id))]
pub fn is_more_recent<D: Data + ?Sized>(db: &D, a: &Chunk, b: &Chunk) -> Result<bool> {
    if a.is_last_forward {
        debug!("is_more_recent = true (a is last forward)");
        return Ok(true);
    }
    if b.is_last_forward {
        debug!("is_more_recent = false (b is last forward)");
        return Ok(false);
    }
    if any_next_chunk_satisfies(db, b, |chunk| chunk.id == a.id)? {
        debug!("is_more_recent = true (b -> a)");
        return Ok(true);
    }
    if any_next_chunk_satisfies(db, a, |chunk| chunk.id == b.id)? {
        debug!("is_more_recent = false (a -> b)");
        return Ok(false);
    }
    if any_next_chunk_satisfies(db, a, |chunk| chunk.is_last_forward)? {
        debug!("is_more_recent = true (a -> last forward)");
        return Ok(true);
    }

    debug!("is_more_recent = false (fallback)");
    Ok(false)
}

/// Allocates and stores an empty, unlinked chunk.
#[instrument(level = "debug", skip(db))]
pub fn create_chunk<D: Data + ?Sized>(
    db: &mut D,
    room_id: &RoomId,
    prev_token: Option<String>,
    next_token: Option<String>,
) -> Result<Chunk> {
    let id = db.next_chunk_id()?;
    let mut chunk = Chunk::new(id, room_id.to_owned());
    chunk.prev_token = prev_token;
    chunk.next_token = next_token;
    db.put_chunk(&chunk)?;

    debug!("✅ Created {}", id);
    Ok(chunk)
}

fn require_chunk<D: Data + ?Sized>(db: &D, chunk_id: ChunkId) -> Result<Chunk> {
    db.get_chunk(chunk_id)?
        .ok_or_else(|| Error::NotFound(format!("{chunk_id} does not exist")))
}

/// Links `prev_id` as the older neighbour of `next_id`, on both sides.
///
/// A chunk has one neighbour per side, so a neighbour replaced by the new
/// link is detached from it. Refuses links that would close a loop in the
/// room's chain, whichever direction the loop runs.
#[instrument(level = "debug", skip(db))]
pub fn link_chunks<D: Data + ?Sized>(db: &mut D, prev_id: ChunkId, next_id: ChunkId) -> Result<()> {
    if prev_id == next_id {
        return Err(Error::InvalidState(format!("cannot link {prev_id} to itself")));
    }

    let prev = require_chunk(db, prev_id)?;
    let next = require_chunk(db, next_id)?;
    if *prev.room_id != *next.room_id {
        return Err(Error::InvalidState(format!(
            "cannot link {prev_id} of {} to {next_id} of {}",
            prev.room_id, next.room_id
        )));
    }
    if any_next_chunk_satisfies(db, &next, |chunk| chunk.id == prev_id)?
        || any_prev_chunk_satisfies(db, &prev, |chunk| chunk.id == next_id)?
    {
        return Err(Error::InvalidState(format!(
            "linking {prev_id} before {next_id} would create a loop"
        )));
    }

    if let Some(old_next) = prev.next_chunk.filter(|id| *id != next_id) {
        unlink_side(db, old_next, prev_id, LinkDirection::Prev)?;
    }
    if let Some(old_prev) = next.prev_chunk.filter(|id| *id != prev_id) {
        unlink_side(db, old_prev, next_id, LinkDirection::Next)?;
    }

    // Re-read: detaching may have rewritten either side.
    let mut prev = require_chunk(db, prev_id)?;
    let mut next = require_chunk(db, next_id)?;
    prev.next_chunk = Some(next_id);
    next.prev_chunk = Some(prev_id);
    db.put_chunk(&prev)?;
    db.put_chunk(&next)?;
    Ok(())
}

/// Clears the `side` link of `chunk_id` if it still points at `from`.
/// A missing chunk has nothing to clear.
fn unlink_side<D: Data + ?Sized>(db: &mut D, chunk_id: ChunkId, from: ChunkId, side: LinkDirection) -> Result<()> {
    let Some(mut chunk) = db.get_chunk(chunk_id)? else {
        return Ok(());
    };
    let link = match side {
        LinkDirection::Prev => &mut chunk.prev_chunk,
        LinkDirection::Next => &mut chunk.next_chunk,
    };
    if *link != Some(from) {
        return Ok(());
    }
    *link = None;
    debug!(chunk = %chunk_id, from = %from, side = side.as_str(), "Detached chunk link");
    db.put_chunk(&chunk)
}

/// Deletes a chunk with its entries after detaching both neighbours, so no
/// remaining chunk links to it.
#[instrument(level = "debug", skip(db))]
pub fn remove_chunk<D: Data + ?Sized>(db: &mut D, chunk_id: ChunkId) -> Result<()> {
    let chunk = require_chunk(db, chunk_id)?;
    if let Some(prev_id) = chunk.prev_chunk {
        unlink_side(db, prev_id, chunk_id, LinkDirection::Next)?;
    }
    if let Some(next_id) = chunk.next_chunk {
        unlink_side(db, next_id, chunk_id, LinkDirection::Prev)?;
    }
    db.remove_chunk(chunk_id)?;

    debug!("🗑️ Removed {}", chunk_id);
    Ok(())
}

/// Every chunk of the room, in allocation order.
pub fn chunks_in_room<D: Data + ?Sized>(db: &D, room_id: &RoomId) -> Result<Vec<Chunk>> {
    db.room_chunk_ids(room_id)?
        .into_iter()
        .map(|chunk_id| {
            db.get_chunk(chunk_id)?
                .ok_or_else(|| Error::bad_database("Room index references a missing chunk."))
        })
        .collect()
}

/// Makes `chunk_id` the live edge of its room and clears the flag everywhere
/// else, so at most one chunk per room carries it.
#[instrument(level = "debug", skip(db))]
pub fn set_last_forward<D: Data + ?Sized>(db: &mut D, room_id: &RoomId, chunk_id: ChunkId) -> Result<Chunk> {
    let target = require_chunk(db, chunk_id)?;
    if *target.room_id != *room_id {
        return Err(Error::InvalidState(format!("{chunk_id} does not belong to {room_id}")));
    }

    let mut live = target;
    for mut chunk in chunks_in_room(db, room_id)? {
        let should_be_live = chunk.id == chunk_id;
        if chunk.is_last_forward != should_be_live {
            chunk.is_last_forward = should_be_live;
            db.put_chunk(&chunk)?;
        }
        if should_be_live {
            live = chunk;
        }
    }
    Ok(live)
}

/// The live-edge chunk of the room.
///
/// Several flagged chunks are tolerated: the oldest allocation wins and the
/// anomaly is logged.
pub fn last_forward_chunk<D: Data + ?Sized>(db: &D, room_id: &RoomId) -> Result<Option<Chunk>> {
    let mut flagged = chunks_in_room(db, room_id)?
        .into_iter()
        .filter(|chunk| chunk.is_last_forward);

    let first = flagged.next();
    let extra = flagged.count();
    if extra > 0 {
        warn!(room = %room_id, extra, "Room has more than one last forward chunk");
    }
    Ok(first)
}
