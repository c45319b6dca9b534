// =============================================================================
// Matrixon Timeline - Library Crate
// =============================================================================
//
// Project: Matrixon - Ultra High Performance Matrix NextServer (Synapse Alternative)
// Author: arkSong (arksong2018@gmail.com) - Founder of Matrixon Innovation Project
// Date: 2024-12-11
// Version: 0.11.0-alpha
// License: Apache 2.0 / MIT
//
// Description:
//   Client-side room timeline store. Paginated events are merged into
//   linked chunks per room, with chunk-local display ordering, read-receipt
//   summaries and sender display-name disambiguation kept consistent inside
//   a single store transaction.
//
// =============================================================================

pub mod database;
pub mod metrics;
pub mod service;

#[cfg(test)]
mod test_utils;

// Re-export common types
pub use ruma;

pub use matrixon_common as common;
pub use matrixon_common::{MatrixonError as Error, Result};

pub use database::{KeyValueDatabase, Transaction};
pub use service::rooms::{
    chunks::{Chunk, ChunkId},
    event::{Event, PaginationDirection},
    state_cache::MemberSnapshots,
    timeline::TimelineEventEntry,
};
