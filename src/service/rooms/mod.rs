// =============================================================================
// Matrixon Timeline - Rooms Module
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
//   Per-room timeline services. Each submodule owns one record family and
//   declares the store operations it needs as a `Data` trait; any backend
//   implementing all of them can host a room timeline.
//
// =============================================================================

pub mod annotations;
pub mod chunks;
pub mod edus;
pub mod event;
pub mod state_cache;
pub mod timeline;

/// Everything the timeline insertion engine touches inside one transaction.
pub trait Data:
    annotations::Data
    + chunks::Data
    + edus::read_receipt::Data
    + event::Data
    + state_cache::Data
    + timeline::Data
{
}
