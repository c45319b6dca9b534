// =============================================================================
// Matrixon Timeline - Event Storage Module
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
//   Event records keyed by room id and event id.
//
// =============================================================================

use ruma::{EventId, RoomId};

use crate::{
    database::{
        abstraction::{decode, encode, key},
        Transaction,
    },
    service::{self, rooms::event::Event},
    Result,
};

impl service::rooms::event::Data for Transaction<'_> {
    fn get_event(&self, room_id: &RoomId, event_id: &EventId) -> Result<Option<Event>> {
        self.trees()
            .roomeventid_event
            .get(&key(&[room_id.as_bytes(), event_id.as_bytes()]))
            .map(|bytes| decode(bytes, "Invalid event in roomeventid_event."))
            .transpose()
    }

    fn put_event(&mut self, event: &Event) -> Result<()> {
        let value = encode(event)?;
        self.trees_mut()
            .roomeventid_event
            .insert(key(&[event.room_id.as_bytes(), event.event_id.as_bytes()]), value);
        Ok(())
    }
}
