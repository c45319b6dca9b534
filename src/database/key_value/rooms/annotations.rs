// =============================================================================
// Matrixon Timeline - Annotation Storage Module
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
//   Annotation summaries keyed by room id and annotated event id.
//
// =============================================================================

use ruma::{EventId, RoomId};

use crate::{
    database::{
        abstraction::{decode, encode, key},
        Transaction,
    },
    service::{self, rooms::annotations::EventAnnotationsSummary},
    Result,
};

impl service::rooms::annotations::Data for Transaction<'_> {
    fn annotations_summary(&self, room_id: &RoomId, event_id: &EventId) -> Result<Option<EventAnnotationsSummary>> {
        self.trees()
            .roomeventid_annotations
            .get(&key(&[room_id.as_bytes(), event_id.as_bytes()]))
            .map(|bytes| decode(bytes, "Invalid summary in roomeventid_annotations."))
            .transpose()
    }

    fn put_annotations_summary(&mut self, summary: &EventAnnotationsSummary) -> Result<()> {
        let value = encode(summary)?;
        self.trees_mut().roomeventid_annotations.insert(
            key(&[summary.room_id.as_bytes(), summary.event_id.as_bytes()]),
            value,
        );
        Ok(())
    }
}
