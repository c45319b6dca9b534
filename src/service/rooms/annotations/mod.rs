// =============================================================================
// Matrixon Timeline - Annotations Module
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
//   Aggregated reactions and edits of an event. Relations can arrive
//   before the event they annotate, so the summary is keyed by
//   (room, event id) and picked up when the event reaches a timeline.
//
// =============================================================================

use ruma::{EventId, MilliSecondsSinceUnixEpoch, OwnedEventId, OwnedRoomId, OwnedUserId, RoomId, UserId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;

/// One `m.replace` edit of the annotated event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditionOfEvent {
    pub event_id: OwnedEventId,
    pub sender: OwnedUserId,
    pub timestamp: Option<MilliSecondsSinceUnixEpoch>,
}

/// Reactions sharing one key, e.g. "👍".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionAggregatedSummary {
    pub key: String,
    pub count: u32,
    pub source_events: Vec<OwnedEventId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAnnotationsSummary {
    pub room_id: OwnedRoomId,
    pub event_id: OwnedEventId,
    #[serde(default)]
    pub reactions: Vec<ReactionAggregatedSummary>,
    #[serde(default)]
    pub edits: Vec<EditionOfEvent>,
}

impl EventAnnotationsSummary {
    pub fn new(room_id: OwnedRoomId, event_id: OwnedEventId) -> Self {
        Self {
            room_id,
            event_id,
            reactions: Vec::new(),
            edits: Vec::new(),
        }
    }
}

pub trait Data {
    fn annotations_summary(&self, room_id: &RoomId, event_id: &EventId) -> Result<Option<EventAnnotationsSummary>>;

    fn put_annotations_summary(&mut self, summary: &EventAnnotationsSummary) -> Result<()>;
}

/// Drops every edit not sent by `original_sender` from the summary. Only the
/// author of an event may edit it. The dropped edit events stay stored as
/// ordinary room events.
///
/// Returns the number of edits removed.
pub fn clean_up<D: Data + ?Sized>(
    db: &mut D,
    summary: &mut EventAnnotationsSummary,
    original_sender: &UserId,
) -> Result<usize> {
    let (kept, foreign): (Vec<_>, Vec<_>) = summary
        .edits
        .drain(..)
        .partition(|edit| *edit.sender == *original_sender);
    summary.edits = kept;

    for edit in &foreign {
        debug!(event = %summary.event_id, edit = %edit.event_id, sender = %edit.sender, "Dropping edit from another sender");
    }
    if !foreign.is_empty() {
        db.put_annotations_summary(summary)?;
    }
    Ok(foreign.len())
}

/// Looks up the annotations gathered for `event_id` so far and cleans them
/// against the event's sender. `None` when nothing annotated the event yet.
pub fn attach<D: Data + ?Sized>(
    db: &mut D,
    room_id: &RoomId,
    event_id: &EventId,
    sender: &UserId,
) -> Result<Option<EventAnnotationsSummary>> {
    let Some(mut summary) = db.annotations_summary(room_id, event_id)? else {
        return Ok(None);
    };
    clean_up(db, &mut summary, sender)?;
    Ok(Some(summary))
}

/// Records an edit of `event_id`, creating the summary if needed.
pub fn record_edit<D: Data + ?Sized>(
    db: &mut D,
    room_id: &RoomId,
    event_id: &EventId,
    edit: EditionOfEvent,
) -> Result<EventAnnotationsSummary> {
    let mut summary = db
        .annotations_summary(room_id, event_id)?
        .unwrap_or_else(|| EventAnnotationsSummary::new(room_id.to_owned(), event_id.to_owned()));

    if !summary.edits.iter().any(|e| e.event_id == edit.event_id) {
        summary.edits.push(edit);
        db.put_annotations_summary(&summary)?;
    }
    Ok(summary)
}

/// Records a reaction with `key` from `reaction_id` on `event_id`.
pub fn record_reaction<D: Data + ?Sized>(
    db: &mut D,
    room_id: &RoomId,
    event_id: &EventId,
    key: &str,
    reaction_id: &EventId,
) -> Result<EventAnnotationsSummary> {
    let mut summary = db
        .annotations_summary(room_id, event_id)?
        .unwrap_or_else(|| EventAnnotationsSummary::new(room_id.to_owned(), event_id.to_owned()));

    let seen = summary
        .reactions
        .iter()
        .any(|r| r.key == key && r.source_events.iter().any(|e| **e == *reaction_id));
    if seen {
        return Ok(summary);
    }

    match summary.reactions.iter_mut().find(|r| r.key == key) {
        Some(reaction) => {
            reaction.count += 1;
            reaction.source_events.push(reaction_id.to_owned());
        }
        None => summary.reactions.push(ReactionAggregatedSummary {
            key: key.to_owned(),
            count: 1,
            source_events: vec![reaction_id.to_owned()],
        }),
    }
    db.put_annotations_summary(&summary)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::rooms::event::Data as _;
    use crate::test_utils::{message, room, TestDb};
    use ruma::{event_id, user_id};

    #[test]
    fn test_clean_up_drops_foreign_edits() {
        let mut db = TestDb::default();
        let original = event_id!("$original:matrixon.local");
        let alice = user_id!("@alice:matrixon.local");
        let mallory = user_id!("@mallory:matrixon.local");

        let good = message("$edit1:matrixon.local", alice, Some(110));
        let bad = message("$edit2:matrixon.local", mallory, Some(120));
        db.put_event(&good).unwrap();
        db.put_event(&bad).unwrap();
        for edit in [&good, &bad] {
            record_edit(
                &mut db,
                room(),
                original,
                EditionOfEvent {
                    event_id: edit.event_id.clone(),
                    sender: edit.sender.clone(),
                    timestamp: edit.origin_server_ts,
                },
            )
            .unwrap();
        }

        let summary = attach(&mut db, room(), original, alice).unwrap().unwrap();
        assert_eq!(summary.edits.len(), 1);
        assert_eq!(summary.edits[0].sender, alice.to_owned());
        // Only the summary forgets the forged edit.
        assert!(db.get_event(room(), &bad.event_id).unwrap().is_some());
        assert!(db.get_event(room(), &good.event_id).unwrap().is_some());

        let stored = db.annotations_summary(room(), original).unwrap().unwrap();
        assert_eq!(stored, summary);
    }

    #[test]
    fn test_attach_without_annotations() {
        let mut db = TestDb::default();
        let found = attach(
            &mut db,
            room(),
            event_id!("$plain:matrixon.local"),
            user_id!("@alice:matrixon.local"),
        )
        .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_reactions_aggregate_by_key() {
        let mut db = TestDb::default();
        let target = event_id!("$target:matrixon.local");

        record_reaction(&mut db, room(), target, "👍", event_id!("$r1:matrixon.local")).unwrap();
        record_reaction(&mut db, room(), target, "👍", event_id!("$r2:matrixon.local")).unwrap();
        record_reaction(&mut db, room(), target, "👍", event_id!("$r2:matrixon.local")).unwrap();
        let summary = record_reaction(&mut db, room(), target, "🎉", event_id!("$r3:matrixon.local")).unwrap();

        assert_eq!(summary.reactions.len(), 2);
        assert_eq!(summary.reactions[0].count, 2);
        assert_eq!(summary.reactions[1].count, 1);
    }
}
