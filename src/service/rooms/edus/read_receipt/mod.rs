// =============================================================================
// Matrixon Timeline - Read Receipt Module
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
//   One read receipt per (room, user), pointing at the newest event that
//   user is known to have read, and one summary per (room, event) listing
//   the receipts that currently point at it. Receipts only ever move to an
//   event with a strictly newer server timestamp.
//
// =============================================================================

use std::collections::BTreeSet;

use ruma::{uint, EventId, MilliSecondsSinceUnixEpoch, OwnedEventId, OwnedRoomId, OwnedUserId, RoomId, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::{metrics, service::rooms::event::Event, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub room_id: OwnedRoomId,
    pub user_id: OwnedUserId,
    /// `None` until the receipt points anywhere.
    pub event_id: Option<OwnedEventId>,
    pub origin_server_ts: MilliSecondsSinceUnixEpoch,
}

impl ReadReceipt {
    pub fn new(room_id: OwnedRoomId, user_id: OwnedUserId) -> Self {
        Self {
            room_id,
            user_id,
            event_id: None,
            origin_server_ts: MilliSecondsSinceUnixEpoch(uint!(0)),
        }
    }
}

/// Receipts pointing at one event, by user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceiptsSummary {
    pub room_id: OwnedRoomId,
    pub event_id: OwnedEventId,
    #[serde(default)]
    pub read_receipts: BTreeSet<OwnedUserId>,
}

impl ReadReceiptsSummary {
    pub fn new(room_id: OwnedRoomId, event_id: OwnedEventId) -> Self {
        Self {
            room_id,
            event_id,
            read_receipts: BTreeSet::new(),
        }
    }
}

pub trait Data {
    fn read_receipt(&self, room_id: &RoomId, user_id: &UserId) -> Result<Option<ReadReceipt>>;

    fn put_read_receipt(&mut self, receipt: &ReadReceipt) -> Result<()>;

    fn receipts_summary(&self, room_id: &RoomId, event_id: &EventId) -> Result<Option<ReadReceiptsSummary>>;

    fn put_receipts_summary(&mut self, summary: &ReadReceiptsSummary) -> Result<()>;
}

fn summary_or_new<D: Data + ?Sized>(db: &D, room_id: &RoomId, event_id: &EventId) -> Result<ReadReceiptsSummary> {
    Ok(db
        .receipts_summary(room_id, event_id)?
        .unwrap_or_else(|| ReadReceiptsSummary::new(room_id.to_owned(), event_id.to_owned())))
}

/// Moves `user_id`'s receipt to `event_id` if `timestamp` is strictly newer
/// than what the receipt records. The receipt leaves its previous summary
/// before joining `summary`, which the caller persists.
///
/// Returns whether the receipt moved.
fn advance_receipt<D: Data + ?Sized>(
    db: &mut D,
    summary: &mut ReadReceiptsSummary,
    user_id: &UserId,
    timestamp: MilliSecondsSinceUnixEpoch,
) -> Result<bool> {
    let room_id = summary.room_id.clone();
    let mut receipt = match db.read_receipt(&room_id, user_id)? {
        Some(receipt) => receipt,
        None => {
            let receipt = ReadReceipt::new(room_id.clone(), user_id.to_owned());
            db.put_read_receipt(&receipt)?;
            receipt
        }
    };

    if timestamp <= receipt.origin_server_ts {
        trace!(user = %user_id, "Keeping newer read receipt");
        return Ok(false);
    }

    if let Some(previous) = receipt.event_id.as_deref() {
        if *previous == *summary.event_id {
            summary.read_receipts.remove(user_id);
        } else if let Some(mut previous_summary) = db.receipts_summary(&room_id, previous)? {
            previous_summary.read_receipts.remove(user_id);
            db.put_receipts_summary(&previous_summary)?;
        }
    }

    receipt.event_id = Some(summary.event_id.clone());
    receipt.origin_server_ts = timestamp;
    db.put_read_receipt(&receipt)?;
    summary.read_receipts.insert(user_id.to_owned());

    debug!(user = %user_id, event = %summary.event_id, "Read receipt moved");
    metrics::record_read_receipt_moved();
    Ok(true)
}

/// Fetches or creates the receipt summary of `event`.
///
/// A timestamped event counts as read by its own sender, so the sender's
/// receipt follows it when the event is newer than the receipt.
#[instrument(level = "debug", skip(db, event), fields(event = %event.event_id))]
pub fn resolve_receipt_summary<D: Data + ?Sized>(
    db: &mut D,
    room_id: &RoomId,
    event: &Event,
    sender: &UserId,
) -> Result<ReadReceiptsSummary> {
    let mut summary = summary_or_new(db, room_id, &event.event_id)?;
    if let Some(timestamp) = event.origin_server_ts {
        advance_receipt(db, &mut summary, sender, timestamp)?;
    }
    db.put_receipts_summary(&summary)?;
    Ok(summary)
}

/// Applies an explicit `m.read` receipt from sync with the same
/// newer-wins rule as implicit ones.
#[instrument(level = "debug", skip(db))]
pub fn update_read_receipt<D: Data + ?Sized>(
    db: &mut D,
    room_id: &RoomId,
    user_id: &UserId,
    event_id: &EventId,
    timestamp: MilliSecondsSinceUnixEpoch,
) -> Result<bool> {
    let mut summary = summary_or_new(db, room_id, event_id)?;
    let moved = advance_receipt(db, &mut summary, user_id, timestamp)?;
    if moved {
        db.put_receipts_summary(&summary)?;
    }
    Ok(moved)
}
