// =============================================================================
// Matrixon Timeline - Read Receipt Storage Module
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
//   Read receipts keyed by room and user, receipt summaries keyed by
//   room and event.
//
// =============================================================================

use ruma::{EventId, RoomId, UserId};

use crate::{
    database::{
        abstraction::{decode, encode, key},
        Transaction,
    },
    service::{
        self,
        rooms::edus::read_receipt::{ReadReceipt, ReadReceiptsSummary},
    },
    Result,
};

impl service::rooms::edus::read_receipt::Data for Transaction<'_> {
    fn read_receipt(&self, room_id: &RoomId, user_id: &UserId) -> Result<Option<ReadReceipt>> {
        self.trees()
            .roomuserid_readreceipt
            .get(&key(&[room_id.as_bytes(), user_id.as_bytes()]))
            .map(|bytes| decode(bytes, "Invalid receipt in roomuserid_readreceipt."))
            .transpose()
    }

    fn put_read_receipt(&mut self, receipt: &ReadReceipt) -> Result<()> {
        let value = encode(receipt)?;
        self.trees_mut().roomuserid_readreceipt.insert(
            key(&[receipt.room_id.as_bytes(), receipt.user_id.as_bytes()]),
            value,
        );
        Ok(())
    }

    fn receipts_summary(&self, room_id: &RoomId, event_id: &EventId) -> Result<Option<ReadReceiptsSummary>> {
        self.trees()
            .roomeventid_readreceipts
            .get(&key(&[room_id.as_bytes(), event_id.as_bytes()]))
            .map(|bytes| decode(bytes, "Invalid summary in roomeventid_readreceipts."))
            .transpose()
    }

    fn put_receipts_summary(&mut self, summary: &ReadReceiptsSummary) -> Result<()> {
        let value = encode(summary)?;
        self.trees_mut().roomeventid_readreceipts.insert(
            key(&[summary.room_id.as_bytes(), summary.event_id.as_bytes()]),
            value,
        );
        Ok(())
    }
}
