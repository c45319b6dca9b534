// =============================================================================
// Matrixon Timeline - Member Summary Storage Module
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
//   Live member summaries keyed by room id and user id.
//
// =============================================================================

use ruma::{RoomId, UserId};

use crate::{
    database::{
        abstraction::{decode, encode, key, prefix},
        Transaction,
    },
    service::{self, rooms::state_cache::RoomMemberSummary},
    Result,
};

impl service::rooms::state_cache::Data for Transaction<'_> {
    fn member_summary(&self, room_id: &RoomId, user_id: &UserId) -> Result<Option<RoomMemberSummary>> {
        self.trees()
            .roomuserid_membersummary
            .get(&key(&[room_id.as_bytes(), user_id.as_bytes()]))
            .map(|bytes| decode(bytes, "Invalid summary in roomuserid_membersummary."))
            .transpose()
    }

    fn put_member_summary(&mut self, summary: &RoomMemberSummary) -> Result<()> {
        let value = encode(summary)?;
        self.trees_mut().roomuserid_membersummary.insert(
            key(&[summary.room_id.as_bytes(), summary.user_id.as_bytes()]),
            value,
        );
        Ok(())
    }

    fn members_with_display_name(&self, room_id: &RoomId, display_name: &str) -> Result<Vec<RoomMemberSummary>> {
        let room = prefix(&[room_id.as_bytes()]);
        let mut members = Vec::new();
        for (_, bytes) in self.trees().roomuserid_membersummary.scan_prefix(&room) {
            let summary: RoomMemberSummary = decode(bytes, "Invalid summary in roomuserid_membersummary.")?;
            if summary.display_name.as_deref() == Some(display_name) {
                members.push(summary);
            }
        }
        Ok(members)
    }
}
