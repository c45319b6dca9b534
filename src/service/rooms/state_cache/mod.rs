// =============================================================================
// Matrixon Timeline - Member Summary Module
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
//   Live member summaries of a room and the display-name uniqueness check
//   used to decide whether a sender needs disambiguation in the timeline.
//
// =============================================================================

use std::collections::BTreeMap;

use ruma::{
    events::room::member::{MembershipState, RoomMemberEventContent},
    OwnedMxcUri, OwnedRoomId, OwnedUserId, RoomId, UserId,
};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::Result;

/// Member contents captured with one batch of events, by user.
///
/// A missing key and a `None` value mean the same thing: nothing is known
/// about that user for this batch, no name or avatar gets stamped and the
/// sender counts as unique.
pub type MemberSnapshots = BTreeMap<OwnedUserId, Option<RoomMemberEventContent>>;

/// Current membership of one user in one room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMemberSummary {
    pub room_id: OwnedRoomId,
    pub user_id: OwnedUserId,
    pub display_name: Option<String>,
    pub avatar_url: Option<OwnedMxcUri>,
    pub membership: MembershipState,
}

impl RoomMemberSummary {
    pub fn from_content(room_id: OwnedRoomId, user_id: OwnedUserId, content: &RoomMemberEventContent) -> Self {
        Self {
            room_id,
            user_id,
            display_name: content.displayname.clone(),
            avatar_url: content.avatar_url.clone(),
            membership: content.membership.clone(),
        }
    }
}

pub trait Data {
    fn member_summary(&self, room_id: &RoomId, user_id: &UserId) -> Result<Option<RoomMemberSummary>>;

    fn put_member_summary(&mut self, summary: &RoomMemberSummary) -> Result<()>;

    /// Every member of the room whose current display name is `display_name`.
    fn members_with_display_name(&self, room_id: &RoomId, display_name: &str) -> Result<Vec<RoomMemberSummary>>;
}

/// Replaces the live summary of `user_id` from a membership event.
pub fn update_member_summary<D: Data + ?Sized>(
    db: &mut D,
    room_id: &RoomId,
    user_id: &UserId,
    content: &RoomMemberEventContent,
) -> Result<RoomMemberSummary> {
    let summary = RoomMemberSummary::from_content(room_id.to_owned(), user_id.to_owned(), content);
    db.put_member_summary(&summary)?;
    Ok(summary)
}

/// Whether `display_name` of `sender` needs no disambiguation.
///
/// The name must not be used by another user of `batch`. At the live edge
/// it must also not be used by a current member the batch does not
/// mention; historical chunks render as of their own point in time and skip
/// that check.
pub fn is_display_name_unique<D: Data + ?Sized>(
    db: &D,
    room_id: &RoomId,
    is_live_edge: bool,
    sender: &UserId,
    display_name: &str,
    batch: &MemberSnapshots,
) -> Result<bool> {
    let historically_unique = !batch.iter().any(|(user_id, content)| {
        **user_id != *sender
            && content
                .as_ref()
                .and_then(|c| c.displayname.as_deref())
                .is_some_and(|name| name == display_name)
    });

    if !is_live_edge {
        return Ok(historically_unique);
    }

    let live_unique = db
        .members_with_display_name(room_id, display_name)?
        .iter()
        .all(|member| batch.contains_key(&member.user_id));

    trace!(sender = %sender, historically_unique, live_unique, "Computed display name uniqueness");
    Ok(historically_unique && live_unique)
}
