// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain events consumed by presentation collaborators.
use tokio::sync::broadcast;

use warband_core::{Claim, PlayerId, TargetId};

use crate::access::Role;

/// Coordination state changes, broadcast after the backing store write has
/// been acknowledged and never speculatively.
#[derive(Clone, Debug, PartialEq)]
pub enum CoordinationEvent {
    /// Role resolution completed for the session.
    AccessReady { role: Role, rank: u8 },

    /// The live role watch observed a new effective role.
    AccessRoleChanged { role: Role, rank: u8 },

    /// A claim was written for the target.
    TargetClaimed { target_id: TargetId, claim: Claim },

    /// The active claim on the target was released.
    TargetReleased { target_id: TargetId },

    /// A claim attempt lost to the identity currently holding the slot.
    TargetAlreadyClaimed { target_id: TargetId, holder: PlayerId },
}

/// Fan-out handle for coordination events.
///
/// Backed by a broadcast channel: subscribers each get every event from
/// subscription time on, and a subscriber that lags far enough to overflow
/// the channel loses oldest events first, which presentation code treats
/// as a cue to refresh from a snapshot.
#[derive(Clone, Debug)]
pub struct EventSender {
    sender: broadcast::Sender<CoordinationEvent>,
}

impl EventSender {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinationEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to all current subscribers. Having no subscribers is
    /// not an error.
    pub fn emit(&self, event: CoordinationEvent) {
        let _ = self.sender.send(event);
    }
}
