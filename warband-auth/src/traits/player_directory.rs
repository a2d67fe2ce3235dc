// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use warband_core::PlayerIdentity;

/// Read-only access to the external player-data API.
#[trait_variant::make(Send)]
pub trait PlayerDirectory {
    type Error: Error + Send + Sync + 'static;

    /// Fetch the profile of the authenticated player.
    ///
    /// May fail transiently; callers degrade to a read-only guest session
    /// rather than surfacing the failure into presentation code.
    async fn get_user(&self) -> Result<PlayerIdentity, Self::Error>;
}
