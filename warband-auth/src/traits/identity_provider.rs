// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use serde::{Deserialize, Serialize};

use warband_core::SessionId;

/// Custom claims attached to a session credential by the identity
/// provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomClaims {
    /// Provider-asserted role, feeding the resolver's provider-role signal.
    pub role: Option<String>,

    /// Provider-mirrored copy of the per-faction role record.
    pub custom_role: Option<String>,
}

/// A signed session credential plus identity claims.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionToken {
    pub session_id: SessionId,
    #[serde(default)]
    pub custom_claims: CustomClaims,
}

/// The remote identity-issuing function, treated as a black box.
#[trait_variant::make(Send)]
pub trait IdentityProvider {
    type Error: Error + Send + Sync + 'static;

    /// The credential for the current authentication session.
    async fn current_session(&self) -> Result<SessionToken, Self::Error>;
}
