// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fakes and fixtures for driving coordination flows in tests.
use std::convert::Infallible;

use thiserror::Error;

use warband_core::{PlayerIdentity, Session, SessionId, Timestamp};

use crate::traits::{CustomClaims, IdentityProvider, PlayerDirectory, SessionToken};

/// A player profile fixture.
pub fn identity(player_id: u64, faction_id: Option<u64>) -> PlayerIdentity {
    PlayerIdentity {
        player_id: player_id.into(),
        faction_id: faction_id.map(Into::into),
        position_label: Some("Soldier".to_owned()),
        display_name: format!("player-{player_id}"),
    }
}

/// A session fixture bound to the given identity.
pub fn session(session_id: &str, identity: &PlayerIdentity) -> Session {
    Session::new(SessionId::from(session_id), identity, Timestamp::now())
}

/// A session token fixture without custom claims.
pub fn token(session_id: &str) -> SessionToken {
    SessionToken {
        session_id: SessionId::from(session_id),
        custom_claims: CustomClaims::default(),
    }
}

/// Player directory returning a fixed profile.
#[derive(Clone, Debug)]
pub struct StaticPlayerDirectory {
    identity: PlayerIdentity,
}

impl StaticPlayerDirectory {
    pub fn new(identity: PlayerIdentity) -> Self {
        Self { identity }
    }
}

impl PlayerDirectory for StaticPlayerDirectory {
    type Error = Infallible;

    async fn get_user(&self) -> Result<PlayerIdentity, Self::Error> {
        Ok(self.identity.clone())
    }
}

#[derive(Error, Debug)]
#[error("player directory unreachable")]
pub struct DirectoryUnreachable;

/// Player directory which always fails, for degraded-session tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnreachableDirectory;

impl PlayerDirectory for UnreachableDirectory {
    type Error = DirectoryUnreachable;

    async fn get_user(&self) -> Result<PlayerIdentity, Self::Error> {
        Err(DirectoryUnreachable)
    }
}

/// Identity provider returning a fixed session token.
#[derive(Clone, Debug)]
pub struct StaticIdentityProvider {
    token: SessionToken,
}

impl StaticIdentityProvider {
    pub fn new(token: SessionToken) -> Self {
        Self { token }
    }
}

impl IdentityProvider for StaticIdentityProvider {
    type Error = Infallible;

    async fn current_session(&self) -> Result<SessionToken, Self::Error> {
        Ok(self.token.clone())
    }
}

/// Initialise test logging from the environment. Safe to call repeatedly.
pub fn setup_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
