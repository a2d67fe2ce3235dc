// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces onto the external collaborators this stack consumes.
//!
//! Both collaborators are reached over the network and may fail
//! transiently; implementations live with the embedding application, fakes
//! for tests live in `test_utils`.
mod identity_provider;
mod player_directory;

pub use identity_provider::{CustomClaims, IdentityProvider, SessionToken};
pub use player_directory::PlayerDirectory;
