// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod identity;
pub mod migration;
pub mod onboarding;
pub mod session;
pub mod tokens;
pub mod users;

pub use identity::{GoogleIdentityVerifier, VerifiedClaims};
pub use migration::{MigrationCoordinator, MAX_DECKS_PER_USER};
pub use session::{AuthenticatedUser, LoginOutcome, SessionApi};
pub use tokens::{AccessClaims, RefreshClaims, SessionTokenPair, SessionTokenService, TokenError};
pub use users::UserDirectory;
