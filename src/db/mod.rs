// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! Services talk to persistence through [`UserStore`] and [`DeckStore`].
//! Production runs on Firestore; [`MemoryDb`] backs local development and tests.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{NewDeck, ProfileUpdate, User};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Uniqueness index: external subject -> user id
    pub const USER_SUBJECTS: &str = "user_subjects";
    pub const DECKS: &str = "decks";
}

/// Result of an atomic insert-if-absent on the subject index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The supplied record was written.
    Inserted(User),
    /// Another record already owned the subject; it is returned untouched.
    Existing(User),
}

/// User persistence.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Exact-match lookup by identity provider subject.
    async fn find_by_subject(&self, external_subject: &str) -> Result<Option<User>, AppError>;

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError>;

    /// Write `user` unless its `external_subject` is already taken.
    ///
    /// Must be atomic: concurrent callers for one subject see exactly one
    /// `Inserted`, everyone else gets `Existing` with the winner's row.
    async fn insert_if_absent(&self, user: User) -> Result<InsertOutcome, AppError>;

    /// Apply a partial profile update. Returns `None` if the user is gone.
    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
        updated_at: &str,
    ) -> Result<Option<User>, AppError>;

    /// Remove a user and its subject index entry. Returns whether it existed.
    async fn delete_user(&self, user_id: &str) -> Result<bool, AppError>;
}

/// Result of a capped deck import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CappedInsert {
    /// Decks the user owned before the import.
    pub existing: usize,
    /// Leading entries that fit under the cap.
    pub considered: usize,
    /// Decks written: the `Some` entries among those considered.
    pub written: usize,
}

/// Deck persistence, as much of it as onboarding needs.
#[async_trait::async_trait]
pub trait DeckStore: Send + Sync {
    async fn count_for_user(&self, user_id: &str) -> Result<usize, AppError>;

    /// Count the user's decks and import the first `cap - count` entries,
    /// as one atomic unit. A `None` entry takes up its slot but writes
    /// nothing.
    ///
    /// Concurrent imports for one user must never leave it with more than
    /// `cap` decks. On error nothing is written.
    async fn insert_within_cap(
        &self,
        user_id: &str,
        entries: &[Option<NewDeck>],
        cap: usize,
    ) -> Result<CappedInsert, AppError>;
}
