// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for local development and tests.
//!
//! Atomicity comes from `DashMap` entry guards: the subject index entry is
//! held while the user row is written, and a user's deck list is extended
//! under a single shard lock.

use super::{CappedInsert, DeckStore, InsertOutcome, UserStore};
use crate::error::AppError;
use crate::models::{NewDeck, ProfileUpdate, StoredDeck, User};
use crate::time_utils::now_rfc3339;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    users: DashMap<String, User>,
    /// external_subject -> user id
    subjects: DashMap<String, String>,
    decks: DashMap<String, Vec<StoredDeck>>,
    fail_deck_writes: AtomicBool,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent deck import fail, to exercise rollback paths.
    pub fn set_fail_deck_writes(&self, fail: bool) {
        self.inner.fail_deck_writes.store(fail, Ordering::SeqCst);
    }

    /// All decks stored for a user, oldest first.
    pub fn decks_for_user(&self, user_id: &str) -> Vec<StoredDeck> {
        self.inner
            .decks
            .get(user_id)
            .map(|decks| decks.clone())
            .unwrap_or_default()
    }

    pub fn user_count(&self) -> usize {
        self.inner.users.len()
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryDb {
    async fn find_by_subject(&self, external_subject: &str) -> Result<Option<User>, AppError> {
        let Some(user_id) = self
            .inner
            .subjects
            .get(external_subject)
            .map(|id| id.clone())
        else {
            return Ok(None);
        };
        Ok(self.inner.users.get(&user_id).map(|u| u.clone()))
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.inner.users.get(user_id).map(|u| u.clone()))
    }

    async fn insert_if_absent(&self, user: User) -> Result<InsertOutcome, AppError> {
        match self.inner.subjects.entry(user.external_subject.clone()) {
            Entry::Occupied(link) => {
                let existing = self
                    .inner
                    .users
                    .get(link.get())
                    .map(|u| u.clone())
                    .ok_or_else(|| {
                        AppError::Database(format!(
                            "subject index points at missing user {}",
                            link.get()
                        ))
                    })?;
                Ok(InsertOutcome::Existing(existing))
            }
            Entry::Vacant(slot) => {
                self.inner.users.insert(user.id.clone(), user.clone());
                slot.insert(user.id.clone());
                Ok(InsertOutcome::Inserted(user))
            }
        }
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
        updated_at: &str,
    ) -> Result<Option<User>, AppError> {
        Ok(self.inner.users.get_mut(user_id).map(|mut user| {
            update.apply(&mut user, updated_at);
            user.clone()
        }))
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool, AppError> {
        let Some((_, user)) = self.inner.users.remove(user_id) else {
            return Ok(false);
        };
        self.inner.subjects.remove(&user.external_subject);
        self.inner.decks.remove(user_id);
        Ok(true)
    }
}

#[async_trait::async_trait]
impl DeckStore for MemoryDb {
    async fn count_for_user(&self, user_id: &str) -> Result<usize, AppError> {
        Ok(self.inner.decks.get(user_id).map_or(0, |d| d.len()))
    }

    async fn insert_within_cap(
        &self,
        user_id: &str,
        entries: &[Option<NewDeck>],
        cap: usize,
    ) -> Result<CappedInsert, AppError> {
        if self.inner.fail_deck_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database(
                "deck write rejected (injected failure)".to_string(),
            ));
        }

        // The entry guard holds the shard lock across the count and the write.
        let mut owned = self.inner.decks.entry(user_id.to_string()).or_default();
        let existing = owned.len();
        let considered = cap.saturating_sub(existing).min(entries.len());

        let created_at = now_rfc3339();
        owned.extend(
            entries[..considered]
                .iter()
                .flatten()
                .map(|deck| StoredDeck::imported(user_id, deck, &created_at)),
        );

        Ok(CappedInsert {
            existing,
            considered,
            written: owned.len() - existing,
        })
    }
}
