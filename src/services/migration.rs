// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Import of anonymously-created decks into a newly signed-in account.
//!
//! Entries are taken in caller order up to the remaining cap headroom, then
//! validated; the valid ones are written in a single all-or-nothing store
//! call that also does the counting, so concurrent logins cannot push a user
//! past the cap. Repeated calls with the same bundle import it again (up to
//! the cap): callers are expected to migrate once, at account creation.

use crate::db::DeckStore;
use crate::error::Result;
use crate::models::{MigrationBundle, MigrationStatus, NewDeck, OnboardingResult, User};
use std::sync::Arc;

/// Maximum number of decks a user may own.
pub const MAX_DECKS_PER_USER: usize = 20;

#[derive(Clone)]
pub struct MigrationCoordinator {
    decks: Arc<dyn DeckStore>,
    cap: usize,
}

impl MigrationCoordinator {
    pub fn new(decks: Arc<dyn DeckStore>) -> Self {
        Self {
            decks,
            cap: MAX_DECKS_PER_USER,
        }
    }

    /// Number of decks `user_id` owns right now.
    pub async fn deck_count(&self, user_id: &str) -> Result<usize> {
        self.decks.count_for_user(user_id).await
    }

    /// Migrate `bundle` into `user`'s decks.
    ///
    /// A store failure during the write is returned as an error; the
    /// transaction guarantees nothing was persisted in that case.
    pub async fn migrate(
        &self,
        user: &User,
        created: bool,
        bundle: Option<&MigrationBundle>,
    ) -> Result<OnboardingResult> {
        let Some(bundle) = bundle.filter(|b| !b.is_empty()) else {
            return Ok(OnboardingResult::not_attempted(created));
        };

        // Validation is pure, so every entry is checked up front; the store
        // decides how many leading entries fit.
        let checked: Vec<_> = bundle.decks.iter().map(|draft| draft.validate()).collect();
        let entries: Vec<Option<NewDeck>> =
            checked.iter().map(|r| r.as_ref().ok().cloned()).collect();

        let outcome = self
            .decks
            .insert_within_cap(&user.id, &entries, self.cap)
            .await?;

        if outcome.considered == 0 {
            tracing::info!(
                user_id = %user.id,
                existing_count = outcome.existing,
                offered = bundle.len(),
                "Deck cap reached, skipping migration"
            );
            return Ok(OnboardingResult {
                migration_status: MigrationStatus::SkippedCapReached,
                ..OnboardingResult::not_attempted(created)
            });
        }

        let migration_errors: Vec<String> = checked
            .iter()
            .take(outcome.considered)
            .enumerate()
            .filter_map(|(index, result)| result.as_ref().err().map(|e| (index, e)))
            .map(|(index, e)| {
                tracing::warn!(user_id = %user.id, index, error = %e, "Dropped invalid deck");
                format!("deck {}: {}", index + 1, e)
            })
            .collect();

        let migration_status = if outcome.written == bundle.len() {
            MigrationStatus::Success
        } else {
            MigrationStatus::Partial
        };

        tracing::info!(
            user_id = %user.id,
            offered = bundle.len(),
            selected = outcome.considered,
            decks_migrated = outcome.written,
            status = ?migration_status,
            "Deck migration finished"
        );

        Ok(OnboardingResult {
            is_new_user: created,
            decks_migrated: outcome.written,
            migration_status,
            migration_errors,
            // Filled in by SessionApi::login.
            onboarding_steps: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CappedInsert, MemoryDb};
    use crate::models::{CardRef, DeckDraft};
    use std::time::Duration;

    fn user() -> User {
        User {
            id: "user-1".to_string(),
            external_subject: "sub-1".to_string(),
            email: "ada@example.com".to_string(),
            display_name: "Ada".to_string(),
            avatar: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn valid_draft(name: &str) -> DeckDraft {
        DeckDraft {
            name: Some(name.to_string()),
            cards: (1..=8)
                .map(|id| CardRef {
                    id,
                    name: None,
                    elixir_cost: Some(3),
                })
                .collect(),
            evolution_slots: vec![],
        }
    }

    fn invalid_draft() -> DeckDraft {
        DeckDraft {
            name: Some("Short".to_string()),
            cards: valid_draft("x").cards[..5].to_vec(),
            evolution_slots: vec![],
        }
    }

    fn bundle(decks: Vec<DeckDraft>) -> MigrationBundle {
        MigrationBundle { decks }
    }

    async fn seed(db: &MemoryDb, count: usize) {
        let decks: Vec<Option<NewDeck>> = (0..count)
            .map(|i| valid_draft(&format!("Seed {i}")).validate().ok())
            .collect();
        db.insert_within_cap("user-1", &decks, usize::MAX)
            .await
            .unwrap();
    }

    /// A deck store that stalls before every call, like a network round-trip.
    struct SlowDecks(MemoryDb);

    #[async_trait::async_trait]
    impl DeckStore for SlowDecks {
        async fn count_for_user(&self, user_id: &str) -> Result<usize> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.0.count_for_user(user_id).await
        }

        async fn insert_within_cap(
            &self,
            user_id: &str,
            entries: &[Option<NewDeck>],
            cap: usize,
        ) -> Result<CappedInsert> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.0.insert_within_cap(user_id, entries, cap).await
        }
    }

    #[tokio::test]
    async fn absent_or_empty_bundle_not_attempted() {
        let db = MemoryDb::new();
        db.set_fail_deck_writes(true); // proves the store is not touched
        let coordinator = MigrationCoordinator::new(Arc::new(db));

        let none = coordinator.migrate(&user(), true, None).await.unwrap();
        assert_eq!(none, OnboardingResult::not_attempted(true));

        let empty = coordinator
            .migrate(&user(), false, Some(&bundle(vec![])))
            .await
            .unwrap();
        assert_eq!(empty, OnboardingResult::not_attempted(false));
    }

    #[tokio::test]
    async fn migrated_count_is_min_of_bundle_and_headroom() {
        for (existing, offered) in [(0, 3), (0, 25), (15, 3), (18, 5), (19, 1), (20, 4), (22, 2)] {
            let db = MemoryDb::new();
            seed(&db, existing).await;
            let coordinator = MigrationCoordinator::new(Arc::new(db.clone()));

            let drafts = (0..offered).map(|i| valid_draft(&format!("D{i}"))).collect();
            let result = coordinator
                .migrate(&user(), false, Some(&bundle(drafts)))
                .await
                .unwrap();

            let expected = offered.min(MAX_DECKS_PER_USER.saturating_sub(existing));
            assert_eq!(result.decks_migrated, expected, "E={existing} N={offered}");
            assert_eq!(
                db.decks_for_user("user-1").len(),
                existing + expected,
                "E={existing} N={offered}"
            );
        }
    }

    #[tokio::test]
    async fn cap_truncation_is_partial_and_keeps_order() {
        let db = MemoryDb::new();
        seed(&db, 18).await;
        let coordinator = MigrationCoordinator::new(Arc::new(db.clone()));

        let drafts = vec![
            valid_draft("first"),
            valid_draft("second"),
            valid_draft("third"),
        ];
        let result = coordinator
            .migrate(&user(), false, Some(&bundle(drafts)))
            .await
            .unwrap();

        assert_eq!(result.decks_migrated, 2);
        assert_eq!(result.migration_status, MigrationStatus::Partial);

        let names: Vec<String> = db
            .decks_for_user("user-1")
            .into_iter()
            .skip(18)
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn invalid_entries_dropped_as_partial() {
        let db = MemoryDb::new();
        let coordinator = MigrationCoordinator::new(Arc::new(db.clone()));

        let drafts = vec![valid_draft("a"), invalid_draft(), valid_draft("b")];
        let result = coordinator
            .migrate(&user(), true, Some(&bundle(drafts)))
            .await
            .unwrap();

        assert!(result.is_new_user);
        assert_eq!(result.decks_migrated, 2);
        assert_eq!(result.migration_status, MigrationStatus::Partial);
        assert_eq!(
            result.migration_errors,
            vec!["deck 2: deck must contain exactly 8 cards, got 5"]
        );
    }

    #[tokio::test]
    async fn entries_beyond_cap_report_no_errors() {
        let db = MemoryDb::new();
        seed(&db, 19).await;
        let coordinator = MigrationCoordinator::new(Arc::new(db.clone()));

        let drafts = vec![valid_draft("fits"), invalid_draft()];
        let result = coordinator
            .migrate(&user(), false, Some(&bundle(drafts)))
            .await
            .unwrap();

        assert_eq!(result.decks_migrated, 1);
        assert_eq!(result.migration_status, MigrationStatus::Partial);
        assert!(result.migration_errors.is_empty());
    }

    #[tokio::test]
    async fn concurrent_migrations_respect_cap() {
        let db = MemoryDb::new();
        seed(&db, 19).await;
        let coordinator = MigrationCoordinator::new(Arc::new(SlowDecks(db.clone())));
        let offered = bundle(vec![valid_draft("a"), valid_draft("b")]);

        let (user_a, user_b) = (user(), user());
        let (first, second) = tokio::join!(
            coordinator.migrate(&user_a, false, Some(&offered)),
            coordinator.migrate(&user_b, false, Some(&offered)),
        );
        let mut statuses = vec![
            first.unwrap().migration_status,
            second.unwrap().migration_status,
        ];
        statuses.sort_by_key(|s| format!("{s:?}"));

        assert_eq!(db.decks_for_user("user-1").len(), MAX_DECKS_PER_USER);
        assert_eq!(
            statuses,
            vec![MigrationStatus::Partial, MigrationStatus::SkippedCapReached]
        );
    }

    #[tokio::test]
    async fn duplicate_names_are_allowed() {
        let db = MemoryDb::new();
        let coordinator = MigrationCoordinator::new(Arc::new(db.clone()));

        let drafts = vec![valid_draft("Same"), valid_draft("Same")];
        let result = coordinator
            .migrate(&user(), true, Some(&bundle(drafts)))
            .await
            .unwrap();

        assert_eq!(result.decks_migrated, 2);
        assert_eq!(result.migration_status, MigrationStatus::Success);
    }

    #[tokio::test]
    async fn store_failure_writes_nothing() {
        let db = MemoryDb::new();
        db.set_fail_deck_writes(true);
        let coordinator = MigrationCoordinator::new(Arc::new(db.clone()));

        let result = coordinator
            .migrate(&user(), true, Some(&bundle(vec![valid_draft("a")])))
            .await;

        assert!(result.is_err());
        assert!(db.decks_for_user("user-1").is_empty());
    }

    #[tokio::test]
    async fn repeated_migration_imports_again() {
        let db = MemoryDb::new();
        let coordinator = MigrationCoordinator::new(Arc::new(db.clone()));
        let offered = bundle(vec![valid_draft("a"), valid_draft("b")]);

        coordinator.migrate(&user(), true, Some(&offered)).await.unwrap();
        coordinator.migrate(&user(), false, Some(&offered)).await.unwrap();

        assert_eq!(db.decks_for_user("user-1").len(), 4);
    }
}
