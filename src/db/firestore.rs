// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile storage, keyed by internal ID)
//! - User subjects (uniqueness index on the identity provider subject)
//! - Decks (only the count and bulk import needed for onboarding)

use super::{collections, CappedInsert, DeckStore, InsertOutcome, UserStore};
use crate::error::AppError;
use crate::models::{NewDeck, ProfileUpdate, StoredDeck, SubjectLink, User};
use crate::time_utils::now_rfc3339;
use firestore::{FirestoreConsistencySelector, FirestoreWritePrecondition};

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

// A capped import re-runs when its commit loses to a concurrent writer.
const IMPORT_ATTEMPTS: usize = 3;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client. Every operation returns a database error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn get_subject_link(&self, external_subject: &str) -> Result<Option<SubjectLink>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USER_SUBJECTS)
            .obj()
            .one(external_subject)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_decks(&self, user_id: &str) -> Result<Vec<StoredDeck>, AppError> {
        query_decks(self.get_client()?, user_id).await
    }

    /// Delete documents from one collection, one transaction per chunk.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl UserStore for FirestoreDb {
    async fn find_by_subject(&self, external_subject: &str) -> Result<Option<User>, AppError> {
        match self.get_subject_link(external_subject).await? {
            Some(link) => self.get_user(&link.user_id).await,
            None => Ok(None),
        }
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// The subject index document is written with a must-not-exist
    /// precondition in the same transaction as the user document, so a
    /// concurrent creator's commit fails and it falls back to the winner's row.
    async fn insert_if_absent(&self, user: User) -> Result<InsertOutcome, AppError> {
        if let Some(existing) = self.find_by_subject(&user.external_subject).await? {
            return Ok(InsertOutcome::Existing(existing));
        }

        let client = self.get_client()?;
        let link = SubjectLink {
            user_id: user.id.clone(),
        };

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::USER_SUBJECTS)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(&user.external_subject)
            .object(&link)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add subject link to transaction: {}", e))
            })?;

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(&user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add user to transaction: {}", e))
            })?;

        match transaction.commit().await {
            Ok(_) => Ok(InsertOutcome::Inserted(user)),
            Err(commit_err) => {
                // Lost the race: the subject now belongs to someone else.
                if let Some(existing) = self.find_by_subject(&user.external_subject).await? {
                    tracing::debug!(
                        user_id = %existing.id,
                        "Concurrent user creation resolved to existing row"
                    );
                    return Ok(InsertOutcome::Existing(existing));
                }
                Err(AppError::Database(format!(
                    "User creation commit failed: {}",
                    commit_err
                )))
            }
        }
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
        updated_at: &str,
    ) -> Result<Option<User>, AppError> {
        let Some(mut user) = self.get_user(user_id).await? else {
            return Ok(None);
        };
        update.apply(&mut user, updated_at);

        // Exists(true) keeps a concurrent deletion from resurrecting the row.
        let result: Result<(), _> = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(user_id)
            .object(&user)
            .execute()
            .await;

        match result {
            Ok(()) => Ok(Some(user)),
            Err(e) => {
                if self.get_user(user_id).await?.is_none() {
                    return Ok(None);
                }
                Err(AppError::Database(e.to_string()))
            }
        }
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool, AppError> {
        let Some(user) = self.get_user(user_id).await? else {
            return Ok(false);
        };

        let decks = self.list_decks(user_id).await?;
        self.batch_delete(&decks, collections::DECKS, |deck: &StoredDeck| {
            deck.id.clone()
        })
        .await?;
        tracing::debug!(user_id, count = decks.len(), "Deleted decks");

        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        for (collection, doc_id) in [
            (collections::USER_SUBJECTS, user.external_subject.as_str()),
            (collections::USERS, user.id.as_str()),
        ] {
            client
                .fluent()
                .delete()
                .from(collection)
                .document_id(doc_id)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add deletion to transaction: {}", e))
                })?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit user deletion: {}", e)))?;

        tracing::info!(user_id, "User deleted");
        Ok(true)
    }
}

/// All decks owned by `user_id`, read through `client`'s consistency selector.
async fn query_decks(
    client: &firestore::FirestoreDb,
    user_id: &str,
) -> Result<Vec<StoredDeck>, AppError> {
    let user_id = user_id.to_string();
    client
        .fluent()
        .select()
        .from(collections::DECKS)
        .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
        .obj()
        .query()
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

#[async_trait::async_trait]
impl DeckStore for FirestoreDb {
    async fn count_for_user(&self, user_id: &str) -> Result<usize, AppError> {
        Ok(self.list_decks(user_id).await?.len())
    }

    /// The deck query runs inside the import transaction, so a concurrent
    /// import that adds a matching deck makes one of the two commits fail.
    /// The loser re-counts and tries again.
    async fn insert_within_cap(
        &self,
        user_id: &str,
        entries: &[Option<NewDeck>],
        cap: usize,
    ) -> Result<CappedInsert, AppError> {
        if entries.len() > BATCH_SIZE {
            return Err(AppError::Database(format!(
                "import of {} decks exceeds transaction limit",
                entries.len()
            )));
        }

        let client = self.get_client()?;
        let mut last_error = None;

        for attempt in 1..=IMPORT_ATTEMPTS {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            let in_transaction = client.clone_with_consistency_selector(
                FirestoreConsistencySelector::Transaction(transaction.transaction_id().clone()),
            );
            let existing = query_decks(&in_transaction, user_id).await?.len();
            let considered = cap.saturating_sub(existing).min(entries.len());

            let created_at = now_rfc3339();
            let mut written = 0;
            for deck in entries[..considered].iter().flatten() {
                let stored = StoredDeck::imported(user_id, deck, &created_at);
                client
                    .fluent()
                    .update()
                    .in_col(collections::DECKS)
                    .precondition(FirestoreWritePrecondition::Exists(false))
                    .document_id(&stored.id)
                    .object(&stored)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add deck to transaction: {}", e))
                    })?;
                written += 1;
            }

            match transaction.commit().await {
                Ok(_) => {
                    tracing::info!(
                        user_id,
                        existing,
                        count = written,
                        "Decks imported atomically"
                    );
                    return Ok(CappedInsert {
                        existing,
                        considered,
                        written,
                    });
                }
                Err(e) => {
                    tracing::warn!(user_id, attempt, error = %e, "Deck import commit failed");
                    last_error = Some(e);
                }
            }
        }

        Err(AppError::Database(format!(
            "Deck import commit failed: {}",
            last_error.map_or_else(|| "no attempts made".to_string(), |e| e.to_string())
        )))
    }
}
