// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User directory: maps identity provider subjects to internal users.

use crate::db::{InsertOutcome, UserStore};
use crate::error::{AppError, Result};
use crate::models::{ProfileUpdate, User};
use crate::services::identity::VerifiedClaims;
use crate::time_utils::now_rfc3339;
use std::sync::Arc;

#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn UserStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Return the user for `claims.external_subject`, creating it on first sight.
    ///
    /// An existing user is returned as stored: provider-side name changes do
    /// not overwrite profile edits. The boolean is true only for the call
    /// that actually created the row.
    pub async fn find_or_create(&self, claims: &VerifiedClaims) -> Result<(User, bool)> {
        if let Some(existing) = self.store.find_by_subject(&claims.external_subject).await? {
            tracing::debug!(user_id = %existing.id, "Found existing user");
            return Ok((existing, false));
        }

        let now = now_rfc3339();
        let candidate = User {
            id: uuid::Uuid::new_v4().to_string(),
            external_subject: claims.external_subject.clone(),
            email: claims.email.clone(),
            display_name: claims.display_name.clone(),
            avatar: None,
            created_at: now.clone(),
            updated_at: now,
        };

        match self.store.insert_if_absent(candidate).await? {
            InsertOutcome::Inserted(user) => {
                tracing::info!(user_id = %user.id, "Created new user");
                Ok((user, true))
            }
            InsertOutcome::Existing(user) => {
                tracing::info!(user_id = %user.id, "Concurrent login created user first");
                Ok((user, false))
            }
        }
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<User>> {
        self.store.get_user(user_id).await
    }

    /// Partial update of display name and/or avatar.
    pub async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<User> {
        let user = self
            .store
            .update_profile(user_id, update, &now_rfc3339())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        tracing::info!(user_id, "Updated user profile");
        Ok(user)
    }
}
