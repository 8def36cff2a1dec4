// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// User profile stored in Firestore (`users/{id}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal user ID (UUID, also used as document ID)
    pub id: String,
    /// Identity provider subject (`sub`), unique across users
    pub external_subject: String,
    /// Email address as supplied by the provider at creation
    pub email: String,
    /// Display name (user-editable)
    pub display_name: String,
    /// Avatar card identifier (user-selected)
    pub avatar: Option<String>,
    /// When the user first signed in (RFC3339)
    pub created_at: String,
    /// Last profile write (RFC3339)
    pub updated_at: String,
}

impl User {
    /// An empty avatar string counts as no avatar.
    pub fn has_avatar(&self) -> bool {
        self.avatar.as_deref().is_some_and(|a| !a.is_empty())
    }
}

/// Uniqueness index document (`user_subjects/{external_subject}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectLink {
    pub user_id: String,
}

/// Partial update of the mutable profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.avatar.is_none()
    }

    /// Apply the present fields to `user`, bumping `updated_at`.
    pub fn apply(&self, user: &mut User, updated_at: &str) {
        if let Some(name) = &self.display_name {
            user.display_name = name.clone();
        }
        if let Some(avatar) = &self.avatar {
            user.avatar = Some(avatar.clone());
        }
        user.updated_at = updated_at.to_string();
    }
}

/// User summary returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserSummary {
    pub id: String,
    pub external_subject: String,
    pub email: String,
    pub display_name: String,
    pub avatar: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            external_subject: user.external_subject,
            email: user.email,
            display_name: user.display_name,
            avatar: user.avatar,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
