// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Migration bundle and onboarding summaries.

use super::deck::DeckDraft;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Anonymously-created decks offered for import at login.
///
/// Ephemeral: consumed by a single login call and never stored as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationBundle {
    #[serde(default)]
    pub decks: Vec<DeckDraft>,
}

impl MigrationBundle {
    pub fn is_empty(&self) -> bool {
        self.decks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.decks.len()
    }
}

/// Outcome of the migration step of a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    /// No bundle (or an empty one) was supplied.
    NotAttempted,
    /// Every bundle entry was written.
    Success,
    /// Some entries were dropped by the cap or by validation.
    Partial,
    /// The user already owns the maximum number of decks.
    SkippedCapReached,
    /// The store rejected the write; nothing was imported.
    Failed,
}

/// Onboarding summary returned from login. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct OnboardingResult {
    pub is_new_user: bool,
    pub decks_migrated: usize,
    pub migration_status: MigrationStatus,
    /// One line per bundle entry that was dropped by validation, e.g.
    /// `"deck 2: deck must contain exactly 8 cards, got 5"` (1-based).
    pub migration_errors: Vec<String>,
    pub onboarding_steps: Vec<OnboardingStep>,
}

impl OnboardingResult {
    pub fn not_attempted(is_new_user: bool) -> Self {
        Self {
            is_new_user,
            decks_migrated: 0,
            migration_status: MigrationStatus::NotAttempted,
            migration_errors: Vec::new(),
            onboarding_steps: Vec::new(),
        }
    }
}

/// Which onboarding step this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStepId {
    Welcome,
    AvatarSelection,
    ProfileSetup,
    StartBuilding,
}

/// Client action that completes a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingAction {
    SelectAvatar,
    EditProfile,
    BuildDeck,
}

/// One entry of the onboarding checklist shown after sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct OnboardingStep {
    pub id: OnboardingStepId,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<OnboardingAction>,
}

/// Profile completion breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileCompletion {
    pub percentage: u8,
    pub completed_items: u8,
    pub total_items: u8,
    pub has_avatar: bool,
    pub has_custom_name: bool,
    pub has_email: bool,
    pub is_complete: bool,
}

/// Current onboarding state of a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct OnboardingStatus {
    pub is_new_user: bool,
    pub needs_profile_setup: bool,
    pub profile_completion: ProfileCompletion,
    pub onboarding_steps: Vec<OnboardingStep>,
}
