// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod deck;
pub mod onboarding;
pub mod user;

pub use deck::{CardRef, DeckDraft, DeckValidationError, NewDeck, StoredDeck};
pub use onboarding::{
    MigrationBundle, MigrationStatus, OnboardingAction, OnboardingResult, OnboardingStatus,
    OnboardingStep, OnboardingStepId, ProfileCompletion,
};
pub use user::{ProfileUpdate, SubjectLink, User, UserSummary};
