// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Onboarding progress derived from the current profile.

use crate::models::{
    OnboardingAction, OnboardingStatus, OnboardingStep, OnboardingStepId, ProfileCompletion, User,
};
use crate::time_utils::parse_rfc3339;
use chrono::{DateTime, TimeDelta, Utc};

/// How long after creation a user still counts as new.
const NEW_USER_WINDOW_SECS: i64 = 300;

/// `deck_count` is the number of decks the user currently owns.
pub fn onboarding_status(user: &User, deck_count: usize, now: DateTime<Utc>) -> OnboardingStatus {
    OnboardingStatus {
        is_new_user: is_new_user(user, now),
        needs_profile_setup: !user.has_avatar(),
        profile_completion: profile_completion(user),
        onboarding_steps: onboarding_steps(user, deck_count, now),
    }
}

/// The onboarding checklist, in display order.
///
/// The welcome step only appears while the user is new, and avatar
/// selection only while no avatar is set. None of the steps are required.
pub fn onboarding_steps(user: &User, deck_count: usize, now: DateTime<Utc>) -> Vec<OnboardingStep> {
    let mut steps = Vec::with_capacity(4);

    if is_new_user(user, now) {
        steps.push(step(
            OnboardingStepId::Welcome,
            "Welcome to DeckVault!",
            "Your Google account has been successfully connected.",
            true,
            None,
        ));
    }

    if !user.has_avatar() {
        steps.push(step(
            OnboardingStepId::AvatarSelection,
            "Choose Your Avatar",
            "Select a card as your profile avatar.",
            false,
            Some(OnboardingAction::SelectAvatar),
        ));
    }

    steps.push(step(
        OnboardingStepId::ProfileSetup,
        "Customize Your Profile",
        "Update your display name and complete your profile.",
        has_custom_name(user),
        Some(OnboardingAction::EditProfile),
    ));

    steps.push(step(
        OnboardingStepId::StartBuilding,
        "Start Building Decks",
        "Create your first deck and save it to your account.",
        deck_count > 0,
        Some(OnboardingAction::BuildDeck),
    ));

    steps
}

fn step(
    id: OnboardingStepId,
    title: &str,
    description: &str,
    completed: bool,
    action: Option<OnboardingAction>,
) -> OnboardingStep {
    OnboardingStep {
        id,
        title: title.to_string(),
        description: description.to_string(),
        completed,
        required: false,
        action,
    }
}

fn is_new_user(user: &User, now: DateTime<Utc>) -> bool {
    match parse_rfc3339(&user.created_at) {
        Some(created) => now - created < TimeDelta::seconds(NEW_USER_WINDOW_SECS),
        None => true,
    }
}

/// A display name other than the email local part the account started with.
fn has_custom_name(user: &User) -> bool {
    let local_part = user.email.split('@').next().unwrap_or_default();
    !user.display_name.is_empty() && user.display_name != local_part
}

fn profile_completion(user: &User) -> ProfileCompletion {
    let has_avatar = user.has_avatar();
    let has_custom_name = has_custom_name(user);
    let has_email = !user.email.is_empty();

    let items = [has_avatar, has_custom_name, has_email];
    let completed_items = items.iter().filter(|done| **done).count() as u8;
    let total_items = items.len() as u8;
    let percentage = (u32::from(completed_items) * 100 / u32::from(total_items)) as u8;

    ProfileCompletion {
        percentage,
        completed_items,
        total_items,
        has_avatar,
        has_custom_name,
        has_email,
        is_complete: completed_items == total_items,
    }
}
