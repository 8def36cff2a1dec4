// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login, refresh, logout and whoami, composed from the identity services.

use crate::error::{AppError, Result};
use crate::models::{MigrationBundle, MigrationStatus, OnboardingResult, OnboardingStatus, User};
use crate::services::identity::GoogleIdentityVerifier;
use crate::services::migration::MigrationCoordinator;
use crate::services::onboarding::{onboarding_status, onboarding_steps};
use crate::services::tokens::{AccessClaims, IssuedAccessToken, SessionTokenPair, SessionTokenService};
use crate::services::users::UserDirectory;
use std::sync::Arc;

/// Everything a successful login hands back.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: SessionTokenPair,
    pub user: User,
    pub onboarding: OnboardingResult,
}

/// An access token that verified and whose user still exists.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: AccessClaims,
    pub user: User,
}

#[derive(Clone)]
pub struct SessionApi {
    verifier: Arc<GoogleIdentityVerifier>,
    users: UserDirectory,
    migration: MigrationCoordinator,
    tokens: SessionTokenService,
}

impl SessionApi {
    pub fn new(
        verifier: Arc<GoogleIdentityVerifier>,
        users: UserDirectory,
        migration: MigrationCoordinator,
        tokens: SessionTokenService,
    ) -> Self {
        Self {
            verifier,
            users,
            migration,
            tokens,
        }
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn tokens(&self) -> &SessionTokenService {
        &self.tokens
    }

    /// Verify → find-or-create → migrate → issue tokens, strictly in order.
    ///
    /// A rejected assertion returns before any state is touched. A failed
    /// migration does not block sign-in: tokens are still issued and the
    /// onboarding result reports `failed`.
    pub async fn login(
        &self,
        assertion: &str,
        bundle: Option<&MigrationBundle>,
    ) -> Result<LoginOutcome> {
        let claims = self.verifier.verify(assertion).await?;

        let (user, created) = self.users.find_or_create(&claims).await?;

        let mut onboarding = match self.migration.migrate(&user, created, bundle).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Deck migration failed");
                OnboardingResult {
                    migration_status: MigrationStatus::Failed,
                    ..OnboardingResult::not_attempted(created)
                }
            }
        };

        // The checklist is advisory; an unreadable deck count only leaves
        // "start building" unticked.
        let deck_count = match self.migration.deck_count(&user.id).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Deck count unavailable");
                0
            }
        };
        onboarding.onboarding_steps = onboarding_steps(&user, deck_count, chrono::Utc::now());

        let tokens = self.tokens.issue_pair(&user)?;

        tracing::info!(
            user_id = %user.id,
            is_new_user = created,
            decks_migrated = onboarding.decks_migrated,
            "User signed in"
        );

        Ok(LoginOutcome {
            tokens,
            user,
            onboarding,
        })
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedAccessToken> {
        let issued = self.tokens.reissue_access(refresh_token, &self.users).await?;
        tracing::debug!("Access token refreshed");
        Ok(issued)
    }

    /// Validate an access token and confirm its user still exists.
    pub async fn authenticate(&self, access_token: &str) -> Result<AuthenticatedUser> {
        let claims = self.tokens.validate_access(access_token)?;

        let user = self
            .users
            .get(&claims.user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        Ok(AuthenticatedUser { claims, user })
    }

    /// Current onboarding state of `user`.
    pub async fn onboarding_status(&self, user: &User) -> Result<OnboardingStatus> {
        let deck_count = self.migration.deck_count(&user.id).await?;
        Ok(onboarding_status(user, deck_count, chrono::Utc::now()))
    }

    /// Acknowledge a logout. Tokens are stateless, so there is nothing to
    /// revoke; the client discards them and they lapse at expiry.
    pub fn logout(&self, who: &AuthenticatedUser) {
        tracing::info!(user_id = %who.user.id, "User logged out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{DeckStore, MemoryDb, UserStore};
    use crate::models::OnboardingStepId;
    use crate::models::{CardRef, DeckDraft, NewDeck};
    use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
    use serde_json::json;

    const KID: &str = "session-test-kid";
    const PROVIDER_PRIVATE: &[u8] = include_bytes!("../../tests/fixtures/provider_private.pem");
    const PROVIDER_PUBLIC: &[u8] = include_bytes!("../../tests/fixtures/provider_public.pem");

    fn api(db: &MemoryDb) -> SessionApi {
        let config = Config::test_default();
        let verifier = GoogleIdentityVerifier::new_with_static_key(
            &config,
            KID,
            DecodingKey::from_rsa_pem(PROVIDER_PUBLIC).unwrap(),
        )
        .unwrap();

        SessionApi::new(
            Arc::new(verifier),
            UserDirectory::new(Arc::new(db.clone())),
            MigrationCoordinator::new(Arc::new(db.clone())),
            SessionTokenService::from_config(&config),
        )
    }

    fn assertion(sub: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = json!({
            "iss": "https://accounts.google.com",
            "aud": Config::test_default().google_client_id,
            "sub": sub,
            "email": format!("{sub}@example.com"),
            "email_verified": true,
            "iat": now,
            "exp": now + 600,
        });
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(KID.to_string());
        encode(
            &header,
            &claims,
            &EncodingKey::from_rsa_pem(PROVIDER_PRIVATE).unwrap(),
        )
        .unwrap()
    }

    fn draft(name: &str) -> DeckDraft {
        DeckDraft {
            name: Some(name.to_string()),
            cards: (1..=8)
                .map(|id| CardRef {
                    id,
                    name: None,
                    elixir_cost: None,
                })
                .collect(),
            evolution_slots: vec![],
        }
    }

    fn bundle(n: usize) -> MigrationBundle {
        MigrationBundle {
            decks: (0..n).map(|i| draft(&format!("Deck {i}"))).collect(),
        }
    }

    async fn seed_decks(db: &MemoryDb, user_id: &str, n: usize) {
        let decks: Vec<Option<NewDeck>> = (0..n)
            .map(|i| draft(&format!("Old {i}")).validate().ok())
            .collect();
        db.insert_within_cap(user_id, &decks, usize::MAX)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn new_user_without_bundle() {
        let db = MemoryDb::new();
        let outcome = api(&db).login(&assertion("alice"), None).await.unwrap();

        assert!(outcome.onboarding.is_new_user);
        assert_eq!(outcome.onboarding.decks_migrated, 0);
        assert_eq!(
            outcome.onboarding.migration_status,
            MigrationStatus::NotAttempted
        );
        assert_eq!(outcome.user.display_name, "alice");

        let steps: Vec<_> = outcome
            .onboarding
            .onboarding_steps
            .iter()
            .map(|s| (s.id, s.completed))
            .collect();
        assert_eq!(
            steps,
            vec![
                (OnboardingStepId::Welcome, true),
                (OnboardingStepId::AvatarSelection, false),
                (OnboardingStepId::ProfileSetup, false),
                (OnboardingStepId::StartBuilding, false),
            ]
        );
    }

    #[tokio::test]
    async fn new_user_with_bundle_migrates_all() {
        let db = MemoryDb::new();
        let outcome = api(&db)
            .login(&assertion("bob"), Some(&bundle(3)))
            .await
            .unwrap();

        assert!(outcome.onboarding.is_new_user);
        assert_eq!(outcome.onboarding.decks_migrated, 3);
        assert_eq!(outcome.onboarding.migration_status, MigrationStatus::Success);
        assert_eq!(db.decks_for_user(&outcome.user.id).len(), 3);

        let start_building = outcome.onboarding.onboarding_steps.last().unwrap();
        assert_eq!(start_building.id, OnboardingStepId::StartBuilding);
        assert!(start_building.completed);
    }

    #[tokio::test]
    async fn existing_user_near_cap_is_partial() {
        let db = MemoryDb::new();
        let api = api(&db);
        let first = api.login(&assertion("carol"), None).await.unwrap();
        seed_decks(&db, &first.user.id, 19).await;

        let outcome = api
            .login(&assertion("carol"), Some(&bundle(5)))
            .await
            .unwrap();

        assert!(!outcome.onboarding.is_new_user);
        assert_eq!(outcome.user.id, first.user.id);
        assert_eq!(outcome.onboarding.decks_migrated, 1);
        assert_eq!(outcome.onboarding.migration_status, MigrationStatus::Partial);
        assert_eq!(db.decks_for_user(&first.user.id).len(), 20);
    }

    #[tokio::test]
    async fn existing_user_at_cap_is_skipped() {
        let db = MemoryDb::new();
        let api = api(&db);
        let first = api.login(&assertion("dave"), None).await.unwrap();
        seed_decks(&db, &first.user.id, 20).await;

        let outcome = api
            .login(&assertion("dave"), Some(&bundle(2)))
            .await
            .unwrap();

        assert_eq!(outcome.onboarding.decks_migrated, 0);
        assert_eq!(
            outcome.onboarding.migration_status,
            MigrationStatus::SkippedCapReached
        );
    }

    #[tokio::test]
    async fn failed_migration_still_signs_in() {
        let db = MemoryDb::new();
        db.set_fail_deck_writes(true);

        let outcome = api(&db)
            .login(&assertion("erin"), Some(&bundle(2)))
            .await
            .unwrap();

        assert_eq!(outcome.onboarding.migration_status, MigrationStatus::Failed);
        assert_eq!(outcome.onboarding.decks_migrated, 0);
        assert!(outcome.onboarding.migration_errors.is_empty());
        assert!(!outcome.onboarding.onboarding_steps.is_empty());
        assert!(!outcome.tokens.access_token.is_empty());
        assert!(db.decks_for_user(&outcome.user.id).is_empty());
    }

    #[tokio::test]
    async fn rejected_assertion_touches_nothing() {
        let db = MemoryDb::new();
        let result = api(&db).login("not-a-jwt", Some(&bundle(2))).await;

        assert!(matches!(result, Err(AppError::InvalidAssertion)));
        assert_eq!(db.user_count(), 0);
    }

    #[tokio::test]
    async fn refresh_and_authenticate_follow_user_lifetime() {
        let db = MemoryDb::new();
        let api = api(&db);
        let outcome = api.login(&assertion("frank"), None).await.unwrap();

        let who = api
            .authenticate(&outcome.tokens.access_token)
            .await
            .unwrap();
        assert_eq!(who.user.id, outcome.user.id);

        let issued = api.refresh(&outcome.tokens.refresh_token).await.unwrap();
        assert!(api.authenticate(&issued.token).await.is_ok());

        // A refresh token is not an access token.
        assert!(matches!(
            api.authenticate(&outcome.tokens.refresh_token).await,
            Err(AppError::WrongTokenType)
        ));

        db.delete_user(&outcome.user.id).await.unwrap();
        assert!(matches!(
            api.refresh(&outcome.tokens.refresh_token).await,
            Err(AppError::UserNotFound)
        ));
        assert!(matches!(
            api.authenticate(&outcome.tokens.access_token).await,
            Err(AppError::UserNotFound)
        ));
    }
}
