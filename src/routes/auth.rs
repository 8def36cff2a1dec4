// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in and session routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{MigrationBundle, OnboardingResult, OnboardingStatus, UserSummary};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const TOKEN_TYPE: &str = "bearer";

/// Routes that do not need an access token.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/google", post(login))
        .route("/auth/refresh", post(refresh))
}

/// Routes behind `require_auth`; the layer is applied in routes/mod.rs.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(whoami))
        .route("/auth/onboarding", get(get_onboarding))
}

/// Map a body that failed to parse to a 400 with the parser's message.
pub(crate) fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

// ─── Login ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Google ID token from the sign-in client
    pub id_token: String,
    /// Decks built before signing in, offered for import
    #[serde(default)]
    pub migration_data: Option<MigrationBundle>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub expires_in: u64,
    pub user: UserSummary,
    pub onboarding: OnboardingResult,
}

/// Exchange a Google ID token for a session, importing any offered decks.
async fn login(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let request = json_body(payload)?;

    let outcome = state
        .session
        .login(&request.id_token, request.migration_data.as_ref())
        .await?;

    Ok(Json(LoginResponse {
        access_token: outcome.tokens.access_token,
        refresh_token: outcome.tokens.refresh_token,
        token_type: TOKEN_TYPE.to_string(),
        expires_in: state.session.tokens().access_expires_in_secs(),
        user: outcome.user.into(),
        onboarding: outcome.onboarding,
    }))
}

// ─── Refresh ─────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub expires_in: u64,
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<RefreshResponse>> {
    let request = json_body(payload)?;

    let issued = state.session.refresh(&request.refresh_token).await?;

    Ok(Json(RefreshResponse {
        access_token: issued.token,
        token_type: TOKEN_TYPE.to_string(),
        expires_in: state.session.tokens().access_expires_in_secs(),
    }))
}

// ─── Logout / whoami ─────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}

/// Tokens are stateless; the client discards them.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<LogoutResponse> {
    state.session.logout(&user);

    Json(LogoutResponse {
        success: true,
        message: "Logged out successfully".to_string(),
    })
}

async fn whoami(Extension(user): Extension<AuthUser>) -> Json<UserSummary> {
    Json(user.user.into())
}

async fn get_onboarding(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<OnboardingStatus>> {
    Ok(Json(state.session.onboarding_status(&user.user).await?))
}
