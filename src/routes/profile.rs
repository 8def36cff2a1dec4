// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ProfileUpdate, UserSummary};
use crate::routes::auth::json_body;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::{Validate, ValidationError};

const MAX_DISPLAY_NAME_LEN: usize = 50;

/// Profile routes (require authentication via access token).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/profile", get(get_profile).put(update_profile))
}

/// Body of `PUT /api/profile`. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(custom(function = "validate_display_name"))]
    pub name: Option<String>,

    /// An empty string clears the avatar.
    #[validate(length(max = 50, message = "Avatar must be at most 50 characters"))]
    pub avatar: Option<String>,
}

/// Display names: 1-50 letters, digits or spaces once trimmed.
fn validate_display_name(name: &str) -> std::result::Result<(), ValidationError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();

    if len == 0 || len > MAX_DISPLAY_NAME_LEN {
        return Err(ValidationError::new("name_length")
            .with_message("Name must be 1-50 characters".into()));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ')
    {
        return Err(ValidationError::new("name_charset")
            .with_message("Name may contain only letters, numbers and spaces".into()));
    }
    Ok(())
}

impl UpdateProfileRequest {
    fn into_update(self) -> ProfileUpdate {
        ProfileUpdate {
            display_name: self.name.map(|n| n.trim().to_string()),
            avatar: self.avatar,
        }
    }
}

async fn get_profile(Extension(user): Extension<AuthUser>) -> Json<UserSummary> {
    Json(user.user.into())
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<UserSummary>> {
    let request = json_body(payload)?;

    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let update = request.into_update();
    if update.is_empty() {
        return Err(AppError::BadRequest(
            "At least one of name or avatar is required".to_string(),
        ));
    }

    let updated = state
        .session
        .users()
        .update_profile(&user.user.id, &update)
        .await?;

    Ok(Json(updated.into()))
}
