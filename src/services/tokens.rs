// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! First-party session tokens (HS256 JWTs).
//!
//! Access and refresh tokens share a signing key but carry a `type`
//! discriminant that is checked on every read. A refresh token is never
//! accepted where an access token is required, and vice versa. Tokens are
//! stateless: nothing is persisted and nothing can be revoked early.

use crate::config::Config;
use crate::error::AppError;
use crate::models::User;
use crate::services::users::UserDirectory;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: String,
    pub external_subject: String,
    pub email: String,
    pub display_name: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub user_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Wire shape of a session token: the `type` field selects the variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SessionClaims {
    Access(AccessClaims),
    Refresh(RefreshClaims),
}

impl SessionClaims {
    fn exp(&self) -> i64 {
        match self {
            SessionClaims::Access(c) => c.exp,
            SessionClaims::Refresh(c) => c.exp,
        }
    }
}

/// Why a first-party token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed or badly signed")]
    Invalid,
    #[error("token has expired")]
    Expired,
    #[error("token has the wrong type for this use")]
    WrongType,
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => AppError::InvalidToken,
            TokenError::Expired => AppError::TokenExpired,
            TokenError::WrongType => AppError::WrongTokenType,
        }
    }
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct SessionTokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// A freshly issued access token.
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates session tokens with a key fixed at construction.
#[derive(Clone)]
pub struct SessionTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: TimeDelta,
    refresh_ttl: TimeDelta,
    leeway_secs: i64,
}

impl SessionTokenService {
    pub fn new(
        signing_key: &[u8],
        access_ttl: Duration,
        refresh_ttl: Duration,
        leeway: Duration,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(signing_key),
            decoding_key: DecodingKey::from_secret(signing_key),
            access_ttl: whole_seconds(access_ttl),
            refresh_ttl: whole_seconds(refresh_ttl),
            leeway_secs: i64::try_from(leeway.as_secs()).unwrap_or(i64::MAX),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_signing_key,
            config.access_token_ttl,
            config.refresh_token_ttl,
            config.token_leeway,
        )
    }

    /// Access token lifetime in seconds, as reported to clients.
    pub fn access_expires_in_secs(&self) -> u64 {
        self.access_ttl.num_seconds() as u64
    }

    pub fn issue_pair(&self, user: &User) -> Result<SessionTokenPair, AppError> {
        self.issue_pair_at(user, Utc::now())
    }

    /// Issue a pair as if the current time were `now`.
    pub fn issue_pair_at(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<SessionTokenPair, AppError> {
        let access = self.issue_access_at(user, now)?;

        let refresh_expires_at = expiry(now, self.refresh_ttl)?;
        let refresh_token = self.sign(&SessionClaims::Refresh(RefreshClaims {
            user_id: user.id.clone(),
            iat: now.timestamp(),
            exp: refresh_expires_at.timestamp(),
        }))?;

        Ok(SessionTokenPair {
            access_token: access.token,
            refresh_token,
            access_expires_at: access.expires_at,
            refresh_expires_at,
        })
    }

    /// Issue an access token alone (used on refresh).
    pub fn issue_access(&self, user: &User) -> Result<IssuedAccessToken, AppError> {
        self.issue_access_at(user, Utc::now())
    }

    fn issue_access_at(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<IssuedAccessToken, AppError> {
        let expires_at = expiry(now, self.access_ttl)?;
        let token = self.sign(&SessionClaims::Access(AccessClaims {
            user_id: user.id.clone(),
            external_subject: user.external_subject.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        }))?;

        Ok(IssuedAccessToken { token, expires_at })
    }

    pub fn validate_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        match self.decode_checked(token, TokenKind::Access, Utc::now())? {
            SessionClaims::Access(claims) => Ok(claims),
            SessionClaims::Refresh(_) => Err(TokenError::WrongType),
        }
    }

    pub fn validate_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        match self.decode_checked(token, TokenKind::Refresh, Utc::now())? {
            SessionClaims::Refresh(claims) => Ok(claims),
            SessionClaims::Access(_) => Err(TokenError::WrongType),
        }
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// The user is re-read so a deleted account cannot keep minting access
    /// tokens. The refresh token itself is not rotated.
    pub async fn reissue_access(
        &self,
        refresh_token: &str,
        users: &UserDirectory,
    ) -> Result<IssuedAccessToken, AppError> {
        let claims = self.validate_refresh(refresh_token)?;

        let user = users
            .get(&claims.user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        self.issue_access(&user)
    }

    fn sign(&self, claims: &SessionClaims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))
    }

    /// Verify signature, then type, then expiry, in that order.
    fn decode_checked(
        &self,
        token: &str,
        expected: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<SessionClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below, after the type, so a wrong-type token is
        // reported as such even when it has also expired.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        let claims = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| TokenError::Invalid)?
            .claims;

        if TokenKind::of(&claims) != expected {
            return Err(TokenError::WrongType);
        }

        if claims.exp().saturating_add(self.leeway_secs) < now.timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

/// Saturates at `TimeDelta::MAX` instead of panicking on huge lifetimes.
fn whole_seconds(duration: Duration) -> TimeDelta {
    i64::try_from(duration.as_secs())
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

fn expiry(now: DateTime<Utc>, ttl: TimeDelta) -> Result<DateTime<Utc>, AppError> {
    now.checked_add_signed(ttl)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("token lifetime out of range")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn of(claims: &SessionClaims) -> Self {
        match claims {
            SessionClaims::Access(_) => TokenKind::Access,
            SessionClaims::Refresh(_) => TokenKind::Refresh,
        }
    }
}
