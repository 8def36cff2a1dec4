// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google ID token verification for sign-in.
//!
//! Checks signature against Google's published keys, audience, issuer,
//! expiry, and that the email is verified. Every failure reaches the caller
//! as the same `AppError::InvalidAssertion`; the reason is only logged.

use crate::config::Config;
use crate::error::AppError;
use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;
const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

/// Identity extracted from a verified assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    pub external_subject: String,
    pub email: String,
    pub display_name: String,
}

/// Why an assertion was not accepted. Logged, never returned to clients.
#[derive(Debug, Clone)]
enum AssertionError {
    /// Malformed, badly signed, or claims do not match expectations.
    Rejected(String),
    /// Provider keys could not be fetched in time.
    Unavailable(String),
}

#[derive(Clone)]
enum VerifierMode {
    Google,
    StaticKey {
        kid: String,
        decoding_key: Arc<DecodingKey>,
    },
}

#[derive(Clone)]
struct DiscoveryCacheEntry {
    jwks_uri: String,
    expires_at: Instant,
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for Google-issued sign-in ID tokens.
pub struct GoogleIdentityVerifier {
    http_client: reqwest::Client,
    expected_audience: String,
    discovery_url: String,
    fallback_jwks_url: String,
    key_fetch_deadline: Duration,
    mode: VerifierMode,
    discovery_cache: RwLock<Option<DiscoveryCacheEntry>>,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl GoogleIdentityVerifier {
    /// Create a production verifier that discovers and caches Google JWKS keys.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let verifier = Self::with_mode(config, VerifierMode::Google)?;

        tracing::info!(
            expected_audience = %verifier.expected_audience,
            "Initialized Google identity verifier"
        );

        Ok(verifier)
    }

    /// Create a verifier with a static RSA public key.
    ///
    /// This is intended for deterministic local/integration tests.
    pub fn new_with_static_key(
        config: &Config,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static OIDC kid must not be empty");
        }

        Self::with_mode(
            config,
            VerifierMode::StaticKey {
                kid,
                decoding_key: Arc::new(decoding_key),
            },
        )
    }

    fn with_mode(config: &Config, mode: VerifierMode) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.oidc_http_timeout)
            .build()
            .context("failed building OIDC HTTP client")?;

        Ok(Self {
            http_client,
            expected_audience: config.google_client_id.trim().to_string(),
            discovery_url: config.oidc_discovery_url.clone(),
            fallback_jwks_url: config.oidc_fallback_jwks_url.clone(),
            // Discovery plus up to two JWKS fetches.
            key_fetch_deadline: config.oidc_http_timeout * 3,
            mode,
            discovery_cache: RwLock::new(None),
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Verify an identity assertion and extract the signed-in identity.
    pub async fn verify(&self, assertion: &str) -> Result<VerifiedClaims, AppError> {
        match self.verify_inner(assertion).await {
            Ok(claims) => Ok(claims),
            Err(AssertionError::Rejected(reason)) => {
                tracing::warn!(reason = %reason, "Identity assertion rejected");
                Err(AppError::InvalidAssertion)
            }
            Err(AssertionError::Unavailable(reason)) => {
                tracing::error!(reason = %reason, "Identity provider keys unavailable");
                Err(AppError::InvalidAssertion)
            }
        }
    }

    async fn verify_inner(&self, assertion: &str) -> Result<VerifiedClaims, AssertionError> {
        let token = assertion.trim();
        if token.is_empty() {
            return Err(AssertionError::Rejected("assertion is empty".to_string()));
        }

        let header = decode_header(token)
            .map_err(|e| AssertionError::Rejected(format!("invalid JWT header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(AssertionError::Rejected(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| AssertionError::Rejected("missing JWT kid".to_string()))?;

        let decoding_key = tokio::time::timeout(self.key_fetch_deadline, self.decoding_key_for_kid(&kid))
            .await
            .map_err(|_| AssertionError::Unavailable("key fetch timed out".to_string()))??;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_audience(&[self.expected_audience.as_str()]);
        validation.validate_nbf = true;
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<GoogleIdTokenClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(|e| AssertionError::Rejected(format!("JWT validation failed: {e}")))?
            .claims;

        validate_iat(claims.iat)?;

        if claims.sub.trim().is_empty() {
            return Err(AssertionError::Rejected("empty sub claim".to_string()));
        }

        let email = claims
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AssertionError::Rejected("missing email claim".to_string()))?;

        if claims.email_verified != Some(true) {
            return Err(AssertionError::Rejected(
                "email_verified claim is not true".to_string(),
            ));
        }

        let display_name = claims
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| email_local_part(&email).to_string());

        tracing::debug!(subject = %claims.sub, "Identity assertion verified");

        Ok(VerifiedClaims {
            external_subject: claims.sub,
            email,
            display_name,
        })
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, AssertionError> {
        match &self.mode {
            VerifierMode::StaticKey {
                kid: static_kid,
                decoding_key,
            } => {
                if kid == static_kid {
                    return Ok(decoding_key.clone());
                }

                return Err(AssertionError::Rejected(format!(
                    "unknown JWT kid for static verifier: {kid}"
                )));
            }
            VerifierMode::Google => {}
        }

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(AssertionError::Rejected(format!(
            "JWT kid not found in JWKS after refresh: {kid}"
        )))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), AssertionError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        let jwks_uri = self.resolve_jwks_uri(force_refresh).await?;

        tracing::debug!(jwks_uri = %jwks_uri, "Refreshing Google JWKS cache");

        let response = self
            .http_client
            .get(&jwks_uri)
            .send()
            .await
            .map_err(|e| AssertionError::Unavailable(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AssertionError::Unavailable(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| AssertionError::Unavailable(format!("invalid JWKS JSON: {e}")))?;

        let keys_by_kid = usable_keys(jwks);

        if keys_by_kid.is_empty() {
            return Err(AssertionError::Unavailable(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        *self.jwks_cache.write().await = Some(JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        });

        tracing::debug!(ttl_secs = ttl.as_secs(), "Google JWKS cache refreshed");
        Ok(())
    }

    async fn resolve_jwks_uri(&self, force_refresh: bool) -> Result<String, AssertionError> {
        if !force_refresh {
            let cache = self.discovery_cache.read().await;
            if let Some(entry) = cache
                .as_ref()
                .filter(|entry| entry.expires_at > Instant::now())
            {
                return Ok(entry.jwks_uri.clone());
            }
        }

        let cached_jwks_uri = self
            .discovery_cache
            .read()
            .await
            .as_ref()
            .map(|entry| entry.jwks_uri.clone());

        match self.http_client.get(&self.discovery_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let ttl = cache_ttl_from_headers(resp.headers(), DEFAULT_CACHE_TTL);
                let discovery: OpenIdConfig = resp.json().await.map_err(|e| {
                    AssertionError::Unavailable(format!("invalid discovery JSON: {e}"))
                })?;

                *self.discovery_cache.write().await = Some(DiscoveryCacheEntry {
                    jwks_uri: discovery.jwks_uri.clone(),
                    expires_at: Instant::now() + ttl,
                });

                Ok(discovery.jwks_uri)
            }
            Ok(resp) => {
                tracing::warn!(
                    status = %resp.status(),
                    "OIDC discovery returned non-success status; using fallback JWKS URI"
                );
                Ok(cached_jwks_uri.unwrap_or_else(|| self.fallback_jwks_url.clone()))
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "OIDC discovery request failed; using fallback JWKS URI"
                );
                Ok(cached_jwks_uri.unwrap_or_else(|| self.fallback_jwks_url.clone()))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenIdConfig {
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    // RSA only; EC and oct keys carry other members.
    n: Option<String>,
    e: Option<String>,
    #[serde(rename = "use")]
    use_: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleIdTokenClaims {
    sub: String,
    iat: Option<usize>,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
}

/// Keep RSA signing keys with a kid; skip anything else.
fn usable_keys(jwks: Jwks) -> HashMap<String, Arc<DecodingKey>> {
    let mut keys_by_kid = HashMap::new();

    for jwk in jwks.keys {
        if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
            continue;
        }
        if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
            continue;
        }
        if jwk.use_.as_deref().is_some_and(|use_| use_ != "sig") {
            continue;
        }

        let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
            tracing::warn!(kid = %jwk.kid, "Skipping RSA JWKS key without modulus or exponent");
            continue;
        };

        match DecodingKey::from_rsa_components(n, e) {
            Ok(key) => {
                keys_by_kid.insert(jwk.kid, Arc::new(key));
            }
            Err(e) => {
                tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
            }
        }
    }

    keys_by_kid
}

fn validate_iat(iat: Option<usize>) -> Result<(), AssertionError> {
    let Some(iat) = iat else {
        return Err(AssertionError::Rejected("missing iat claim".to_string()));
    };

    if iat as u64 > now_unix_secs() + CLOCK_SKEW_SECS {
        return Err(AssertionError::Rejected(
            "iat claim is in the future".to_string(),
        ));
    }

    Ok(())
}

fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    value.split(',').find_map(|directive| {
        directive
            .trim()
            .strip_prefix("max-age=")
            .and_then(|raw| raw.trim_matches('"').parse::<u64>().ok())
    })
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
