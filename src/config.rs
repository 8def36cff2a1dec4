// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Loaded once at startup. The JWT signing key lives here and is handed to
//! the token service at construction, so nothing reads it from ambient state.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Minimum accepted length for the HS256 signing key.
const MIN_SIGNING_KEY_LEN: usize = 32;

const GOOGLE_DISCOVERY_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";
const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Which persistence backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Firestore,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Invalid(format!(
                "STORAGE_BACKEND must be 'firestore' or 'memory', got '{other}'"
            ))),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Google OAuth client ID; the required `aud` of identity assertions
    pub google_client_id: String,
    /// Frontend URL (CORS origin)
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Persistence backend
    pub storage_backend: StorageBackend,
    /// Server port
    pub port: u16,
    /// Access token lifetime
    pub access_token_ttl: Duration,
    /// Refresh token lifetime
    pub refresh_token_ttl: Duration,
    /// Clock-skew leeway applied to first-party token expiry
    pub token_leeway: Duration,
    /// Bound on identity-provider key fetches
    pub oidc_http_timeout: Duration,
    /// OpenID discovery document naming the provider's JWKS
    pub oidc_discovery_url: String,
    /// JWKS used when discovery is unreachable
    pub oidc_fallback_jwks_url: String,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Deterministic config for tests.
    pub fn test_default() -> Self {
        Self {
            google_client_id: "test-client-id.apps.googleusercontent.com".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            storage_backend: StorageBackend::Memory,
            port: 8080,
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            token_leeway: Duration::from_secs(30),
            oidc_http_timeout: Duration::from_secs(5),
            oidc_discovery_url: GOOGLE_DISCOVERY_URL.to_string(),
            oidc_fallback_jwks_url: GOOGLE_JWKS_URL.to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_signing_key = env::var("JWT_SIGNING_KEY")
            .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
            .trim()
            .as_bytes()
            .to_vec();

        if jwt_signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(ConfigError::Invalid(format!(
                "JWT_SIGNING_KEY must be at least {MIN_SIGNING_KEY_LEN} bytes"
            )));
        }

        Ok(Self {
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_ID"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            storage_backend: env::var("STORAGE_BACKEND")
                .unwrap_or_else(|_| "firestore".to_string())
                .parse()?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            access_token_ttl: scaled_secs("ACCESS_TOKEN_TTL_MINUTES", 15, 60)?,
            refresh_token_ttl: scaled_secs("REFRESH_TOKEN_TTL_DAYS", 7, 24 * 60 * 60)?,
            token_leeway: scaled_secs("TOKEN_LEEWAY_SECS", 30, 1)?,
            oidc_http_timeout: scaled_secs("OIDC_HTTP_TIMEOUT_SECS", 5, 1)?,
            oidc_discovery_url: env::var("OIDC_DISCOVERY_URL")
                .unwrap_or_else(|_| GOOGLE_DISCOVERY_URL.to_string()),
            oidc_fallback_jwks_url: env::var("OIDC_JWKS_URL")
                .unwrap_or_else(|_| GOOGLE_JWKS_URL.to_string()),
            jwt_signing_key,
        })
    }
}

fn parse_or(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{name} must be a non-negative integer"))),
        Err(_) => Ok(default),
    }
}

/// Read `name` in units of `unit_secs` seconds.
fn scaled_secs(name: &'static str, default: u64, unit_secs: u64) -> Result<Duration, ConfigError> {
    parse_or(name, default)?
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Invalid(format!("{name} is out of range")))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("GOOGLE_CLIENT_ID", "client.apps.googleusercontent.com");
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!!");
        env::set_var("STORAGE_BACKEND", "memory");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.google_client_id, "client.apps.googleusercontent.com");
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.access_token_ttl, Duration::from_secs(900));
        assert_eq!(config.refresh_token_ttl, Duration::from_secs(604_800));
        assert_eq!(config.token_leeway, Duration::from_secs(30));
    }

    #[test]
    fn test_ttl_overflow_is_rejected() {
        env::set_var("DECKVAULT_TEST_HUGE_TTL", u64::MAX.to_string());

        assert!(matches!(
            scaled_secs("DECKVAULT_TEST_HUGE_TTL", 7, 24 * 60 * 60),
            Err(ConfigError::Invalid(_))
        ));
        assert_eq!(
            scaled_secs("DECKVAULT_TEST_HUGE_TTL", 7, 1).unwrap(),
            Duration::from_secs(u64::MAX)
        );
        assert_eq!(
            scaled_secs("DECKVAULT_TEST_UNSET_TTL", 15, 60).unwrap(),
            Duration::from_secs(900)
        );
    }

    #[test]
    fn test_storage_backend_parse() {
        assert_eq!(
            "Firestore".parse::<StorageBackend>().unwrap(),
            StorageBackend::Firestore
        );
        assert_eq!(
            " memory ".parse::<StorageBackend>().unwrap(),
            StorageBackend::Memory
        );
        assert!("postgres".parse::<StorageBackend>().is_err());
    }
}
