// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! DeckVault auth API server
//!
//! Signs users in with Google, issues session tokens, and imports decks
//! built before the first sign-in.

use deckvault_auth::{
    config::{Config, StorageBackend},
    db::{DeckStore, FirestoreDb, MemoryDb, UserStore},
    services::{
        GoogleIdentityVerifier, MigrationCoordinator, SessionApi, SessionTokenService,
        UserDirectory,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        backend = ?config.storage_backend,
        "Starting DeckVault auth API"
    );

    let (user_store, deck_store) = open_stores(&config).await?;

    let verifier = Arc::new(GoogleIdentityVerifier::new(&config)?);

    let session = SessionApi::new(
        verifier,
        UserDirectory::new(user_store),
        MigrationCoordinator::new(deck_store),
        SessionTokenService::from_config(&config),
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        session,
    });

    let app = deckvault_auth::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

type Stores = (Arc<dyn UserStore>, Arc<dyn DeckStore>);

async fn open_stores(config: &Config) -> Result<Stores, Box<dyn std::error::Error>> {
    match config.storage_backend {
        StorageBackend::Firestore => {
            let db = FirestoreDb::new(&config.gcp_project_id).await?;
            Ok((Arc::new(db.clone()), Arc::new(db)))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            let db = MemoryDb::new();
            Ok((Arc::new(db.clone()), Arc::new(db)))
        }
    }
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("deckvault_auth=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
