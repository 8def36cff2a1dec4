// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! DeckVault auth: sign-in and session service for the DeckVault deck builder
//!
//! This crate exchanges Google identity assertions for first-party session
//! tokens, keeps one account per external identity, and imports decks built
//! anonymously before the first sign-in.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::SessionApi;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub session: SessionApi,
}
