// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Deck shapes accepted for migration and written to the deck store.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Number of cards every deck must contain.
pub const DECK_SIZE: usize = 8;
/// Maximum number of evolution slots per deck.
pub const MAX_EVOLUTION_SLOTS: usize = 2;
/// Maximum deck name length (after trimming).
pub const MAX_DECK_NAME_LEN: usize = 100;
/// Name given to imported decks that arrive without one.
pub const DEFAULT_DECK_NAME: &str = "Imported Deck";

/// Reference to a catalog card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRef {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elixir_cost: Option<u8>,
}

/// A deck as held by an anonymous client, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeckDraft {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cards: Vec<CardRef>,
    #[serde(default)]
    pub evolution_slots: Vec<CardRef>,
}

/// A structurally valid deck ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDeck {
    pub name: String,
    pub cards: Vec<CardRef>,
    pub evolution_slots: Vec<CardRef>,
    pub average_elixir: Option<f64>,
}

/// Persisted deck document (`decks/{id}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDeck {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub cards: Vec<CardRef>,
    pub evolution_slots: Vec<CardRef>,
    pub average_elixir: Option<f64>,
    pub created_at: String,
}

impl StoredDeck {
    /// A fresh row for `deck`, owned by `user_id`.
    pub fn imported(user_id: &str, deck: &NewDeck, created_at: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: deck.name.clone(),
            cards: deck.cards.clone(),
            evolution_slots: deck.evolution_slots.clone(),
            average_elixir: deck.average_elixir,
            created_at: created_at.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeckValidationError {
    #[error("deck must contain exactly 8 cards, got {0}")]
    WrongCardCount(usize),

    #[error("deck may have at most 2 evolution slots, got {0}")]
    TooManyEvolutionSlots(usize),

    #[error("evolution slot card {0} is not in the deck")]
    EvolutionNotInDeck(u32),

    #[error("deck name must be 1-100 characters")]
    InvalidName,
}

impl DeckDraft {
    /// Check the structural deck rules and produce a [`NewDeck`].
    pub fn validate(&self) -> Result<NewDeck, DeckValidationError> {
        if self.cards.len() != DECK_SIZE {
            return Err(DeckValidationError::WrongCardCount(self.cards.len()));
        }

        if self.evolution_slots.len() > MAX_EVOLUTION_SLOTS {
            return Err(DeckValidationError::TooManyEvolutionSlots(
                self.evolution_slots.len(),
            ));
        }

        let deck_ids: HashSet<u32> = self.cards.iter().map(|c| c.id).collect();
        if let Some(stray) = self
            .evolution_slots
            .iter()
            .find(|evo| !deck_ids.contains(&evo.id))
        {
            return Err(DeckValidationError::EvolutionNotInDeck(stray.id));
        }

        let name = match self.name.as_deref().map(str::trim) {
            None => DEFAULT_DECK_NAME.to_string(),
            Some(n) if n.is_empty() || n.chars().count() > MAX_DECK_NAME_LEN => {
                return Err(DeckValidationError::InvalidName)
            }
            Some(n) => n.to_string(),
        };

        Ok(NewDeck {
            name,
            cards: self.cards.clone(),
            evolution_slots: self.evolution_slots.clone(),
            average_elixir: average_elixir(&self.cards),
        })
    }
}

/// Mean elixir cost, when every card carries one.
fn average_elixir(cards: &[CardRef]) -> Option<f64> {
    let costs: Option<Vec<u8>> = cards.iter().map(|c| c.elixir_cost).collect();
    let costs = costs?;
    if costs.is_empty() {
        return None;
    }
    let total: u32 = costs.iter().map(|&c| u32::from(c)).sum();
    Some(f64::from(total) / costs.len() as f64)
}
