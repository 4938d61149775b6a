//! Kill and death tally of connected players, keyed by player number.

use shared::Score;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
pub struct Scoreboard {
    scores: BTreeMap<String, Score>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a player with a zeroed score. An existing entry is kept.
    pub fn add(&mut self, symbol: &str) {
        self.scores.entry(symbol.to_string()).or_default();
    }

    pub fn remove(&mut self, symbol: &str) -> Option<Score> {
        self.scores.remove(symbol)
    }

    pub fn increase_kills(&mut self, symbol: &str) {
        if let Some(score) = self.scores.get_mut(symbol) {
            score.kills += 1;
        }
    }

    pub fn increase_deaths(&mut self, symbol: &str) {
        if let Some(score) = self.scores.get_mut(symbol) {
            score.deaths += 1;
        }
    }

    pub fn get(&self, symbol: &str) -> Option<Score> {
        self.scores.get(symbol).copied()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Score> {
        self.scores.clone()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}
