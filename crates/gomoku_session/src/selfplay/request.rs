//! Parameters of a self-play calibration run.

use serde_json::{Value, json};
use tracing::debug;

use crate::types::ProfileRating;

/// Lowest engine level accepted for calibration.
pub const MIN_LEVEL: u8 = 1;
/// Highest engine level accepted for calibration.
pub const MAX_LEVEL: u8 = 12;

/// Arguments of `start_self_play`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfPlayRequest {
    /// Games played for every profile pairing.
    pub games_per_pair: u32,
    /// Games run concurrently by the engine.
    pub parallelism: u32,
    /// Whether language-model profiles take part.
    pub include_llm: bool,
    /// Language-model profiles taking part; ignored unless `include_llm`.
    pub llm_ids: Vec<String>,
    /// Lowest heuristic level taking part.
    pub min_level: u8,
    /// Highest heuristic level taking part.
    pub max_level: u8,
}

impl Default for SelfPlayRequest {
    fn default() -> Self {
        Self {
            games_per_pair: 4,
            parallelism: 4,
            include_llm: false,
            llm_ids: Vec::new(),
            min_level: MIN_LEVEL,
            max_level: MAX_LEVEL,
        }
    }
}

impl SelfPlayRequest {
    /// Toggles language-model participation.
    ///
    /// Enabling selects every language-model profile that already has a
    /// credential; disabling clears the selection.
    pub fn set_include_llm(&mut self, include: bool, profiles: &[ProfileRating]) {
        self.include_llm = include;
        self.llm_ids = if include {
            profiles
                .iter()
                .filter(|p| p.is_provisioned_llm())
                .map(|p| p.id.clone())
                .collect()
        } else {
            Vec::new()
        };
        debug!(include, selected = self.llm_ids.len(), "LLM participation toggled");
    }

    /// Checks the request against the ranges the engine accepts.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_level < MIN_LEVEL || self.max_level > MAX_LEVEL || self.min_level > self.max_level
        {
            return Err(format!(
                "Invalid level range {}..={} (allowed {}..={})",
                self.min_level, self.max_level, MIN_LEVEL, MAX_LEVEL
            ));
        }
        if self.include_llm && self.llm_ids.is_empty() {
            return Err("Select at least one LLM profile".to_string());
        }
        Ok(())
    }

    /// Encodes the wire arguments; `llmIds` is empty unless `include_llm`.
    pub(crate) fn to_args(&self) -> Value {
        let llm_ids: &[String] = if self.include_llm { &self.llm_ids } else { &[] };
        json!({
            "gamesPerPair": self.games_per_pair,
            "parallelism": self.parallelism.max(1),
            "includeLlm": self.include_llm,
            "llmIds": llm_ids,
            "minLevel": self.min_level,
            "maxLevel": self.max_level,
        })
    }
}
