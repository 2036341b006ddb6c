//! Engine configuration
//!
//! Every field has a default, so a partial TOML or JSON document is enough.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub matcher: MatcherConfig,
    /// Flate-compress rewritten content streams
    pub recompress_streams: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            matcher: MatcherConfig::default(),
            recompress_streams: true,
        }
    }
}

/// Weights for ranking fallback candidates. These are heuristics, not
/// derived constants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatcherConfig {
    /// Score added per position of distance between run index and source index
    pub index_weight: f64,
    /// Score added per normalization tier needed to match
    pub normalization_penalty: f64,
    /// Search the whole page when the source index does not match
    pub global_search: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            index_weight: 10.0,
            normalization_penalty: 1.0,
            global_search: true,
        }
    }
}
