//! Tables the aggregator needs and how to override them.
//!
//! Defaults come from [`crate::catalogue`]. A JSON file with any subset of the fields replaces
//! the corresponding defaults:
//!
//! ```json
//! { "max-rewards": { "toy": 2.0 }, "timeout-ceiling-secs": 600 }
//! ```

use std::{fs, io, path::Path};

use ahash::AHashMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    catalogue::{self, BenchmarkSet},
    formats::DEFAULT_MEMOUT_MARKER,
};

/// Mean runtime in seconds at or above which a group counts as timed out.
pub const DEFAULT_TIMEOUT_CEILING_SECS: f64 = 1800.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown heuristic `{0}`.")]
    UnknownHeuristic(String),
    #[error("Malformed experiment setup `{0}`.")]
    MalformedSetup(String),
    #[error("Descriptor `{0}` names no model file.")]
    MalformedDescriptor(String),
    #[error("Unable to read configuration: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Maximum reward of each model, used to scale bounds into `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Normalization(AHashMap<String, f64>);

impl Normalization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: impl Into<String>, max_reward: f64) {
        self.0.insert(model.into(), max_reward);
    }

    pub fn get(&self, model: &str) -> Option<f64> {
        self.0.get(model).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for Normalization {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub max_rewards: Normalization,
    pub true_values: AHashMap<String, f64>,
    pub timeout_ceiling_secs: f64,
    pub memout_marker: String,
}

impl Default for Config {
    fn default() -> Self {
        let mut max_rewards = Normalization::new();
        for set in BenchmarkSet::ALL {
            for descriptor in set.descriptors() {
                match descriptor.model_name() {
                    Ok(model) => max_rewards.insert(model, descriptor.max_reward),
                    Err(err) => warn!("{err}"),
                }
            }
        }
        let true_values = catalogue::true_values()
            .into_iter()
            .map(|(model, value)| (model.to_owned(), value))
            .collect();
        Self {
            max_rewards,
            true_values,
            timeout_ceiling_secs: DEFAULT_TIMEOUT_CEILING_SECS,
            memout_marker: DEFAULT_MEMOUT_MARKER.to_owned(),
        }
    }
}

impl Config {
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::parse(&fs::read_to_string(path)?)?;
        debug!(
            "Loaded {} normalization constants and {} true values from {}.",
            config.max_rewards.len(),
            config.true_values.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn true_value(&self, model: &str) -> Option<f64> {
        self.true_values.get(model).copied()
    }
}
