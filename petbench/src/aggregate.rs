//! Per-group statistics over experiment records.

use std::{cmp::Ordering, collections::BTreeMap, fmt::Display};

use ahash::AHashMap;
use itertools::Itertools;
use log::{debug, warn};
use thiserror::Error;

use crate::{
    config::{Config, Normalization},
    record::{ExperimentRecord, Status},
};

/// Printed in place of a runtime at or above the ceiling.
pub const TIMED_OUT: &str = "timed out";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Grouping {
    #[default]
    Model,
    ModelAndAxis,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub model: String,
    pub axis: Option<String>,
}

impl GroupKey {
    fn of(record: &ExperimentRecord, grouping: Grouping) -> Self {
        Self {
            model: record.model_name.clone(),
            axis: match grouping {
                Grouping::Model => None,
                Grouping::ModelAndAxis => record.config_axis.clone(),
            },
        }
    }
}

impl Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.axis {
            Some(axis) => write!(f, "{} [{axis}]", self.model),
            None => write!(f, "{}", self.model),
        }
    }
}

/// Failed trials of a group by kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Failures {
    pub timeouts: usize,
    pub memouts: usize,
    pub generic: usize,
}

impl Failures {
    fn count(&mut self, status: Status) {
        match status {
            Status::Success => {}
            Status::Timeout => self.timeouts += 1,
            Status::Memout => self.memouts += 1,
            Status::GenericError => self.generic += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.timeouts + self.memouts + self.generic
    }
}

impl Display for Failures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} timeouts, {} memouts, {} generic errors",
            self.timeouts, self.memouts, self.generic
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ReportedRuntime {
    Seconds(f64),
    TimedOut,
}

impl ReportedRuntime {
    pub fn new(mean_seconds: f64, ceiling_seconds: f64) -> Self {
        if mean_seconds >= ceiling_seconds {
            ReportedRuntime::TimedOut
        } else {
            ReportedRuntime::Seconds(mean_seconds)
        }
    }

    pub fn seconds(&self) -> Option<f64> {
        match self {
            ReportedRuntime::Seconds(seconds) => Some(*seconds),
            ReportedRuntime::TimedOut => None,
        }
    }
}

impl Display for ReportedRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportedRuntime::Seconds(seconds) => write!(f, "{seconds}"),
            ReportedRuntime::TimedOut => write!(f, "{TIMED_OUT}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSummary {
    pub key: GroupKey,
    pub sample_count: usize,
    pub success_count: usize,
    pub failures: Failures,
    pub mean_lower_bound: f64,
    pub mean_upper_bound: f64,
    pub mean_runtime_seconds: f64,
    pub mean_states_explored: Option<f64>,
    pub mean_missing_probability: Option<f64>,
    pub true_value: Option<f64>,
    pub runtime: ReportedRuntime,
    /// Successful trials whose final upper bound lies below the lower bound.
    pub inverted_bounds: usize,
}

impl AggregateSummary {
    pub fn precision(&self) -> f64 {
        self.mean_upper_bound - self.mean_lower_bound
    }

    pub fn failure_count(&self) -> usize {
        self.failures.total()
    }

    pub fn failure_rate(&self) -> f64 {
        self.failure_count() as f64 / self.sample_count as f64
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AggregateError {
    #[error("No successful runs for {key} ({failures} in {sample_count} samples).")]
    NoSuccessfulRuns {
        key: GroupKey,
        sample_count: usize,
        failures: Failures,
    },
    #[error("No normalization constant registered for `{0}`.")]
    MissingNormalization(String),
    #[error("No true value registered for `{0}`.")]
    MissingTrueValue(String),
}

#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub grouping: Grouping,
    /// Divide bounds and true values by each model's maximum reward.
    pub scaling: Option<Normalization>,
    /// Attach the known value of each model; a model without one is an error.
    pub true_values: Option<AHashMap<String, f64>>,
    pub timeout_ceiling_secs: f64,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            grouping: Grouping::default(),
            scaling: None,
            true_values: None,
            timeout_ceiling_secs: crate::config::DEFAULT_TIMEOUT_CEILING_SECS,
        }
    }
}

impl AggregateOptions {
    pub fn from_config(config: &Config, grouping: Grouping, scale: bool, compare: bool) -> Self {
        Self {
            grouping,
            scaling: scale.then(|| config.max_rewards.clone()),
            true_values: compare.then(|| config.true_values.clone()),
            timeout_ceiling_secs: config.timeout_ceiling_secs,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Summarizes the records of one group.
pub fn summarize_group(
    key: GroupKey,
    records: &[&ExperimentRecord],
    options: &AggregateOptions,
) -> Result<AggregateSummary, AggregateError> {
    let scale = match &options.scaling {
        Some(normalization) => normalization
            .get(&key.model)
            .ok_or_else(|| AggregateError::MissingNormalization(key.model.clone()))?,
        None => 1.0,
    };
    let true_value = match &options.true_values {
        Some(values) => Some(
            values
                .get(&key.model)
                .copied()
                .ok_or_else(|| AggregateError::MissingTrueValue(key.model.clone()))?
                / scale,
        ),
        None => None,
    };

    let mut failures = Failures::default();
    let mut finals = Vec::with_capacity(records.len());
    for record in records {
        failures.count(record.status);
        if let (true, Some(bounds), Some(runtime)) = (
            record.is_success(),
            record.final_bounds(),
            record.runtime_seconds(),
        ) {
            finals.push((record, bounds, runtime));
        }
    }
    if finals.is_empty() {
        return Err(AggregateError::NoSuccessfulRuns {
            key,
            sample_count: records.len(),
            failures,
        });
    }

    let inverted_bounds = finals
        .iter()
        .filter(|(_, (lower, upper), _)| upper < lower)
        .count();
    if inverted_bounds > 0 {
        warn!("{inverted_bounds} runs of {key} end with the upper bound below the lower bound.");
    }

    let n = finals.len() as f64;
    let mean_lower_bound = finals.iter().map(|(_, (lower, _), _)| lower / scale).sum::<f64>() / n;
    let mean_upper_bound = finals.iter().map(|(_, (_, upper), _)| upper / scale).sum::<f64>() / n;
    let mean_runtime_seconds = finals.iter().map(|(_, _, runtime)| runtime).sum::<f64>() / n;
    let mean_states_explored = mean(
        finals
            .iter()
            .filter_map(|(record, _, _)| record.states_explored.map(|states| states as f64)),
    );
    let mean_missing_probability =
        mean(finals.iter().filter_map(|(record, _, _)| record.missing_probability));

    debug!(
        "{key}: {} of {} runs succeeded.",
        finals.len(),
        records.len()
    );
    Ok(AggregateSummary {
        sample_count: records.len(),
        success_count: finals.len(),
        failures,
        mean_lower_bound,
        mean_upper_bound,
        mean_runtime_seconds,
        mean_states_explored,
        mean_missing_probability,
        true_value,
        runtime: ReportedRuntime::new(mean_runtime_seconds, options.timeout_ceiling_secs),
        inverted_bounds,
        key,
    })
}

/// Summaries by group, or why a group could not be summarized.
pub type Groups = BTreeMap<GroupKey, Result<AggregateSummary, AggregateError>>;

/// Groups `records` and summarizes every group.
///
/// The result is ordered by group key and depends only on the records, not on their order.
pub fn aggregate(records: &[ExperimentRecord], options: &AggregateOptions) -> Groups {
    let groups: BTreeMap<GroupKey, Vec<&ExperimentRecord>> = records
        .iter()
        .into_group_map_by(|record| GroupKey::of(record, options.grouping))
        .into_iter()
        .collect();
    groups
        .into_iter()
        .map(|(key, group)| {
            let summary = summarize_group(key.clone(), &group, options);
            (key, summary)
        })
        .collect()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Tightest bounds first, ties broken by name.
    #[default]
    Precision,
    Alphabetical,
}

pub fn sort_summaries(summaries: &mut [AggregateSummary], order: SortOrder) {
    match order {
        SortOrder::Precision => summaries.sort_by(|a, b| {
            a.precision()
                .total_cmp(&b.precision())
                .then_with(|| a.key.cmp(&b.key))
        }),
        SortOrder::Alphabetical => summaries.sort_by(|a, b| a.key.cmp(&b.key)),
    }
}

/// The successful runs of `records` ordered by the width of their final bounds.
pub fn leaderboard(records: &[ExperimentRecord]) -> Vec<&ExperimentRecord> {
    records
        .iter()
        .filter(|record| record.is_success())
        .sorted_by(|a, b| {
            let by_precision = match (a.precision(), b.precision()) {
                (Some(a_precision), Some(b_precision)) => a_precision.total_cmp(&b_precision),
                _ => Ordering::Equal,
            };
            by_precision.then_with(|| a.iteration_number.cmp(&b.iteration_number))
        })
        .collect()
}
