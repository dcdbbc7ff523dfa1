//! A single trial of one model under one configuration.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// How a trial ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Success,
    Timeout,
    Memout,
    GenericError,
}

impl Status {
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Success => write!(f, "success"),
            Status::Timeout => write!(f, "timeout"),
            Status::Memout => write!(f, "memout"),
            Status::GenericError => write!(f, "generic"),
        }
    }
}

/// How a trial failed; also the error tag stored in the JSON results document.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureTag {
    Memout,
    Timeout,
    Generic,
}

impl FailureTag {
    pub fn status(&self) -> Status {
        match self {
            FailureTag::Memout => Status::Memout,
            FailureTag::Timeout => Status::Timeout,
            FailureTag::Generic => Status::GenericError,
        }
    }
}

impl Display for FailureTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.status())
    }
}

/// Meaning of the optional fourth data section of a text result.
///
/// The file itself does not say which one it is, the caller has to know the run mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrailingScalar {
    #[default]
    StatesExplored,
    MissingProbability,
}

/// One completed (or failed) trial.
///
/// Records are never mutated after construction. Failed records carry no series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub model_name: String,
    pub config_axis: Option<String>,
    pub times: Vec<f64>,
    pub lower_bounds: Vec<f64>,
    pub upper_bounds: Vec<f64>,
    pub states_explored: Option<u64>,
    pub missing_probability: Option<f64>,
    pub status: Status,
    pub iteration_number: usize,
}

impl ExperimentRecord {
    /// Creates a record for a trial which produced no bounds.
    pub fn failed(
        model_name: impl Into<String>,
        config_axis: Option<String>,
        failure: FailureTag,
        iteration_number: usize,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            config_axis,
            times: Vec::new(),
            lower_bounds: Vec::new(),
            upper_bounds: Vec::new(),
            states_explored: None,
            missing_probability: None,
            status: failure.status(),
            iteration_number,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Elapsed time between the first and the last sample in seconds.
    ///
    /// Samples are timestamps in milliseconds.
    pub fn runtime_seconds(&self) -> Option<f64> {
        let first = self.times.first()?;
        let last = self.times.last()?;
        Some((last - first) / 1000.0)
    }

    /// The bounds at the end of the trial.
    pub fn final_bounds(&self) -> Option<(f64, f64)> {
        Some((*self.lower_bounds.last()?, *self.upper_bounds.last()?))
    }

    /// Width of the final bound interval.
    pub fn precision(&self) -> Option<f64> {
        self.final_bounds().map(|(lower, upper)| upper - lower)
    }

    /// Whether any sample has its upper bound below its lower bound.
    pub fn has_inverted_bounds(&self) -> bool {
        self.lower_bounds
            .iter()
            .zip(self.upper_bounds.iter())
            .any(|(lower, upper)| upper < lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ExperimentRecord {
        ExperimentRecord {
            model_name: "toy".to_owned(),
            config_axis: None,
            times: vec![1000.0, 2500.0, 4000.0],
            lower_bounds: vec![0.0, 0.5, 0.9],
            upper_bounds: vec![1.0, 1.0, 1.1],
            states_explored: Some(42),
            missing_probability: None,
            status: Status::Success,
            iteration_number: 0,
        }
    }

    #[test]
    fn runtime_is_measured_from_first_sample() {
        assert_eq!(sample().runtime_seconds(), Some(3.0));
    }

    #[test]
    fn precision_uses_final_bounds() {
        let precision = sample().precision().unwrap();
        assert!((precision - 0.2).abs() < 1e-12);
    }

    #[test]
    fn failed_records_have_no_series() {
        let record = ExperimentRecord::failed("toy", None, FailureTag::Memout, 3);
        assert_eq!(record.status, Status::Memout);
        assert!(!record.is_success());
        assert!(record.runtime_seconds().is_none());
        assert!(record.final_bounds().is_none());
        assert_eq!(record.iteration_number, 3);
    }

    #[test]
    fn detects_inverted_bounds() {
        let mut record = sample();
        assert!(!record.has_inverted_bounds());
        record.upper_bounds[1] = 0.4;
        assert!(record.has_inverted_bounds());
    }
}
