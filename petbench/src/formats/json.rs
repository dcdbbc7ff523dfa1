//! The JSON results document of the reachability benchmarks.
//!
//! Structure:
//!
//! ```text
//! model -> [instance]
//! instance: { "constants": ..., "results": results }
//! results: "complete" -> outcome,
//!          "unbounded" -> heuristic -> outcome,
//!          "bounded" -> steps -> heuristic -> outcome
//! outcome: "timeout" | "memout" | "generic" | { "time", "states" | "explored-states", "components" }
//! ```

use std::{
    collections::BTreeMap,
    fs,
    io::{self, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

pub use crate::record::FailureTag;
use crate::record::Status;

use super::ParseError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Components {
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_size: Option<f64>,
}

/// A successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunData {
    pub time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub states: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explored_states: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

impl RunData {
    /// Explored states if reported separately, otherwise all states.
    pub fn core_states(&self) -> Option<u64> {
        self.explored_states.or(self.states)
    }
}

/// A leaf of the results document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome {
    Failure(FailureTag),
    Done(RunData),
}

impl Outcome {
    pub fn status(&self) -> Status {
        match self {
            Outcome::Failure(tag) => tag.status(),
            Outcome::Done(_) => Status::Success,
        }
    }

    pub fn data(&self) -> Option<&RunData> {
        match self {
            Outcome::Failure(_) => None,
            Outcome::Done(data) => Some(data),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstanceResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete: Option<Outcome>,
    #[serde(default)]
    pub unbounded: BTreeMap<String, Outcome>,
    #[serde(default)]
    pub bounded: BTreeMap<String, BTreeMap<String, Outcome>>,
}

impl InstanceResults {
    /// The complete run, a missing one counts as `missing`.
    pub fn complete_or(&self, missing: FailureTag) -> Outcome {
        self.complete.clone().unwrap_or(Outcome::Failure(missing))
    }

    pub fn unbounded(&self, heuristic: &str) -> Option<&Outcome> {
        self.unbounded.get(heuristic)
    }

    pub fn bounded(&self, steps: u64, heuristic: &str) -> Option<&Outcome> {
        self.bounded
            .get(&steps.to_string())
            .and_then(|by_heuristic| by_heuristic.get(heuristic))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub constants: String,
    pub results: InstanceResults,
}

pub type ResultsDocument = BTreeMap<String, Vec<Instance>>;

pub fn parse(input: &str) -> Result<ResultsDocument, ParseError> {
    serde_json::from_str(input).map_err(|err| ParseError(format!("Invalid results document: {err}")))
}

pub fn read(path: &Path) -> Result<ResultsDocument, ParseError> {
    let source = fs::read_to_string(path)
        .map_err(|err| ParseError(format!("Unable to read {}: {err}", path.display())))?;
    parse(&source)
}

pub fn write(document: &ResultsDocument, path: &Path) -> io::Result<()> {
    let mut out = io::BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer(&mut out, document)?;
    out.flush()
}
