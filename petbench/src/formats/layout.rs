//! Catalogue-style result trees of the reachability benchmarks.
//!
//! ```text
//! <results>/<model>/[<parameters>/]constants
//! <results>/<model>/[<parameters>/]<name>.setup   complete | unbounded,<H> | bounded,<H>,<steps>
//! <results>/<model>/[<parameters>/]<name>.{out,status,time}
//! <results>/<model>/[<parameters>/]<name>.json    only if the tool finished
//! ```

use std::{
    collections::BTreeSet,
    fmt::Display,
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use log::{info, warn};
use serde_json::Value;
use thiserror::Error;

use crate::{catalogue::Heuristic, config::ConfigError};

use super::{
    Artifact, classify,
    json::{FailureTag, Instance, InstanceResults, Outcome, ResultsDocument},
    with_suffix,
};

/// Files every experiment must have produced to be considered.
pub const EXPECTED_FILES: [&str; 4] = [".out", ".status", ".time", ".setup"];

pub const CONSTANTS_FILE: &str = "constants";

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// What an experiment computed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExperimentKind {
    Complete,
    Unbounded(Heuristic),
    Bounded(Heuristic, u64),
}

impl FromStr for ExperimentKind {
    type Err = ConfigError;

    fn from_str(setup: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = setup.trim().split(',').map(str::trim).collect();
        let malformed = || ConfigError::MalformedSetup(setup.trim().to_owned());
        match fields.as_slice() {
            ["complete", ..] => Ok(ExperimentKind::Complete),
            ["unbounded", heuristic, ..] => Ok(ExperimentKind::Unbounded(heuristic.parse()?)),
            ["bounded", heuristic, steps, ..] => Ok(ExperimentKind::Bounded(
                heuristic.parse()?,
                steps.parse().map_err(|_| malformed())?,
            )),
            _ => Err(malformed()),
        }
    }
}

impl Display for ExperimentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExperimentKind::Complete => write!(f, "complete"),
            ExperimentKind::Unbounded(heuristic) => write!(f, "unbounded,{heuristic}"),
            ExperimentKind::Bounded(heuristic, steps) => write!(f, "bounded,{heuristic},{steps}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Experiment {
    pub base: PathBuf,
    pub kind: ExperimentKind,
}

/// All experiments of one model under one set of constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInstance {
    pub constants: String,
    pub experiments: Vec<Experiment>,
}

fn sorted_dirs(path: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Reads the experiments of one parameter folder, skipping incomplete or invalid ones.
pub fn scan_parameter_folder(folder: &Path) -> io::Result<ParameterInstance> {
    let constants = fs::read_to_string(folder.join(CONSTANTS_FILE))?
        .trim_end()
        .to_owned();

    let mut names = BTreeSet::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(name) = name.to_str().and_then(|name| name.strip_suffix(".setup")) {
            names.insert(name.to_owned());
        }
    }

    let mut experiments = Vec::new();
    for name in names {
        let base = folder.join(&name);
        if let Some(missing) = EXPECTED_FILES
            .iter()
            .find(|expected| !with_suffix(&base, expected).is_file())
        {
            warn!("Experiment {} is missing {missing}", base.display());
            continue;
        }
        let setup = fs::read_to_string(with_suffix(&base, ".setup"))?;
        match setup.parse::<ExperimentKind>() {
            Ok(kind) => experiments.push(Experiment { base, kind }),
            Err(err) => warn!("{err} in {}", base.display()),
        }
    }

    Ok(ParameterInstance {
        constants,
        experiments,
    })
}

/// Reads all parameter instances of one model directory.
pub fn scan_model(model_dir: &Path) -> io::Result<Vec<ParameterInstance>> {
    let folders = if model_dir.join(CONSTANTS_FILE).is_file() {
        vec![model_dir.to_path_buf()]
    } else {
        sorted_dirs(model_dir)?
            .into_iter()
            .filter(|folder| folder.join(CONSTANTS_FILE).is_file())
            .collect()
    };
    folders
        .iter()
        .map(|folder| scan_parameter_folder(folder))
        .collect()
}

/// Picks the part of the tool's JSON output belonging to `kind`.
fn select<'v>(json: &'v Value, kind: &ExperimentKind) -> Option<&'v Value> {
    match kind {
        ExperimentKind::Complete => json.get("model"),
        ExperimentKind::Unbounded(heuristic) => json.get("unbounded")?.get(heuristic.as_str()),
        ExperimentKind::Bounded(heuristic, steps) => json
            .get("bounded")?
            .get(steps.to_string())?
            .get(heuristic.as_str()),
    }
}

/// The outcome of one experiment; unreadable output counts as a generic failure.
pub fn read_outcome(experiment: &Experiment, memout_marker: &str) -> Outcome {
    let artifact = Artifact::json(&experiment.base);
    if let Some(tag) = classify(&artifact, memout_marker) {
        return Outcome::Failure(tag);
    }
    let parsed = fs::read_to_string(&artifact.result)
        .map_err(|err| err.to_string())
        .and_then(|source| serde_json::from_str::<Value>(&source).map_err(|err| err.to_string()))
        .and_then(|json| {
            select(&json, &experiment.kind)
                .cloned()
                .ok_or_else(|| format!("no entry for `{}`", experiment.kind))
        })
        .and_then(|value| serde_json::from_value::<Outcome>(value).map_err(|err| err.to_string()));
    match parsed {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!("{}: {err}", artifact.result.display());
            Outcome::Failure(FailureTag::Generic)
        }
    }
}

fn instance_results(instance: &ParameterInstance, memout_marker: &str) -> InstanceResults {
    let mut results = InstanceResults::default();
    for experiment in &instance.experiments {
        let outcome = read_outcome(experiment, memout_marker);
        match experiment.kind {
            ExperimentKind::Complete => results.complete = Some(outcome),
            ExperimentKind::Unbounded(heuristic) => {
                results
                    .unbounded
                    .insert(heuristic.as_str().to_owned(), outcome);
            }
            ExperimentKind::Bounded(heuristic, steps) => {
                results
                    .bounded
                    .entry(steps.to_string())
                    .or_default()
                    .insert(heuristic.as_str().to_owned(), outcome);
            }
        }
    }
    results
}

/// Builds the results document for every model directory below `results_dir`.
pub fn collect(results_dir: &Path, memout_marker: &str) -> Result<ResultsDocument, LayoutError> {
    if !results_dir.is_dir() {
        return Err(LayoutError::NotADirectory(results_dir.to_path_buf()));
    }
    let mut document = ResultsDocument::new();
    for model_dir in sorted_dirs(results_dir)? {
        let Some(model) = model_dir.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let instances = scan_model(&model_dir)?
            .iter()
            .map(|instance| Instance {
                constants: instance.constants.clone(),
                results: instance_results(instance, memout_marker),
            })
            .collect::<Vec<_>>();
        info!("Collected {} instances of {model}.", instances.len());
        document.insert(model.to_owned(), instances);
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_setup_lines() {
        assert_eq!("complete\n".parse::<ExperimentKind>().unwrap(), ExperimentKind::Complete);
        assert_eq!(
            "unbounded,PROB".parse::<ExperimentKind>().unwrap(),
            ExperimentKind::Unbounded(Heuristic::Prob)
        );
        assert_eq!(
            "bounded,GRAPH_WEIGHTED,200".parse::<ExperimentKind>().unwrap(),
            ExperimentKind::Bounded(Heuristic::GraphWeighted, 200)
        );
    }

    #[test]
    fn rejects_invalid_setups() {
        assert!(matches!(
            "unbounded,RANDOM".parse::<ExperimentKind>(),
            Err(ConfigError::UnknownHeuristic(_))
        ));
        assert!(matches!(
            "bounded,PROB,many".parse::<ExperimentKind>(),
            Err(ConfigError::MalformedSetup(_))
        ));
        assert!("".parse::<ExperimentKind>().is_err());
    }

    #[test]
    fn setup_lines_round_trip_through_display() {
        let kind = ExperimentKind::Bounded(Heuristic::Difference, 10);
        assert_eq!(kind.to_string().parse::<ExperimentKind>().unwrap(), kind);
    }
}
