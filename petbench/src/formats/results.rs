//! Loading of result directories written by [`crate::runner`].
//!
//! The layout is `<root>/iteration<i>/<k>` where `<k>` is a small run index. Next to every
//! result the runner leaves `<k>.setup`, `<k>.out`, `<k>.status` and `<k>.time`.

use std::{
    collections::BTreeSet,
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, warn};

use crate::record::{ExperimentRecord, FailureTag, TrailingScalar};

use super::{
    Artifact, DEFAULT_MEMOUT_MARKER, classify, invocation::Invocation, text, with_suffix,
};

/// Prefix of per-trial subdirectories.
pub const ITERATION_PREFIX: &str = "iteration";

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub trailing: TrailingScalar,
    pub memout_marker: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            trailing: TrailingScalar::default(),
            memout_marker: DEFAULT_MEMOUT_MARKER.to_owned(),
        }
    }
}

/// Returns the run index if `name` looks like `<k>` or `<k>.<ext>`.
fn run_index(name: &str) -> Option<u64> {
    name.split('.').next()?.parse().ok()
}

/// The invocation recorded for a run, either echoed into its result or written by the runner.
fn recorded_invocation(base: &Path) -> Option<Invocation> {
    let setup = fs::read_to_string(with_suffix(base, ".setup")).ok();
    let echoed = fs::read_to_string(base)
        .ok()
        .and_then(|source| source.lines().next().map(str::to_owned));
    [setup, echoed]
        .into_iter()
        .flatten()
        .find_map(|line| Invocation::parse(line.trim()).ok())
}

fn failed_record(
    base: &Path,
    failure: FailureTag,
    iteration_number: usize,
) -> Option<ExperimentRecord> {
    match recorded_invocation(base) {
        Some(invocation) => Some(ExperimentRecord::failed(
            invocation.model_name.clone(),
            invocation.config_axis(),
            failure,
            iteration_number,
        )),
        None => {
            warn!(
                "Skipping {}: run failed ({failure}) and names no model.",
                base.display()
            );
            None
        }
    }
}

/// Loads one run `<dir>/<k>`.
pub fn load_run(
    base: &Path,
    iteration_number: usize,
    options: &LoadOptions,
) -> Option<ExperimentRecord> {
    let artifact = Artifact::text(base);
    if let Some(failure) = classify(&artifact, &options.memout_marker) {
        debug!("{} classified as {failure}.", base.display());
        return failed_record(base, failure, iteration_number);
    }
    match text::parse_file(base, options.trailing, iteration_number) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!("{err}");
            failed_record(base, FailureTag::Generic, iteration_number)
        }
    }
}

/// Loads all runs of one trial directory, ordered by run index.
pub fn load_iteration_dir(
    dir: &Path,
    iteration_number: usize,
    options: &LoadOptions,
) -> io::Result<Vec<ExperimentRecord>> {
    let mut indices = BTreeSet::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(index) = entry.file_name().to_str().and_then(run_index) {
            indices.insert(index);
        }
    }
    Ok(indices
        .into_iter()
        .filter_map(|index| load_run(&dir.join(index.to_string()), iteration_number, options))
        .collect())
}

/// The trial directories below `root` with their iteration numbers.
///
/// Directories named `iteration<i>` get number `i`, any other directory is numbered by its
/// position in name order.
pub fn iteration_dirs(root: &Path) -> io::Result<Vec<(usize, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    let mut numbered = dirs
        .into_iter()
        .enumerate()
        .map(|(position, path)| {
            let number = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix(ITERATION_PREFIX))
                .and_then(|number| number.parse().ok())
                .unwrap_or(position);
            (number, path)
        })
        .collect::<Vec<_>>();
    numbered.sort_by_key(|(number, _)| *number);
    Ok(numbered)
}

/// Loads every trial below `root`.
pub fn load_results_dir(root: &Path, options: &LoadOptions) -> io::Result<Vec<ExperimentRecord>> {
    let mut records = Vec::new();
    for (iteration_number, dir) in iteration_dirs(root)? {
        let loaded = load_iteration_dir(&dir, iteration_number, options)?;
        debug!("Loaded {} runs from {}.", loaded.len(), dir.display());
        records.extend(loaded);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_index_accepts_numeric_stems() {
        assert_eq!(run_index("12"), Some(12));
        assert_eq!(run_index("12.out"), Some(12));
        assert_eq!(run_index("toy.txt"), None);
    }

    #[test]
    fn iteration_numbers_come_from_names_or_positions() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["iteration3", "iteration10", "adhoc", "base"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let numbered = iteration_dirs(dir.path())
            .unwrap()
            .into_iter()
            .map(|(number, path)| {
                let name = path.file_name().unwrap().to_str().unwrap().to_owned();
                (number, name)
            })
            .collect::<Vec<_>>();
        // Sorted names: adhoc, base, iteration10, iteration3.
        assert_eq!(
            numbered,
            vec![
                (0, "adhoc".to_owned()),
                (1, "base".to_owned()),
                (3, "iteration3".to_owned()),
                (10, "iteration10".to_owned()),
            ]
        );
    }
}
