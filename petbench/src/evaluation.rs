//! Tables over the JSON results document of the reachability benchmarks.
//!
//! Every instance was analyzed once completely and then partially with each exploration
//! heuristic, both unbounded and for every step bound. The tables compare the partial runs to
//! the complete one.

use std::io::{self, Write};

use ahash::AHashMap;
use itertools::Itertools;
use log::debug;
use thiserror::Error;

use crate::{
    catalogue::{Heuristic, STEP_BOUNDS, model_groups},
    formats::json::{FailureTag, Outcome, ResultsDocument},
    report::{LatexTable, MISSING},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("Model `{0}` belongs to no model group.")]
    UnknownModel(String),
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation.
fn stdev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let variance =
        values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

fn group_of_model() -> AHashMap<&'static str, &'static str> {
    model_groups()
        .into_iter()
        .flat_map(|(group, files)| files.into_iter().map(move |file| (file, group)))
        .collect()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Method {
    Complete,
    Unbounded(Heuristic),
    Bounded(u64, Heuristic),
}

impl Method {
    /// All methods in table order.
    pub fn all() -> Vec<Method> {
        std::iter::once(Method::Complete)
            .chain(Heuristic::ALL.into_iter().map(Method::Unbounded))
            .chain(
                STEP_BOUNDS
                    .into_iter()
                    .cartesian_product(Heuristic::ALL)
                    .map(|(steps, heuristic)| Method::Bounded(steps, heuristic)),
            )
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
struct Tally {
    failures: usize,
    success: usize,
    time: Vec<f64>,
    states: Vec<f64>,
    fraction: Vec<f64>,
}

impl Tally {
    fn add(&mut self, outcome: &Outcome, complete_states: Option<u64>) {
        let Some(data) = outcome.data() else {
            self.failures += 1;
            return;
        };
        let states = data.core_states().unwrap_or_default() as f64;
        self.time.push(data.time);
        self.states.push(states);
        match complete_states {
            Some(complete) => self.fraction.push(states / complete as f64),
            None => self.success += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSummary {
    pub method: Method,
    pub mean_time: Option<f64>,
    pub mean_states: Option<f64>,
    /// Mean share of the complete run's states explored.
    pub mean_fraction: Option<f64>,
    pub failure_rate: f64,
    /// Share of instances finished by this method but not by the complete run.
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicStats {
    pub heuristic: Heuristic,
    pub mean: Option<f64>,
    pub stdev: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodTable {
    pub total: usize,
    pub rows: Vec<MethodSummary>,
}

/// Summarizes every method over all instances of `document`.
///
/// A missing complete run counts as a timeout.
pub fn method_table(document: &ResultsDocument) -> MethodTable {
    let methods = Method::all();
    let mut tallies = vec![Tally::default(); methods.len()];
    let mut total = 0;

    for instance in document.values().flatten() {
        let results = &instance.results;
        let complete = results.complete_or(FailureTag::Timeout);
        let complete_states = complete.data().and_then(|data| data.states);
        total += 1;

        for (method, tally) in methods.iter().zip(tallies.iter_mut()) {
            let outcome = match method {
                Method::Complete => Some(&complete),
                Method::Unbounded(heuristic) => results.unbounded(heuristic.as_str()),
                Method::Bounded(steps, heuristic) => results.bounded(*steps, heuristic.as_str()),
            };
            if let Some(outcome) = outcome {
                tally.add(outcome, complete_states);
            }
        }
    }

    let rate = |count: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64
        }
    };
    let rows = methods
        .into_iter()
        .zip(tallies)
        .map(|(method, tally)| MethodSummary {
            method,
            mean_time: mean(&tally.time),
            mean_states: mean(&tally.states),
            mean_fraction: mean(&tally.fraction),
            failure_rate: rate(tally.failures),
            success_rate: rate(tally.success),
        })
        .collect();
    debug!("Evaluated {total} instances.");
    MethodTable { total, rows }
}

fn or_missing(value: Option<f64>, render: impl Fn(f64) -> String) -> String {
    value.map_or_else(|| MISSING.to_owned(), render)
}

fn section(title: String) -> Vec<String> {
    let mut row = vec![format!("\\multicolumn{{6}}{{l}}{{{title}}}")];
    row.extend(std::iter::repeat_n(String::new(), 5));
    row
}

impl MethodTable {
    pub fn row(&self, method: Method) -> Option<&MethodSummary> {
        self.rows.iter().find(|row| row.method == method)
    }

    pub fn to_latex(&self) -> LatexTable {
        let mut table = LatexTable::new(
            ["", "Time", "States", "Fraction", "Failures", "Success"]
                .map(str::to_owned)
                .to_vec(),
        );
        let mut last_section = None;
        for row in &self.rows {
            let (name, current) = match row.method {
                Method::Complete => ("Complete".to_owned(), None),
                Method::Unbounded(heuristic) => (
                    format!("\\hspace{{1em}} {}", heuristic.latex_name()),
                    Some("Unbounded".to_owned()),
                ),
                Method::Bounded(steps, heuristic) => (
                    format!("\\hspace{{1em}} {}", heuristic.latex_name()),
                    Some(format!("Bounded {steps}")),
                ),
            };
            if current.is_some() && current != last_section {
                table.push(section(current.clone().unwrap_or_default()));
                last_section = current;
            }
            table.push(vec![
                name,
                or_missing(row.mean_time, |time| format!("{time:.0} s")),
                or_missing(row.mean_states, |states| format!("{states:.0}")),
                or_missing(row.mean_fraction, |fraction| format!("{:.0} \\%", fraction * 100.0)),
                format!("{:.0} \\%", row.failure_rate * 100.0),
                format!("{:.0} \\%", row.success_rate * 100.0),
            ]);
        }
        table
    }
}

/// Drops instances whose complete run failed or found a single component spanning all states.
pub fn filter_trivial(document: &ResultsDocument) -> ResultsDocument {
    document
        .iter()
        .filter_map(|(model, instances)| {
            let kept = instances
                .iter()
                .filter(|instance| {
                    let Some(Outcome::Done(complete)) = &instance.results.complete else {
                        return false;
                    };
                    match &complete.components {
                        Some(components) if components.count == 1 => {
                            components.average_size != complete.states.map(|states| states as f64)
                        }
                        _ => true,
                    }
                })
                .cloned()
                .collect_vec();
            (!kept.is_empty()).then(|| (model.clone(), kept))
        })
        .collect()
}

/// Explored states of each heuristic over the instances where all heuristics finished.
pub fn heuristic_comparison(document: &ResultsDocument) -> Vec<HeuristicStats> {
    let mut states: Vec<Vec<f64>> = vec![Vec::new(); Heuristic::ALL.len()];
    for instance in document.values().flatten() {
        let explored = Heuristic::ALL
            .iter()
            .map(|heuristic| {
                instance
                    .results
                    .unbounded(heuristic.as_str())
                    .and_then(Outcome::data)
                    .and_then(|data| data.core_states())
            })
            .collect::<Option<Vec<_>>>();
        if let Some(explored) = explored {
            for (values, count) in states.iter_mut().zip(explored) {
                values.push(count as f64);
            }
        }
    }
    Heuristic::ALL
        .into_iter()
        .zip(states)
        .map(|(heuristic, values)| HeuristicStats {
            heuristic,
            mean: mean(&values),
            stdev: stdev(&values),
        })
        .collect()
}

pub fn write_heuristic_comparison<W: Write>(
    out: &mut W,
    stats: &[HeuristicStats],
    total: usize,
) -> io::Result<()> {
    for stat in stats {
        writeln!(
            out,
            "{}, {}, {}",
            stat.heuristic,
            or_missing(stat.mean, |mean| format!("{mean:.0}")),
            or_missing(stat.stdev, |stdev| format!("{stdev:.0}"))
        )?;
    }
    writeln!(out, "Total instance count {total}")
}

#[derive(Debug, Clone, PartialEq, Default)]
struct HeuristicTally {
    ratios: Vec<f64>,
    failures: usize,
    success: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicGroupStats {
    pub heuristic: Heuristic,
    /// Mean of explored states relative to the complete run; failures count as `1`.
    pub mean_ratio: Option<f64>,
    pub failures: usize,
    /// Instances this heuristic finished but the complete run did not.
    pub success: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub group: String,
    pub count: usize,
    pub mean_complete_states: Option<f64>,
    pub complete_failures: usize,
    pub mean_components: Option<f64>,
    pub heuristics: Vec<HeuristicGroupStats>,
    max_components: Option<u64>,
}

impl GroupRow {
    fn sort_key(&self) -> (u8, f64) {
        let mean_ratio = mean(
            &self
                .heuristics
                .iter()
                .map(|stats| stats.mean_ratio.unwrap_or(1.0))
                .collect_vec(),
        )
        .unwrap_or(1.0);
        // Groups where no heuristic helps and every model is one component go last.
        let tier = if mean_ratio >= 0.999 && self.max_components == Some(1) {
            1
        } else {
            0
        };
        (tier, mean_ratio)
    }
}

/// One row per model group with instances, ordered by how much the heuristics save.
pub fn group_table(document: &ResultsDocument) -> Result<Vec<GroupRow>, EvaluationError> {
    let mapping = group_of_model();
    let mut rows = model_groups()
        .into_iter()
        .map(|(group, _)| {
            (
                group,
                (
                    0usize,
                    Vec::<f64>::new(),
                    0usize,
                    Vec::<u64>::new(),
                    vec![HeuristicTally::default(); Heuristic::ALL.len()],
                ),
            )
        })
        .collect::<Vec<_>>();

    for (model, instances) in document {
        let group = mapping
            .get(model.as_str())
            .ok_or_else(|| EvaluationError::UnknownModel(model.clone()))?;
        let Some((_, (count, complete_states, complete_failures, components, heuristics))) =
            rows.iter_mut().find(|(name, _)| name == group)
        else {
            continue;
        };
        *count += instances.len();
        for instance in instances {
            let results = &instance.results;
            let complete = results.complete_or(FailureTag::Generic);
            let states = match complete.data() {
                Some(data) => {
                    if let Some(states) = data.states {
                        complete_states.push(states as f64);
                    }
                    if let Some(found) = &data.components {
                        components.push(found.count);
                    }
                    data.states
                }
                None => {
                    *complete_failures += 1;
                    None
                }
            };
            for (heuristic, tally) in Heuristic::ALL.iter().zip(heuristics.iter_mut()) {
                match results
                    .unbounded(heuristic.as_str())
                    .and_then(Outcome::data)
                {
                    None => {
                        tally.failures += 1;
                        tally.ratios.push(1.0);
                    }
                    Some(data) => match states {
                        None => tally.success += 1,
                        Some(states) => tally
                            .ratios
                            .push(data.core_states().unwrap_or_default() as f64 / states as f64),
                    },
                }
            }
        }
    }

    let mut table = rows
        .into_iter()
        .filter(|(_, (count, ..))| *count > 0)
        .map(
            |(group, (count, complete_states, complete_failures, components, heuristics))| {
                GroupRow {
                    group: group.to_owned(),
                    count,
                    mean_complete_states: mean(&complete_states),
                    complete_failures,
                    mean_components: mean(
                        &components.iter().map(|count| *count as f64).collect_vec(),
                    ),
                    max_components: components.iter().copied().max(),
                    heuristics: Heuristic::ALL
                        .into_iter()
                        .zip(heuristics)
                        .map(|(heuristic, tally)| HeuristicGroupStats {
                            heuristic,
                            mean_ratio: mean(&tally.ratios),
                            failures: tally.failures,
                            success: tally.success,
                        })
                        .collect(),
                }
            },
        )
        .collect_vec();
    table.sort_by(|a, b| {
        let ((a_tier, a_mean), (b_tier, b_mean)) = (a.sort_key(), b.sort_key());
        a_tier
            .cmp(&b_tier)
            .then(a_mean.total_cmp(&b_mean))
            .then_with(|| a.group.cmp(&b.group))
    });
    Ok(table)
}

pub fn group_table_latex(rows: &[GroupRow]) -> LatexTable {
    let mut headers = ["Model", "Count", "C States", "C Fail", "Comp"]
        .map(str::to_owned)
        .to_vec();
    for heuristic in Heuristic::ALL {
        headers.push(heuristic.latex_name().to_owned());
        headers.push(String::new());
    }
    let mut table = LatexTable::new(headers);
    for row in rows {
        let mut cells = vec![
            row.group.clone(),
            row.count.to_string(),
            or_missing(row.mean_complete_states, |states| format!("{states:.0}")),
            row.complete_failures.to_string(),
            or_missing(row.mean_components, |components| format!("{components:.0}")),
        ];
        for stats in &row.heuristics {
            cells.push(or_missing(stats.mean_ratio, |ratio| {
                format!("{:.0}", ratio * 100.0)
            }));
            cells.push(stats.success.to_string());
        }
        table.push(cells);
    }
    table
}

/// Model groups shown in the state scatter plot.
pub const PLOT_GROUPS: [&str; 6] = ["zeroconf", "zeroconf\\_dl", "embedded", "wlan", "nand", "brp"];

/// `(complete states, fewest states of any heuristic, group index)` for every instance of
/// the given groups; runs that did not finish count as infinitely many states.
pub fn state_pairs(
    document: &ResultsDocument,
    groups: &[&str],
) -> Result<Vec<(f64, f64, usize)>, EvaluationError> {
    let mapping = group_of_model();
    let mut pairs = Vec::new();
    for (model, instances) in document {
        let group = mapping
            .get(model.as_str())
            .ok_or_else(|| EvaluationError::UnknownModel(model.clone()))?;
        let Some(index) = groups.iter().position(|name| name == group) else {
            continue;
        };
        for instance in instances {
            let results = &instance.results;
            let complete = results
                .complete
                .as_ref()
                .and_then(Outcome::data)
                .and_then(|data| data.states)
                .map_or(f64::INFINITY, |states| states as f64);
            let smallest = Heuristic::ALL
                .iter()
                .filter_map(|heuristic| {
                    results
                        .unbounded(heuristic.as_str())
                        .and_then(Outcome::data)
                        .and_then(|data| data.core_states())
                })
                .min()
                .map_or(f64::INFINITY, |states| states as f64);
            pairs.push((complete, smallest, index));
        }
    }
    Ok(pairs)
}

pub fn write_state_pairs<W: Write>(out: &mut W, pairs: &[(f64, f64, usize)]) -> io::Result<()> {
    let format = |value: f64| {
        if value.is_infinite() {
            "nan".to_owned()
        } else {
            format!("{value:.1}")
        }
    };
    for (complete, smallest, index) in pairs {
        writeln!(out, "{},{},{index}", format(*complete), format(*smallest))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::json;

    const DOCUMENT: &str = r#"{
        "brp.pm": [
            {"constants": "N=16", "results": {
                "complete": {"time": 10.0, "states": 1000, "components": {"count": 2, "average-size": 10.0}},
                "unbounded": {
                    "WEIGHTED": {"time": 2.0, "explored-states": 100},
                    "PROB": {"time": 4.0, "explored-states": 300},
                    "DIFFERENCE": {"time": 2.0, "explored-states": 200},
                    "GRAPH_WEIGHTED": {"time": 2.0, "explored-states": 100},
                    "GRAPH_DIFFERENCE": "memout"
                },
                "bounded": {"10": {"WEIGHTED": {"time": 1.0, "explored-states": 50}}}
            }},
            {"constants": "N=32", "results": {
                "complete": "timeout",
                "unbounded": {"WEIGHTED": {"time": 6.0, "explored-states": 500}},
                "bounded": {}
            }}
        ],
        "nand.pm": [
            {"constants": "N=5", "results": {
                "complete": {"time": 1.0, "states": 40, "components": {"count": 1, "average-size": 40.0}},
                "unbounded": {
                    "WEIGHTED": {"time": 1.0, "explored-states": 40},
                    "PROB": {"time": 1.0, "explored-states": 40},
                    "DIFFERENCE": {"time": 1.0, "explored-states": 40},
                    "GRAPH_WEIGHTED": {"time": 1.0, "explored-states": 40},
                    "GRAPH_DIFFERENCE": {"time": 1.0, "explored-states": 40}
                },
                "bounded": {}
            }}
        ]
    }"#;

    fn document() -> ResultsDocument {
        json::parse(DOCUMENT).unwrap()
    }

    #[test]
    fn method_table_counts_failures_and_rescues() {
        let table = method_table(&document());
        assert_eq!(table.total, 3);

        let complete = table.row(Method::Complete).unwrap();
        assert_eq!(complete.mean_states, Some(520.0));
        assert!((complete.failure_rate - 1.0 / 3.0).abs() < 1e-12);

        let weighted = table.row(Method::Unbounded(Heuristic::Weighted)).unwrap();
        assert_eq!(weighted.mean_time, Some(3.0));
        // The N=32 run finished although the complete run timed out.
        assert!((weighted.success_rate - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(weighted.mean_fraction, Some((0.1 + 1.0) / 2.0));

        let bounded = table
            .row(Method::Bounded(10, Heuristic::Weighted))
            .unwrap();
        assert_eq!(bounded.mean_states, Some(50.0));
        let empty = table.row(Method::Bounded(500, Heuristic::Prob)).unwrap();
        assert_eq!(empty.mean_time, None);
    }

    #[test]
    fn method_latex_has_sections() {
        let latex = method_table(&document()).to_latex().render();
        assert!(latex.contains("\\multicolumn{6}{l}{Unbounded}"));
        assert!(latex.contains("\\multicolumn{6}{l}{Bounded 500}"));
        assert!(latex.contains(" Complete & 6 s & 520 & "));
        assert_eq!(latex.matches("\\multicolumn").count(), 1 + STEP_BOUNDS.len());
    }

    #[test]
    fn trivial_instances_are_filtered() {
        let filtered = filter_trivial(&document());
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered["brp.pm"].len(), 1);
        assert_eq!(filtered["brp.pm"][0].constants, "N=16");
    }

    #[test]
    fn comparison_needs_every_heuristic() {
        let stats = heuristic_comparison(&document());
        let weighted = &stats[0];
        assert_eq!(weighted.heuristic, Heuristic::Weighted);
        assert_eq!(weighted.mean, Some(40.0));
        assert_eq!(weighted.stdev, None);
    }

    #[test]
    fn groups_sort_by_savings() {
        let rows = group_table(&document()).unwrap();
        let groups = rows.iter().map(|row| row.group.as_str()).collect_vec();
        assert_eq!(groups, vec!["brp", "nand"]);

        let brp = &rows[0];
        assert_eq!(brp.count, 2);
        assert_eq!(brp.complete_failures, 1);
        assert_eq!(brp.mean_complete_states, Some(1000.0));
        let weighted = &brp.heuristics[0];
        assert_eq!(weighted.success, 1);
        assert_eq!(weighted.mean_ratio, Some(0.1));
        let graph_difference = &brp.heuristics[4];
        assert_eq!(graph_difference.failures, 2);
        assert_eq!(graph_difference.mean_ratio, Some(1.0));

        let latex = group_table_latex(&rows).render();
        assert!(latex.contains(" brp & 2 & 1000 & 1 & 2 & 10 & 1 & "));
    }

    #[test]
    fn unknown_models_are_rejected() {
        let mut document = document();
        let instances = document["brp.pm"].clone();
        document.insert("mystery.nm".to_owned(), instances);
        assert_eq!(
            group_table(&document),
            Err(EvaluationError::UnknownModel("mystery.nm".to_owned()))
        );
    }

    #[test]
    fn pairs_use_the_best_heuristic() {
        let pairs = state_pairs(&document(), &PLOT_GROUPS).unwrap();
        assert_eq!(
            pairs,
            vec![
                (1000.0, 100.0, 5),
                (f64::INFINITY, 500.0, 5),
                (40.0, 40.0, 4)
            ]
        );
        let mut out = Vec::new();
        write_state_pairs(&mut out, &pairs).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "1000.0,100.0,5\nnan,500.0,5\n40.0,40.0,4\n"
        );
    }
}
