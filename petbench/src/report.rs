//! Text, CSV and LaTeX renderings of aggregated results.

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use itertools::Itertools;
use log::{info, warn};

use crate::{
    aggregate::{AggregateError, AggregateSummary, GroupKey, Groups, ReportedRuntime, leaderboard},
    record::ExperimentRecord,
};

/// Cell content for values that do not exist.
pub const MISSING: &str = "---";

/// Rounds to four decimals and drops trailing zeros.
pub fn round4(value: f64) -> String {
    let rounded = (value * 1e4).round() / 1e4;
    // Avoid printing `-0`.
    if rounded == 0.0 {
        "0".to_owned()
    } else {
        rounded.to_string()
    }
}

fn write_run<W: Write>(out: &mut W, record: &ExperimentRecord) -> io::Result<()> {
    let runtime = record.runtime_seconds().unwrap_or_default();
    let (lower, upper) = record.final_bounds().unwrap_or_default();
    writeln!(out, "Execution time: {runtime}")?;
    writeln!(out, "Lower bound: {lower}")?;
    writeln!(out, "Upper bound: {upper}")?;
    writeln!(out, "Iteration number: {}", record.iteration_number)?;
    if let Some(states) = record.states_explored {
        writeln!(out, "Num states explored: {states}")?;
    }
    if let Some(probability) = record.missing_probability {
        writeln!(out, "Error probability: {probability}")?;
    }
    writeln!(out, "\n\n")
}

/// Writes the runs of one group, best first, followed by the group averages.
pub fn write_model_report<W: Write>(
    out: &mut W,
    records: &[ExperimentRecord],
    summary: &Result<AggregateSummary, AggregateError>,
) -> io::Result<()> {
    for record in leaderboard(records) {
        write_run(out, record)?;
    }
    match summary {
        Ok(summary) => {
            writeln!(out, "Average Lower Bound: {}", summary.mean_lower_bound)?;
            writeln!(out, "Average Upper Bound: {}", summary.mean_upper_bound)?;
            writeln!(out, "Average Run time: {}", summary.runtime)?;
            writeln!(out, "Precision: {}", summary.precision())?;
            if let Some(states) = summary.mean_states_explored {
                writeln!(out, "Average number of states explored: {states}")?;
            }
            if let Some(probability) = summary.mean_missing_probability {
                writeln!(out, "Average Error Probability: {probability}")?;
            }
            if let Some(true_value) = summary.true_value {
                writeln!(out, "True value: {true_value}")?;
            }
            if summary.failure_count() > 0 {
                writeln!(
                    out,
                    "Failed runs: {} of {} ({})",
                    summary.failure_count(),
                    summary.sample_count,
                    summary.failures
                )?;
            }
        }
        Err(err) => writeln!(out, "{err}")?,
    }
    Ok(())
}

/// File name of the report of one group, e.g. `toy_BLACKBOX-GREYBOX.txt`.
pub fn report_file_name(key: &GroupKey) -> String {
    match &key.axis {
        Some(axis) => format!("{}_{}.txt", key.model, axis.replace('/', "-")),
        None => format!("{}.txt", key.model),
    }
}

/// Writes one report per group into `dir` and returns their paths.
pub fn write_model_reports(
    dir: &Path,
    records: &[ExperimentRecord],
    summaries: &Groups,
) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut paths = Vec::with_capacity(summaries.len());
    for (key, summary) in summaries {
        let group = records
            .iter()
            .filter(|record| {
                record.model_name == key.model
                    && (key.axis.is_none() || record.config_axis == key.axis)
            })
            .cloned()
            .collect_vec();
        let path = dir.join(report_file_name(key));
        let mut out = BufWriter::new(File::create(&path)?);
        write_model_report(&mut out, &group, summary)?;
        out.flush()?;
        paths.push(path);
    }
    info!("Wrote {} model reports to {}.", paths.len(), dir.display());
    Ok(paths)
}

/// A `tabular` environment with a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatexTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Column alignment such as `lrr`; the first column left, all others right if empty.
    pub alignment: String,
}

impl LatexTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
            alignment: String::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn columns(&self) -> String {
        if !self.alignment.is_empty() {
            return self.alignment.clone();
        }
        let width = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or_default();
        std::iter::once('l')
            .chain(std::iter::repeat_n('r', width.saturating_sub(1)))
            .collect()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("\\begin{{tabular}}{{{}}}\n\\hline\n", self.columns()));
        out.push_str(&format!(" {} \\\\\n\\hline\n", self.headers.join(" & ")));
        for row in &self.rows {
            out.push_str(&format!(" {} \\\\\n", row.join(" & ")));
        }
        out.push_str("\\hline\n\\end{tabular}\n");
        out
    }
}

/// Group-by-group comparison of several result sets, e.g. blackbox against greybox.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonTable {
    labels: Vec<String>,
    rows: BTreeMap<GroupKey, Vec<Option<AggregateSummary>>>,
}

impl ComparisonTable {
    /// One column group per `(label, summaries)`; rows are the groups of all columns.
    ///
    /// Groups split by configuration axis get one row each, labelled `model [axis]`.
    pub fn new(columns: Vec<(String, Vec<AggregateSummary>)>) -> Self {
        let width = columns.len();
        let mut rows: BTreeMap<GroupKey, Vec<Option<AggregateSummary>>> = BTreeMap::new();
        let mut labels = Vec::with_capacity(width);
        for (position, (label, summaries)) in columns.into_iter().enumerate() {
            labels.push(label);
            for summary in summaries {
                let key = summary.key.clone();
                let cells = rows.entry(key).or_insert_with(|| vec![None; width]);
                if cells[position].is_some() {
                    warn!("Duplicate summary of {} in column {position}.", summary.key);
                }
                cells[position] = Some(summary);
            }
        }
        Self { labels, rows }
    }

    pub fn header(&self) -> Vec<String> {
        std::iter::once("Benchmarks".to_owned())
            .chain(self.labels.iter().flat_map(|label| {
                [
                    format!("{label} states explored"),
                    format!("{label} lower bound"),
                    format!("{label} upper bound"),
                    "Time(s)".to_owned(),
                ]
            }))
            .collect()
    }

    fn cells(summary: Option<&AggregateSummary>) -> [String; 4] {
        let Some(summary) = summary else {
            return std::array::from_fn(|_| MISSING.to_owned());
        };
        [
            summary
                .mean_states_explored
                .map_or_else(|| MISSING.to_owned(), round4),
            round4(summary.mean_lower_bound),
            round4(summary.mean_upper_bound),
            match summary.runtime {
                ReportedRuntime::Seconds(seconds) => round4(seconds),
                ReportedRuntime::TimedOut => ReportedRuntime::TimedOut.to_string(),
            },
        ]
    }

    /// Rows in group key order.
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|(key, summaries)| {
                std::iter::once(key.to_string())
                    .chain(
                        summaries
                            .iter()
                            .flat_map(|summary| Self::cells(summary.as_ref())),
                    )
                    .collect()
            })
            .collect()
    }

    pub fn write_csv<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let quote = |field: &String| format!("\"{}\"", field.replace('"', "\"\""));
        writeln!(out, "{}", self.header().iter().map(quote).join(","))?;
        for row in self.rows() {
            writeln!(out, "{}", row.iter().map(quote).join(","))?;
        }
        Ok(())
    }

    pub fn to_latex(&self) -> LatexTable {
        let mut table = LatexTable::new(self.header());
        for row in self.rows() {
            table.push(row);
        }
        table
    }
}

/// Writes the convergence of one run as `minutes,lower,upper,true_value`.
///
/// Minutes are measured from the first sample.
pub fn write_series<W: Write>(
    out: &mut W,
    record: &ExperimentRecord,
    true_value: Option<f64>,
) -> io::Result<()> {
    writeln!(out, "minutes,lower,upper,true_value")?;
    let start = record.times.iter().copied().fold(f64::INFINITY, f64::min);
    let true_value = true_value.map(|value| value.to_string()).unwrap_or_default();
    for ((time, lower), upper) in record
        .times
        .iter()
        .zip(&record.lower_bounds)
        .zip(&record.upper_bounds)
    {
        writeln!(
            out,
            "{},{lower},{upper},{true_value}",
            (time - start) / 60000.0
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregate::{AggregateOptions, Grouping, aggregate},
        record::{FailureTag, Status},
    };

    fn record(model: &str, lower: f64, upper: f64, iteration: usize) -> ExperimentRecord {
        ExperimentRecord {
            model_name: model.to_owned(),
            config_axis: None,
            times: vec![0.0, 60000.0, 120000.0],
            lower_bounds: vec![0.0, lower / 2.0, lower],
            upper_bounds: vec![2.0, upper * 2.0, upper],
            states_explored: Some(10),
            missing_probability: None,
            status: Status::Success,
            iteration_number: iteration,
        }
    }

    fn summaries(records: &[ExperimentRecord]) -> Vec<AggregateSummary> {
        aggregate(records, &AggregateOptions::default())
            .into_values()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn model_report_lists_best_run_first() {
        let records = vec![
            record("toy", 0.1, 0.9, 0),
            record("toy", 0.4, 0.5, 1),
            ExperimentRecord::failed("toy", None, FailureTag::Timeout, 2),
        ];
        let summary = aggregate(&records, &AggregateOptions::default())
            .into_values()
            .next()
            .unwrap();
        let mut out = Vec::new();
        write_model_report(&mut out, &records, &summary).unwrap();
        let text = String::from_utf8(out).unwrap();

        let first = text.find("Iteration number: 1").unwrap();
        let second = text.find("Iteration number: 0").unwrap();
        assert!(first < second);
        assert!(text.contains("Execution time: 120\n"));
        assert!(text.contains("Average Run time: 120\n"));
        assert!(text.contains("Average number of states explored: 10\n"));
        assert!(text.contains("Failed runs: 1 of 3 (1 timeouts, 0 memouts, 0 generic errors)"));
    }

    #[test]
    fn comparison_table_marks_missing_models() {
        let black = summaries(&[record("a", 0.123456, 0.5, 0), record("b", 0.2, 0.3, 0)]);
        let grey = summaries(&[record("b", 0.25, 0.3, 0)]);
        let table = ComparisonTable::new(vec![
            ("Blackbox".to_owned(), black),
            ("Greybox".to_owned(), grey),
        ]);

        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        let csv = String::from_utf8(out).unwrap();
        let lines = csv.lines().collect_vec();
        assert_eq!(
            lines[0],
            "\"Benchmarks\",\"Blackbox states explored\",\"Blackbox lower bound\",\
             \"Blackbox upper bound\",\"Time(s)\",\"Greybox states explored\",\
             \"Greybox lower bound\",\"Greybox upper bound\",\"Time(s)\""
        );
        assert_eq!(
            lines[1],
            "\"a\",\"10\",\"0.1235\",\"0.5\",\"120\",\"---\",\"---\",\"---\",\"---\""
        );
        assert!(lines[2].starts_with("\"b\",\"10\",\"0.2\""));
    }

    #[test]
    fn comparison_keeps_every_axis() {
        let mut black = record("toy", 0.1, 0.9, 0);
        black.config_axis = Some("BLACKBOX".to_owned());
        let mut grey = record("toy", 0.4, 0.5, 0);
        grey.config_axis = Some("GREYBOX".to_owned());
        let options = AggregateOptions {
            grouping: Grouping::ModelAndAxis,
            ..AggregateOptions::default()
        };
        let summaries = aggregate(&[black, grey], &options)
            .into_values()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let table = ComparisonTable::new(vec![("Run".to_owned(), summaries)]);

        let rows = table.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][..4], ["toy [BLACKBOX]", "10", "0.1", "0.9"]);
        assert_eq!(rows[1][..4], ["toy [GREYBOX]", "10", "0.4", "0.5"]);
    }

    #[test]
    fn timed_out_groups_print_the_sentinel() {
        let mut slow = record("slow", 0.1, 0.2, 0);
        slow.times = vec![0.0, 1_800_000.0];
        slow.lower_bounds.truncate(2);
        slow.upper_bounds.truncate(2);
        let table = ComparisonTable::new(vec![("Run".to_owned(), summaries(&[slow]))]);
        assert_eq!(table.rows()[0][4], "timed out");
    }

    #[test]
    fn latex_has_one_line_per_row() {
        let table = ComparisonTable::new(vec![(
            "Run".to_owned(),
            summaries(&[record("a", 0.1, 0.2, 0)]),
        )]);
        let latex = table.to_latex().render();
        assert!(latex.starts_with("\\begin{tabular}{lrrrr}\n"));
        assert!(latex.contains(" a & 10 & 0.1 & 0.2 & 120 \\\\\n"));
        assert!(latex.ends_with("\\end{tabular}\n"));
    }

    #[test]
    fn series_starts_at_zero_minutes() {
        let mut out = Vec::new();
        write_series(&mut out, &record("toy", 0.4, 0.6, 0), Some(0.5)).unwrap();
        let csv = String::from_utf8(out).unwrap();
        assert_eq!(
            csv,
            "minutes,lower,upper,true_value\n0,0,2,0.5\n1,0.2,1.2,0.5\n2,0.4,0.6,0.5\n"
        );
    }

    #[test]
    fn report_names_include_the_axis() {
        let key = GroupKey {
            model: "toy".to_owned(),
            axis: Some("BLACKBOX/GREYBOX".to_owned()),
        };
        assert_eq!(report_file_name(&key), "toy_BLACKBOX-GREYBOX.txt");
    }
}
