use std::{fmt::Display, path::PathBuf};

use clap::{Args, Subcommand, ValueEnum};
use petbench::{
    aggregate::{Grouping, SortOrder},
    catalogue::BenchmarkSet,
    record::TrailingScalar,
    runner::{self, ToolFlags},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InformationLevel {
    Whitebox,
    Blackbox,
    Greybox,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateMethod {
    Blackbox,
    Greybox,
    Both,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimulateMec {
    Standard,
    Cheat,
    Heuristic,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeltaTMethod {
    #[value(alias = "P_MIN")]
    PMin,
    #[value(alias = "MAX_SUCCESSORS")]
    MaxSuccessors,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Benchmarks {
    /// Reachability reward models.
    Mdp,
    /// Continuous time models, run with `--ctmdp`.
    Ctmdp,
    /// Mean-payoff models with known values, five trials each by default.
    Cav22,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sort {
    Precision,
    Alphabetical,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Evaluation {
    /// Time, states and failures per method.
    Methods,
    /// As `methods`, without instances that are a single component.
    Filtered,
    /// Per model group savings of each heuristic.
    Groups,
    /// Complete against best heuristic state counts.
    Pairs,
}

impl Display for InformationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InformationLevel::Whitebox => write!(f, "whitebox"),
            InformationLevel::Blackbox => write!(f, "blackbox"),
            InformationLevel::Greybox => write!(f, "greybox"),
        }
    }
}

impl Display for Evaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Evaluation::Methods => write!(f, "methods"),
            Evaluation::Filtered => write!(f, "filtered"),
            Evaluation::Groups => write!(f, "groups"),
            Evaluation::Pairs => write!(f, "pairs"),
        }
    }
}

impl From<InformationLevel> for runner::InformationLevel {
    fn from(level: InformationLevel) -> Self {
        match level {
            InformationLevel::Whitebox => runner::InformationLevel::Whitebox,
            InformationLevel::Blackbox => runner::InformationLevel::Blackbox,
            InformationLevel::Greybox => runner::InformationLevel::Greybox,
        }
    }
}

impl From<UpdateMethod> for runner::UpdateMethod {
    fn from(method: UpdateMethod) -> Self {
        match method {
            UpdateMethod::Blackbox => runner::UpdateMethod::Blackbox,
            UpdateMethod::Greybox => runner::UpdateMethod::Greybox,
            UpdateMethod::Both => runner::UpdateMethod::Both,
        }
    }
}

impl From<SimulateMec> for runner::SimulateMec {
    fn from(variant: SimulateMec) -> Self {
        match variant {
            SimulateMec::Standard => runner::SimulateMec::Standard,
            SimulateMec::Cheat => runner::SimulateMec::Cheat,
            SimulateMec::Heuristic => runner::SimulateMec::Heuristic,
        }
    }
}

impl From<DeltaTMethod> for runner::DeltaTMethod {
    fn from(method: DeltaTMethod) -> Self {
        match method {
            DeltaTMethod::PMin => runner::DeltaTMethod::PMin,
            DeltaTMethod::MaxSuccessors => runner::DeltaTMethod::MaxSuccessors,
        }
    }
}

impl From<Benchmarks> for BenchmarkSet {
    fn from(benchmarks: Benchmarks) -> Self {
        match benchmarks {
            Benchmarks::Mdp => BenchmarkSet::Mdp,
            Benchmarks::Ctmdp => BenchmarkSet::Ctmdp,
            Benchmarks::Cav22 => BenchmarkSet::Cav22,
        }
    }
}

impl From<Sort> for SortOrder {
    fn from(sort: Sort) -> Self {
        match sort {
            Sort::Precision => SortOrder::Precision,
            Sort::Alphabetical => SortOrder::Alphabetical,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the benchmark catalogue and summarize the results.
    Run(RunArgs),
    /// Summarize an existing results directory.
    Summarize(SummarizeArgs),
    /// Tabulate several results directories side by side.
    Compare(CompareArgs),
    /// Gather a catalogue-style results tree into one JSON document.
    Collect(CollectArgs),
    /// Render tables from a collected JSON document.
    Evaluate(EvaluateArgs),
    /// Export the bound convergence of every model as CSV.
    Series(SeriesArgs),
    /// Show how jobs are split among workers.
    Partition(PartitionArgs),
}

/// Options shared by all commands that aggregate text results.
#[derive(Args, Debug, Clone)]
pub struct AggregateArgs {
    /// JSON file overriding normalization constants, true values and thresholds.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// The last line of each result is the missing probability instead of the explored states.
    #[arg(long, alias = "getErrorProbability")]
    pub error_probability: bool,
    /// Group by update method as well as by model.
    #[arg(long)]
    pub by_axis: bool,
    /// Divide bounds by the maximum reward of each model.
    #[arg(long)]
    pub scale: bool,
    /// Attach the known value of each model.
    #[arg(long)]
    pub true_values: bool,
}

impl AggregateArgs {
    pub fn trailing(&self) -> TrailingScalar {
        if self.error_probability {
            TrailingScalar::MissingProbability
        } else {
            TrailingScalar::StatesExplored
        }
    }

    pub fn grouping(&self) -> Grouping {
        if self.by_axis {
            Grouping::ModelAndAxis
        } else {
            Grouping::Model
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(value_enum, long, alias = "informationLevel", ignore_case = true)]
    pub information_level: InformationLevel,
    #[arg(value_enum, long, alias = "updateMethod", ignore_case = true)]
    pub update_method: Option<UpdateMethod>,
    #[arg(value_enum, long, alias = "simulateMec", ignore_case = true)]
    pub simulate_mec: Option<SimulateMec>,
    #[arg(value_enum, long, alias = "deltaTMethod", ignore_case = true)]
    pub delta_t_method: Option<DeltaTMethod>,
    #[arg(value_enum, long, default_value_t = Benchmarks::Mdp, ignore_case = true)]
    pub benchmarks: Benchmarks,
    #[arg(short, long, alias = "outputDirectory", default_value = "results")]
    pub output_directory: PathBuf,
    #[arg(long, alias = "nThreads", default_value_t = 3)]
    pub n_threads: usize,
    /// Trials per model, by default 5 for `cav22` and 1 otherwise.
    #[arg(long, alias = "nExperiments")]
    pub n_experiments: Option<usize>,
    /// Gradle project of the analysis tool.
    #[arg(long, default_value = "..", conflicts_with = "program")]
    pub tool_dir: PathBuf,
    /// Start this program with the tool arguments instead of going through gradle.
    #[arg(long)]
    pub program: Option<String>,
    #[command(flatten)]
    pub aggregate: AggregateArgs,
}

impl RunArgs {
    pub fn benchmark_set(&self) -> BenchmarkSet {
        self.benchmarks.into()
    }

    pub fn iterations(&self) -> usize {
        self.n_experiments
            .unwrap_or_else(|| self.benchmark_set().default_iterations())
    }

    pub fn tool_flags(&self) -> ToolFlags {
        ToolFlags {
            update_method: self.update_method.map(Into::into),
            error_probability: self.aggregate.error_probability,
            simulate_mec: self.simulate_mec.map(Into::into),
            delta_t_method: self.delta_t_method.map(Into::into),
            ctmdp: self.benchmarks == Benchmarks::Ctmdp,
            ..ToolFlags::new(self.information_level.into())
        }
    }
}

#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// Directory holding one `iteration<i>` directory per trial.
    pub results: PathBuf,
    /// Where to write the per-model reports, defaults to the results directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[arg(value_enum, long, default_value_t = Sort::Precision)]
    pub sort: Sort,
    #[command(flatten)]
    pub aggregate: AggregateArgs,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Result sets as `label=directory`, one column group each.
    #[arg(long = "column", required = true, value_parser = parse_column)]
    pub columns: Vec<(String, PathBuf)>,
    /// Output file, CSV unless `--latex` is given.
    #[arg(short, long, default_value = "experimentResults.csv")]
    pub output: PathBuf,
    #[arg(long)]
    pub latex: bool,
    #[command(flatten)]
    pub aggregate: AggregateArgs,
}

fn parse_column(value: &str) -> Result<(String, PathBuf), String> {
    match value.split_once('=') {
        Some((label, dir)) if !label.is_empty() && !dir.is_empty() => {
            Ok((label.to_owned(), PathBuf::from(dir)))
        }
        _ => Err(format!("expected `label=directory`, got `{value}`")),
    }
}

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Directory with one subdirectory per model.
    pub results: PathBuf,
    #[arg(short, long, default_value = "results.json")]
    pub output: PathBuf,
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// JSON document written by `collect`.
    pub document: PathBuf,
    #[arg(value_enum, long, default_value_t = Evaluation::Methods)]
    pub table: Evaluation,
    /// Write to this file instead of standard output.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SeriesArgs {
    pub results: PathBuf,
    #[arg(short, long, default_value = "series")]
    pub output: PathBuf,
    #[command(flatten)]
    pub aggregate: AggregateArgs,
}

#[derive(Args, Debug)]
pub struct PartitionArgs {
    pub total: usize,
    #[arg(long, alias = "nThreads", default_value_t = 3)]
    pub workers: usize,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct RunCli {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn benchmark_sets_pick_their_trial_count() {
        let cli = RunCli::try_parse_from([
            "petbench",
            "--information-level",
            "BLACKBOX",
            "--benchmarks",
            "cav22",
        ])
        .unwrap();
        assert_eq!(cli.run.benchmark_set(), BenchmarkSet::Cav22);
        assert_eq!(cli.run.iterations(), 5);
        assert!(!cli.run.tool_flags().ctmdp);

        let cli = RunCli::try_parse_from([
            "petbench",
            "--informationLevel",
            "greybox",
            "--benchmarks",
            "ctmdp",
            "--nExperiments",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.run.iterations(), 2);
        assert!(cli.run.tool_flags().ctmdp);
    }

    #[test]
    fn columns_need_label_and_directory() {
        assert_eq!(
            parse_column("Blackbox=results/black").unwrap(),
            ("Blackbox".to_owned(), PathBuf::from("results/black"))
        );
        assert!(parse_column("results/black").is_err());
        assert!(parse_column("=results").is_err());
    }
}
