//! Launching the analysis tool over the benchmark catalogue.
//!
//! Every run `k` of trial `i` leaves the following files in the output directory:
//!
//! ```text
//! iteration<i>/<k>          result written by the tool
//! iteration<i>/<k>.setup    the tool arguments
//! iteration<i>/<k>.out      console output of the process
//! iteration<i>/<k>.status   exit code
//! iteration<i>/<k>.time     wall clock seconds
//! ```

use std::{
    fmt::Display,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::{Duration, Instant},
};

use itertools::Itertools;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::{
    catalogue::Descriptor,
    formats::{Artifact, results::ITERATION_PREFIX, with_suffix},
    partition::{PartitionError, partition},
    record::TrailingScalar,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InformationLevel {
    Whitebox,
    Blackbox,
    Greybox,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UpdateMethod {
    Blackbox,
    Greybox,
    /// Runs every model once with each of the other methods.
    Both,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SimulateMec {
    Standard,
    Cheat,
    Heuristic,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeltaTMethod {
    PMin,
    MaxSuccessors,
}

impl Display for InformationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InformationLevel::Whitebox => write!(f, "WHITEBOX"),
            InformationLevel::Blackbox => write!(f, "BLACKBOX"),
            InformationLevel::Greybox => write!(f, "GREYBOX"),
        }
    }
}

impl Display for UpdateMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateMethod::Blackbox => write!(f, "BLACKBOX"),
            UpdateMethod::Greybox => write!(f, "GREYBOX"),
            UpdateMethod::Both => write!(f, "BOTH"),
        }
    }
}

impl Display for SimulateMec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulateMec::Standard => write!(f, "STANDARD"),
            SimulateMec::Cheat => write!(f, "CHEAT"),
            SimulateMec::Heuristic => write!(f, "HEURISTIC"),
        }
    }
}

impl Display for DeltaTMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeltaTMethod::PMin => write!(f, "P_MIN"),
            DeltaTMethod::MaxSuccessors => write!(f, "MAX_SUCCESSORS"),
        }
    }
}

/// Options forwarded to the tool for every descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFlags {
    pub information_level: InformationLevel,
    pub update_method: Option<UpdateMethod>,
    pub error_probability: bool,
    pub simulate_mec: Option<SimulateMec>,
    pub delta_t_method: Option<DeltaTMethod>,
    pub ctmdp: bool,
}

impl ToolFlags {
    pub fn new(information_level: InformationLevel) -> Self {
        Self {
            information_level,
            update_method: None,
            error_probability: false,
            simulate_mec: None,
            delta_t_method: None,
            ctmdp: false,
        }
    }

    /// The concrete flag sets to run, one per update method.
    pub fn variants(&self) -> Vec<ToolFlags> {
        match self.update_method {
            Some(UpdateMethod::Both) => [UpdateMethod::Greybox, UpdateMethod::Blackbox]
                .into_iter()
                .map(|method| ToolFlags {
                    update_method: Some(method),
                    ..self.clone()
                })
                .collect(),
            _ => vec![self.clone()],
        }
    }

    /// What the optional last line of the results means for these flags.
    pub fn trailing(&self) -> TrailingScalar {
        if self.error_probability {
            TrailingScalar::MissingProbability
        } else {
            TrailingScalar::StatesExplored
        }
    }

    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec![
            "--informationLevel".to_owned(),
            self.information_level.to_string(),
        ];
        if let Some(method) = self.update_method {
            args.push("--updateMethod".to_owned());
            args.push(method.to_string());
        }
        if self.error_probability {
            args.push("--getErrorProbability".to_owned());
        }
        if let Some(variant) = self.simulate_mec {
            args.push("--simulateMec".to_owned());
            args.push(variant.to_string());
        }
        if let Some(method) = self.delta_t_method {
            args.push("--deltaTMethod".to_owned());
            args.push(method.to_string());
        }
        if self.ctmdp {
            args.push("--ctmdp".to_owned());
        }
        args
    }
}

/// How the tool arguments reach the tool through the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentPassing {
    /// Appended one by one.
    Direct,
    /// Joined into a single value of the given launcher option, e.g. `--args` for gradle.
    Joined(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
    pub program: String,
    pub args: Vec<String>,
    pub passing: ArgumentPassing,
}

impl Launcher {
    pub fn direct(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            passing: ArgumentPassing::Direct,
        }
    }

    /// `./gradlew -p <project> run --args '<tool arguments>'`.
    pub fn gradle(project: &Path) -> Self {
        Self {
            program: "./gradlew".to_owned(),
            args: vec![
                "-p".to_owned(),
                project.display().to_string(),
                "run".to_owned(),
            ],
            passing: ArgumentPassing::Joined("--args".to_owned()),
        }
    }

    pub fn command(&self, tool_args: &[String]) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        match &self.passing {
            ArgumentPassing::Direct => {
                command.args(tool_args);
            }
            ArgumentPassing::Joined(option) => {
                command.arg(option).arg(join_arguments(tool_args));
            }
        }
        command
    }
}

/// Joins arguments with spaces, quoting those that contain whitespace.
fn join_arguments(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                format!("\"{arg}\"")
            } else {
                arg.clone()
            }
        })
        .join(" ")
}

/// The files left behind by one finished process.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutputArtifact {
    pub artifact: Artifact,
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Partition(#[from] PartitionError),
    #[error("Unable to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One execution of the tool within a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub iteration: usize,
    pub index: usize,
    pub descriptor: Descriptor,
    pub flags: ToolFlags,
}

impl Job {
    pub fn output_path(&self, output_dir: &Path) -> PathBuf {
        output_dir
            .join(format!("{ITERATION_PREFIX}{}", self.iteration))
            .join(self.index.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub descriptors: Vec<Descriptor>,
    pub flags: ToolFlags,
    pub iterations: usize,
    pub output_dir: PathBuf,
}

impl Plan {
    /// All jobs, trial by trial; within a trial in descriptor order.
    ///
    /// Descriptors without a model name are dropped with a warning.
    pub fn jobs(&self) -> Vec<Job> {
        let descriptors = self
            .descriptors
            .iter()
            .filter(|descriptor| match descriptor.model_name() {
                Ok(_) => true,
                Err(err) => {
                    warn!("Skipping descriptor: {err}");
                    false
                }
            })
            .collect_vec();
        let variants = self.flags.variants();
        (0..self.iterations)
            .flat_map(|iteration| {
                descriptors
                    .iter()
                    .cartesian_product(variants.iter())
                    .enumerate()
                    .map(move |(index, (descriptor, flags))| Job {
                        iteration,
                        index,
                        descriptor: (*descriptor).clone(),
                        flags: flags.clone(),
                    })
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Runner {
    pub launcher: Launcher,
}

impl Runner {
    pub fn new(launcher: Launcher) -> Self {
        Self { launcher }
    }

    /// Runs the tool once and waits for it, whatever its exit code.
    pub fn run(
        &self,
        descriptor: &Descriptor,
        flags: &ToolFlags,
        output_path: &Path,
    ) -> io::Result<RawOutputArtifact> {
        let output_path = std::path::absolute(output_path)?;
        let mut tool_args = descriptor.tool_args();
        tool_args.extend(flags.arguments());
        tool_args.push("--outputPath".to_owned());
        tool_args.push(output_path.display().to_string());

        fs::write(
            with_suffix(&output_path, ".setup"),
            format!("{}\n", tool_args.join(" ")),
        )?;
        let artifact = Artifact::text(&output_path);
        let log = File::create(&artifact.log)?;

        let mut command = self.launcher.command(&tool_args);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log));
        debug!("Running {command:?}");

        let start = Instant::now();
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                // Without a console log the run loads as a generic failure.
                drop(command);
                if let Err(remove) = fs::remove_file(&artifact.log) {
                    warn!("Unable to remove {}: {remove}", artifact.log.display());
                }
                return Err(err);
            }
        };
        let status = child.wait()?;
        let elapsed = start.elapsed();

        let exit_code = status.code();
        let mut status_file = File::create(with_suffix(&output_path, ".status"))?;
        match exit_code {
            Some(code) => writeln!(status_file, "{code}")?,
            None => writeln!(status_file, "signal")?,
        }
        let mut time_file = File::create(with_suffix(&output_path, ".time"))?;
        writeln!(time_file, "{}", elapsed.as_secs_f64())?;

        Ok(RawOutputArtifact {
            artifact,
            exit_code,
            elapsed,
        })
    }

    /// Runs all jobs of `plan` on `workers` threads.
    ///
    /// Each worker executes a contiguous slice of the jobs one after another. A job that cannot
    /// be run is logged and does not stop the others.
    pub fn run_plan(&self, plan: &Plan, workers: usize) -> Result<Vec<RawOutputArtifact>, RunError> {
        let jobs = plan.jobs();
        let ranges = partition(jobs.len(), workers)?;
        for iteration in 0..plan.iterations {
            fs::create_dir_all(plan.output_dir.join(format!("{ITERATION_PREFIX}{iteration}")))?;
        }
        info!(
            "Running {} jobs on {workers} workers into {}.",
            jobs.len(),
            plan.output_dir.display()
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;
        let artifacts: Vec<Vec<RawOutputArtifact>> = pool.install(|| {
            ranges
                .into_par_iter()
                .enumerate()
                .map(|(worker, range)| {
                    debug!("Worker {worker} takes jobs {range:?}.");
                    jobs[range]
                        .iter()
                        .filter_map(|job| {
                            let path = job.output_path(&plan.output_dir);
                            match self.run(&job.descriptor, &job.flags, &path) {
                                Ok(artifact) => {
                                    if artifact.exit_code != Some(0) {
                                        warn!(
                                            "{} exited with {:?}.",
                                            path.display(),
                                            artifact.exit_code
                                        );
                                    }
                                    Some(artifact)
                                }
                                Err(err) => {
                                    error!("Unable to run {}: {err}", path.display());
                                    None
                                }
                            }
                        })
                        .collect()
                })
                .collect()
        });
        Ok(artifacts.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        formats::results::{LoadOptions, load_run},
        record::Status,
    };

    fn descriptor(name: &str) -> Descriptor {
        Descriptor::new(&format!("data/models/{name}.prism"), 1.0, 0.1)
    }

    #[test]
    fn both_expands_into_two_variants() {
        let mut flags = ToolFlags::new(InformationLevel::Blackbox);
        flags.update_method = Some(UpdateMethod::Both);
        let methods = flags
            .variants()
            .into_iter()
            .map(|variant| variant.update_method)
            .collect_vec();
        assert_eq!(
            methods,
            vec![Some(UpdateMethod::Greybox), Some(UpdateMethod::Blackbox)]
        );
    }

    #[test]
    fn flags_render_as_tool_options() {
        let flags = ToolFlags {
            error_probability: true,
            delta_t_method: Some(DeltaTMethod::MaxSuccessors),
            ctmdp: true,
            ..ToolFlags::new(InformationLevel::Greybox)
        };
        assert_eq!(
            flags.arguments(),
            vec![
                "--informationLevel",
                "GREYBOX",
                "--getErrorProbability",
                "--deltaTMethod",
                "MAX_SUCCESSORS",
                "--ctmdp",
            ]
        );
        assert_eq!(flags.trailing(), TrailingScalar::MissingProbability);
    }

    #[test]
    fn jobs_are_iteration_major() {
        let plan = Plan {
            descriptors: vec![descriptor("a"), descriptor("b"), Descriptor::new("broken", 1.0, 0.1)],
            flags: ToolFlags::new(InformationLevel::Whitebox),
            iterations: 2,
            output_dir: PathBuf::from("out"),
        };
        let jobs = plan.jobs();
        let order = jobs
            .iter()
            .map(|job| (job.iteration, job.index, job.descriptor.model_name().unwrap()))
            .collect_vec();
        assert_eq!(
            order,
            vec![(0, 0, "a"), (0, 1, "b"), (1, 0, "a"), (1, 1, "b")]
        );
        assert_eq!(
            jobs[3].output_path(&plan.output_dir),
            PathBuf::from("out/iteration1/1")
        );
    }

    #[test]
    fn gradle_joins_tool_arguments() {
        let launcher = Launcher::gradle(Path::new(".."));
        let command = launcher.command(&["meanPayoff".to_owned(), "a b".to_owned()]);
        let args = command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect_vec();
        assert_eq!(args, vec!["-p", "..", "run", "--args", "meanPayoff \"a b\""]);
    }

    #[cfg(unix)]
    #[test]
    fn run_writes_the_quartet() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Runner::new(Launcher::direct("echo"));
        let flags = ToolFlags::new(InformationLevel::Blackbox);
        let base = dir.path().join("0");
        let raw = runner.run(&descriptor("toy"), &flags, &base).unwrap();

        assert_eq!(raw.exit_code, Some(0));
        let setup = fs::read_to_string(with_suffix(&base, ".setup")).unwrap();
        assert!(setup.starts_with("meanPayoff -m data/models/toy.prism"));
        let out = fs::read_to_string(&raw.artifact.log).unwrap();
        assert!(out.contains("--informationLevel BLACKBOX"));
        assert_eq!(
            fs::read_to_string(with_suffix(&base, ".status")).unwrap().trim(),
            "0"
        );
        assert!(with_suffix(&base, ".time").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn failing_jobs_do_not_stop_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let plan = Plan {
            descriptors: vec![descriptor("a"), descriptor("b"), descriptor("c")],
            flags: ToolFlags::new(InformationLevel::Whitebox),
            iterations: 1,
            output_dir: dir.path().to_path_buf(),
        };
        let runner = Runner::new(Launcher::direct("false"));
        let artifacts = runner.run_plan(&plan, 2).unwrap();
        assert_eq!(artifacts.len(), 3);
        assert!(artifacts.iter().all(|raw| raw.exit_code == Some(1)));

        let missing = Runner::new(Launcher::direct("/nonexistent/tool"));
        assert!(missing.run_plan(&plan, 2).unwrap().is_empty());
    }

    #[test]
    fn unstartable_tool_loads_as_generic_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Runner::new(Launcher::direct("/nonexistent/tool"));
        let base = dir.path().join("0");
        assert!(
            runner
                .run(&descriptor("toy"), &ToolFlags::new(InformationLevel::Blackbox), &base)
                .is_err()
        );
        assert!(with_suffix(&base, ".setup").is_file());
        assert!(!with_suffix(&base, ".out").exists());

        let record = load_run(&base, 0, &LoadOptions::default()).unwrap();
        assert_eq!(record.model_name, "toy");
        assert_eq!(record.status, Status::GenericError);
    }
}
