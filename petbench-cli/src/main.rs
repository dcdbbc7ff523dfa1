use std::{
    error::Error,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::Path,
    process::ExitCode,
    time::Instant,
};

use clap::Parser;
use log::{error, info, warn};
use memory_stats::memory_stats;
use petbench::{
    aggregate::{self, AggregateOptions, AggregateSummary, aggregate, sort_summaries},
    config::Config,
    evaluation::{self, PLOT_GROUPS},
    formats::{
        json, layout,
        results::{LoadOptions, load_results_dir},
    },
    partition::partition,
    record::ExperimentRecord,
    report::{self, ComparisonTable},
    runner::{Launcher, Plan, Runner},
};

pub mod options;
use options::*;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

type CliResult = Result<(), Box<dyn Error>>;

fn load_config(path: &Option<std::path::PathBuf>) -> Result<Config, Box<dyn Error>> {
    Ok(match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    })
}

/// Loads and aggregates one results directory.
fn summarize_dir(
    results: &Path,
    args: &AggregateArgs,
    config: &Config,
) -> Result<(Vec<ExperimentRecord>, Vec<AggregateSummary>, aggregate::Groups), Box<dyn Error>> {
    let load = LoadOptions {
        trailing: args.trailing(),
        memout_marker: config.memout_marker.clone(),
    };
    let records = load_results_dir(results, &load)?;
    info!(
        "Loaded {} runs ({} failed) from {}.",
        records.len(),
        records.iter().filter(|record| !record.is_success()).count(),
        results.display()
    );
    let options = AggregateOptions::from_config(config, args.grouping(), args.scale, args.true_values);
    let groups = aggregate(&records, &options);
    let mut summaries = Vec::with_capacity(groups.len());
    for (key, summary) in &groups {
        match summary {
            Ok(summary) => summaries.push(summary.clone()),
            Err(err) => warn!("Skipping {key}: {err}"),
        }
    }
    Ok((records, summaries, groups))
}

fn run(args: RunArgs) -> CliResult {
    let launcher = match &args.program {
        Some(program) => Launcher::direct(program.clone()),
        None => Launcher::gradle(&args.tool_dir),
    };
    let plan = Plan {
        descriptors: args.benchmark_set().descriptors(),
        flags: args.tool_flags(),
        iterations: args.iterations(),
        output_dir: args.output_directory.clone(),
    };
    info!(
        "Running {} benchmarks with {} information, {} times.",
        args.benchmark_set(),
        args.information_level,
        args.iterations()
    );
    let artifacts = Runner::new(launcher).run_plan(&plan, args.n_threads)?;
    info!("{} runs finished.", artifacts.len());

    let config = load_config(&args.aggregate.config)?;
    let (records, _, groups) = summarize_dir(&args.output_directory, &args.aggregate, &config)?;
    report::write_model_reports(&args.output_directory, &records, &groups)?;
    Ok(())
}

fn summarize(args: SummarizeArgs) -> CliResult {
    let config = load_config(&args.aggregate.config)?;
    let (records, mut summaries, groups) = summarize_dir(&args.results, &args.aggregate, &config)?;
    let output = args.output.as_ref().unwrap_or(&args.results);
    report::write_model_reports(output, &records, &groups)?;

    sort_summaries(&mut summaries, args.sort.into());
    for summary in &summaries {
        info!(
            "{}: [{}, {}], precision {}, runtime {}, {} of {} runs failed.",
            summary.key,
            summary.mean_lower_bound,
            summary.mean_upper_bound,
            summary.precision(),
            summary.runtime,
            summary.failure_count(),
            summary.sample_count
        );
    }
    Ok(())
}

fn compare(args: CompareArgs) -> CliResult {
    let config = load_config(&args.aggregate.config)?;
    let mut columns = Vec::with_capacity(args.columns.len());
    for (label, dir) in &args.columns {
        let (_, summaries, _) = summarize_dir(dir, &args.aggregate, &config)?;
        columns.push((label.clone(), summaries));
    }
    let table = ComparisonTable::new(columns);

    let mut out = BufWriter::new(File::create(&args.output)?);
    if args.latex {
        write!(out, "{}", table.to_latex().render())?;
    } else {
        table.write_csv(&mut out)?;
    }
    out.flush()?;
    info!("Comparison of {} groups written to {}.", table.rows().len(), args.output.display());
    Ok(())
}

fn collect(args: CollectArgs) -> CliResult {
    let config = load_config(&args.config)?;
    let document = layout::collect(&args.results, &config.memout_marker)?;
    json::write(&document, &args.output)?;
    info!(
        "Collected {} models into {}.",
        document.len(),
        args.output.display()
    );
    Ok(())
}

fn evaluate(args: EvaluateArgs) -> CliResult {
    let document = json::read(&args.document)?;
    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    info!("Evaluating {} table.", args.table);
    match args.table {
        Evaluation::Methods | Evaluation::Filtered => {
            let document = match args.table {
                Evaluation::Filtered => evaluation::filter_trivial(&document),
                _ => document,
            };
            let table = evaluation::method_table(&document);
            write!(out, "{}", table.to_latex().render())?;
            evaluation::write_heuristic_comparison(
                &mut out,
                &evaluation::heuristic_comparison(&document),
                table.total,
            )?;
        }
        Evaluation::Groups => {
            let rows = evaluation::group_table(&document)?;
            write!(out, "{}", evaluation::group_table_latex(&rows).render())?;
        }
        Evaluation::Pairs => {
            let pairs = evaluation::state_pairs(&document, &PLOT_GROUPS)?;
            evaluation::write_state_pairs(&mut out, &pairs)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn series(args: SeriesArgs) -> CliResult {
    let config = load_config(&args.aggregate.config)?;
    let load = LoadOptions {
        trailing: args.aggregate.trailing(),
        memout_marker: config.memout_marker.clone(),
    };
    let records = load_results_dir(&args.results, &load)?;
    fs::create_dir_all(&args.output)?;

    let mut models = records
        .iter()
        .map(|record| record.model_name.as_str())
        .collect::<Vec<_>>();
    models.sort();
    models.dedup();
    for model in models {
        let runs = records
            .iter()
            .filter(|record| record.model_name == model)
            .cloned()
            .collect::<Vec<_>>();
        let Some(best) = aggregate::leaderboard(&runs).first().copied() else {
            warn!("No successful run of {model}, no series written.");
            continue;
        };
        let path = args.output.join(format!("{}.csv", model.replace('.', "-")));
        let mut out = BufWriter::new(File::create(&path)?);
        report::write_series(&mut out, best, config.true_value(model))?;
        out.flush()?;
        info!("Series of {model} written to {}.", path.display());
    }
    Ok(())
}

fn show_partition(args: PartitionArgs) -> CliResult {
    for (worker, range) in partition(args.total, args.workers)?.into_iter().enumerate() {
        println!("{worker}: {}..{}", range.start, range.end);
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let (pre_physical_mem, pre_virtual_mem) = if let Some(usage) = memory_stats() {
        (usage.physical_mem, usage.virtual_mem)
    } else {
        warn!("Couldn't get the current memory usage :(");
        (0, 0)
    };
    let time_start = Instant::now();

    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Summarize(args) => summarize(args),
        Command::Compare(args) => compare(args),
        Command::Collect(args) => collect(args),
        Command::Evaluate(args) => evaluate(args),
        Command::Series(args) => series(args),
        Command::Partition(args) => show_partition(args),
    };

    let elapsed = time_start.elapsed();
    let (post_physical_mem, post_virtual_mem) = if let Some(usage) = memory_stats() {
        (usage.physical_mem, usage.virtual_mem)
    } else {
        warn!("Couldn't get the current memory usage :(");
        (0, 0)
    };
    info!(
        "Elapsed: {:?}. physical mem used: {:.2} MB. virtual mem used: {:.2} MB",
        elapsed,
        post_physical_mem.saturating_sub(pre_physical_mem) as f64 / 1048576.0,
        post_virtual_mem.saturating_sub(pre_virtual_mem) as f64 / 1048576.0
    );

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
