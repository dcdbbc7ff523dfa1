use std::{fs, path::Path};

use petbench::{
    aggregate::{AggregateOptions, Grouping, ReportedRuntime, aggregate},
    formats::{
        json,
        layout::collect,
        results::{LoadOptions, load_results_dir},
    },
    record::{Status, TrailingScalar},
    report::write_model_reports,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn result(model: &str, axis: &str, lower: f64, upper: f64) -> String {
    format!(
        "-m data/models/{model}.prism --precision 0.01 --informationLevel BLACKBOX \
         --updateMethod {axis}\n1000 2000 3000\n0.0 {lower} {lower}\n2.0 {upper} {upper}\n77\n"
    )
}

#[test]
fn loads_aggregates_and_reports_iterations() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    write(&root.join("iteration0/0"), &result("toy", "GREYBOX", 1.8, 2.2));
    write(&root.join("iteration1/0"), &result("toy", "GREYBOX", 2.0, 2.0));
    // A run that never produced its result, but left its setup and console output.
    write(
        &root.join("iteration1/1.setup"),
        "meanPayoff -m data/models/pacman.prism --informationLevel BLACKBOX\n",
    );
    write(&root.join("iteration1/1.out"), "java.lang.OutOfMemoryError\n");

    let records = load_results_dir(&root, &LoadOptions::default()).unwrap();
    assert_eq!(records.len(), 3);
    let pacman = records
        .iter()
        .find(|record| record.model_name == "pacman")
        .unwrap();
    assert_eq!(pacman.status, Status::Memout);
    assert_eq!(pacman.iteration_number, 1);

    let summaries = aggregate(&records, &AggregateOptions::default());
    let toy = summaries
        .iter()
        .find(|(key, _)| key.model == "toy")
        .map(|(_, summary)| summary.as_ref().unwrap())
        .unwrap();
    assert!((toy.mean_lower_bound - 1.9).abs() < 1e-9);
    assert!((toy.mean_upper_bound - 2.1).abs() < 1e-9);
    assert_eq!(toy.mean_states_explored, Some(77.0));
    assert_eq!(toy.runtime, ReportedRuntime::Seconds(2.0));
    assert!(
        summaries
            .iter()
            .any(|(key, summary)| key.model == "pacman" && summary.is_err())
    );

    let reports = write_model_reports(&dir.path().join("reports"), &records, &summaries).unwrap();
    assert_eq!(reports.len(), 2);
    let pacman_report = fs::read_to_string(dir.path().join("reports/pacman.txt")).unwrap();
    assert!(pacman_report.contains("No successful runs for pacman"));
}

#[test]
fn axis_grouping_separates_update_methods() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("iteration0/0"), &result("toy", "GREYBOX", 0.4, 0.5));
    write(&root.join("iteration0/1"), &result("toy", "BLACKBOX", 0.1, 0.9));

    let options = LoadOptions {
        trailing: TrailingScalar::MissingProbability,
        ..LoadOptions::default()
    };
    let records = load_results_dir(root, &options).unwrap();
    assert!(records.iter().all(|record| record.missing_probability == Some(77.0)));

    let summaries = aggregate(
        &records,
        &AggregateOptions {
            grouping: Grouping::ModelAndAxis,
            ..AggregateOptions::default()
        },
    );
    let axes = summaries
        .keys()
        .map(|key| key.axis.clone().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(axes, vec!["BLACKBOX/BLACKBOX", "BLACKBOX/GREYBOX"]);
}

#[test]
fn collects_catalogue_layout() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("brp.pm/N=16");
    write(&folder.join("constants"), "N=16\n");

    let quartet = |name: &str, setup: &str| {
        write(&folder.join(format!("{name}.setup")), setup);
        write(&folder.join(format!("{name}.out")), "");
        write(&folder.join(format!("{name}.status")), "0\n");
        write(&folder.join(format!("{name}.time")), "1.0\n");
    };
    quartet("complete", "complete\n");
    write(
        &folder.join("complete.json"),
        r#"{"model": {"time": 3.5, "states": 900, "components": {"count": 4}}}"#,
    );
    quartet("weighted", "unbounded,WEIGHTED\n");
    write(
        &folder.join("weighted.json"),
        r#"{"unbounded": {"WEIGHTED": {"time": 0.5, "explored-states": 90}}}"#,
    );
    quartet("prob-10", "bounded,PROB,10\n");
    quartet("broken", "unbounded,RANDOM\n");
    // Missing its .time file, so it is not considered at all.
    write(&folder.join("partial.setup"), "complete\n");

    let document = collect(dir.path(), "OutOfMemoryError").unwrap();
    let instances = &document["brp.pm"];
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].constants, "N=16");

    let results = &instances[0].results;
    assert_eq!(results.complete.as_ref().unwrap().data().unwrap().states, Some(900));
    assert_eq!(
        results.unbounded("WEIGHTED").unwrap().data().unwrap().core_states(),
        Some(90)
    );
    assert_eq!(results.bounded(10, "PROB").unwrap().status(), Status::Timeout);
    assert!(results.unbounded("RANDOM").is_none());

    let path = dir.path().join("results.json");
    json::write(&document, &path).unwrap();
    assert_eq!(json::read(&path).unwrap(), document);
}
