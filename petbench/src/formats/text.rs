//! The plain text result written by the mean-payoff checker.
//!
//! The file consists of the echoed command line followed by whitespace separated series:
//!
//! ```text
//! -m data/models/toy.prism --precision 0.01 ...
//! 1650000000000 1650000000500 1650000001200
//! 0.0 0.41 0.48
//! 1.0 0.62 0.52
//! 1234
//! ```
//!
//! The last line is optional and holds either the number of explored states or the missing
//! probability mass, see [`TrailingScalar`].

use std::{fs, path::Path};

use log::warn;

use crate::record::{ExperimentRecord, Status, TrailingScalar};

use super::{Cursor, ParseError, invocation::Invocation};

/// Sections of a text result in file order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Section {
    Invocation,
    Times,
    LowerBounds,
    UpperBounds,
    Trailing,
}

impl Section {
    fn name(&self) -> &'static str {
        match self {
            Section::Invocation => "invocation",
            Section::Times => "times",
            Section::LowerBounds => "lower bounds",
            Section::UpperBounds => "upper bounds",
            Section::Trailing => "trailing value",
        }
    }

    fn is_required(&self) -> bool {
        !matches!(self, Section::Trailing)
    }
}

pub const SCHEMA: [Section; 5] = [
    Section::Invocation,
    Section::Times,
    Section::LowerBounds,
    Section::UpperBounds,
    Section::Trailing,
];

fn parse_series(line: &str, section: Section, line_no: usize) -> Result<Vec<f64>, ParseError> {
    let mut cursor = Cursor::new(line);
    let mut values = Vec::new();
    while !cursor.is_empty() {
        let value = cursor.consume_float().map_err(|err| {
            ParseError(format!(
                "Line {line_no} ({}): {err}",
                section.name()
            ))
        })?;
        values.push(value);
    }
    Ok(values)
}

pub fn parse(
    input: &str,
    trailing: TrailingScalar,
    iteration_number: usize,
) -> Result<ExperimentRecord, ParseError> {
    let lines: Vec<&str> = input.lines().collect();

    for (idx, section) in SCHEMA.iter().enumerate() {
        let present = lines.get(idx).is_some_and(|line| !line.trim().is_empty());
        if section.is_required() && !present {
            return Err(ParseError(format!(
                "Missing section `{}` at line {}.",
                section.name(),
                idx + 1
            )));
        }
    }

    let invocation = Invocation::parse(lines[0])?;
    let times = parse_series(lines[1], Section::Times, 2)?;
    let lower_bounds = parse_series(lines[2], Section::LowerBounds, 3)?;
    let upper_bounds = parse_series(lines[3], Section::UpperBounds, 4)?;

    if times.is_empty() {
        return Err(ParseError("Section `times` has no samples.".to_owned()));
    }
    if times.len() != lower_bounds.len() || times.len() != upper_bounds.len() {
        return Err(ParseError(format!(
            "Series lengths differ: {} times, {} lower bounds, {} upper bounds.",
            times.len(),
            lower_bounds.len(),
            upper_bounds.len()
        )));
    }
    if times.windows(2).any(|pair| pair[1] < pair[0]) {
        warn!(
            "Timestamps of `{}` are not chronological.",
            invocation.model_name
        );
    }

    let mut states_explored = None;
    let mut missing_probability = None;
    if let Some(line) = lines.get(4).filter(|line| !line.trim().is_empty()) {
        let mut cursor = Cursor::new(line);
        let wrap = |err: ParseError| ParseError(format!("Line 5 (trailing value): {err}"));
        match trailing {
            TrailingScalar::StatesExplored => {
                states_explored = Some(cursor.consume_u64().map_err(wrap)?)
            }
            TrailingScalar::MissingProbability => {
                missing_probability = Some(cursor.consume_float().map_err(wrap)?)
            }
        }
    }

    let record = ExperimentRecord {
        config_axis: invocation.config_axis(),
        model_name: invocation.model_name,
        times,
        lower_bounds,
        upper_bounds,
        states_explored,
        missing_probability,
        status: Status::Success,
        iteration_number,
    };
    if record.has_inverted_bounds() {
        warn!(
            "Upper bound below lower bound in `{}` (iteration {}).",
            record.model_name, record.iteration_number
        );
    }
    Ok(record)
}

pub fn parse_file(
    path: &Path,
    trailing: TrailingScalar,
    iteration_number: usize,
) -> Result<ExperimentRecord, ParseError> {
    let source = fs::read_to_string(path)
        .map_err(|err| ParseError(format!("Unable to read {}: {err}", path.display())))?;
    parse(&source, trailing, iteration_number)
        .map_err(|err| ParseError(format!("{}: {err}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULT: &str = "-m data/models/toy.prism --precision 0.01 --maxReward 1 \n\
                          1000 2000 4000 \n\
                          0.0 0.5 0.9 \n\
                          1.0 1.0 1.1 \n\
                          512\n";

    #[test]
    fn parses_all_sections() {
        let record = parse(RESULT, TrailingScalar::StatesExplored, 2).unwrap();
        assert_eq!(record.model_name, "toy");
        assert_eq!(record.times, vec![1000.0, 2000.0, 4000.0]);
        assert_eq!(record.lower_bounds.len(), record.times.len());
        assert_eq!(record.upper_bounds.len(), record.times.len());
        assert_eq!(record.states_explored, Some(512));
        assert_eq!(record.missing_probability, None);
        assert_eq!(record.iteration_number, 2);
        assert_eq!(record.status, Status::Success);
    }

    #[test]
    fn trailing_meaning_comes_from_the_caller() {
        let input = RESULT.replace("512", "0.0125");
        let record = parse(&input, TrailingScalar::MissingProbability, 0).unwrap();
        assert_eq!(record.missing_probability, Some(0.0125));
        assert_eq!(record.states_explored, None);
    }

    #[test]
    fn short_files_have_no_trailing_value() {
        let input = RESULT.replace("512\n", "");
        let record = parse(&input, TrailingScalar::StatesExplored, 0).unwrap();
        assert_eq!(record.states_explored, None);
        assert_eq!(record.missing_probability, None);
    }

    #[test]
    fn missing_series_fails_fast() {
        let input = "-m toy.prism\n1 2 3\n0.1 0.2 0.3\n";
        let err = parse(input, TrailingScalar::StatesExplored, 0).unwrap_err();
        assert!(err.to_string().contains("upper bounds"), "{err}");
    }

    #[test]
    fn unequal_series_are_rejected() {
        let input = "-m toy.prism\n1 2 3\n0.1 0.2\n0.5 0.4 0.3\n";
        assert!(parse(input, TrailingScalar::StatesExplored, 0).is_err());
    }

    #[test]
    fn garbage_tokens_name_the_line() {
        let input = "-m toy.prism\n1 2 x\n0.1 0.2 0.3\n0.5 0.4 0.3\n";
        let err = parse(input, TrailingScalar::StatesExplored, 0).unwrap_err();
        assert!(err.to_string().contains("Line 2"), "{err}");
    }

    #[test]
    fn inverted_bounds_are_tolerated() {
        let input = "-m toy.prism\n1 2\n0.6 0.7\n0.5 0.6\n";
        let record = parse(input, TrailingScalar::StatesExplored, 0).unwrap();
        assert!(record.has_inverted_bounds());
    }
}
