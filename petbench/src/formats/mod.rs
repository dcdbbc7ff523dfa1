//! Input and output file formats of the analysis tool.

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use thiserror::Error;

use crate::record::FailureTag;

pub mod invocation;
pub mod json;
pub mod layout;
pub mod results;
pub mod text;

/// Marker the JVM prints when the heap is exhausted.
pub const DEFAULT_MEMOUT_MARKER: &str = "OutOfMemoryError";

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ParseError(pub(crate) String);

pub(crate) struct Cursor<'i> {
    tail: &'i str,
}

impl<'i> Cursor<'i> {
    pub fn new(input: &'i str) -> Self {
        let mut this = Self { tail: input };
        this.consume_whitespace();
        this
    }

    pub fn consume_whitespace(&mut self) {
        self.tail = self.tail.trim_start()
    }

    pub fn is_empty(&self) -> bool {
        self.tail.is_empty()
    }

    pub fn consume_number(&mut self) -> Result<&'i str, ParseError> {
        let mut chars = self.tail.chars();
        while chars.as_str().starts_with(|c: char| {
            c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || c == '-' || c == '+'
        }) {
            chars.next();
        }
        let length = self.tail.len() - chars.as_str().len();
        if length > 0 {
            let number = &self.tail[..length];
            self.tail = chars.as_str();
            self.consume_whitespace();
            Ok(number)
        } else {
            Err(ParseError(format!("Expected number but found `{}`.", self.tail)))
        }
    }

    pub fn consume_float(&mut self) -> Result<f64, ParseError> {
        let number = self.consume_number()?;
        f64::from_str(number)
            .map_err(|_| ParseError(format!("Unable to convert number {number} to f64.")))
    }

    pub fn consume_u64(&mut self) -> Result<u64, ParseError> {
        let number = self.consume_number()?;
        // The tool sometimes prints integral counts as floats.
        u64::from_str(number).or_else(|_| match f64::from_str(number) {
            Ok(value) if value >= 0.0 && value.fract() == 0.0 => Ok(value as u64),
            _ => Err(ParseError(format!(
                "Unable to convert number {number} to u64."
            ))),
        })
    }
}

/// The files one experiment run leaves behind.
///
/// `result` is the structured artifact written by the tool itself, `log` is the captured
/// console output of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub result: PathBuf,
    pub log: PathBuf,
}

impl Artifact {
    pub fn new(result: impl Into<PathBuf>, log: impl Into<PathBuf>) -> Self {
        Self {
            result: result.into(),
            log: log.into(),
        }
    }

    /// The artifact for `<base>` with its log at `<base>.out`.
    pub fn text(base: &Path) -> Self {
        Self::new(base, with_suffix(base, ".out"))
    }

    /// The artifact for `<base>.json` with its log at `<base>.out`.
    pub fn json(base: &Path) -> Self {
        Self::new(with_suffix(base, ".json"), with_suffix(base, ".out"))
    }
}

/// Appends `suffix` to the file name of `path`, keeping any existing extension.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Classifies an experiment which may not have produced its structured result.
///
/// Returns [`None`] if the result exists and should be parsed.
pub fn classify(artifact: &Artifact, memout_marker: &str) -> Option<FailureTag> {
    if artifact.result.is_file() {
        return None;
    }
    match fs::read(&artifact.log) {
        Err(_) => Some(FailureTag::Generic),
        Ok(bytes) => {
            if String::from_utf8_lossy(&bytes).contains(memout_marker) {
                Some(FailureTag::Memout)
            } else {
                Some(FailureTag::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_reads_floats_and_counts() {
        let mut cursor = Cursor::new("  1.5 -2e-3 \n 17 4.0");
        assert_eq!(cursor.consume_float().unwrap(), 1.5);
        assert_eq!(cursor.consume_float().unwrap(), -2e-3);
        assert_eq!(cursor.consume_u64().unwrap(), 17);
        assert_eq!(cursor.consume_u64().unwrap(), 4);
        assert!(cursor.is_empty());
    }

    #[test]
    fn cursor_rejects_words() {
        let mut cursor = Cursor::new("NaN");
        assert!(cursor.consume_float().is_err());
    }

    #[test]
    fn classifies_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("1");
        let artifact = Artifact::text(&base);

        assert_eq!(classify(&artifact, DEFAULT_MEMOUT_MARKER), Some(FailureTag::Generic));

        fs::write(&artifact.log, "Exception: java.lang.OutOfMemoryError: heap").unwrap();
        assert_eq!(classify(&artifact, DEFAULT_MEMOUT_MARKER), Some(FailureTag::Memout));

        fs::write(&artifact.log, "killed").unwrap();
        assert_eq!(classify(&artifact, DEFAULT_MEMOUT_MARKER), Some(FailureTag::Timeout));

        fs::write(&artifact.result, "-m toy.prism\n").unwrap();
        assert_eq!(classify(&artifact, DEFAULT_MEMOUT_MARKER), None);
    }

    #[test]
    fn suffix_keeps_dots_in_names() {
        assert_eq!(
            with_suffix(Path::new("runs/consensus.2"), ".out"),
            PathBuf::from("runs/consensus.2.out")
        );
    }
}
