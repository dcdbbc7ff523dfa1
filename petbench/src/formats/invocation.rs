//! The command line of a tool invocation, as echoed into its result file.

use itertools::Itertools;

use super::ParseError;

/// File suffixes of model descriptions understood by the tool.
pub const MODEL_SUFFIXES: &[&str] = &[".prism", ".nm", ".pm", ".sm"];

/// Options whose values identify a configuration, in the order they appear in the axis tag.
pub const AXIS_OPTIONS: &[&str] = &["informationLevel", "updateMethod"];

/// Options naming the model file.
const MODEL_OPTIONS: &[&str] = &["m", "model"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub model_name: String,
    arguments: Vec<String>,
    options: Vec<(String, Option<String>)>,
}

fn is_option(token: &str) -> bool {
    token.starts_with('-') && token.parse::<f64>().is_err()
}

/// Strips the directory prefix and the model suffix from a model path.
///
/// The name ends at the first suffix marker, so `consensus.2.prism` becomes `consensus.2`.
pub fn model_name_from_path(path: &str) -> Option<&str> {
    let file = path.rsplit(['/', '\\']).next()?;
    let end = MODEL_SUFFIXES
        .iter()
        .flat_map(|suffix| {
            file.match_indices(suffix).filter_map(move |(idx, _)| {
                let rest = &file[idx + suffix.len()..];
                if rest.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') {
                    None
                } else {
                    Some(idx)
                }
            })
        })
        .min()?;
    if end == 0 { None } else { Some(&file[..end]) }
}

impl Invocation {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let tokens = line.split_whitespace().collect_vec();
        let mut arguments = Vec::new();
        let mut options: Vec<(String, Option<String>)> = Vec::new();

        let mut idx = 0;
        while idx < tokens.len() {
            let token = tokens[idx];
            if is_option(token) {
                let name = token.trim_start_matches('-').to_owned();
                let value = tokens
                    .get(idx + 1)
                    .filter(|next| !is_option(next))
                    .map(|next| next.to_string());
                if value.is_some() {
                    idx += 1;
                }
                options.push((name, value));
            } else {
                arguments.push(token.to_owned());
            }
            idx += 1;
        }

        let model_path = options
            .iter()
            .find(|(name, _)| MODEL_OPTIONS.contains(&name.as_str()))
            .and_then(|(_, value)| value.as_deref())
            .or_else(|| {
                tokens
                    .iter()
                    .copied()
                    .find(|token| model_name_from_path(token).is_some())
            })
            .ok_or_else(|| ParseError(format!("No model file in invocation `{line}`.")))?;

        let model_name = model_name_from_path(model_path)
            .ok_or_else(|| {
                ParseError(format!(
                    "Model path `{model_path}` has none of the suffixes {MODEL_SUFFIXES:?}."
                ))
            })?
            .to_owned();

        Ok(Self {
            model_name,
            arguments,
            options,
        })
    }

    /// The value of the given option, without leading dashes.
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(option, _)| option == name)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.options.iter().any(|(option, _)| option == name)
    }

    /// Positional arguments, e.g. the analysis mode `meanPayoff`.
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Joins the values of [`AXIS_OPTIONS`] which are present, e.g. `BLACKBOX/GREYBOX`.
    pub fn config_axis(&self) -> Option<String> {
        let values = AXIS_OPTIONS
            .iter()
            .filter_map(|name| self.option(name))
            .collect_vec();
        if values.is_empty() {
            None
        } else {
            Some(values.join("/"))
        }
    }
}
