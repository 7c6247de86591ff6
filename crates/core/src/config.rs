use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Tokens with a vertical position below this value are page headers.
pub const DEFAULT_HEADER_MARGIN: f64 = 7.0;

/// A vertical jump larger than this closes the current row.
pub const DEFAULT_ROW_THRESHOLD: f64 = 1.0;

/// A letter followed by exactly two digits, e.g. `A01`. `A012` does not match.
pub const DEFAULT_CODE_PATTERN: &str = r"[A-Za-z][0-9]{2}(?:[^0-9]|$)";

/// The eight compass directions used as boundary keys.
pub const DEFAULT_BOUNDARY_KEYS: [&str; 8] = ["東", "東南", "南", "西南", "西", "西北", "北", "東北"];

/// How regex matches on a record-opening row map onto the two figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FigurePolicy {
    /// First match is the population, second is the deviation.
    #[default]
    Positional,
    /// First match without `%` is the population, first match with `%` is
    /// the deviation.
    ByFormat,
}

impl fmt::Display for FigurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FigurePolicy::Positional => write!(f, "positional"),
            FigurePolicy::ByFormat => write!(f, "by_format"),
        }
    }
}

impl FromStr for FigurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "positional" => Ok(FigurePolicy::Positional),
            "by_format" | "format" => Ok(FigurePolicy::ByFormat),
            other => Err(format!(
                "unknown figure policy '{other}' (expected 'positional' or 'by-format')"
            )),
        }
    }
}

/// Tuning knobs for the parsing pipeline.
///
/// Every field has a default, so a TOML config file only needs to name the
/// values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// Vertical cutoff below which tokens are discarded as headers.
    pub header_margin: f64,
    /// Vertical delta beyond which a row closes.
    pub row_threshold: f64,
    /// Cells that open a boundary entry when matched exactly.
    pub boundary_keys: Vec<String>,
    /// Unanchored regex that marks a record-opening first cell.
    pub code_pattern: String,
    pub figure_policy: FigurePolicy,
    /// Trace token positions and discarded rows through `log::debug!`.
    /// Never changes the parse result.
    pub diagnostics: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            header_margin: DEFAULT_HEADER_MARGIN,
            row_threshold: DEFAULT_ROW_THRESHOLD,
            boundary_keys: DEFAULT_BOUNDARY_KEYS.iter().map(|k| k.to_string()).collect(),
            code_pattern: DEFAULT_CODE_PATTERN.to_string(),
            figure_policy: FigurePolicy::default(),
            diagnostics: false,
        }
    }
}

impl ParseConfig {
    /// Load a config from TOML text, filling unspecified fields with defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        let config: ParseConfig =
            toml::from_str(text).map_err(|e| Error::ConfigFile(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.row_threshold.is_finite() || self.row_threshold <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "row_threshold must be a positive number, got {}",
                self.row_threshold
            )));
        }
        if !self.header_margin.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "header_margin must be finite, got {}",
                self.header_margin
            )));
        }
        if self.boundary_keys.iter().all(|k| k.trim().is_empty()) {
            return Err(Error::InvalidConfig(
                "boundary_keys must contain at least one non-empty key".to_string(),
            ));
        }
        self.compile_code_pattern()?;
        Ok(())
    }

    pub(crate) fn compile_code_pattern(&self) -> Result<Regex, Error> {
        Regex::new(&self.code_pattern).map_err(|e| {
            Error::InvalidConfig(format!("code_pattern '{}': {}", self.code_pattern, e))
        })
    }
}
