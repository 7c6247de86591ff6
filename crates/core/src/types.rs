use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single fragment of decoded text at a position on a page.
///
/// Coordinates use pdf2json form units: `y` grows downward from the top of
/// the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedToken {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

impl PositionedToken {
    pub fn new(x: f64, y: f64, text: impl Into<String>) -> Self {
        PositionedToken {
            x,
            y,
            text: text.into(),
        }
    }
}

/// One visual line of token texts, scoped to a single page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    /// 1-based page number the row was clustered from.
    pub page: usize,
    pub cells: Vec<String>,
}

impl Row {
    pub fn new(page: usize, cells: Vec<String>) -> Self {
        Row { page, cells }
    }

    pub fn first(&self) -> Option<&str> {
        self.cells.first().map(String::as_str)
    }
}

/// A numeric-looking figure lifted from a record-opening row.
///
/// Serializes as the matched text, or `""` when nothing matched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Figure(Option<String>);

impl Figure {
    pub fn matched(text: impl Into<String>) -> Self {
        Figure(Some(text.into()))
    }

    pub fn missing() -> Self {
        Figure(None)
    }

    pub fn is_missing(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_deref().unwrap_or("")
    }

    /// Numeric value with sign kept and separators and `%` dropped.
    pub fn value(&self) -> Option<f64> {
        let raw = self.0.as_deref()?;
        let cleaned: String = raw.chars().filter(|c| !matches!(c, ',' | '%')).collect();
        cleaned.parse::<f64>().ok()
    }
}

impl From<String> for Figure {
    fn from(value: String) -> Self {
        if value.is_empty() {
            Figure(None)
        } else {
            Figure(Some(value))
        }
    }
}

impl From<Figure> for String {
    fn from(value: Figure) -> Self {
        value.0.unwrap_or_default()
    }
}

impl fmt::Display for Figure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A `{ key: text }` pair in a record's boundary or area list.
///
/// Serialized as a single-key JSON object so duplicate keys within one
/// record stay separate entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct FieldEntry {
    pub key: String,
    pub text: String,
}

impl FieldEntry {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        FieldEntry {
            key: key.into(),
            text: text.into(),
        }
    }
}

impl From<FieldEntry> for BTreeMap<String, String> {
    fn from(entry: FieldEntry) -> Self {
        BTreeMap::from([(entry.key, entry.text)])
    }
}

impl TryFrom<BTreeMap<String, String>> for FieldEntry {
    type Error = String;

    fn try_from(map: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        if map.len() != 1 {
            return Err(format!(
                "field entry must have exactly one key, found {}",
                map.len()
            ));
        }
        let (key, text) = map
            .into_iter()
            .next()
            .ok_or_else(|| "field entry is empty".to_string())?;
        Ok(FieldEntry { key, text })
    }
}

/// Structured description of one district.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictRecord {
    pub code: String,
    pub name: String,
    pub expected_population: Figure,
    pub deviation_percentage: Figure,
    pub boundaries: Vec<FieldEntry>,
    pub main_area: Vec<FieldEntry>,
}

/// Non-fatal irregularities found while parsing a document.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ParseAnomaly {
    #[error("page {page}: row before any district code discarded: {cells:?}")]
    MalformedRow { page: usize, cells: Vec<String> },

    #[error("{code}: no expected population figure found")]
    NoPopulationMatch { code: String },

    #[error("{code}: no deviation percentage figure found")]
    NoDeviationMatch { code: String },

    #[error("{code}: text before any boundary or area key dropped: {text}")]
    OrphanText { code: String, text: String },
}

/// Records parsed from one document plus everything that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParseOutput {
    pub records: Vec<DistrictRecord>,
    pub anomalies: Vec<ParseAnomaly>,
}
