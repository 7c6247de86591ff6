//! Core library for dcbounds
//!
//! This crate implements the **Functional Core** of the dcbounds application:
//! turning pages of positioned text tokens into structured district boundary
//! records. Nothing here performs I/O; fetching, PDF decoding and persistence
//! live in the `pdf` crate and the `dcbounds` binary.
//!
//! # Pipeline
//!
//! ```text
//! tokens  ->  Row[]          ->  DistrictRecord[]
//!  (per page)  cluster_rows       RecordSegmenter
//!                                  ├─ extract_figures   (opener rows)
//!                                  └─ FieldClassifier   (every other row)
//! ```
//!
//! Row-level irregularities never fail the pipeline. They are collected as
//! [`ParseAnomaly`] values next to the records.
//!
//! # Module Organization
//!
//! - [`config`]: [`ParseConfig`] and its defaults
//! - [`rows`]: vertical-proximity row clustering
//! - [`segment`]: record segmentation on the district-code pattern
//! - [`classify`]: the boundary/area state machine
//! - [`population`]: population and deviation figure extraction
//! - [`pdf2json`]: token source for `pdf2json` JSON dumps
//! - [`sources`]: document URLs and output paths per (year, district)
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use dcbounds_core::{Parser, ParseConfig, PositionedToken};
//!
//! let pages = vec![vec![
//!     PositionedToken::new(3.0, 9.0, "A01"),
//!     PositionedToken::new(6.0, 9.0, "中環"),
//!     PositionedToken::new(3.0, 11.0, "東北"),
//!     PositionedToken::new(6.0, 11.0, "下亞厘畢道"),
//! ]];
//!
//! let parser = Parser::new(ParseConfig::default())?;
//! let output = parser.parse_pages(&pages);
//! assert_eq!(output.records[0].boundaries[0].key, "東北");
//! ```

use thiserror::Error;

pub mod classify;
pub mod config;
pub mod pdf2json;
pub mod population;
pub mod rows;
pub mod segment;
pub mod sources;
pub mod types;

pub use config::{FigurePolicy, ParseConfig};
pub use segment::RecordSegmenter;
pub use types::*;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Config file error: {0}")]
    ConfigFile(String),
    #[error("pdf2json input error: {0}")]
    Pdf2Json(String),
}

/// A validated configuration bound to its compiled segmenter.
#[derive(Debug, Clone)]
pub struct Parser {
    config: ParseConfig,
    segmenter: RecordSegmenter,
}

impl Parser {
    pub fn new(config: ParseConfig) -> Result<Self, Error> {
        config.validate()?;
        let segmenter = RecordSegmenter::new(&config)?;
        Ok(Self { config, segmenter })
    }

    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    /// Run the full pipeline over a document's pages.
    pub fn parse_pages(&self, pages: &[Vec<PositionedToken>]) -> ParseOutput {
        let rows = rows::cluster_pages(pages, &self.config);
        if self.config.diagnostics {
            log::debug!("clustered {} rows from {} pages", rows.len(), pages.len());
        }
        self.segmenter.segment(&rows)
    }
}

/// Convenience wrapper: validate `config` and parse `pages` in one call.
pub fn parse_pages(
    pages: &[Vec<PositionedToken>],
    config: &ParseConfig,
) -> Result<ParseOutput, Error> {
    Ok(Parser::new(config.clone())?.parse_pages(pages))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(x: f64, y: f64, text: &str) -> PositionedToken {
        PositionedToken::new(x, y, text)
    }

    /// Two pages shaped like a real boundary description: a page header,
    /// a record split across the page break, and a second record.
    fn fixture() -> Vec<Vec<PositionedToken>> {
        vec![
            vec![
                tok(15.0, 1.5, "中西區"),
                tok(3.0, 4.0, "選區"),
                tok(3.2, 7.5, "說明"),
                tok(3.2, 9.8, "A01"),
                tok(5.1, 9.8, "中環"),
                tok(12.0, 9.8, "12,345"),
                tok(16.0, 9.9, "(+3.2%)"),
                tok(5.1, 11.3, "1."),
                tok(6.0, 11.3, "翠"),
                tok(6.4, 11.3, "峰"),
                tok(6.8, 11.3, "園"),
                tok(5.1, 12.6, "2."),
                tok(6.0, 12.6, "樂信臺"),
                tok(20.0, 12.6, "東北"),
                tok(22.0, 12.6, "下亞厘畢道、雲咸街"),
            ],
            vec![
                tok(15.0, 1.5, "中西區"),
                tok(5.1, 9.0, "3."),
                tok(6.0, 9.0, "嘉兆臺"),
                tok(20.0, 9.0, "南"),
                tok(22.0, 9.0, "堅道"),
                tok(3.2, 11.0, "A02"),
                tok(5.1, 11.0, "半山東"),
                tok(12.0, 11.0, "18,202"),
                tok(16.0, 11.0, "(-10.41%)"),
                tok(20.0, 12.4, "西"),
                tok(22.0, 12.4, "雲咸街"),
            ],
        ]
    }

    #[test]
    fn test_full_pipeline() {
        let output = parse_pages(&fixture(), &ParseConfig::default()).unwrap();

        assert_eq!(output.records.len(), 2);

        let a01 = &output.records[0];
        assert_eq!(a01.code, "A01");
        assert_eq!(a01.name, "中環");
        assert_eq!(a01.expected_population.as_str(), "12,345");
        assert_eq!(a01.deviation_percentage.as_str(), "+3.2%");
        assert_eq!(
            a01.main_area,
            vec![
                FieldEntry::new("1.", "翠峰園"),
                FieldEntry::new("2.", "樂信臺"),
                FieldEntry::new("3.", "嘉兆臺"),
            ]
        );
        assert_eq!(
            a01.boundaries,
            vec![
                FieldEntry::new("東北", "下亞厘畢道、雲咸街"),
                FieldEntry::new("南", "堅道"),
            ]
        );

        let a02 = &output.records[1];
        assert_eq!(a02.code, "A02");
        assert_eq!(a02.deviation_percentage.as_str(), "-10.41%");
        assert_eq!(a02.boundaries, vec![FieldEntry::new("西", "雲咸街")]);
        assert!(a02.main_area.is_empty());

        // "說明" sits just below the header margin and before any opener.
        assert_eq!(
            output.anomalies,
            vec![ParseAnomaly::MalformedRow {
                page: 1,
                cells: vec!["說明".to_string()],
            }]
        );
    }

    #[test]
    fn test_header_tokens_never_reach_records() {
        let output = parse_pages(&fixture(), &ParseConfig::default()).unwrap();
        let json = serde_json::to_string(&output.records).unwrap();
        assert!(!json.contains("中西區"));
        assert!(!json.contains("選區"));
    }

    #[test]
    fn test_output_is_byte_identical_across_runs() {
        let parser = Parser::new(ParseConfig::default()).unwrap();
        let first = serde_json::to_string_pretty(&parser.parse_pages(&fixture()).records).unwrap();
        let second =
            serde_json::to_string_pretty(&parser.parse_pages(&fixture()).records).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_diagnostics_do_not_change_result() {
        let quiet = parse_pages(&fixture(), &ParseConfig::default()).unwrap();
        let verbose = parse_pages(
            &fixture(),
            &ParseConfig {
                diagnostics: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(quiet, verbose);
    }

    #[test]
    fn test_empty_document() {
        let output = parse_pages(&[], &ParseConfig::default()).unwrap();
        assert!(output.records.is_empty());
        assert!(output.anomalies.is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ParseConfig {
            row_threshold: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            Parser::new(config),
            Err(Error::InvalidConfig(_))
        ));
    }
}
