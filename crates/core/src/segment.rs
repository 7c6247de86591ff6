//! Row → record segmentation.
//!
//! A row whose first cell matches the district-code pattern opens a new
//! record. Every following row is classified into that record until the next
//! opener. Rows seen before the first opener are discarded.

use regex::Regex;

use crate::classify::FieldClassifier;
use crate::config::{FigurePolicy, ParseConfig};
use crate::population::extract_figures;
use crate::types::{DistrictRecord, ParseAnomaly, ParseOutput, Row};
use crate::Error;

#[derive(Debug, Clone)]
pub struct RecordSegmenter {
    code_pattern: Regex,
    classifier: FieldClassifier,
    figure_policy: FigurePolicy,
    diagnostics: bool,
}

impl RecordSegmenter {
    pub fn new(config: &ParseConfig) -> Result<Self, Error> {
        Ok(Self {
            code_pattern: config.compile_code_pattern()?,
            classifier: FieldClassifier::new(config.boundary_keys.iter().cloned()),
            figure_policy: config.figure_policy,
            diagnostics: config.diagnostics,
        })
    }

    /// Returns `true` when `cell` should open a new record.
    ///
    /// The match is unanchored: `"A01 "` and `"(A01)"` both qualify.
    pub fn is_record_opener(&self, cell: &str) -> bool {
        self.code_pattern.is_match(cell)
    }

    pub fn segment(&self, rows: &[Row]) -> ParseOutput {
        let mut output = ParseOutput::default();

        for row in rows {
            let Some(first) = row.first() else {
                continue;
            };

            if self.is_record_opener(first) {
                let record = self.open_record(row, &mut output.anomalies);
                if self.diagnostics {
                    log::debug!("opened record {} ({})", record.code, record.name);
                }
                output.records.push(record);
                continue;
            }

            let Some(record) = output.records.last_mut() else {
                self.note(
                    &mut output.anomalies,
                    ParseAnomaly::MalformedRow {
                        page: row.page,
                        cells: row.cells.clone(),
                    },
                );
                continue;
            };

            let classified = self.classifier.classify(&row.cells);
            record.boundaries.extend(classified.boundaries);
            record.main_area.extend(classified.areas);

            if let Some(text) = classified.orphan {
                let anomaly = ParseAnomaly::OrphanText {
                    code: record.code.clone(),
                    text,
                };
                self.note(&mut output.anomalies, anomaly);
            }
        }

        output
    }

    fn open_record(&self, row: &Row, anomalies: &mut Vec<ParseAnomaly>) -> DistrictRecord {
        let code = row.cells[0].trim().to_string();
        let name = row.cells.get(1).cloned().unwrap_or_default();
        let figures = extract_figures(&row.cells, self.figure_policy);

        if figures.population.is_missing() {
            self.note(
                anomalies,
                ParseAnomaly::NoPopulationMatch { code: code.clone() },
            );
        }
        if figures.deviation.is_missing() {
            self.note(
                anomalies,
                ParseAnomaly::NoDeviationMatch { code: code.clone() },
            );
        }

        DistrictRecord {
            code,
            name,
            expected_population: figures.population,
            deviation_percentage: figures.deviation,
            boundaries: Vec::new(),
            main_area: Vec::new(),
        }
    }

    fn note(&self, anomalies: &mut Vec<ParseAnomaly>, anomaly: ParseAnomaly) {
        if self.diagnostics {
            log::debug!("{}", anomaly);
        }
        anomalies.push(anomaly);
    }
}
