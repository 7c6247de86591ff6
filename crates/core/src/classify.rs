//! Per-row boundary/area classification.
//!
//! A row is walked cell by cell. Compass-direction cells open a boundary
//! entry, `N.` cells open an area entry, and everything else is glued onto
//! whichever entry was opened last.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::FieldEntry;

/// Which list the accumulator is currently feeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Boundary,
    Area,
}

/// Entries pulled out of a single row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classified {
    pub boundaries: Vec<FieldEntry>,
    pub areas: Vec<FieldEntry>,
    /// Text that appeared before the row's first key. It belongs to no
    /// entry and is dropped from the record.
    pub orphan: Option<String>,
}

/// In-progress `(kind, key, value)` triple.
#[derive(Debug, Default)]
struct FieldAccumulator {
    kind: Option<FieldKind>,
    key: Option<String>,
    value: String,
}

impl FieldAccumulator {
    /// Emit the pending value into the list selected by the current kind.
    ///
    /// No-op when the value is empty. The key survives the flush.
    fn flush(&mut self, out: &mut Classified) {
        if self.value.is_empty() {
            return;
        }
        let (Some(kind), Some(key)) = (self.kind, self.key.as_ref()) else {
            out.orphan
                .get_or_insert_with(String::new)
                .push_str(&std::mem::take(&mut self.value));
            return;
        };
        let entry = FieldEntry::new(key.clone(), std::mem::take(&mut self.value));
        match kind {
            FieldKind::Boundary => out.boundaries.push(entry),
            FieldKind::Area => out.areas.push(entry),
        }
    }

    /// Flush, then start accumulating under a new key.
    fn open(&mut self, kind: FieldKind, key: &str, out: &mut Classified) {
        self.flush(out);
        self.kind = Some(kind);
        self.key = Some(key.to_string());
        self.value.clear();
    }

    fn push_text(&mut self, text: &str) {
        self.value.push_str(text);
    }
}

fn area_key_pattern() -> &'static Regex {
    static RE_AREA_KEY: OnceLock<Regex> = OnceLock::new();
    // Anchored so a figure like `12.5` inside a boundary value never opens an area.
    RE_AREA_KEY.get_or_init(|| Regex::new(r"^\s*[0-9]{1,2}\.\s*$").unwrap())
}

/// Returns `true` for numbered sub-area markers such as `1.` or `12.`.
pub fn is_area_key(cell: &str) -> bool {
    area_key_pattern().is_match(cell)
}

/// Splits row cells into boundary and area entries.
#[derive(Debug, Clone)]
pub struct FieldClassifier {
    boundary_keys: HashSet<String>,
}

impl FieldClassifier {
    pub fn new<I, S>(boundary_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            boundary_keys: boundary_keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Exact match against the configured direction set.
    pub fn is_boundary_key(&self, cell: &str) -> bool {
        self.boundary_keys.contains(cell)
    }

    pub fn classify(&self, cells: &[String]) -> Classified {
        let mut out = Classified::default();
        let mut acc = FieldAccumulator::default();

        for cell in cells {
            if self.is_boundary_key(cell) {
                acc.open(FieldKind::Boundary, cell, &mut out);
            } else if is_area_key(cell) {
                acc.open(FieldKind::Area, cell, &mut out);
            } else {
                acc.push_text(cell);
            }
        }
        acc.flush(&mut out);

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BOUNDARY_KEYS;

    fn classifier() -> FieldClassifier {
        FieldClassifier::new(DEFAULT_BOUNDARY_KEYS)
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_single_boundary() {
        let out = classifier().classify(&row(&["東北", "下亞厘畢道、雲咸街"]));
        assert_eq!(
            out.boundaries,
            vec![FieldEntry::new("東北", "下亞厘畢道、雲咸街")]
        );
        assert!(out.areas.is_empty());
        assert_eq!(out.orphan, None);
    }

    #[test]
    fn test_multi_area_row_with_trailing_boundary() {
        let out = classifier().classify(&row(&[
            "1.",
            "翠",
            "峰",
            "園",
            "2.",
            "樂信臺",
            "3.",
            "嘉兆臺",
            "4.",
            "麗豪閣",
            "東北",
            "下亞厘畢道、雲咸街",
        ]));
        assert_eq!(
            out.areas,
            vec![
                FieldEntry::new("1.", "翠峰園"),
                FieldEntry::new("2.", "樂信臺"),
                FieldEntry::new("3.", "嘉兆臺"),
                FieldEntry::new("4.", "麗豪閣"),
            ]
        );
        assert_eq!(
            out.boundaries,
            vec![FieldEntry::new("東北", "下亞厘畢道、雲咸街")]
        );
    }

    #[test]
    fn test_key_without_text_produces_no_entry() {
        let out = classifier().classify(&row(&["東", "5.", "西", "堅道"]));
        assert!(out.areas.is_empty());
        assert_eq!(out.boundaries, vec![FieldEntry::new("西", "堅道")]);
    }

    #[test]
    fn test_duplicate_keys_stay_separate() {
        let out = classifier().classify(&row(&["北", "干諾道中", "北", "海旁"]));
        assert_eq!(
            out.boundaries,
            vec![
                FieldEntry::new("北", "干諾道中"),
                FieldEntry::new("北", "海旁"),
            ]
        );
    }

    #[test]
    fn test_leading_text_is_orphaned_not_prefixed() {
        let out = classifier().classify(&row(&["續", "行", "南", "皇后大道中"]));
        assert_eq!(out.orphan.as_deref(), Some("續行"));
        assert_eq!(out.boundaries, vec![FieldEntry::new("南", "皇后大道中")]);
    }

    #[test]
    fn test_text_only_row() {
        let out = classifier().classify(&row(&["只有", "文字"]));
        assert!(out.boundaries.is_empty());
        assert!(out.areas.is_empty());
        assert_eq!(out.orphan.as_deref(), Some("只有文字"));
    }

    #[test]
    fn test_boundary_match_is_exact() {
        // "東區" contains a direction but is not one.
        let out = classifier().classify(&row(&["1.", "東區", "花園"]));
        assert_eq!(out.areas, vec![FieldEntry::new("1.", "東區花園")]);
        assert!(out.boundaries.is_empty());
    }

    #[test]
    fn test_area_key_pattern() {
        assert!(is_area_key("1."));
        assert!(is_area_key("12."));
        assert!(is_area_key(" 3. "));
        assert!(!is_area_key("123."));
        assert!(!is_area_key("3.2%"));
        assert!(!is_area_key("1"));
        assert!(!is_area_key("a."));
        assert!(!is_area_key("12.5"));
    }

    #[test]
    fn test_decimal_figure_stays_in_boundary_value() {
        let out = classifier().classify(&row(&["東", "屯門公路", "12.5", "公里"]));
        assert_eq!(out.boundaries, vec![FieldEntry::new("東", "屯門公路12.5公里")]);
        assert!(out.areas.is_empty());
    }

    #[test]
    fn test_custom_boundary_keys() {
        let classifier = FieldClassifier::new(["N", "S"]);
        let out = classifier.classify(&row(&["N", "Main St", "S", "Harbour"]));
        assert_eq!(
            out.boundaries,
            vec![
                FieldEntry::new("N", "Main St"),
                FieldEntry::new("S", "Harbour")
            ]
        );
    }

    #[test]
    fn test_empty_row() {
        assert_eq!(classifier().classify(&[]), Classified::default());
    }
}
