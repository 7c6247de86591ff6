use std::sync::OnceLock;

use regex::Regex;

use crate::config::FigurePolicy;
use crate::types::Figure;

/// Population and deviation figures taken from a record-opening row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Figures {
    pub population: Figure,
    pub deviation: Figure,
}

fn figure_pattern() -> &'static Regex {
    static RE_FIGURE: OnceLock<Regex> = OnceLock::new();
    RE_FIGURE.get_or_init(|| Regex::new(r"[+-]?[0-9]+(?:[,.][0-9]+)*%?").unwrap())
}

/// All numeric-looking substrings of `text`, left to right.
///
/// A match is an optional sign, digits with optional thousands separators or
/// a decimal point, and an optional trailing `%`.
pub fn scan_figures(text: &str) -> Vec<&str> {
    figure_pattern()
        .find_iter(text)
        .map(|m| m.as_str())
        .collect()
}

/// Extract the two figures from a record-opening row.
///
/// Cells 0 and 1 (code and name) are ignored. The remaining cells are
/// concatenated without a separator before scanning, because the extractor
/// often splits a single figure across several tokens.
pub fn extract_figures(cells: &[String], policy: FigurePolicy) -> Figures {
    let tail: String = cells.iter().skip(2).map(String::as_str).collect();
    let matches = scan_figures(&tail);

    let (population, deviation) = match policy {
        FigurePolicy::Positional => (matches.first(), matches.get(1)),
        FigurePolicy::ByFormat => (
            matches.iter().find(|m| !m.ends_with('%')),
            matches.iter().find(|m| m.ends_with('%')),
        ),
    };

    Figures {
        population: population.map(|m| Figure::matched(*m)).unwrap_or_default(),
        deviation: deviation.map(|m| Figure::matched(*m)).unwrap_or_default(),
    }
}
