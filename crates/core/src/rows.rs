//! Vertical-proximity row clustering.
//!
//! Tokens arrive in reading order. A new row starts whenever a token's
//! vertical position jumps by more than the configured threshold relative to
//! the previous kept token. Tokens above the header margin never reach a row.

use crate::config::ParseConfig;
use crate::types::{PositionedToken, Row};

/// Cluster the tokens of a single page into rows.
///
/// `page` is the 1-based page number stamped onto each row.
pub fn cluster_rows(page: usize, tokens: &[PositionedToken], config: &ParseConfig) -> Vec<Row> {
    let mut rows: Vec<Row> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut last_y = 0.0_f64;

    for token in tokens {
        // drop page headers
        if token.y < config.header_margin {
            continue;
        }

        if (token.y - last_y).abs() > config.row_threshold && !current.is_empty() {
            rows.push(Row::new(page, std::mem::take(&mut current)));
        }

        if config.diagnostics {
            log::debug!(
                "page {}: x={:.3} y={:.3} {:?}",
                page,
                token.x,
                token.y,
                token.text
            );
        }

        last_y = token.y;
        current.push(token.text.clone());
    }

    if !current.is_empty() {
        rows.push(Row::new(page, current));
    }

    rows
}

/// Cluster every page independently and concatenate the rows in page order.
pub fn cluster_pages(pages: &[Vec<PositionedToken>], config: &ParseConfig) -> Vec<Row> {
    pages
        .iter()
        .enumerate()
        .flat_map(|(idx, tokens)| cluster_rows(idx + 1, tokens, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(y: f64, text: &str) -> PositionedToken {
        PositionedToken::new(3.0, y, text)
    }

    fn cells(rows: &[Row]) -> Vec<Vec<&str>> {
        rows.iter()
            .map(|r| r.cells.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn test_same_row_within_threshold() {
        let config = ParseConfig::default();
        let rows = cluster_rows(1, &[tok(10.0, "A01"), tok(10.9, "中環")], &config);
        assert_eq!(cells(&rows), vec![vec!["A01", "中環"]]);
    }

    #[test]
    fn test_delta_equal_to_threshold_stays_on_row() {
        let config = ParseConfig::default();
        let rows = cluster_rows(1, &[tok(10.0, "a"), tok(11.0, "b")], &config);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_delta_above_threshold_breaks_row() {
        let config = ParseConfig::default();
        let rows = cluster_rows(1, &[tok(10.0, "a"), tok(11.01, "b")], &config);
        assert_eq!(cells(&rows), vec![vec!["a"], vec!["b"]]);
    }

    #[test]
    fn test_comparison_is_against_previous_token_not_row_start() {
        // Each step is within the threshold, so the row keeps growing even
        // though the total drift exceeds it.
        let config = ParseConfig::default();
        let rows = cluster_rows(
            1,
            &[tok(10.0, "a"), tok(10.8, "b"), tok(11.6, "c"), tok(12.4, "d")],
            &config,
        );
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_header_tokens_are_dropped() {
        let config = ParseConfig::default();
        let rows = cluster_rows(
            1,
            &[
                tok(2.0, "選區分界"),
                tok(6.99, "HEADER"),
                tok(9.0, "A01"),
                tok(9.0, "中環"),
            ],
            &config,
        );
        assert_eq!(cells(&rows), vec![vec!["A01", "中環"]]);
    }

    #[test]
    fn test_header_token_does_not_update_last_y() {
        // The header sits between two body tokens on the same line; if it
        // moved last_y the second token would start a new row.
        let config = ParseConfig::default();
        let rows = cluster_rows(
            1,
            &[tok(20.0, "a"), tok(1.0, "header"), tok(20.5, "b")],
            &config,
        );
        assert_eq!(cells(&rows), vec![vec!["a", "b"]]);
    }

    #[test]
    fn test_first_token_near_zero_does_not_emit_empty_row() {
        let config = ParseConfig {
            header_margin: 0.0,
            ..Default::default()
        };
        let rows = cluster_rows(1, &[tok(0.5, "a"), tok(5.0, "b")], &config);
        assert_eq!(cells(&rows), vec![vec!["a"], vec!["b"]]);
    }

    #[test]
    fn test_empty_page() {
        let config = ParseConfig::default();
        assert!(cluster_rows(1, &[], &config).is_empty());
        assert!(cluster_rows(1, &[tok(1.0, "only header")], &config).is_empty());
    }

    #[test]
    fn test_pages_never_merge() {
        let config = ParseConfig::default();
        let pages = vec![
            vec![tok(30.0, "end of page one")],
            vec![tok(30.0, "start of page two")],
        ];
        let rows = cluster_pages(&pages, &config);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].page, 1);
        assert_eq!(rows[1].page, 2);
    }

    #[test]
    fn test_custom_threshold() {
        let config = ParseConfig {
            row_threshold: 0.25,
            ..Default::default()
        };
        let rows = cluster_rows(1, &[tok(10.0, "a"), tok(10.5, "b")], &config);
        assert_eq!(rows.len(), 2);
    }
}
