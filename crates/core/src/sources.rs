//! Where each (year, district) boundary description lives and where its
//! parsed output goes.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Election years with published boundary descriptions.
pub const YEARS: [u16; 5] = [2003, 2007, 2011, 2015, 2019];

/// Single-letter district codes, in publication order.
pub const DISTRICT_CODES: [&str; 18] = [
    "A", "B", "C", "D", "E", "F", "G", "H", "J", "K", "L", "M", "N", "P", "Q", "R", "S", "T",
];

/// File slugs used by the 2003 publication, aligned with [`DISTRICT_CODES`].
pub const DISTRICT_SLUGS_2003: [&str; 18] = [
    "cnw",
    "wc",
    "east",
    "south",
    "ytm",
    "ssp",
    "kc",
    "wts",
    "kt",
    "tw",
    "tm",
    "yl",
    "north",
    "tp",
    "sk",
    "st",
    "kwaitsing",
    "islands",
];

const BASE_URL: &str = "https://www.eac.hk/pdf/distco";

/// One document to fetch and parse.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Unit {
    pub year: u16,
    pub code: String,
}

impl Unit {
    pub fn new(year: u16, code: impl Into<String>) -> Self {
        Unit {
            year,
            code: code.into(),
        }
    }

    pub fn document_url(&self) -> Option<String> {
        document_url(self.year, &self.code)
    }

    /// Output location relative to the output root: `{year}/{code}.json`.
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(self.year.to_string()).join(format!("{}.json", self.code))
    }

    /// Location for the downloaded PDF relative to the output root.
    pub fn raw_path(&self) -> PathBuf {
        PathBuf::from("raw").join(format!("{}.pdf", self))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.year, self.code)
    }
}

/// Cross product of years and codes, year-major.
pub fn units(years: &[u16], codes: &[String]) -> Vec<Unit> {
    years
        .iter()
        .flat_map(|&year| codes.iter().map(move |code| Unit::new(year, code.clone())))
        .collect()
}

/// The 2003 file slug for a letter code, looked up by position.
pub fn slug_2003(code: &str) -> Option<&'static str> {
    DISTRICT_CODES
        .iter()
        .position(|c| *c == code)
        .and_then(|idx| DISTRICT_SLUGS_2003.get(idx).copied())
}

/// Download URL of the Chinese boundary description for a unit.
///
/// Returns `None` for years that were never published or codes without a
/// 2003 slug.
pub fn document_url(year: u16, code: &str) -> Option<String> {
    match year {
        2003 => slug_2003(code)
            .map(|slug| format!("{BASE_URL}/ch/2003dc_boundary/v2_{slug}_c.pdf")),
        2007 | 2011 => Some(format!("{BASE_URL}/{year}dc/ch/{code}_descriptions.pdf")),
        2015 => Some(format!("{BASE_URL}/2015dc/final/ch/{code}_descriptions.pdf")),
        2019 => Some(format!(
            "{BASE_URL}/2019dc/final/ch/{code}_descriptions(Chi).pdf"
        )),
        _ => None,
    }
}
