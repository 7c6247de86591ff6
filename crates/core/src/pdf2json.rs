//! Token source for JSON dumps produced by the `pdf2json` tool.
//!
//! Older releases wrap the pages in a `formImage` object, newer ones put
//! `Pages` at the top level. Both shapes are accepted. Each text item carries
//! one or more runs whose `T` field is URI-encoded.

use std::borrow::Cow;

use serde::Deserialize;

use crate::types::PositionedToken;
use crate::Error;

#[derive(Debug, Deserialize)]
struct Pdf2JsonDocument {
    #[serde(rename = "formImage")]
    form_image: Option<FormImage>,
    #[serde(rename = "Pages", default)]
    pages: Vec<Pdf2JsonPage>,
}

#[derive(Debug, Deserialize)]
struct FormImage {
    #[serde(rename = "Pages", default)]
    pages: Vec<Pdf2JsonPage>,
}

#[derive(Debug, Deserialize)]
struct Pdf2JsonPage {
    #[serde(rename = "Texts", default)]
    texts: Vec<Pdf2JsonText>,
}

#[derive(Debug, Deserialize)]
struct Pdf2JsonText {
    x: f64,
    y: f64,
    #[serde(rename = "R", default)]
    runs: Vec<Pdf2JsonRun>,
}

#[derive(Debug, Deserialize)]
struct Pdf2JsonRun {
    #[serde(rename = "T", default)]
    text: String,
}

/// Decode one URI-encoded text fragment.
///
/// Fragments that do not decode to valid UTF-8 are kept verbatim.
pub fn decode_fragment(raw: &str) -> Cow<'_, str> {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded,
        Err(e) => {
            log::warn!("keeping undecodable fragment {:?}: {}", raw, e);
            Cow::Borrowed(raw)
        }
    }
}

/// Parse a pdf2json dump into per-page token lists.
pub fn read_pages(json: &str) -> Result<Vec<Vec<PositionedToken>>, Error> {
    let document: Pdf2JsonDocument =
        serde_json::from_str(json).map_err(|e| Error::Pdf2Json(e.to_string()))?;

    let pages = match document.form_image {
        Some(form_image) => form_image.pages,
        None => document.pages,
    };

    Ok(pages
        .into_iter()
        .map(|page| {
            page.texts
                .into_iter()
                .map(|text| {
                    let joined: String = text
                        .runs
                        .iter()
                        .map(|run| decode_fragment(&run.text))
                        .collect();
                    PositionedToken::new(text.x, text.y, joined)
                })
                .collect()
        })
        .collect())
}
