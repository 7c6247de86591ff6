/// Failures of a single (year, district) unit. Every variant names its unit
/// as `{year}_{code}`.
#[derive(thiserror::Error, Debug, serde::Deserialize, serde::Serialize)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    #[error("{unit}: download failed: {message}")]
    Download { unit: String, message: String },

    #[error("{unit}: extraction failed: {message}")]
    Extraction { unit: String, message: String },

    #[error("{unit}: could not write output: {message}")]
    Persist { unit: String, message: String },
}
