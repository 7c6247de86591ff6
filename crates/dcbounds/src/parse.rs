use std::path::{Path, PathBuf};

use colored::Colorize;
use dcbounds_core::{DistrictRecord, ParseAnomaly, ParseOutput, Parser, PositionedToken};

use crate::prelude::{eprintln, println, *};

#[derive(Debug, clap::Parser)]
#[command(name = "parse")]
#[command(about = "Parse a local boundary description (PDF or pdf2json dump)")]
pub struct App {
    /// Path to the PDF or pdf2json JSON file
    path: PathBuf,

    /// Input format; `auto` sniffs the file
    #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
    format: InputFormat,

    /// Print records as JSON instead of a summary table
    #[arg(long)]
    json: bool,

    /// Write the JSON records to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum InputFormat {
    Auto,
    Pdf,
    Json,
}

/// Resolve `Auto` from the file's leading bytes, then its extension.
pub fn detect_format(path: &Path, bytes: &[u8]) -> InputFormat {
    let head = bytes.trim_ascii_start();
    if head.starts_with(b"%PDF") {
        return InputFormat::Pdf;
    }
    if head.starts_with(b"{") {
        return InputFormat::Json;
    }
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => InputFormat::Json,
        _ => InputFormat::Pdf,
    }
}

/// Decode a document into pages of tokens.
pub fn load_tokens(bytes: &[u8], format: InputFormat) -> Result<Vec<Vec<PositionedToken>>> {
    match format {
        InputFormat::Pdf | InputFormat::Auto => {
            pdf::extract_pages(bytes).map_err(|e| eyre!("Failed to extract PDF text: {}", e))
        }
        InputFormat::Json => {
            let text = std::str::from_utf8(bytes).context("pdf2json dump is not valid UTF-8")?;
            Ok(dcbounds_core::pdf2json::read_pages(text)?)
        }
    }
}

/// Read, decode and parse one file.
pub fn parse_file(path: &Path, format: InputFormat, parser: &Parser) -> Result<ParseOutput> {
    let bytes =
        std::fs::read(path).wrap_err_with(|| f!("Failed to read {}", path.display()))?;
    let format = match format {
        InputFormat::Auto => detect_format(path, &bytes),
        explicit => explicit,
    };
    log::debug!("parsing {} as {:?}", path.display(), format);

    let pages = load_tokens(&bytes, format)?;
    Ok(parser.parse_pages(&pages))
}

/// Records as pretty JSON. Non-ASCII text is kept verbatim.
pub fn render_json(records: &[DistrictRecord]) -> Result<String> {
    serde_json::to_string_pretty(records).context("Failed to serialize records")
}

fn print_table(records: &[DistrictRecord]) {
    let mut table = new_table();
    table.add_row(prettytable::row![
        "Code".bold().cyan(),
        "Name".bold().cyan(),
        "Population".bold().cyan(),
        "Deviation".bold().cyan(),
        "Boundaries".bold().cyan(),
        "Areas".bold().cyan()
    ]);

    let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };

    for record in records {
        table.add_row(prettytable::row![
            record.code.green(),
            record.name.bright_white(),
            or_dash(record.expected_population.as_str()).bright_yellow(),
            or_dash(record.deviation_percentage.as_str()).bright_yellow(),
            record.boundaries.len().to_string(),
            record.main_area.len().to_string()
        ]);
    }

    table.printstd();
}

fn report_anomalies(anomalies: &[ParseAnomaly]) {
    if anomalies.is_empty() {
        return;
    }
    eprintln!("\n{} anomalies:", anomalies.len().to_string().yellow().bold());
    for anomaly in anomalies {
        eprintln!("  {} {}", "!".yellow(), anomaly);
    }
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let parser = Parser::new(global.parse_config()?)?;

    let path = app.path.clone();
    let format = app.format;
    let output = tokio::task::spawn_blocking(move || parse_file(&path, format, &parser))
        .await
        .context("Parser task panicked")??;

    if let Some(out) = &app.output {
        std::fs::write(out, render_json(&output.records)?)
            .wrap_err_with(|| f!("Failed to write {}", out.display()))?;
        println!(
            "Wrote {} records to {}",
            output.records.len().to_string().bold(),
            out.display()
        );
    } else if app.json {
        println!("{}", render_json(&output.records)?);
    } else if output.records.is_empty() {
        println!("No records found.");
    } else {
        print_table(&output.records);
    }

    report_anomalies(&output.anomalies);

    Ok(())
}
