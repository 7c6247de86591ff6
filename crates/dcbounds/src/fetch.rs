use std::path::{Path, PathBuf};

use colored::Colorize;
use dcbounds_core::sources::{self, Unit, DISTRICT_CODES, YEARS};
use dcbounds_core::Parser;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};

use crate::prelude::{println, *};

#[derive(Debug, clap::Parser)]
#[command(name = "fetch")]
#[command(about = "Download every published boundary description and write parsed JSON")]
pub struct App {
    /// Output directory; records land in `<out>/<year>/<code>.json`
    #[arg(short, long, env = "DCBOUNDS_OUT", default_value = "data")]
    out: PathBuf,

    /// Election years to fetch (defaults to every published year)
    #[arg(long, value_delimiter = ',')]
    years: Vec<u16>,

    /// District letter codes to fetch (defaults to all 18)
    #[arg(long, value_delimiter = ',')]
    codes: Vec<String>,

    /// Number of documents processed at once
    #[arg(short = 'j', long, env = "DCBOUNDS_CONCURRENCY", default_value = "4")]
    concurrency: usize,

    /// Also keep the downloaded PDFs under `<out>/raw/`
    #[arg(long)]
    keep_raw: bool,
}

/// What a successful unit produced.
#[derive(Debug)]
pub struct UnitSummary {
    pub records: usize,
    pub anomalies: usize,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct UnitReport {
    pub unit: Unit,
    pub result: std::result::Result<UnitSummary, Error>,
}

impl App {
    fn units(&self) -> Vec<Unit> {
        let years = if self.years.is_empty() {
            YEARS.to_vec()
        } else {
            self.years.clone()
        };
        let codes: Vec<String> = if self.codes.is_empty() {
            DISTRICT_CODES.iter().map(|c| c.to_string()).collect()
        } else {
            self.codes.iter().map(|c| c.trim().to_uppercase()).collect()
        };
        sources::units(&years, &codes)
    }
}

/// Write `bytes` to `path`, creating parent directories first.
pub async fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}

async fn download(client: &reqwest::Client, unit: &Unit) -> std::result::Result<Vec<u8>, Error> {
    let download_error = |message: String| Error::Download {
        unit: unit.to_string(),
        message,
    };

    let url = unit
        .document_url()
        .ok_or_else(|| download_error("no published document for this year and code".into()))?;
    log::debug!("{}: GET {}", unit, url);

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| download_error(e.to_string()))?;

    if !response.status().is_success() {
        return Err(download_error(f!("HTTP {} from {}", response.status(), url)));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| download_error(e.to_string()))?;
    Ok(bytes.to_vec())
}

/// Download, parse and persist one unit.
pub async fn process_unit(
    client: &reqwest::Client,
    parser: &Parser,
    out: &Path,
    keep_raw: bool,
    unit: &Unit,
) -> std::result::Result<UnitSummary, Error> {
    let persist_error = |message: String| Error::Persist {
        unit: unit.to_string(),
        message,
    };

    let bytes = download(client, unit).await?;

    if keep_raw {
        let raw = out.join(unit.raw_path());
        write_file(&raw, &bytes)
            .await
            .map_err(|e| persist_error(f!("{}: {}", raw.display(), e)))?;
    }

    let parser = parser.clone();
    let output = tokio::task::spawn_blocking(move || {
        pdf::extract_pages(&bytes).map(|pages| parser.parse_pages(&pages))
    })
    .await
    .map_err(|e| e.to_string())
    .and_then(|res| res.map_err(|e| e.to_string()))
    .map_err(|message| Error::Extraction {
        unit: unit.to_string(),
        message,
    })?;

    let json = serde_json::to_string_pretty(&output.records)
        .map_err(|e| persist_error(e.to_string()))?;
    let path = out.join(unit.output_path());
    write_file(&path, json.as_bytes())
        .await
        .map_err(|e| persist_error(f!("{}: {}", path.display(), e)))?;

    log::debug!(
        "{}: {} records, {} anomalies",
        unit,
        output.records.len(),
        output.anomalies.len()
    );

    Ok(UnitSummary {
        records: output.records.len(),
        anomalies: output.anomalies.len(),
        path,
    })
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(bar)
}

fn print_summary(reports: &[UnitReport]) {
    for report in reports {
        match &report.result {
            Ok(summary) => println!(
                "{} {} {} records, {} anomalies -> {}",
                "✓".green(),
                report.unit.to_string().bold(),
                summary.records.to_string().bright_white(),
                summary.anomalies,
                summary.path.display()
            ),
            Err(err) => println!("{} {}", "✗".red(), err.to_string().red()),
        }
    }
}

/// Number of failed units.
pub fn failures(reports: &[UnitReport]) -> usize {
    reports.iter().filter(|r| r.result.is_err()).count()
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let parser = Parser::new(global.parse_config()?)?;
    let units = app.units();
    let concurrency = app.concurrency.max(1);

    if global.verbose {
        println!(
            "Fetching {} documents into {} ({} at a time)",
            units.len(),
            app.out.display(),
            concurrency
        );
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("dcbounds/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let bar = progress_bar(units.len())?;
    let keep_raw = app.keep_raw;

    let mut reports: Vec<UnitReport> = stream::iter(units)
        .map(|unit| {
            let (client, parser, bar, out) = (&client, &parser, &bar, &app.out);
            async move {
                let result = process_unit(client, parser, out, keep_raw, &unit).await;
                if let Err(err) = &result {
                    log::warn!("{}", err);
                }
                bar.set_message(unit.to_string());
                bar.inc(1);
                UnitReport { unit, result }
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    bar.finish_and_clear();

    reports.sort_by(|a, b| a.unit.cmp(&b.unit));
    print_summary(&reports);

    let failed = failures(&reports);
    if failed > 0 {
        return Err(eyre!("{} of {} units failed", failed, reports.len()));
    }

    println!("\nAll {} units written.", reports.len().to_string().bold());
    Ok(())
}
