use std::path::PathBuf;

use crate::prelude::*;
use clap::Parser;
use dcbounds_core::{FigurePolicy, ParseConfig};

mod error;
mod fetch;
mod parse;
mod prelude;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Turn District Council boundary description PDFs into structured JSON records"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct Global {
    /// TOML file with parser settings
    #[clap(long, env = "DCBOUNDS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Tokens above this vertical position are treated as page headers
    #[clap(long, global = true)]
    header_margin: Option<f64>,

    /// Vertical jump that closes a row
    #[clap(long, global = true)]
    row_threshold: Option<f64>,

    /// How figures on a record's first row are assigned (positional, by-format)
    #[clap(long, global = true)]
    figure_policy: Option<FigurePolicy>,

    /// Whether to display additional information.
    #[clap(long, env = "DCBOUNDS_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

impl Global {
    /// Config file (if any) with command-line overrides applied on top.
    pub fn parse_config(&self) -> Result<ParseConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .wrap_err_with(|| f!("Failed to read config file {}", path.display()))?;
                ParseConfig::from_toml_str(&text)?
            }
            None => ParseConfig::default(),
        };

        if let Some(margin) = self.header_margin {
            config.header_margin = margin;
        }
        if let Some(threshold) = self.row_threshold {
            config.row_threshold = threshold;
        }
        if let Some(policy) = self.figure_policy {
            config.figure_policy = policy;
        }
        config.diagnostics |= self.verbose;

        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Parse a local PDF or pdf2json dump
    Parse(crate::parse::App),

    /// Download every published description and write parsed JSON
    Fetch(crate::fetch::App),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let app = App::parse();

    let default_level = if app.global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match app.command {
        SubCommands::Parse(sub_app) => crate::parse::run(sub_app, app.global).await,
        SubCommands::Fetch(sub_app) => crate::fetch::run(sub_app, app.global).await,
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_config() {
        let config = Global::default().parse_config().unwrap();
        assert_eq!(config, ParseConfig::default());
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "header_margin = 5.0\nrow_threshold = 0.8").unwrap();

        let global = Global {
            config: Some(file.path().to_path_buf()),
            row_threshold: Some(1.5),
            figure_policy: Some(FigurePolicy::ByFormat),
            ..Default::default()
        };
        let config = global.parse_config().unwrap();
        assert_eq!(config.header_margin, 5.0);
        assert_eq!(config.row_threshold, 1.5);
        assert_eq!(config.figure_policy, FigurePolicy::ByFormat);
    }

    #[test]
    fn test_verbose_turns_on_diagnostics() {
        let global = Global {
            verbose: true,
            ..Default::default()
        };
        assert!(global.parse_config().unwrap().diagnostics);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let global = Global {
            row_threshold: Some(0.0),
            ..Default::default()
        };
        assert!(global.parse_config().is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let global = Global {
            config: Some(PathBuf::from("/nonexistent/dcbounds.toml")),
            ..Default::default()
        };
        assert!(global.parse_config().is_err());
    }

    #[test]
    fn test_cli_parses() {
        let app = App::try_parse_from([
            "dcbounds",
            "--figure-policy",
            "by-format",
            "parse",
            "A.json",
        ])
        .unwrap();
        assert_eq!(app.global.figure_policy, Some(FigurePolicy::ByFormat));
        assert!(matches!(app.command, SubCommands::Parse(_)));
    }
}
