use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use anyhow::Result;

use crate::config::KeyScheme;
use crate::core::{Engine, ScrapeOutput};

#[derive(Parser)]
#[command(name = "docwatch")]
#[command(about = "Watch documentation pages and report what changed")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default Docwatch.toml
    Init {
        /// Target directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Capture every configured URL and report changes since the last run
    Monitor,

    /// Capture a single page
    Scrape {
        /// Page to capture
        url: String,

        /// Where the result goes
        #[arg(value_enum, default_value_t = OutputMode::File)]
        output: OutputMode,

        /// Identity key attached to the record
        #[arg(long, value_enum, default_value_t = KeyFormat::Url)]
        key_format: KeyFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    File,
    Console,
}

impl From<OutputMode> for ScrapeOutput {
    fn from(mode: OutputMode) -> Self {
        match mode {
            OutputMode::File => ScrapeOutput::File,
            OutputMode::Console => ScrapeOutput::Console,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeyFormat {
    /// The URL itself
    Url,
    /// SHA-1 of the URL
    Hash,
}

impl From<KeyFormat> for KeyScheme {
    fn from(format: KeyFormat) -> Self {
        match format {
            KeyFormat::Url => KeyScheme::Url,
            KeyFormat::Hash => KeyScheme::UrlHash,
        }
    }
}

impl Cli {
    pub async fn execute(self, engine: Engine) -> Result<()> {
        match self.command {
            Commands::Init { path } => engine.init(path).await,
            Commands::Monitor => engine.monitor().await,
            Commands::Scrape { url, output, key_format } => {
                engine.scrape(&url, output.into(), key_format.into()).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scrape_defaults() {
        let cli = Cli::try_parse_from(["docwatch", "scrape", "https://www.agego.com/about-us"]).unwrap();
        match cli.command {
            Commands::Scrape { url, output, key_format } => {
                assert_eq!(url, "https://www.agego.com/about-us");
                assert_eq!(output, OutputMode::File);
                assert_eq!(key_format, KeyFormat::Url);
            }
            _ => panic!("expected scrape"),
        }
    }

    #[test]
    fn test_scrape_console_with_hash_keys() {
        let cli = Cli::try_parse_from([
            "docwatch", "-v", "scrape", "https://a.example.com", "console", "--key-format", "hash",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Scrape { output, key_format, .. } => {
                assert_eq!(output, OutputMode::Console);
                assert_eq!(KeyScheme::from(key_format), KeyScheme::UrlHash);
            }
            _ => panic!("expected scrape"),
        }
    }

    #[test]
    fn test_invalid_output_mode_is_rejected() {
        assert!(Cli::try_parse_from(["docwatch", "scrape", "https://a.example.com", "printer"]).is_err());
    }

    #[test]
    fn test_scrape_requires_url() {
        assert!(Cli::try_parse_from(["docwatch", "scrape"]).is_err());
    }
}
