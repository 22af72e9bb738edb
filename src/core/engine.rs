// src/core/engine.rs
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::{Config, KeyScheme};
use crate::error::DocwatchError;
use super::{
    validate_target_url, BrowserSession, ChangeStatus, ConfigValidator, MockOverride, Monitor,
    PageSession, ReportBuilder, RunOutcome, ScrapeOutput, ScrapeWriter, SnapshotStore,
};

const CONFIG_FILE: &str = "Docwatch.toml";

/// Main orchestration engine for Docwatch
pub struct Engine {
    config: Config,
}

impl Engine {
    /// Create a new engine instance from the given or discovered configuration
    pub async fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;

        debug!("Loaded configuration: {:?}", config);

        Ok(Self { config })
    }

    /// Write a default configuration file
    pub async fn init(&self, path: Option<PathBuf>) -> Result<()> {
        let target_dir = match path {
            Some(dir) => dir,
            None => std::env::current_dir().context("failed to resolve current directory")?,
        };
        let config_path = target_dir.join(CONFIG_FILE);

        if config_path.exists() {
            return Err(DocwatchError::Configuration(format!(
                "{} already exists",
                config_path.display()
            ))
            .into());
        }

        std::fs::create_dir_all(&target_dir)?;
        Config::default().save(&config_path)?;
        info!("Wrote default configuration to {}", config_path.display());
        Ok(())
    }

    /// One full monitoring run: capture, compare, persist, report
    pub async fn monitor(&self) -> Result<()> {
        let started = Instant::now();

        for warning in ConfigValidator::new(&self.config).validate().into_result()? {
            warn!("{}", warning);
        }

        let mock = MockOverride::from_env(&self.config.mock, &self.config.monitor.urls);
        if let Some(mock) = &mock {
            info!(url = %mock.url, "Mock content override active");
        }

        let mut session = BrowserSession::start(&self.config.browser).await?;
        let outcome = self.run_with(session.page(), mock).await;
        session.close().await;
        let outcome = outcome?;

        let report = ReportBuilder::new(&self.config.monitor.changes_file);
        print!("{}", report.render(&outcome.diffs, started.elapsed()));
        Ok(())
    }

    /// Load snapshots, run every URL on `page`, then save snapshots before the change batch
    pub async fn run_with(&self, page: &mut dyn PageSession, mock: Option<MockOverride>) -> Result<RunOutcome> {
        let monitor_config = &self.config.monitor;
        let store = SnapshotStore::new(&monitor_config.snapshot_file, monitor_config.key_scheme);
        let previous = store.load()?;

        info!(
            "Monitoring {} URLs for '{}'",
            monitor_config.urls.len(),
            monitor_config.name
        );

        let outcome = Monitor::new(&self.config, mock).run(page, &previous).await?;

        store.save(&outcome.snapshots)?;
        ReportBuilder::new(&monitor_config.changes_file).write_change_batch(&outcome)?;

        info!(
            new = outcome.count(ChangeStatus::New),
            changed = outcome.count(ChangeStatus::Changed),
            unchanged = outcome.count(ChangeStatus::Unchanged),
            errors = outcome.count(ChangeStatus::Error),
            "Run finished"
        );

        Ok(outcome)
    }

    /// Normalize a single page and emit its record
    pub async fn scrape(&self, url: &str, output: ScrapeOutput, scheme: KeyScheme) -> Result<()> {
        let target = validate_target_url(url)?;
        let writer = ScrapeWriter::new(&self.config.scrape.output_dir, scheme);
        let started = Instant::now();

        info!("Scraping: {}", url);

        let mut session = BrowserSession::start(&self.config.browser).await?;
        let captured = Monitor::new(&self.config, None).capture(session.page(), url).await;
        session.close().await;

        match &captured {
            Ok(_) => info!("Completed in {}ms", started.elapsed().as_millis()),
            Err(e) => warn!("Failed in {}ms: {}", started.elapsed().as_millis(), e),
        }
        let record = writer.record(url, captured);

        match output {
            ScrapeOutput::Console => {
                writer.emit_console(&record, &mut std::io::stdout().lock(), &mut std::io::stderr().lock())?
            }
            ScrapeOutput::File => {
                let path = writer.write_file(&target, &record)?;
                info!("Result saved to: {}", path.display());
            }
        }

        Ok(())
    }
}
