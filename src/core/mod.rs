mod engine;
mod page;
mod hasher;
mod snapshot;
mod differ;
mod normalizer;
mod monitor;
mod report;
mod scrape;
mod validator;

// DevTools-backed page sessions
mod browser;

#[cfg(test)]
mod testing;

pub use page::PageSession;
pub use snapshot::{PageRecord, SnapshotStore};
pub use differ::ChangeStatus;
pub use monitor::{MockOverride, Monitor, RunOutcome};
pub use report::ReportBuilder;
pub use scrape::{ScrapeOutput, ScrapeWriter};
pub use validator::{validate_target_url, ConfigValidator};
pub use browser::BrowserSession;

// Export the main engine
pub use engine::Engine;
