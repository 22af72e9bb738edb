//! Chrome DevTools Protocol backend for `PageSession`.
//!
//! - `cdp`: WebSocket JSON-RPC client with response correlation and events
//! - `driver`: `CdpPage`, the page capability implemented with scripts and mouse events
//! - `session`: launches or connects to a browser and owns one page target per run

mod cdp;
mod driver;
mod session;

pub use session::BrowserSession;
