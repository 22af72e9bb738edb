use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::error::{DocwatchError, Result};
use super::driver::CdpPage;

/// Page target as listed by the DevTools HTTP endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub id: String,
    pub web_socket_debugger_url: String,
}

/// One browser page for the lifetime of a run.
///
/// Call [`BrowserSession::close`] on every exit path; a launched browser is
/// also killed if the session is dropped.
pub struct BrowserSession {
    http: reqwest::Client,
    endpoint: String,
    target_id: String,
    page: CdpPage,
    child: Option<Child>,
    _profile: Option<tempfile::TempDir>,
}

impl BrowserSession {
    /// Launch the configured browser, or connect to a running one, and open a blank page
    pub async fn start(config: &BrowserConfig) -> Result<Self> {
        let http = reqwest::Client::new();
        let endpoint = config.endpoint.trim_end_matches('/').to_string();

        let (child, profile) = match &config.executable {
            Some(executable) => {
                let profile = tempfile::tempdir()?;
                let port = debugging_port(&endpoint)?;
                info!("Launching {} on port {}", executable.display(), port);

                let child = Command::new(executable)
                    .arg("--headless=new")
                    .arg(format!("--remote-debugging-port={}", port))
                    .arg(format!("--user-data-dir={}", profile.path().display()))
                    .arg("--no-first-run")
                    .arg("--no-default-browser-check")
                    .arg("about:blank")
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .spawn()
                    .map_err(|e| DocwatchError::Browser(format!("failed to launch browser: {}", e)))?;

                (Some(child), Some(profile))
            }
            None => (None, None),
        };

        wait_until_ready(&http, &endpoint, Duration::from_secs(config.startup_timeout_secs)).await?;

        let target: TargetInfo = http
            .put(format!("{}/json/new?about:blank", endpoint))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DocwatchError::Browser(format!("failed to open page: {}", e)))?
            .json()
            .await
            .map_err(|e| DocwatchError::Browser(format!("unexpected target listing: {}", e)))?;
        debug!("Opened page target {}", target.id);

        let page = CdpPage::attach(
            &target.web_socket_debugger_url,
            Duration::from_secs(config.navigation_timeout_secs),
        )
        .await?;

        Ok(Self {
            http,
            endpoint,
            target_id: target.id,
            page,
            child,
            _profile: profile,
        })
    }

    pub fn page(&mut self) -> &mut CdpPage {
        &mut self.page
    }

    /// Close the page target and stop a launched browser
    pub async fn close(mut self) {
        let url = format!("{}/json/close/{}", self.endpoint, self.target_id);
        if let Err(e) = self.http.get(&url).send().await {
            warn!("Failed to close page target: {}", e);
        }

        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop browser: {}", e);
            }
        }
        debug!("Browser session closed");
    }
}

/// Poll `/json/version` until the endpoint answers
async fn wait_until_ready(http: &reqwest::Client, endpoint: &str, timeout: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    let url = format!("{}/json/version", endpoint);

    loop {
        match http.get(&url).send().await {
            Ok(response) if response.status().is_success() => return Ok(()),
            Ok(response) => debug!("DevTools endpoint answered {}", response.status()),
            Err(e) => debug!("DevTools endpoint not ready: {}", e),
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(DocwatchError::Browser(format!(
                "no DevTools endpoint at {} after {:?}",
                endpoint, timeout
            )));
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

/// Port of the DevTools endpoint a launched browser must listen on
fn debugging_port(endpoint: &str) -> Result<u16> {
    let url = reqwest::Url::parse(endpoint)
        .map_err(|e| DocwatchError::Configuration(format!("invalid browser endpoint '{}': {}", endpoint, e)))?;

    url.port_or_known_default()
        .ok_or_else(|| DocwatchError::Configuration(format!("browser endpoint '{}' has no port", endpoint)))
}
