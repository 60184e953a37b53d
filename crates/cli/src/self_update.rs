//! Check crates.io for a newer release and reinstall with cargo.

use std::{cmp::Ordering, path::Path, process::Stdio, time::Duration};

use tracing::debug;

pub const PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

const CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of a version check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheck {
    pub current: String,
    /// `None` when the registry could not be reached.
    pub latest: Option<String>,
}

impl UpdateCheck {
    pub fn needs_update(&self) -> bool {
        self.latest
            .as_deref()
            .is_some_and(|latest| compare_versions(latest, &self.current) == Ordering::Greater)
    }
}

/// Ask the registry for the newest published version. Never fails.
pub async fn check_for_update() -> UpdateCheck {
    let latest = match fetch_latest_version().await {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(error = %e, "version check failed");
            None
        },
    };
    UpdateCheck {
        current: CURRENT_VERSION.to_string(),
        latest,
    }
}

async fn fetch_latest_version() -> anyhow::Result<String> {
    let url = format!("https://crates.io/api/v1/crates/{PACKAGE_NAME}");
    let client = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(CHECK_TIMEOUT)
        .build()?;
    let body: serde_json::Value = client.get(&url).send().await?.error_for_status()?.json().await?;
    latest_from_response(&body).ok_or_else(|| anyhow::anyhow!("no version in registry response"))
}

fn latest_from_response(body: &serde_json::Value) -> Option<String> {
    let krate = body.get("crate")?;
    ["max_stable_version", "max_version"]
        .iter()
        .find_map(|key| krate.get(*key).and_then(|v| v.as_str()))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Compare dotted versions numerically, stopping at the first
/// non-numeric segment.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    version_parts(a).cmp(&version_parts(b))
}

fn version_parts(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map_while(|part| part.parse::<u64>().ok())
        .collect()
}

/// Reinstall the newest version. Returns `(success, message)`.
pub async fn run_self_update() -> (bool, String) {
    let check = check_for_update().await;
    let Some(latest) = check.latest.clone() else {
        return (false, "Could not reach crates.io to check for updates.".into());
    };
    if !check.needs_update() {
        return (true, format!("Already up to date (v{}).", check.current));
    }
    let Ok(cargo) = which::which("cargo") else {
        return (false, "cargo not found on PATH.".into());
    };

    eprintln!("Installing {PACKAGE_NAME} v{latest} with cargo; this compiles from source.");
    match install_command(&cargo).status().await {
        Ok(status) if status.success() => {
            (true, format!("Updated v{} -> v{latest}.", check.current))
        },
        Ok(status) => (false, format!("cargo install exited with {status}.")),
        Err(e) => (false, format!("Update failed: {e}")),
    }
}

/// `cargo install` for this package. No deadline; cargo's progress goes
/// straight to the terminal.
fn install_command(cargo: &Path) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(cargo);
    cmd.args(["install", PACKAGE_NAME, "--locked", "--force"])
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    cmd
}
