//! Shallow `git clone` via the system git binary.

use std::{path::Path, process::Stdio, time::Duration};

use {skillsync_config::RepositoryConfig, tokio::process::Command, tracing::debug};

use crate::error::{Error, Result};

pub const CLONE_TIMEOUT: Duration = Duration::from_secs(120);

/// Whether a `git` executable is on `PATH`.
pub fn git_available() -> bool {
    which::which("git").is_ok()
}

/// Arguments for a shallow clone of `repo` into `dest`.
pub fn clone_args(repo: &RepositoryConfig, dest: &Path) -> Vec<String> {
    let mut args = vec!["clone".to_string(), "--depth".to_string(), "1".to_string()];
    if let Some(branch) = repo.branch.as_deref().filter(|b| !b.is_empty()) {
        args.push("--branch".to_string());
        args.push(branch.to_string());
    }
    args.push(repo.url.clone());
    args.push(dest.to_string_lossy().into_owned());
    args
}

pub async fn clone(repo: &RepositoryConfig, dest: &Path) -> Result<()> {
    let args = clone_args(repo, dest);
    debug!(cmd = %format!("git {}", args.join(" ")), "running git");

    let mut cmd = Command::new("git");
    cmd.args(&args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(CLONE_TIMEOUT, cmd.output())
        .await
        .map_err(|_| Error::Timeout {
            operation: "git clone",
            secs: CLONE_TIMEOUT.as_secs(),
        })??;

    if !output.status.success() {
        return Err(Error::GitClone {
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}
