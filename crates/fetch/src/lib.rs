//! Repository fetching for skill updates.
//!
//! `git clone --depth 1` when git is available, with a GitHub tarball
//! fallback. Non-GitHub hosts go through [`host::HostPolicy`] first.

pub mod archive;
pub mod error;
pub mod git;
pub mod host;

use std::{path::Path, sync::Arc};

use {
    async_trait::async_trait,
    skillsync_config::{AppConfig, RepositoryConfig},
    skillsync_skills::sync::RepoFetcher,
    tracing::{debug, warn},
};

pub use {
    error::{Error, Result},
    host::{DenyUnknown, HostApprover, HostDecision, HostPolicy},
};

/// Default [`RepoFetcher`]: git first, GitHub tarball second.
pub struct GitArchiveFetcher {
    policy: HostPolicy,
    client: reqwest::Client,
    git: bool,
}

impl GitArchiveFetcher {
    pub fn new(config: &AppConfig, trust_all: bool, approver: Arc<dyn HostApprover>) -> Self {
        let git = git::git_available();
        if !git {
            warn!("git not found on PATH, using archive download");
        }
        Self {
            policy: HostPolicy::new(config.clone(), trust_all, approver),
            client: reqwest::Client::builder()
                .user_agent(concat!("skillsync/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
            git,
        }
    }

    pub fn policy(&self) -> &HostPolicy {
        &self.policy
    }

    async fn fetch_checked(&self, repo: &RepositoryConfig, dest: &Path) -> anyhow::Result<()> {
        if !self.git {
            archive::download(&self.client, repo, dest).await?;
            return Ok(());
        }

        let git_err = match git::clone(repo, dest).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        if !host::is_github_url(&repo.url) {
            return Err(git_err.into());
        }

        debug!(repo = %repo.name, error = %git_err, "git failed, trying archive fallback");
        if let Err(e) = tokio::fs::remove_dir_all(dest).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %dest.display(), error = %e, "failed to clear partial clone");
        }
        match archive::download(&self.client, repo, dest).await {
            Ok(()) => Ok(()),
            Err(archive_err) => anyhow::bail!("git: {git_err} | archive: {archive_err}"),
        }
    }
}

#[async_trait]
impl RepoFetcher for GitArchiveFetcher {
    async fn fetch(&self, repo: &RepositoryConfig, dest: &Path) -> anyhow::Result<()> {
        if !self.policy.is_allowed(&repo.url) {
            return Err(Error::HostNotAllowed {
                host: host::extract_host(&repo.url),
            }
            .into());
        }
        self.fetch_checked(repo, dest).await
    }
}
