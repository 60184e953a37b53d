//! One update run: back up, fetch, install, record.

use std::path::{Path, PathBuf};

use {
    async_trait::async_trait,
    skillsync_config::{AppConfig, RepositoryConfig},
    tracing::{info, warn},
};

use crate::{
    backup::BackupManager,
    error::Result,
    fsutil::remove_path,
    install::{InstallOptions, InstallReport, install_skills},
    lockfile::LockfileStore,
    types::{DownloadResult, Lockfile, SnapshotInfo},
};

/// Fetches a repository's content into a local directory.
#[async_trait]
pub trait RepoFetcher: Send + Sync {
    /// Populate `dest` (which does not exist yet) with the repository content.
    async fn fetch(&self, repo: &RepositoryConfig, dest: &Path) -> anyhow::Result<()>;
}

/// Local checkout directory for a repository under `temp_dir`.
pub fn checkout_dir(temp_dir: &Path, repo: &RepositoryConfig) -> PathBuf {
    temp_dir.join(repo.name.replace(['/', '\\'], "_"))
}

/// Fetch every repository in turn. Failures become failed results.
pub async fn download_repos(
    repos: &[RepositoryConfig],
    temp_dir: &Path,
    fetcher: &dyn RepoFetcher,
) -> Vec<DownloadResult> {
    let mut results = Vec::with_capacity(repos.len());

    for repo in repos {
        let dest = checkout_dir(temp_dir, repo);
        if let Err(e) = remove_path(&dest) {
            warn!(repo = %repo.name, path = %dest.display(), error = %e, "failed to clear checkout dir");
            results.push(DownloadResult::failure(repo.clone(), dest, e.to_string()));
            continue;
        }
        if let Some(parent) = dest.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            results.push(DownloadResult::failure(repo.clone(), dest, e.to_string()));
            continue;
        }

        info!(repo = %repo.name, url = %repo.url, "fetching repository");
        match fetcher.fetch(repo, &dest).await {
            Ok(()) => results.push(DownloadResult::success(repo.clone(), dest)),
            Err(e) => {
                warn!(repo = %repo.name, error = %e, "fetch failed");
                results.push(DownloadResult::failure(repo.clone(), dest, format!("{e:#}")));
            },
        }
    }

    results
}

/// Knobs for [`run_update`].
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub install: InstallOptions,
    /// Only these skills; `None` or empty means all.
    pub skill_filter: Option<Vec<String>>,
}

/// Everything a caller needs to report on an update run.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    pub backup: Option<SnapshotInfo>,
    pub downloads: Vec<DownloadResult>,
    pub install: InstallReport,
    /// Lockfile as saved (or as it would be saved on dry run).
    pub lockfile: Lockfile,
}

impl UpdateReport {
    pub fn failed_downloads(&self) -> impl Iterator<Item = &DownloadResult> {
        self.downloads.iter().filter(|d| !d.is_success())
    }
}

/// Run a full update against `config`.
///
/// Only backup I/O and lockfile-save failures are returned as errors;
/// everything per repository or per skill ends up in the report.
pub async fn run_update(
    config: &AppConfig,
    fetcher: &dyn RepoFetcher,
    options: &UpdateOptions,
) -> Result<UpdateReport> {
    let target_roots = config.skill_target_paths();
    let store = LockfileStore::for_target_root(&config.global_skills_path);
    let mut lockfile = store.load();
    let mut report = UpdateReport::default();

    if !options.install.dry_run {
        report.backup = BackupManager::from_config(config).create_backup(&target_roots, &lockfile)?;
    }

    report.downloads = download_repos(&config.repositories, &config.temp_path, fetcher).await;

    report.install = install_skills(
        &report.downloads,
        &target_roots,
        options.skill_filter.as_deref(),
        options.install,
    );

    for record in &report.install.installed {
        lockfile.update(record);
    }
    if !options.install.dry_run {
        store.save(&lockfile)?;
    }
    report.lockfile = lockfile;

    info!(
        installed = report.install.installed.len(),
        failed_downloads = report.failed_downloads().count(),
        dry_run = options.install.dry_run,
        "update finished"
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        skillsync_config::RepoStructure,
        std::sync::Mutex,
    };

    /// Writes a canned layout, or fails for repositories named `fail*`.
    struct FakeFetcher {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RepoFetcher for FakeFetcher {
        async fn fetch(&self, repo: &RepositoryConfig, dest: &Path) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(repo.name.clone());
            if repo.name.starts_with("fail") {
                anyhow::bail!("network unreachable");
            }
            assert!(!dest.exists(), "checkout dir must be cleared first");
            std::fs::create_dir_all(dest.join("skills/pdf"))?;
            std::fs::write(dest.join("skills/pdf/SKILL.md"), "pdf")?;
            Ok(())
        }
    }

    fn repo(name: &str) -> RepositoryConfig {
        RepositoryConfig {
            name: name.into(),
            url: format!("https://github.com/o/{name}"),
            branch: None,
            structure: RepoStructure::Standard,
            skills: vec!["pdf".into()],
        }
    }

    #[tokio::test]
    async fn download_failures_do_not_stop_the_loop() {
        let tmp = tempfile::tempdir().unwrap();
        let stale = tmp.path().join("org_ok");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("old"), "").unwrap();

        let fetcher = FakeFetcher {
            seen: Mutex::new(Vec::new()),
        };
        let repos = vec![repo("fail-one"), repo("org/ok")];
        let results = download_repos(&repos, tmp.path(), &fetcher).await;

        assert_eq!(*fetcher.seen.lock().unwrap(), vec!["fail-one", "org/ok"]);
        assert!(!results[0].is_success());
        assert!(results[0].error.as_deref().unwrap().contains("network unreachable"));
        assert!(results[1].is_success());
        assert_eq!(results[1].local_path, stale);
        assert!(!stale.join("old").exists());
    }

    #[test]
    fn checkout_dir_flattens_slashes() {
        let dir = checkout_dir(Path::new("/tmp/x"), &repo("a/b\\c"));
        assert_eq!(dir, Path::new("/tmp/x/a_b_c"));
    }
}
