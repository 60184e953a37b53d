#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Full update and rollback flows against a fake fetcher.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use {
    async_trait::async_trait,
    skillsync_config::{AppConfig, RepoStructure, RepositoryConfig},
    skillsync_skills::{
        backup::BackupManager,
        install::InstallOptions,
        lockfile::LockfileStore,
        sync::{RepoFetcher, UpdateOptions, run_update},
    },
};

/// Serves fixed file trees keyed by repository name.
#[derive(Default)]
struct TreeFetcher {
    trees: HashMap<String, Vec<(&'static str, String)>>,
}

impl TreeFetcher {
    fn with(mut self, repo: &str, files: &[(&'static str, &str)]) -> Self {
        self.trees.insert(
            repo.to_string(),
            files.iter().map(|(p, c)| (*p, c.to_string())).collect(),
        );
        self
    }
}

#[async_trait]
impl RepoFetcher for TreeFetcher {
    async fn fetch(&self, repo: &RepositoryConfig, dest: &Path) -> anyhow::Result<()> {
        let files = self
            .trees
            .get(&repo.name)
            .ok_or_else(|| anyhow::anyhow!("repository not found"))?;
        for (rel, content) in files {
            let path = dest.join(rel);
            std::fs::create_dir_all(path.parent().unwrap())?;
            std::fs::write(path, content)?;
        }
        Ok(())
    }
}

struct Env {
    _tmp: tempfile::TempDir,
    config: AppConfig,
}

fn env(repos: Vec<RepositoryConfig>) -> Env {
    let tmp = tempfile::tempdir().unwrap();
    let base = tmp.path().to_path_buf();
    let config = AppConfig {
        global_skills_path: base.join("agents/skills"),
        windsurf_skills_path: base.join("windsurf/skills"),
        temp_path: base.join("tmp"),
        backup_path: base.join("backups"),
        log_path: None,
        keep_backups: 3,
        allowed_hosts: Vec::new(),
        repositories: repos,
        config_file_path: None,
    };
    std::fs::create_dir_all(&config.global_skills_path).unwrap();
    Env { _tmp: tmp, config }
}

fn repo(name: &str, structure: RepoStructure, skills: &[&str]) -> RepositoryConfig {
    RepositoryConfig {
        name: name.into(),
        url: format!("https://github.com/acme/{name}.git"),
        branch: None,
        structure,
        skills: skills.iter().map(|s| s.to_string()).collect(),
    }
}

fn read(path: PathBuf) -> String {
    std::fs::read_to_string(path).unwrap()
}

fn force() -> UpdateOptions {
    UpdateOptions {
        install: InstallOptions {
            overwrite: true,
            dry_run: false,
        },
        skill_filter: None,
    }
}

#[tokio::test]
async fn first_install_records_lockfile_without_backup() {
    let env = env(vec![repo("anthropic", RepoStructure::Standard, &["pdf", "missing"])]);
    let fetcher = TreeFetcher::default().with("anthropic", &[("skills/pdf/SKILL.md", "v1")]);

    let report = run_update(&env.config, &fetcher, &UpdateOptions::default())
        .await
        .unwrap();

    assert!(report.backup.is_none());
    assert_eq!(report.install.installed.len(), 1);
    assert_eq!(read(env.config.global_skills_path.join("pdf/SKILL.md")), "v1");
    // Secondary root does not exist, so nothing lands there.
    assert!(!env.config.windsurf_skills_path.exists());

    let lock = LockfileStore::for_target_root(&env.config.global_skills_path).load();
    let entry = lock.get("pdf").unwrap();
    assert_eq!(entry.source, "anthropic");
    assert_eq!(entry.source_url, "https://github.com/acme/anthropic.git");
    assert_eq!(entry.skill_path, "skills/pdf");
    assert_eq!(entry.installed_at, entry.updated_at);
}

#[tokio::test]
async fn update_then_rollback_restores_previous_version() {
    let env = env(vec![repo("anthropic", RepoStructure::Standard, &["pdf"])]);
    let v1 = TreeFetcher::default().with("anthropic", &[("skills/pdf/SKILL.md", "v1")]);
    run_update(&env.config, &v1, &force()).await.unwrap();

    let v2 = TreeFetcher::default().with("anthropic", &[("skills/pdf/SKILL.md", "v2")]);
    let report = run_update(&env.config, &v2, &force()).await.unwrap();
    let backup = report.backup.expect("second run backs up");
    assert_eq!(backup.skills, vec!["pdf"]);
    assert_eq!(read(env.config.global_skills_path.join("pdf/SKILL.md")), "v2");

    let store = LockfileStore::for_target_root(&env.config.global_skills_path);
    let restored = BackupManager::from_config(&env.config)
        .restore_backup(&env.config.skill_target_paths(), None, false, &store)
        .unwrap();
    assert!(restored.succeeded());
    assert!(restored.lockfile_restored);
    assert_eq!(read(env.config.global_skills_path.join("pdf/SKILL.md")), "v1");
}

#[tokio::test]
async fn existing_skill_is_kept_without_force() {
    let env = env(vec![repo("anthropic", RepoStructure::Standard, &["pdf"])]);
    let dest = env.config.global_skills_path.join("pdf");
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("SKILL.md"), "local edits").unwrap();

    let fetcher = TreeFetcher::default().with("anthropic", &[("skills/pdf/SKILL.md", "upstream")]);
    let report = run_update(&env.config, &fetcher, &UpdateOptions::default())
        .await
        .unwrap();

    assert!(report.install.installed.is_empty());
    assert_eq!(read(dest.join("SKILL.md")), "local edits");
}

#[tokio::test]
async fn dry_run_touches_nothing() {
    let env = env(vec![repo("solo", RepoStructure::Root, &["solo"])]);
    let fetcher = TreeFetcher::default().with("solo", &[("SKILL.md", "root skill")]);
    let options = UpdateOptions {
        install: InstallOptions {
            overwrite: true,
            dry_run: true,
        },
        skill_filter: None,
    };

    let report = run_update(&env.config, &fetcher, &options).await.unwrap();
    assert_eq!(report.install.installed.len(), 1);
    assert!(report.lockfile.get("solo").is_some());
    assert!(!env.config.global_skills_path.join("solo").exists());
    assert!(!LockfileStore::for_target_root(&env.config.global_skills_path).path().exists());
    assert!(!env.config.backup_path.exists());
}

#[tokio::test]
async fn failed_repository_does_not_block_others() {
    let env = env(vec![
        repo("gone", RepoStructure::Standard, &["a"]),
        repo("multi", RepoStructure::Multi, &["b", "c"]),
    ]);
    let fetcher = TreeFetcher::default().with(
        "multi",
        &[("b/SKILL.md", "b"), ("c/SKILL.md", "c"), ("c/extra/notes.md", "n")],
    );

    let report = run_update(&env.config, &fetcher, &force()).await.unwrap();
    let failed: Vec<_> = report.failed_downloads().map(|d| d.repo.name.as_str()).collect();
    assert_eq!(failed, vec!["gone"]);

    let names: Vec<_> = report.install.installed.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["b", "c"]);
    assert_eq!(read(env.config.global_skills_path.join("c/extra/notes.md")), "n");
}

#[tokio::test]
async fn skill_filter_limits_install() {
    let env = env(vec![repo("multi", RepoStructure::Multi, &["b", "c"])]);
    let fetcher = TreeFetcher::default().with("multi", &[("b/SKILL.md", "b"), ("c/SKILL.md", "c")]);
    let options = UpdateOptions {
        skill_filter: Some(vec!["c".into()]),
        ..force()
    };

    let report = run_update(&env.config, &fetcher, &options).await.unwrap();
    assert_eq!(report.install.installed.len(), 1);
    assert!(!env.config.global_skills_path.join("b").exists());
    assert!(env.config.global_skills_path.join("c/SKILL.md").is_file());
}

#[tokio::test]
async fn both_roots_receive_skills_when_present() {
    let env = env(vec![repo("tpl", RepoStructure::Template, &["starter"])]);
    std::fs::create_dir_all(&env.config.windsurf_skills_path).unwrap();
    let fetcher = TreeFetcher::default().with("tpl", &[("template/SKILL.md", "t")]);

    let report = run_update(&env.config, &fetcher, &force()).await.unwrap();
    assert_eq!(report.install.installed.len(), 1);
    assert_eq!(report.install.installed[0].skill_path, "template");
    for root in env.config.skill_target_paths() {
        assert_eq!(read(root.join("starter/SKILL.md")), "t");
    }
}

#[tokio::test]
async fn retention_applies_across_runs() {
    let env = env(vec![repo("anthropic", RepoStructure::Standard, &["pdf"])]);
    let fetcher = TreeFetcher::default().with("anthropic", &[("skills/pdf/SKILL.md", "v")]);

    // First run has an empty lockfile and takes no backup.
    for _ in 0..6 {
        run_update(&env.config, &fetcher, &force()).await.unwrap();
    }
    let backups = BackupManager::from_config(&env.config).list_backups();
    assert_eq!(backups.len(), env.config.keep_backups);
    for pair in backups.windows(2) {
        assert!(pair[0].timestamp > pair[1].timestamp);
    }
}

// Restoring all is two sequential steps (skill trees, then the lockfile).
// If the lockfile step fails, the restored trees stay in place and the
// error is returned; there is no compensation.
#[tokio::test]
async fn restore_all_lockfile_failure_leaves_restored_files() {
    let env = env(vec![repo("anthropic", RepoStructure::Standard, &["pdf"])]);
    let v1 = TreeFetcher::default().with("anthropic", &[("skills/pdf/SKILL.md", "v1")]);
    run_update(&env.config, &v1, &force()).await.unwrap();
    let v2 = TreeFetcher::default().with("anthropic", &[("skills/pdf/SKILL.md", "v2")]);
    run_update(&env.config, &v2, &force()).await.unwrap();

    // A directory in place of the live lockfile makes the final rename fail.
    let store = LockfileStore::for_target_root(&env.config.global_skills_path);
    std::fs::remove_file(store.path()).unwrap();
    std::fs::create_dir_all(store.path().join("blocker")).unwrap();

    let result = BackupManager::from_config(&env.config).restore_backup(
        &env.config.skill_target_paths(),
        None,
        false,
        &store,
    );
    assert!(result.is_err());
    assert_eq!(read(env.config.global_skills_path.join("pdf/SKILL.md")), "v1");
}
