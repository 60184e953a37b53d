//! Timestamped snapshots of installed skills plus the lockfile, with
//! retention and rollback to the newest snapshot.
//!
//! Layout:
//!
//! ```text
//! <backup root>/
//!   20260301T101500_123456Z/
//!     _home_u_.agents_skills/<skill>/...
//!     lockfile.json
//!     backup-meta.json
//! ```

use std::path::{Path, PathBuf};

use {
    chrono::{DateTime, Duration, NaiveDateTime, Utc},
    serde::{Deserialize, Serialize},
    skillsync_config::AppConfig,
    tracing::{debug, info, warn},
};

use crate::{
    error::Result,
    fsutil::{copy_dir_recursive, remove_path, replace_dir},
    lockfile::{LockfileStore, to_json},
    types::{Lockfile, SnapshotInfo, now_timestamp},
};

/// Captured copy of the lockfile inside a snapshot.
pub const SNAPSHOT_LOCKFILE: &str = "lockfile.json";
/// Per-snapshot metadata file.
pub const SNAPSHOT_META: &str = "backup-meta.json";
/// Fixed-width UTC label; lexicographic order is chronological order.
const LABEL_FORMAT: &str = "%Y%m%dT%H%M%S_%6fZ";
const LABEL_LEN: usize = 23;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotMeta {
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    created: String,
    #[serde(default)]
    skills: Vec<String>,
}

/// One skill restored (or that would be restored) into one target root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreAction {
    pub skill: String,
    pub destination: PathBuf,
    pub dry_run: bool,
}

/// Outcome of [`BackupManager::restore_backup`].
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    /// Label of the snapshot used, `None` when no snapshot exists.
    pub snapshot: Option<String>,
    pub actions: Vec<RestoreAction>,
    pub lockfile_restored: bool,
}

impl RestoreReport {
    /// At least one skill was (or would be) restored.
    pub fn succeeded(&self) -> bool {
        !self.actions.is_empty()
    }
}

/// Owns the backup root directory and the retention count.
#[derive(Debug, Clone)]
pub struct BackupManager {
    root: PathBuf,
    keep: usize,
}

impl BackupManager {
    pub fn new(root: PathBuf, keep: usize) -> Self {
        Self {
            root,
            keep: keep.max(1),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.backup_path.clone(), config.keep_backups)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot every tracked skill found under `target_roots`.
    ///
    /// Returns `None` without touching the disk when the lockfile is empty.
    pub fn create_backup(
        &self,
        target_roots: &[PathBuf],
        lockfile: &Lockfile,
    ) -> Result<Option<SnapshotInfo>> {
        if lockfile.is_empty() {
            debug!("lockfile empty, skipping backup");
            return Ok(None);
        }

        let (label, dir) = self.allocate_snapshot_dir()?;
        match write_snapshot(&dir, &label, target_roots, lockfile) {
            Ok(info) => {
                info!(snapshot = %label, skills = info.skill_count, "created backup");
                self.enforce_retention();
                Ok(Some(info))
            },
            Err(e) => {
                if let Err(cleanup) = remove_path(&dir) {
                    warn!(path = %dir.display(), error = %cleanup, "failed to remove partial snapshot");
                }
                Err(e)
            },
        }
    }

    /// All snapshots, newest first.
    pub fn list_backups(&self) -> Vec<SnapshotInfo> {
        self.snapshot_dirs()
            .into_iter()
            .map(|(label, path)| read_snapshot_info(&path, label))
            .collect()
    }

    /// The newest snapshot, if any.
    pub fn latest(&self) -> Option<SnapshotInfo> {
        self.snapshot_dirs()
            .into_iter()
            .next()
            .map(|(label, path)| read_snapshot_info(&path, label))
    }

    /// Restore from the newest snapshot.
    ///
    /// With `skill_name`, only that skill is restored, into every target root
    /// it was captured from. Without it, every captured skill is restored and
    /// the live lockfile is replaced by the snapshot copy (not on dry run).
    /// The two steps are sequential, not transactional.
    pub fn restore_backup(
        &self,
        target_roots: &[PathBuf],
        skill_name: Option<&str>,
        dry_run: bool,
        lockfile_store: &LockfileStore,
    ) -> Result<RestoreReport> {
        let mut report = RestoreReport::default();
        let Some((label, snapshot)) = self.snapshot_dirs().into_iter().next() else {
            warn!(root = %self.root.display(), "no backups available");
            return Ok(report);
        };
        report.snapshot = Some(label.clone());

        for root in target_roots {
            let captured_root = snapshot.join(target_label(root));
            if !captured_root.is_dir() {
                continue;
            }
            for skill in captured_skills(&captured_root)? {
                if skill_name.is_some_and(|wanted| wanted != skill) {
                    continue;
                }
                let source = captured_root.join(&skill);
                let destination = root.join(&skill);
                if dry_run {
                    info!(skill = %skill, dest = %destination.display(), "would restore");
                } else {
                    replace_dir(&source, &destination)?;
                    info!(skill = %skill, dest = %destination.display(), snapshot = %label, "restored");
                }
                report.actions.push(RestoreAction {
                    skill,
                    destination,
                    dry_run,
                });
            }
        }

        if skill_name.is_none() && !dry_run {
            let captured_lock = snapshot.join(SNAPSHOT_LOCKFILE);
            if captured_lock.is_file() {
                lockfile_store.restore_from(&captured_lock)?;
                report.lockfile_restored = true;
                info!(path = %lockfile_store.path().display(), "restored lockfile");
            }
        }

        Ok(report)
    }

    /// Snapshot directories as `(label, path)`, newest first.
    fn snapshot_dirs(&self) -> Vec<(String, PathBuf)> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut dirs: Vec<(String, PathBuf)> = entries
            .flatten()
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                is_snapshot_label(&name).then(|| (name, entry.path()))
            })
            .collect();
        dirs.sort_by(|a, b| b.0.cmp(&a.0));
        dirs
    }

    /// Create a fresh snapshot directory whose label sorts after every
    /// existing one.
    fn allocate_snapshot_dir(&self) -> Result<(String, PathBuf)> {
        std::fs::create_dir_all(&self.root)?;
        let newest = self.snapshot_dirs().into_iter().next().map(|(label, _)| label);

        let mut at: DateTime<Utc> = Utc::now();
        loop {
            let label = at.format(LABEL_FORMAT).to_string();
            if let Some(n) = newest.as_deref()
                && label.as_str() <= n
            {
                at = parse_label(n).unwrap_or(at) + Duration::microseconds(1);
                continue;
            }
            let dir = self.root.join(&label);
            match std::fs::create_dir(&dir) {
                Ok(()) => return Ok((label, dir)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    at += Duration::microseconds(1);
                },
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn enforce_retention(&self) {
        for (label, path) in self.snapshot_dirs().into_iter().skip(self.keep) {
            match std::fs::remove_dir_all(&path) {
                Ok(()) => debug!(snapshot = %label, "pruned old backup"),
                Err(e) => warn!(snapshot = %label, error = %e, "failed to prune old backup"),
            }
        }
    }
}

/// Filesystem-safe token for a target root path.
pub fn target_label(root: &Path) -> String {
    root.to_string_lossy()
        .chars()
        .filter(|c| *c != ':')
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

fn parse_label(label: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(label, LABEL_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn is_snapshot_label(name: &str) -> bool {
    name.len() == LABEL_LEN
        && name
            .bytes()
            .enumerate()
            .all(|(i, b)| match i {
                8 => b == b'T',
                15 => b == b'_',
                22 => b == b'Z',
                _ => b.is_ascii_digit(),
            })
        && parse_label(name).is_some()
}

fn write_snapshot(
    dir: &Path,
    label: &str,
    target_roots: &[PathBuf],
    lockfile: &Lockfile,
) -> Result<SnapshotInfo> {
    let mut captured: Vec<String> = Vec::new();

    for root in target_roots {
        if !root.is_dir() {
            continue;
        }
        let dest_root = dir.join(target_label(root));
        for name in lockfile.names() {
            let source = root.join(name);
            if !source.is_dir() {
                continue;
            }
            copy_dir_recursive(&source, &dest_root.join(name))?;
            if !captured.iter().any(|c| c == name) {
                captured.push(name.to_string());
            }
        }
    }

    std::fs::write(dir.join(SNAPSHOT_LOCKFILE), to_json(lockfile)? + "\n")?;
    let meta = SnapshotMeta {
        timestamp: label.to_string(),
        created: now_timestamp(),
        skills: captured.clone(),
    };
    std::fs::write(dir.join(SNAPSHOT_META), serde_json::to_string_pretty(&meta)? + "\n")?;

    Ok(SnapshotInfo {
        path: dir.to_path_buf(),
        timestamp: label.to_string(),
        skill_count: captured.len(),
        skills: captured,
    })
}

fn read_snapshot_info(path: &Path, label: String) -> SnapshotInfo {
    let meta = std::fs::read_to_string(path.join(SNAPSHOT_META))
        .ok()
        .and_then(|data| serde_json::from_str::<SnapshotMeta>(&data).ok());
    match meta {
        Some(meta) => SnapshotInfo {
            path: path.to_path_buf(),
            timestamp: label,
            skill_count: meta.skills.len(),
            skills: meta.skills,
        },
        None => {
            debug!(path = %path.display(), "snapshot metadata missing or unreadable");
            SnapshotInfo::bare(path, label)
        },
    }
}

/// Skill directories captured for one target root, sorted by name.
fn captured_skills(captured_root: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(captured_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}
