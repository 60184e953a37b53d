use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use {
    chrono::{SecondsFormat, Utc},
    serde::{Deserialize, Serialize},
    skillsync_config::RepositoryConfig,
};

/// Lockfile format version written by this crate.
pub const LOCKFILE_VERSION: u32 = 1;

/// Current UTC time as an ISO-8601 string with second precision.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

// ── Lockfile ────────────────────────────────────────────────────────────────

/// The durable record of what is installed and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    pub version: u32,
    /// Skill name → provenance. Sorted by name.
    #[serde(default)]
    pub skills: BTreeMap<String, SkillRecord>,
}

impl Default for Lockfile {
    fn default() -> Self {
        Self {
            version: LOCKFILE_VERSION,
            skills: BTreeMap::new(),
        }
    }
}

impl Lockfile {
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn get(&self, name: &str) -> Option<&SkillRecord> {
        self.skills.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.skills.keys().map(String::as_str)
    }

    /// Upsert the entry for an installed skill, stamped with the current time.
    pub fn update(&mut self, record: &InstallationRecord) {
        self.update_at(record, &now_timestamp());
    }

    /// Upsert with an explicit timestamp.
    ///
    /// `installedAt` of an existing entry is kept; `updatedAt` is always `now`.
    pub fn update_at(&mut self, record: &InstallationRecord, now: &str) {
        let entry = self.skills.entry(record.name.clone()).or_default();
        entry.source = record.source.clone();
        entry.source_url = record.source_url.clone();
        entry.skill_path = record.skill_path.clone();
        if entry.installed_at.is_empty() {
            entry.installed_at = now.to_string();
        }
        entry.updated_at = now.to_string();
    }
}

/// Provenance of one installed skill. The skill name is the lockfile key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillRecord {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub skill_path: String,
    #[serde(default)]
    pub installed_at: String,
    #[serde(default)]
    pub updated_at: String,
    /// Fields written by other tools, carried through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl SkillRecord {
    /// Build a record from loosely typed string fields.
    pub fn from_fields(mut fields: BTreeMap<String, String>) -> Self {
        let mut take = |key: &str| fields.remove(key).unwrap_or_default();
        let source = take("source");
        let source_url = take("sourceUrl");
        let skill_path = take("skillPath");
        let installed_at = take("installedAt");
        let updated_at = take("updatedAt");
        Self {
            source,
            source_url,
            skill_path,
            installed_at,
            updated_at,
            extra: fields,
        }
    }
}

// ── Installation ────────────────────────────────────────────────────────────

/// Facts about a skill the installer placed into at least one target root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationRecord {
    pub name: String,
    /// Repository name from the configuration.
    pub source: String,
    pub source_url: String,
    /// Skill directory relative to the repository root.
    pub skill_path: String,
}

/// Result of fetching one configured repository.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub repo: RepositoryConfig,
    pub local_path: PathBuf,
    pub error: Option<String>,
}

impl DownloadResult {
    pub fn success(repo: RepositoryConfig, local_path: PathBuf) -> Self {
        Self {
            repo,
            local_path,
            error: None,
        }
    }

    pub fn failure(repo: RepositoryConfig, local_path: PathBuf, error: impl Into<String>) -> Self {
        Self {
            repo,
            local_path,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

// ── Diagnostics ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A non-fatal event collected while processing a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Skill (or repository) the diagnostic is about.
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn error(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, subject, message)
    }

    pub fn warning(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, subject, message)
    }

    pub fn info(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, subject, message)
    }
}

// ── Backups ─────────────────────────────────────────────────────────────────

/// Summary of one backup snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotInfo {
    pub path: PathBuf,
    pub timestamp: String,
    pub skill_count: usize,
    pub skills: Vec<String>,
}

impl SnapshotInfo {
    pub(crate) fn bare(path: &Path, timestamp: String) -> Self {
        Self {
            path: path.to_path_buf(),
            timestamp,
            skill_count: 0,
            skills: Vec::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn record(name: &str) -> InstallationRecord {
        InstallationRecord {
            name: name.into(),
            source: "repo".into(),
            source_url: "https://github.com/o/repo".into(),
            skill_path: format!("skills/{name}"),
        }
    }

    #[test]
    fn update_creates_entry_with_equal_timestamps() {
        let mut lock = Lockfile::default();
        lock.update_at(&record("a"), "2026-01-01T00:00:00+00:00");
        let entry = lock.get("a").unwrap();
        assert_eq!(entry.installed_at, entry.updated_at);
        assert_eq!(entry.skill_path, "skills/a");
    }

    #[test]
    fn update_preserves_installed_at() {
        let mut lock = Lockfile::default();
        lock.update_at(&record("a"), "2026-01-01T00:00:00+00:00");
        let mut moved = record("a");
        moved.skill_path = "src/skills/a".into();
        lock.update_at(&moved, "2026-02-01T00:00:00+00:00");

        let entry = lock.get("a").unwrap();
        assert_eq!(entry.installed_at, "2026-01-01T00:00:00+00:00");
        assert_eq!(entry.updated_at, "2026-02-01T00:00:00+00:00");
        assert_eq!(entry.skill_path, "src/skills/a");
        assert!(entry.installed_at <= entry.updated_at);
    }

    #[test]
    fn update_with_wall_clock_keeps_ordering() {
        let mut lock = Lockfile::default();
        lock.update(&record("a"));
        lock.update(&record("a"));
        let entry = lock.get("a").unwrap();
        assert!(entry.installed_at <= entry.updated_at);
        assert_eq!(lock.len(), 1);
    }

    #[test]
    fn record_serializes_camel_case_with_extras() {
        let mut fields = BTreeMap::new();
        fields.insert("source".to_string(), "r".to_string());
        fields.insert("sourceUrl".to_string(), "u".to_string());
        fields.insert("commit".to_string(), "abc".to_string());
        let rec = SkillRecord::from_fields(fields);
        assert_eq!(rec.extra.get("commit").map(String::as_str), Some("abc"));

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["sourceUrl"], "u");
        assert_eq!(json["commit"], "abc");
        assert_eq!(json["skillPath"], "");
        assert_eq!(json["installedAt"], "");
    }

    #[test]
    fn snapshot_info_json_keys() {
        let info = SnapshotInfo {
            path: PathBuf::from("/b/20260101T000000_000000Z"),
            timestamp: "20260101T000000_000000Z".into(),
            skill_count: 1,
            skills: vec!["a".into()],
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["skillCount"], 1);
        assert_eq!(json["timestamp"], "20260101T000000_000000Z");
    }
}
