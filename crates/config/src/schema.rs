use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

/// Default number of backup snapshots to retain.
pub const DEFAULT_KEEP_BACKUPS: usize = 5;

// ── Repositories ────────────────────────────────────────────────────────────

/// Layout convention an upstream repository uses for its skills.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoStructure {
    /// `skills/<name>/` or `src/skills/<name>/`.
    #[default]
    Standard,
    /// The repository root is the skill (has a `SKILL.md`).
    Root,
    /// The `template/` directory is the skill.
    Template,
    /// Sibling `<name>/` directories, each with a `SKILL.md`.
    Multi,
}

impl RepoStructure {
    pub const ALL: [Self; 4] = [Self::Standard, Self::Root, Self::Template, Self::Multi];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Root => "root",
            Self::Template => "template",
            Self::Multi => "multi",
        }
    }
}

impl fmt::Display for RepoStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoStructure {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|v| v.as_str()).collect();
                format!(
                    "invalid structure '{s}', must be one of: {}",
                    valid.join(", ")
                )
            })
    }
}

/// A single configured skill repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub structure: RepoStructure,
    /// Skill names expected inside this repository, in configuration order.
    #[serde(default)]
    pub skills: Vec<String>,
}

// ── Application config ──────────────────────────────────────────────────────

/// Fully resolved application configuration.
///
/// Built once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Primary target root; the lockfile lives next to it.
    pub global_skills_path: PathBuf,
    pub windsurf_skills_path: PathBuf,
    /// Scratch directory for fetched repositories.
    pub temp_path: PathBuf,
    pub backup_path: PathBuf,
    /// Optional file that receives a copy of the log output.
    pub log_path: Option<PathBuf>,
    pub keep_backups: usize,
    /// Non-GitHub hosts the user has approved permanently.
    pub allowed_hosts: Vec<String>,
    pub repositories: Vec<RepositoryConfig>,
    /// The file this config was loaded from, if any.
    pub config_file_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let home = crate::loader::home_dir();
        Self {
            global_skills_path: home.join(".agents").join("skills"),
            windsurf_skills_path: home.join(".codeium").join("windsurf").join("skills"),
            temp_path: home.join(".temp-agent-skills-update"),
            backup_path: home.join(".skillsync").join("backups"),
            log_path: None,
            keep_backups: DEFAULT_KEEP_BACKUPS,
            allowed_hosts: Vec::new(),
            repositories: Vec::new(),
            config_file_path: None,
        }
    }
}

impl AppConfig {
    /// Every directory skills are installed into, primary root first.
    pub fn skill_target_paths(&self) -> Vec<PathBuf> {
        vec![
            self.global_skills_path.clone(),
            self.windsurf_skills_path.clone(),
        ]
    }

    pub fn find_repository(&self, name: &str) -> Option<&RepositoryConfig> {
        self.repositories.iter().find(|r| r.name == name)
    }
}
