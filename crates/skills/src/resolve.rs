//! Locating a skill directory inside a fetched repository.

use std::path::{Path, PathBuf};

use skillsync_config::RepoStructure;

/// Marker file every skill directory carries.
pub const SKILL_MANIFEST: &str = "SKILL.md";

/// A skill name is used as a single path component under each target root.
pub fn is_valid_skill_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Find the directory that constitutes `skill_name` in `repo_root`.
///
/// Returns `None` when the skill is absent; that is not an error.
pub fn resolve_skill_dir(
    repo_root: &Path,
    skill_name: &str,
    structure: RepoStructure,
) -> Option<PathBuf> {
    if !is_valid_skill_name(skill_name) {
        return None;
    }
    match structure {
        RepoStructure::Standard => find_standard(repo_root, skill_name),
        RepoStructure::Root => find_root(repo_root),
        RepoStructure::Template => find_template(repo_root),
        RepoStructure::Multi => find_multi(repo_root, skill_name),
    }
}

/// `skills/<name>/`, then `src/skills/<name>/`.
fn find_standard(repo_root: &Path, skill_name: &str) -> Option<PathBuf> {
    [
        repo_root.join("skills").join(skill_name),
        repo_root.join("src").join("skills").join(skill_name),
    ]
    .into_iter()
    .find(|candidate| candidate.is_dir())
}

fn find_root(repo_root: &Path) -> Option<PathBuf> {
    repo_root
        .join(SKILL_MANIFEST)
        .is_file()
        .then(|| repo_root.to_path_buf())
}

fn find_template(repo_root: &Path) -> Option<PathBuf> {
    let dir = repo_root.join("template");
    dir.is_dir().then_some(dir)
}

fn find_multi(repo_root: &Path, skill_name: &str) -> Option<PathBuf> {
    let dir = repo_root.join(skill_name);
    (dir.is_dir() && dir.join(SKILL_MANIFEST).is_file()).then_some(dir)
}

/// Path of `skill_dir` relative to `repo_root`, `"."` for the root itself.
pub fn relative_skill_path(repo_root: &Path, skill_dir: &Path) -> String {
    match skill_dir.strip_prefix(repo_root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.to_string_lossy().into_owned(),
        Err(_) => skill_dir.to_string_lossy().into_owned(),
    }
}
