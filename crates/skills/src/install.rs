//! Copies resolved skill directories into every live target root and
//! reports what was installed, skipped, or failed.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{
    error::{Error, Result},
    fsutil::{path_exists, replace_dir},
    resolve::{is_valid_skill_name, relative_skill_path, resolve_skill_dir},
    types::{Diagnostic, DownloadResult, InstallationRecord},
};

/// Overwrite policy and dry-run switch for an install pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Replace skills that already exist in a target root.
    pub overwrite: bool,
    /// Report what would happen without touching the filesystem.
    pub dry_run: bool,
}

/// What happened to one skill in one target root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    Overwritten,
    WouldInstall,
    WouldOverwrite,
    /// Destination exists and overwrite was not requested.
    Skipped,
}

impl InstallOutcome {
    /// Installed, or would be installed on a real run.
    pub fn is_install(self) -> bool {
        !matches!(self, Self::Skipped)
    }
}

/// Aggregate result of [`install_skills`].
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    /// One record per skill placed into at least one target root.
    pub installed: Vec<InstallationRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Copy `source_dir` to `target_root/skill_name`.
pub fn install_one(
    source_dir: &Path,
    target_root: &Path,
    skill_name: &str,
    options: InstallOptions,
) -> Result<InstallOutcome> {
    if !is_valid_skill_name(skill_name) {
        return Err(Error::invalid_skill_name(skill_name));
    }

    let dest = target_root.join(skill_name);
    let exists = path_exists(&dest);

    if exists && !options.overwrite {
        debug!(dest = %dest.display(), "skill exists, not overwriting");
        return Ok(InstallOutcome::Skipped);
    }

    if options.dry_run {
        return Ok(if exists {
            InstallOutcome::WouldOverwrite
        } else {
            InstallOutcome::WouldInstall
        });
    }

    replace_dir(source_dir, &dest)?;
    debug!(src = %source_dir.display(), dest = %dest.display(), "copied skill");

    Ok(if exists {
        InstallOutcome::Overwritten
    } else {
        InstallOutcome::Installed
    })
}

/// Install every requested skill from every successful download into every
/// existing target root.
///
/// Per-skill and per-root problems are collected as diagnostics; nothing here
/// aborts the batch.
pub fn install_skills(
    downloads: &[DownloadResult],
    target_roots: &[PathBuf],
    skill_filter: Option<&[String]>,
    options: InstallOptions,
) -> InstallReport {
    let mut report = InstallReport::default();
    let filter = skill_filter.filter(|f| !f.is_empty());

    let live_roots: Vec<&PathBuf> = target_roots
        .iter()
        .filter(|root| {
            let ok = root.is_dir();
            if !ok {
                debug!(root = %root.display(), "target root missing, skipping");
            }
            ok
        })
        .collect();

    for download in downloads.iter().filter(|d| d.is_success()) {
        let repo = &download.repo;

        let requested = repo
            .skills
            .iter()
            .filter(|name| filter.is_none_or(|f| f.contains(name)));

        for skill_name in requested {
            let Some(skill_dir) =
                resolve_skill_dir(&download.local_path, skill_name, repo.structure)
            else {
                warn!(skill = %skill_name, repo = %repo.name, "skill not found in repository");
                report.diagnostics.push(Diagnostic::warning(
                    skill_name,
                    format!(
                        "not found in {} ({} structure)",
                        repo.name, repo.structure
                    ),
                ));
                continue;
            };

            let mut any_installed = false;
            for root in &live_roots {
                let dest = root.join(skill_name);
                match install_one(&skill_dir, root, skill_name, options) {
                    Ok(InstallOutcome::Skipped) => {
                        report.diagnostics.push(Diagnostic::info(
                            skill_name,
                            format!("skipped {} (exists, use --force)", dest.display()),
                        ));
                    },
                    Ok(
                        outcome @ (InstallOutcome::WouldInstall | InstallOutcome::WouldOverwrite),
                    ) => {
                        let action = if outcome == InstallOutcome::WouldOverwrite {
                            "overwrite"
                        } else {
                            "install"
                        };
                        report.diagnostics.push(Diagnostic::info(
                            skill_name,
                            format!("would {action}: {}", dest.display()),
                        ));
                        any_installed = true;
                    },
                    Ok(_) => any_installed = true,
                    Err(e) => {
                        warn!(
                            skill = %skill_name,
                            dest = %dest.display(),
                            error = %e,
                            "failed to install skill"
                        );
                        report.diagnostics.push(Diagnostic::error(
                            skill_name,
                            format!("error copying to {}: {e}", dest.display()),
                        ));
                    },
                }
            }

            if any_installed {
                info!(skill = %skill_name, repo = %repo.name, "installed skill");
                report.installed.push(InstallationRecord {
                    name: skill_name.clone(),
                    source: repo.name.clone(),
                    source_url: repo.url.clone(),
                    skill_path: relative_skill_path(&download.local_path, &skill_dir),
                });
            }
        }
    }

    report
}
