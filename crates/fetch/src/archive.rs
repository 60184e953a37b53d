//! GitHub branch tarball download, used when git is missing or fails.

use std::{
    path::{Component, Path, PathBuf},
    time::Duration,
};

use {skillsync_config::RepositoryConfig, tracing::{info, warn}};

use crate::{
    error::{Error, Result},
    host::is_github_url,
};

pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// `https://github.com/o/r(.git)` → `https://github.com/o/r/archive/refs/heads/<branch>.tar.gz`.
pub fn archive_url(repo: &RepositoryConfig) -> Result<String> {
    if !is_github_url(&repo.url) {
        return Err(Error::NotGithub {
            url: repo.url.clone(),
        });
    }
    let base = repo.url.trim_end_matches('/');
    let base = base.strip_suffix(".git").unwrap_or(base);
    let branch = repo
        .branch
        .as_deref()
        .filter(|b| !b.is_empty())
        .unwrap_or("main");
    Ok(format!("{base}/archive/refs/heads/{branch}.tar.gz"))
}

/// Download and unpack the branch tarball into `dest`.
pub async fn download(client: &reqwest::Client, repo: &RepositoryConfig, dest: &Path) -> Result<()> {
    let url = archive_url(repo)?;
    let resp = client.get(&url).timeout(DOWNLOAD_TIMEOUT).send().await?;
    if !resp.status().is_success() {
        return Err(Error::HttpStatus {
            status: resp.status().as_u16(),
            url,
        });
    }
    let bytes = resp.bytes().await?;

    tokio::fs::create_dir_all(dest).await?;
    let dest_owned = dest.to_path_buf();
    let repo_name = repo.name.clone();
    tokio::task::spawn_blocking(move || unpack_tarball(&bytes, &dest_owned, &repo_name))
        .await
        .map_err(std::io::Error::other)??;

    info!(repo = %repo.name, %url, "fetched repository via archive");
    Ok(())
}

/// Unpack a gzip'd tarball, dropping its single top-level directory.
pub fn unpack_tarball(bytes: &[u8], dest: &Path, repo_name: &str) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    let canonical_dest = std::fs::canonicalize(dest)?;
    let decoder = flate2::read::GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            warn!(repo = %repo_name, "skipping symlink/hardlink archive entry");
            continue;
        }
        // GitHub adds a pax global header carrying the commit id.
        if entry_type.is_pax_global_extensions() {
            continue;
        }

        let path = entry.path()?.into_owned();
        let Some(stripped) = sanitize_archive_path(&path)? else {
            continue;
        };

        let target = dest.join(&stripped);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
            if !std::fs::canonicalize(parent)?.starts_with(&canonical_dest) {
                return Err(Error::UnsafeArchivePath {
                    path: path.display().to_string(),
                });
            }
        }

        if entry_type.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        entry.unpack(&target)?;
    }
    Ok(())
}

/// Strip the top-level directory; reject anything that could escape `dest`.
fn sanitize_archive_path(path: &Path) -> Result<Option<PathBuf>> {
    let stripped: PathBuf = path.components().skip(1).collect();
    if stripped.as_os_str().is_empty() {
        return Ok(None);
    }
    for component in stripped.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {},
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::UnsafeArchivePath {
                    path: path.display().to_string(),
                });
            },
        }
    }
    Ok(Some(stripped))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest, skillsync_config::RepoStructure};

    fn repo(url: &str, branch: Option<&str>) -> RepositoryConfig {
        RepositoryConfig {
            name: "r".into(),
            url: url.into(),
            branch: branch.map(str::to_string),
            structure: RepoStructure::Standard,
            skills: Vec::new(),
        }
    }

    fn tarball(entries: &[(&str, &str)]) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        for (path, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[rstest]
    #[case(
        "https://github.com/anthropics/skills.git",
        None,
        "https://github.com/anthropics/skills/archive/refs/heads/main.tar.gz"
    )]
    #[case(
        "https://github.com/o/r/",
        Some("dev"),
        "https://github.com/o/r/archive/refs/heads/dev.tar.gz"
    )]
    fn builds_archive_url(#[case] url: &str, #[case] branch: Option<&str>, #[case] expected: &str) {
        assert_eq!(archive_url(&repo(url, branch)).unwrap(), expected);
    }

    #[test]
    fn archive_url_rejects_other_hosts() {
        let err = archive_url(&repo("https://gitlab.com/o/r.git", None)).unwrap_err();
        assert!(matches!(err, Error::NotGithub { .. }));
    }

    #[test]
    fn sanitize_rejects_parent_dir() {
        assert!(sanitize_archive_path(Path::new("repo-main/../../etc/passwd")).is_err());
    }

    #[test]
    fn sanitize_strips_top_level() {
        assert_eq!(
            sanitize_archive_path(Path::new("repo-main/skills/pdf/SKILL.md"))
                .unwrap()
                .unwrap(),
            PathBuf::from("skills/pdf/SKILL.md")
        );
        assert!(sanitize_archive_path(Path::new("repo-main")).unwrap().is_none());
    }

    #[test]
    fn unpacks_without_top_level_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let bytes = tarball(&[
            ("skills-main/skills/pdf/SKILL.md", "pdf"),
            ("skills-main/README.md", "readme"),
        ]);
        let dest = tmp.path().join("out");
        unpack_tarball(&bytes, &dest, "r").unwrap();

        assert_eq!(std::fs::read_to_string(dest.join("skills/pdf/SKILL.md")).unwrap(), "pdf");
        assert_eq!(std::fs::read_to_string(dest.join("README.md")).unwrap(), "readme");
        assert!(!dest.join("skills-main").exists());
    }

    #[test]
    fn corrupt_tarball_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(unpack_tarball(b"not gzip", tmp.path(), "r").is_err());
    }
}
