//! Persistent lockfile at `<parent of primary target root>/.skill-lock.json`.

use std::{
    collections::BTreeMap,
    io::Write,
    path::{Path, PathBuf},
};

use {
    serde_json::Value,
    tracing::{debug, warn},
};

use crate::{
    error::Result,
    resolve::is_valid_skill_name,
    types::{LOCKFILE_VERSION, Lockfile, SkillRecord},
};

pub const LOCKFILE_NAME: &str = ".skill-lock.json";

/// Persistence for the lockfile.
#[derive(Debug, Clone)]
pub struct LockfileStore {
    path: PathBuf,
}

impl LockfileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store located next to the primary target root.
    pub fn for_target_root(primary: &Path) -> Self {
        let dir = primary.parent().unwrap_or(primary);
        Self::new(dir.join(LOCKFILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the lockfile. Missing or malformed content yields an empty one.
    pub fn load(&self) -> Lockfile {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Lockfile::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read lockfile, starting empty");
                return Lockfile::default();
            },
        };
        match serde_json::from_str::<Value>(&data) {
            Ok(value) => parse_lockfile(value),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt lockfile, starting empty");
                Lockfile::default()
            },
        }
    }

    /// Save atomically via temp file + rename.
    pub fn save(&self, lockfile: &Lockfile) -> Result<()> {
        let mut data = to_json(lockfile)?;
        data.push('\n');
        self.write_atomic(data.as_bytes())?;
        debug!(path = %self.path.display(), skills = lockfile.len(), "saved lockfile");
        Ok(())
    }

    /// Replace the live lockfile with the bytes of `snapshot_copy`.
    pub fn restore_from(&self, snapshot_copy: &Path) -> Result<()> {
        let data = std::fs::read(snapshot_copy)?;
        self.write_atomic(&data)
    }

    fn write_atomic(&self, data: &[u8]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| LOCKFILE_NAME.to_string());
        let tmp = dir.join(format!("{file_name}.{}.tmp", std::process::id()));

        if let Err(e) = write_then_rename(&tmp, &self.path, data) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

fn write_then_rename(tmp: &Path, dest: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    std::fs::rename(tmp, dest)
}

/// Pretty JSON form of the lockfile, without trailing newline.
pub fn to_json(lockfile: &Lockfile) -> Result<String> {
    Ok(serde_json::to_string_pretty(lockfile)?)
}

/// Tolerant conversion of a parsed JSON document into a [`Lockfile`].
fn parse_lockfile(value: Value) -> Lockfile {
    let Value::Object(mut root) = value else {
        warn!("lockfile top level is not an object, starting empty");
        return Lockfile::default();
    };

    let entries = match root.remove("skills") {
        Some(Value::Object(map)) => map,
        Some(_) => {
            warn!("lockfile 'skills' is not an object, starting empty");
            return Lockfile::default();
        },
        // Older files keep entries at the top level.
        None => {
            root.remove("version");
            root
        },
    };

    let mut lockfile = Lockfile {
        version: LOCKFILE_VERSION,
        skills: BTreeMap::new(),
    };
    for (name, entry) in entries {
        let Value::Object(fields) = entry else {
            warn!(skill = %name, "dropping malformed lockfile entry");
            continue;
        };
        if !is_valid_skill_name(&name) {
            warn!(skill = %name, "dropping lockfile entry with invalid name");
            continue;
        }
        let fields = fields
            .into_iter()
            .filter_map(|(key, value)| scalar_to_string(value).map(|v| (key, v)))
            .collect();
        lockfile.skills.insert(name, SkillRecord::from_fields(fields));
    }
    lockfile
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
