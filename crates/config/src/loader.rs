use std::path::{Path, PathBuf};

use {
    serde_yaml::{Mapping, Value},
    tracing::{debug, warn},
};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::{AppConfig, RepoStructure, RepositoryConfig},
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["skillsync.yaml", "skillsync.yml"];

/// Returns the user-global config directory (`~/.config/skillsync/` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "skillsync").map(|d| d.config_dir().to_path_buf())
}

pub(crate) fn home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Expand a leading `~` and make the path absolute.
pub fn expand_path(raw: &str) -> PathBuf {
    let expanded = if raw == "~" {
        home_dir()
    } else if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        home_dir().join(rest)
    } else {
        PathBuf::from(raw)
    };
    std::path::absolute(&expanded).unwrap_or(expanded)
}

/// Locate and load the configuration.
///
/// Search order:
/// 1. `explicit` (must exist)
/// 2. `./skillsync.{yaml,yml}`
/// 3. `<config dir>/skillsync.{yaml,yml}`
/// 4. `~/skillsync.{yaml,yml}`
///
/// Returns `AppConfig::default()` when no file is found.
pub fn discover_and_load(explicit: Option<&Path>) -> Result<AppConfig> {
    let path = match explicit {
        Some(path) if path.is_file() => Some(path.to_path_buf()),
        Some(path) => {
            return Err(Error::NotFound {
                path: path.to_path_buf(),
            });
        },
        None => find_config_file(&default_search_dirs()),
    };

    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)
        },
        None => {
            debug!("no config file found, using defaults");
            Ok(AppConfig::default())
        },
    }
}

fn default_search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(dir) = config_dir() {
        dirs.push(dir);
    }
    dirs.push(home_dir());
    dirs
}

fn find_config_file(search_dirs: &[PathBuf]) -> Option<PathBuf> {
    search_dirs
        .iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// Load config from a YAML file, with env substitution.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = parse_config(&substitute_env(&raw))?;
    config.config_file_path = Some(path.to_path_buf());
    Ok(config)
}

fn parse_config(raw: &str) -> Result<AppConfig> {
    let Value::Mapping(root) = serde_yaml::from_str::<Value>(raw)? else {
        return Err(Error::invalid(
            "config file must contain a YAML mapping at the top level",
        ));
    };

    let mut config = AppConfig::default();

    match root.get("settings") {
        None | Some(Value::Null) => {},
        Some(Value::Mapping(settings)) => apply_settings(&mut config, settings)?,
        Some(_) => return Err(Error::invalid("'settings' must be a mapping")),
    }

    if let Some(Value::Mapping(repos)) = root.get("repositories") {
        config.repositories = parse_repositories(repos)?;
    }

    Ok(config)
}

fn apply_settings(config: &mut AppConfig, settings: &Mapping) -> Result<()> {
    let path_setting = |key: &str| -> Result<Option<PathBuf>> {
        match settings.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(raw)) => Ok(Some(expand_path(raw))),
            Some(_) => Err(Error::invalid(format!("'settings.{key}' must be a string"))),
        }
    };

    if let Some(p) = path_setting("globalSkillsPath")? {
        config.global_skills_path = p;
    }
    if let Some(p) = path_setting("windsurfSkillsPath")? {
        config.windsurf_skills_path = p;
    }
    if let Some(p) = path_setting("tempPath")? {
        config.temp_path = p;
    }
    if let Some(p) = path_setting("backupPath")? {
        config.backup_path = p;
    }
    config.log_path = path_setting("logPath")?;

    if let Some(value) = settings.get("keepBackups") {
        let keep = scalar_to_string(value)
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or_else(|| Error::invalid("'settings.keepBackups' must be an integer"))?;
        if keep < 1 {
            return Err(Error::invalid(format!(
                "'settings.keepBackups' must be a positive integer, got {keep}"
            )));
        }
        config.keep_backups = usize::try_from(keep)
            .map_err(|_| Error::invalid("'settings.keepBackups' is out of range"))?;
    }

    if let Some(Value::Sequence(hosts)) = settings.get("allowedHosts") {
        config.allowed_hosts = hosts.iter().filter_map(scalar_to_string).collect();
    }

    Ok(())
}

fn parse_repositories(raw: &Mapping) -> Result<Vec<RepositoryConfig>> {
    let mut repos = Vec::with_capacity(raw.len());

    for (key, value) in raw {
        let name = scalar_to_string(key)
            .ok_or_else(|| Error::invalid("repository names must be strings"))?;
        let Value::Mapping(entry) = value else {
            return Err(Error::repository(
                &name,
                format!("expected a mapping, got {}", type_name(value)),
            ));
        };

        let url = entry
            .get("url")
            .and_then(scalar_to_string)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::repository(&name, "'url' is required"))?;

        let skills = match entry.get("skills") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(items)) => items.iter().filter_map(scalar_to_string).collect(),
            Some(_) => return Err(Error::repository(&name, "'skills' must be a list")),
        };

        let branch = entry.get("branch").and_then(scalar_to_string);

        let structure = match entry.get("structure") {
            None | Some(Value::Null) => RepoStructure::default(),
            Some(v) => scalar_to_string(v)
                .unwrap_or_default()
                .parse::<RepoStructure>()
                .map_err(|e| Error::repository(&name, e))?,
        };

        repos.push(RepositoryConfig {
            name,
            url,
            branch,
            structure,
            skills,
        });
    }

    Ok(repos)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Record `host` in `settings.allowedHosts`, both in memory and in the
/// config file the config was loaded from.
///
/// Best effort: a config without a backing file only changes in memory, and
/// write failures are logged.
pub fn save_allowed_host(config: &mut AppConfig, host: &str) {
    if config.allowed_hosts.iter().any(|h| h == host) {
        return;
    }
    config.allowed_hosts.push(host.to_string());

    let Some(path) = config.config_file_path.clone() else {
        return;
    };
    if let Err(e) = write_allowed_hosts(&path, &config.allowed_hosts) {
        warn!(path = %path.display(), error = %e, "failed to persist allowed host");
    }
}

fn write_allowed_hosts(path: &Path, hosts: &[String]) -> Result<()> {
    let raw = std::fs::read_to_string(path)?;
    let mut doc = match serde_yaml::from_str::<Value>(&raw)? {
        Value::Mapping(m) => m,
        Value::Null => Mapping::new(),
        _ => return Err(Error::invalid("config top level is not a mapping")),
    };

    let settings = doc
        .entry(Value::from("settings"))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if !settings.is_mapping() {
        *settings = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(settings) = settings {
        settings.insert(
            Value::from("allowedHosts"),
            Value::Sequence(hosts.iter().map(|h| Value::from(h.as_str())).collect()),
        );
    }

    std::fs::write(path, serde_yaml::to_string(&doc)?)?;
    debug!(path = %path.display(), "saved allowed hosts");
    Ok(())
}
