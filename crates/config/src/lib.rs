//! Configuration loading, validation, and env substitution.
//!
//! Config files: `skillsync.yaml` or `skillsync.yml`.
//! Searched in `./`, then the platform config dir, then `~`.
//!
//! Supports `${ENV_VAR}` substitution anywhere in the file and `~` expansion
//! in path settings.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{config_dir, discover_and_load, expand_path, load_config, save_allowed_host},
    schema::{AppConfig, RepoStructure, RepositoryConfig},
};
