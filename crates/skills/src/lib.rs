//! Skill synchronization core: locating skills inside fetched repositories,
//! installing them into target roots, tracking them in a lockfile, and
//! backing up / rolling back installed state.
//!
//! Skills are directories containing a `SKILL.md` file. Everything here is
//! synchronous filesystem work except the fetch boundary in [`sync`].

pub mod backup;
pub mod error;
pub mod fsutil;
pub mod install;
pub mod lockfile;
pub mod resolve;
pub mod sync;
pub mod types;

pub use error::{Error, Result};
