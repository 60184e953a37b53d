mod backup_commands;
mod list_commands;
mod output;
mod prompt;
mod self_update;
mod update_commands;

use std::{fs::OpenOptions, path::PathBuf, sync::Arc};

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::output::{BOLD, GREEN, RED, RESET};

#[derive(Parser)]
#[command(
    name = "skillsync",
    version,
    about = "Keep AI coding assistant skills in sync with their upstream repositories",
    after_help = "Examples:\n  \
        skillsync                  Update all skills\n  \
        skillsync --dry-run        Preview changes\n  \
        skillsync --force          Overwrite existing skills\n  \
        skillsync --skills a,b     Update specific skills only\n  \
        skillsync list             Show installed skills\n  \
        skillsync rollback <name>  Restore a skill from backup"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the YAML config file.
    #[arg(long, global = true, env = "SKILLSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Preview changes without applying them.
    #[arg(long, global = true, default_value_t = false)]
    dry_run: bool,

    /// Overwrite existing skills.
    #[arg(long, global = true, default_value_t = false)]
    force: bool,

    /// Show detailed output.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    /// Trust all repository hosts (skip prompts, for CI).
    #[arg(long, global = true, default_value_t = false)]
    trust_all: bool,

    /// Machine-readable JSON output.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    /// Comma-separated list of specific skills to update.
    #[arg(long)]
    skills: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show installed skills from the lockfile.
    List,
    /// Restore a skill (or all skills) from the latest backup.
    Rollback {
        /// Skill to restore; all skills when omitted.
        skill: Option<String>,
    },
    /// Show available backups.
    ListBackups,
    /// Check for a newer skillsync release and install it.
    SelfUpdate,
}

/// Flags shared by every command.
struct RunOptions {
    dry_run: bool,
    force: bool,
    verbose: bool,
    trust_all: bool,
    json: bool,
    skills: Option<String>,
}

impl From<&Cli> for RunOptions {
    fn from(cli: &Cli) -> Self {
        Self {
            dry_run: cli.dry_run,
            force: cli.force,
            verbose: cli.verbose,
            trust_all: cli.trust_all,
            json: cli.json,
            skills: cli.skills.clone(),
        }
    }
}

fn log_level(cli: &Cli) -> &str {
    match cli.log_level.as_deref() {
        Some(level) => level,
        None if cli.verbose => "debug",
        None => "warn",
    }
}

fn init_telemetry(cli: &Cli, log_path: Option<&PathBuf>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(cli)));

    let log_file = log_path.and_then(|path| {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("cannot open log file {}: {e}", path.display());
                None
            },
        }
    });
    let file_layer = log_file.map(|file| {
        fmt::layer()
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .with_target(true)
    });

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let opts = RunOptions::from(&cli);

    if let Some(Commands::SelfUpdate) = cli.command {
        init_telemetry(&cli, None);
        let (ok, message) = self_update::run_self_update().await;
        if ok {
            eprintln!("{BOLD}{GREEN}{message}{RESET}");
            return Ok(());
        }
        eprintln!("{BOLD}{RED}{message}{RESET}");
        std::process::exit(1);
    }

    let config = match skillsync_config::discover_and_load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_telemetry(&cli, None);
            eprintln!("{BOLD}{RED}Config error:{RESET} {e}");
            std::process::exit(2);
        },
    };
    init_telemetry(&cli, config.log_path.as_ref());
    info!(version = env!("CARGO_PKG_VERSION"), "skillsync starting");

    match cli.command {
        None => update_commands::handle_update(&config, &opts).await,
        Some(Commands::List) => list_commands::handle_list(&config, &opts),
        Some(Commands::Rollback { ref skill }) => {
            backup_commands::handle_rollback(&config, &opts, skill.as_deref())
        },
        Some(Commands::ListBackups) => backup_commands::handle_list_backups(&config, &opts),
        Some(Commands::SelfUpdate) => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_command_is_update() {
        let cli = Cli::try_parse_from(["skillsync", "--dry-run", "--skills", "a,b"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.dry_run);
        assert_eq!(cli.skills.as_deref(), Some("a,b"));
        assert_eq!(log_level(&cli), "warn");
    }

    #[test]
    fn rollback_takes_optional_skill() {
        let cli = Cli::try_parse_from(["skillsync", "rollback", "pdf", "--dry-run"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Rollback { ref skill }) if skill.as_deref() == Some("pdf")));
        assert!(cli.dry_run);

        let cli = Cli::try_parse_from(["skillsync", "rollback"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Rollback { skill: None })));
    }

    #[test]
    fn verbose_raises_log_level() {
        let cli = Cli::try_parse_from(["skillsync", "list-backups", "-v", "--json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::ListBackups)));
        assert_eq!(log_level(&cli), "debug");

        let cli = Cli::try_parse_from(["skillsync", "-v", "--log-level", "trace"]).unwrap();
        assert_eq!(log_level(&cli), "trace");
    }
}
