use {
    anyhow::Result,
    skillsync_config::AppConfig,
    skillsync_skills::{backup::BackupManager, lockfile::LockfileStore, types::SnapshotInfo},
};

use crate::{
    RunOptions,
    output::{BOLD, DIM, GREEN, RED, RESET, YELLOW, print_json, render_table},
};

/// Restore one skill (or all) from the newest backup. Exits 1 on failure.
pub fn handle_rollback(config: &AppConfig, opts: &RunOptions, skill: Option<&str>) -> Result<()> {
    let human = !opts.json;
    if human && opts.dry_run {
        eprintln!("{BOLD}{YELLOW}Dry run mode{RESET}: no changes will be made.");
    }

    let manager = BackupManager::from_config(config);
    let store = LockfileStore::for_target_root(&config.global_skills_path);
    let report = manager.restore_backup(
        &config.skill_target_paths(),
        skill,
        opts.dry_run,
        &store,
    )?;

    if human {
        for action in &report.actions {
            let verb = if action.dry_run { "Would restore" } else { "Restored" };
            eprintln!(
                "  {GREEN}✓{RESET} {verb} {} {DIM}→ {}{RESET}",
                action.skill,
                action.destination.display()
            );
        }
    }

    if !report.succeeded() {
        if human {
            eprintln!("{BOLD}{RED}Rollback failed.{RESET} No suitable backup found.");
        }
        std::process::exit(1);
    }

    if human {
        let label = skill.map_or_else(|| "all skills".to_string(), |s| format!("skill '{s}'"));
        eprintln!("{BOLD}{GREEN}Rolled back {label} from backup.{RESET}");
    }
    Ok(())
}

/// Show available backups, newest first.
pub fn handle_list_backups(config: &AppConfig, opts: &RunOptions) -> Result<()> {
    let backups = BackupManager::from_config(config).list_backups();

    if opts.json {
        return print_json(&backups);
    }
    if backups.is_empty() {
        eprintln!("{DIM}No backups available.{RESET}");
        return Ok(());
    }
    print!("{}", backups_table(&backups));
    Ok(())
}

fn backups_table(backups: &[SnapshotInfo]) -> String {
    let rows: Vec<Vec<String>> = backups
        .iter()
        .map(|b| {
            vec![
                b.timestamp.clone(),
                b.skill_count.to_string(),
                b.path.display().to_string(),
            ]
        })
        .collect();
    render_table("Available Backups", &["Timestamp", "Skills", "Path"], &rows)
}
