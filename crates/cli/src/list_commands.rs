use {
    anyhow::Result,
    skillsync_config::AppConfig,
    skillsync_skills::{lockfile::LockfileStore, types::Lockfile},
};

use crate::{
    RunOptions,
    output::{DIM, RESET, or_dash, print_json, render_table},
};

/// Show installed skills from the lockfile.
pub fn handle_list(config: &AppConfig, opts: &RunOptions) -> Result<()> {
    let lockfile = LockfileStore::for_target_root(&config.global_skills_path).load();

    if opts.json {
        return print_json(&lockfile);
    }
    if lockfile.is_empty() {
        eprintln!("{DIM}No skills installed.{RESET}");
        return Ok(());
    }
    print!("{}", installed_table(&lockfile));
    Ok(())
}

fn installed_table(lockfile: &Lockfile) -> String {
    let rows: Vec<Vec<String>> = lockfile
        .skills
        .iter()
        .map(|(name, record)| {
            vec![
                name.clone(),
                or_dash(&record.source),
                or_dash(&record.installed_at),
                or_dash(&record.updated_at),
            ]
        })
        .collect();
    render_table(
        "Installed Skills",
        &["Skill", "Source", "Installed", "Updated"],
        &rows,
    )
}
