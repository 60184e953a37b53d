use std::sync::Arc;

use {
    anyhow::Result,
    serde_json::json,
    skillsync_config::AppConfig,
    skillsync_fetch::GitArchiveFetcher,
    skillsync_skills::{
        install::InstallOptions,
        sync::{UpdateOptions, UpdateReport, run_update},
        types::Severity,
    },
};

use crate::{
    RunOptions,
    output::{BOLD, DIM, GREEN, RED, RESET, YELLOW, print_json},
    prompt::TerminalApprover,
};

/// `--skills a,b` → `["a", "b"]`. Blank input means no filter.
pub fn parse_skill_filter(raw: Option<&str>) -> Option<Vec<String>> {
    let skills: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!skills.is_empty()).then_some(skills)
}

pub async fn handle_update(config: &AppConfig, opts: &RunOptions) -> Result<()> {
    let skill_filter = parse_skill_filter(opts.skills.as_deref());
    let human = !opts.json;

    if human && opts.dry_run {
        eprintln!("{BOLD}{YELLOW}Dry run mode{RESET}: no changes will be made.");
    }
    if human && opts.verbose {
        let source = config
            .config_file_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "default".into());
        eprintln!("{DIM}Config: {source}{RESET}");
        if let Some(filter) = &skill_filter {
            eprintln!("{DIM}Skills filter: {}{RESET}", filter.join(", "));
        }
    }
    if human && config.repositories.is_empty() {
        eprintln!("{DIM}No repositories configured.{RESET}");
    }

    let fetcher = GitArchiveFetcher::new(config, opts.trust_all, Arc::new(TerminalApprover));
    let options = UpdateOptions {
        install: InstallOptions {
            overwrite: opts.force,
            dry_run: opts.dry_run,
        },
        skill_filter,
    };
    let report = run_update(config, &fetcher, &options).await?;

    if opts.json {
        return print_json(&json!({ "updated": report.install.installed }));
    }
    print_report(&report, opts.verbose);
    Ok(())
}

fn print_report(report: &UpdateReport, verbose: bool) {
    if let Some(backup) = &report.backup {
        eprintln!(
            "{DIM}Backed up {} skill(s) to {}{RESET}",
            backup.skill_count,
            backup.path.display()
        );
    }

    for download in &report.downloads {
        match &download.error {
            None => eprintln!("  {GREEN}✓{RESET} {}", download.repo.name),
            Some(error) => eprintln!("  {RED}✗{RESET} {}: {error}", download.repo.name),
        }
    }

    for d in &report.install.diagnostics {
        let (color, show) = match d.severity {
            Severity::Error => (RED, true),
            Severity::Warning => (YELLOW, true),
            Severity::Info => (DIM, verbose || d.message.starts_with("would ")),
        };
        if show {
            eprintln!("  {color}{}{RESET} {}: {}", d.severity, d.subject, d.message);
        }
    }

    let installed = &report.install.installed;
    if installed.is_empty() {
        eprintln!("\n{DIM}No skills were updated.{RESET}");
    } else {
        for record in installed {
            eprintln!("  {GREEN}✓{RESET} {} {DIM}({}){RESET}", record.name, record.source);
        }
        eprintln!("\n{BOLD}{GREEN}Updated {} skill(s).{RESET}", installed.len());
    }
}
