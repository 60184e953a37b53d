use std::io::{IsTerminal, Write};

use skillsync_fetch::{HostApprover, HostDecision};

use crate::output::{BOLD, CYAN, RESET, YELLOW};

/// Asks on the terminal whether an unknown host may be used.
/// Without an interactive stdin every unknown host is denied.
pub struct TerminalApprover;

impl HostApprover for TerminalApprover {
    fn approve(&self, host: &str, url: &str) -> HostDecision {
        if !std::io::stdin().is_terminal() {
            return HostDecision::Deny;
        }
        eprintln!("\n{BOLD}{YELLOW}Unknown host:{RESET} {CYAN}{host}{RESET} (from {url})");
        loop {
            let Ok(answer) = read_answer("  Allow this host? [once/always/deny] (deny): ") else {
                return HostDecision::Deny;
            };
            match parse_decision(&answer) {
                Some(HostDecision::Always) => {
                    eprintln!("  Adding {host} to allowedHosts in config.");
                    return HostDecision::Always;
                },
                Some(decision) => return decision,
                None => eprintln!("  Please answer once, always, or deny."),
            }
        }
    }
}

fn read_answer(prompt: &str) -> std::io::Result<String> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{prompt}")?;
    stderr.flush()?;
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line)? == 0 {
        return Ok(String::new());
    }
    Ok(line)
}

/// Empty input means deny.
fn parse_decision(answer: &str) -> Option<HostDecision> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" | "deny" | "d" => Some(HostDecision::Deny),
        "once" | "o" => Some(HostDecision::Once),
        "always" | "a" => Some(HostDecision::Always),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("", Some(HostDecision::Deny))]
    #[case("DENY\n", Some(HostDecision::Deny))]
    #[case("once", Some(HostDecision::Once))]
    #[case(" Always ", Some(HostDecision::Always))]
    #[case("a", Some(HostDecision::Always))]
    #[case("maybe", None)]
    fn decisions(#[case] input: &str, #[case] expected: Option<HostDecision>) {
        assert_eq!(parse_decision(input), expected);
    }
}
