//! Terminal output helpers.

use serde::Serialize;

/// ANSI color codes.
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";
pub const DIM: &str = "\x1b[2m";
pub const BOLD: &str = "\x1b[1m";
pub const RESET: &str = "\x1b[0m";

/// Pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render rows as left-aligned columns under a bold title and header.
pub fn render_table(title: &str, header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let mut out = format!("{BOLD}{title}{RESET}\n");
    out.push_str(&format!("{BOLD}{}{RESET}\n", format_row(header, &widths)));
    for row in rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&format_row(&cells, &widths));
        out.push('\n');
    }
    out
}

fn format_row(cells: &[&str], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, &w)| format!("{cell:<w$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// `—` for empty cells.
pub fn or_dash(value: &str) -> String {
    if value.is_empty() {
        "—".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_aligned() {
        let out = render_table("Installed Skills", &["Skill", "Source"], &[
            vec!["pdf".into(), "anthropic".into()],
            vec!["frontend-design".into(), "x".into()],
        ]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], format!("{:<15}  anthropic", "pdf"));
        assert_eq!(lines[3], "frontend-design  x");
    }

    #[test]
    fn dash_for_empty() {
        assert_eq!(or_dash(""), "—");
        assert_eq!(or_dash("a"), "a");
    }
}
