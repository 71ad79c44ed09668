//! Tabular rendering and terminal coloring.
//!
//! The status enums carry semantic values only; ANSI color is applied here,
//! at the presentation edge, and never stored in the core types.

use crate::systemd::{ActiveState, EnabledState};

/// Renders rows as left-justified columns separated by two spaces.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let columns = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(columns) {
            if cell.len() > widths[idx] {
                widths[idx] = cell.len();
            }
        }
    }

    let mut out = String::new();
    push_row(
        &mut out,
        &headers.iter().map(|h| h.to_string()).collect::<Vec<_>>(),
        &widths,
        None,
    );
    for row in rows {
        push_row(&mut out, row, &widths, None);
    }
    out
}

/// Status table: `IOC  Status  Auto-Start` with optional per-cell color.
pub fn status_table(rows: &[(String, ActiveState, EnabledState)], color: bool) -> String {
    let headers = ["IOC", "Status", "Auto-Start"];
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for (name, active, enabled) in rows {
        widths[0] = widths[0].max(name.len());
        widths[1] = widths[1].max(active.to_string().len());
        widths[2] = widths[2].max(enabled.to_string().len());
    }

    let mut out = String::new();
    push_row(
        &mut out,
        &headers.iter().map(|h| h.to_string()).collect::<Vec<_>>(),
        &widths,
        None,
    );
    let total = widths.iter().sum::<usize>() + 4;
    out.push_str(&"-".repeat(total));
    out.push('\n');
    for (name, active, enabled) in rows {
        let codes = if color {
            Some(vec![None, active_color(active), enabled_color(enabled)])
        } else {
            None
        };
        push_row(
            &mut out,
            &[name.clone(), active.to_string(), enabled.to_string()],
            &widths,
            codes.as_deref(),
        );
    }
    out
}

/// Pads each cell to its column width, then wraps it in the matching color
/// code (if any). Padding before coloring keeps the columns aligned.
fn push_row(out: &mut String, cells: &[String], widths: &[usize], codes: Option<&[Option<&str>]>) {
    let last = cells.len().saturating_sub(1);
    for (idx, cell) in cells.iter().enumerate() {
        let width = widths.get(idx).copied().unwrap_or(0);
        let padded = if idx == last {
            cell.clone()
        } else {
            format!("{cell:<width$}")
        };
        let rendered = match codes.and_then(|codes| codes.get(idx).copied().flatten()) {
            Some(code) => colorize(&padded, code),
            None => padded,
        };
        out.push_str(&rendered);
        if idx != last {
            out.push_str("  ");
        }
    }
    out.push('\n');
}

fn colorize(text: &str, code: &str) -> String {
    format!("\u{1b}[{code}m{text}\u{1b}[0m")
}

fn active_color(state: &ActiveState) -> Option<&'static str> {
    match state {
        ActiveState::Running => Some("32"),
        ActiveState::Stopped => Some("31"),
        ActiveState::Other(_) => Some("33"),
    }
}

fn enabled_color(state: &EnabledState) -> Option<&'static str> {
    match state {
        EnabledState::Enabled => Some("32"),
        EnabledState::Disabled => Some("31"),
        EnabledState::Other(_) => Some("33"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(s: &str) -> String {
        String::from_utf8_lossy(&strip_ansi_escapes::strip(s.as_bytes())).to_string()
    }

    #[test]
    fn columns_align_to_widest_cell() {
        let rows = vec![
            vec!["a".to_string(), "short".to_string()],
            vec!["longer-name".to_string(), "x".to_string()],
        ];
        let table = render_table(&["IOC", "VALUE"], &rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "IOC          VALUE");
        assert_eq!(lines[1], "a            short");
        assert_eq!(lines[2], "longer-name  x");
    }

    #[test]
    fn status_table_colors_strip_to_plain_vocabulary() {
        let rows = vec![
            (
                "ioc1".to_string(),
                ActiveState::Running,
                EnabledState::Enabled,
            ),
            (
                "ioc4".to_string(),
                ActiveState::Stopped,
                EnabledState::Disabled,
            ),
            (
                "ioc5".to_string(),
                ActiveState::Other("Activating".to_string()),
                EnabledState::Other("Static".to_string()),
            ),
        ];
        let colored = status_table(&rows, true);
        assert!(colored.contains("\u{1b}[32m"));
        assert!(colored.contains("\u{1b}[31m"));

        let plain = strip(&colored);
        let lines: Vec<&str> = plain.lines().collect();
        assert_eq!(lines[0], "IOC   Status      Auto-Start");
        assert!(lines[1].chars().all(|c| c == '-'));
        assert_eq!(lines[2], "ioc1  Running     Enabled");
        assert_eq!(lines[3], "ioc4  Stopped     Disabled");
        assert_eq!(lines[4], "ioc5  Activating  Static");
    }

    #[test]
    fn uncolored_status_table_has_no_escapes() {
        let rows = vec![(
            "ioc1".to_string(),
            ActiveState::Running,
            EnabledState::Enabled,
        )];
        let table = status_table(&rows, false);
        assert!(!table.contains('\u{1b}'));
    }
}
