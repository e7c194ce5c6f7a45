//! Human-readable rendering of the active view for terminal output.
//!
//! Produces a colored summary: the result counter, active filters, then the
//! visible objects of the detail view (flat or grouped), the table view, or
//! the statistics view.
use chrono::Utc;
use colored::*;

use crate::{
    engine::Engine,
    groups::DetailLayout,
    record::{AttributeSource, Record, describe_uac},
    stats::{BasicStats, calculate_statistics},
    view::View,
};

/// Columns shown for each row in the terminal table view.
const TABLE_COLUMNS: &[&str] = &["sAMAccountName", "userAccountControl", "operatingSystem"];

fn visible_len(s: &str) -> usize {
    // Strip ANSI escape sequences (\x1b[ ... m) to compute printable width
    let mut len = 0;
    let mut iter = s.chars().peekable();
    while let Some(ch) = iter.next() {
        if ch == '\u{1b}' {
            if let Some('[') = iter.peek().cloned() {
                let _ = iter.next();
            }
            for c in iter.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            len += 1;
        }
    }
    len
}

fn section_header(title: &str) -> String {
    let len = visible_len(title);
    let mut s = String::new();
    s.push('\n');
    s.push_str(title);
    s.push('\n');
    s.push_str(&"─".repeat(len));
    s.push_str("\n\n");
    s
}

fn tag_marks(engine: &Engine, record: &Record) -> String {
    let mut marks = String::new();
    if engine.tags.is_owned(record.id()) {
        marks.push_str(&format!(" {}", "[owned]".red().bold()));
    }
    if engine.tags.is_high_value(record.id()) {
        marks.push_str(&format!(" {}", "[high value]".yellow().bold()));
    }
    marks
}

fn card_lines(engine: &Engine, record: &Record, expanded: bool, out: &mut Vec<String>) {
    out.push(format!("{}{}", record.dn.bold(), tag_marks(engine, record)));
    if !expanded {
        return;
    }
    for (key, value) in record.attributes() {
        let value = if key == crate::record::USER_ACCOUNT_CONTROL {
            describe_uac(value)
        } else {
            value.to_string()
        };
        out.push(format!("  {}: {}", key.blue(), value));
    }
}

pub fn render_summary(engine: &Engine) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n",
        "LDAPViewer: Directory Dump Explorer".bold().cyan()
    ));
    out.push_str(&format!(
        "View: {}  |  {}\n",
        engine.active_view().to_string().bold(),
        engine.counter().to_string().green()
    ));
    let chrome = engine.chrome();
    if chrome.filters_visible {
        let active = engine.filters.describe();
        if active.is_empty() {
            out.push_str("Filters: (none)\n");
        } else {
            out.push_str(&format!("Filters: {}\n", active.join("; ")));
        }
    }

    match engine.active_view() {
        View::Detail => render_detail(engine, &mut out),
        View::Table => render_table(engine, &mut out),
        View::Stats => render_stats(engine, &mut out),
    }
    out
}

fn render_detail(engine: &Engine, out: &mut String) {
    let mut lines: Vec<String> = Vec::new();
    match engine.detail_layout() {
        DetailLayout::Flat(cards) => {
            for card in cards.iter().filter(|c| !c.hidden) {
                if let Some(r) = engine.records.get(card.record) {
                    card_lines(engine, r, card.expanded, &mut lines);
                }
            }
        }
        DetailLayout::Grouped { projection, .. } => {
            for section in projection.sections.iter().filter(|s| !s.hidden) {
                lines.push(format!(
                    "{} ({})",
                    section.key.label().bold().magenta(),
                    section.visible_count
                ));
                for card in section.cards.iter().filter(|c| !c.hidden) {
                    if let Some(r) = engine.records.get(card.record) {
                        let mut card_out = Vec::new();
                        card_lines(engine, r, card.expanded, &mut card_out);
                        lines.extend(card_out.into_iter().map(|l| format!("  {}", l)));
                    }
                }
            }
        }
    }
    if lines.is_empty() {
        lines.push("(No matching objects)".to_string());
    }
    let title = if engine.is_grouped() {
        "Objects by Group"
    } else {
        "Objects"
    };
    out.push_str(&section_header(&title.bold().yellow().to_string()));
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
}

fn render_table(engine: &Engine, out: &mut String) {
    let mut lines: Vec<String> = Vec::new();
    for row in engine.visible_rows() {
        let mut cols = vec![row.display_name().to_string()];
        for col in TABLE_COLUMNS {
            cols.push(row.attribute(col).unwrap_or("-").to_string());
        }
        lines.push(cols.join(" | "));
    }
    if lines.is_empty() {
        lines.push("(No matching rows)".to_string());
    }
    let mut header = vec!["DN"];
    header.extend_from_slice(TABLE_COLUMNS);
    out.push_str(&section_header(&"Table".bold().yellow().to_string()));
    out.push_str(&format!("{}\n", header.join(" | ").bold()));
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
}

fn render_stats(engine: &Engine, out: &mut String) {
    let s = calculate_statistics(&engine.records, &engine.tags, Utc::now());
    let mut lines = vec![
        format!("Total objects: {}", s.total),
        format!("Users: {}", s.users),
        format!("Computers: {}", s.computers),
        format!("Groups: {}", s.groups),
        format!("Other: {}", s.other),
        format!("Owned: {}", s.owned),
        format!("High value: {}", s.high_value),
    ];
    let buckets: [(&str, &BasicStats); 11] = [
        ("Enabled users", &s.enabled_users),
        ("Disabled users", &s.disabled_users),
        ("Kerberoastable", &s.kerberoastable),
        ("AS-REP roastable", &s.asrep_roastable),
        ("Password never expires", &s.password_never_expires),
        ("Password not required", &s.password_not_required),
        ("Unconstrained delegation", &s.unconstrained_delegation),
        ("adminCount=1", &s.admin_count),
        ("Never logged in", &s.never_logged_in),
        ("Inactive (90+ days)", &s.inactive),
        ("Unsupported OS", &s.unsupported_os),
    ];
    for (label, b) in buckets {
        lines.push(format!("{}: {} ({})", label.bold().blue(), b.count, b.percentage));
    }
    out.push_str(&section_header(
        &"Directory Statistics".bold().yellow().to_string(),
    ));
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;

    const DUMP: &str = r#"[
        {"dn": "CN=Administrator,CN=Users,DC=corp", "attributes": {"userAccountControl": [512], "memberOf": ["CN=Domain Admins,CN=Users,DC=corp"]}},
        {"dn": "CN=Guest,CN=Users,DC=corp", "attributes": {"userAccountControl": [514]}}
    ]"#;

    fn engine() -> Engine {
        colored::control::set_override(false);
        let mut e = Engine::new();
        e.load_from_strings(&[DUMP]).unwrap();
        e
    }

    #[test]
    fn detail_summary_lists_visible_objects() {
        let mut e = engine();
        e.set_search("admin");
        let s = render_summary(&e);
        assert!(s.contains("1 results / 2 objects"));
        assert!(s.contains("CN=Administrator,CN=Users,DC=corp"));
        assert!(!s.contains("CN=Guest"));
        assert!(s.contains("userAccountControl: 512 NORMAL_ACCOUNT"));
    }

    #[test]
    fn grouped_summary_shows_sections() {
        let mut e = engine();
        e.toggle_grouping();
        e.toggle_owned("CN=Guest,CN=Users,DC=corp");
        let s = render_summary(&e);
        assert!(s.contains("Objects by Group"));
        assert!(s.contains("Domain Admins (1)"));
        assert!(s.contains("Ungrouped (1)"));
        assert!(s.contains("[owned]"));
    }

    #[test]
    fn stats_view_hides_filters() {
        let mut e = engine();
        e.switch_view(View::Stats);
        let s = render_summary(&e);
        assert!(s.contains("Directory Statistics"));
        assert!(!s.contains("Filters:"));
        assert!(s.contains("Disabled users"));
    }

    #[test]
    fn visible_len_ignores_ansi() {
        assert_eq!(visible_len("\u{1b}[1mabc\u{1b}[0m"), 3);
    }
}
