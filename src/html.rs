//! Self-contained HTML report of the current engine state.
//!
//! The document carries both render targets (detail cards, flat or grouped,
//! and the attribute table) plus the statistics view. Visibility, tags, theme
//! and the result counter reflect the engine at render time. Only card
//! collapsing is scripted.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

use crate::engine::Engine;
use crate::groups::{Card, DetailLayout};
use crate::record::{AttributeSource, Record, USER_ACCOUNT_CONTROL, describe_uac};
use crate::stats::calculate_statistics;
use crate::view::View;

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 0; padding: 1em; background: #fafafa; color: #222; }
body[data-theme="dark"] { background: #1e1e1e; color: #ddd; }
.counter { font-weight: bold; margin: .5em 0; }
.filters { font-size: .9em; opacity: .8; }
.entry { border: 1px solid #ccc; border-radius: 4px; margin: .4em 0; padding: .2em .6em; }
.entry h2 { font-size: 1em; cursor: pointer; margin: .3em 0; }
.entry.owned { border-left: 6px solid #c0392b; }
.entry.high-value h2::after { content: " \2605"; color: #e67e22; }
.attr-table td.key { font-weight: bold; padding-right: 1em; vertical-align: top; }
.group > h3 { margin-bottom: .2em; }
table.dump { border-collapse: collapse; font-size: .85em; }
table.dump td, table.dump th { border: 1px solid #999; padding: 2px 4px; }
.hidden, .collapsed { display: none; }
"#;

const SCRIPT: &str = r#"
function toggle(id) {
  var el = document.getElementById(id);
  if (el) { el.classList.toggle('collapsed'); }
}
"#;

/// `ldapviewer_<stem>.html` for an input dump path.
pub fn report_filename<P: AsRef<Path>>(input: P) -> PathBuf {
    let stem = input
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dump".to_string());
    PathBuf::from(format!("ldapviewer_{}.html", stem))
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn hidden_class(hidden: bool) -> &'static str {
    if hidden { " hidden" } else { "" }
}

fn render_entry(engine: &Engine, record: &Record, card: &Card, dom_id: &str) -> String {
    let mut classes = String::from("entry");
    if engine.tags.is_owned(record.id()) {
        classes.push_str(" owned");
    }
    if engine.tags.is_high_value(record.id()) {
        classes.push_str(" high-value");
    }
    classes.push_str(hidden_class(card.hidden));
    let mut html = format!(
        "<div class=\"{}\" data-id=\"{}\">\n<h2 onclick=\"toggle('{}')\">{}</h2>\n<div class=\"attributes{}\" id=\"{}\">",
        classes,
        html_escape(record.id()),
        dom_id,
        html_escape(&record.dn),
        if card.expanded { "" } else { " collapsed" },
        dom_id,
    );
    html.push_str("<table class=\"attr-table\">");
    for (key, value) in record.attributes() {
        let value = if key == USER_ACCOUNT_CONTROL {
            describe_uac(value)
        } else {
            value.to_string()
        };
        html.push_str(&format!(
            "<tr><td class=\"key\">{}</td><td class=\"value\">{}</td></tr>\n",
            html_escape(key),
            html_escape(&value)
        ));
    }
    html.push_str("</table>\n</div>\n</div>\n");
    html
}

fn render_detail(engine: &Engine) -> String {
    let mut html = String::new();
    match engine.detail_layout() {
        DetailLayout::Flat(cards) => {
            for (i, card) in cards.iter().enumerate() {
                if let Some(r) = engine.records.get(card.record) {
                    html.push_str(&render_entry(engine, r, card, &format!("attr{}", i)));
                }
            }
        }
        DetailLayout::Grouped { projection, .. } => {
            for section in &projection.sections {
                html.push_str(&format!(
                    "<div class=\"group{}\" id=\"{}\">\n<h3>{} ({})</h3>\n",
                    hidden_class(section.hidden),
                    section.id,
                    html_escape(section.key.label()),
                    section.visible_count
                ));
                for (i, card) in section.cards.iter().enumerate() {
                    if let Some(r) = engine.records.get(card.record) {
                        let dom_id = format!("{}-attr{}", section.id, i);
                        html.push_str(&render_entry(engine, r, card, &dom_id));
                    }
                }
                html.push_str("</div>\n");
            }
        }
    }
    html
}

fn render_table(engine: &Engine) -> String {
    let mut html = String::from("<table class=\"dump\">\n<thead><tr>");
    for h in &engine.table.headers {
        html.push_str(&format!("<th>{}</th>", html_escape(h)));
    }
    html.push_str("</tr></thead>\n<tbody>\n");
    for (i, row) in engine.table.iter_rows().enumerate() {
        let mut classes = Vec::new();
        if engine.tags.is_owned(row.display_name()) {
            classes.push("owned");
        }
        if engine.tags.is_high_value(row.display_name()) {
            classes.push("high-value");
        }
        if engine.is_row_hidden(i) {
            classes.push("hidden");
        }
        html.push_str(&format!("<tr class=\"{}\">", classes.join(" ")));
        for cell in row.cells() {
            html.push_str(&format!("<td>{}</td>", html_escape(cell)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>\n");
    html
}

fn render_stats(engine: &Engine) -> String {
    let s = calculate_statistics(&engine.records, &engine.tags, Utc::now());
    let rows = [
        ("Total objects", s.total.to_string()),
        ("Users", s.users.to_string()),
        ("Computers", s.computers.to_string()),
        ("Groups", s.groups.to_string()),
        ("Kerberoastable", format!("{} ({})", s.kerberoastable.count, s.kerberoastable.percentage)),
        ("AS-REP roastable", format!("{} ({})", s.asrep_roastable.count, s.asrep_roastable.percentage)),
        ("Disabled users", format!("{} ({})", s.disabled_users.count, s.disabled_users.percentage)),
        ("Unsupported OS", format!("{} ({})", s.unsupported_os.count, s.unsupported_os.percentage)),
        ("Owned", s.owned.to_string()),
        ("High value", s.high_value.to_string()),
    ];
    let mut html = String::from("<table class=\"dump\">\n");
    for (label, value) in rows {
        html.push_str(&format!("<tr><th>{}</th><td>{}</td></tr>\n", label, value));
    }
    html.push_str("</table>\n");
    html
}

/// Render the full document. `title` is usually the input file name.
pub fn render_document(engine: &Engine, title: &str) -> String {
    let active = engine.active_view();
    let section = |view: View, body: String| {
        format!(
            "<section id=\"{}-view\" class=\"view{}\">\n{}</section>\n",
            view,
            hidden_class(view != active),
            body
        )
    };
    let filters = engine.filters.describe();
    let filters_html = if !engine.chrome().filters_visible || filters.is_empty() {
        String::new()
    } else {
        format!(
            "<div class=\"filters\">{}</div>\n",
            html_escape(&filters.join("; "))
        )
    };
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>LDAPViewer - {title}</title>\n<style>{style}</style>\n</head>\n<body data-theme=\"{theme}\">\n<h1>LDAPViewer - {title}</h1>\n<div class=\"counter\" id=\"results-counter\">{counter}</div>\n{filters}{detail}{table}{stats}<script>{script}</script>\n</body>\n</html>\n",
        title = html_escape(title),
        style = STYLE,
        theme = engine.tags.theme,
        counter = engine.counter(),
        filters = filters_html,
        detail = section(View::Detail, render_detail(engine)),
        table = section(View::Table, render_table(engine)),
        stats = section(View::Stats, render_stats(engine)),
        script = SCRIPT,
    )
}

pub fn save_report<P: AsRef<Path>>(engine: &Engine, path: P, title: &str) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, render_document(engine, title))
        .with_context(|| format!("write {}", path.display()))?;
    log::info!("wrote HTML report {}", path.display());
    Ok(())
}
