//! Engine: owns the loaded records and every piece of runtime state (filters,
//! tags, active view, detail layout, row visibility, result counter) and
//! re-derives visibility whenever one of them changes.
//!
//! Typical usage:
//!
//! ```no_run
//! use ldapviewer::engine::Engine;
//! # fn main() -> anyhow::Result<()> {
//! let mut engine = Engine::new();
//! engine.load_from_file_paths(&["/path/to/domain_users.json"])?;
//! engine.set_search("admin");
//! println!("{}", engine.counter());
//! # Ok(())
//! # }
//! ```
use std::fmt;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rayon::prelude::*;

use crate::debounce::Debouncer;
use crate::dump::{parse_dump_bytes, parse_dump_contents};
use crate::filter::{FilterState, GeneralFilter, LdapAttributeFilter, UacCombine};
use crate::groups::{Card, DetailLayout, GroupProjection};
use crate::io::{DEFAULT_MMAP_THRESHOLD_BYTES, contains_folded, read_bytes_auto};
use crate::predicates::{EvalContext, general_filter, has_uac_flags, matches_ldap_filter};
use crate::record::{AttributeSource, Record, USER_ACCOUNT_CONTROL};
use crate::table::{Table, TableRowRef};
use crate::tags::{Tag, TagStore, Theme};
use crate::uac::UacFlagSpec;
use crate::view::{View, ViewChrome, ViewController};

/// `"<visible> results / <total> objects"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultCounter {
    pub visible: usize,
    pub total: usize,
}

impl fmt::Display for ResultCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} results / {} objects", self.visible, self.total)
    }
}

/// Counts of entries dropped while loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub skipped_entries: usize,
}

/// The filter rule: a record is shown iff every enabled category accepts it.
pub struct Evaluator<'a> {
    filters: &'a FilterState,
    ctx: EvalContext<'a>,
}

impl<'a> Evaluator<'a> {
    pub fn new(filters: &'a FilterState, tags: &'a TagStore, now: DateTime<Utc>) -> Self {
        Self {
            filters,
            ctx: EvalContext { now, tags },
        }
    }

    pub fn matches<S: AttributeSource + ?Sized>(&self, record: &S) -> bool {
        let f = self.filters;
        if f.search_enabled() && !contains_folded(record.search_text(), f.search()) {
            return false;
        }
        if let Some(kind) = f.general() {
            if !general_filter(record, kind, &self.ctx) {
                return false;
            }
        }
        if f.uac_enabled() {
            match record.attribute(USER_ACCOUNT_CONTROL) {
                Some(raw) if has_uac_flags(raw, f.uac_flags(), f.uac_mode()) => {}
                _ => return false,
            }
        }
        if f.ldap_enabled()
            && !f
                .ldap_attributes()
                .iter()
                .all(|filter| matches_ldap_filter(record, filter))
        {
            return false;
        }
        true
    }
}

/// Aggregates loaded records and the viewer state built on top of them.
#[derive(Debug)]
pub struct Engine {
    pub records: Vec<Record>,
    pub table: Table,
    pub filters: FilterState,
    pub tags: TagStore,
    pub parse_stats: Option<ParseStats>,
    view: ViewController,
    detail: DetailLayout,
    row_hidden: Vec<bool>,
    counter: ResultCounter,
    search_input: Debouncer<String>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an empty engine with every filter disabled and the detail view
    /// active.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            table: Table::default(),
            filters: FilterState::new(),
            tags: TagStore::new(),
            parse_stats: None,
            view: ViewController::new(),
            detail: DetailLayout::new(0),
            row_hidden: Vec::new(),
            counter: ResultCounter::default(),
            search_input: Debouncer::default(),
        }
    }

    /// Replace the record set and rebuild both render targets.
    pub fn set_records(&mut self, records: Vec<Record>) {
        self.table = Table::from_records(&records);
        self.detail = DetailLayout::new(records.len());
        self.row_hidden = vec![false; records.len()];
        self.records = records;
        self.apply_all_filters();
    }

    /// Load dumps already in memory. Intended for tests and small
    /// programmatic integrations.
    pub fn load_from_strings(&mut self, dumps: &[&str]) -> Result<()> {
        let mut all = Vec::new();
        for d in dumps {
            all.extend(parse_dump_contents(d)?);
        }
        self.set_records(all);
        Ok(())
    }

    /// Load dump files in order, mapping files at or above the threshold.
    pub fn load_from_file_paths_with_threshold<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        mmap_threshold_bytes: u64,
    ) -> Result<()> {
        let mut all = Vec::new();
        let mut skipped = 0;
        for p in paths {
            let (records, s) = load_one(p.as_ref(), mmap_threshold_bytes)?;
            all.extend(records);
            skipped += s;
        }
        self.parse_stats = Some(ParseStats {
            skipped_entries: skipped,
        });
        self.set_records(all);
        Ok(())
    }

    /// Same as [`Self::load_from_file_paths_with_threshold`] but parses the
    /// files concurrently. Record order still follows `paths`.
    pub fn load_from_file_paths_parallel_with_threshold<P: AsRef<Path> + Sync>(
        &mut self,
        paths: &[P],
        mmap_threshold_bytes: u64,
    ) -> Result<()> {
        let loaded: Vec<(Vec<Record>, usize)> = paths
            .par_iter()
            .map(|p| load_one(p.as_ref(), mmap_threshold_bytes))
            .collect::<Result<_>>()?;
        let mut all = Vec::new();
        let mut skipped = 0;
        for (records, s) in loaded {
            all.extend(records);
            skipped += s;
        }
        self.parse_stats = Some(ParseStats {
            skipped_entries: skipped,
        });
        self.set_records(all);
        Ok(())
    }

    /// Convenience wrapper that uses the default mmap threshold.
    pub fn load_from_file_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<()> {
        self.load_from_file_paths_with_threshold(paths, DEFAULT_MMAP_THRESHOLD_BYTES)
    }

    pub fn apply_all_filters(&mut self) -> ResultCounter {
        self.apply_all_filters_at(Utc::now())
    }

    /// Re-evaluate visibility of both render targets (cards and table rows),
    /// whatever the active view, and refresh the counter for the active view.
    pub fn apply_all_filters_at(&mut self, now: DateTime<Utc>) -> ResultCounter {
        let eval = Evaluator::new(&self.filters, &self.tags, now);
        let records = &self.records;
        let total = records.len();
        let detail_visible = match &mut self.detail {
            DetailLayout::Flat(cards) => {
                for card in cards.iter_mut() {
                    card.hidden = !records.get(card.record).is_some_and(|r| eval.matches(r));
                }
                cards.iter().filter(|c| !c.hidden).count()
            }
            DetailLayout::Grouped { projection, .. } => {
                let mut shown = vec![false; total];
                for section in &mut projection.sections {
                    for card in &mut section.cards {
                        let visible = records.get(card.record).is_some_and(|r| eval.matches(r));
                        card.hidden = !visible;
                        if visible {
                            shown[card.record] = true;
                        }
                    }
                    section.visible_count = section.cards.iter().filter(|c| !c.hidden).count();
                    section.hidden = section.visible_count == 0;
                }
                shown.iter().filter(|s| **s).count()
            }
        };
        for (hidden, row) in self.row_hidden.iter_mut().zip(self.table.iter_rows()) {
            *hidden = !eval.matches(&row);
        }
        let rows_visible = self.row_hidden.iter().filter(|h| !**h).count();
        self.counter = match self.view.active() {
            View::Detail => ResultCounter {
                visible: detail_visible,
                total,
            },
            View::Table => ResultCounter {
                visible: rows_visible,
                total: self.table.rows.len(),
            },
            // Filters are not offered on the statistics view.
            View::Stats => ResultCounter {
                visible: total,
                total,
            },
        };
        log::debug!(
            "filters applied to {} view: {}",
            self.view.active(),
            self.counter
        );
        self.counter
    }

    pub fn counter(&self) -> ResultCounter {
        self.counter
    }

    // Filter state mutations. Each one updates state first, then re-applies.

    pub fn set_search(&mut self, text: &str) -> ResultCounter {
        self.search_input.flush();
        self.filters.set_search(text);
        self.apply_all_filters()
    }

    /// Record a search keystroke; filters run on [`Self::tick`] once typing
    /// has paused.
    pub fn on_search_input(&mut self, text: &str, at: Instant) {
        self.search_input.push(text.to_string(), at);
    }

    /// Apply a debounced search if its quiet period has elapsed.
    pub fn tick(&mut self, now: Instant) -> Option<ResultCounter> {
        let text = self.search_input.poll(now)?;
        self.filters.set_search(&text);
        Some(self.apply_all_filters())
    }

    pub fn search_deadline(&self) -> Option<Instant> {
        self.search_input.deadline()
    }

    pub fn toggle_general(&mut self, kind: GeneralFilter) -> ResultCounter {
        self.filters.toggle_general(kind);
        self.apply_all_filters()
    }

    pub fn set_general(&mut self, kind: Option<GeneralFilter>) -> ResultCounter {
        self.filters.set_general(kind);
        self.apply_all_filters()
    }

    pub fn toggle_uac_flag(&mut self, spec: UacFlagSpec) -> ResultCounter {
        self.filters.toggle_uac_flag(spec);
        self.apply_all_filters()
    }

    pub fn select_uac_flag(&mut self, spec: UacFlagSpec) -> ResultCounter {
        self.filters.select_uac_flag(spec);
        self.apply_all_filters()
    }

    pub fn set_uac_mode(&mut self, mode: UacCombine) -> ResultCounter {
        self.filters.set_uac_mode(mode);
        self.apply_all_filters()
    }

    pub fn toggle_ldap_attribute(&mut self, filter: LdapAttributeFilter) -> ResultCounter {
        self.filters.toggle_ldap_attribute(filter);
        self.apply_all_filters()
    }

    pub fn select_ldap_attribute(&mut self, filter: LdapAttributeFilter) -> ResultCounter {
        self.filters.select_ldap_attribute(filter);
        self.apply_all_filters()
    }

    pub fn clear_filters(&mut self) -> ResultCounter {
        self.search_input.flush();
        self.filters.clear();
        self.apply_all_filters()
    }

    // Views

    pub fn active_view(&self) -> View {
        self.view.active()
    }

    pub fn chrome(&self) -> ViewChrome {
        self.view.chrome()
    }

    pub fn switch_view(&mut self, target: View) -> ViewChrome {
        let chrome = self.view.switch_view(target);
        self.apply_all_filters();
        chrome
    }

    pub fn is_grouped(&self) -> bool {
        self.detail.is_grouped()
    }

    /// Toggle the group-by projection of the detail view.
    pub fn toggle_grouping(&mut self) -> bool {
        let grouped = self.detail.toggle(&self.records);
        self.apply_all_filters();
        grouped
    }

    pub fn detail_layout(&self) -> &DetailLayout {
        &self.detail
    }

    pub fn group_projection(&self) -> Option<&GroupProjection> {
        match &self.detail {
            DetailLayout::Grouped { projection, .. } => Some(projection),
            DetailLayout::Flat(_) => None,
        }
    }

    pub fn expand_all(&mut self) {
        self.detail.cards_mut().for_each(|c| c.expanded = true);
    }

    pub fn collapse_all(&mut self) {
        self.detail.cards_mut().for_each(|c| c.expanded = false);
    }

    /// Cards currently shown, paired with their records. In grouped mode a
    /// record appears once per group it belongs to.
    pub fn visible_cards(&self) -> impl Iterator<Item = (&Card, &Record)> {
        self.detail
            .cards()
            .filter(|c| !c.hidden)
            .filter_map(move |c| self.records.get(c.record).map(|r| (c, r)))
    }

    pub fn is_row_hidden(&self, index: usize) -> bool {
        self.row_hidden.get(index).copied().unwrap_or(false)
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = TableRowRef<'_>> {
        self.table
            .iter_rows()
            .enumerate()
            .filter(move |(i, _)| !self.is_row_hidden(*i))
            .map(|(_, r)| r)
    }

    // Tags and theme. Callers persist `self.tags` afterwards.

    /// Flip a tag on the record with identifier `id`. Unknown ids are still
    /// recorded so tags carry over to dumps that contain them.
    pub fn toggle_tag(&mut self, tag: Tag, id: &str) -> bool {
        if !self.records.iter().any(|r| r.id() == id) {
            log::warn!("tagging {} which is not in the loaded dump", id);
        }
        let now_tagged = self.tags.toggle(tag, id);
        self.apply_all_filters();
        now_tagged
    }

    pub fn toggle_owned(&mut self, id: &str) -> bool {
        self.toggle_tag(Tag::Owned, id)
    }

    pub fn toggle_high_value(&mut self, id: &str) -> bool {
        self.toggle_tag(Tag::HighValue, id)
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.tags.toggle_theme()
    }
}

fn load_one(path: &Path, threshold: u64) -> Result<(Vec<Record>, usize)> {
    let bytes = read_bytes_auto(path, threshold)?;
    let (records, skipped) =
        parse_dump_bytes(&bytes).with_context(|| format!("parse {}", path.display()))?;
    log::info!(
        "loaded {} records from {} ({} skipped)",
        records.len(),
        path.display(),
        skipped
    );
    Ok((records, skipped))
}
