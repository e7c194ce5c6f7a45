//! CLI entrypoint for `ldapviewer`.
//!
//! Parses command-line arguments, validates the dump files, loads them through
//! the library engine, restores persisted tags, applies the requested filters
//! and view, prints a terminal summary, and optionally writes the HTML report
//! and CSV export or drops into interactive mode.
use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::{LevelFilter, error, warn};
use ldapviewer::{
    engine::Engine,
    export::{EXPORT_FILENAME, ExportScope, save_table_csv},
    filter::{GeneralFilter, LdapAttributeFilter, UacCombine},
    html::{report_filename, save_report},
    io::DEFAULT_MMAP_THRESHOLD_BYTES,
    repl::Session,
    report::render_summary,
    tags::{Tag, TagStore, Theme},
    uac::UacFlagSpec,
    view::View,
};

#[derive(Parser, Debug)]
#[command(
    name = "ldapviewer",
    version,
    about = "Explore ldapdomaindump JSON files (Rust)",
    after_help = "Example: ldapviewer -f domain_users.json -u ACCOUNTDISABLE -o out/"
)]
struct Args {
    /// ldapdomaindump JSON file(s) (domain_users.json, domain_computers.json, ...)
    #[arg(short = 'f', long = "file", required = true)]
    files: Vec<PathBuf>,

    /// Free-text search over names, attribute names and values
    #[arg(short = 's', long = "search")]
    search: Option<String>,

    /// General filter
    #[arg(short = 'g', long = "general", value_enum)]
    general: Option<GeneralFilter>,

    /// UAC condition, e.g. ACCOUNTDISABLE, !DONT_REQ_PREAUTH or 0x2 (repeatable)
    #[arg(short = 'u', long = "uac")]
    uac: Vec<UacFlagSpec>,

    /// How several UAC conditions combine
    #[arg(long = "uac-mode", value_enum, default_value_t = UacCombine::All)]
    uac_mode: UacCombine,

    /// LDAP attribute filter: name, name=value or unsupportedOS (repeatable)
    #[arg(short = 'l', long = "ldap")]
    ldap: Vec<LdapAttributeFilter>,

    /// View to render
    #[arg(long = "view", value_enum, default_value_t = View::Detail)]
    view: View,

    /// Group the detail view by AD group
    #[arg(long = "group-by-groups")]
    group_by_groups: bool,

    /// JSON file holding owned/high value tags and the theme
    #[arg(long = "state")]
    state: Option<PathBuf>,

    /// Toggle the owned tag on a DN (repeatable, persisted with --state)
    #[arg(long = "toggle-owned")]
    toggle_owned: Vec<String>,

    /// Toggle the high value tag on a DN (repeatable, persisted with --state)
    #[arg(long = "toggle-high-value")]
    toggle_high_value: Vec<String>,

    /// Set the report theme (persisted with --state)
    #[arg(long = "theme", value_enum)]
    theme: Option<Theme>,

    /// Output directory for the HTML report and CSV export
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Rows included in the CSV export
    #[arg(long = "csv-scope", value_enum, default_value_t = ExportScope::All)]
    csv_scope: ExportScope,

    /// Read commands from stdin after loading
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,

    /// Override mmap threshold in bytes. If zero, disable mmap.
    #[arg(long = "mmap-threshold", default_value_t = DEFAULT_MMAP_THRESHOLD_BYTES)]
    mmap_threshold: u64,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Enable parallel loading of input files
    #[arg(long = "parallel")]
    parallel: bool,

    /// Control color output (auto, always, never)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Suppress summary output (still writes outputs if -o is provided)
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

const ASCII_TITLE: &str = r#"
    __    __          _    ___
   / /___/ /___ _____| |  / (_)__ _      _____  _____
  / / __  / __ `/ __ \ | / / / _ \ | /| / / _ \/ ___/
 / / /_/ / /_/ / /_/ / |/ / /  __/ |/ |/ /  __/ /
/_/\__,_/\__,_/ .___/|___/_/\___/|__/|__/\___/_/
             /_/
"#;

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

fn verify_inputs(args: &Args) -> Result<()> {
    if args.files.is_empty() {
        bail!("no dump files provided (-f/--file)");
    }
    for p in &args.files {
        if !p.is_file() {
            bail!("input file not found: {}", p.display());
        }
        let is_json = p
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if !is_json {
            bail!("input file must have a .json extension: {}", p.display());
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logger(args.verbose);
    // Configure color policy
    match args.color {
        ColorChoice::Always => {
            colored::control::set_override(true);
        }
        ColorChoice::Never => {
            colored::control::set_override(false);
        }
        ColorChoice::Auto => {}
    }
    if let Err(e) = verify_inputs(&args) {
        error!("{}", e);
        std::process::exit(2);
    }

    let mut engine = Engine::new();
    let threshold = if args.mmap_threshold == 0 {
        u64::MAX
    } else {
        args.mmap_threshold
    };
    let load_res = if args.parallel {
        engine.load_from_file_paths_parallel_with_threshold(&args.files, threshold)
    } else {
        engine.load_from_file_paths_with_threshold(&args.files, threshold)
    };
    if let Err(e) = load_res {
        error!("failed to load inputs: {:#}", e);
        std::process::exit(3);
    }
    if let Some(stats) = engine.parse_stats {
        if stats.skipped_entries > 0 {
            warn!("skipped {} malformed entries", stats.skipped_entries);
        }
    }

    // Tags and theme
    if let Some(path) = &args.state {
        match TagStore::load(path) {
            Ok(tags) => engine.tags = tags,
            Err(e) => {
                error!("{:#}", e);
                std::process::exit(7);
            }
        }
    }
    let mut tags_changed = false;
    for id in &args.toggle_owned {
        engine.toggle_tag(Tag::Owned, id);
        tags_changed = true;
    }
    for id in &args.toggle_high_value {
        engine.toggle_tag(Tag::HighValue, id);
        tags_changed = true;
    }
    if let Some(theme) = args.theme {
        if engine.tags.theme != theme {
            engine.toggle_theme();
            tags_changed = true;
        }
    }
    if tags_changed {
        match &args.state {
            Some(path) => {
                if let Err(e) = engine.tags.save(path) {
                    error!("{:#}", e);
                    std::process::exit(7);
                }
            }
            None => warn!("tag/theme changes are not persisted without --state"),
        }
    }

    // Filters, then view and grouping
    if let Some(text) = &args.search {
        engine.set_search(text);
    }
    if let Some(kind) = args.general {
        engine.set_general(Some(kind));
    }
    engine.set_uac_mode(args.uac_mode);
    for spec in &args.uac {
        engine.select_uac_flag(*spec);
    }
    for filter in &args.ldap {
        engine.select_ldap_attribute(filter.clone());
    }
    engine.switch_view(args.view);
    if args.group_by_groups {
        engine.toggle_grouping();
    }

    if !args.quiet {
        println!("{}", ASCII_TITLE.bold().green());
        println!("{}", render_summary(&engine));
    }

    if let Some(outdir) = &args.output {
        if let Err(e) = fs::create_dir_all(outdir) {
            error!(
                "failed to create output directory {}: {}",
                outdir.display(),
                e
            );
            std::process::exit(4);
        }
        let csv = outdir.join(EXPORT_FILENAME);
        if let Err(e) = save_table_csv(&engine, &csv, args.csv_scope) {
            error!("failed to write {}: {:#}", csv.display(), e);
            std::process::exit(5);
        }
        let html = outdir.join(report_filename(&args.files[0]));
        let title = args.files[0]
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Err(e) = save_report(&engine, &html, &title) {
            error!("failed to write {}: {:#}", html.display(), e);
            std::process::exit(6);
        }
    }

    if args.interactive {
        let mut session = Session::new(&mut engine);
        session.state_path = args.state.clone();
        session.export_scope = args.csv_scope;
        let stdin = io::stdin();
        if let Err(e) = session.run(stdin.lock(), io::stdout()) {
            error!("interactive session failed: {:#}", e);
            std::process::exit(8);
        }
    }
}
