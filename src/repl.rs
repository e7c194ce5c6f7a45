//! Line-oriented interactive mode.
//!
//! Each input line is one UI event. Commands mutate the engine and print the
//! refreshed view; tag and theme changes are persisted straight away when a
//! state file is configured.
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use anyhow::Result;
use clap::ValueEnum;

use crate::engine::Engine;
use crate::export::{EXPORT_FILENAME, ExportScope, save_table_csv};
use crate::filter::{GeneralFilter, LDAP_PRESETS, LdapAttributeFilter, UacCombine};
use crate::report::render_summary;
use crate::tags::Tag;
use crate::uac::{self, UacFlagSpec};
use crate::view::View;

pub const HELP: &str = "\
commands:
  search <text>            free-text search (empty clears)
  general <kind>|off       default, non-default, recently-created, inactive-accounts,
                           never-logged-in, owned, non-owned
  uac <flag>               toggle a UAC condition, prefix with ! for 'not set'
  uac-mode all|any         how several UAC conditions combine
  ldap <attr>[=<value>]    toggle an LDAP attribute filter (or unsupportedOS)
  clear                    disable every filter
  view detail|table|stats  switch view
  group                    toggle group-by-groups (detail view)
  expand | collapse        expand or collapse all cards
  owned <dn>               toggle the owned tag
  highvalue <dn>           toggle the high value tag
  theme                    toggle light/dark
  show                     print the current view
  export [path]            write the table as CSV
  flags | presets          list UAC flags or LDAP attribute presets
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search(String),
    General(Option<GeneralFilter>),
    Uac(UacFlagSpec),
    UacMode(UacCombine),
    Ldap(LdapAttributeFilter),
    Clear,
    View(View),
    Group,
    Expand,
    Collapse,
    Owned(String),
    HighValue(String),
    Theme,
    Show,
    Export(Option<PathBuf>),
    Flags,
    Presets,
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0} (try 'help')")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("invalid argument for '{0}': {1}")]
    InvalidArgument(&'static str, String),
}

fn value_enum<T: ValueEnum>(cmd: &'static str, arg: &str) -> Result<T, CommandError> {
    T::from_str(arg, true).map_err(|e| CommandError::InvalidArgument(cmd, e))
}

fn required<'a>(cmd: &'static str, arg: &'a str) -> Result<&'a str, CommandError> {
    if arg.is_empty() {
        Err(CommandError::MissingArgument(cmd))
    } else {
        Ok(arg)
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, arg) = match line.split_once(char::is_whitespace) {
            Some((w, a)) => (w, a.trim()),
            None => (line, ""),
        };
        Ok(match word.to_ascii_lowercase().as_str() {
            "search" | "s" => Command::Search(arg.to_string()),
            "general" | "g" => match required("general", arg)? {
                "off" | "none" => Command::General(None),
                kind => Command::General(Some(value_enum("general", kind)?)),
            },
            "uac" | "u" => Command::Uac(
                required("uac", arg)?
                    .parse()
                    .map_err(|e: uac::UacSpecError| CommandError::InvalidArgument("uac", e.to_string()))?,
            ),
            "uac-mode" => Command::UacMode(value_enum("uac-mode", required("uac-mode", arg)?)?),
            "ldap" | "l" => Command::Ldap(
                required("ldap", arg)?
                    .parse()
                    .map_err(|e: crate::filter::LdapSpecError| {
                        CommandError::InvalidArgument("ldap", e.to_string())
                    })?,
            ),
            "clear" => Command::Clear,
            "view" | "v" => Command::View(value_enum("view", required("view", arg)?)?),
            "group" => Command::Group,
            "expand" => Command::Expand,
            "collapse" => Command::Collapse,
            "owned" => Command::Owned(required("owned", arg)?.to_string()),
            "highvalue" | "high-value" => {
                Command::HighValue(required("highvalue", arg)?.to_string())
            }
            "theme" => Command::Theme,
            "show" | "" => Command::Show,
            "export" => Command::Export((!arg.is_empty()).then(|| PathBuf::from(arg))),
            "flags" => Command::Flags,
            "presets" => Command::Presets,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        })
    }
}

/// Interactive session around an engine.
pub struct Session<'a> {
    pub engine: &'a mut Engine,
    pub state_path: Option<PathBuf>,
    pub export_scope: ExportScope,
}

impl<'a> Session<'a> {
    pub fn new(engine: &'a mut Engine) -> Self {
        Self {
            engine,
            state_path: None,
            export_scope: ExportScope::default(),
        }
    }

    fn persist(&self) -> Result<()> {
        if let Some(path) = &self.state_path {
            self.engine.tags.save(path)?;
        }
        Ok(())
    }

    fn counter_line(&self) -> String {
        self.engine.counter().to_string()
    }

    /// Run one command and return the text to print. `None` means quit.
    pub fn execute(&mut self, cmd: Command) -> Result<Option<String>> {
        let out = match cmd {
            Command::Search(text) => {
                // A submitted line is a finished burst of keystrokes: feed it
                // through the debouncer and settle at its deadline.
                self.engine.on_search_input(&text, Instant::now());
                if let Some(deadline) = self.engine.search_deadline() {
                    self.engine.tick(deadline);
                }
                self.counter_line()
            }
            Command::General(kind) => {
                self.engine.set_general(kind);
                self.counter_line()
            }
            Command::Uac(spec) => {
                self.engine.toggle_uac_flag(spec);
                self.counter_line()
            }
            Command::UacMode(mode) => {
                self.engine.set_uac_mode(mode);
                self.counter_line()
            }
            Command::Ldap(filter) => {
                self.engine.toggle_ldap_attribute(filter);
                self.counter_line()
            }
            Command::Clear => {
                self.engine.clear_filters();
                self.counter_line()
            }
            Command::View(view) => {
                self.engine.switch_view(view);
                render_summary(self.engine)
            }
            Command::Group => {
                let on = self.engine.toggle_grouping();
                format!(
                    "group by groups: {} ({})",
                    if on { "on" } else { "off" },
                    self.counter_line()
                )
            }
            Command::Expand => {
                self.engine.expand_all();
                "expanded all cards".to_string()
            }
            Command::Collapse => {
                self.engine.collapse_all();
                "collapsed all cards".to_string()
            }
            Command::Owned(id) => {
                let on = self.engine.toggle_tag(Tag::Owned, &id);
                self.persist()?;
                format!("{} {} owned", id, if on { "marked" } else { "unmarked" })
            }
            Command::HighValue(id) => {
                let on = self.engine.toggle_tag(Tag::HighValue, &id);
                self.persist()?;
                format!("{} {} high value", id, if on { "marked" } else { "unmarked" })
            }
            Command::Theme => {
                let theme = self.engine.toggle_theme();
                self.persist()?;
                format!("theme: {}", theme)
            }
            Command::Show => render_summary(self.engine),
            Command::Export(path) => {
                let path = path.unwrap_or_else(|| PathBuf::from(EXPORT_FILENAME));
                let n = save_table_csv(self.engine, &path, self.export_scope)?;
                format!("exported {} rows to {}", n, path.display())
            }
            Command::Flags => uac::FLAGS
                .iter()
                .map(|(name, value)| format!("{:#010x} {}", value, name))
                .collect::<Vec<_>>()
                .join("\n"),
            Command::Presets => LDAP_PRESETS
                .iter()
                .map(|(spec, label)| format!("{:<28} {}", spec, label))
                .collect::<Vec<_>>()
                .join("\n"),
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok(None),
        };
        Ok(Some(out))
    }

    /// Read commands until EOF or `quit`. Errors in single commands are
    /// reported and the loop continues.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> Result<()> {
        writeln!(output, "{}", self.counter_line())?;
        for line in input.lines() {
            let line = line?;
            let cmd = match line.parse::<Command>() {
                Ok(cmd) => cmd,
                Err(e) => {
                    writeln!(output, "error: {}", e)?;
                    continue;
                }
            };
            match self.execute(cmd) {
                Ok(Some(text)) => writeln!(output, "{}", text)?,
                Ok(None) => break,
                Err(e) => {
                    log::error!("{:#}", e);
                    writeln!(output, "error: {:#}", e)?;
                }
            }
        }
        Ok(())
    }
}
