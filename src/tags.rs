//! Persisted analyst state: "owned" and "high value" tag sets plus the theme.
//!
//! Stored as one JSON object with a fixed key per item. The file is read at
//! startup and rewritten by the caller after every toggle.
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const OWNED_KEY: &str = "ldapviewer_owned";
pub const HIGH_VALUE_KEY: &str = "ldapviewer_highvalue";
pub const THEME_KEY: &str = "ldapviewer_theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Owned,
    HighValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagStore {
    #[serde(rename = "ldapviewer_owned", default)]
    owned: BTreeSet<String>,
    #[serde(rename = "ldapviewer_highvalue", default)]
    high_value: BTreeSet<String>,
    #[serde(rename = "ldapviewer_theme", default)]
    pub theme: Theme,
}

impl TagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`; a missing file yields an empty store.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("state file {} not found, starting empty", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read state file {}", path.display()))?;
        let store: TagStore = serde_json::from_str(&text)
            .with_context(|| format!("parse state file {}", path.display()))?;
        log::info!(
            "restored {} owned and {} high value tags from {}",
            store.owned.len(),
            store.high_value.len(),
            path.display()
        );
        Ok(store)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
            .with_context(|| format!("write state file {}", path.display()))?;
        Ok(())
    }

    fn set_mut(&mut self, tag: Tag) -> &mut BTreeSet<String> {
        match tag {
            Tag::Owned => &mut self.owned,
            Tag::HighValue => &mut self.high_value,
        }
    }

    fn set(&self, tag: Tag) -> &BTreeSet<String> {
        match tag {
            Tag::Owned => &self.owned,
            Tag::HighValue => &self.high_value,
        }
    }

    /// Flip `id` in the given set. Returns whether it is now tagged.
    pub fn toggle(&mut self, tag: Tag, id: &str) -> bool {
        let set = self.set_mut(tag);
        if set.remove(id) {
            false
        } else {
            set.insert(id.to_string());
            true
        }
    }

    pub fn has(&self, tag: Tag, id: &str) -> bool {
        self.set(tag).contains(id)
    }

    pub fn is_owned(&self, id: &str) -> bool {
        self.has(Tag::Owned, id)
    }

    pub fn is_high_value(&self, id: &str) -> bool {
        self.has(Tag::HighValue, id)
    }

    pub fn iter(&self, tag: Tag) -> impl Iterator<Item = &str> {
        self.set(tag).iter().map(String::as_str)
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.theme
    }
}
