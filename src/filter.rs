//! Filter state store.
//!
//! Holds the search text and the selections of every filter category. A
//! category is enabled exactly when its selection is non-empty, so there is no
//! separate flag that could go stale.
use std::fmt;
use std::str::FromStr;

use crate::record::{OPERATING_SYSTEM, SERVICE_PRINCIPAL_NAME};
use crate::uac::UacFlagSpec;

/// General filter chips. Only one can be active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum GeneralFilter {
    /// RID <= 1000
    Default,
    /// RID > 1000
    NonDefault,
    /// Created in the last 30 days
    RecentlyCreated,
    /// Last logon older than 90 days
    InactiveAccounts,
    /// logonCount is 0
    NeverLoggedIn,
    Owned,
    NonOwned,
}

impl GeneralFilter {
    pub fn label(self) -> &'static str {
        match self {
            GeneralFilter::Default => "Default objects",
            GeneralFilter::NonDefault => "Non-default objects",
            GeneralFilter::RecentlyCreated => "Recently created",
            GeneralFilter::InactiveAccounts => "Inactive accounts",
            GeneralFilter::NeverLoggedIn => "Never logged in",
            GeneralFilter::Owned => "Owned",
            GeneralFilter::NonOwned => "Non-owned",
        }
    }
}

/// How several selected UAC conditions combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum UacCombine {
    /// Every selected condition must hold
    #[default]
    All,
    /// At least one selected condition must hold
    Any,
}

/// One LDAP attribute chip.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LdapAttributeFilter {
    pub name: String,
    pub required_value: Option<String>,
    pub unsupported_os: bool,
}

pub const UNSUPPORTED_OS: &str = "unsupportedOS";

/// Attribute chips offered by the viewer.
pub const LDAP_PRESETS: &[(&str, &str)] = &[
    (SERVICE_PRINCIPAL_NAME, "Kerberoastable (SPN set, account enabled)"),
    ("adminCount=1", "Protected by AdminSDHolder"),
    ("msDS-AllowedToDelegateTo", "Constrained delegation"),
    ("description", "Has a description"),
    (UNSUPPORTED_OS, "End-of-life Windows version"),
];

impl LdapAttributeFilter {
    pub fn present(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required_value: None,
            unsupported_os: false,
        }
    }

    pub fn equals(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            required_value: Some(value.to_string()),
            unsupported_os: false,
        }
    }

    pub fn unsupported_os() -> Self {
        Self {
            name: OPERATING_SYSTEM.to_string(),
            required_value: None,
            unsupported_os: true,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("empty LDAP attribute name in {0:?}")]
pub struct LdapSpecError(pub String);

impl FromStr for LdapAttributeFilter {
    type Err = LdapSpecError;

    /// `name`, `name=value` or `unsupportedOS`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(UNSUPPORTED_OS) {
            return Ok(Self::unsupported_os());
        }
        let (name, value) = match s.split_once('=') {
            Some((n, v)) => (n.trim(), Some(v.trim())),
            None => (s, None),
        };
        if name.is_empty() {
            return Err(LdapSpecError(s.to_string()));
        }
        Ok(match value {
            Some(v) => Self::equals(name, v),
            None => Self::present(name),
        })
    }
}

impl fmt::Display for LdapAttributeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unsupported_os {
            return f.write_str(UNSUPPORTED_OS);
        }
        match &self.required_value {
            Some(v) => write!(f, "{}={}", self.name, v),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    search: String,
    general: Option<GeneralFilter>,
    uac: Vec<UacFlagSpec>,
    ldap: Vec<LdapAttributeFilter>,
    uac_mode: UacCombine,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, text: &str) {
        self.search = text.trim().to_string();
    }

    pub fn general(&self) -> Option<GeneralFilter> {
        self.general
    }

    /// Select `kind`, or deselect it when it is already the active chip.
    pub fn toggle_general(&mut self, kind: GeneralFilter) -> bool {
        if self.general == Some(kind) {
            self.general = None;
            false
        } else {
            self.general = Some(kind);
            true
        }
    }

    pub fn set_general(&mut self, kind: Option<GeneralFilter>) {
        self.general = kind;
    }

    pub fn uac_flags(&self) -> &[UacFlagSpec] {
        &self.uac
    }

    pub fn uac_mode(&self) -> UacCombine {
        self.uac_mode
    }

    pub fn set_uac_mode(&mut self, mode: UacCombine) {
        self.uac_mode = mode;
    }

    /// Toggle a UAC checkbox. Selecting the opposite polarity of an already
    /// selected bit replaces it. Returns whether `spec` is now selected.
    pub fn toggle_uac_flag(&mut self, spec: UacFlagSpec) -> bool {
        if let Some(pos) = self.uac.iter().position(|s| s.value == spec.value) {
            let existing = self.uac.remove(pos);
            if existing == spec {
                return false;
            }
        }
        self.uac.push(spec);
        true
    }

    /// Select a UAC condition without toggling. Selecting it twice is a no-op;
    /// an opposite polarity for the same bit is replaced.
    pub fn select_uac_flag(&mut self, spec: UacFlagSpec) {
        if !self.uac.contains(&spec) {
            self.toggle_uac_flag(spec);
        }
    }

    pub fn ldap_attributes(&self) -> &[LdapAttributeFilter] {
        &self.ldap
    }

    /// Toggle an LDAP attribute chip. Returns whether it is now selected.
    pub fn toggle_ldap_attribute(&mut self, filter: LdapAttributeFilter) -> bool {
        if let Some(pos) = self.ldap.iter().position(|f| *f == filter) {
            self.ldap.remove(pos);
            false
        } else {
            self.ldap.push(filter);
            true
        }
    }

    pub fn select_ldap_attribute(&mut self, filter: LdapAttributeFilter) {
        if !self.ldap.contains(&filter) {
            self.ldap.push(filter);
        }
    }

    pub fn search_enabled(&self) -> bool {
        !self.search.is_empty()
    }

    pub fn general_enabled(&self) -> bool {
        self.general.is_some()
    }

    pub fn uac_enabled(&self) -> bool {
        !self.uac.is_empty()
    }

    pub fn ldap_enabled(&self) -> bool {
        !self.ldap.is_empty()
    }

    pub fn is_active(&self) -> bool {
        self.search_enabled() || self.general_enabled() || self.uac_enabled() || self.ldap_enabled()
    }

    /// Reset every category, keeping the UAC combination mode.
    pub fn clear(&mut self) {
        let mode = self.uac_mode;
        *self = Self::default();
        self.uac_mode = mode;
    }

    /// Short human description of the active filters.
    pub fn describe(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.search_enabled() {
            out.push(format!("search: {:?}", self.search));
        }
        if let Some(g) = self.general {
            out.push(format!("general: {}", g.label()));
        }
        if self.uac_enabled() {
            let flags: Vec<String> = self.uac.iter().map(|s| s.to_string()).collect();
            let joiner = match self.uac_mode {
                UacCombine::All => " AND ",
                UacCombine::Any => " OR ",
            };
            out.push(format!("uac: {}", flags.join(joiner)));
        }
        if self.ldap_enabled() {
            let attrs: Vec<String> = self.ldap.iter().map(|f| f.to_string()).collect();
            out.push(format!("ldap: {}", attrs.join(" AND ")));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_is_idempotent() {
        let mut f = FilterState::new();
        f.select_uac_flag(UacFlagSpec::set(2));
        f.select_uac_flag(UacFlagSpec::set(2));
        assert_eq!(f.uac_flags(), &[UacFlagSpec::set(2)]);
        f.select_uac_flag(UacFlagSpec::clear(2));
        assert_eq!(f.uac_flags(), &[UacFlagSpec::clear(2)]);

        let spn = LdapAttributeFilter::present("servicePrincipalName");
        f.select_ldap_attribute(spn.clone());
        f.select_ldap_attribute(spn.clone());
        assert_eq!(f.ldap_attributes(), &[spn]);
    }

    #[test]
    fn categories_start_disabled() {
        let f = FilterState::new();
        assert!(!f.is_active());
        assert!(!f.uac_enabled());
        assert!(!f.ldap_enabled());
        assert!(!f.general_enabled());
    }

    #[test]
    fn enabled_tracks_selection() {
        let mut f = FilterState::new();
        assert!(f.toggle_uac_flag(UacFlagSpec::set(2)));
        assert!(f.uac_enabled());
        assert!(!f.toggle_uac_flag(UacFlagSpec::set(2)));
        assert!(!f.uac_enabled());

        assert!(f.toggle_ldap_attribute("adminCount=1".parse().unwrap()));
        assert!(f.ldap_enabled());
        assert!(!f.toggle_ldap_attribute(LdapAttributeFilter::equals("adminCount", "1")));
        assert!(!f.ldap_enabled());
    }

    #[test]
    fn opposite_polarity_replaces() {
        let mut f = FilterState::new();
        f.toggle_uac_flag(UacFlagSpec::set(2));
        assert!(f.toggle_uac_flag(UacFlagSpec::clear(2)));
        assert_eq!(f.uac_flags(), &[UacFlagSpec::clear(2)]);
    }

    #[test]
    fn general_chip_toggles_off() {
        let mut f = FilterState::new();
        assert!(f.toggle_general(GeneralFilter::Owned));
        assert!(f.toggle_general(GeneralFilter::NonOwned));
        assert_eq!(f.general(), Some(GeneralFilter::NonOwned));
        assert!(!f.toggle_general(GeneralFilter::NonOwned));
        assert_eq!(f.general(), None);
    }

    #[test]
    fn parses_ldap_specs() {
        assert_eq!(
            "unsupportedos".parse::<LdapAttributeFilter>().unwrap(),
            LdapAttributeFilter::unsupported_os()
        );
        assert_eq!(
            "description".parse::<LdapAttributeFilter>().unwrap(),
            LdapAttributeFilter::present("description")
        );
        assert!("=1".parse::<LdapAttributeFilter>().is_err());
    }

    #[test]
    fn clear_keeps_mode() {
        let mut f = FilterState::new();
        f.set_uac_mode(UacCombine::Any);
        f.set_search("admin");
        f.clear();
        assert!(!f.is_active());
        assert_eq!(f.uac_mode(), UacCombine::Any);
    }
}
