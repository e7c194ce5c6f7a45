//! Typed directory records and the attribute accessor shared by every render
//! target.
//!
//! A [`Record`] is one object from the dump (a "card" in the detail view). The
//! table view exposes the same data through [`crate::table::TableRowRef`]. Both
//! implement [`AttributeSource`], so predicates never care which one they see.
//! Empty values count as absent in both.
use std::collections::BTreeMap;

use crate::uac;

pub const USER_ACCOUNT_CONTROL: &str = "userAccountControl";
pub const SERVICE_PRINCIPAL_NAME: &str = "servicePrincipalName";
pub const OBJECT_SID: &str = "objectSid";
pub const MEMBER_OF: &str = "memberOf";
pub const PRIMARY_GROUP_ID: &str = "primaryGroupID";
pub const WHEN_CREATED: &str = "whenCreated";
pub const LAST_LOGON: &str = "lastLogon";
pub const LOGON_COUNT: &str = "logonCount";
pub const OPERATING_SYSTEM: &str = "operatingSystem";
pub const OBJECT_CLASS: &str = "objectClass";

/// Read-only view of one record, regardless of representation.
pub trait AttributeSource {
    /// Heading shown for the record (its distinguished name).
    fn display_name(&self) -> &str;

    /// Value of `name`, or `None` when missing or empty.
    fn attribute(&self, name: &str) -> Option<&str>;

    /// Every non-empty attribute in render order.
    fn attributes(&self) -> Box<dyn Iterator<Item = (&str, &str)> + '_>;

    /// Lower-cased text searched by the free-text filter.
    fn search_text(&self) -> &str;
}

/// Build the lower-cased search text for a record. The UAC cell is replaced by
/// its number followed by the decoded flag names.
pub fn build_search_text<'a>(
    display_name: &str,
    attributes: impl Iterator<Item = (&'a str, &'a str)>,
) -> String {
    let mut out = String::from(display_name);
    for (key, value) in attributes {
        out.push('\n');
        out.push_str(key);
        out.push('\n');
        if key == USER_ACCOUNT_CONTROL {
            out.push_str(&describe_uac(value));
        } else {
            out.push_str(value);
        }
    }
    out.to_lowercase()
}

/// `"514 ACCOUNTDISABLE, NORMAL_ACCOUNT"`, or the raw text if not numeric.
pub fn describe_uac(raw: &str) -> String {
    match uac::parse_uac(raw) {
        Some(v) => {
            let names = uac::decode(v);
            if names.is_empty() {
                v.to_string()
            } else {
                format!("{} {}", v, names.join(", "))
            }
        }
        None => raw.to_string(),
    }
}

/// One directory object as loaded from the dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub dn: String,
    attributes: BTreeMap<String, String>,
    search_text: String,
}

impl Record {
    pub fn new(dn: impl Into<String>, attributes: BTreeMap<String, String>) -> Self {
        let dn = dn.into();
        let search_text = build_search_text(
            &dn,
            attributes
                .iter()
                .filter(|(_, v)| !v.is_empty())
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
        Self {
            dn,
            attributes,
            search_text,
        }
    }

    /// Convenience constructor used by tests and small integrations.
    pub fn from_pairs(dn: &str, pairs: &[(&str, &str)]) -> Self {
        let attributes = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::new(dn, attributes)
    }

    /// Stable identifier used for tags.
    pub fn id(&self) -> &str {
        &self.dn
    }

    /// Attribute names including empty ones, used to build table headers.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Classification from `objectClass`, most specific first.
    pub fn kind(&self) -> ObjectKind {
        let classes = self.attribute(OBJECT_CLASS).unwrap_or_default().to_lowercase();
        if classes.contains("computer") {
            ObjectKind::Computer
        } else if classes.contains("group") {
            ObjectKind::Group
        } else if classes.contains("user") || classes.contains("person") {
            ObjectKind::User
        } else {
            ObjectKind::Other
        }
    }
}

impl AttributeSource for Record {
    fn display_name(&self) -> &str {
        &self.dn
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn attributes(&self) -> Box<dyn Iterator<Item = (&str, &str)> + '_> {
        Box::new(
            self.attributes
                .iter()
                .filter(|(_, v)| !v.is_empty())
                .map(|(k, v)| (k.as_str(), v.as_str())),
        )
    }

    fn search_text(&self) -> &str {
        &self.search_text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    User,
    Computer,
    Group,
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values_are_absent() {
        let r = Record::from_pairs("CN=A,DC=corp", &[("description", ""), ("cn", "A")]);
        assert_eq!(r.attribute("description"), None);
        assert_eq!(r.attribute("cn"), Some("A"));
        assert_eq!(r.attributes().count(), 1);
        assert_eq!(r.keys().count(), 2);
    }

    #[test]
    fn search_text_includes_decoded_uac() {
        let r = Record::from_pairs("CN=Svc,DC=corp", &[("userAccountControl", "514")]);
        assert!(r.search_text().contains("accountdisable"));
        assert!(r.search_text().contains("514"));
        assert!(r.search_text().starts_with("cn=svc"));
    }

    #[test]
    fn classifies_object_kind() {
        let c = Record::from_pairs("CN=WS1", &[("objectClass", "top, person, user, computer")]);
        let u = Record::from_pairs("CN=Bob", &[("objectClass", "top, person, user")]);
        let g = Record::from_pairs("CN=Admins", &[("objectClass", "top, group")]);
        assert_eq!(c.kind(), ObjectKind::Computer);
        assert_eq!(u.kind(), ObjectKind::User);
        assert_eq!(g.kind(), ObjectKind::Group);
        assert_eq!(Record::from_pairs("CN=X", &[]).kind(), ObjectKind::Other);
    }
}
