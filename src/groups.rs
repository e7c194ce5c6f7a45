//! Group-by projection of the detail view.
//!
//! Group names come from `memberOf` CN fragments and from the well-known
//! meaning of `primaryGroupID`. A record belongs to every group it names; one
//! with none lands in the ungrouped section, which is always listed first.
use std::collections::{BTreeMap, HashSet};

use crate::record::{AttributeSource, MEMBER_OF, PRIMARY_GROUP_ID, Record};

/// Fragments that show up as `CN=` components of container paths rather
/// than as groups.
const EXCLUDED_GROUPS: &[&str] = &["Users", "Builtin"];

/// Well-known domain group RIDs.
pub const WELL_KNOWN_GROUPS: &[(u32, &str)] = &[
    (512, "Domain Admins"),
    (513, "Domain Users"),
    (514, "Domain Guests"),
    (515, "Domain Computers"),
    (516, "Domain Controllers"),
    (517, "Cert Publishers"),
    (518, "Schema Admins"),
    (519, "Enterprise Admins"),
    (520, "Group Policy Creator Owners"),
    (521, "Read-only Domain Controllers"),
    (522, "Cloneable Domain Controllers"),
    (525, "Protected Users"),
    (526, "Key Admins"),
    (527, "Enterprise Key Admins"),
];

pub const UNGROUPED_LABEL: &str = "Ungrouped";

pub fn primary_group_name(id: u32) -> String {
    WELL_KNOWN_GROUPS
        .iter()
        .find(|(rid, _)| *rid == id)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("Primary Group ({})", id))
}

fn is_excluded(name: &str) -> bool {
    EXCLUDED_GROUPS.contains(&name)
}

/// Group names of one record, in discovery order, without duplicates.
pub fn group_names<S: AttributeSource + ?Sized>(record: &S) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    if let Some(member_of) = record.attribute(MEMBER_OF) {
        for fragment in member_of.split(',') {
            let fragment = fragment.trim();
            let Some(prefix) = fragment.get(..3) else {
                continue;
            };
            if !prefix.eq_ignore_ascii_case("CN=") {
                continue;
            }
            let name = fragment[3..].trim();
            if name.is_empty() || is_excluded(name) || names.iter().any(|n| n == name) {
                continue;
            }
            names.push(name.to_string());
        }
    }
    if let Some(id) = record
        .attribute(PRIMARY_GROUP_ID)
        .and_then(|v| v.trim().parse::<u32>().ok())
    {
        let name = primary_group_name(id);
        if !is_excluded(&name) && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// One rendered card: a record reference plus its runtime display state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Card {
    pub record: usize,
    pub hidden: bool,
    pub expanded: bool,
}

impl Card {
    pub fn new(record: usize) -> Self {
        Self {
            record,
            hidden: false,
            expanded: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKey {
    Ungrouped,
    Named(String),
}

impl GroupKey {
    pub fn label(&self) -> &str {
        match self {
            GroupKey::Ungrouped => UNGROUPED_LABEL,
            GroupKey::Named(n) => n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSection {
    /// Synthetic per-build identifier, e.g. `group-3`.
    pub id: String,
    pub key: GroupKey,
    pub cards: Vec<Card>,
    pub visible_count: usize,
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupProjection {
    pub sections: Vec<GroupSection>,
}

impl GroupProjection {
    /// Number of members of the named group (ungrouped when `None`).
    pub fn len_of(&self, name: Option<&str>) -> usize {
        self.sections
            .iter()
            .find(|s| match (&s.key, name) {
                (GroupKey::Ungrouped, None) => true,
                (GroupKey::Named(n), Some(want)) => n == want,
                _ => false,
            })
            .map_or(0, |s| s.cards.len())
    }

    pub fn cards_mut(&mut self) -> impl Iterator<Item = &mut Card> {
        self.sections.iter_mut().flat_map(|s| s.cards.iter_mut())
    }
}

/// Project `cards` into per-group sections. Members keep the relative order
/// of `cards`; a second card with the same display name in a group is dropped.
pub fn build_groups(cards: &[Card], records: &[Record]) -> GroupProjection {
    let mut named: BTreeMap<String, (Vec<Card>, HashSet<&str>)> = BTreeMap::new();
    let mut ungrouped: Vec<Card> = Vec::new();
    let mut ungrouped_seen: HashSet<&str> = HashSet::new();

    for card in cards {
        let Some(record) = records.get(card.record) else {
            continue;
        };
        let names = group_names(record);
        if names.is_empty() {
            if ungrouped_seen.insert(record.display_name()) {
                ungrouped.push(*card);
            }
            continue;
        }
        for name in names {
            let (members, seen) = named.entry(name).or_default();
            if seen.insert(record.display_name()) {
                members.push(*card);
            }
        }
    }

    let mut sections = Vec::with_capacity(named.len() + 1);
    if !ungrouped.is_empty() {
        sections.push((GroupKey::Ungrouped, ungrouped));
    }
    sections.extend(
        named
            .into_iter()
            .map(|(name, (members, _))| (GroupKey::Named(name), members)),
    );

    let sections = sections
        .into_iter()
        .enumerate()
        .map(|(i, (key, cards))| GroupSection {
            id: format!("group-{}", i),
            key,
            visible_count: cards.iter().filter(|c| !c.hidden).count(),
            hidden: false,
            cards,
        })
        .collect();
    GroupProjection { sections }
}

/// Layout of the detail view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailLayout {
    Flat(Vec<Card>),
    Grouped {
        projection: GroupProjection,
        /// Flat cards as they were when grouping was switched on.
        snapshot: Vec<Card>,
    },
}

impl DetailLayout {
    pub fn new(record_count: usize) -> Self {
        DetailLayout::Flat((0..record_count).map(Card::new).collect())
    }

    pub fn is_grouped(&self) -> bool {
        matches!(self, DetailLayout::Grouped { .. })
    }

    /// Switch between flat and grouped. Returns whether grouping is now on.
    pub fn toggle(&mut self, records: &[Record]) -> bool {
        let next = match self {
            DetailLayout::Flat(cards) => {
                let snapshot = cards.clone();
                let projection = build_groups(&snapshot, records);
                log::debug!("grouped detail view into {} sections", projection.sections.len());
                DetailLayout::Grouped {
                    projection,
                    snapshot,
                }
            }
            DetailLayout::Grouped { snapshot, .. } => DetailLayout::Flat(std::mem::take(snapshot)),
        };
        *self = next;
        self.is_grouped()
    }

    pub fn cards_mut(&mut self) -> Box<dyn Iterator<Item = &mut Card> + '_> {
        match self {
            DetailLayout::Flat(cards) => Box::new(cards.iter_mut()),
            DetailLayout::Grouped { projection, .. } => Box::new(projection.cards_mut()),
        }
    }

    pub fn cards(&self) -> Box<dyn Iterator<Item = &Card> + '_> {
        match self {
            DetailLayout::Flat(cards) => Box::new(cards.iter()),
            DetailLayout::Grouped { projection, .. } => Box::new(
                projection.sections.iter().flat_map(|s| s.cards.iter()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(dn: &str, member_of: &str, primary: &str) -> Record {
        Record::from_pairs(dn, &[("memberOf", member_of), ("primaryGroupID", primary)])
    }

    #[test]
    fn names_from_member_of_and_primary_group() {
        let r = rec(
            "CN=Alice,CN=Users,DC=corp",
            "CN=IT Staff,CN=Users,DC=corp,DC=local, CN=VPN,OU=Groups,DC=corp,DC=local",
            "513",
        );
        assert_eq!(group_names(&r), vec!["IT Staff", "VPN", "Domain Users"]);
    }

    #[test]
    fn builtin_and_duplicates_are_dropped() {
        let r = rec(
            "CN=Bob",
            "CN=Administrators,CN=Builtin,DC=corp, cn=Domain Admins,CN=Users,DC=corp",
            "512",
        );
        assert_eq!(group_names(&r), vec!["Administrators", "Domain Admins"]);
    }

    #[test]
    fn unknown_primary_group() {
        let r = Record::from_pairs("CN=X", &[("primaryGroupID", "1105")]);
        assert_eq!(group_names(&r), vec!["Primary Group (1105)"]);
        assert_eq!(primary_group_name(516), "Domain Controllers");
        assert!(group_names(&Record::from_pairs("CN=Y", &[])).is_empty());
    }

    #[test]
    fn build_groups_orders_sections_and_dedups() {
        let records = vec![
            rec("CN=A", "CN=Zeta,DC=x", "513"),
            Record::from_pairs("CN=Lonely", &[]),
            rec("CN=B", "CN=Alpha,DC=x", ""),
            rec("CN=A", "CN=Zeta,DC=x", ""),
        ];
        let cards: Vec<Card> = (0..records.len()).map(Card::new).collect();
        let p = build_groups(&cards, &records);
        let labels: Vec<&str> = p.sections.iter().map(|s| s.key.label()).collect();
        assert_eq!(labels, vec![UNGROUPED_LABEL, "Alpha", "Domain Users", "Zeta"]);
        assert_eq!(p.len_of(Some("Zeta")), 1);
        assert_eq!(p.len_of(None), 1);
        assert_eq!(p.sections[0].id, "group-0");
    }

    #[test]
    fn toggle_round_trip_restores_flat_cards() {
        let records = vec![rec("CN=A", "CN=G1,DC=x", ""), rec("CN=B", "", "")];
        let mut layout = DetailLayout::new(records.len());
        if let DetailLayout::Flat(cards) = &mut layout {
            cards[1].hidden = true;
            cards[0].expanded = false;
        }
        let before = layout.clone();
        assert!(layout.toggle(&records));
        assert!(layout.is_grouped());
        assert!(!layout.toggle(&records));
        assert_eq!(layout, before);
    }
}
