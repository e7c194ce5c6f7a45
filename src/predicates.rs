//! Record predicates. Every function is total: missing or unparsable data is a
//! mismatch, never an error.
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use regex::Regex;

use crate::filter::{GeneralFilter, LdapAttributeFilter, UacCombine};
use crate::record::{
    AttributeSource, LAST_LOGON, LOGON_COUNT, OBJECT_SID, OPERATING_SYSTEM,
    SERVICE_PRINCIPAL_NAME, USER_ACCOUNT_CONTROL, WHEN_CREATED,
};
use crate::tags::TagStore;
use crate::uac::{self, UacFlagSpec};

/// RIDs up to this value are built-in/default objects.
pub const DEFAULT_RID_MAX: u32 = 1000;
pub const RECENTLY_CREATED_DAYS: i64 = 30;
pub const INACTIVE_DAYS: i64 = 90;
/// `lastLogon` value written for accounts that never logged on.
pub const AD_EPOCH: &str = "1601-01-01 00:00:00+00:00";

static UNSUPPORTED_OS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)2000|2003|2008|xp|vista|7|me").expect("static regex")
});

/// Inputs a predicate may need besides the record itself.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub now: DateTime<Utc>,
    pub tags: &'a TagStore,
}

/// Relative identifier: the integer after the last `-` of a SID.
pub fn rid_from_sid(sid: &str) -> Option<u32> {
    let (_, last) = sid.trim().rsplit_once('-')?;
    last.parse().ok()
}

/// Parse an AD timestamp such as `2023-04-01 10:00:00.123456+00:00`.
/// Sub-second precision is dropped; the value is read as UTC.
pub fn parse_ad_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    let text = match text.find('.') {
        Some(idx) => &text[..idx],
        None => text.strip_suffix("+00:00").unwrap_or(text),
    };
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

pub fn general_filter<S: AttributeSource + ?Sized>(
    record: &S,
    kind: GeneralFilter,
    ctx: &EvalContext<'_>,
) -> bool {
    match kind {
        GeneralFilter::Default => record_rid(record).is_some_and(|rid| rid <= DEFAULT_RID_MAX),
        GeneralFilter::NonDefault => record_rid(record).is_some_and(|rid| rid > DEFAULT_RID_MAX),
        GeneralFilter::RecentlyCreated => record
            .attribute(WHEN_CREATED)
            .and_then(parse_ad_date)
            .is_some_and(|created| {
                ctx.now - created <= TimeDelta::days(RECENTLY_CREATED_DAYS)
            }),
        GeneralFilter::InactiveAccounts => match record.attribute(LAST_LOGON) {
            Some(raw) if raw.trim() != AD_EPOCH => parse_ad_date(raw)
                .is_some_and(|last| ctx.now - last > TimeDelta::days(INACTIVE_DAYS)),
            _ => false,
        },
        GeneralFilter::NeverLoggedIn => record.attribute(LOGON_COUNT) == Some("0"),
        GeneralFilter::Owned => ctx.tags.is_owned(record.display_name()),
        GeneralFilter::NonOwned => !ctx.tags.is_owned(record.display_name()),
    }
}

fn record_rid<S: AttributeSource + ?Sized>(record: &S) -> Option<u32> {
    record.attribute(OBJECT_SID).and_then(rid_from_sid)
}

/// Test a raw `userAccountControl` value against the selected conditions.
/// An empty selection never matches.
pub fn has_uac_flags(raw: &str, specs: &[UacFlagSpec], mode: UacCombine) -> bool {
    let Some(value) = uac::parse_uac(raw) else {
        return false;
    };
    if specs.is_empty() {
        return false;
    }
    match mode {
        UacCombine::All => specs.iter().all(|s| s.holds(value)),
        UacCombine::Any => specs.iter().any(|s| s.holds(value)),
    }
}

/// Enabled account with a service principal name.
pub fn is_kerberoastable<S: AttributeSource + ?Sized>(record: &S) -> bool {
    let has_spn = record
        .attribute(SERVICE_PRINCIPAL_NAME)
        .is_some_and(|v| !v.trim().is_empty());
    let disabled = record
        .attribute(USER_ACCOUNT_CONTROL)
        .and_then(uac::parse_uac)
        .is_some_and(|v| v & uac::ACCOUNTDISABLE != 0);
    has_spn && !disabled
}

pub fn has_ldap_attribute<S: AttributeSource + ?Sized>(
    record: &S,
    name: &str,
    expected: Option<&str>,
) -> bool {
    if name == SERVICE_PRINCIPAL_NAME && expected.is_none() {
        return is_kerberoastable(record);
    }
    let Some(value) = record.attribute(name) else {
        return false;
    };
    match expected {
        None => !value.trim().is_empty(),
        Some(expected) => value == expected,
    }
}

/// End-of-life Windows version in an `operatingSystem` string. Plain
/// case-insensitive substring match, so attached forms such as `2008R2` or
/// `WindowsXP` count.
pub fn has_unsupported_os(os: Option<&str>) -> bool {
    match os {
        Some(text) if !text.trim().is_empty() => UNSUPPORTED_OS_RE.is_match(text),
        _ => false,
    }
}

/// Evaluate one LDAP attribute chip.
pub fn matches_ldap_filter<S: AttributeSource + ?Sized>(
    record: &S,
    filter: &LdapAttributeFilter,
) -> bool {
    if filter.unsupported_os {
        has_unsupported_os(record.attribute(OPERATING_SYSTEM))
    } else {
        has_ldap_attribute(record, &filter.name, filter.required_value.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::tags::Tag;
    use chrono::TimeZone;

    fn ctx(tags: &TagStore) -> EvalContext<'_> {
        EvalContext {
            now: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            tags,
        }
    }

    #[test]
    fn rid_extraction() {
        assert_eq!(rid_from_sid("S-1-5-21-1004336348-1177238915-682003330-1104"), Some(1104));
        assert_eq!(rid_from_sid("S-1-5-21-1-2-3-"), None);
        assert_eq!(rid_from_sid("S-1-5-21-1-2-3-abc"), None);
        assert_eq!(rid_from_sid("nodash"), None);
    }

    #[test]
    fn default_and_non_default_partition() {
        let tags = TagStore::new();
        let c = ctx(&tags);
        for sid in ["S-1-5-21-1-2-3-500", "S-1-5-21-1-2-3-1000", "S-1-5-21-1-2-3-1001"] {
            let r = Record::from_pairs("CN=X", &[("objectSid", sid)]);
            let d = general_filter(&r, GeneralFilter::Default, &c);
            let n = general_filter(&r, GeneralFilter::NonDefault, &c);
            assert!(d ^ n, "{sid}");
        }
        let none = Record::from_pairs("CN=X", &[]);
        assert!(!general_filter(&none, GeneralFilter::Default, &c));
        assert!(!general_filter(&none, GeneralFilter::NonDefault, &c));
    }

    #[test]
    fn date_parsing() {
        let a = parse_ad_date("2024-05-20 08:30:00.123456+00:00").unwrap();
        let b = parse_ad_date("2024-05-20 08:30:00+00:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, Utc.with_ymd_and_hms(2024, 5, 20, 8, 30, 0).unwrap());
        assert!(parse_ad_date("yesterday").is_none());
        assert!(parse_ad_date("").is_none());
    }

    #[test]
    fn time_based_filters() {
        let tags = TagStore::new();
        let c = ctx(&tags);
        let fresh = Record::from_pairs("CN=New", &[("whenCreated", "2024-05-20 08:30:00+00:00")]);
        let old = Record::from_pairs(
            "CN=Old",
            &[
                ("whenCreated", "2020-01-01 00:00:00+00:00"),
                ("lastLogon", "2023-01-01 00:00:00.5+00:00"),
            ],
        );
        let never = Record::from_pairs(
            "CN=Never",
            &[("lastLogon", AD_EPOCH), ("logonCount", "0")],
        );
        assert!(general_filter(&fresh, GeneralFilter::RecentlyCreated, &c));
        assert!(!general_filter(&old, GeneralFilter::RecentlyCreated, &c));
        assert!(general_filter(&old, GeneralFilter::InactiveAccounts, &c));
        assert!(!general_filter(&never, GeneralFilter::InactiveAccounts, &c));
        assert!(!general_filter(&fresh, GeneralFilter::InactiveAccounts, &c));
        assert!(general_filter(&never, GeneralFilter::NeverLoggedIn, &c));
        assert!(!general_filter(&old, GeneralFilter::NeverLoggedIn, &c));

        // Exactly thirty days old is still recent; one second more is not.
        let boundary = Record::from_pairs("CN=Edge", &[("whenCreated", "2024-05-02 12:00:00+00:00")]);
        let past = Record::from_pairs("CN=Past", &[("whenCreated", "2024-05-02 11:59:59+00:00")]);
        assert!(general_filter(&boundary, GeneralFilter::RecentlyCreated, &c));
        assert!(!general_filter(&past, GeneralFilter::RecentlyCreated, &c));

        // Sentinel and unparsable lastLogon are never inactive.
        let sentinel = Record::from_pairs(
            "CN=Sentinel",
            &[("whenCreated", "2020-01-01 00:00:00+00:00"), ("lastLogon", AD_EPOCH)],
        );
        let garbled = Record::from_pairs("CN=Garbled", &[("lastLogon", "not a date")]);
        assert!(!general_filter(&sentinel, GeneralFilter::InactiveAccounts, &c));
        assert!(!general_filter(&garbled, GeneralFilter::InactiveAccounts, &c));
    }

    #[test]
    fn owned_uses_tags() {
        let mut tags = TagStore::new();
        tags.toggle(Tag::Owned, "CN=A");
        let c = ctx(&tags);
        let a = Record::from_pairs("CN=A", &[]);
        let b = Record::from_pairs("CN=B", &[]);
        assert!(general_filter(&a, GeneralFilter::Owned, &c));
        assert!(!general_filter(&b, GeneralFilter::Owned, &c));
        assert!(general_filter(&b, GeneralFilter::NonOwned, &c));
    }

    #[test]
    fn uac_flags() {
        let disabled = [UacFlagSpec::set(2)];
        assert!(has_uac_flags("514", &disabled, UacCombine::All));
        assert!(!has_uac_flags("512", &disabled, UacCombine::All));
        assert!(!has_uac_flags("garbage", &disabled, UacCombine::All));
        assert!(has_uac_flags("512", &[UacFlagSpec::clear(2)], UacCombine::All));

        let both = [UacFlagSpec::set(2), UacFlagSpec::set(uac::DONT_REQ_PREAUTH)];
        assert!(!has_uac_flags("514", &both, UacCombine::All));
        assert!(has_uac_flags("514", &both, UacCombine::Any));
        assert!(has_uac_flags("4194818", &both, UacCombine::All));
    }

    #[test]
    fn kerberoastable() {
        let enabled = Record::from_pairs(
            "CN=svc",
            &[("servicePrincipalName", "MSSQLSvc/db:1433"), ("userAccountControl", "512")],
        );
        let disabled = Record::from_pairs(
            "CN=svc2",
            &[("servicePrincipalName", "MSSQLSvc/db:1433"), ("userAccountControl", "514")],
        );
        let no_spn = Record::from_pairs("CN=bob", &[("userAccountControl", "512")]);
        assert!(is_kerberoastable(&enabled));
        assert!(!is_kerberoastable(&disabled));
        assert!(!is_kerberoastable(&no_spn));
        assert!(has_ldap_attribute(&enabled, SERVICE_PRINCIPAL_NAME, None));
        assert!(!has_ldap_attribute(&disabled, SERVICE_PRINCIPAL_NAME, None));
        assert!(has_ldap_attribute(
            &disabled,
            SERVICE_PRINCIPAL_NAME,
            Some("MSSQLSvc/db:1433")
        ));
    }

    #[test]
    fn ldap_attribute_presence_and_equality() {
        let r = Record::from_pairs("CN=a", &[("adminCount", "1"), ("description", "")]);
        assert!(has_ldap_attribute(&r, "adminCount", None));
        assert!(has_ldap_attribute(&r, "adminCount", Some("1")));
        assert!(!has_ldap_attribute(&r, "adminCount", Some("0")));
        assert!(!has_ldap_attribute(&r, "description", None));
        assert!(!has_ldap_attribute(&r, "msDS-AllowedToDelegateTo", None));
    }

    #[test]
    fn unsupported_os() {
        assert!(has_unsupported_os(Some("Windows Server 2008 R2 Standard")));
        assert!(has_unsupported_os(Some("Windows XP Professional")));
        assert!(has_unsupported_os(Some("windows vista")));
        assert!(has_unsupported_os(Some("Windows 7 Enterprise")));
        assert!(!has_unsupported_os(Some("Windows Server 2019 Standard")));
        assert!(has_unsupported_os(Some("Windows Server 2008R2")));
        assert!(has_unsupported_os(Some("WindowsXP")));
        assert!(has_unsupported_os(Some("Windows Server 2003R2 Enterprise")));
        // "Home" contains "me".
        assert!(has_unsupported_os(Some("Windows 10 Home")));
        assert!(!has_unsupported_os(Some("Windows 10 Pro")));
        assert!(!has_unsupported_os(Some("")));
        assert!(!has_unsupported_os(None));
    }
}
