//! Statistical summaries over the loaded records, shown by the stats view.
//!
//! Defines `BasicStats` (count and share of a bucket) and `Statistics`
//! aggregating the security-relevant buckets per object kind.
use chrono::{DateTime, Utc};

use crate::predicates::{EvalContext, general_filter, has_unsupported_os, is_kerberoastable};
use crate::filter::GeneralFilter;
use crate::record::{AttributeSource, ObjectKind, OPERATING_SYSTEM, Record, USER_ACCOUNT_CONTROL};
use crate::tags::TagStore;
use crate::uac;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BasicStats {
    pub count: usize,
    pub percentage: String,
}

fn pct(n: usize, d: usize) -> String {
    if d == 0 {
        return "0.00%".to_string();
    }
    format!("{:.2}%", (n as f64) / (d as f64) * 100.0)
}

fn bucket(n: usize, d: usize) -> BasicStats {
    BasicStats {
        count: n,
        percentage: pct(n, d),
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub total: usize,
    pub users: usize,
    pub computers: usize,
    pub groups: usize,
    pub other: usize,
    pub enabled_users: BasicStats,
    pub disabled_users: BasicStats,
    pub kerberoastable: BasicStats,
    pub asrep_roastable: BasicStats,
    pub password_never_expires: BasicStats,
    pub password_not_required: BasicStats,
    pub unconstrained_delegation: BasicStats,
    pub admin_count: BasicStats,
    pub never_logged_in: BasicStats,
    pub inactive: BasicStats,
    pub unsupported_os: BasicStats,
    pub owned: usize,
    pub high_value: usize,
}

fn uac_of(r: &Record) -> Option<u32> {
    r.attribute(USER_ACCOUNT_CONTROL).and_then(uac::parse_uac)
}

fn has_bit(r: &Record, bit: u32) -> bool {
    uac_of(r).is_some_and(|v| v & bit != 0)
}

pub fn calculate_statistics(
    records: &[Record],
    tags: &TagStore,
    now: DateTime<Utc>,
) -> Statistics {
    let ctx = EvalContext { now, tags };
    let mut s = Statistics {
        total: records.len(),
        ..Default::default()
    };
    let mut enabled = 0;
    let mut disabled = 0;
    let mut kerberoastable = 0;
    let mut asrep = 0;
    let mut never_expires = 0;
    let mut not_required = 0;
    let mut unconstrained = 0;
    let mut admin_count = 0;
    let mut never_logged_in = 0;
    let mut inactive = 0;
    let mut unsupported = 0;

    for r in records {
        let kind = r.kind();
        match kind {
            ObjectKind::User => s.users += 1,
            ObjectKind::Computer => s.computers += 1,
            ObjectKind::Group => s.groups += 1,
            ObjectKind::Other => s.other += 1,
        }
        if kind == ObjectKind::User {
            if has_bit(r, uac::ACCOUNTDISABLE) {
                disabled += 1;
            } else if uac_of(r).is_some() {
                enabled += 1;
            }
        }
        if is_kerberoastable(r) {
            kerberoastable += 1;
        }
        if has_bit(r, uac::DONT_REQ_PREAUTH) {
            asrep += 1;
        }
        if has_bit(r, uac::DONT_EXPIRE_PASSWORD) {
            never_expires += 1;
        }
        if has_bit(r, uac::PASSWD_NOTREQD) {
            not_required += 1;
        }
        if has_bit(r, uac::TRUSTED_FOR_DELEGATION) {
            unconstrained += 1;
        }
        if r.attribute("adminCount") == Some("1") {
            admin_count += 1;
        }
        if general_filter(r, GeneralFilter::NeverLoggedIn, &ctx) {
            never_logged_in += 1;
        }
        if general_filter(r, GeneralFilter::InactiveAccounts, &ctx) {
            inactive += 1;
        }
        if has_unsupported_os(r.attribute(OPERATING_SYSTEM)) {
            unsupported += 1;
        }
        if tags.is_owned(r.id()) {
            s.owned += 1;
        }
        if tags.is_high_value(r.id()) {
            s.high_value += 1;
        }
    }

    let n = s.total;
    s.enabled_users = bucket(enabled, s.users);
    s.disabled_users = bucket(disabled, s.users);
    s.kerberoastable = bucket(kerberoastable, n);
    s.asrep_roastable = bucket(asrep, n);
    s.password_never_expires = bucket(never_expires, n);
    s.password_not_required = bucket(not_required, n);
    s.unconstrained_delegation = bucket(unconstrained, n);
    s.admin_count = bucket(admin_count, n);
    s.never_logged_in = bucket(never_logged_in, n);
    s.inactive = bucket(inactive, n);
    s.unsupported_os = bucket(unsupported, s.computers);
    s
}
