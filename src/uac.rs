//! UserAccountControl flag catalogue.
//!
//! Names follow the constants documented for the `userAccountControl`
//! attribute. Used to decode raw values for searching and display, and to parse
//! flag selections such as `ACCOUNTDISABLE`, `!DONT_REQ_PREAUTH` or `0x2`.
use std::fmt;
use std::str::FromStr;

pub const SCRIPT: u32 = 0x0001;
pub const ACCOUNTDISABLE: u32 = 0x0002;
pub const LOCKOUT: u32 = 0x0010;
pub const PASSWD_NOTREQD: u32 = 0x0020;
pub const DONT_EXPIRE_PASSWORD: u32 = 0x10000;
pub const TRUSTED_FOR_DELEGATION: u32 = 0x80000;
pub const DONT_REQ_PREAUTH: u32 = 0x400000;

/// All known flags, lowest bit first.
pub const FLAGS: &[(&str, u32)] = &[
    ("SCRIPT", SCRIPT),
    ("ACCOUNTDISABLE", ACCOUNTDISABLE),
    ("HOMEDIR_REQUIRED", 0x0008),
    ("LOCKOUT", LOCKOUT),
    ("PASSWD_NOTREQD", PASSWD_NOTREQD),
    ("PASSWD_CANT_CHANGE", 0x0040),
    ("ENCRYPTED_TEXT_PWD_ALLOWED", 0x0080),
    ("TEMP_DUPLICATE_ACCOUNT", 0x0100),
    ("NORMAL_ACCOUNT", 0x0200),
    ("INTERDOMAIN_TRUST_ACCOUNT", 0x0800),
    ("WORKSTATION_TRUST_ACCOUNT", 0x1000),
    ("SERVER_TRUST_ACCOUNT", 0x2000),
    ("DONT_EXPIRE_PASSWORD", DONT_EXPIRE_PASSWORD),
    ("MNS_LOGON_ACCOUNT", 0x20000),
    ("SMARTCARD_REQUIRED", 0x40000),
    ("TRUSTED_FOR_DELEGATION", TRUSTED_FOR_DELEGATION),
    ("NOT_DELEGATED", 0x100000),
    ("USE_DES_KEY_ONLY", 0x200000),
    ("DONT_REQ_PREAUTH", DONT_REQ_PREAUTH),
    ("PASSWORD_EXPIRED", 0x800000),
    ("TRUSTED_TO_AUTH_FOR_DELEGATION", 0x1000000),
    ("PARTIAL_SECRETS_ACCOUNT", 0x4000000),
];

/// Parse a raw `userAccountControl` value. Accepts decimal or `0x` hex.
pub fn parse_uac(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        raw.parse().ok()
    }
}

/// Names of every known flag set in `value`.
pub fn decode(value: u32) -> Vec<&'static str> {
    FLAGS
        .iter()
        .filter(|(_, bit)| value & bit != 0)
        .map(|(name, _)| *name)
        .collect()
}

/// Flag name for a single bit, if known.
pub fn flag_name(bit: u32) -> Option<&'static str> {
    FLAGS.iter().find(|(_, b)| *b == bit).map(|(n, _)| *n)
}

/// One selected UAC condition: the bit must be set, or clear when `inverse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UacFlagSpec {
    pub value: u32,
    pub inverse: bool,
}

impl UacFlagSpec {
    pub fn set(value: u32) -> Self {
        Self {
            value,
            inverse: false,
        }
    }

    pub fn clear(value: u32) -> Self {
        Self {
            value,
            inverse: true,
        }
    }

    /// Whether `uac` satisfies this condition.
    pub fn holds(&self, uac: u32) -> bool {
        let set = uac & self.value != 0;
        set != self.inverse
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UacSpecError {
    #[error("unknown UAC flag: {0}")]
    UnknownFlag(String),
    #[error("UAC flag value must be non-zero")]
    Zero,
}

impl FromStr for UacFlagSpec {
    type Err = UacSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (inverse, body) = match s.strip_prefix('!') {
            Some(rest) => (true, rest.trim()),
            None => (false, s),
        };
        let value = match parse_uac(body) {
            Some(v) => v,
            None => FLAGS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(body))
                .map(|(_, v)| *v)
                .ok_or_else(|| UacSpecError::UnknownFlag(body.to_string()))?,
        };
        if value == 0 {
            return Err(UacSpecError::Zero);
        }
        Ok(Self { value, inverse })
    }
}

impl fmt::Display for UacFlagSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inverse {
            f.write_str("!")?;
        }
        match flag_name(self.value) {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#x}", self.value),
        }
    }
}
