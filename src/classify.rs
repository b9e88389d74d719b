//! User-agent classification
//!
//! Coarse browser/OS buckets from a `User-Agent` header, by ordered
//! substring matching. Table order is part of the contract: the first match
//! wins, so a broad signature listed early shadows more specific ones
//! further down (every Edge and Opera UA also carries `Chrome/`, and Android
//! UAs carry `Linux`). Keep the tables as ordered slices.

/// Value used when nothing matches.
pub const UNKNOWN: &str = "unknown";

/// Ordered `(label, signatures)` table; an entry matches when the user agent
/// contains any of its signatures.
pub type SignatureTable = &'static [(&'static str, &'static [&'static str])];

/// Browser signatures, checked in order.
pub const BROWSERS: SignatureTable = &[
    ("Chrome", &["Chrome/"]),
    ("Firefox", &["Firefox/"]),
    ("Safari", &["Safari/"]),
    ("Edge", &["Edg/"]),
    ("Opera", &["OPR/"]),
];

/// Operating system signatures, checked in order.
pub const OPERATING_SYSTEMS: SignatureTable = &[
    ("Windows", &["Windows NT"]),
    ("macOS", &["Mac OS X"]),
    ("Linux", &["Linux"]),
    ("Android", &["Android"]),
    ("iOS", &["iPhone", "iPad"]),
];

/// Browser and OS classification of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientInfo {
    /// Browser family, or `unknown`
    pub browser: &'static str,
    /// Operating system family, or `unknown`
    pub os: &'static str,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            browser: UNKNOWN,
            os: UNKNOWN,
        }
    }
}

/// Classify a user-agent string. Never fails; unmatched input is `unknown`.
///
/// ```
/// use lantern::classify::classify_user_agent;
///
/// let info = classify_user_agent("Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0");
/// assert_eq!(info.browser, "Firefox");
/// assert_eq!(info.os, "Linux");
/// ```
pub fn classify_user_agent(user_agent: &str) -> ClientInfo {
    ClientInfo {
        browser: first_match(BROWSERS, user_agent),
        os: first_match(OPERATING_SYSTEMS, user_agent),
    }
}

fn first_match(table: SignatureTable, user_agent: &str) -> &'static str {
    table
        .iter()
        .find(|(_, signatures)| signatures.iter().any(|sig| user_agent.contains(sig)))
        .map(|(label, _)| *label)
        .unwrap_or(UNKNOWN)
}
