//! Client address anonymization
//!
//! Client addresses never reach metrics or logs. They are replaced by a
//! salted SHA-256 token truncated to 16 hex characters: stable for a given
//! (address, salt) pair so requests from one client still aggregate, and
//! not reversible without the salt.
//!
//! The salt comes from `IP_SALT`. When it is missing the built-in
//! [`DEFAULT_IP_SALT`] is used, which anyone can read in this source and use
//! to brute-force the small IPv4 space. Treat `IP_SALT` as required.

use sha2::{Digest, Sha256};

/// Fallback salt used when `IP_SALT` is not configured. Not secret.
pub const DEFAULT_IP_SALT: &str = "change-this-salt-in-production-2026";

/// Number of hex characters kept from the digest.
pub const TOKEN_LEN: usize = 16;

/// Hash `address` with `salt` into a short irreversible token.
///
/// The digest input is the address immediately followed by the salt. Never
/// fails, including for empty input.
///
/// ```
/// use lantern::anonymize::anonymize_ip;
///
/// let token = anonymize_ip("203.0.113.5", "abc");
/// assert_eq!(token.len(), 16);
/// assert_eq!(token, anonymize_ip("203.0.113.5", "abc"));
/// ```
pub fn anonymize_ip(address: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(address.as_bytes());
    hasher.update(salt.as_bytes());
    let digest = hasher.finalize();

    // 8 bytes -> 16 hex chars
    hex::encode(&digest[..TOKEN_LEN / 2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // sha256("203.0.113.5abc"), first 16 hex chars
        assert_eq!(anonymize_ip("203.0.113.5", "abc"), "bbe559046319537f");
    }

    #[test]
    fn test_empty_input() {
        // sha256("") = e3b0c44298fc1c14...
        assert_eq!(anonymize_ip("", ""), "e3b0c44298fc1c14");
    }

    #[test]
    fn test_deterministic_and_fixed_length() {
        for addr in ["127.0.0.1", "::1", "2001:db8::ff00:42:8329", ""] {
            let a = anonymize_ip(addr, "salt");
            assert_eq!(a, anonymize_ip(addr, "salt"));
            assert_eq!(a.len(), TOKEN_LEN);
            assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_distinct_addresses_differ() {
        let tokens: std::collections::HashSet<_> = (0..=255)
            .map(|i| anonymize_ip(&format!("10.0.0.{i}"), "salt"))
            .collect();
        assert_eq!(tokens.len(), 256);
    }

    #[test]
    fn test_salt_changes_token() {
        assert_ne!(anonymize_ip("10.0.0.1", "a"), anonymize_ip("10.0.0.1", "b"));
        assert_ne!(
            anonymize_ip("10.0.0.1", DEFAULT_IP_SALT),
            anonymize_ip("10.0.0.1", "")
        );
    }
}
