//! Label normalization
//!
//! Every request-derived label value passes through one of these functions
//! before reaching the registry. Each has a bounded output domain, which is
//! what keeps the number of series finite no matter what traffic looks like.

use std::borrow::Cow;

/// Placeholder substituted for identifier path segments.
pub const ID_PLACEHOLDER: &str = ":id";

/// Route label for a request.
///
/// Prefers the router's matched route pattern (already low-cardinality),
/// falling back to [`normalize_path`] on the raw path. The fallback only
/// bounds numeric and UUID segments.
///
/// ```
/// use lantern::metrics::normalize_route;
///
/// assert_eq!(normalize_route("/users/42", Some("/users/{id}")), "/users/{id}");
/// assert_eq!(normalize_route("/users/42", None), "/users/:id");
/// ```
pub fn normalize_route<'a>(path: &'a str, matched: Option<&'a str>) -> Cow<'a, str> {
    match matched {
        Some(pattern) => Cow::Borrowed(pattern),
        None => normalize_path(path),
    }
}

/// Normalize a request path for metrics labeling.
///
/// UUID segments (8-4-4-4-12 hex, any case) and purely numeric segments are
/// replaced with `:id`. Every other segment, including empty ones from
/// leading or trailing slashes, is kept as is, so the function is idempotent.
///
/// ```
/// use lantern::metrics::normalize_path;
///
/// assert_eq!(normalize_path("/api/v1/jobs/550e8400-e29b-41d4-a716-446655440000"), "/api/v1/jobs/:id");
/// assert_eq!(normalize_path("/users/12345/profile"), "/users/:id/profile");
/// assert_eq!(normalize_path("/users/:id/profile"), "/users/:id/profile");
/// ```
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if !path.split('/').any(is_identifier) {
        return Cow::Borrowed(path);
    }

    let normalized: Vec<&str> = path
        .split('/')
        .map(|seg| if is_identifier(seg) { ID_PLACEHOLDER } else { seg })
        .collect();
    Cow::Owned(normalized.join("/"))
}

fn is_identifier(segment: &str) -> bool {
    is_uuid(segment) || is_numeric(segment)
}

/// Check if a string looks like a UUID (8-4-4-4-12 hex pattern).
fn is_uuid(s: &str) -> bool {
    if s.len() != 36 {
        return false;
    }

    let expected_lengths = [8, 4, 4, 4, 12];
    let mut parts = 0;
    for (part, expected_len) in s.split('-').zip(expected_lengths) {
        if part.len() != expected_len || !part.chars().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }
        parts += 1;
    }

    parts == expected_lengths.len()
}

/// Check if a string is purely numeric.
fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Method label: one of the standard HTTP methods, or `OTHER`.
pub fn normalize_method(method: &str) -> &str {
    match method {
        "GET" | "HEAD" | "POST" | "PUT" | "DELETE" | "CONNECT" | "OPTIONS" | "TRACE"
        | "PATCH" => method,
        _ => "OTHER",
    }
}

/// Country label: a two-character code, upper-cased, or `unknown`.
///
/// Accepts codes like `US`, `XX` (unknown to the proxy) and `T1` (Tor).
pub fn normalize_country(country: Option<&str>) -> String {
    match country.map(str::trim) {
        Some(code) if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphanumeric()) => {
            code.to_ascii_uppercase()
        }
        _ => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        assert_eq!(
            normalize_path("/api/v1/jobs/550e8400-e29b-41d4-a716-446655440000"),
            "/api/v1/jobs/:id"
        );
        assert_eq!(
            normalize_path("/jobs/ABCDEF12-3456-7890-ABCD-EF1234567890/status"),
            "/jobs/:id/status"
        );
    }

    #[test]
    fn test_normalize_path_numeric() {
        assert_eq!(normalize_path("/users/12345/profile"), "/users/:id/profile");
        assert_eq!(normalize_path("/items/0/details"), "/items/:id/details");
        assert_eq!(normalize_path("/a/1/b/2"), "/a/:id/b/:id");
    }

    #[test]
    fn test_normalize_path_leaves_other_segments() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
        assert_eq!(normalize_path("/api/health/"), "/api/health/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "");
        assert_eq!(normalize_path("/users/12a45"), "/users/12a45");
        assert_eq!(normalize_path("/v2/items"), "/v2/items");
    }

    #[test]
    fn test_normalize_path_idempotent() {
        for path in [
            "/users/42/posts/550e8400-e29b-41d4-a716-446655440000",
            "/api/items/7/",
            "/static/app.js",
            "//9//",
        ] {
            let once = normalize_path(path).into_owned();
            assert_eq!(normalize_path(&once), once);
        }
    }

    #[test]
    fn test_normalize_path_borrows_when_unchanged() {
        assert!(matches!(normalize_path("/about"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_normalize_route_prefers_pattern() {
        assert_eq!(normalize_route("/users/42", Some("/users/{id}")), "/users/{id}");
        assert_eq!(normalize_route("/users/42", None), "/users/:id");
    }

    #[test]
    fn test_is_uuid() {
        assert!(is_uuid("550e8400-e29b-41d4-a716-446655440000"));
        assert!(is_uuid("ABCDEF12-3456-7890-ABCD-EF1234567890"));
        assert!(!is_uuid("not-a-uuid"));
        assert!(!is_uuid("550e8400-e29b-41d4-a716-44665544000")); // Too short
        assert!(!is_uuid("550e8400-e29b-41d4-a716-4466554400000")); // Too long
        assert!(!is_uuid("550e8400e29b-41d4-a716-4466554400000-")); // Dashes misplaced
        assert!(!is_uuid("g50e8400-e29b-41d4-a716-446655440000"));
    }

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric("12345"));
        assert!(is_numeric("0"));
        assert!(!is_numeric(""));
        assert!(!is_numeric("12a45"));
        assert!(!is_numeric("-1"));
    }

    #[test]
    fn test_normalize_method() {
        assert_eq!(normalize_method("GET"), "GET");
        assert_eq!(normalize_method("PATCH"), "PATCH");
        assert_eq!(normalize_method("PROPFIND"), "OTHER");
        assert_eq!(normalize_method("get"), "OTHER");
    }

    #[test]
    fn test_normalize_country() {
        assert_eq!(normalize_country(Some("US")), "US");
        assert_eq!(normalize_country(Some("de")), "DE");
        assert_eq!(normalize_country(Some("T1")), "T1");
        assert_eq!(normalize_country(Some("USA")), "unknown");
        assert_eq!(normalize_country(Some("\"}")), "unknown");
        assert_eq!(normalize_country(None), "unknown");
    }
}
