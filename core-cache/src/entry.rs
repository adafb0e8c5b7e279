//! Cache entries and HTTP caching header interpretation.

use crate::snapshot::ResponseSnapshot;

/// `max_age_seconds` value meaning the entry never expires by age.
pub const NO_EXPIRY: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub response: ResponseSnapshot,
    /// Unix milliseconds at save time
    pub stored_at: i64,
    pub max_age_seconds: i64,
    pub size_bytes: u64,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl CacheEntry {
    /// Build an entry from a response, reading its caching headers.
    pub fn from_response(response: ResponseSnapshot, stored_at: i64, fallback_max_age: i64) -> Self {
        let max_age_seconds = response
            .header("cache-control")
            .and_then(parse_max_age)
            .unwrap_or(fallback_max_age);
        let etag = response.header("etag").map(str::to_string);
        let last_modified = response.header("last-modified").map(str::to_string);
        let size_bytes = response.size_bytes();

        Self {
            response,
            stored_at,
            max_age_seconds,
            size_bytes,
            etag,
            last_modified,
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        if self.max_age_seconds < 0 {
            return false;
        }
        now_ms - self.stored_at > self.max_age_seconds.saturating_mul(1000)
    }

    pub fn has_validators(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }
}

/// Extract `max-age=<seconds>` from a Cache-Control value.
///
/// Negative values clamp to zero: a server can make an entry stale, never
/// immortal. Only [`NO_EXPIRY`] passed explicitly disables expiry.
pub fn parse_max_age(cache_control: &str) -> Option<i64> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("max-age") {
            return None;
        }
        value
            .trim()
            .trim_matches('"')
            .parse::<i64>()
            .ok()
            .map(|seconds| seconds.max(0))
    })
}

pub fn is_no_store(cache_control: &str) -> bool {
    cache_control
        .split(',')
        .any(|directive| directive.trim().eq_ignore_ascii_case("no-store"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_max_age() {
        assert_eq!(parse_max_age("max-age=60"), Some(60));
        assert_eq!(parse_max_age("public, Max-Age=120, must-revalidate"), Some(120));
        assert_eq!(parse_max_age("max-age=\"5\""), Some(5));
        assert_eq!(parse_max_age("no-cache"), None);
        assert_eq!(parse_max_age("max-age=soon"), None);
        assert_eq!(parse_max_age("s-maxage=10"), None);
        assert_eq!(parse_max_age("max-age=-5"), Some(0));
        assert_eq!(parse_max_age("max-age=-1"), Some(0));
    }

    #[test]
    fn test_negative_header_max_age_is_stale_not_immortal() {
        let response =
            ResponseSnapshot::new(200, "u", "b").with_header("Cache-Control", "max-age=-5");
        let entry = CacheEntry::from_response(response, 0, 1800);

        assert_eq!(entry.max_age_seconds, 0);
        assert!(entry.is_expired(1));
        assert!(entry.is_expired(365 * 24 * 3600 * 1000));
    }

    #[test]
    fn test_no_store() {
        assert!(is_no_store("private, no-store"));
        assert!(is_no_store("NO-STORE"));
        assert!(!is_no_store("no-cache"));
    }

    #[test]
    fn test_entry_reads_headers_case_insensitively() {
        let response = ResponseSnapshot::new(200, "https://a.test/x", "body")
            .with_header("CACHE-CONTROL", "max-age=2")
            .with_header("etag", "\"abc\"")
            .with_header("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT");

        let entry = CacheEntry::from_response(response, 1_000, 1800);
        assert_eq!(entry.max_age_seconds, 2);
        assert_eq!(entry.etag.as_deref(), Some("\"abc\""));
        assert_eq!(
            entry.last_modified.as_deref(),
            Some("Wed, 21 Oct 2015 07:28:00 GMT")
        );
        assert!(entry.has_validators());
    }

    #[test]
    fn test_fallback_max_age() {
        let entry = CacheEntry::from_response(ResponseSnapshot::new(200, "u", "b"), 0, 1800);
        assert_eq!(entry.max_age_seconds, 1800);
        assert!(!entry.has_validators());
    }

    #[test]
    fn test_expiry() {
        let response = ResponseSnapshot::new(200, "u", "b").with_header("Cache-Control", "max-age=2");
        let entry = CacheEntry::from_response(response, 10_000, 1800);

        assert!(!entry.is_expired(10_000));
        assert!(!entry.is_expired(12_000));
        assert!(entry.is_expired(13_000));
    }

    #[test]
    fn test_no_expiry_marker() {
        let mut entry = CacheEntry::from_response(ResponseSnapshot::new(200, "u", "b"), 0, 1800);
        entry.max_age_seconds = NO_EXPIRY;
        assert!(!entry.is_expired(i64::MAX / 2));
    }
}
