//! Partition keys: `YYYYMMDD` date strings embedded in object names.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"y=(\d{4})/m=(\d{2})/d=(\d{2})").expect("date pattern is valid")
    })
}

/// Extract the partition key from an object name containing a
/// `y=YYYY/m=MM/d=DD` segment anywhere in its path. Returns `None`
/// when no such segment exists; the caller decides how to skip the
/// object.
pub fn extract_date_key(name: &str) -> Option<String> {
    let captures = date_pattern().captures(name)?;
    Some(format!("{}{}{}", &captures[1], &captures[2], &captures[3]))
}

/// Whether `key` is a syntactically and calendrically valid `YYYYMMDD`
/// date. Used to validate user-supplied bounds and to recognize
/// partition directories.
pub fn is_valid_date_key(key: &str) -> bool {
    key.len() == 8
        && key.bytes().all(|b| b.is_ascii_digit())
        && NaiveDate::parse_from_str(key, "%Y%m%d").is_ok()
}

/// Inclusive date-range predicate over partition keys. Absent bounds
/// pass; comparison is on the integer value of the 8-digit key.
pub fn in_range(key: &str, start_date: Option<&str>, end_date: Option<&str>) -> bool {
    let Ok(key) = key.parse::<u32>() else {
        return false;
    };
    let lower_ok = match start_date.and_then(|s| s.parse::<u32>().ok()) {
        Some(start) => key >= start,
        None => start_date.is_none(),
    };
    let upper_ok = match end_date.and_then(|e| e.parse::<u32>().ok()) {
        Some(end) => key <= end,
        None => end_date.is_none(),
    };
    lower_ok && upper_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_embedded_date() {
        let name = "resourceId=/tenants/x/providers/y/y=2024/m=06/d=18/h=01/m=00/part-0.json";
        assert_eq!(extract_date_key(name), Some("20240618".to_string()));
    }

    #[test]
    fn test_no_date_segment_returns_none() {
        assert_eq!(extract_date_key("logs/part-0.json"), None);
        assert_eq!(extract_date_key(""), None);
        // Partial segments do not match
        assert_eq!(extract_date_key("y=2024/m=06/part-0.json"), None);
    }

    #[test]
    fn test_date_key_validity() {
        assert!(is_valid_date_key("20240618"));
        assert!(!is_valid_date_key("2024061"));
        assert!(!is_valid_date_key("202406180"));
        assert!(!is_valid_date_key("2024061x"));
        // Correct shape but not a calendar date
        assert!(!is_valid_date_key("20241301"));
        assert!(!is_valid_date_key("20240230"));
    }

    #[test]
    fn test_range_filter() {
        assert!(in_range("20240618", None, None));
        assert!(in_range("20240618", Some("20240618"), Some("20240618")));
        assert!(in_range("20240618", Some("20240601"), None));
        assert!(in_range("20240618", None, Some("20240801")));
        assert!(!in_range("20240531", Some("20240601"), None));
        assert!(!in_range("20240802", None, Some("20240801")));
    }
}
