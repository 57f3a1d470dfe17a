use crate::config::MissingPolicy;
use crate::models::Reading;
use chrono::NaiveDate;

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Parse a published reading. "12.4" → 12.4 | "12,4" → 12.4 | "" → None
pub fn parse_reading(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "-" || s == "N/A" {
        return None;
    }
    s.replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Apply the dataset's missing-value policy to a raw value field.
pub fn resolve_reading(s: &str, policy: MissingPolicy) -> Reading {
    match (parse_reading(s), policy) {
        (Some(v), _) => Some(v),
        (None, MissingPolicy::Zero) => Some(0.0),
        (None, MissingPolicy::Keep) => None,
    }
}

/// Dates as SIR publishes them: "05/03/2024", with ISO as a fallback.
pub fn parse_station_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Ok(d) = NaiveDate::parse_from_str(s, "%d/%m/%Y") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }

    None
}

pub fn normalise_station_id(s: &str) -> String {
    s.trim().to_string()
}

pub fn is_image_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("image")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reading() {
        assert_eq!(parse_reading("12.4"), Some(12.4));
        assert_eq!(parse_reading(" 0.0 "), Some(0.0));
        assert_eq!(parse_reading("12,4"), Some(12.4));
        assert_eq!(parse_reading("-1.5"), Some(-1.5));
        assert_eq!(parse_reading(""), None);
        assert_eq!(parse_reading("n.d."), None);
        assert_eq!(parse_reading("NaN"), None);
    }

    #[test]
    fn test_resolve_reading_policies() {
        assert_eq!(resolve_reading("", MissingPolicy::Zero), Some(0.0));
        assert_eq!(resolve_reading("", MissingPolicy::Keep), None);
        assert_eq!(resolve_reading("3.5", MissingPolicy::Keep), Some(3.5));
    }

    #[test]
    fn test_parse_station_date() {
        assert_eq!(parse_station_date("05/03/2024"), NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(parse_station_date("2024-01-01"), NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(parse_station_date("31/02/2024"), None);
    }

    #[test]
    fn test_is_image_content_type() {
        assert!(is_image_content_type("image/png"));
        assert!(is_image_content_type("IMAGE/GIF"));
        assert!(!is_image_content_type("text/html; charset=UTF-8"));
    }
}
