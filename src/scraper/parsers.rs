use crate::config::DatasetConfig;
use crate::models::{RawRecord, Series};
use crate::scraper::cleaner::resolve_reading;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

// Station pages embed their table as a script:
//   VALUES[0] = new Array("1","01/01/2024","12.4","0.0");
static RECORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"VALUES\[(\d+)\]\s*=\s*new Array\(\s*"(\d+)"\s*,\s*"(\d{1,2}/\d{1,2}/\d{4})"\s*,\s*"([^"]*)"\s*,\s*"([^"]*)"\s*\)"#,
    )
    .expect("record regex must be valid")
});

// ── Records ───────────────────────────────────────────────────────────────────

/// Find every embedded record in scan order.
pub fn scan_records(content: &str) -> Vec<RawRecord> {
    RECORD_RE
        .captures_iter(content)
        .filter_map(|caps| {
            let slot = caps.get(1)?.as_str().parse().ok()?;
            let fields = (2..=5)
                .map(|i| caps.get(i).map_or(String::new(), |m| m.as_str().to_string()))
                .collect();
            Some(RawRecord { slot, fields })
        })
        .collect()
}

// ── Series ────────────────────────────────────────────────────────────────────

/// Turn a station page into its date → reading map.
///
/// No match is a normal outcome and yields an empty series. When a date
/// appears twice the later record wins.
pub fn extract_series(content: &str, dataset: &DatasetConfig) -> Series {
    let mut series = Series::new();

    for record in scan_records(content) {
        let Some(date) = record.date() else { continue };
        let raw = record
            .fields
            .get(dataset.value_field)
            .map(String::as_str)
            .unwrap_or_default();
        series.insert(date.to_string(), resolve_reading(raw, dataset.missing));
    }

    debug!("{} dates extracted", series.len());
    series
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetConfig;

    const PAGE: &str = r#"
<html><head><script type="text/javascript">
var VALUES = new Array();
VALUES[0] = new Array("1","01/01/2024","4.1","12.6");
VALUES[1] = new Array("2","02/01/2024","3.8","");
VALUES[2] = new Array("3","03/01/2024","","0.0");
</script></head><body><img src="grafico.php"></body></html>
"#;

    #[test]
    fn test_scan_records_splits_quoted_fields() {
        let records = scan_records(PAGE);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].slot, 0);
        assert_eq!(records[0].fields, vec!["1", "01/01/2024", "4.1", "12.6"]);
        assert_eq!(records[1].date(), Some("02/01/2024"));
        assert_eq!(records[2].fields[2], "");
    }

    #[test]
    fn test_precipitation_reads_fourth_field_and_zero_fills() {
        let series = extract_series(PAGE, &DatasetConfig::precipitation());
        assert_eq!(series.len(), 3);
        assert_eq!(series["01/01/2024"], Some(12.6));
        assert_eq!(series["02/01/2024"], Some(0.0));
        assert_eq!(series["03/01/2024"], Some(0.0));
    }

    #[test]
    fn test_temperature_reads_third_field_and_keeps_missing() {
        let series = extract_series(PAGE, &DatasetConfig::temperature());
        assert_eq!(series["01/01/2024"], Some(4.1));
        assert_eq!(series["02/01/2024"], Some(3.8));
        assert_eq!(series["03/01/2024"], None);
    }

    #[test]
    fn test_no_match_is_empty() {
        let rain = DatasetConfig::precipitation();
        assert!(extract_series("", &rain).is_empty());
        assert!(extract_series("<html>Stazione non disponibile</html>", &rain).is_empty());
        assert!(extract_series(r#"VALUES[0] = new Array("1","2024-01-01","1","2");"#, &rain).is_empty());
    }

    #[test]
    fn test_duplicate_date_last_record_wins() {
        let page = r#"
VALUES[0] = new Array("1","05/03/2024","0.0","1.5");
VALUES[1] = new Array("2","05/03/2024","0.0","7.25");
"#;
        let series = extract_series(page, &DatasetConfig::precipitation());
        assert_eq!(series.len(), 1);
        assert_eq!(series["05/03/2024"], Some(7.25));
    }

    #[test]
    fn test_value_field_out_of_range_uses_missing_policy() {
        let dataset = DatasetConfig {
            value_field: 9,
            ..DatasetConfig::temperature()
        };
        let series = extract_series(PAGE, &dataset);
        assert_eq!(series.len(), 3);
        assert!(series.values().all(Option::is_none));
    }

    #[test]
    fn test_records_on_one_line() {
        let page = r#"VALUES[0] = new Array("1","01/02/2024","1.0","2.0");VALUES[1] = new Array("2","02/02/2024","3.0","4.0");"#;
        let series = extract_series(page, &DatasetConfig::temperature());
        assert_eq!(series["01/02/2024"], Some(1.0));
        assert_eq!(series["02/02/2024"], Some(3.0));
    }
}
