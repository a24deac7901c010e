//! Wire date/datetime formats for the tabular store (spec.md §6).
//!
//! Dates are `DD-MM-YYYY`; datetimes are `DD-MM-YYYY HH:MM:SS`, always in
//! UTC. Conversion is one-directional at each boundary: the gateway never
//! guesses a format, it is told which one applies by the column.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

pub const DATE_FMT: &str = "%d-%m-%Y";
pub const DATETIME_FMT: &str = "%d-%m-%Y %H:%M:%S";

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FMT).ok()
}

pub fn format_date(d: NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), DATETIME_FMT).ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format(DATETIME_FMT).to_string()
}

/// Normalize a logical column name for lookup: lowercase, strip `_` and
/// spaces (spec.md §4.1).
pub fn normalize_column_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_date() {
        let d = NaiveDate::from_ymd_opt(2026, 1, 7).unwrap();
        assert_eq!(parse_date(&format_date(d)), Some(d));
    }

    #[test]
    fn round_trips_datetime() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 7, 13, 5, 9).unwrap();
        assert_eq!(parse_datetime(&format_datetime(dt)), Some(dt));
    }

    #[test]
    fn normalizes_case_and_separators() {
        assert_eq!(normalize_column_name("TAG_SPOOL"), "tagspool");
        assert_eq!(normalize_column_name("Fecha Materiales"), "fechamateriales");
        assert_eq!(normalize_column_name("Fecha_Materiales"), "fechamateriales");
    }
}
