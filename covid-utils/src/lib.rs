//! Shared utility functions for the COVID pipeline crates.

/// Date utility functions
pub mod dates {
    use chrono::NaiveDate;
    use regex::Regex;
    use std::sync::LazyLock;

    /// Header format used by the John Hopkins time-series tables: "M/D/YY"
    pub const HEADER_DATE_FORMAT: &str = "%m/%d/%y";

    static HEADER_DATE_PATTERN: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\d{1,2}/\d{1,2}/\d{2}$").expect("valid header date regex"));

    /// Format a NaiveDate as "YYYY-MM-DD"
    pub fn format_date(date: &NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }

    /// Parse a date string in "YYYY-MM-DD" format
    pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
        Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")?)
    }

    /// Returns true if a column header has the `M/D/YY` shape of a date column.
    pub fn is_header_date(header: &str) -> bool {
        HEADER_DATE_PATTERN.is_match(header.trim())
    }

    /// Parse a date column header ("3/1/20") into a date.
    ///
    /// Returns `None` for identifying columns such as `FIPS` or `Admin2`.
    pub fn parse_header_date(header: &str) -> Option<NaiveDate> {
        let header = header.trim();
        if !is_header_date(header) {
            return None;
        }
        NaiveDate::parse_from_str(header, HEADER_DATE_FORMAT).ok()
    }

    /// Format a date the way the source tables label their columns ("3/1/20").
    pub fn format_header_date(date: &NaiveDate) -> String {
        date.format("%-m/%-d/%y").to_string()
    }

    /// Short display form used in trend tables, e.g. "Mar 1".
    pub fn format_short(date: &NaiveDate) -> String {
        date.format("%b %-d").to_string()
    }

}
