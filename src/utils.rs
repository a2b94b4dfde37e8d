use crate::schema::Cadence;
use chrono::{Datelike, NaiveDate};

/// Parses the `yyyymmdd` date format used throughout the data sets.
/// Empty and malformed fields become `None`; the caller decides whether the
/// row survives without the date.
pub fn parse_fsds_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y%m%d").ok()
}

/// (year, quarter) ordinal of a period-end date: consecutive quarters differ
/// by exactly 1, across year boundaries too.
pub fn quarter_ordinal(date: NaiveDate) -> i32 {
    date.year() * 4 + (date.month0() / 3) as i32
}

/// Calendar quarter (1-4) containing the date.
pub fn quarter_of(date: NaiveDate) -> u32 {
    date.month0() / 3 + 1
}

/// Display label for a period statement. The fiscal year/period codes from
/// the submission are preferred; a filing without them is labeled from its
/// period-end date.
pub fn period_label(
    fiscal_year: Option<i32>,
    fiscal_period: Option<&str>,
    period_end: NaiveDate,
    cadence: Cadence,
) -> String {
    let year = fiscal_year.unwrap_or_else(|| period_end.year());
    match cadence {
        Cadence::Annual => format!("FY {}", year),
        Cadence::Quarterly => match fiscal_period {
            // An annual filing projected onto the quarterly series is the
            // fourth fiscal quarter.
            Some("FY") => format!("Q4 {}", year),
            Some(fp) if fp.starts_with('Q') => format!("{} {}", fp, year),
            _ => format!("Q{} {}", quarter_of(period_end), period_end.year()),
        },
    }
}

/// Normalizes a presentation label for cross-filing comparison: lowercased,
/// punctuation stripped, whitespace collapsed.
pub fn normalize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut last_was_space = true;
    for c in label.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Evaluates ordered candidates with one lookup, returning the first
/// success. This is the single combinator behind every chained
/// try-A-else-B concept lookup in the metric layer.
pub fn first_success<'a, T, I, F>(candidates: I, mut lookup: F) -> Option<T>
where
    I: IntoIterator<Item = &'a String>,
    F: FnMut(&str) -> Option<T>,
{
    candidates.into_iter().find_map(|tag| lookup(tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fsds_date() {
        assert_eq!(
            parse_fsds_date("20241231"),
            NaiveDate::from_ymd_opt(2024, 12, 31)
        );
        assert_eq!(parse_fsds_date(""), None);
        assert_eq!(parse_fsds_date("2024-12-31"), None);
        assert_eq!(parse_fsds_date("  20240630 "), NaiveDate::from_ymd_opt(2024, 6, 30));
    }

    #[test]
    fn test_quarter_ordinal_is_consecutive_across_years() {
        let q4 = quarter_ordinal(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        let q1 = quarter_ordinal(NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
        assert_eq!(q1 - q4, 1);

        let a = quarter_ordinal(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
        let b = quarter_ordinal(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
        assert_eq!(b - a, 1);
    }

    #[test]
    fn test_period_labels() {
        let end = NaiveDate::from_ymd_opt(2024, 9, 30).unwrap();
        assert_eq!(
            period_label(Some(2024), Some("Q3"), end, Cadence::Quarterly),
            "Q3 2024"
        );
        assert_eq!(
            period_label(Some(2024), Some("FY"), end, Cadence::Quarterly),
            "Q4 2024"
        );
        assert_eq!(
            period_label(Some(2024), Some("FY"), end, Cadence::Annual),
            "FY 2024"
        );
        assert_eq!(period_label(None, None, end, Cadence::Quarterly), "Q3 2024");
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(
            normalize_label("Loans, net of allowance"),
            "loans net of allowance"
        );
        assert_eq!(normalize_label("  Total Assets  "), "total assets");
        assert_eq!(
            normalize_label("Interest income:"),
            normalize_label("INTEREST INCOME")
        );
    }

    #[test]
    fn test_first_success_order() {
        let candidates = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let result = first_success(&candidates, |tag| match tag {
            "b" => Some(2),
            "c" => Some(3),
            _ => None,
        });
        assert_eq!(result, Some(2));

        let none: Option<i32> = first_success(&candidates, |_| None);
        assert_eq!(none, None);
    }
}
