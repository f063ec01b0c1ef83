use crate::error::AggregateError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Calendar resolution of the time bucket appended to every group key.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    #[default]
    #[serde(alias = "")]
    None,
    Daily,
    Monthly,
    Yearly,
}

impl Interval {
    #[inline]
    pub fn is_none(self) -> bool {
        matches!(self, Interval::None)
    }

    /// Bucket token for a timestamp: `YYYY-MM-DD`, `YYYY-MM`, `YYYY`, or empty.
    #[inline]
    pub fn bucket(self, ts: &DateTime<Utc>) -> String {
        match self {
            Interval::None => String::new(),
            Interval::Daily => ts.format("%Y-%m-%d").to_string(),
            Interval::Monthly => ts.format("%Y-%m").to_string(),
            Interval::Yearly => ts.format("%Y").to_string(),
        }
    }
}

impl FromStr for Interval {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Interval::None),
            "daily" => Ok(Interval::Daily),
            "monthly" => Ok(Interval::Monthly),
            "yearly" => Ok(Interval::Yearly),
            other => Err(AggregateError::BadRequest(format!("unknown interval `{other}`"))),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Interval::None => "none",
            Interval::Daily => "daily",
            Interval::Monthly => "monthly",
            Interval::Yearly => "yearly",
        })
    }
}

/// Keyword selecting RFC 3339 parsing instead of a strftime pattern.
pub const RFC3339: &str = "rfc3339";

/// Where the timestamp of a record lives and how text values are parsed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeField {
    pub name: String,
    /// A chrono strftime pattern, or [`RFC3339`].
    pub format: String,
}

impl Default for TimeField {
    fn default() -> Self {
        Self {
            name: "Date".to_string(),
            format: "%Y-%m-%d".to_string(),
        }
    }
}

impl TimeField {
    pub fn new(name: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
        }
    }

    /// Parse a text timestamp. Naive values are taken as UTC; date-only formats
    /// resolve to midnight.
    pub fn parse(&self, text: &str) -> Option<DateTime<Utc>> {
        let text = text.trim();
        if self.format.eq_ignore_ascii_case(RFC3339) {
            return DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|ts| ts.with_timezone(&Utc));
        }
        if let Ok(ts) = DateTime::parse_from_str(text, &self.format) {
            return Some(ts.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, &self.format) {
            return Some(naive.and_utc());
        }
        NaiveDate::parse_from_str(text, &self.format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bucket_tokens_per_interval() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 7, 23, 59, 0).unwrap();
        assert_eq!(Interval::Daily.bucket(&ts), "2024-03-07");
        assert_eq!(Interval::Monthly.bucket(&ts), "2024-03");
        assert_eq!(Interval::Yearly.bucket(&ts), "2024");
        assert_eq!(Interval::None.bucket(&ts), "");
    }

    #[test]
    fn interval_names() {
        assert_eq!("".parse::<Interval>().unwrap(), Interval::None);
        assert_eq!("Monthly".parse::<Interval>().unwrap(), Interval::Monthly);
        assert!("hourly".parse::<Interval>().is_err());
        let i: Interval = serde_json::from_str("\"\"").unwrap();
        assert_eq!(i, Interval::None);
    }

    #[test]
    fn parses_date_only_and_rfc3339() {
        let day = TimeField::default();
        assert_eq!(
            day.parse("2024-03-07"),
            Some(Utc.with_ymd_and_hms(2024, 3, 7, 0, 0, 0).unwrap())
        );
        assert_eq!(day.parse("07/03/2024"), None);

        let rfc = TimeField::new("Date", "RFC3339");
        assert_eq!(
            rfc.parse("2024-03-07T10:00:00+02:00"),
            Some(Utc.with_ymd_and_hms(2024, 3, 7, 8, 0, 0).unwrap())
        );

        let naive = TimeField::new("Date", "%Y-%m-%d %H:%M:%S");
        assert_eq!(
            naive.parse("2024-03-07 10:11:12"),
            Some(Utc.with_ymd_and_hms(2024, 3, 7, 10, 11, 12).unwrap())
        );
    }
}
