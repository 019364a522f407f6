//! Report and distribution periods
//!
//! A run derives its dates once, at startup, and passes them down unchanged:
//!
//! - [`ReportWindow`]: the previous local day, used to query the log store and to name
//!   the CSV files (`{user}-{YYYY-MM-DD}.csv`)
//! - [`SendWindow`]: a date range inside a single month, used to pick archives for mailing
//! - [`MonthKey`]: `YYYY-MM`, used for container names, archive names and mail subjects

use crate::error::{ReportError, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone};
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;

/// Calendar month, formatted as `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Month containing `date`
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
            .map(Self::of)
            .map_err(|_| ReportError::invalid_period(format!("'{}' is not a YYYY-MM month", s)))
    }
}

/// Time range of the log events that go into one day's reports
#[derive(Debug, Clone, PartialEq)]
pub struct ReportWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl ReportWindow {
    /// Yesterday in the timezone of `now`: `[yesterday 00:00:00, today 00:00:00 - 1s]`
    pub fn previous_day(now: DateTime<Tz>) -> Result<Self> {
        let tz = now.timezone();
        let today = now.date_naive();
        let yesterday = today
            .pred_opt()
            .ok_or_else(|| ReportError::invalid_period("no day before the current date"))?;

        let start = local_midnight(&tz, yesterday)?;
        let end = local_midnight(&tz, today)? - Duration::seconds(1);

        Ok(Self { start, end })
    }

    /// Reporting day, used as the CSV file suffix
    pub fn day(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// Month the reporting day belongs to
    pub fn month(&self) -> MonthKey {
        MonthKey::of(self.day())
    }

    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_millis(&self) -> i64 {
        self.end.timestamp_millis()
    }
}

fn local_midnight(tz: &Tz, date: NaiveDate) -> Result<DateTime<Tz>> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ReportError::invalid_period(format!("no midnight on {}", date)))?;
    tz.from_local_datetime(&midnight)
        .earliest()
        .ok_or_else(|| ReportError::invalid_period(format!("{} does not exist in {}", midnight, tz)))
}

/// Inclusive range of report days whose archives are mailed out together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl SendWindow {
    /// Resolve the window from optional CLI bounds
    ///
    /// Without bounds the previous calendar month relative to `today` is used. A single
    /// bound is completed to the start or end of its own month.
    pub fn resolve(
        today: NaiveDate,
        send_from: Option<NaiveDate>,
        send_to: Option<NaiveDate>,
    ) -> Result<Self> {
        let (from, to) = match (send_from, send_to) {
            (Some(from), Some(to)) => (from, to),
            (Some(from), None) => (from, MonthKey::of(from).last_day()),
            (None, Some(to)) => (MonthKey::of(to).first_day(), to),
            (None, None) => {
                let to = MonthKey::of(today)
                    .first_day()
                    .pred_opt()
                    .ok_or_else(|| ReportError::invalid_period("no month before the current one"))?;
                (MonthKey::of(to).first_day(), to)
            },
        };

        if to <= from {
            return Err(ReportError::invalid_period(format!(
                "send-to ({}) must be after send-from ({})",
                to, from
            )));
        }
        if MonthKey::of(from) != MonthKey::of(to) {
            return Err(ReportError::invalid_period(format!(
                "{} and {} are in different months; send reports within a month",
                from, to
            )));
        }

        Ok(Self { from, to })
    }

    pub fn month(&self) -> MonthKey {
        MonthKey::of(self.from)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Kiev;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_month_key_display_and_bounds() {
        let month = MonthKey::of(date("2019-02-14"));
        assert_eq!(month.to_string(), "2019-02");
        assert_eq!(month.first_day(), date("2019-02-01"));
        assert_eq!(month.last_day(), date("2019-02-28"));
        assert_eq!(MonthKey::of(date("2019-12-31")).last_day(), date("2019-12-31"));
    }

    #[test]
    fn test_month_key_from_str() {
        assert_eq!("2019-07".parse::<MonthKey>().unwrap().to_string(), "2019-07");
        assert!("2019-13".parse::<MonthKey>().is_err());
        assert!("July".parse::<MonthKey>().is_err());
    }

    #[test]
    fn test_previous_day_window() {
        let now = Kiev.with_ymd_and_hms(2019, 8, 1, 3, 15, 0).unwrap();
        let window = ReportWindow::previous_day(now).unwrap();

        assert_eq!(window.start, Kiev.with_ymd_and_hms(2019, 7, 31, 0, 0, 0).unwrap());
        assert_eq!(window.end, Kiev.with_ymd_and_hms(2019, 7, 31, 23, 59, 59).unwrap());
        assert_eq!(window.day(), date("2019-07-31"));
        assert_eq!(window.month().to_string(), "2019-07");
        assert_eq!(window.end_millis() - window.start_millis(), 86_399_000);
    }

    #[test]
    fn test_previous_day_window_across_dst_change() {
        // 2019-10-27 is 25 hours long in Kyiv
        let now = Kiev.with_ymd_and_hms(2019, 10, 28, 9, 0, 0).unwrap();
        let window = ReportWindow::previous_day(now).unwrap();

        assert_eq!(window.end_millis() - window.start_millis(), 90_000_000 - 1_000);
    }

    #[test]
    fn test_send_window_defaults_to_previous_month() {
        let window = SendWindow::resolve(date("2019-08-05"), None, None).unwrap();
        assert_eq!(window.from, date("2019-07-01"));
        assert_eq!(window.to, date("2019-07-31"));
        assert_eq!(window.month().to_string(), "2019-07");

        let window = SendWindow::resolve(date("2019-01-10"), None, None).unwrap();
        assert_eq!(window.month().to_string(), "2018-12");
    }

    #[test]
    fn test_send_window_completes_single_bound() {
        let window = SendWindow::resolve(date("2019-08-05"), None, Some(date("2019-06-20"))).unwrap();
        assert_eq!(window.from, date("2019-06-01"));

        let window = SendWindow::resolve(date("2019-08-05"), Some(date("2019-02-10")), None).unwrap();
        assert_eq!(window.to, date("2019-02-28"));
    }

    #[test]
    fn test_send_window_rejects_bad_ranges() {
        let today = date("2019-08-05");
        assert!(SendWindow::resolve(today, Some(date("2019-06-20")), Some(date("2019-06-10"))).is_err());
        assert!(SendWindow::resolve(today, Some(date("2019-06-20")), Some(date("2019-06-20"))).is_err());
        assert!(SendWindow::resolve(today, Some(date("2019-06-20")), Some(date("2019-07-02"))).is_err());
    }

    #[test]
    fn test_send_window_contains_is_inclusive() {
        let window = SendWindow::resolve(date("2019-08-05"), None, None).unwrap();
        assert!(window.contains(date("2019-07-01")));
        assert!(window.contains(date("2019-07-31")));
        assert!(!window.contains(date("2019-08-01")));
    }
}
