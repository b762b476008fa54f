use chrono::{Datelike, Duration, NaiveDate};

use crate::{Error, Result, Weekday};

/// 默认学期锚点（第二个周一）
pub const DEFAULT_TERM_START: &str = "2025-10-13";

/// 默认重复周数
pub const DEFAULT_OCCURRENCES: u32 = 8;

/// 学期信息
///
/// `start` is the week-zero anchor for weekday offsets and must be a Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Term {
    start: NaiveDate,
    occurrences: u32,
}

impl Term {
    pub fn new(start: NaiveDate, occurrences: u32) -> Result<Self> {
        if start.weekday() != chrono::Weekday::Mon {
            return Err(Error::InvalidTermStart(start));
        }
        if occurrences == 0 {
            return Err(Error::Config(
                "occurrence count must be at least 1".to_string(),
            ));
        }
        Ok(Self { start, occurrences })
    }

    /// 从 YYYY-MM-DD 字符串创建
    pub fn from_date_str(date_str: &str, occurrences: u32) -> Result<Self> {
        let start = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")?;
        Self::new(start, occurrences)
    }

    /// Deployment default: the second Monday on or after the first day of term.
    pub fn second_monday_on_or_after(first_day: NaiveDate, occurrences: u32) -> Result<Self> {
        let days_to_monday = (7 - first_day.weekday().num_days_from_monday()) % 7;
        let first_monday = first_day + Duration::days(i64::from(days_to_monday));
        Self::new(first_monday + Duration::weeks(1), occurrences)
    }

    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    pub const fn occurrences(&self) -> u32 {
        self.occurrences
    }

    /// 首次上课日期
    pub fn first_occurrence(&self, weekday: Weekday) -> NaiveDate {
        self.start + Duration::days(i64::from(weekday.offset()))
    }
}

impl Default for Term {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2025, 10, 13).unwrap_or_default(),
            occurrences: DEFAULT_OCCURRENCES,
        }
    }
}
