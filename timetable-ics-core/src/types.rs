use std::{fmt, sync::LazyLock};

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

static CLOCK_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{1,2})(?::(\d{2}))?\s*$").expect("valid clock regex"));

/// 教学日（周一至周五）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Weekday {
    /// All teaching days in week order.
    pub const ALL: [Self; 5] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
    ];

    /// Days after Monday, 0-based.
    pub const fn offset(self) -> u32 {
        match self {
            Self::Monday => 0,
            Self::Tuesday => 1,
            Self::Wednesday => 2,
            Self::Thursday => 3,
            Self::Friday => 4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|day| day.name() == name)
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 墙上时间，规范化为 (小时, 分钟)
///
/// Timetable files carry times either as `"HH:MM"` strings or as integer
/// hours; both deserialize into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawClockTime", into = "String")]
pub struct ClockTime {
    hour: u32,
    minute: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawClockTime {
    Hour(u32),
    Text(String),
}

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(Error::MalformedTimeInterval(format!(
                "time {hour}:{minute:02} is out of range"
            )));
        }
        Ok(Self { hour, minute })
    }

    /// 解析 "HH:MM"、"H:MM" 或 "HH"
    pub fn parse(text: &str) -> Result<Self> {
        let captures = CLOCK_TIME_RE.captures(text).ok_or_else(|| {
            Error::MalformedTimeInterval(format!("unparsable time '{text}'"))
        })?;

        let hour = captures[1]
            .parse::<u32>()
            .map_err(|e| Error::MalformedTimeInterval(format!("bad hour in '{text}': {e}")))?;
        let minute = match captures.get(2) {
            Some(m) => m.as_str().parse::<u32>().map_err(|e| {
                Error::MalformedTimeInterval(format!("bad minute in '{text}': {e}"))
            })?,
            None => 0,
        };

        Self::new(hour, minute)
    }

    pub const fn hour(self) -> u32 {
        self.hour
    }

    pub const fn minute(self) -> u32 {
        self.minute
    }

    pub fn to_naive_time(self) -> NaiveTime {
        // hour/minute are range-checked on construction
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl TryFrom<RawClockTime> for ClockTime {
    type Error = Error;

    fn try_from(raw: RawClockTime) -> Result<Self> {
        match raw {
            RawClockTime::Hour(hour) => Self::new(hour, 0),
            RawClockTime::Text(text) => Self::parse(&text),
        }
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        time.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// 上课时间段，保证 start < end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct TimeInterval {
    pub start: ClockTime,
    pub end: ClockTime,
}

#[derive(Deserialize)]
struct RawInterval {
    start: RawClockTime,
    end: RawClockTime,
}

impl TimeInterval {
    pub fn new(start: ClockTime, end: ClockTime) -> Result<Self> {
        if start >= end {
            return Err(Error::MalformedTimeInterval(format!(
                "start {start} is not before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(ClockTime::parse(start)?, ClockTime::parse(end)?)
    }

    /// Check a JSON `time` object, keeping the typed error.
    ///
    /// Only a wrong JSON shape is reported as [`Error::Json`].
    pub fn from_json_value(value: &serde_json::Value) -> Result<Self> {
        Self::try_from(RawInterval::deserialize(value)?)
    }
}

impl TryFrom<RawInterval> for TimeInterval {
    type Error = Error;

    fn try_from(raw: RawInterval) -> Result<Self> {
        Self::new(raw.start.try_into()?, raw.end.try_into()?)
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// 一周内某门课程的一次课
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSlot {
    pub time: TimeInterval,
    /// 教学周，从 1 开始
    pub week: u32,
    /// 课程名称
    pub module: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub staff: String,
    #[serde(default)]
    pub groups: String,
    #[serde(default, alias = "eventCategory")]
    pub event_category: String,
    #[serde(default)]
    pub department: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_online_link: Option<String>,
}

/// Deduplication key: slots sharing it are one weekly recurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternKey {
    pub weekday: Weekday,
    pub time: TimeInterval,
    pub module: String,
}

impl PatternKey {
    pub fn of(weekday: Weekday, slot: &ModuleSlot) -> Self {
        Self {
            weekday,
            time: slot.time,
            module: slot.module.clone(),
        }
    }
}

/// 每周重复的日历事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurringEvent {
    pub uid: String,
    pub summary: String,
    pub description: String,
    pub location: String,
    /// 第一次上课开始时间
    pub first_start: DateTime<Utc>,
    /// 第一次上课结束时间
    pub first_end: DateTime<Utc>,
    /// RRULE COUNT
    pub count: u32,
}

impl RecurringEvent {
    pub fn rrule(&self) -> String {
        format!("FREQ=WEEKLY;COUNT={}", self.count)
    }
}

/// ICS生成选项
#[derive(Debug, Clone)]
pub struct IcsOptions {
    /// 日历名称前缀，选中的课程会追加在后面
    pub calendar_name: String,
    pub product_id: String,
    /// 课程时间所在时区
    pub timezone: Tz,
    /// UID 后缀域名
    pub uid_domain: String,
    pub calendar_description: String,
    /// 是否包含课程描述
    pub include_description: bool,
    pub reminder_minutes: Option<u32>,
}

impl Default for IcsOptions {
    fn default() -> Self {
        Self {
            calendar_name: "Imperial College".to_string(),
            product_id: "-//Imperial College London//Calendar Export//EN".to_string(),
            timezone: chrono_tz::Europe::London,
            uid_domain: "imperial.ac.uk".to_string(),
            calendar_description: "Imperial College London lecture calendar export".to_string(),
            include_description: true,
            reminder_minutes: None,
        }
    }
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| Error::UnknownTimezone(name.to_string()))
}
