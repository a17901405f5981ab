//! Weekly time values: ISO weekdays, `HH:MM` clock times and instants folded onto a week.

use chrono::{DateTime, Datelike, NaiveDateTime, NaiveTime, TimeZone, Timelike, Weekday};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Minutes in one day.
pub const MINUTES_PER_DAY: i64 = 1440;
/// Minutes in one week.
pub const MINUTES_PER_WEEK: i64 = 7 * MINUTES_PER_DAY;

static CLOCK_TIME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01][0-9]|2[0-3]):([0-5][0-9])$").unwrap());

/// Day of week in the ISO numbering: 1 = Monday .. 7 = Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct IsoWeekday(u8);

impl IsoWeekday {
    pub const MONDAY: IsoWeekday = IsoWeekday(1);
    pub const TUESDAY: IsoWeekday = IsoWeekday(2);
    pub const WEDNESDAY: IsoWeekday = IsoWeekday(3);
    pub const THURSDAY: IsoWeekday = IsoWeekday(4);
    pub const FRIDAY: IsoWeekday = IsoWeekday(5);
    pub const SATURDAY: IsoWeekday = IsoWeekday(6);
    pub const SUNDAY: IsoWeekday = IsoWeekday(7);

    /// Builds a weekday from its ISO number, rejecting anything outside `1..=7`.
    pub fn new(number: u8) -> Option<Self> {
        (1..=7).contains(&number).then_some(Self(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl From<Weekday> for IsoWeekday {
    fn from(day: Weekday) -> Self {
        // number_from_monday is always 1..=7
        Self(day.number_from_monday() as u8)
    }
}

impl TryFrom<u8> for IsoWeekday {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("day_of_week must be within 1..=7, got {value}"))
    }
}

impl From<IsoWeekday> for u8 {
    fn from(day: IsoWeekday) -> Self {
        day.0
    }
}

impl fmt::Display for IsoWeekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A wall-clock time of day in the fixed-width `HH:MM` wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    /// Parses a zero-padded 24h `HH:MM` string. `9:00` and `09:00:00` are rejected.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = CLOCK_TIME_REGEX.captures(text)?;
        let hour = caps.get(1)?.as_str().parse().ok()?;
        let minute = caps.get(2)?.as_str().parse().ok()?;
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Minutes elapsed since midnight.
    pub fn minute_of_day(self) -> i64 {
        i64::from(self.0.hour()) * 60 + i64::from(self.0.minute())
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        ClockTime::parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("expected HH:MM, got {text:?}")))
    }
}

/// An instant folded onto the weekly cycle: the ISO weekday and the minute of that day.
///
/// Seconds are truncated, so comparisons against `HH:MM` bounds behave the same as
/// comparing the zero-padded strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekInstant {
    pub day: IsoWeekday,
    pub minute_of_day: i64,
}

impl WeekInstant {
    pub fn new(day: IsoWeekday, time: ClockTime) -> Self {
        Self {
            day,
            minute_of_day: time.minute_of_day(),
        }
    }

    /// Minutes since Monday 00:00.
    pub fn minute_of_week(self) -> i64 {
        i64::from(self.day.number() - 1) * MINUTES_PER_DAY + self.minute_of_day
    }
}

impl From<NaiveDateTime> for WeekInstant {
    fn from(at: NaiveDateTime) -> Self {
        Self {
            day: at.weekday().into(),
            minute_of_day: i64::from(at.hour()) * 60 + i64::from(at.minute()),
        }
    }
}

impl<Tz: TimeZone> From<&DateTime<Tz>> for WeekInstant {
    /// Uses the wall clock of the instant's own offset.
    fn from(at: &DateTime<Tz>) -> Self {
        at.naive_local().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_clock_time_requires_fixed_width() {
        assert!(ClockTime::parse("09:05").is_some());
        assert!(ClockTime::parse("23:59").is_some());
        assert!(ClockTime::parse("9:05").is_none());
        assert!(ClockTime::parse("24:00").is_none());
        assert!(ClockTime::parse("10:00:00").is_none());
        assert_eq!(ClockTime::parse("10:30").unwrap().minute_of_day(), 630);
    }

    #[test]
    fn test_clock_time_wire_format() {
        let time: ClockTime = serde_json::from_str("\"07:45\"").unwrap();
        assert_eq!(serde_json::to_string(&time).unwrap(), "\"07:45\"");
        assert!(serde_json::from_str::<ClockTime>("\"7:45\"").is_err());
    }

    #[test]
    fn test_weekday_bounds() {
        assert!(IsoWeekday::new(0).is_none());
        assert!(IsoWeekday::new(8).is_none());
        assert_eq!(IsoWeekday::from(Weekday::Mon), IsoWeekday::MONDAY);
        assert_eq!(IsoWeekday::from(Weekday::Sun), IsoWeekday::SUNDAY);
        assert!(serde_json::from_str::<IsoWeekday>("9").is_err());
    }

    #[test]
    fn test_week_instant_truncates_seconds() {
        // 2024-01-02 is a Tuesday
        let at = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(12, 0, 59)
            .unwrap();
        let instant = WeekInstant::from(at);
        assert_eq!(instant.day, IsoWeekday::TUESDAY);
        assert_eq!(instant.minute_of_day, 720);
        assert_eq!(instant.minute_of_week(), MINUTES_PER_DAY + 720);
    }
}
