//! MS-DOS date/time fields as stored in ZIP headers.
//!
//! Layout:
//! - date: bits 9-15 year since 1980, bits 5-8 month, bits 0-4 day
//! - time: bits 11-15 hour, bits 5-10 minute, bits 0-4 second / 2
//!
//! The format carries no time zone; timestamps are converted as UTC.

use jiff::Timestamp;
use jiff::civil::DateTime;
use jiff::tz::TimeZone;

const MIN_YEAR: i16 = 1980;
const MAX_YEAR: i16 = 2107;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DosDateTime {
    pub date: u16,
    pub time: u16,
}

impl DosDateTime {
    pub fn new(date: u16, time: u16) -> Self {
        Self { date, time }
    }

    /// Parse modification date to (year, month, day)
    pub fn date_parts(&self) -> (u16, u8, u8) {
        let day = (self.date & 0x1F) as u8;
        let month = ((self.date >> 5) & 0x0F) as u8;
        let year = ((self.date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn time_parts(&self) -> (u8, u8, u8) {
        let second = ((self.time & 0x1F) * 2) as u8;
        let minute = ((self.time >> 5) & 0x3F) as u8;
        let hour = ((self.time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// Encode a Unix timestamp, clamped to the representable 1980..=2107 range.
    /// Odd seconds round down.
    pub fn from_unix(seconds: i64) -> Self {
        let datetime = match Timestamp::from_second(seconds) {
            Ok(ts) => ts.to_zoned(TimeZone::UTC).datetime(),
            Err(_) if seconds < 0 => return Self::earliest(),
            Err(_) => return Self::latest(),
        };
        if datetime.year() < MIN_YEAR {
            return Self::earliest();
        }
        if datetime.year() > MAX_YEAR {
            return Self::latest();
        }
        Self::from_civil(&datetime)
    }

    /// Decode to a Unix timestamp. `None` if the fields do not form a valid
    /// calendar date (e.g. month 0).
    pub fn to_unix(&self) -> Option<i64> {
        let (year, month, day) = self.date_parts();
        let (hour, minute, second) = self.time_parts();
        let datetime = DateTime::new(
            year as i16,
            month as i8,
            day as i8,
            hour as i8,
            minute as i8,
            second as i8,
            0,
        )
        .ok()?;
        let zoned = datetime.to_zoned(TimeZone::UTC).ok()?;
        Some(zoned.timestamp().as_second())
    }

    pub fn now() -> Self {
        Self::from_unix(Timestamp::now().as_second())
    }

    fn from_civil(datetime: &DateTime) -> Self {
        let date = (((datetime.year() - MIN_YEAR) as u16) << 9)
            | ((datetime.month() as u16) << 5)
            | datetime.day() as u16;
        let time = ((datetime.hour() as u16) << 11)
            | ((datetime.minute() as u16) << 5)
            | (datetime.second() as u16 >> 1);
        Self { date, time }
    }

    fn earliest() -> Self {
        // 1980-01-01 00:00:00
        Self::new((1 << 5) | 1, 0)
    }

    fn latest() -> Self {
        // 2107-12-31 23:59:58
        Self::new((127 << 9) | (12 << 5) | 31, (23 << 11) | (59 << 5) | 29)
    }
}
