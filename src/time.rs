//! RFC 3339 date-time values, as restricted by TOML.
//!
//! A TOML date-time is one of four sub-kinds: offset date-time, local
//! date-time, local date, or local time. [`DateTime`] models all four with
//! optional date, time, and offset parts; [`DateTime::kind`] reports which
//! sub-kind a value is.

#[cfg(test)]
#[path = "./time_tests.rs"]
mod tests;

use std::fmt;

/// A civil calendar date.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Date {
    /// Year, 0000 through 9999.
    pub year: u16,
    /// Month, 1 through 12.
    pub month: u8,
    /// Day of month, validated against the month and leap years.
    pub day: u8,
}

/// A time of day with nanosecond precision.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Time {
    /// Hour, 0 through 23.
    pub hour: u8,
    /// Minute, 0 through 59.
    pub minute: u8,
    /// Second, 0 through 59.
    pub second: u8,
    /// Fractional seconds scaled to nanoseconds.
    pub nanosecond: u32,
    /// Number of fractional digits in the source, capped at 9. Preserved so
    /// `0.10` and `0.1` format back distinctly.
    pub(crate) subsec_digits: u8,
}

impl Time {
    /// Number of fractional-second digits in the original text, capped at 9.
    /// Zero if the time had no fractional part.
    #[inline]
    pub fn subsecond_digits(&self) -> u8 {
        self.subsec_digits
    }
}

/// Offset between local time and UTC.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimeOffset {
    /// The `Z` suffix, denoting a UTC offset of 00:00; often spoken "Zulu"
    /// from the ICAO phonetic alphabet representation of the letter "Z".
    Z,
    /// A numeric `+HH:MM` / `-HH:MM` offset.
    Custom {
        /// Signed offset in minutes.
        minutes: i16,
    },
}

impl TimeOffset {
    /// The offset in minutes; zero for [`TimeOffset::Z`].
    #[inline]
    pub fn minutes(&self) -> i16 {
        match *self {
            TimeOffset::Z => 0,
            TimeOffset::Custom { minutes } => minutes,
        }
    }
}

/// Which of the four TOML date-time sub-kinds a [`DateTime`] is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DateTimeKind {
    /// Date, time, and UTC offset.
    Offset,
    /// Date and time, no offset.
    LocalDateTime,
    /// Date only.
    LocalDate,
    /// Time only.
    LocalTime,
}

/// A TOML date-time value.
///
/// At least one of the date and time parts is always present, and an offset
/// only ever accompanies a full date and time.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct DateTime {
    pub(crate) date: Option<Date>,
    pub(crate) time: Option<Time>,
    pub(crate) offset: Option<TimeOffset>,
}

fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u16, month: u8) -> u8 {
    const DAYS: [u8; 13] = [0, 31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    if month == 2 && is_leap_year(year) {
        29
    } else {
        DAYS[month as usize]
    }
}

/// Reads exactly two digits at `at`. Fails if a third digit follows, so
/// fields like `12:305` are rejected rather than truncated.
fn two_digits(input: &[u8], at: usize) -> Option<u8> {
    let hi = input.get(at)?;
    let lo = input.get(at + 1)?;
    if !hi.is_ascii_digit() || !lo.is_ascii_digit() {
        return None;
    }
    if input.get(at + 2).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    Some((hi - b'0') * 10 + (lo - b'0'))
}

/// `YYYY-MM-DD` at the start of `input`, calendar-validated. The caller has
/// already pinned the dashes at offsets 4 and 7.
fn scan_date(input: &[u8]) -> Option<Date> {
    let mut year = 0u16;
    for &b in &input[..4] {
        if !b.is_ascii_digit() {
            return None;
        }
        year = year * 10 + (b - b'0') as u16;
    }
    let month = two_digits(input, 5)?;
    let day = two_digits(input, 8)?;
    if !(1..=12).contains(&month) {
        return None;
    }
    if day < 1 || day > days_in_month(year, month) {
        return None;
    }
    Some(Date { year, month, day })
}

/// `HH:MM:SS` and an optional fractional part, starting at `at`. Returns
/// the time and the offset just past it. Seconds are not optional, and a
/// dot after them commits to at least one fractional digit; either left
/// unfulfilled fails the whole scan.
fn scan_time(input: &[u8], at: usize) -> Option<(Time, usize)> {
    let hour = two_digits(input, at)?;
    if input.get(at + 2) != Some(&b':') {
        return None;
    }
    let minute = two_digits(input, at + 3)?;
    if input.get(at + 5) != Some(&b':') {
        return None;
    }
    let second = two_digits(input, at + 6)?;
    if hour > 23 || minute > 59 || second > 59 {
        return None;
    }

    let mut end = at + 8;
    let mut nanosecond = 0u32;
    let mut subsec_digits = 0u8;

    if input.get(end) == Some(&b'.') {
        let mut digits = 0u32;
        let mut value = 0u32;
        let mut i = end + 1;
        while input.get(i).is_some_and(u8::is_ascii_digit) {
            // Digits past nanosecond precision are consumed but dropped.
            if digits < 9 {
                value = value * 10 + (input[i] - b'0') as u32;
            }
            digits += 1;
            i += 1;
        }
        if digits == 0 {
            return None;
        }
        let kept = digits.min(9) as u8;
        for _ in kept..9 {
            value *= 10;
        }
        nanosecond = value;
        subsec_digits = kept;
        end = i;
    }

    Some((
        Time {
            hour,
            minute,
            second,
            nanosecond,
            subsec_digits,
        },
        end,
    ))
}

/// `Z`, `z`, or `±HH:MM` at `at`. Returns `Ok(None)` when no offset starts
/// here; a sign or `Z` commits, and a malformed remainder fails the scan.
fn scan_offset(input: &[u8], at: usize) -> Result<Option<(TimeOffset, usize)>, ()> {
    match input.get(at) {
        Some(b'Z' | b'z') => Ok(Some((TimeOffset::Z, at + 1))),
        Some(&(sign @ (b'+' | b'-'))) => {
            let hours = two_digits(input, at + 1).ok_or(())?;
            if input.get(at + 3) != Some(&b':') {
                return Err(());
            }
            let minutes = two_digits(input, at + 4).ok_or(())?;
            if hours > 23 || minutes > 59 {
                return Err(());
            }
            let total = hours as i16 * 60 + minutes as i16;
            let minutes = if sign == b'-' { -total } else { total };
            Ok(Some((TimeOffset::Custom { minutes }, at + 6)))
        }
        _ => Ok(None),
    }
}

impl DateTime {
    /// Consumes the longest valid TOML date-time prefix of `input`.
    ///
    /// Returns the number of bytes consumed and the parsed value, or `None`
    /// if no valid date-time starts here. Trailing unrelated bytes are left
    /// for the caller; a partially-started component (a lone `T`, a sign
    /// with no offset digits) poisons the whole scan.
    pub(crate) fn scan(input: &[u8]) -> Option<(usize, DateTime)> {
        match input {
            [a, b, b':', ..] if a.is_ascii_digit() && b.is_ascii_digit() => {
                let (time, at) = scan_time(input, 0)?;
                // A UTC offset is meaningless without a date.
                if matches!(input.get(at), Some(b'Z' | b'z' | b'+' | b'-')) {
                    return None;
                }
                Some((
                    at,
                    DateTime {
                        date: None,
                        time: Some(time),
                        offset: None,
                    },
                ))
            }
            [_, _, _, _, b'-', _, _, b'-', ..] => {
                let date = scan_date(input)?;
                let mut at = 10;
                let mut time = None;
                let mut offset = None;

                let time_follows = match input.get(at) {
                    Some(b'T' | b't') => true,
                    Some(b' ') => input.get(at + 1).is_some_and(u8::is_ascii_digit),
                    _ => false,
                };
                if time_follows {
                    let (t, end) = scan_time(input, at + 1)?;
                    time = Some(t);
                    at = end;
                    if let Some((o, end)) = scan_offset(input, at).ok()? {
                        offset = Some(o);
                        at = end;
                    }
                }

                Some((
                    at,
                    DateTime {
                        date: Some(date),
                        time,
                        offset,
                    },
                ))
            }
            _ => None,
        }
    }

    /// The date part, if present.
    #[inline]
    pub fn date(&self) -> Option<Date> {
        self.date
    }

    /// The time part, if present.
    #[inline]
    pub fn time(&self) -> Option<Time> {
        self.time
    }

    /// The UTC offset, if present.
    #[inline]
    pub fn offset(&self) -> Option<TimeOffset> {
        self.offset
    }

    /// Which TOML date-time sub-kind this value is.
    pub fn kind(&self) -> DateTimeKind {
        match (self.date.is_some(), self.time.is_some(), self.offset.is_some()) {
            (true, true, true) => DateTimeKind::Offset,
            (true, true, false) => DateTimeKind::LocalDateTime,
            (true, _, _) => DateTimeKind::LocalDate,
            _ => DateTimeKind::LocalTime,
        }
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)?;
        if self.subsec_digits > 0 {
            let mut frac = self.nanosecond;
            for _ in self.subsec_digits..9 {
                frac /= 10;
            }
            write!(f, ".{frac:0width$}", width = self.subsec_digits as usize)?;
        }
        Ok(())
    }
}

impl fmt::Display for TimeOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.minutes();
        if minutes == 0 {
            return f.write_str("Z");
        }
        let (sign, abs) = if minutes < 0 {
            ('-', -minutes)
        } else {
            ('+', minutes)
        };
        write!(f, "{sign}{:02}:{:02}", abs / 60, abs % 60)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(date) = &self.date {
            date.fmt(f)?;
            if self.time.is_some() {
                f.write_str("T")?;
            }
        }
        if let Some(time) = &self.time {
            time.fmt(f)?;
        }
        if let Some(offset) = &self.offset {
            offset.fmt(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
