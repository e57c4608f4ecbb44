// src/dates/mod.rs
//! # Timestamp normalization
//! Turns whatever a feed put in its date field into a single UTC instant.
//!
//! Pipeline, first success wins:
//! 1. malformed `<Wkd><AM|PM><EETE_R|EESTE_R><Month>C822` stamps (see [`malformed`]);
//! 2. inline region zones (`Europe/Dublin`) are replaced by `GMT`;
//! 3. `GMT +5:30` style offsets lose the inner space, whitespace is collapsed;
//! 4. the ordered layout table in [`layouts`].
//!
//! Acceptance rate matters more than RFC 822 / ISO 8601 conformance here.

mod layouts;
mod malformed;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::TimestampError;

/// Result of matching a stamp, before any zone is assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTimestamp {
    /// The stamp carried zone information (offset, abbreviation or `Z`).
    Zoned(DateTime<FixedOffset>),
    /// Wall clock only; the matched layout had no zone token.
    Floating(NaiveDateTime),
}

impl ParsedTimestamp {
    pub fn has_zone(&self) -> bool {
        matches!(self, ParsedTimestamp::Zoned(_))
    }

    /// Zoned stamps are converted; floating ones keep their wall clock and are
    /// declared UTC.
    pub fn to_utc(self) -> DateTime<Utc> {
        match self {
            ParsedTimestamp::Zoned(dt) => dt.with_timezone(&Utc),
            ParsedTimestamp::Floating(naive) => naive.and_utc(),
        }
    }

    fn plus_days(self, days: i64) -> Self {
        let delta = chrono::Duration::days(days);
        match self {
            ParsedTimestamp::Zoned(dt) => ParsedTimestamp::Zoned(dt + delta),
            ParsedTimestamp::Floating(naive) => ParsedTimestamp::Floating(naive + delta),
        }
    }
}

static REGION_ZONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:Africa|America|Antarctica|Asia|Atlantic|Australia|Europe|Indian|Pacific)/[A-Za-z_]+(?:/[A-Za-z_]+)?",
    )
    .expect("region zone regex")
});

static SPACED_OFFSET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(GMT|UTC|UT)\s+([+-])").expect("spaced offset regex"));

static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Parse a feed timestamp without assuming a zone for floating results.
pub fn parse_timestamp(raw: &str) -> Result<ParsedTimestamp, TimestampError> {
    parse_timestamp_on(raw, Utc::now().date_naive())
}

/// Parse a feed timestamp into a UTC instant.
///
/// Stamps without zone information keep their wall-clock fields and are
/// reinterpreted as UTC, not converted from the host's local zone.
pub fn normalize_timestamp(raw: &str) -> Result<DateTime<Utc>, TimestampError> {
    parse_timestamp(raw).map(ParsedTimestamp::to_utc)
}

/// Same as [`normalize_timestamp`] with an explicit "today", which only the
/// malformed-stamp branch consults (for its year and fallback month).
pub fn normalize_timestamp_on(raw: &str, today: NaiveDate) -> Result<DateTime<Utc>, TimestampError> {
    parse_timestamp_on(raw, today).map(ParsedTimestamp::to_utc)
}

fn parse_timestamp_on(raw: &str, today: NaiveDate) -> Result<ParsedTimestamp, TimestampError> {
    if malformed::looks_malformed(raw) {
        let utc = malformed::parse_malformed(raw, today)?;
        return Ok(ParsedTimestamp::Zoned(utc.fixed_offset()));
    }

    let prepared = prepare(raw);
    layouts::LAYOUTS
        .iter()
        .find_map(|layout| layout.parse(&prepared))
        .ok_or_else(|| TimestampError::FormatUnrecognized(raw.to_string()))
}

fn prepare(raw: &str) -> String {
    let s = REGION_ZONE_RE.replace(raw, "GMT");
    let s = SPACED_OFFSET_RE.replace_all(&s, "$1$2");
    WS_RE.replace_all(s.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn prepare_substitutes_regions_and_tightens_offsets() {
        assert_eq!(
            prepare("Sun, 23 Mar 2025 08:14:46 Europe/Dublin"),
            "Sun, 23 Mar 2025 08:14:46 GMT"
        );
        assert_eq!(
            prepare("Sunday, March 23, 2025, 16:20 GMT +5:30"),
            "Sunday, March 23, 2025, 16:20 GMT+5:30"
        );
        assert_eq!(prepare("  Sat, 22 Mar 2025  CST "), "Sat, 22 Mar 2025 CST");
    }

    #[test]
    fn explicit_offsets_are_converted() {
        assert_eq!(
            normalize_timestamp("Vie, 30 Sep 2022 21:27:13 -0500").unwrap(),
            utc(2022, 10, 1, 2, 27, 13)
        );
        assert_eq!(
            normalize_timestamp("Sunday, March 23, 2025, 16:20 GMT +5:30").unwrap(),
            utc(2025, 3, 23, 10, 50, 0)
        );
        assert_eq!(
            normalize_timestamp("2025-03-23T11:02:13Z +0300").unwrap(),
            utc(2025, 3, 23, 8, 2, 13)
        );
    }

    #[test]
    fn floating_wall_clock_is_declared_utc() {
        let parsed = parse_timestamp("Sunday Mar 23 2025 13:54:16").unwrap();
        assert!(!parsed.has_zone());
        assert_eq!(parsed.to_utc(), utc(2025, 3, 23, 13, 54, 16));
    }

    #[test]
    fn twelve_hour_clock_without_zone() {
        assert_eq!(
            normalize_timestamp("Sat, 22 Mar 2025 11:07:41 PM").unwrap(),
            utc(2025, 3, 22, 23, 7, 41)
        );
        assert_eq!(
            normalize_timestamp("Tue, 18 Mar 2025 5:58:24 PM").unwrap(),
            utc(2025, 3, 18, 17, 58, 24)
        );
    }

    #[test]
    fn month_first_wins_over_day_first() {
        assert_eq!(
            normalize_timestamp("Vie, 03/04/2025 - 00:00").unwrap(),
            utc(2025, 3, 4, 0, 0, 0)
        );
        // Only day-first can read a 21st month position
        assert_eq!(
            normalize_timestamp("Vie, 21/03/2025 - 08:00").unwrap(),
            utc(2025, 3, 21, 8, 0, 0)
        );
    }

    #[test]
    fn two_digit_year_uses_posix_window() {
        assert_eq!(
            normalize_timestamp("Jue, 29 Jun 23 15:34:11 +0200").unwrap(),
            utc(2023, 6, 29, 13, 34, 11)
        );
        assert_eq!(
            normalize_timestamp("Thu, 01 Jan 70 00:00:00 +0000").unwrap(),
            utc(1970, 1, 1, 0, 0, 0)
        );
    }

    #[test]
    fn hour_24_rolls_into_next_day() {
        assert_eq!(
            normalize_timestamp("Mon, 17 Mar 2025 24:15:59 +0530").unwrap(),
            utc(2025, 3, 17, 18, 45, 59)
        );
    }

    #[test]
    fn localized_month_names() {
        assert_eq!(
            normalize_timestamp("23 Μαρ 2025 13:11:00 +0000").unwrap(),
            utc(2025, 3, 23, 13, 11, 0)
        );
        assert_eq!(normalize_timestamp("22 Mars 2025").unwrap(), utc(2025, 3, 22, 0, 0, 0));
        assert_eq!(normalize_timestamp("22 مارس 2025").unwrap(), utc(2025, 3, 22, 0, 0, 0));
        assert_eq!(
            normalize_timestamp("Mar, 31 Ago 2021 22:46:32 -0500").unwrap(),
            utc(2021, 9, 1, 3, 46, 32)
        );
        assert_eq!(
            normalize_timestamp("Domenica, 23 Marzo, 2025 - 10:33").unwrap(),
            utc(2025, 3, 23, 10, 33, 0)
        );
    }

    #[test]
    fn named_zone_abbreviations() {
        assert_eq!(
            normalize_timestamp("Sat, 22 Mar 2025 08:36 PM EDT").unwrap(),
            utc(2025, 3, 23, 0, 36, 0)
        );
        assert_eq!(
            normalize_timestamp("ven, 21 mar 2025 13:49:00 CDT").unwrap(),
            utc(2025, 3, 21, 18, 49, 0)
        );
        assert_eq!(
            normalize_timestamp("Sun, 23 Mar 2025 08:14:46 Europe/Dublin").unwrap(),
            utc(2025, 3, 23, 8, 14, 46)
        );
    }

    #[test]
    fn malformed_stamp_uses_supplied_today() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 10).unwrap();
        let t = normalize_timestamp_on("FriPMEETE_RFebruaryC822", today).unwrap();
        // 2024-02-01 is a Thursday
        assert_eq!(t, utc(2024, 2, 2, 15, 0, 0));
    }

    #[test]
    fn garbage_is_reported_with_the_original_input() {
        let err = normalize_timestamp("  not a date  ").unwrap_err();
        assert_eq!(err, TimestampError::FormatUnrecognized("  not a date  ".into()));
        assert!(normalize_timestamp("").is_err());
    }
}
