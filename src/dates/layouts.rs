// src/dates/layouts.rs
//! Ordered layout table. Entries are tried top to bottom and the first full
//! match wins, so constrained shapes sit above permissive ones: two-digit
//! years before four-digit years (chrono's `%Y` happily reads `23`),
//! month-first numerics before day-first ones, zoned before floating.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::ParsedTimestamp;

/// How a layout obtains its zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Zone {
    /// chrono reads the offset itself (`%z` inside the format).
    Inline,
    /// Trailing numeric offset token, optionally prefixed by `GMT`/`UTC`.
    /// Accepts one-digit hours (`+5:30`) and missing minutes (`+07`).
    Offset,
    /// Trailing zone abbreviation such as `EDT` or `GMT`.
    Abbreviation,
    /// The format ends in a literal UTC designator (`Z`).
    Utc,
    /// No zone at all; the wall clock is reported as floating.
    Floating,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Layout {
    pub(crate) format: &'static str,
    zone: Zone,
    weekdays: &'static [&'static str],
    months: &'static [(&'static str, &'static str)],
    date_only: bool,
    hour24: bool,
}

impl Layout {
    const fn new(format: &'static str, zone: Zone) -> Self {
        Self {
            format,
            zone,
            weekdays: &[],
            months: &[],
            date_only: false,
            hour24: false,
        }
    }

    const fn inline(format: &'static str) -> Self {
        Self::new(format, Zone::Inline)
    }

    const fn offset(format: &'static str) -> Self {
        Self::new(format, Zone::Offset)
    }

    const fn abbrev(format: &'static str) -> Self {
        Self::new(format, Zone::Abbreviation)
    }

    const fn utc(format: &'static str) -> Self {
        Self::new(format, Zone::Utc)
    }

    const fn floating(format: &'static str) -> Self {
        Self::new(format, Zone::Floating)
    }

    /// Require and skip one of `names` (plus an optional comma) at the start.
    const fn after(mut self, names: &'static [&'static str]) -> Self {
        self.weekdays = names;
        self
    }

    /// Rewrite localized month words to English before matching.
    const fn months(mut self, table: &'static [(&'static str, &'static str)]) -> Self {
        self.months = table;
        self
    }

    const fn date_only(mut self) -> Self {
        self.date_only = true;
        self
    }

    /// Only matches stamps carrying hour `24`, read as midnight of the next day.
    const fn hour24(mut self) -> Self {
        self.hour24 = true;
        self
    }

    /// Try this layout against an already whitespace-normalized stamp.
    pub(crate) fn parse(&self, input: &str) -> Option<ParsedTimestamp> {
        let mut s = if self.weekdays.is_empty() {
            input
        } else {
            strip_weekday(input, self.weekdays)?
        };

        let translated;
        if !self.months.is_empty() {
            translated = translate_months(s, self.months);
            s = &translated;
        }

        let rolled;
        if self.hour24 {
            if !s.contains(" 24:") {
                return None;
            }
            rolled = s.replacen(" 24:", " 00:", 1);
            s = &rolled;
        }

        let parsed = match self.zone {
            Zone::Inline => {
                ParsedTimestamp::Zoned(DateTime::parse_from_str(s, self.format).ok()?)
            }
            Zone::Offset => {
                let (head, tail) = s.rsplit_once(' ')?;
                let offset = numeric_offset(tail)?;
                ParsedTimestamp::Zoned(attach(self.naive(head)?, offset)?)
            }
            Zone::Abbreviation => {
                let (head, tail) = s.rsplit_once(' ')?;
                let offset = abbreviation_offset(tail)?;
                ParsedTimestamp::Zoned(attach(self.naive(head)?, offset)?)
            }
            Zone::Utc => ParsedTimestamp::Zoned(attach(self.naive(s)?, utc_offset())?),
            Zone::Floating => ParsedTimestamp::Floating(self.naive(s)?),
        };

        Some(if self.hour24 {
            parsed.plus_days(1)
        } else {
            parsed
        })
    }

    fn naive(&self, s: &str) -> Option<NaiveDateTime> {
        if self.date_only {
            NaiveDate::parse_from_str(s, self.format)
                .ok()?
                .and_hms_opt(0, 0, 0)
        } else {
            NaiveDateTime::parse_from_str(s, self.format).ok()
        }
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

fn attach(naive: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    offset.from_local_datetime(&naive).single()
}

fn strip_weekday<'a>(s: &'a str, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|name| {
        let head = s.get(..name.len())?;
        if !head.eq_ignore_ascii_case(name) {
            return None;
        }
        let rest = &s[name.len()..];
        if !(rest.starts_with(',') || rest.starts_with(' ')) {
            return None;
        }
        Some(rest.trim_start_matches(',').trim_start())
    })
}

fn translate_months(s: &str, table: &[(&str, &str)]) -> String {
    s.split(' ')
        .map(|word| {
            let core = word.trim_end_matches([',', '.']);
            let suffix = &word[core.len()..];
            let lower = core.to_lowercase();
            match table.iter().find(|(from, _)| *from == lower) {
                Some((_, to)) => format!("{to}{suffix}"),
                None => word.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

static NUMERIC_OFFSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:GMT|UTC|UT)?([+-])(\d{1,2})(?::?(\d{2}))?$").expect("numeric offset regex")
});

fn numeric_offset(token: &str) -> Option<FixedOffset> {
    let caps = NUMERIC_OFFSET_RE.captures(token)?;
    let hours: i32 = caps[2].parse().ok()?;
    let minutes: i32 = caps.get(3).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    let secs = hours * 3600 + minutes * 60;
    if &caps[1] == "-" {
        FixedOffset::west_opt(secs)
    } else {
        FixedOffset::east_opt(secs)
    }
}

/// Resolve a zone abbreviation. Unknown all-caps abbreviations resolve to UTC.
fn abbreviation_offset(token: &str) -> Option<FixedOffset> {
    let upper = token.to_ascii_uppercase();
    let hours = match upper.as_str() {
        "UT" | "UTC" | "GMT" | "Z" | "WET" => 0,
        "BST" | "CET" | "WEST" => 1,
        "CEST" | "EET" => 2,
        "EEST" | "MSK" => 3,
        "JST" | "KST" => 9,
        "AEST" => 10,
        "EST" | "CDT" => -5,
        "EDT" | "AST" => -4,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        "AM" | "PM" => return None,
        _ => {
            let plausible = (2..=5).contains(&token.len())
                && token.bytes().all(|b| b.is_ascii_uppercase());
            if !plausible {
                return None;
            }
            0
        }
    };
    FixedOffset::east_opt(hours * 3600)
}

const EN_WEEKDAYS: &[&str] = &[
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday", "Tues",
    "Thurs", "Thur", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun",
];
const ES_WEEKDAYS: &[&str] = &["Lun", "Mar", "Mié", "Mie", "Jue", "Vie", "Sáb", "Sab", "Dom"];
const PT_WEEKDAYS: &[&str] = &["Seg", "Ter", "Qua", "Qui", "Sex", "Sáb", "Dom"];
const FR_WEEKDAYS: &[&str] = &["lun", "mar", "mer", "jeu", "ven", "sam", "dim"];
const IT_WEEKDAYS: &[&str] = &[
    "Lunedì", "Martedì", "Mercoledì", "Giovedì", "Venerdì", "Sabato", "Domenica", "Lunedi",
    "Martedi", "Mercoledi", "Giovedi", "Venerdi",
];

// Keys are lowercase; values are whatever chrono's %b/%B accepts.
const ES_MONTHS: &[(&str, &str)] = &[
    ("ene", "Jan"),
    ("enero", "January"),
    ("febrero", "February"),
    ("marzo", "March"),
    ("abr", "Apr"),
    ("abril", "April"),
    ("mayo", "May"),
    ("junio", "June"),
    ("julio", "July"),
    ("ago", "Aug"),
    ("agosto", "August"),
    ("sept", "Sep"),
    ("septiembre", "September"),
    ("octubre", "October"),
    ("noviembre", "November"),
    ("dic", "Dec"),
    ("diciembre", "December"),
];
const PT_MONTHS: &[(&str, &str)] = &[
    ("fev", "Feb"),
    ("abr", "Apr"),
    ("mai", "May"),
    ("ago", "Aug"),
    ("set", "Sep"),
    ("out", "Oct"),
    ("dez", "Dec"),
];
const FR_MONTHS: &[(&str, &str)] = &[
    ("janv", "Jan"),
    ("janvier", "January"),
    ("févr", "Feb"),
    ("février", "February"),
    ("fevrier", "February"),
    ("mars", "March"),
    ("avr", "Apr"),
    ("avril", "April"),
    ("mai", "May"),
    ("juin", "June"),
    ("juil", "Jul"),
    ("juillet", "July"),
    ("août", "August"),
    ("aout", "August"),
    ("sept", "Sep"),
    ("septembre", "September"),
    ("octobre", "October"),
    ("novembre", "November"),
    ("déc", "Dec"),
    ("décembre", "December"),
    ("decembre", "December"),
];
const IT_MONTHS: &[(&str, &str)] = &[
    ("gennaio", "January"),
    ("febbraio", "February"),
    ("marzo", "March"),
    ("aprile", "April"),
    ("maggio", "May"),
    ("giugno", "June"),
    ("luglio", "July"),
    ("agosto", "August"),
    ("settembre", "September"),
    ("ottobre", "October"),
    ("novembre", "November"),
    ("dicembre", "December"),
];
const GR_MONTHS: &[(&str, &str)] = &[
    ("ιαν", "Jan"),
    ("φεβ", "Feb"),
    ("μαρ", "Mar"),
    ("απρ", "Apr"),
    ("μαΐ", "May"),
    ("μαι", "May"),
    ("ιουν", "Jun"),
    ("ιουλ", "Jul"),
    ("αυγ", "Aug"),
    ("σεπ", "Sep"),
    ("οκτ", "Oct"),
    ("νοε", "Nov"),
    ("δεκ", "Dec"),
];
const AR_MONTHS: &[(&str, &str)] = &[
    ("يناير", "January"),
    ("فبراير", "February"),
    ("مارس", "March"),
    ("أبريل", "April"),
    ("إبريل", "April"),
    ("مايو", "May"),
    ("يونيو", "June"),
    ("يوليو", "July"),
    ("أغسطس", "August"),
    ("سبتمبر", "September"),
    ("أكتوبر", "October"),
    ("نوفمبر", "November"),
    ("ديسمبر", "December"),
];

pub(crate) static LAYOUTS: &[Layout] = &[
    // Date and time repeated as a trailing ISO stamp:
    // "Dom, 23 Mar 2025 00:05:36 +0000 2025-03-23 00:05:36"
    Layout::inline("%d %b %Y %H:%M:%S %z %Y-%m-%d %H:%M:%S")
        .after(ES_WEEKDAYS)
        .months(ES_MONTHS),
    Layout::inline("%d %b %Y %H:%M:%S %z %Y-%m-%d %H:%M:%S").after(EN_WEEKDAYS),
    // Named zones: "Sat, 22 Mar 2025 19:57:06 TIME_ZONE", "... 08:14:46 GMT", "Sat, 22 Mar 2025 CST"
    Layout::floating("%d %b %Y %H:%M:%S TIME_ZONE").after(EN_WEEKDAYS),
    Layout::abbrev("%d %b %Y %H:%M:%S").after(EN_WEEKDAYS),
    Layout::abbrev("%d %b %Y").after(EN_WEEKDAYS).date_only(),
    // GMT with offset: "Sunday, March 23, 2025, 16:20 GMT+5:30"
    Layout::offset("%B %d, %Y, %H:%M").after(EN_WEEKDAYS),
    // Month-first numeric ahead of the day-first variant further down:
    // "Vie, 03/21/2025 - 00:00"
    Layout::floating("%m/%d/%Y - %H:%M").after(ES_WEEKDAYS),
    // Non-English weekdays; two-digit years first.
    // "Jue, 29 Jun 23 15:34:11 +0200"
    Layout::offset("%d %b %y %H:%M:%S")
        .after(ES_WEEKDAYS)
        .months(ES_MONTHS),
    // "Vie, 30 Sep 2022 21:27:13 -0500", "Mar, 31 Ago 2021 22:46:32 -0500", "dom, 23 mar 2025 12:40:59 +0100"
    Layout::offset("%d %b %Y %H:%M:%S")
        .after(ES_WEEKDAYS)
        .months(ES_MONTHS),
    Layout::offset("%d %b %Y %H:%M:%S")
        .after(PT_WEEKDAYS)
        .months(PT_MONTHS),
    // "ven, 21 mar 2025 13:49:00 CDT"
    Layout::abbrev("%d %b %Y %H:%M:%S")
        .after(FR_WEEKDAYS)
        .months(FR_MONTHS),
    Layout::offset("%d %b %Y %H:%M:%S")
        .after(FR_WEEKDAYS)
        .months(FR_MONTHS),
    // Italian: "Domenica, 23 Marzo, 2025 - 10:33"
    Layout::floating("%d %B, %Y - %H:%M")
        .after(IT_WEEKDAYS)
        .months(IT_MONTHS),
    // ISO 8601 with a redundant trailing offset: "2025-03-23T11:02:13Z +0300"
    Layout::offset("%Y-%m-%dT%H:%M:%SZ"),
    // RFC 3339 proper
    Layout::inline("%Y-%m-%dT%H:%M:%S%.f%z"),
    Layout::utc("%Y-%m-%dT%H:%M:%S%.fZ"),
    Layout::floating("%Y-%m-%dT%H:%M:%S%.f"),
    // Localized month names: "23 Μαρ 2025 13:11:00 +0000", "22 Mars 2025", "22 مارس 2025"
    Layout::offset("%d %b %Y %H:%M:%S").months(GR_MONTHS),
    Layout::floating("%d %B %Y").months(FR_MONTHS).date_only(),
    Layout::floating("%d %B %Y").months(AR_MONTHS).date_only(),
    Layout::floating("%d %B %Y").months(ES_MONTHS).date_only(),
    // Twelve-hour clocks with weekday: "Sun, 23 March 2025, 05:06:27 PM +0530",
    // "Sat, 22 Mar 2025 08:36 PM EDT"
    Layout::offset("%d %B %Y, %I:%M:%S %p").after(EN_WEEKDAYS),
    Layout::abbrev("%d %b %Y %I:%M %p").after(EN_WEEKDAYS),
    Layout::offset("%d %b %Y %I:%M %p").after(EN_WEEKDAYS),
    // Day-first: "23 March 2025 - 12:10", "23-03-2025 11:15"
    Layout::floating("%d %B %Y - %H:%M"),
    Layout::floating("%d-%m-%Y %H:%M"),
    // Other separators: "12:06 23.03.2025", "23.03.2025 | 08:28"
    Layout::floating("%H:%M %d.%m.%Y"),
    Layout::floating("%d.%m.%Y | %H:%M"),
    // Weekday then month name: "Sunday Mar 23 2025 13:54:16"
    Layout::floating("%b %d %Y %H:%M:%S").after(EN_WEEKDAYS),
    // "March 23, 2025, 4:50 pm", "Mar 22, 2025, 12:00pm"
    Layout::floating("%B %d, %Y, %I:%M %p"),
    Layout::floating("%b %d, %Y, %I:%M%p"),
    // Hour 24: "Mon, 17 Mar 2025 24:15:59 +0530"
    Layout::offset("%d %b %Y %H:%M:%S").after(EN_WEEKDAYS).hour24(),
    // RFC 822 / 1123 with numeric offsets: "Friday 05 Jul 2024 08:00:00 -0600",
    // "Sun,23 Mar 2025 18:37:00 +07"
    Layout::offset("%d %b %y %H:%M:%S").after(EN_WEEKDAYS),
    Layout::offset("%d %b %Y %H:%M:%S").after(EN_WEEKDAYS),
    Layout::offset("%d %b %Y %H:%M").after(EN_WEEKDAYS),
    Layout::abbrev("%d %b %Y %H:%M").after(EN_WEEKDAYS),
    // "Tue, 18 Mar 2025 5:58:24 PM -0700"
    Layout::offset("%d %b %Y %I:%M:%S %p").after(EN_WEEKDAYS),
    // No zone: "Sat, 22 Mar 2025 11:07:41 PM"
    Layout::floating("%d %b %Y %I:%M:%S %p").after(EN_WEEKDAYS),
    Layout::floating("%d %b %Y %H:%M:%S").after(EN_WEEKDAYS),
    Layout::floating("%d %b %Y %H:%M").after(EN_WEEKDAYS),
    // Spanish day-first numeric: "Vie, 21/03/2025 - 00:00"
    Layout::floating("%d/%m/%Y - %H:%M").after(ES_WEEKDAYS),
    // Weekday, month-first with 12h clock: "Fri, Mar 21 2025 12:49:00 AM"
    Layout::floating("%b %d %Y %I:%M:%S %p").after(EN_WEEKDAYS),
    // Bare dates and times
    Layout::floating("%Y-%m-%d %H:%M:%S"),
    Layout::floating("%Y-%m-%d").date_only(),
    Layout::floating("%d.%m.%Y").date_only(),
    // Without weekday: "23 Mar 2025 08:14:46 +0000", "3 Mar 2025 18:27 UTC"
    Layout::offset("%d %b %Y %H:%M:%S"),
    Layout::abbrev("%d %b %Y %H:%M:%S"),
    Layout::abbrev("%d %b %Y %H:%M"),
    Layout::floating("%d %b %Y %H:%M"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekday_needs_a_separator() {
        assert_eq!(strip_weekday("Sun, 23 Mar", EN_WEEKDAYS), Some("23 Mar"));
        assert_eq!(strip_weekday("Sun,23 Mar", EN_WEEKDAYS), Some("23 Mar"));
        assert_eq!(strip_weekday("Sunday Mar 23", EN_WEEKDAYS), Some("Mar 23"));
        assert_eq!(strip_weekday("Sunny 23 Mar", EN_WEEKDAYS), None);
    }

    #[test]
    fn months_are_translated_word_by_word() {
        assert_eq!(
            translate_months("23 Marzo, 2025 - 10:33", IT_MONTHS),
            "23 March, 2025 - 10:33"
        );
        assert_eq!(translate_months("31 Ago 2021", ES_MONTHS), "31 Aug 2021");
        // "ago" inside a longer word stays put
        assert_eq!(translate_months("31 Agos 2021", ES_MONTHS), "31 Agos 2021");
    }

    #[test]
    fn numeric_offsets_accept_short_forms() {
        assert_eq!(numeric_offset("+0530").unwrap().local_minus_utc(), 19_800);
        assert_eq!(numeric_offset("GMT+5:30").unwrap().local_minus_utc(), 19_800);
        assert_eq!(numeric_offset("+07").unwrap().local_minus_utc(), 25_200);
        assert_eq!(numeric_offset("-0600").unwrap().local_minus_utc(), -21_600);
        assert!(numeric_offset("+2500").is_none());
        assert!(numeric_offset("PM").is_none());
    }

    #[test]
    fn abbreviations_resolve_or_default_to_utc() {
        assert_eq!(abbreviation_offset("EDT").unwrap().local_minus_utc(), -4 * 3600);
        assert_eq!(abbreviation_offset("gmt").unwrap().local_minus_utc(), 0);
        assert_eq!(abbreviation_offset("XYZT").unwrap().local_minus_utc(), 0);
        assert!(abbreviation_offset("TIME_ZONE").is_none());
        assert!(abbreviation_offset("+0100").is_none());
        assert!(abbreviation_offset("PM").is_none());
    }

    #[test]
    fn hour24_layout_ignores_regular_hours() {
        let l = Layout::offset("%d %b %Y %H:%M:%S").after(EN_WEEKDAYS).hour24();
        assert!(l.parse("Mon, 17 Mar 2025 23:15:59 +0530").is_none());
        assert!(l.parse("Mon, 17 Mar 2025 24:15:59 +0530").is_some());
    }
}
