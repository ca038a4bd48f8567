//! Date expression parsing for deadline phrases.
//!
//! Resolves free-text Russian date expressions ("через 3 дня", "15.03",
//! "в пятницу") into absolute calendar dates. Matching is an ordered list of
//! independent pattern matchers; the first one that matches wins, so more
//! specific phrasings must come before the substrings they contain
//! ("послезавтра" before "завтра").

use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref IN_N_DAYS: Regex =
        Regex::new(r"(?i)через\s+(\d+)\s+(?:день|дня|дней)").expect("valid pattern");
    static ref IN_A_WEEK: Regex = Regex::new(r"(?i)через\s+неделю").expect("valid pattern");
    static ref IN_N_WEEKS: Regex =
        Regex::new(r"(?i)через\s+(\d+)\s+(?:неделю|недели|недель)").expect("valid pattern");
    static ref IN_A_MONTH: Regex = Regex::new(r"(?i)через\s+месяц").expect("valid pattern");
    static ref ABSOLUTE_DOT: Regex =
        Regex::new(r"(\d{1,2})\.(\d{1,2})(?:\.(\d{4}))?").expect("valid pattern");
    static ref ABSOLUTE_SLASH: Regex =
        Regex::new(r"(\d{1,2})/(\d{1,2})(?:/(\d{4}))?").expect("valid pattern");
    static ref ABSOLUTE_DASH: Regex =
        Regex::new(r"(\d{1,2})-(\d{1,2})(?:-(\d{4}))?").expect("valid pattern");
    static ref AFTER_TOMORROW: Regex = Regex::new(r"(?i)послезавтра").expect("valid pattern");
    static ref TOMORROW: Regex = Regex::new(r"(?i)завтра").expect("valid pattern");
    static ref NAMED_WEEKDAY: Regex = Regex::new(
        r"(?i)\bво?\s+(понедельник|вторник|среду|среда|четверг|пятницу|пятница|субботу|суббота|воскресенье)"
    )
    .expect("valid pattern");
}

/// A single date phrasing: a regex plus the arithmetic that turns its
/// captures into a date. Matchers are independent and individually testable.
struct PatternMatcher {
    regex: &'static Regex,
    apply: fn(&Captures, NaiveDate) -> Option<NaiveDate>,
}

impl PatternMatcher {
    fn try_parse(&self, text: &str, today: NaiveDate) -> Option<NaiveDate> {
        self.regex
            .captures(text)
            .and_then(|caps| (self.apply)(&caps, today))
    }
}

lazy_static! {
    static ref MATCHERS: Vec<PatternMatcher> = vec![
        PatternMatcher { regex: &IN_N_DAYS, apply: in_n_days },
        PatternMatcher { regex: &IN_A_WEEK, apply: in_a_week },
        PatternMatcher { regex: &IN_N_WEEKS, apply: in_n_weeks },
        PatternMatcher { regex: &IN_A_MONTH, apply: in_a_month },
        PatternMatcher { regex: &ABSOLUTE_DOT, apply: absolute_date },
        PatternMatcher { regex: &ABSOLUTE_SLASH, apply: absolute_date },
        PatternMatcher { regex: &ABSOLUTE_DASH, apply: absolute_date },
        PatternMatcher { regex: &AFTER_TOMORROW, apply: after_tomorrow },
        PatternMatcher { regex: &TOMORROW, apply: tomorrow },
        PatternMatcher { regex: &NAMED_WEEKDAY, apply: named_weekday },
    ];
}

/// Resolve a date expression found anywhere in `text`, relative to `today`.
///
/// Returns `None` when no supported phrasing is present. The output is
/// date-only; the time-of-day of "now" never affects it.
pub fn resolve(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    MATCHERS.iter().find_map(|m| m.try_parse(text, today))
}

fn in_n_days(caps: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    // User-supplied counts can exceed what a Duration holds.
    let days: i64 = caps[1].parse().ok()?;
    today.checked_add_signed(Duration::try_days(days)?)
}

fn in_a_week(_caps: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    today.checked_add_signed(Duration::days(7))
}

fn in_n_weeks(caps: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    let weeks: i64 = caps[1].parse().ok()?;
    today.checked_add_signed(Duration::try_days(weeks.checked_mul(7)?)?)
}

fn in_a_month(_caps: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    // Calendar month arithmetic, clamped to the end of shorter months.
    today.checked_add_months(Months::new(1))
}

fn absolute_date(caps: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let explicit_year: Option<i32> = caps.get(3).and_then(|y| y.as_str().parse().ok());

    let year = explicit_year.unwrap_or_else(|| today.year());
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    // Year omitted and the date already passed this year: roll to next year.
    if explicit_year.is_none() && date < today {
        return NaiveDate::from_ymd_opt(year + 1, month, day);
    }
    Some(date)
}

fn tomorrow(_caps: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    today.checked_add_signed(Duration::days(1))
}

fn after_tomorrow(_caps: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    today.checked_add_signed(Duration::days(2))
}

fn named_weekday(caps: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    let target = weekday_from_name(&caps[1].to_lowercase())?;
    let mut ahead =
        target.num_days_from_monday() as i64 - today.weekday().num_days_from_monday() as i64;
    // Never "today": the named day always means the next occurrence.
    if ahead <= 0 {
        ahead += 7;
    }
    today.checked_add_signed(Duration::days(ahead))
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name {
        "понедельник" => Some(Weekday::Mon),
        "вторник" => Some(Weekday::Tue),
        "среду" | "среда" => Some(Weekday::Wed),
        "четверг" => Some(Weekday::Thu),
        "пятницу" | "пятница" => Some(Weekday::Fri),
        "субботу" | "суббота" => Some(Weekday::Sat),
        "воскресенье" => Some(Weekday::Sun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn relative_days() {
        let today = date(2024, 6, 1);
        assert_eq!(resolve("сдать через 1 день", today), Some(date(2024, 6, 2)));
        assert_eq!(resolve("через 3 дня", today), Some(date(2024, 6, 4)));
        assert_eq!(resolve("через 30 дней", today), Some(date(2024, 7, 1)));
    }

    #[test]
    fn one_week_equals_seven_days() {
        let today = date(2024, 2, 26);
        assert_eq!(resolve("через неделю", today), resolve("через 7 дней", today));
        assert_eq!(resolve("через 2 недели", today), Some(date(2024, 3, 11)));
    }

    #[test]
    fn calendar_month_not_thirty_days() {
        assert_eq!(resolve("через месяц", date(2024, 1, 15)), Some(date(2024, 2, 15)));
        // Clamped at the end of February.
        assert_eq!(resolve("через месяц", date(2024, 1, 31)), Some(date(2024, 2, 29)));
    }

    #[test]
    fn absolute_date_rolls_forward_when_passed() {
        assert_eq!(resolve("сдать 15.03", date(2024, 6, 1)), Some(date(2025, 3, 15)));
        assert_eq!(resolve("сдать 15.03", date(2024, 1, 1)), Some(date(2024, 3, 15)));
        // Explicit year never rolls.
        assert_eq!(resolve("сдать 15.03.2023", date(2024, 6, 1)), Some(date(2023, 3, 15)));
    }

    #[test]
    fn absolute_date_delimiters() {
        let today = date(2024, 1, 1);
        assert_eq!(resolve("до 20.05", today), Some(date(2024, 5, 20)));
        assert_eq!(resolve("до 20/05", today), Some(date(2024, 5, 20)));
        assert_eq!(resolve("до 20-05", today), Some(date(2024, 5, 20)));
    }

    #[test]
    fn tomorrow_and_after_tomorrow() {
        let today = date(2024, 6, 1);
        assert_eq!(resolve("завтра сдача", today), Some(date(2024, 6, 2)));
        assert_eq!(resolve("послезавтра сдача", today), Some(date(2024, 6, 3)));
    }

    #[test]
    fn weekday_never_resolves_to_today() {
        // 2024-06-03 is a Monday.
        let monday = date(2024, 6, 3);
        assert_eq!(resolve("в понедельник", monday), Some(date(2024, 6, 10)));
        assert_eq!(resolve("в пятницу", monday), Some(date(2024, 6, 7)));
        assert_eq!(resolve("во вторник", monday), Some(date(2024, 6, 4)));
    }

    #[test]
    fn no_pattern_gives_nothing() {
        let today = date(2024, 6, 1);
        assert_eq!(resolve("привет, как дела?", today), None);
        assert_eq!(resolve("", today), None);
    }

    #[test]
    fn invalid_calendar_date_gives_nothing() {
        assert_eq!(resolve("32.13", date(2024, 6, 1)), None);
    }

    #[test]
    fn absurd_counts_give_nothing() {
        let today = date(2024, 6, 1);
        // Beyond the representable duration range.
        assert_eq!(resolve("сдать через 999999999999999 дней", today), None);
        // Does not even fit in an i64.
        assert_eq!(resolve("через 99999999999999999999 дней", today), None);
        // Fits in an i64, overflows when converted to days.
        assert_eq!(resolve("через 2000000000000000000 недель", today), None);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let today = date(2024, 6, 1);
        assert_eq!(resolve("ЧЕРЕЗ НЕДЕЛЮ", today), Some(date(2024, 6, 8)));
        assert_eq!(resolve("Завтра", today), Some(date(2024, 6, 2)));
    }
}
