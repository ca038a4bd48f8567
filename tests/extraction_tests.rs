//! End-to-end extraction scenarios: free text in, tracked deadline out.

use chrono::{Datelike, Duration, NaiveDate};
use studmate::date_parser;
use studmate::deadline_extractor::extract;
use studmate::storage::UserStore;
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn relative_day_phrases_resolve_exactly() {
    let today = date(2024, 6, 1);
    for n in [1i64, 7, 30] {
        let text = format!("через {n} дней");
        assert_eq!(
            date_parser::resolve(&text, today),
            Some(today + Duration::days(n)),
            "failed for N={n}"
        );
    }
}

#[test]
fn a_week_means_seven_days_for_any_now() {
    for offset in 0..14 {
        let today = date(2024, 2, 20) + Duration::days(offset);
        assert_eq!(
            date_parser::resolve("через неделю", today),
            date_parser::resolve("через 7 дней", today)
        );
    }
}

#[test]
fn absolute_date_year_rollover() {
    // Already passed this year: rolls forward.
    assert_eq!(
        date_parser::resolve("сдать 15.03", date(2024, 6, 1)),
        Some(date(2025, 3, 15))
    );
    // Not yet passed: stays in the current year.
    assert_eq!(
        date_parser::resolve("сдать 15.03", date(2024, 1, 1)),
        Some(date(2024, 3, 15))
    );
}

#[test]
fn named_weekday_on_that_weekday_is_next_week() {
    let monday = date(2024, 6, 3);
    assert_eq!(monday.weekday(), chrono::Weekday::Mon);
    assert_eq!(
        date_parser::resolve("в понедельник", monday),
        Some(monday + Duration::days(7))
    );
}

#[test]
fn deadline_text_becomes_a_draft() {
    let today = date(2024, 6, 1);
    let draft = extract("написать реферат по истории, дедлайн через 3 дня", today).unwrap();
    assert!(draft.title.to_lowercase().contains("реферат"));
    assert_eq!(draft.subject.as_deref(), Some("истории"));
    assert_eq!(draft.due_date, today + Duration::days(3));
}

#[test]
fn greetings_and_dateless_texts_are_not_deadlines() {
    let today = date(2024, 6, 1);
    assert!(extract("привет, как дела?", today).is_none());
    assert!(extract("реферат по физике", today).is_none());
}

#[test]
fn extracted_draft_persists_as_an_active_deadline() {
    let dir = TempDir::new().unwrap();
    let store = UserStore::load(dir.path().join("users.json"));
    let today = date(2024, 6, 1);

    let draft = extract("сдать курсовую по экономике до 20.12", today).unwrap();
    let deadline = store.add_deadline(42, draft);

    assert!(!deadline.completed);
    assert!(deadline.id.starts_with("deadline_"));
    assert_eq!(deadline.due_date.date_naive(), date(2024, 12, 20));

    let active = store.active_deadlines(42);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, deadline.id);
}
