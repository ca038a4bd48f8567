//! Heuristic extraction of deadlines from free-form Russian text.
//!
//! A message is treated as a deadline only when it both mentions an academic
//! deliverable (keyword gate) and contains a parseable date expression.
//! Requiring the date filters out the keyword gate's false positives.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::date_parser;

/// An extracted-but-not-yet-persisted deadline. The store assigns
/// `id` / `created_at` / `completed` when it is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlineDraft {
    pub title: String,
    pub subject: Option<String>,
    pub due_date: NaiveDate,
    pub description: String,
}

/// Keywords that mark a message as being about an academic deliverable.
const DEADLINE_KEYWORDS: &[&str] = &[
    "дедлайн",
    "сдать",
    "сделать",
    "написать",
    "подготовить",
    "курсовая",
    "курсач",
    "реферат",
    "домашка",
    "домашняя работа",
    "лабораторная",
    "лаба",
    "контрольная",
    "диплом",
    "дипломная",
    "проект",
    "эссе",
    "сочинение",
    "отчет",
    "презентация",
];

/// Work-type keyword to canonical title. Longer forms come first so that a
/// substring ("лаба" inside "лабораторная") never shadows the full word.
const WORK_TYPES: &[(&str, &str)] = &[
    ("курсовая", "Курсовая работа"),
    ("курсач", "Курсовая работа"),
    ("реферат", "Реферат"),
    ("домашняя работа", "Домашняя работа"),
    ("домашка", "Домашняя работа"),
    ("лабораторная", "Лабораторная работа"),
    ("лаба", "Лабораторная работа"),
    ("контрольная", "Контрольная работа"),
    ("дипломная", "Дипломная работа"),
    ("диплом", "Дипломная работа"),
    ("проект", "Проект"),
    ("эссе", "Эссе"),
    ("сочинение", "Сочинение"),
    ("отчет", "Отчет"),
    ("презентация", "Презентация"),
];

const MAX_DESCRIPTION_CHARS: usize = 200;
const MAX_TITLE_CHARS: usize = 50;
const MAX_SUBJECT_CHARS: usize = 50;

lazy_static! {
    // Cue word followed by the subject token. Word-bounded so that "по"
    // inside "подготовить" does not trigger.
    static ref SUBJECT_CUE: Regex =
        Regex::new(r"(?i)\b(?:по|предмет|дисциплина)\s+([^\s.,;:!?]+)").expect("valid pattern");
}

/// Extract a deadline draft from `text`, resolving relative dates against
/// `today`. Returns `None` when the text is not about a deadline or carries
/// no parseable date.
pub fn extract(text: &str, today: NaiveDate) -> Option<DeadlineDraft> {
    let lower = text.to_lowercase();

    if !DEADLINE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return None;
    }

    let due_date = date_parser::resolve(text, today)?;

    Some(DeadlineDraft {
        title: extract_title(text, &lower),
        subject: extract_subject(text),
        due_date,
        description: truncate_chars(text, MAX_DESCRIPTION_CHARS),
    })
}

/// Derive a title: canonical work-type label, optionally with the first
/// substantial word that follows the keyword ("Реферат по истории").
fn extract_title(text: &str, lower: &str) -> String {
    for (keyword, label) in WORK_TYPES {
        if let Some(pos) = lower.find(keyword) {
            let after = text
                .get(pos + keyword.len()..)
                .unwrap_or("")
                .trim_start();
            if let Some(word) = first_substantial_word(after) {
                return format!("{label} по {word}");
            }
            return (*label).to_string();
        }
    }

    // No known work type: fall back to the first words of the message.
    let head: Vec<&str> = text.split_whitespace().take(5).collect();
    truncate_chars(&head.join(" "), MAX_TITLE_CHARS)
}

/// Find the subject after a preposition-like cue, independent of the title.
fn extract_subject(text: &str) -> Option<String> {
    let caps = SUBJECT_CUE.captures(text)?;
    let token = clean_token(caps.get(1)?.as_str());
    if token.chars().count() > 2 {
        Some(truncate_chars(token, MAX_SUBJECT_CHARS))
    } else {
        None
    }
}

fn first_substantial_word(after: &str) -> Option<&str> {
    let word = clean_token(after.split_whitespace().next()?);
    if word.chars().count() > 2 {
        Some(word)
    } else {
        None
    }
}

fn clean_token(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_alphanumeric())
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let cut: String = text.chars().take(limit).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn extracts_full_draft() {
        let draft =
            extract("написать реферат по истории, дедлайн через 3 дня", today()).unwrap();
        assert!(draft.title.to_lowercase().contains("реферат"));
        assert_eq!(draft.subject.as_deref(), Some("истории"));
        assert_eq!(draft.due_date, today() + Duration::days(3));
        assert_eq!(draft.description, "написать реферат по истории, дедлайн через 3 дня");
    }

    #[test]
    fn no_keyword_means_no_deadline() {
        assert_eq!(extract("привет, как дела?", today()), None);
    }

    #[test]
    fn keyword_without_date_means_no_deadline() {
        assert_eq!(extract("реферат по физике", today()), None);
    }

    #[test]
    fn canonical_work_type_titles() {
        let draft = extract("курсач до 20.12", today()).unwrap();
        assert_eq!(draft.title, "Курсовая работа");

        // "по" is too short to count as the word following the keyword.
        let draft = extract("лабораторная по физике завтра", today()).unwrap();
        assert_eq!(draft.title, "Лабораторная работа");

        let draft = extract("реферат истории сдать завтра", today()).unwrap();
        assert_eq!(draft.title, "Реферат по истории");
    }

    #[test]
    fn subject_is_independent_of_title() {
        let draft = extract("сдать отчет, дисциплина экономика, через неделю", today()).unwrap();
        assert_eq!(draft.subject.as_deref(), Some("экономика"));
    }

    #[test]
    fn short_cue_targets_are_skipped() {
        // Token after "по" is too short to be a subject.
        let draft = extract("сдать эссе по ИИ завтра", today()).unwrap();
        assert_eq!(draft.subject, None);
    }

    #[test]
    fn long_description_is_truncated() {
        let filler = "а".repeat(300);
        let text = format!("дедлайн завтра {filler}");
        let draft = extract(&text, today()).unwrap();
        assert_eq!(draft.description.chars().count(), MAX_DESCRIPTION_CHARS + 3);
        assert!(draft.description.ends_with("..."));
    }
}
