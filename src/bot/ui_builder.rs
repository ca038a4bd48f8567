//! Keyboards, list formatting and chunked sending.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::localization::t;
use crate::storage::Deadline;
use crate::university;

/// Telegram rejects messages longer than this.
const TELEGRAM_MESSAGE_LIMIT: usize = 4096;
/// Chunk size used when a reply has to be split.
const CHUNK_CHARS: usize = 4000;

/// How many per-deadline "done" buttons fit comfortably on one keyboard.
const MAX_DONE_BUTTONS: usize = 10;

pub fn start_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "Начать",
        "first_time",
    )]])
}

pub fn main_menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("📅 Расписание", "schedule"),
            InlineKeyboardButton::callback("🤖 GigaChat", "gigachat"),
        ],
        vec![InlineKeyboardButton::callback("⏰ Дедлайны", "deadlines")],
        vec![InlineKeyboardButton::callback("Помощь❓", "help")],
    ])
}

pub fn back_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "🔙 В главное меню",
        "back",
    )]])
}

pub fn schedule_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("🔄 Обновить", "refresh_schedule")],
        vec![InlineKeyboardButton::callback("🔙 В главное меню", "back")],
    ])
}

/// Management keyboard under the deadline list: one "done" button per item,
/// then edit/delete entry points.
pub fn deadlines_keyboard(active: &[Deadline]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    // Buttons carry the deadline id, so a press on a stale list message
    // still completes the deadline it shows.
    let done_buttons: Vec<InlineKeyboardButton> = active
        .iter()
        .take(MAX_DONE_BUTTONS)
        .enumerate()
        .map(|(i, d)| {
            InlineKeyboardButton::callback(format!("✅ {}", i + 1), format!("done_{}", d.id))
        })
        .collect();
    for row in done_buttons.chunks(5) {
        rows.push(row.to_vec());
    }

    if !active.is_empty() {
        rows.push(vec![
            InlineKeyboardButton::callback("✏️ Изменить", "deadline_edit"),
            InlineKeyboardButton::callback("🗑️ Удалить", "deadline_delete"),
        ]);
    }
    rows.push(vec![InlineKeyboardButton::callback("🔙 В главное меню", "back")]);

    InlineKeyboardMarkup::new(rows)
}

/// Numbered active-deadline list, soonest first.
pub fn format_deadlines(active: &[Deadline]) -> String {
    let mut result = String::new();
    for (i, deadline) in active.iter().enumerate() {
        result.push_str(&format!(
            "{}. 📌 {} — до {}\n",
            i + 1,
            deadline.title,
            deadline.due_date.format("%d.%m.%Y")
        ));
        if let Some(subject) = &deadline.subject {
            result.push_str(&format!("   Предмет: {subject}\n"));
        }
        if let Some(description) = &deadline.description {
            result.push_str(&format!("   {description}\n"));
        }
    }
    result
}

/// Onboarding hint listing well-known universities.
pub fn popular_universities_hint() -> String {
    let mut result = t("popular-universities-title");
    result.push('\n');
    for (name, slug) in university::popular_universities() {
        result.push_str(&format!("• {name} ({slug})\n"));
    }
    result
}

/// Split an over-long reply into chunks Telegram will accept.
/// Splits on char boundaries; anything at or under the limit stays whole.
pub fn split_message(text: &str) -> Vec<String> {
    if text.chars().count() <= TELEGRAM_MESSAGE_LIMIT {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(CHUNK_CHARS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Send a reply, splitting when needed. The keyboard rides only on the
/// final chunk.
pub async fn send_chunked(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<()> {
    let chunks = split_message(text);
    let last = chunks.len() - 1;
    for (i, chunk) in chunks.into_iter().enumerate() {
        let request = bot.send_message(chat_id, chunk);
        if i == last {
            if let Some(keyboard) = keyboard {
                request.reply_markup(keyboard).await?;
                break;
            }
        }
        request.await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn deadline(title: &str, day: u32) -> Deadline {
        Deadline {
            id: format!("deadline_{day}"),
            title: title.to_string(),
            subject: None,
            due_date: Utc.with_ymd_and_hms(2024, 12, day, 23, 59, 59).unwrap(),
            created_at: Utc::now(),
            description: None,
            completed: false,
        }
    }

    #[test]
    fn short_message_is_one_chunk() {
        assert_eq!(split_message("привет").len(), 1);
    }

    #[test]
    fn long_message_is_split_within_limits() {
        let text = "ж".repeat(9000);
        let chunks = split_message(&text);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4000));
        assert_eq!(chunks.iter().map(|c| c.chars().count()).sum::<usize>(), 9000);
    }

    #[test]
    fn boundary_message_stays_whole() {
        let text = "a".repeat(4096);
        assert_eq!(split_message(&text).len(), 1);
    }

    #[test]
    fn deadline_list_is_numbered_with_dates() {
        let list = vec![deadline("Курсовая работа", 20), deadline("Реферат", 25)];
        let text = format_deadlines(&list);
        assert!(text.contains("1. 📌 Курсовая работа — до 20.12.2024"));
        assert!(text.contains("2. 📌 Реферат — до 25.12.2024"));
    }

    #[test]
    fn done_buttons_carry_deadline_ids() {
        use teloxide::types::InlineKeyboardButtonKind;

        let list = vec![deadline("Курсовая работа", 20), deadline("Реферат", 25)];
        let keyboard = deadlines_keyboard(&list);

        let data: Vec<&str> = keyboard.inline_keyboard[0]
            .iter()
            .map(|button| match &button.kind {
                InlineKeyboardButtonKind::CallbackData(data) => data.as_str(),
                other => panic!("unexpected button kind: {other:?}"),
            })
            .collect();
        assert_eq!(data, vec!["done_deadline_20", "done_deadline_25"]);
    }

    #[test]
    fn empty_list_has_no_management_rows() {
        let keyboard = deadlines_keyboard(&[]);
        // Only the "back" row remains.
        assert_eq!(keyboard.inline_keyboard.len(), 1);
    }
}
