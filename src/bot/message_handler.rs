//! Inbound message dispatch.
//!
//! A text message is interpreted according to the user's current
//! conversation mode: consumed as an onboarding field, as a deadline
//! edit/delete command, relayed to GigaChat, or answered with the menu.
//! Awaiting modes are cleared on success and kept on bad input so the user
//! can retry; the literal «отмена» always clears them.

use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use teloxide::prelude::*;
use tracing::{debug, error, info, warn};

use crate::deadline_extractor::{self, DeadlineDraft};
use crate::gigachat::GigaChatError;
use crate::localization::{t, t_args};
use crate::session::ChatMode;
use crate::university;

use super::ui_builder::{
    back_keyboard, main_menu_keyboard, popular_universities_hint, send_chunked, start_keyboard,
};
use super::AppState;

const CANCEL_TOKENS: &[&str] = &["отмена", "cancel"];

fn is_cancellation(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    CANCEL_TOKENS.iter().any(|token| *token == normalized)
}

/// Top-level message endpoint. The final backstop: a failing branch is
/// logged and answered with a generic apology, never propagated.
pub async fn message_handler(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    if let Err(e) = handle_message(&bot, &msg, &state).await {
        error!(chat_id = %msg.chat.id, error = %e, "Message handler failed");
        let _ = bot.send_message(msg.chat.id, t("generic-error")).await;
    }
    Ok(())
}

async fn handle_message(bot: &Bot, msg: &Message, state: &AppState) -> Result<()> {
    let text = match msg.text() {
        Some(text) => text,
        None => return Ok(()),
    };
    let user_id = match msg.from.as_ref() {
        Some(user) => user.id.0,
        None => {
            debug!(chat_id = %msg.chat.id, "Message without a sender, skipping");
            return Ok(());
        }
    };

    debug!(%user_id, message_length = text.len(), "Received text message");

    // Commands bypass mode handling entirely.
    if text.starts_with('/') {
        return handle_command(bot, msg, text).await;
    }

    match state.sessions.get(user_id) {
        ChatMode::Idle => {
            bot.send_message(msg.chat.id, t("unknown-input")).await?;
            bot.send_message(msg.chat.id, t("main-menu"))
                .reply_markup(main_menu_keyboard())
                .await?;
        }
        ChatMode::AwaitingUniversity => {
            handle_university_input(bot, msg, state, user_id, text).await?
        }
        ChatMode::AwaitingGroup => handle_group_input(bot, msg, state, user_id, text).await?,
        ChatMode::AwaitingDeadlineEdit => {
            handle_deadline_edit(bot, msg, state, user_id, text).await?
        }
        ChatMode::AwaitingDeadlineDelete => {
            handle_deadline_delete(bot, msg, state, user_id, text).await?
        }
        ChatMode::AiChat => handle_ai_chat(bot, msg, state, user_id, text).await?,
    }
    Ok(())
}

async fn handle_command(bot: &Bot, msg: &Message, text: &str) -> Result<()> {
    match text {
        "/start" => {
            bot.send_message(msg.chat.id, t("welcome-message"))
                .reply_markup(start_keyboard())
                .await?;
        }
        "/help" => {
            bot.send_message(msg.chat.id, t("help-message"))
                .reply_markup(back_keyboard())
                .await?;
        }
        _ => {
            bot.send_message(msg.chat.id, t("unknown-input"))
                .reply_markup(main_menu_keyboard())
                .await?;
        }
    }
    Ok(())
}

async fn cancel_mode(bot: &Bot, msg: &Message, state: &AppState, user_id: u64) -> Result<()> {
    state.sessions.clear(user_id);
    bot.send_message(msg.chat.id, t("onboarding-cancelled")).await?;
    bot.send_message(msg.chat.id, t("main-menu"))
        .reply_markup(main_menu_keyboard())
        .await?;
    Ok(())
}

async fn handle_university_input(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    user_id: u64,
    text: &str,
) -> Result<()> {
    if is_cancellation(text) {
        return cancel_mode(bot, msg, state, user_id).await;
    }

    match university::name_to_slug(text) {
        Some(slug) => {
            state.store.set_university(user_id, &slug);
            state.sessions.set(user_id, ChatMode::AwaitingGroup);
            info!(%user_id, %slug, "University saved");
            bot.send_message(msg.chat.id, t_args("university-saved", &[("slug", &slug)]))
                .await?;
            bot.send_message(msg.chat.id, t("ask-group")).await?;
        }
        None => {
            // Mode kept so the user can retry.
            let mut reply = t("university-not-found");
            let similar = university::find_similar(text);
            if !similar.is_empty() {
                reply.push_str("\n\nПохожие вузы:\n");
                for (name, slug) in similar {
                    reply.push_str(&format!("• {name} ({slug})\n"));
                }
            } else {
                reply.push_str("\n\n");
                reply.push_str(&popular_universities_hint());
            }
            bot.send_message(msg.chat.id, reply).await?;
        }
    }
    Ok(())
}

async fn handle_group_input(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    user_id: u64,
    text: &str,
) -> Result<()> {
    if is_cancellation(text) {
        return cancel_mode(bot, msg, state, user_id).await;
    }

    let group = text.trim();
    if group.is_empty() {
        bot.send_message(msg.chat.id, t("ask-group")).await?;
        return Ok(());
    }

    state.store.set_group(user_id, group);
    state.sessions.clear(user_id);
    info!(%user_id, %group, "Group saved, onboarding complete");
    bot.send_message(msg.chat.id, t("group-saved"))
        .reply_markup(main_menu_keyboard())
        .await?;
    Ok(())
}

async fn handle_deadline_edit(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    user_id: u64,
    text: &str,
) -> Result<()> {
    if is_cancellation(text) {
        return cancel_mode(bot, msg, state, user_id).await;
    }

    let active = state.store.active_deadlines(user_id);
    let (index, rest) = match parse_edit_command(text, active.len()) {
        Some(parsed) => parsed,
        None => {
            bot.send_message(msg.chat.id, t("deadline-bad-index")).await?;
            return Ok(());
        }
    };

    let draft = match deadline_extractor::extract(rest, today()) {
        Some(draft) => draft,
        None => {
            // No parseable date in the replacement text: the edit is
            // discarded rather than applied partially.
            state.sessions.clear(user_id);
            bot.send_message(msg.chat.id, t("deadline-edit-no-date"))
                .reply_markup(main_menu_keyboard())
                .await?;
            return Ok(());
        }
    };

    apply_edit(state, user_id, &active[index].id, draft.clone());
    state.sessions.clear(user_id);

    let date = draft.due_date.format("%d.%m.%Y").to_string();
    bot.send_message(
        msg.chat.id,
        t_args("deadline-updated", &[("title", &draft.title), ("date", &date)]),
    )
    .reply_markup(main_menu_keyboard())
    .await?;
    Ok(())
}

/// "<1-based index> <new deadline text>" over the active list.
fn parse_edit_command(text: &str, active_len: usize) -> Option<(usize, &str)> {
    let trimmed = text.trim();
    let (index_str, rest) = trimmed.split_once(char::is_whitespace)?;
    let index = index_str.parse::<usize>().ok()?.checked_sub(1)?;
    if index >= active_len || rest.trim().is_empty() {
        return None;
    }
    Some((index, rest.trim()))
}

fn apply_edit(state: &AppState, user_id: u64, deadline_id: &str, draft: DeadlineDraft) {
    state.store.update_deadline(user_id, deadline_id, |d| {
        d.title = draft.title;
        d.subject = draft.subject;
        d.due_date = draft
            .due_date
            .and_hms_opt(23, 59, 59)
            .unwrap_or_else(|| draft.due_date.and_time(chrono::NaiveTime::MIN))
            .and_utc();
        d.description = Some(draft.description);
    });
}

async fn handle_deadline_delete(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    user_id: u64,
    text: &str,
) -> Result<()> {
    if is_cancellation(text) {
        return cancel_mode(bot, msg, state, user_id).await;
    }

    let active = state.store.active_deadlines(user_id);
    let index = text
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|i| i.checked_sub(1))
        .filter(|i| *i < active.len());

    match index {
        Some(index) => {
            state.store.remove_deadline(user_id, &active[index].id);
            state.sessions.clear(user_id);
            info!(%user_id, deadline_id = %active[index].id, "Deadline deleted");
            bot.send_message(msg.chat.id, t("deadline-deleted"))
                .reply_markup(main_menu_keyboard())
                .await?;
        }
        None => {
            bot.send_message(msg.chat.id, t("deadline-bad-index")).await?;
        }
    }
    Ok(())
}

async fn handle_ai_chat(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    user_id: u64,
    text: &str,
) -> Result<()> {
    let client = match &state.gigachat {
        Some(client) => client,
        None => {
            warn!(%user_id, "GigaChat requested but credentials are not configured");
            bot.send_message(msg.chat.id, t("gigachat-not-configured"))
                .reply_markup(back_keyboard())
                .await?;
            return Ok(());
        }
    };

    bot.send_message(msg.chat.id, t("gigachat-thinking")).await?;

    match client.send_message(text).await {
        Ok(reply) => {
            let mut full_reply = reply.clone();

            // Opportunistic deadline capture: the question plus the answer
            // may spell out a deliverable and a date.
            let combined = format!("{text}\n{reply}");
            if let Some(draft) = deadline_extractor::extract(&combined, today()) {
                let deadline = state.store.add_deadline(user_id, draft);
                let date = deadline.due_date.format("%d.%m.%Y").to_string();
                info!(%user_id, deadline_id = %deadline.id, "Deadline captured from AI chat");
                full_reply.push_str("\n\n");
                full_reply.push_str(&t_args(
                    "deadline-created",
                    &[("title", deadline.title.as_str()), ("date", date.as_str())],
                ));
            }

            send_chunked(bot, msg.chat.id, &full_reply, Some(back_keyboard())).await?;
        }
        Err(e) => {
            error!(%user_id, error = %e, "GigaChat request failed");
            let reply = match e {
                GigaChatError::Auth => t("gigachat-not-configured"),
                GigaChatError::RateLimited => t("gigachat-rate-limited"),
                GigaChatError::Api(_) | GigaChatError::Network(_) => t("gigachat-error"),
            };
            bot.send_message(msg.chat.id, reply)
                .reply_markup(back_keyboard())
                .await?;
        }
    }
    Ok(())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_tokens() {
        assert!(is_cancellation("отмена"));
        assert!(is_cancellation("  Отмена  "));
        assert!(is_cancellation("CANCEL"));
        assert!(!is_cancellation("отменить"));
    }

    #[test]
    fn edit_command_parsing() {
        assert_eq!(
            parse_edit_command("2 сдать отчет завтра", 3),
            Some((1, "сдать отчет завтра"))
        );
        // Out of range, zero, non-numeric, or missing text.
        assert_eq!(parse_edit_command("4 сдать отчет завтра", 3), None);
        assert_eq!(parse_edit_command("0 сдать отчет завтра", 3), None);
        assert_eq!(parse_edit_command("два сдать отчет", 3), None);
        assert_eq!(parse_edit_command("2", 3), None);
        assert_eq!(parse_edit_command("2   ", 3), None);
    }
}
