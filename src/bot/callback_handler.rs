//! Inline keyboard callback dispatch.

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{debug, error, info, warn};

use crate::localization::{t, t_args};
use crate::schedule::format_schedule;
use crate::session::ChatMode;

use super::ui_builder::{
    back_keyboard, deadlines_keyboard, format_deadlines, main_menu_keyboard,
    popular_universities_hint, schedule_keyboard, send_chunked,
};
use super::AppState;

/// Top-level callback endpoint with the same backstop as the message path.
pub async fn callback_handler(bot: Bot, q: CallbackQuery, state: Arc<AppState>) -> Result<()> {
    let chat_id = q
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or(ChatId(q.from.id.0 as i64));

    if let Err(e) = handle_callback(&bot, &q, chat_id, &state).await {
        error!(user_id = %q.from.id, error = %e, "Callback handler failed");
        let _ = bot.send_message(chat_id, t("generic-error")).await;
    }

    // Always answered, or the button keeps its loading spinner.
    bot.answer_callback_query(q.id).await?;
    Ok(())
}

async fn handle_callback(
    bot: &Bot,
    q: &CallbackQuery,
    chat_id: ChatId,
    state: &AppState,
) -> Result<()> {
    let user_id = q.from.id.0;
    let action = q.data.as_deref().unwrap_or("");
    debug!(%user_id, %action, "Received callback query");

    match action {
        "first_time" => start_onboarding(bot, chat_id, state, user_id).await?,
        "schedule" => send_schedule(bot, chat_id, state, user_id, false).await?,
        "refresh_schedule" => send_schedule(bot, chat_id, state, user_id, true).await?,
        "gigachat" => {
            state.sessions.set(user_id, ChatMode::AiChat);
            info!(%user_id, "AI chat mode activated");
            bot.send_message(chat_id, t("gigachat-welcome"))
                .reply_markup(back_keyboard())
                .await?;
        }
        "deadlines" => send_deadlines(bot, chat_id, state, user_id).await?,
        "deadline_edit" => {
            if state.store.active_deadlines(user_id).is_empty() {
                bot.send_message(chat_id, t("deadlines-empty"))
                    .reply_markup(back_keyboard())
                    .await?;
            } else {
                state.sessions.set(user_id, ChatMode::AwaitingDeadlineEdit);
                bot.send_message(chat_id, t("ask-deadline-edit")).await?;
            }
        }
        "deadline_delete" => {
            if state.store.active_deadlines(user_id).is_empty() {
                bot.send_message(chat_id, t("deadlines-empty"))
                    .reply_markup(back_keyboard())
                    .await?;
            } else {
                state.sessions.set(user_id, ChatMode::AwaitingDeadlineDelete);
                bot.send_message(chat_id, t("ask-deadline-delete")).await?;
            }
        }
        "back" => {
            state.sessions.clear(user_id);
            bot.send_message(chat_id, t("main-menu"))
                .reply_markup(main_menu_keyboard())
                .await?;
        }
        "help" => {
            bot.send_message(chat_id, t("help-message"))
                .reply_markup(back_keyboard())
                .await?;
        }
        done if done.starts_with("done_") => {
            complete_deadline(bot, chat_id, state, user_id, done).await?
        }
        other => {
            debug!(%user_id, action = %other, "Ignoring unknown callback action");
        }
    }
    Ok(())
}

async fn start_onboarding(bot: &Bot, chat_id: ChatId, state: &AppState, user_id: u64) -> Result<()> {
    state.sessions.set(user_id, ChatMode::AwaitingUniversity);
    let prompt = format!("{}\n\n{}", t("ask-university"), popular_universities_hint());
    bot.send_message(chat_id, prompt).await?;
    Ok(())
}

async fn send_schedule(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    user_id: u64,
    force_refresh: bool,
) -> Result<()> {
    if !state.store.is_complete(user_id) {
        bot.send_message(chat_id, t("schedule-need-onboarding")).await?;
        return start_onboarding(bot, chat_id, state, user_id).await;
    }

    if !force_refresh {
        if let Some(cached) = state.store.cached_schedule(user_id) {
            debug!(%user_id, "Serving schedule from cache");
            send_chunked(bot, chat_id, &format_schedule(&cached), Some(schedule_keyboard()))
                .await?;
            return Ok(());
        }
    }

    if !state.schedule.is_available() {
        warn!(%user_id, "Schedule requested but scraper is unavailable");
        bot.send_message(chat_id, t("schedule-unavailable"))
            .reply_markup(back_keyboard())
            .await?;
        return Ok(());
    }

    // Both present: the profile is complete.
    let profile = state.store.get(user_id).unwrap_or_default();
    let slug = profile.university.unwrap_or_default();
    let group = profile.group.unwrap_or_default();

    bot.send_message(chat_id, t("schedule-loading")).await?;

    match state.schedule.fetch(&slug, &group).await {
        Ok(doc) => {
            state.store.cache_schedule(user_id, doc.clone());
            info!(%user_id, %slug, %group, "Schedule fetched and cached");
            send_chunked(bot, chat_id, &format_schedule(&doc), Some(schedule_keyboard())).await?;
        }
        Err(e) => {
            error!(%user_id, %slug, %group, error = %e, "Schedule fetch failed");
            bot.send_message(
                chat_id,
                t_args("schedule-error", &[("error", &e.to_string())]),
            )
            .reply_markup(back_keyboard())
            .await?;
        }
    }
    Ok(())
}

async fn send_deadlines(bot: &Bot, chat_id: ChatId, state: &AppState, user_id: u64) -> Result<()> {
    let active = state.store.active_deadlines(user_id);
    if active.is_empty() {
        bot.send_message(chat_id, t("deadlines-empty"))
            .reply_markup(deadlines_keyboard(&active))
            .await?;
        return Ok(());
    }

    let text = format!("{}\n\n{}", t("deadlines-title"), format_deadlines(&active));
    send_chunked(bot, chat_id, &text, Some(deadlines_keyboard(&active))).await?;
    Ok(())
}

async fn complete_deadline(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    user_id: u64,
    action: &str,
) -> Result<()> {
    // The button carries the deadline id, so the press stays valid even
    // when the list has changed since the keyboard was sent.
    let deadline_id = action.trim_start_matches("done_");
    if state.store.complete_deadline(user_id, deadline_id) {
        info!(%user_id, %deadline_id, "Deadline completed");
        bot.send_message(chat_id, t("deadline-completed")).await?;
    }
    // Show the refreshed list either way.
    send_deadlines(bot, chat_id, state, user_id).await
}
