//! Environment-backed configuration, loaded once at startup.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

const DEFAULT_DATA_FILE: &str = "data/users.json";

#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token. Required.
    pub bot_token: String,
    /// Base64 "client_id:client_secret" for GigaChat. Absent means the
    /// assistant feature is disabled, not that startup fails.
    pub gigachat_credentials: Option<String>,
    /// Explicit path to the schedule scraper script; conventional locations
    /// are probed when unset.
    pub parser_script: Option<PathBuf>,
    /// Where the user profile store lives.
    pub data_file: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bot_token: env::var("TELEGRAM_BOT_TOKEN")
                .context("TELEGRAM_BOT_TOKEN must be set")?,
            gigachat_credentials: non_empty(env::var("GIGACHAT_CREDENTIALS").ok()),
            parser_script: non_empty(env::var("SCHEDULE_PARSER_PATH").ok()).map(PathBuf::from),
            data_file: non_empty(env::var("USER_DATA_FILE").ok())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE)),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_count_as_unset() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("x".to_string())).as_deref(), Some("x"));
    }
}
