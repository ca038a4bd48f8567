use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use studmate::bot::{self, AppState};
use studmate::config::Config;
use studmate::gigachat::GigaChatClient;
use studmate::schedule::ScheduleService;
use studmate::session::SessionStore;
use studmate::storage::UserStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting student assistant bot");

    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    let store = UserStore::load(&config.data_file);
    let sessions = SessionStore::new();

    let gigachat = match config.gigachat_credentials.clone() {
        Some(credentials) => Some(GigaChatClient::new(credentials)?),
        None => {
            warn!("GIGACHAT_CREDENTIALS not set, assistant feature disabled");
            None
        }
    };

    let schedule = ScheduleService::discover(config.parser_script.clone());

    let state = Arc::new(AppState {
        store,
        sessions,
        gigachat,
        schedule,
    });

    let bot = Bot::new(&config.bot_token);

    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint({
            let state = Arc::clone(&state);
            move |bot: Bot, msg: Message| {
                let state = Arc::clone(&state);
                async move { bot::message_handler(bot, msg, state).await }
            }
        }))
        .branch(Update::filter_callback_query().endpoint({
            let state = Arc::clone(&state);
            move |bot: Bot, q: teloxide::types::CallbackQuery| {
                let state = Arc::clone(&state);
                async move { bot::callback_handler(bot, q, state).await }
            }
        }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
