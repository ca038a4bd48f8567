//! Bot module for handling Telegram interactions
//!
//! Split into submodules:
//! - `message_handler`: commands and mode-routed text messages
//! - `callback_handler`: inline keyboard callbacks
//! - `ui_builder`: keyboards, list formatting and chunked sending

pub mod callback_handler;
pub mod message_handler;
pub mod ui_builder;

pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

use crate::gigachat::GigaChatClient;
use crate::schedule::ScheduleService;
use crate::session::SessionStore;
use crate::storage::UserStore;

/// Everything the handlers share, injected once at startup.
pub struct AppState {
    pub store: UserStore,
    pub sessions: SessionStore,
    /// `None` when credentials are not configured; the feature degrades to
    /// an explanatory message.
    pub gigachat: Option<GigaChatClient>,
    pub schedule: ScheduleService,
}
