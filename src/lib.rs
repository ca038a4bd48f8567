//! # Student Assistant Telegram Bot
//!
//! A Telegram bot for students: group schedule lookup backed by an external
//! scraper, free-text deadline tracking, and a GigaChat assistant relay.

pub mod bot;
pub mod config;
pub mod date_parser;
pub mod deadline_extractor;
pub mod gigachat;
pub mod localization;
pub mod schedule;
pub mod session;
pub mod storage;
pub mod university;
