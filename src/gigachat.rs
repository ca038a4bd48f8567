//! GigaChat API client.
//!
//! Two-step protocol: a client-credentials OAuth exchange at the NGW
//! endpoint produces a short-lived bearer token, then completions go to the
//! chat API with that token. The token is cached across calls; a 401 from
//! the completions endpoint invalidates it and triggers exactly one
//! transparent refresh-and-retry, so a persistently broken credential fails
//! fast instead of looping.

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

const OAUTH_URL: &str = "https://ngw.devices.sberbank.ru:9443/api/v2/oauth";
const CHAT_URL: &str = "https://gigachat.devices.sberbank.ru/api/v1/chat/completions";

const OAUTH_TIMEOUT: Duration = Duration::from_secs(10);
const CHAT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum GigaChatError {
    #[error("авторизация в GigaChat не удалась")]
    Auth,
    #[error("превышен лимит запросов GigaChat")]
    RateLimited,
    #[error("ошибка GigaChat API: {0}")]
    Api(String),
    #[error("сетевая ошибка GigaChat: {0}")]
    Network(#[from] reqwest::Error),
}

/// What to do after a completions attempt came back.
#[derive(Debug, PartialEq, Eq)]
enum AuthAction {
    Accept,
    RefreshAndRetry,
    Fail,
}

/// One retry on token expiry, never more.
fn next_action(status: StatusCode, already_retried: bool) -> AuthAction {
    match status {
        StatusCode::UNAUTHORIZED if !already_retried => AuthAction::RefreshAndRetry,
        StatusCode::UNAUTHORIZED => AuthAction::Fail,
        _ => AuthAction::Accept,
    }
}

pub struct GigaChatClient {
    http: reqwest::Client,
    /// Base64-encoded "client_id:client_secret".
    credentials: String,
    token: Mutex<Option<String>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl GigaChatClient {
    pub fn new(credentials: String) -> Result<Self, GigaChatError> {
        // The NGW endpoints present certificates from the Russian trusted
        // root CA, which is absent from standard trust stores.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            http,
            credentials,
            token: Mutex::new(None),
        })
    }

    /// Send one user message and return the assistant's reply.
    pub async fn send_message(&self, message: &str) -> Result<String, GigaChatError> {
        let token = self.current_token().await?;

        let response = self.complete(&token, message).await?;
        match next_action(response.status(), false) {
            AuthAction::Accept => Self::read_reply(response).await,
            AuthAction::RefreshAndRetry => {
                warn!("GigaChat token rejected, refreshing once");
                let token = self.refresh_token().await?;
                let response = self.complete(&token, message).await?;
                match next_action(response.status(), true) {
                    AuthAction::Accept => Self::read_reply(response).await,
                    _ => Err(GigaChatError::Auth),
                }
            }
            AuthAction::Fail => Err(GigaChatError::Auth),
        }
    }

    async fn complete(&self, token: &str, message: &str) -> Result<reqwest::Response, GigaChatError> {
        let body = serde_json::json!({
            "model": "GigaChat",
            "messages": [{"role": "user", "content": message}],
            "temperature": 0.7,
            "max_tokens": 1024,
        });

        let response = self
            .http
            .post(CHAT_URL)
            .timeout(CHAT_TIMEOUT)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        Ok(response)
    }

    async fn read_reply(response: reqwest::Response) -> Result<String, GigaChatError> {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GigaChatError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "GigaChat API error");
            return Err(GigaChatError::Api(format!("HTTP {status}")));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GigaChatError::Api("empty choices in response".to_string()))
    }

    /// Cached token, or a fresh one when none is cached yet.
    async fn current_token(&self) -> Result<String, GigaChatError> {
        let mut token = self.token.lock().await;
        if let Some(token) = token.as_ref() {
            return Ok(token.clone());
        }
        let fresh = self.request_token().await?;
        *token = Some(fresh.clone());
        Ok(fresh)
    }

    async fn refresh_token(&self) -> Result<String, GigaChatError> {
        let mut token = self.token.lock().await;
        let fresh = self.request_token().await?;
        *token = Some(fresh.clone());
        Ok(fresh)
    }

    async fn request_token(&self) -> Result<String, GigaChatError> {
        debug!("Requesting GigaChat access token");
        let response = self
            .http
            .post(OAUTH_URL)
            .timeout(OAUTH_TIMEOUT)
            .header("Authorization", format!("Basic {}", self.credentials))
            .header("RqUID", rq_uid())
            .header("Accept", "application/json")
            .form(&[("scope", "GIGACHAT_API_PERS")])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GigaChatError::RateLimited);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GigaChatError::Auth);
        }
        if !status.is_success() {
            return Err(GigaChatError::Api(format!("token exchange failed: HTTP {status}")));
        }

        let parsed: TokenResponse = response.json().await?;
        Ok(parsed.access_token)
    }
}

/// UUID-v4-shaped request id the OAuth endpoint insists on.
fn rq_uid() -> String {
    let mut rng = rand::thread_rng();
    let mut out = String::with_capacity(36);
    for c in "xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx".chars() {
        match c {
            'x' => out.push(std::char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0')),
            'y' => out.push(std::char::from_digit(rng.gen_range(8..12), 16).unwrap_or('8')),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_once_on_unauthorized() {
        assert_eq!(
            next_action(StatusCode::UNAUTHORIZED, false),
            AuthAction::RefreshAndRetry
        );
        assert_eq!(next_action(StatusCode::UNAUTHORIZED, true), AuthAction::Fail);
    }

    #[test]
    fn non_auth_statuses_pass_through() {
        assert_eq!(next_action(StatusCode::OK, false), AuthAction::Accept);
        assert_eq!(next_action(StatusCode::TOO_MANY_REQUESTS, false), AuthAction::Accept);
        assert_eq!(next_action(StatusCode::INTERNAL_SERVER_ERROR, true), AuthAction::Accept);
    }

    #[test]
    fn rq_uid_is_uuid_shaped() {
        let id = rq_uid();
        assert_eq!(id.len(), 36);
        assert_eq!(id.chars().filter(|c| *c == '-').count(), 4);
        assert_eq!(id.as_bytes()[14], b'4');
    }
}
