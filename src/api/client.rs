/// HTTP client for the notification endpoints of the backend API.
/// Every request is authenticated with the bearer token from the session store.
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::NotificationSource;
use crate::errors::{Result, SyncError};
use crate::models::notification::Notification;
use crate::session::SessionStore;

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
}

impl ApiClient {
    pub fn new(base_url: &str, session: SessionStore, timeout: Duration) -> Result<Self> {
        // validate once up front so endpoint() can only fail on bad paths
        Url::parse(base_url)?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("notify-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn from_config(cfg: &crate::config::Config, session: SessionStore) -> Result<Self> {
        Self::new(&cfg.api_url, session, cfg.request_timeout)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}{}", self.base_url, path))?)
    }

    /// Send an authenticated request and return the response body on 2xx.
    async fn send(&self, method: Method, path: &str) -> Result<String> {
        let session = self.session.current().ok_or(SyncError::NoSession)?;
        let url = self.endpoint(path)?;
        let request_id = uuid::Uuid::new_v4().to_string();

        tracing::debug!(%method, path, request_id = %request_id, "backend request");

        let resp = self
            .http
            .request(method.clone(), url)
            .bearer_auth(&session.token)
            .header("accept", "application/json")
            .header("x-request-id", &request_id)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(%method, path, request_id = %request_id, error = %e, "backend request failed");
                SyncError::Transport(e)
            })?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let message = extract_error_message(status, &body);
            tracing::warn!(
                %method,
                path,
                request_id = %request_id,
                status = status.as_u16(),
                message = %message,
                "backend returned error"
            );
            return Err(SyncError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl NotificationSource for ApiClient {
    async fn fetch_all(&self, user_id: i64) -> Result<Vec<Notification>> {
        let body = self
            .send(Method::GET, &format!("/api/notifications/user/{}", user_id))
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn mark_read(&self, id: i64) -> Result<()> {
        self.send(Method::PUT, &format!("/api/notifications/{}/mark-read", id))
            .await?;
        Ok(())
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<()> {
        self.send(
            Method::PUT,
            &format!("/api/notifications/user/{}/mark-all-read", user_id),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.send(Method::DELETE, &format!("/api/notifications/{}", id))
            .await?;
        Ok(())
    }

    async fn unread_count(&self, user_id: i64) -> Result<usize> {
        let body = self
            .send(
                Method::GET,
                &format!("/api/notifications/user/{}/unread-count", user_id),
            )
            .await?;
        parse_unread_count(&body)
    }
}

/// Pull a human-readable message out of an error response.
///
/// Preference order: JSON `message`, `title`, `detail`; then the raw body;
/// then the status reason phrase.
pub fn extract_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for field in ["message", "title", "detail"] {
            if let Some(Value::String(s)) = map.get(field) {
                if !s.trim().is_empty() {
                    return s.clone();
                }
            }
        }
    }

    let raw = body.trim();
    if !raw.is_empty() {
        return raw.to_string();
    }

    status
        .canonical_reason()
        .map(String::from)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

/// The count endpoint answers either a bare number or `{"count": n}`.
fn parse_unread_count(body: &str) -> Result<usize> {
    let value: Value = serde_json::from_str(body)?;
    let count = match &value {
        Value::Number(n) => n.as_u64(),
        Value::Object(map) => map
            .get("count")
            .or_else(|| map.get("unreadCount"))
            .and_then(Value::as_u64),
        _ => None,
    };
    match count {
        Some(n) => Ok(n as usize),
        None => Err(SyncError::Server {
            status: 200,
            message: format!(
                "unexpected unread-count body: {}",
                body.chars().take(200).collect::<String>()
            ),
        }),
    }
}
