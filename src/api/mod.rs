//! Backend collaborator.
//!
//! [`NotificationSource`] is the seam the store consumes. [`client::ApiClient`]
//! implements it over the REST API; tests and alternative transports provide
//! their own implementations.

pub mod client;

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::notification::Notification;

#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// Full notification list for a user, in backend order (newest first).
    async fn fetch_all(&self, user_id: i64) -> Result<Vec<Notification>>;

    async fn mark_read(&self, id: i64) -> Result<()>;

    async fn mark_all_read(&self, user_id: i64) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Server-side unread count, used for the initial badge value.
    async fn unread_count(&self, user_id: i64) -> Result<usize>;
}

pub use client::ApiClient;
