//! notify-sync — client-side notification store, poller and display surfaces
//! for the business-analysis backend.
//!
//! Re-exports modules needed by the binary and by integration tests in `tests/`.

pub mod api;
pub mod config;
pub mod errors;
pub mod models;
pub mod poller;
pub mod session;
pub mod store;
pub mod surface;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, NotificationSource};
pub use errors::SyncError;
pub use models::notification::{Notification, NotificationKind};
pub use session::SessionStore;
pub use store::{NotificationStore, StoreSnapshot};
pub use surface::{NotificationHub, Surface, SurfaceKind};
