use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder shown when a record carries a missing or unparseable timestamp.
pub const UNKNOWN_DATE: &str = "Unknown date";

/// Display category of a notification. Affects presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl From<String> for NotificationKind {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" => NotificationKind::Success,
            "warning" => NotificationKind::Warning,
            "error" => NotificationKind::Error,
            // unknown categories render as plain info
            _ => NotificationKind::Info,
        }
    }
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A single user-facing notification as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
    #[serde(default)]
    pub is_read: bool,
    /// Raw ISO datetime string, kept verbatim so malformed values survive a round trip.
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
}

impl Notification {
    /// Parse `created_at`. Accepts RFC 3339 and offset-less ISO datetimes (read as UTC).
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }

    /// Human label such as "5 minutes ago". Never fails; bad dates get [`UNKNOWN_DATE`].
    pub fn relative_age(&self, now: DateTime<Utc>) -> String {
        match self.created_at() {
            Some(ts) => format_relative(ts, now),
            None => UNKNOWN_DATE.to_string(),
        }
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn format_relative(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(ts);
    // clock skew: a timestamp slightly in the future is still "just now"
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return plural(minutes, "minute");
    }
    let hours = elapsed.num_hours();
    if hours < 24 {
        return plural(hours, "hour");
    }
    let days = elapsed.num_days();
    if days <= 30 {
        return plural(days, "day");
    }
    ts.format("%Y-%m-%d").to_string()
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}

/// Number of records whose read-state is false.
pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.is_read).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(raw: &str) -> Notification {
        Notification {
            id: 1,
            title: "t".into(),
            message: "m".into(),
            kind: NotificationKind::Info,
            is_read: false,
            created_at: raw.into(),
            action_url: None,
        }
    }

    #[test]
    fn test_deserializes_backend_shape() {
        let json = r#"{
            "id": 7,
            "title": "Analysis ready",
            "message": "Your report has been generated",
            "type": "success",
            "isRead": false,
            "createdAt": "2024-05-01T10:00:00",
            "actionUrl": "/analysis/12"
        }"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.id, 7);
        assert_eq!(n.kind, NotificationKind::Success);
        assert!(!n.is_read);
        assert_eq!(n.action_url.as_deref(), Some("/analysis/12"));
    }

    #[test]
    fn test_unknown_kind_falls_back_to_info() {
        let n: Notification =
            serde_json::from_str(r#"{"id":1,"type":"ALERT","isRead":true}"#).unwrap();
        assert_eq!(n.kind, NotificationKind::Info);
        assert!(n.is_read);
        assert_eq!(n.title, "");
    }

    #[test]
    fn test_kind_is_case_insensitive() {
        let n: Notification = serde_json::from_str(r#"{"id":1,"type":"WARNING"}"#).unwrap();
        assert_eq!(n.kind, NotificationKind::Warning);
    }

    #[test]
    fn test_serializes_with_wire_names() {
        let json = serde_json::to_value(at("2024-01-01T00:00:00Z")).unwrap();
        assert_eq!(json["isRead"], false);
        assert_eq!(json["type"], "info");
        assert_eq!(json["createdAt"], "2024-01-01T00:00:00Z");
        assert!(json.get("actionUrl").is_none());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-09T14:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-09T16:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-09T14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-09T14:30:00.000"), Some(expected));
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_relative_age_labels() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let ago = |d: Duration| at(&(now - d).to_rfc3339()).relative_age(now);

        assert_eq!(ago(Duration::seconds(20)), "just now");
        assert_eq!(ago(Duration::minutes(1)), "1 minute ago");
        assert_eq!(ago(Duration::minutes(5)), "5 minutes ago");
        assert_eq!(ago(Duration::hours(3)), "3 hours ago");
        assert_eq!(ago(Duration::days(1)), "1 day ago");
        assert_eq!(ago(Duration::days(45)), "2024-04-17");
    }

    #[test]
    fn test_future_timestamp_is_just_now() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let n = at(&(now + Duration::minutes(3)).to_rfc3339());
        assert_eq!(n.relative_age(now), "just now");
    }

    #[test]
    fn test_malformed_date_uses_placeholder() {
        let now = Utc::now();
        assert_eq!(at("not-a-date").relative_age(now), UNKNOWN_DATE);
        assert_eq!(at("").relative_age(now), UNKNOWN_DATE);
    }

    #[test]
    fn test_unread_count() {
        let mut list = vec![at("x"), at("x"), at("x")];
        list[1].is_read = true;
        assert_eq!(unread_count(&list), 2);
        assert_eq!(unread_count(&[]), 0);
    }
}
