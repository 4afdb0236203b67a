//! Telemetry event domain type.
//!
//! An event is an opaque record captured from an instrumented mobile app
//! session. The payload may carry SDK-extension fields (event type, source,
//! name, unique/parent identifiers) or backend-service fields (status, log
//! level, messages). Events are immutable once stored and deduplicated by
//! id, or by a content hash when no id is present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// SDK-extension payload keys.
const KEY_EVENT_TYPE: &str = "ACPExtensionEventType";
const KEY_EVENT_SOURCE: &str = "ACPExtensionEventSource";
const KEY_EVENT_NAME: &str = "ACPExtensionEventName";
const KEY_EVENT_UID: &str = "ACPExtensionEventUniqueIdentifier";
const KEY_EVENT_PARENT: &str = "ACPExtensionEventParentIdentifier";

// Backend-service payload keys.
const KEY_STATUS: &str = "status";
const KEY_LOG_LEVEL: &str = "logLevel";
const KEY_MESSAGES: &str = "messages";

/// Which side of the SDK produced an event, derived from its payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Emitted by an SDK extension inside the app (ACPExtension* fields).
    SdkExtension,
    /// Emitted by a backend service (status / log level / messages).
    BackendService,
    /// Neither shape recognized.
    Unknown,
}

/// A single telemetry record from a monitored app session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Upstream event id, when the producer assigned one.
    #[serde(default, alias = "eventId", skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,

    /// Producing vendor (e.g. "com.adobe.griffon").
    pub vendor: String,

    /// Event type as reported by the producer.
    #[serde(rename = "type")]
    pub event_type: String,

    /// When the event was captured.
    pub timestamp: DateTime<Utc>,

    /// Opaque producer payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl TelemetryEvent {
    /// Deduplication key: the upstream id when present, otherwise a SHA-256
    /// content hash over vendor, type, and payload.
    pub fn dedup_key(&self) -> String {
        if let Some(id) = &self.event_id {
            return id.clone();
        }
        let mut hasher = Sha256::new();
        hasher.update(self.vendor.as_bytes());
        hasher.update(b"|");
        hasher.update(self.event_type.as_bytes());
        hasher.update(b"|");
        hasher.update(self.payload.to_string().as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Categorize by payload shape.
    pub fn category(&self) -> EventCategory {
        let Some(obj) = self.payload.as_object() else {
            return EventCategory::Unknown;
        };
        if obj.contains_key(KEY_EVENT_TYPE) || obj.contains_key(KEY_EVENT_SOURCE) {
            EventCategory::SdkExtension
        } else if obj.contains_key(KEY_STATUS)
            || obj.contains_key(KEY_LOG_LEVEL)
            || obj.contains_key(KEY_MESSAGES)
        {
            EventCategory::BackendService
        } else {
            EventCategory::Unknown
        }
    }

    /// Whether this event carries an error signal.
    ///
    /// Backend events: HTTP status ≥ 400 (numeric or string), or log level
    /// `error`/`fatal`. SDK events: "error" appearing in the extension event
    /// type or source. The top-level event type is checked for all shapes.
    pub fn is_error(&self) -> bool {
        if self.event_type.to_lowercase().contains("error") {
            return true;
        }
        let Some(obj) = self.payload.as_object() else {
            return false;
        };

        if let Some(status) = obj.get(KEY_STATUS) {
            match status {
                serde_json::Value::Number(n) => {
                    if n.as_u64().is_some_and(|s| s >= 400) {
                        return true;
                    }
                }
                serde_json::Value::String(s) => {
                    let s = s.to_lowercase();
                    if s.parse::<u16>().is_ok_and(|n| n >= 400)
                        || s.contains("error")
                        || s.contains("fail")
                    {
                        return true;
                    }
                }
                _ => {}
            }
        }

        if let Some(level) = obj.get(KEY_LOG_LEVEL).and_then(|v| v.as_str()) {
            let level = level.to_lowercase();
            if level == "error" || level == "fatal" {
                return true;
            }
        }

        for key in [KEY_EVENT_TYPE, KEY_EVENT_SOURCE] {
            if let Some(v) = obj.get(key).and_then(|v| v.as_str()) {
                if v.to_lowercase().contains("error") {
                    return true;
                }
            }
        }

        false
    }

    /// Render the event into the text block stored in the session's semantic
    /// index. High-value fields come first so they survive downstream
    /// truncation; the raw payload trails as compact JSON.
    pub fn render(&self) -> String {
        let mut out = format!(
            "[{}] {} {}\n",
            self.timestamp.to_rfc3339(),
            self.vendor,
            self.event_type
        );

        if let Some(obj) = self.payload.as_object() {
            let get = |key: &str| obj.get(key).and_then(|v| v.as_str());

            if let Some(name) = get(KEY_EVENT_NAME) {
                out.push_str(&format!("Event: {name}"));
                match (get(KEY_EVENT_TYPE), get(KEY_EVENT_SOURCE)) {
                    (Some(t), Some(s)) => out.push_str(&format!(" (type={t}, source={s})")),
                    (Some(t), None) => out.push_str(&format!(" (type={t})")),
                    (None, Some(s)) => out.push_str(&format!(" (source={s})")),
                    (None, None) => {}
                }
                out.push('\n');
            }
            if let Some(uid) = get(KEY_EVENT_UID) {
                out.push_str(&format!("Id: {uid}"));
                if let Some(parent) = get(KEY_EVENT_PARENT) {
                    out.push_str(&format!("  Parent: {parent}"));
                }
                out.push('\n');
            }

            let status = obj.get(KEY_STATUS);
            let level = get(KEY_LOG_LEVEL);
            if status.is_some() || level.is_some() {
                let mut line = String::new();
                if let Some(status) = status {
                    line.push_str(&format!("Status: {status}"));
                }
                if let Some(level) = level {
                    if !line.is_empty() {
                        line.push_str("  ");
                    }
                    line.push_str(&format!("Level: {level}"));
                }
                out.push_str(&line);
                out.push('\n');
            }
            if let Some(messages) = obj.get(KEY_MESSAGES).and_then(|v| v.as_array()) {
                let joined: Vec<String> = messages
                    .iter()
                    .map(|m| match m {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                if !joined.is_empty() {
                    out.push_str(&format!("Messages: {}\n", joined.join(" | ")));
                }
            }
        }

        if !self.payload.is_null() {
            out.push_str(&format!("Payload: {}", self.payload));
        }

        out
    }
}
