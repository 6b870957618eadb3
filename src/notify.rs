use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use ts_rs::TS;
use utoipa::ToSchema;

/// Notification
///
/// A named event with a free-form payload. No schema is enforced here; the name and
/// payload are whatever the emitting handler chose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Notification {
    pub name: String,
    #[ts(type = "unknown")]
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    #[ts(type = "string")]
    pub emitted_at: DateTime<Utc>,
}

/// The real-time channel listeners subscribe to.
pub type NotificationChannel = broadcast::Sender<Notification>;

/// NotificationBridge
///
/// Handle through which any handler broadcasts named events to real-time listeners.
/// It is created unbound, carried in `AppState`, and bound once during start-up
/// before the listener accepts connections. Rebinding replaces the previous channel.
///
/// Emitting while unbound logs an error and drops the event; it never fails the
/// calling request.
#[derive(Clone, Default)]
pub struct NotificationBridge {
    channel: Arc<RwLock<Option<NotificationChannel>>>,
}

impl NotificationBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bridge already bound to a fresh channel of `capacity`.
    pub fn bound(capacity: usize) -> Self {
        let bridge = Self::new();
        let (tx, _) = broadcast::channel(capacity);
        bridge.bind(tx);
        bridge
    }

    /// bind
    ///
    /// Stores `channel` as the broadcast target. Last bind wins.
    pub fn bind(&self, channel: NotificationChannel) {
        let previous = self.channel.write().replace(channel);
        if previous.is_some() {
            tracing::warn!("notification channel rebound; previous listeners detached");
        } else {
            tracing::info!("notification channel bound");
        }
    }

    pub fn is_bound(&self) -> bool {
        self.channel.read().is_some()
    }

    /// New listener on the bound channel, or `None` while unbound.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<Notification>> {
        self.channel.read().as_ref().map(|tx| tx.subscribe())
    }

    /// emit
    ///
    /// Broadcasts `name`/`payload` to every current listener. Returns how many
    /// listeners the event was handed to (zero when unbound or nobody listens).
    pub fn emit(&self, name: &str, payload: serde_json::Value) -> usize {
        let guard = self.channel.read();
        let Some(tx) = guard.as_ref() else {
            tracing::error!(event = name, "notification channel is not bound; event dropped");
            return 0;
        };

        let notification = Notification {
            name: name.to_string(),
            payload,
            emitted_at: Utc::now(),
        };

        match tx.send(notification) {
            Ok(listeners) => {
                tracing::debug!(event = name, listeners, "notification broadcast");
                listeners
            }
            // No receivers right now; the event is simply not observed.
            Err(_) => {
                tracing::debug!(event = name, "notification broadcast with no listeners");
                0
            }
        }
    }
}
