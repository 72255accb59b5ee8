use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::events::Notification;
use crate::types::EndpointId;

/// Notification sender for one connection
pub type NotificationSender = mpsc::UnboundedSender<Notification>;

/// Receiving half handed to the connection that owns the endpoint
pub type NotificationReceiver = mpsc::UnboundedReceiver<Notification>;

/// Routes room notifications to connected endpoints.
///
/// Recipient sets are computed by the caller from a membership snapshot;
/// the broadcaster only owns the per-endpoint channels.
#[derive(Default)]
pub struct Broadcaster {
    channels: DashMap<EndpointId, NotificationSender>,
}

impl Broadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the notification channel for `endpoint`
    pub fn register(&self, endpoint: EndpointId) -> NotificationReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.channels.insert(endpoint.clone(), tx).is_some() {
            warn!(client_id = %endpoint, "Replaced existing notification channel");
        }
        debug!(client_id = %endpoint, "Notification channel registered");
        rx
    }

    /// Close the notification channel for `endpoint`
    pub fn unregister(&self, endpoint: &EndpointId) {
        if self.channels.remove(endpoint).is_some() {
            debug!(client_id = %endpoint, "Notification channel closed");
        }
    }

    /// Send `notification` to every endpoint in `recipients` except `origin`.
    ///
    /// Channels whose receiver is gone are dropped. Returns the number of
    /// endpoints the notification was delivered to.
    pub fn broadcast(
        &self,
        recipients: &[EndpointId],
        origin: &EndpointId,
        notification: &Notification,
    ) -> usize {
        let mut sent_count = 0;
        let mut failed = Vec::new();

        for endpoint in recipients.iter().filter(|e| *e != origin) {
            let Some(sender) = self.channels.get(endpoint) else {
                debug!(client_id = %endpoint, "No notification channel for endpoint");
                continue;
            };
            match sender.send(notification.clone()) {
                Ok(()) => sent_count += 1,
                Err(err) => {
                    warn!(
                        client_id = %endpoint,
                        error = %err,
                        "Failed to deliver notification, marking for cleanup"
                    );
                    failed.push(endpoint.clone());
                }
            }
        }

        for endpoint in failed {
            self.unregister(&endpoint);
        }

        if sent_count > 0 {
            info!(
                origin = %origin,
                sent_count,
                event_type = notification.event_type(),
                "Notification broadcast complete"
            );
        }

        sent_count
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
