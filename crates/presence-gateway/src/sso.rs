//! Cross-application single sign-on bus
//!
//! Connected applications subscribe to `SsoEvent`s. An approval is only ever
//! published for an anchored, verified and unlocked session, and a kill-switch
//! publishes `IdentityLocked` so every connected application drops its
//! session.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const SSO_CHANNEL_CAPACITY: usize = 64;

/// Event on the single sign-on bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SsoEvent {
    /// A connected application asked for the session
    AuthRequested {
        /// Connected application
        app_id: String,
    },
    /// The request was approved
    AuthApproved {
        /// Connected application
        app_id: String,
    },
    /// The identity was purged; drop dependent sessions
    IdentityLocked {
        /// Why the identity was purged
        reason: String,
    },
}

/// Broadcast bus shared by the gateway and connected applications.
#[derive(Debug, Clone)]
pub struct SsoBus {
    tx: broadcast::Sender<SsoEvent>,
}

impl SsoBus {
    /// Empty bus.
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(SSO_CHANNEL_CAPACITY);
        Self {
            /// Detail
            tx,
        }
    }

    /// New receiver seeing events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SsoEvent> {
        self.tx.subscribe()
    }

    /// Publish to current subscribers. No subscribers is not an error.
    pub fn publish(&self, event: SsoEvent) {
        let receivers = self.tx.send(event.clone()).unwrap_or(0);
        tracing::debug!(?event, receivers, "sso event published");
    }
}

impl Default for SsoBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = SsoBus::new();
        let mut rx = bus.subscribe();
        bus.publish(SsoEvent::IdentityLocked {
            reason: "kill-switch".into(),
        });
        assert_eq!(
            rx.recv().await.unwrap(),
            SsoEvent::IdentityLocked {
                reason: "kill-switch".into()
            }
        );
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        SsoBus::new().publish(SsoEvent::AuthRequested {
            app_id: "wallet".into(),
        });
    }
}
