//! Reader hub: turns driver-level reader attachments into sessions
//!
//! The hub listens on the service notification channel, wraps every newly
//! attached reader in a [`ReaderSession`] and hands it upward as a
//! [`HubEvent::Reader`]. It owns the collection hand-off but never reaches
//! into session state.

use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::driver::{ServiceDriver, ServiceNotification, ServiceNotificationReceiver};
use crate::event::{hub_event_channel, HubEvent, HubEventReceiver, HubEventSender};
use crate::session::ReaderSession;

/// Hub wrapping a driver-level card service
#[allow(missing_debug_implementations)]
pub struct ReaderHub<S: ServiceDriver> {
    /// Underlying service handle
    service: S,
    /// In-order stream of service notifications
    notifications: ServiceNotificationReceiver<S::Reader>,
    /// Configuration applied to each new session
    config: SessionConfig,
    /// Outbound event channel
    events_tx: HubEventSender<S::Reader>,
    events_rx: HubEventReceiver<S::Reader>,
}

impl<S: ServiceDriver> ReaderHub<S> {
    /// Create a hub over the given service with default session configuration
    pub fn new(service: S, notifications: ServiceNotificationReceiver<S::Reader>) -> Self {
        Self::with_config(service, notifications, SessionConfig::default())
    }

    /// Create a hub applying the given configuration to each new session
    pub fn with_config(
        service: S,
        notifications: ServiceNotificationReceiver<S::Reader>,
        config: SessionConfig,
    ) -> Self {
        let (events_tx, events_rx) = hub_event_channel();
        Self {
            service,
            notifications,
            config,
            events_tx,
            events_rx,
        }
    }

    /// Get a receiver for this hub's events
    ///
    /// Each call returns an independent handle onto the same stream.
    pub fn events(&self) -> HubEventReceiver<S::Reader> {
        self.events_rx.clone()
    }

    /// Apply a single service notification
    pub fn handle_notification(&self, notification: ServiceNotification<S::Reader>) {
        match notification {
            ServiceNotification::Attached { driver, notifications } => {
                let session = ReaderSession::new(driver, notifications, self.config.clone());
                info!(reader = %session.name(), "new reader detected");
                let _ = self.events_tx.send(HubEvent::Reader(session));
            }
            ServiceNotification::Error(err) => {
                warn!(error = %err, "service error");
                let _ = self.events_tx.send(HubEvent::Error(err.into()));
            }
        }
    }

    /// Consume the service notification stream in order until the driver
    /// side hangs up
    pub fn run(&self) {
        for notification in self.notifications.clone().iter() {
            self.handle_notification(notification);
        }
    }

    /// Release the driver-level service handle
    pub fn close(&mut self) {
        self.service.close();
    }
}
