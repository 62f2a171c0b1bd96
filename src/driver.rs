//! The narrow driver surface consumed by sessions and the hub
//!
//! Everything the core needs from the PC/SC layer goes through these traits
//! and notification types, so the state machine can be exercised without a
//! card service present. The real backend lives in [`crate::service`].

use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, Sender};
use pcsc::{Disposition, Protocol, ShareMode, State};

/// A raw status notification for a single reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Raw state-flags word reported by the driver
    pub state: State,
    /// ATR bytes, when the driver reported any
    pub atr: Option<Bytes>,
}

/// Asynchronous notifications delivered on a reader's channel
#[derive(Debug)]
pub enum ReaderNotification {
    /// The reader's status flags changed
    Status(Status),
    /// The driver reported an error for this reader
    Error(pcsc::Error),
    /// The reader was removed from the system
    End,
}

/// Asynchronous notifications delivered on the service channel
#[derive(Debug)]
pub enum ServiceNotification<D> {
    /// A new reader was detected
    Attached {
        /// Handle for issuing requests to the reader
        driver: D,
        /// In-order stream of status notifications for the reader
        notifications: ReaderNotificationReceiver,
    },
    /// The driver reported a service-level error
    Error(pcsc::Error),
}

/// Sender half of a reader notification channel
pub type ReaderNotificationSender = Sender<ReaderNotification>;
/// Receiver half of a reader notification channel
pub type ReaderNotificationReceiver = Receiver<ReaderNotification>;

/// Sender half of a service notification channel
pub type ServiceNotificationSender<D> = Sender<ServiceNotification<D>>;
/// Receiver half of a service notification channel
pub type ServiceNotificationReceiver<D> = Receiver<ServiceNotification<D>>;

/// Create an unbounded channel for reader notifications
pub fn reader_notification_channel() -> (ReaderNotificationSender, ReaderNotificationReceiver) {
    unbounded()
}

/// Create an unbounded channel for service notifications
pub fn service_notification_channel<D>(
) -> (ServiceNotificationSender<D>, ServiceNotificationReceiver<D>) {
    unbounded()
}

/// Request surface of a single reader handle
///
/// Implementations perform the actual wire-level transport; the session layer
/// owns all connection/card bookkeeping on top of it.
pub trait ReaderDriver: Send {
    /// Opaque reader identifier
    fn name(&self) -> &str;

    /// Establish a connection with the given share mode, returning the
    /// negotiated protocol (`None` for direct-mode connections)
    fn connect(&mut self, mode: ShareMode) -> Result<Option<Protocol>, pcsc::Error>;

    /// Tear down the current connection with the given card disposition
    fn disconnect(&mut self, disposition: Disposition) -> Result<(), pcsc::Error>;

    /// Exchange an APDU with the card using the negotiated protocol
    fn transmit(
        &mut self,
        data: &[u8],
        response_max_len: usize,
        protocol: Option<Protocol>,
    ) -> Result<Bytes, pcsc::Error>;

    /// Send a reader-specific control command
    fn control(
        &mut self,
        data: &[u8],
        control_code: u32,
        response_max_len: usize,
    ) -> Result<Bytes, pcsc::Error>;

    /// Release the reader handle; idempotency is the driver's responsibility
    fn close(&mut self);
}

/// Service-level handle owned by the hub
pub trait ServiceDriver {
    /// The reader handle type this service hands out
    type Reader: ReaderDriver;

    /// Release the service handle
    fn close(&mut self);
}
