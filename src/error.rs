//! Error types for reader and card operations
//!
//! Every operation on a session fails with its own error kind so callers can
//! match on the exact precondition that was violated. Driver-level failures
//! always carry the underlying [`pcsc::Error`] as their source.

/// Errors from [`ReaderSession::connect`](crate::ReaderSession::connect)
/// and from parsing a [`ConnectMode`](crate::ConnectMode).
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The requested connect mode is not recognized
    #[error("invalid connect mode: {0:?}")]
    InvalidMode(String),

    /// The driver-level connect request failed
    #[error("an error occurred while connecting")]
    Failure(#[source] pcsc::Error),
}

/// Errors from [`ReaderSession::disconnect`](crate::ReaderSession::disconnect).
#[derive(Debug, thiserror::Error)]
pub enum DisconnectError {
    /// There is no active connection to tear down
    #[error("reader is not connected, no need for disconnecting")]
    NotConnected,

    /// The driver-level disconnect request failed
    #[error("an error occurred while disconnecting")]
    Failure(#[source] pcsc::Error),
}

/// Errors from [`ReaderSession::transmit`](crate::ReaderSession::transmit).
#[derive(Debug, thiserror::Error)]
pub enum TransmitError {
    /// Either no card is present or no connection is established
    #[error("no card or connection available")]
    CardNotConnected,

    /// The driver-level transmit request failed
    #[error("an error occurred while transmitting")]
    Failure(#[source] pcsc::Error),
}

/// Errors from [`ReaderSession::control`](crate::ReaderSession::control).
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// No connection is established
    #[error("no connection available")]
    NotConnected,

    /// The driver-level control request failed
    #[error("an error occurred while transmitting control")]
    Failure(#[source] pcsc::Error),
}

/// Errors from [`ReaderSession::set_aid`](crate::ReaderSession::set_aid).
#[derive(Debug, thiserror::Error)]
pub enum SetAidError {
    /// The string is not valid hex
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),

    /// The decoded identifier does not fit the selection command's
    /// single-byte length field
    #[error("aid is {len} bytes, the selection command carries at most 255")]
    TooLong {
        /// Decoded length
        len: usize,
    },
}

/// Umbrella error carried by [`SessionEvent::Error`](crate::SessionEvent::Error)
/// and [`HubEvent::Error`](crate::HubEvent::Error)
///
/// Failures that happen inside the status-change handling run outside any
/// caller's call stack, so they are re-emitted as events wrapping this type
/// instead of being returned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A connect operation failed
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// A disconnect operation failed
    #[error(transparent)]
    Disconnect(#[from] DisconnectError),

    /// A transmit operation failed
    #[error(transparent)]
    Transmit(#[from] TransmitError),

    /// A control operation failed
    #[error(transparent)]
    Control(#[from] ControlError),

    /// A driver-level error was reported asynchronously
    #[error("driver error")]
    Driver(#[from] pcsc::Error),

    /// A card answered an application-selection command with a bad status word
    #[error("application selection rejected with status {sw1:02X} {sw2:02X}")]
    SelectRejected {
        /// First status byte of the response
        sw1: u8,
        /// Second status byte of the response
        sw2: u8,
    },
}
