//! Per-reader connection/session state machine
//!
//! A [`ReaderSession`] owns one physical reader's lifecycle: card presence,
//! the share-mode connection, and the transmit/control contract against that
//! connection. Status notifications for the reader must be fed to the session
//! in driver order, either by calling [`ReaderSession::handle_notification`]
//! from a single task or by handing the session to [`ReaderSession::run`];
//! exclusive ownership of the session is what serializes state transitions
//! against in-flight operations.

use std::fmt;

use bytes::Bytes;
use pcsc::{Disposition, Protocol, State};
use tracing::{debug, info, trace, warn};

use crate::card::{Card, TagStandard};
use crate::config::{ConnectMode, SessionConfig};
use crate::driver::{ReaderDriver, ReaderNotification, ReaderNotificationReceiver, Status};
use crate::error::{
    ConnectError, ControlError, DisconnectError, Error, SetAidError, TransmitError,
};
use crate::event::{session_event_channel, SessionEvent, SessionEventReceiver, SessionEventSender};

/// An established share-mode connection to a reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    /// Mode the connection was requested with
    pub mode: ConnectMode,
    /// Driver-negotiated protocol; `None` for direct-mode connections
    pub protocol: Option<Protocol>,
}

/// Session wrapping a single reader handle
pub struct ReaderSession<D: ReaderDriver> {
    /// Reader identifier, fixed at construction
    name: String,
    /// Underlying driver handle
    driver: D,
    /// In-order stream of driver notifications for this reader
    notifications: ReaderNotificationReceiver,
    /// Raw status word from the previous notification
    state: State,
    /// Current connection, if one is established
    connection: Option<Connection>,
    /// Card currently reported present, if any
    card: Option<Card>,
    /// Application identifier used by the auto-processing path
    aid: Option<Vec<u8>>,
    /// Session configuration
    config: SessionConfig,
    /// Outbound event channel
    events_tx: SessionEventSender,
    events_rx: SessionEventReceiver,
}

impl<D: ReaderDriver> fmt::Debug for ReaderSession<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderSession")
            .field("name", &self.name)
            .field("connection", &self.connection)
            .field("has_card", &self.card.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl<D: ReaderDriver> ReaderSession<D> {
    /// Create a session wrapping the given reader driver
    pub fn new(driver: D, notifications: ReaderNotificationReceiver, config: SessionConfig) -> Self {
        let (events_tx, events_rx) = session_event_channel();
        Self {
            name: driver.name().to_string(),
            driver,
            notifications,
            state: State::UNAWARE,
            connection: None,
            card: None,
            aid: None,
            config,
            events_tx,
            events_rx,
        }
    }

    /// Get the reader name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current connection, if one is established
    pub const fn connection(&self) -> Option<Connection> {
        self.connection
    }

    /// Get the card currently reported present, if any
    pub const fn card(&self) -> Option<&Card> {
        self.card.as_ref()
    }

    /// Get a receiver for this session's events
    ///
    /// Each call returns an independent handle onto the same stream.
    pub fn events(&self) -> SessionEventReceiver {
        self.events_rx.clone()
    }

    /// Get a reference to the underlying driver
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Get a mutable reference to the underlying driver
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Get the configured application identifier, if any
    pub fn aid(&self) -> Option<&[u8]> {
        self.aid.as_deref()
    }

    /// Set the application identifier from a hex string
    ///
    /// The string is parsed into a byte array on assignment and must fit the
    /// selection command's single-byte length field; the value only feeds the
    /// auto-processing selection path and has no effect on protocol
    /// correctness.
    pub fn set_aid(&mut self, aid: &str) -> Result<(), SetAidError> {
        let parsed = hex::decode(aid)?;
        if parsed.len() > u8::MAX as usize {
            return Err(SetAidError::TooLong { len: parsed.len() });
        }
        info!(reader = %self.name, aid = %hex::encode(&parsed), "setting aid");
        self.aid = Some(parsed);
        Ok(())
    }

    /// Set whether card insertion automatically runs application selection
    pub fn set_auto_processing(&mut self, auto_processing: bool) {
        self.config.auto_processing = auto_processing;
    }

    /// Establish a share-mode connection to the reader
    ///
    /// On success the connection is stored and returned, unconditionally
    /// replacing any previous one; reconnecting is allowed. On driver failure
    /// the stored connection is left untouched.
    pub fn connect(&mut self, mode: ConnectMode) -> Result<Connection, ConnectError> {
        debug!(reader = %self.name, ?mode, "trying to connect");

        let protocol = self.driver.connect(mode.into()).map_err(ConnectError::Failure)?;

        let connection = Connection { mode, protocol };
        self.connection = Some(connection);
        info!(reader = %self.name, ?connection, "connected");
        Ok(connection)
    }

    /// Tear down the current connection, leaving the card in the reader
    ///
    /// Fails with [`DisconnectError::NotConnected`] when no connection is
    /// established. On driver failure the connection is deliberately left in
    /// place so the caller can retry; until a disconnect succeeds the session
    /// should be treated as possibly inconsistent.
    pub fn disconnect(&mut self) -> Result<(), DisconnectError> {
        if self.connection.is_none() {
            return Err(DisconnectError::NotConnected);
        }

        debug!(reader = %self.name, connection = ?self.connection, "trying to disconnect");

        self.driver
            .disconnect(Disposition::LeaveCard)
            .map_err(DisconnectError::Failure)?;

        self.connection = None;
        info!(reader = %self.name, "disconnected");
        Ok(())
    }

    /// Exchange an APDU with the card
    ///
    /// Requires both a present card and an established connection; the
    /// negotiated protocol token is forwarded to the driver. The payload is
    /// opaque to the session.
    pub fn transmit(&mut self, data: &[u8], response_max_len: usize) -> Result<Bytes, TransmitError> {
        let connection = match (&self.card, self.connection) {
            (Some(_), Some(connection)) => connection,
            _ => return Err(TransmitError::CardNotConnected),
        };

        trace!(reader = %self.name, command = %hex::encode(data), response_max_len, "transmitting");

        let response = self
            .driver
            .transmit(data, response_max_len, connection.protocol)
            .map_err(TransmitError::Failure)?;

        trace!(reader = %self.name, response = %hex::encode(&response), "received response");
        Ok(response)
    }

    /// Send a reader-specific control command
    ///
    /// Requires an established connection but no card; this path is typically
    /// used with direct-mode connections. The configured control code is
    /// forwarded to the driver.
    pub fn control(&mut self, data: &[u8], response_max_len: usize) -> Result<Bytes, ControlError> {
        if self.connection.is_none() {
            return Err(ControlError::NotConnected);
        }

        trace!(reader = %self.name, command = %hex::encode(data), response_max_len, "transmitting control");

        self.driver
            .control(data, self.config.control_code, response_max_len)
            .map_err(ControlError::Failure)
    }

    /// Release the underlying reader handle
    pub fn close(&mut self) {
        self.driver.close();
    }

    /// Consume this session's notification stream in order until the reader
    /// is removed or the driver side hangs up
    pub fn run(&mut self) {
        let notifications = self.notifications.clone();
        for notification in notifications.iter() {
            let end = matches!(notification, ReaderNotification::End);
            self.handle_notification(notification);
            if end {
                break;
            }
        }
    }

    /// Apply a single driver notification to the session state
    ///
    /// Failures inside the insertion/removal handling have no caller awaiting
    /// a result and are re-emitted as [`SessionEvent::Error`] instead.
    pub fn handle_notification(&mut self, notification: ReaderNotification) {
        match notification {
            ReaderNotification::Status(status) => self.handle_status(status),
            ReaderNotification::Error(err) => {
                warn!(reader = %self.name, error = %err, "driver error");
                self.emit(SessionEvent::Error(err.into()));
            }
            ReaderNotification::End => {
                info!(reader = %self.name, "reader removed");
                self.emit(SessionEvent::End);
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine; events are best-effort notifications.
        let _ = self.events_tx.send(event);
    }

    fn handle_status(&mut self, status: Status) {
        // Which bits changed since the last notification. Both branches
        // re-check the bit against the new word only, and EMPTY wins over
        // PRESENT when both differ at once; the driver side is known to be
        // noisy here and this exact check tolerates it.
        let changes = self.state ^ status.state;
        trace!(reader = %self.name, state = ?status.state, ?changes, "status");

        if !changes.is_empty() {
            if changes.intersects(State::EMPTY) && status.state.intersects(State::EMPTY) {
                self.on_card_removed();
            } else if changes.intersects(State::PRESENT) && status.state.intersects(State::PRESENT)
            {
                self.on_card_inserted(status.atr);
            }
        }

        self.state = status.state;
    }

    fn on_card_removed(&mut self) {
        info!(reader = %self.name, "card removed");

        // The card is cleared synchronously, before the disconnect below is
        // attempted; the event carries the pre-removal snapshot.
        if let Some(card) = self.card.take() {
            self.emit(SessionEvent::CardRemoved(card));
        }

        if self.connection.is_some() {
            if let Err(err) = self.disconnect() {
                self.emit(SessionEvent::Error(err.into()));
            }
        }
    }

    fn on_card_inserted(&mut self, atr: Option<Bytes>) {
        let card = Card::from_atr(atr);
        info!(
            reader = %self.name,
            atr = %hex::encode(card.atr()),
            standard = ?card.standard(),
            "card inserted"
        );
        self.card = Some(card);

        if let Err(err) = self.connect(ConnectMode::Card) {
            self.emit(SessionEvent::Error(err.into()));
            return;
        }

        if !self.config.auto_processing {
            if let Some(card) = self.card.clone() {
                self.emit(SessionEvent::Card(card));
            }
            return;
        }

        if let Err(err) = self.process_card() {
            self.emit(SessionEvent::Error(err));
        }
    }

    /// Application-selection handling run when auto-processing is enabled
    fn process_card(&mut self) -> Result<(), Error> {
        let Some(card) = self.card.clone() else {
            return Ok(());
        };

        if card.standard() == TagStandard::Iso14443_4 {
            if let Some(aid) = self.aid.clone() {
                self.select_application(&aid)?;
            }
        }

        self.emit(SessionEvent::Card(card));
        Ok(())
    }

    /// SELECT the configured application before handing the card upward
    fn select_application(&mut self, aid: &[u8]) -> Result<(), Error> {
        let mut command = Vec::with_capacity(5 + aid.len());
        command.extend_from_slice(&[0x00, 0xa4, 0x04, 0x00, aid.len() as u8]);
        command.extend_from_slice(aid);

        let response = self.transmit(&command, pcsc::MAX_BUFFER_SIZE)?;
        match *response.as_ref() {
            [.., 0x90, 0x00] => {
                debug!(reader = %self.name, aid = %hex::encode(aid), "application selected");
                Ok(())
            }
            [.., sw1, sw2] => Err(Error::SelectRejected { sw1, sw2 }),
            _ => Err(Error::SelectRejected { sw1: 0x00, sw2: 0x00 }),
        }
    }
}
