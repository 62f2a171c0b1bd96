//! Events emitted by sessions and the hub

use std::fmt;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::card::Card;
use crate::driver::ReaderDriver;
use crate::error::Error;
use crate::session::ReaderSession;

/// Events a reader session publishes to its subscribers
#[derive(Debug)]
pub enum SessionEvent {
    /// A card was inserted and, in manual mode, is ready for the caller;
    /// in auto-processing mode it is emitted after application selection
    Card(Card),
    /// A card was removed; carries a snapshot of the record as it was at
    /// removal time
    CardRemoved(Card),
    /// The reader was removed from the system
    End,
    /// A failure occurred inside the status-change handling
    Error(Error),
}

/// Events the hub publishes to its subscribers
pub enum HubEvent<D: ReaderDriver> {
    /// A new reader was detected and wrapped in a session
    Reader(ReaderSession<D>),
    /// The driver reported a service-level error
    Error(Error),
}

impl<D: ReaderDriver> fmt::Debug for HubEvent<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reader(session) => f.debug_tuple("Reader").field(session).finish(),
            Self::Error(err) => f.debug_tuple("Error").field(err).finish(),
        }
    }
}

/// Sender half of a session event channel
pub type SessionEventSender = Sender<SessionEvent>;
/// Receiver half of a session event channel
pub type SessionEventReceiver = Receiver<SessionEvent>;

/// Sender half of a hub event channel
pub type HubEventSender<D> = Sender<HubEvent<D>>;
/// Receiver half of a hub event channel
pub type HubEventReceiver<D> = Receiver<HubEvent<D>>;

/// Create an unbounded channel for session events
pub fn session_event_channel() -> (SessionEventSender, SessionEventReceiver) {
    unbounded()
}

/// Create an unbounded channel for hub events
pub fn hub_event_channel<D: ReaderDriver>() -> (HubEventSender<D>, HubEventReceiver<D>) {
    unbounded()
}
