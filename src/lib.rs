//! Event-driven NFC reader and card session management over PC/SC
//!
//! This crate tracks reader attach/detach and card insertion/removal through
//! the PC/SC status-change interface, negotiates a share-mode connection to
//! each inserted card and exchanges APDUs against that connection, turning
//! driver failures into typed errors.
//!
//! The [`ReaderHub`] wraps every detected reader in a [`ReaderSession`]; each
//! session consumes its own in-order notification stream and publishes card
//! lifecycle events on a channel.
//!
//! # Example
//!
//! ```no_run
//! use nfc_pcsc::{HubEvent, PcscService, ReaderHub, SessionEvent};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (service, notifications) = PcscService::start()?;
//!     let hub = ReaderHub::new(service, notifications);
//!     let events = hub.events();
//!
//!     std::thread::spawn(move || hub.run());
//!
//!     for event in events.iter() {
//!         match event {
//!             HubEvent::Reader(mut session) => {
//!                 println!("reader: {}", session.name());
//!                 session.set_aid("F222222222")?;
//!                 let session_events = session.events();
//!                 std::thread::spawn(move || session.run());
//!
//!                 std::thread::spawn(move || {
//!                     for event in session_events.iter() {
//!                         match event {
//!                             SessionEvent::Card(card) => {
//!                                 println!("card: {}", hex::encode(card.atr()));
//!                             }
//!                             SessionEvent::CardRemoved(_) => println!("card removed"),
//!                             SessionEvent::End => break,
//!                             SessionEvent::Error(err) => eprintln!("error: {err}"),
//!                         }
//!                     }
//!                 });
//!             }
//!             HubEvent::Error(err) => eprintln!("error: {err}"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod card;
mod config;
mod driver;
mod error;
mod event;
mod hub;
mod service;
mod session;

pub use card::{Card, TagStandard};
pub use config::{ConnectMode, SessionConfig, CONTROL_FUNCTION};
pub use driver::{
    reader_notification_channel, service_notification_channel, ReaderDriver,
    ReaderNotification, ReaderNotificationReceiver, ReaderNotificationSender, ServiceDriver,
    ServiceNotification, ServiceNotificationReceiver, ServiceNotificationSender, Status,
};
pub use error::{
    ConnectError, ControlError, DisconnectError, Error, SetAidError, TransmitError,
};
pub use event::{
    hub_event_channel, session_event_channel, HubEvent, HubEventReceiver, HubEventSender,
    SessionEvent, SessionEventReceiver, SessionEventSender,
};
pub use hub::ReaderHub;
pub use service::{PcscDriver, PcscService};
pub use session::{Connection, ReaderSession};

// Re-export the pcsc types that appear in the public API.
pub use pcsc::{Disposition, Protocol, ShareMode, State};
