//! Real PC/SC backend for the driver traits
//!
//! [`PcscService`] owns a PC/SC context and a monitor thread that diffs the
//! reader list, waits on `get_status_change` and fans raw status words out to
//! per-reader notification channels. [`PcscDriver`] maps the request surface
//! onto a live card handle.

use std::collections::HashMap;
use std::ffi::CString;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use pcsc::{Card, Context, Disposition, Protocol, Protocols, ReaderState, Scope, ShareMode, State};
use tracing::{debug, trace, warn};

use crate::driver::{
    reader_notification_channel, ReaderDriver, ReaderNotification, ReaderNotificationSender,
    ServiceDriver, ServiceNotification, ServiceNotificationReceiver, ServiceNotificationSender,
    Status,
};

/// How long a single `get_status_change` pass blocks before the monitor
/// re-checks the reader list and the running flag
const MONITOR_TIMEOUT: Duration = Duration::from_secs(1);

/// Reader handle backed by a live PC/SC context
pub struct PcscDriver {
    /// Shared PC/SC context
    context: Context,
    /// Reader name
    name: String,
    /// Reader name as the driver wants it
    cname: CString,
    /// Card connection, if established
    card: Option<Card>,
}

impl fmt::Debug for PcscDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscDriver")
            .field("name", &self.name)
            .field("has_card", &self.card.is_some())
            .finish()
    }
}

impl PcscDriver {
    pub(crate) const fn new(context: Context, name: String, cname: CString) -> Self {
        Self {
            context,
            name,
            cname,
            card: None,
        }
    }
}

impl ReaderDriver for PcscDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&mut self, mode: ShareMode) -> Result<Option<Protocol>, pcsc::Error> {
        let protocols = match mode {
            ShareMode::Direct => Protocols::UNDEFINED,
            _ => Protocols::ANY,
        };

        let card = self.context.connect(&self.cname, mode, protocols)?;

        // Direct-mode connections negotiate no protocol.
        let protocol = if matches!(mode, ShareMode::Direct) {
            None
        } else {
            card.status2_owned().ok().and_then(|status| status.protocol2())
        };

        self.card = Some(card);
        Ok(protocol)
    }

    fn disconnect(&mut self, disposition: Disposition) -> Result<(), pcsc::Error> {
        match self.card.take() {
            Some(card) => card.disconnect(disposition).map_err(|(card, err)| {
                // Keep the handle so the caller can retry.
                self.card = Some(card);
                err
            }),
            None => Ok(()),
        }
    }

    fn transmit(
        &mut self,
        data: &[u8],
        response_max_len: usize,
        _protocol: Option<Protocol>,
    ) -> Result<Bytes, pcsc::Error> {
        // The card handle already carries the negotiated protocol; the token
        // is accepted for interface parity and driver doubles.
        let card = self.card.as_ref().ok_or(pcsc::Error::NoSmartcard)?;

        let mut buffer = vec![0u8; response_max_len.max(2)];
        let response = card.transmit(data, &mut buffer)?;
        Ok(Bytes::copy_from_slice(response))
    }

    fn control(
        &mut self,
        data: &[u8],
        control_code: u32,
        response_max_len: usize,
    ) -> Result<Bytes, pcsc::Error> {
        let card = self.card.as_ref().ok_or(pcsc::Error::NoSmartcard)?;

        let mut buffer = vec![0u8; response_max_len];
        let response = card.control(control_code.into(), data, &mut buffer)?;
        Ok(Bytes::copy_from_slice(response))
    }

    fn close(&mut self) {
        if let Some(card) = self.card.take() {
            let _ = card.disconnect(Disposition::LeaveCard);
        }
    }
}

impl Drop for PcscDriver {
    fn drop(&mut self) {
        self.close();
    }
}

/// Bookkeeping for one monitored reader
struct ReaderEntry {
    cname: CString,
    state: State,
    notifications: ReaderNotificationSender,
}

/// Service handle over a live PC/SC context with a monitor thread
#[allow(missing_debug_implementations)]
pub struct PcscService {
    /// PC/SC context shared with the monitor thread and reader drivers
    context: Context,
    /// Whether the monitor thread should keep running
    running: Arc<Mutex<bool>>,
}

impl PcscService {
    /// Establish a PC/SC context and start the monitor thread
    ///
    /// Returns the service handle together with the notification stream to
    /// hand to a [`ReaderHub`](crate::ReaderHub).
    pub fn start() -> Result<(Self, ServiceNotificationReceiver<PcscDriver>), pcsc::Error> {
        let context = Context::establish(Scope::User)?;
        let (notifications_tx, notifications_rx) = crate::driver::service_notification_channel();

        let service = Self {
            context,
            running: Arc::new(Mutex::new(true)),
        };
        service.spawn_monitor(notifications_tx);

        Ok((service, notifications_rx))
    }

    fn spawn_monitor(&self, notifications: ServiceNotificationSender<PcscDriver>) {
        let context = self.context.clone();
        let running = Arc::clone(&self.running);

        thread::spawn(move || {
            let mut readers: HashMap<String, ReaderEntry> = HashMap::new();

            loop {
                if !*running.lock().unwrap() {
                    break;
                }

                match context.list_readers_owned() {
                    Ok(current) => {
                        sync_readers(&context, &mut readers, &current, &notifications);
                    }
                    Err(pcsc::Error::NoReadersAvailable) => {
                        end_all(&mut readers);
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to list readers");
                        let _ = notifications.send(ServiceNotification::Error(err));
                        thread::sleep(MONITOR_TIMEOUT);
                        continue;
                    }
                }

                let mut reader_states =
                    vec![ReaderState::new(pcsc::PNP_NOTIFICATION(), State::UNAWARE)];
                for entry in readers.values() {
                    reader_states.push(ReaderState::new(entry.cname.clone(), entry.state));
                }

                match context.get_status_change(Some(MONITOR_TIMEOUT), &mut reader_states) {
                    Ok(()) => {
                        for reader_state in &reader_states {
                            if reader_state.name() == pcsc::PNP_NOTIFICATION() {
                                continue;
                            }

                            let event_state = reader_state.event_state();
                            if !event_state.contains(State::CHANGED) {
                                continue;
                            }

                            let name = reader_state.name().to_string_lossy().into_owned();
                            if let Some(entry) = readers.get_mut(&name) {
                                let state = event_state - State::CHANGED;
                                let atr = reader_state.atr();
                                let atr = (!atr.is_empty()).then(|| Bytes::copy_from_slice(atr));

                                trace!(reader = %name, ?state, "status change");
                                let _ = entry
                                    .notifications
                                    .send(ReaderNotification::Status(Status { state, atr }));
                                entry.state = state;
                            }
                        }
                    }
                    Err(pcsc::Error::Timeout) => {}
                    Err(pcsc::Error::Cancelled) => break,
                    // A reader can vanish between the list and the wait; the
                    // next pass re-diffs the list and reports it.
                    Err(pcsc::Error::UnknownReader | pcsc::Error::NoReadersAvailable) => {}
                    Err(err) => {
                        warn!(error = %err, "status wait failed");
                        let _ = notifications.send(ServiceNotification::Error(err));
                        thread::sleep(MONITOR_TIMEOUT);
                    }
                }
            }

            end_all(&mut readers);
        });
    }
}

impl ServiceDriver for PcscService {
    type Reader = PcscDriver;

    fn close(&mut self) {
        *self.running.lock().unwrap() = false;
        // Wake a blocked status wait so the monitor can exit promptly.
        let _ = self.context.cancel();
    }
}

/// Diff the live reader list against the monitored set, attaching new
/// readers and ending vanished ones
fn sync_readers(
    context: &Context,
    readers: &mut HashMap<String, ReaderEntry>,
    current: &[CString],
    notifications: &ServiceNotificationSender<PcscDriver>,
) {
    for cname in current {
        let name = cname.to_string_lossy().into_owned();
        if readers.contains_key(&name) {
            continue;
        }

        debug!(reader = %name, "reader attached");
        let (reader_tx, reader_rx) = reader_notification_channel();
        let driver = PcscDriver::new(context.clone(), name.clone(), cname.clone());
        readers.insert(
            name,
            ReaderEntry {
                cname: cname.clone(),
                state: State::UNAWARE,
                notifications: reader_tx,
            },
        );
        let _ = notifications.send(ServiceNotification::Attached {
            driver,
            notifications: reader_rx,
        });
    }

    let current_names: Vec<String> = current
        .iter()
        .map(|cname| cname.to_string_lossy().into_owned())
        .collect();
    readers.retain(|name, entry| {
        if current_names.contains(name) {
            return true;
        }
        debug!(reader = %name, "reader detached");
        let _ = entry.notifications.send(ReaderNotification::End);
        false
    });
}

/// Report every monitored reader as removed
fn end_all(readers: &mut HashMap<String, ReaderEntry>) {
    for (name, entry) in readers.drain() {
        debug!(reader = %name, "reader detached");
        let _ = entry.notifications.send(ReaderNotification::End);
    }
}
