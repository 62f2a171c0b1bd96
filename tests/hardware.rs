//! Integration tests against a live PC/SC service
//!
//! These exercise the real backend end to end and skip gracefully when no
//! card service or reader is available.

use std::time::Duration;

use nfc_pcsc::{HubEvent, PcscService, ReaderHub, SessionConfig};

/// Try to start the real backend, or None when PC/SC is unavailable
fn start_service() -> Option<(PcscService, nfc_pcsc::ServiceNotificationReceiver<nfc_pcsc::PcscDriver>)> {
    match PcscService::start() {
        Ok(pair) => Some(pair),
        Err(err) => {
            println!("Skipping test, PC/SC not available: {err}");
            None
        }
    }
}

#[test]
fn hub_reports_attached_readers() {
    let Some((service, notifications)) = start_service() else {
        return;
    };

    let mut hub = ReaderHub::with_config(
        service,
        notifications.clone(),
        SessionConfig::default().with_auto_processing(false),
    );
    let events = hub.events();

    // Pump whatever the monitor finds in its first passes.
    let deadline = std::time::Instant::now() + Duration::from_secs(3);
    while std::time::Instant::now() < deadline {
        match notifications.recv_timeout(Duration::from_millis(200)) {
            Ok(notification) => hub.handle_notification(notification),
            Err(_) => break,
        }
    }

    let mut readers = 0;
    for event in events.try_iter() {
        match event {
            HubEvent::Reader(session) => {
                println!("detected reader: {}", session.name());
                assert!(!session.name().is_empty());
                readers += 1;
            }
            HubEvent::Error(err) => println!("service error (might be expected): {err}"),
        }
    }

    if readers == 0 {
        println!("Skipping assertions, no reader attached");
    }

    hub.close();
}

#[test]
fn session_connects_when_a_card_is_present() {
    let Some((service, notifications)) = start_service() else {
        return;
    };

    let mut hub = ReaderHub::with_config(
        service,
        notifications.clone(),
        SessionConfig::default().with_auto_processing(false),
    );
    let events = hub.events();

    if let Ok(notification) = notifications.recv_timeout(Duration::from_secs(3)) {
        hub.handle_notification(notification);
    }

    let Some(HubEvent::Reader(mut session)) = events.try_iter().next() else {
        println!("Skipping test, no reader attached");
        hub.close();
        return;
    };

    // With a card in the reader the first status notification drives the
    // insert -> connect transition and, in manual mode, a Card event.
    let session_events = session.events();
    std::thread::spawn(move || session.run());

    match session_events.recv_timeout(Duration::from_secs(3)) {
        Ok(nfc_pcsc::SessionEvent::Card(card)) => {
            println!("card present, ATR {}", hex::encode(card.atr()));
        }
        Ok(event) => println!("session event (might be expected): {event:?}"),
        Err(_) => println!("Skipping assertions, no card in reader"),
    }

    hub.close();
}
