//! State synchronization: push ingestion, poll fallback, offline detection.
//!
//! Both ingestion paths feed [`ingest`], so the counter-gated update rule
//! can be exercised independently of any socket.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use tokio::net::UdpSocket;

use crate::client::Shared;
use crate::config::DeviceFamily;
use crate::device::ReportOutcome;
use crate::notify::{ChangeEvent, ChangeKind};
use crate::protocol::{self, Packet};
use crate::registry::DevicePatch;
use crate::state::Availability;

/// Apply one received packet to the registry and notify subscribers.
///
/// State reports go through the counter gate: a report whose counter is not
/// newer than the stored one changes nothing and emits nothing. An applied
/// report emits exactly one `State` notification, preceded by an
/// `Availability` notification when it brought the device back Online.
pub(crate) fn ingest(shared: &Shared, source: Ipv4Addr, packet: Packet) {
    let mut events = Vec::new();

    match packet {
        Packet::Announce(announcement) => {
            let outcome = shared.registry.lock().unwrap().upsert(
                source,
                DevicePatch {
                    mac_address: Some(announcement.mac),
                    model: Some(announcement.model),
                    nickname: announcement.nickname,
                },
            );
            if outcome.came_online {
                events.push(ChangeEvent {
                    address: source,
                    kind: ChangeKind::Availability(Availability::Online),
                });
            }
        }
        Packet::StateReport(report) => {
            let state = report.light_state();
            let outcome = {
                let mut registry = shared.registry.lock().unwrap();
                registry
                    .get_or_create(source)
                    .apply_report(report.counter, state)
            };
            match outcome {
                ReportOutcome::Discarded => {
                    debug!("discarding stale report (counter {}) from {}", report.counter, source);
                }
                ReportOutcome::Applied { came_online } => {
                    if came_online {
                        events.push(ChangeEvent {
                            address: source,
                            kind: ChangeKind::Availability(Availability::Online),
                        });
                    }
                    events.push(ChangeEvent {
                        address: source,
                        kind: ChangeKind::State,
                    });
                }
            }
        }
        Packet::Discover | Packet::GetState => {
            // Requests addressed to devices, not to us
            debug!("ignoring request packet from {}", source);
        }
    }

    shared.subscribers.emit_all(&events);
}

/// Receive loop for one state-report socket.
///
/// Runs until the owning task is aborted. Transport and parse errors are
/// logged and the loop continues; they never take the listener down.
pub(crate) async fn run_push_loop(shared: Arc<Shared>, socket: Arc<UdpSocket>) {
    let mut buffer = [0u8; 2048];

    loop {
        match socket.recv_from(&mut buffer).await {
            Ok((size, SocketAddr::V4(peer))) => {
                match protocol::parse_packet(&buffer[..size]) {
                    Ok(packet) => ingest(&shared, *peer.ip(), packet),
                    Err(e) => warn!("dropping malformed packet from {}: {}", peer, e),
                }
            }
            Ok((_, peer)) => debug!("ignoring non-IPv4 datagram from {}", peer),
            Err(e) => {
                error!("state socket error: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

/// Poll fallback loop.
///
/// Every poll interval: devices with no accepted packet since the last tick
/// accrue a miss (enough consecutive misses flips an Online device to
/// Offline), then every known device gets a state query. Queries are sent
/// from the bound state socket so replies land on the push path.
pub(crate) async fn run_poll_loop(
    shared: Arc<Shared>,
    sockets: HashMap<DeviceFamily, Arc<UdpSocket>>,
) {
    let interval = shared.config.poll_interval();
    let offline_after = shared.config.offline_after_misses();
    let query = match protocol::encode_packet(&Packet::GetState) {
        Ok(query) => query,
        Err(e) => {
            error!("could not encode state query: {}", e);
            return;
        }
    };

    loop {
        tokio::time::sleep(interval).await;

        let mut events = Vec::new();
        let targets: Vec<(Ipv4Addr, DeviceFamily)> = {
            let mut registry = shared.registry.lock().unwrap();
            let mut targets = Vec::new();
            for device in registry.iter_mut() {
                if device.last_seen().elapsed() >= interval
                    && device.note_missed_poll(offline_after)
                {
                    events.push(ChangeEvent {
                        address: device.address(),
                        kind: ChangeKind::Availability(Availability::Offline),
                    });
                }
                targets.push((device.address(), device.family()));
            }
            targets
        };
        shared.subscribers.emit_all(&events);

        for (address, family) in targets {
            let Some(socket) = sockets.get(&family).or_else(|| sockets.values().next()) else {
                continue;
            };
            let target = SocketAddr::from((address, shared.config.profile_for(family).state_port));
            if let Err(e) = socket.send_to(&query, target).await {
                warn!("state query to {} failed: {}", target, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::notify::ChangeKind;
    use crate::protocol::{Announcement, StateReport};
    use std::sync::Mutex;

    fn shared() -> Arc<Shared> {
        Arc::new(Shared::new(ClientConfig::default()))
    }

    fn report(counter: u64, brightness: u8) -> Packet {
        Packet::StateReport(StateReport {
            counter,
            power: true,
            brightness,
            hue: 120,
            saturation: 50,
            effect: None,
        })
    }

    fn collect_events(shared: &Shared) -> (crate::Subscription, Arc<Mutex<Vec<ChangeEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let subscription = shared.subscribers.add(move |event| {
            sink.lock().unwrap().push(*event);
        });
        (subscription, events)
    }

    #[test]
    fn test_counter_scenario_announce_then_out_of_order_pushes() {
        let shared = shared();
        let addr = Ipv4Addr::new(10, 0, 0, 5);
        let (_subscription, events) = collect_events(&shared);

        // Device announces, then reports counter=5 brightness=100
        ingest(
            &shared,
            addr,
            Packet::Announce(Announcement {
                mac: "AA:BB".to_string(),
                model: "Fluora".to_string(),
                nickname: None,
            }),
        );
        ingest(&shared, addr, report(5, 100));

        // Late push with counter=4: state unchanged, counter stays 5,
        // no notification
        let before = events.lock().unwrap().len();
        ingest(&shared, addr, report(4, 50));
        {
            let registry = shared.registry.lock().unwrap();
            let device = registry.get(addr).unwrap();
            assert_eq!(device.state_counter(), Some(5));
            assert_eq!(device.light_state().brightness().value(), 100);
        }
        assert_eq!(events.lock().unwrap().len(), before);

        // Newer push with counter=6: applied, exactly one notification
        ingest(&shared, addr, report(6, 200));
        {
            let registry = shared.registry.lock().unwrap();
            let device = registry.get(addr).unwrap();
            assert_eq!(device.state_counter(), Some(6));
            assert_eq!(device.light_state().brightness().value(), 200);
        }
        let events = events.lock().unwrap();
        assert_eq!(events.len(), before + 1);
        assert_eq!(events.last().unwrap().kind, ChangeKind::State);
    }

    #[test]
    fn test_state_packet_creates_device() {
        let shared = shared();
        let addr = Ipv4Addr::new(10, 0, 0, 9);
        ingest(&shared, addr, report(1, 10));

        let registry = shared.registry.lock().unwrap();
        let device = registry.get(addr).unwrap();
        assert_eq!(device.mac_address(), None);
        assert_eq!(device.state_counter(), Some(1));
    }

    #[test]
    fn test_offline_device_recovers_with_availability_event() {
        let shared = shared();
        let addr = Ipv4Addr::new(10, 0, 0, 5);
        ingest(&shared, addr, report(1, 10));

        // Push the device Offline through the miss counter
        {
            let mut registry = shared.registry.lock().unwrap();
            let device = registry.get_mut(addr).unwrap();
            for _ in 0..3 {
                device.note_missed_poll(3);
            }
            assert_eq!(device.availability(), Availability::Offline);
        }

        let (_subscription, events) = collect_events(&shared);
        ingest(&shared, addr, report(2, 20));

        let events = events.lock().unwrap();
        assert_eq!(
            events[0].kind,
            ChangeKind::Availability(Availability::Online)
        );
        assert_eq!(events[1].kind, ChangeKind::State);
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_push_loop_ingests_datagrams() {
        let shared = shared();
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let port = socket.local_addr().unwrap().port();
        let task = tokio::spawn(run_push_loop(Arc::clone(&shared), socket));

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let datagram = protocol::encode_packet(&report(3, 42)).unwrap();
        sender
            .send_to(&datagram, ("127.0.0.1", port))
            .await
            .unwrap();

        // Give the loop a moment to pick the packet up
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if !shared.registry.lock().unwrap().is_empty() {
                break;
            }
        }

        let registry = shared.registry.lock().unwrap();
        let device = registry.get(Ipv4Addr::LOCALHOST).unwrap();
        assert_eq!(device.state_counter(), Some(3));
        assert_eq!(device.light_state().brightness().value(), 42);
        drop(registry);
        task.abort();
    }

    #[tokio::test]
    async fn test_poll_loop_marks_silent_devices_offline() {
        let config = ClientConfig::default()
            .with_poll_interval(Duration::from_millis(20))
            .with_offline_after_misses(2);
        let shared = Arc::new(Shared::new(config));
        let addr = Ipv4Addr::new(10, 0, 0, 5);
        ingest(&shared, addr, report(1, 10));

        let (_subscription, events) = collect_events(&shared);
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let task = tokio::spawn(run_poll_loop(
            Arc::clone(&shared),
            HashMap::from([(DeviceFamily::Monos, socket)]),
        ));

        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let registry = shared.registry.lock().unwrap();
            if registry.get(addr).unwrap().availability() == Availability::Offline {
                break;
            }
        }
        task.abort();

        let registry = shared.registry.lock().unwrap();
        assert_eq!(registry.get(addr).unwrap().availability(), Availability::Offline);
        // Device is retained, only marked unavailable
        assert_eq!(registry.len(), 1);
        drop(registry);

        let events = events.lock().unwrap();
        assert_eq!(
            events
                .iter()
                .filter(|e| e.kind == ChangeKind::Availability(Availability::Offline))
                .count(),
            1
        );
    }
}
