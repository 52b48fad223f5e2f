//! Device discovery via UDP broadcast.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio::net::UdpSocket;

use crate::client::Shared;
use crate::errors::Error;
use crate::notify::{ChangeEvent, ChangeKind};
use crate::protocol::{self, Packet};
use crate::registry::DevicePatch;
use crate::state::Availability;

type Result<T> = std::result::Result<T, Error>;

const RECV_SLICE: Duration = Duration::from_millis(500);

/// Broadcast a discovery request on every configured family port and
/// collect announcement replies for the configured window.
///
/// Replies are upserted into the registry as they arrive; the returned
/// addresses are the devices first seen during this invocation. Malformed
/// replies are dropped and logged. Safe to re-invoke at any time.
pub(crate) async fn run_discovery(shared: &Shared) -> Result<Vec<Ipv4Addr>> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|e| Error::socket("bind", e))?;
    socket
        .set_broadcast(true)
        .map_err(|e| Error::socket("set_broadcast", e))?;

    let request = protocol::encode_packet(&Packet::Discover)?;
    for profile in shared.config.profiles() {
        let target = SocketAddr::from((Ipv4Addr::BROADCAST, profile.discovery_port));
        socket
            .send_to(&request, target)
            .await
            .map_err(|e| Error::socket("send_to", e))?;
    }

    let window = shared.config.discovery_window();
    let start = Instant::now();
    let mut buffer = [0u8; 2048];
    let mut newly_seen = Vec::new();

    while start.elapsed() < window {
        let received = tokio::time::timeout(RECV_SLICE, socket.recv_from(&mut buffer)).await;
        let (size, peer) = match received {
            Ok(Ok(reply)) => reply,
            // Slice elapsed or transient recv error - keep listening until
            // the window closes
            Ok(Err(_)) | Err(_) => continue,
        };

        let SocketAddr::V4(peer) = peer else {
            continue;
        };
        let address = *peer.ip();

        let announcement = match protocol::parse_packet(&buffer[..size]) {
            Ok(Packet::Announce(announcement)) => announcement,
            Ok(other) => {
                debug!("ignoring unexpected {:?} during discovery from {}", other, address);
                continue;
            }
            Err(e) => {
                warn!("dropping malformed discovery reply from {}: {}", address, e);
                continue;
            }
        };

        let outcome = shared.registry.lock().unwrap().upsert(
            address,
            DevicePatch {
                mac_address: Some(announcement.mac),
                model: Some(announcement.model),
                nickname: announcement.nickname,
            },
        );
        if outcome.created {
            debug!("discovered new device at {}", address);
            newly_seen.push(address);
        }
        if outcome.came_online {
            shared.subscribers.emit(&ChangeEvent {
                address,
                kind: ChangeKind::Availability(Availability::Online),
            });
        }
    }

    Ok(newly_seen)
}
