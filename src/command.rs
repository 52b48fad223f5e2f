//! Command encoding and dispatch with confirm/retry.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use tokio::net::UdpSocket;
use tokio::sync::watch;

use crate::client::Shared;
use crate::errors::Error;
use crate::notify::{ChangeEvent, ChangeKind};
use crate::osc::{OscArg, OscMessage};
use crate::state::LightState;
use crate::types::{Brightness, Effect, HueSaturation, Power};

type Result<T> = std::result::Result<T, Error>;

/// A control command for a single device.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetPower(Power),
    SetBrightness(Brightness),
    SetColor(HueSaturation),
    SetEffect(Effect),
}

impl Command {
    /// Encode as the OSC message the device's command endpoint expects.
    pub(crate) fn to_osc(&self) -> OscMessage {
        match self {
            Command::SetPower(power) => {
                OscMessage::new("/power").arg(OscArg::Int(i32::from(power.is_on())))
            }
            Command::SetBrightness(brightness) => {
                OscMessage::new("/brightness").arg(OscArg::Int(i32::from(brightness.value())))
            }
            Command::SetColor(color) => OscMessage::new("/color")
                .arg(OscArg::Float(color.hue_ratio()))
                .arg(OscArg::Float(color.saturation_ratio())),
            Command::SetEffect(effect) => {
                OscMessage::new("/effect").arg(OscArg::Str(effect.id()))
            }
        }
    }

    /// Optimistically apply the commanded value to a local state.
    pub(crate) fn apply_to(&self, state: &mut LightState) {
        match self {
            Command::SetPower(power) => state.power = *power,
            Command::SetBrightness(brightness) => state.brightness = *brightness,
            Command::SetColor(color) => state.color = *color,
            Command::SetEffect(effect) => state.effect = Some(*effect),
        }
    }
}

/// Delay ladder between resend attempts after a send-time socket error.
const RETRY_DELAYS_MS: [u64; 3] = [750, 1500, 3000];

/// Sends commands to device command endpoints.
///
/// Sends to the same address are serialized through a per-address mutex;
/// sends to different addresses proceed independently. There is no
/// transport-level acknowledgment: the local state is updated
/// optimistically and, when confirmation is enabled, a state report with a
/// newer counter within the confirm window counts as success.
pub(crate) struct CommandSender {
    shared: Arc<Shared>,
    socket: Arc<UdpSocket>,
    cancel: watch::Receiver<bool>,
    locks: Mutex<HashMap<Ipv4Addr, Arc<tokio::sync::Mutex<()>>>>,
}

impl CommandSender {
    pub fn new(shared: Arc<Shared>, socket: Arc<UdpSocket>, cancel: watch::Receiver<bool>) -> Self {
        CommandSender {
            shared,
            socket,
            cancel,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn send(&self, address: Ipv4Addr, command: Command) -> Result<()> {
        let (family, baseline) = {
            let registry = self.shared.registry.lock().unwrap();
            let device = registry.get(address).ok_or(Error::UnknownDevice(address))?;
            (device.family(), device.state_counter())
        };

        let lock = self.lock_for(address);
        let _guard = lock.lock().await;

        // Optimistic update so consumers see the intent immediately;
        // remember the confirmed values for a possible revert.
        let confirmed = {
            let mut registry = self.shared.registry.lock().unwrap();
            let device = registry
                .get_mut(address)
                .ok_or(Error::UnknownDevice(address))?;
            let confirmed = device.light_state().clone();
            command.apply_to(&mut device.light_state);
            confirmed
        };
        self.shared.subscribers.emit(&ChangeEvent {
            address,
            kind: ChangeKind::State,
        });

        let datagram = command.to_osc().encode();
        let port = self.shared.config.profile_for(family).command_port;
        let target = SocketAddr::from((address, port));
        let attempts = self.shared.config.max_command_attempts();

        let mut cancel = self.cancel.clone();
        let mut sent = false;
        let mut last_socket_err = None;
        for attempt in 1..=attempts {
            if self.cancelled() {
                return self.finish_cancelled(address, baseline, &confirmed);
            }
            match self.socket.send_to(&datagram, target).await {
                Ok(_) => {
                    sent = true;
                    if !self.shared.config.confirm_commands() {
                        return Ok(());
                    }
                    if self.await_confirmation(address, baseline).await {
                        return Ok(());
                    }
                    debug!(
                        "command to {} unconfirmed (attempt {}/{})",
                        address, attempt, attempts
                    );
                }
                Err(e) => {
                    warn!("command send to {} failed: {}", target, e);
                    last_socket_err = Some(e);
                    let delay_idx = ((attempt - 1) as usize).min(RETRY_DELAYS_MS.len() - 1);
                    let delay = Duration::from_millis(RETRY_DELAYS_MS[delay_idx]);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.changed() => {}
                    }
                }
            }
        }

        if self.cancelled() {
            return self.finish_cancelled(address, baseline, &confirmed);
        }

        // A confirming report may have raced the last timeout
        if self.confirmed(address, baseline) {
            return Ok(());
        }
        self.revert(address, baseline, &confirmed);

        match last_socket_err {
            Some(err) if !sent => Err(Error::socket("send_to", err)),
            _ => Err(Error::CommandTimeout { address, attempts }),
        }
    }

    /// True once the owning client has started tearing down.
    fn cancelled(&self) -> bool {
        *self.cancel.borrow() || self.cancel.has_changed().is_err()
    }

    /// Teardown interrupted the command mid-flight: keep a confirmation
    /// that already landed, otherwise roll back and report the client gone.
    fn finish_cancelled(
        &self,
        address: Ipv4Addr,
        baseline: Option<u64>,
        confirmed: &LightState,
    ) -> Result<()> {
        if self.confirmed(address, baseline) {
            return Ok(());
        }
        self.revert(address, baseline, confirmed);
        Err(Error::NotRunning)
    }

    fn lock_for(&self, address: Ipv4Addr) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        Arc::clone(
            locks
                .entry(address)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    pub(crate) fn forget(&self, address: Ipv4Addr) {
        self.locks.lock().unwrap().remove(&address);
    }

    /// Wait up to the confirm timeout for a state report with a counter
    /// newer than `baseline`. Returns early when teardown begins.
    async fn await_confirmation(&self, address: Ipv4Addr, baseline: Option<u64>) -> bool {
        let timeout = self.shared.config.confirm_timeout();
        let slice = (timeout / 10).max(Duration::from_millis(10));
        let start = std::time::Instant::now();
        let mut cancel = self.cancel.clone();

        while start.elapsed() < timeout {
            tokio::select! {
                _ = tokio::time::sleep(slice) => {}
                _ = cancel.changed() => return false,
            }
            if self.confirmed(address, baseline) {
                return true;
            }
        }
        false
    }

    fn confirmed(&self, address: Ipv4Addr, baseline: Option<u64>) -> bool {
        let registry = self.shared.registry.lock().unwrap();
        registry
            .get(address)
            .and_then(|device| device.state_counter())
            .is_some_and(|counter| baseline.is_none_or(|b| counter > b))
    }

    /// Roll the optimistic state back to the last confirmed values, unless
    /// a newer report landed in the meantime.
    fn revert(&self, address: Ipv4Addr, baseline: Option<u64>, confirmed: &LightState) {
        {
            let mut registry = self.shared.registry.lock().unwrap();
            let Some(device) = registry.get_mut(address) else {
                return;
            };
            if device.state_counter() != baseline {
                return;
            }
            device.light_state = confirmed.clone();
        }
        self.shared.subscribers.emit(&ChangeEvent {
            address,
            kind: ChangeKind::State,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, DeviceFamily, PortProfile};
    use crate::registry::DevicePatch;

    const DEVICE: Ipv4Addr = Ipv4Addr::LOCALHOST;

    async fn sender_with_target(
        config: ClientConfig,
    ) -> (CommandSender, Arc<Shared>, UdpSocket, watch::Sender<bool>) {
        // Bind a receiver standing in for the device's command endpoint
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let command_port = receiver.local_addr().unwrap().port();

        let config = config.with_profiles(vec![PortProfile {
            family: DeviceFamily::Monos,
            discovery_port: 0,
            state_port: 0,
            command_port,
        }]);
        let shared = Arc::new(Shared::new(config));
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let sender = CommandSender::new(Arc::clone(&shared), socket, cancel_rx);
        (sender, shared, receiver, cancel_tx)
    }

    fn seed_device(shared: &Shared, counter: u64, brightness: u8) {
        let mut registry = shared.registry.lock().unwrap();
        registry.upsert(
            DEVICE,
            DevicePatch {
                mac_address: Some("AA:BB".to_string()),
                model: Some("Monos 16".to_string()),
                nickname: None,
            },
        );
        let device = registry.get_mut(DEVICE).unwrap();
        device.apply_report(
            counter,
            LightState {
                power: Power::On,
                brightness: Brightness::new(brightness),
                ..LightState::default()
            },
        );
    }

    #[tokio::test]
    async fn test_unknown_device_sends_nothing() {
        let (sender, _shared, receiver, _cancel) = sender_with_target(ClientConfig::default()).await;

        let err = sender
            .send(DEVICE, Command::SetPower(Power::On))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownDevice(addr) if addr == DEVICE));

        let mut buffer = [0u8; 64];
        let got_packet =
            tokio::time::timeout(Duration::from_millis(50), receiver.recv_from(&mut buffer)).await;
        assert!(got_packet.is_err(), "no packet should have been sent");
    }

    #[tokio::test]
    async fn test_fire_and_forget_sends_osc_and_updates_locally() {
        let config = ClientConfig::default().with_confirm_commands(false);
        let (sender, shared, receiver, _cancel) = sender_with_target(config).await;
        seed_device(&shared, 5, 100);

        sender
            .send(DEVICE, Command::SetBrightness(Brightness::new(200)))
            .await
            .unwrap();

        let mut buffer = [0u8; 64];
        let (size, _) = tokio::time::timeout(
            Duration::from_secs(1),
            receiver.recv_from(&mut buffer),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(&buffer[..12], b"/brightness\0");
        assert_eq!(&buffer[size - 4..size], &200i32.to_be_bytes());

        let registry = shared.registry.lock().unwrap();
        let device = registry.get(DEVICE).unwrap();
        assert_eq!(device.light_state().brightness().value(), 200);
        // Optimistic: the confirmed counter has not moved
        assert_eq!(device.state_counter(), Some(5));
    }

    #[tokio::test]
    async fn test_unconfirmed_command_times_out_and_reverts() {
        let config = ClientConfig::default()
            .with_confirm_timeout(Duration::from_millis(30))
            .with_max_command_attempts(2);
        let (sender, shared, _receiver, _cancel) = sender_with_target(config).await;
        seed_device(&shared, 5, 100);

        let err = sender
            .send(DEVICE, Command::SetBrightness(Brightness::new(128)))
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::CommandTimeout { address, attempts } if address == DEVICE && attempts == 2)
        );

        let registry = shared.registry.lock().unwrap();
        let device = registry.get(DEVICE).unwrap();
        assert_eq!(device.light_state().brightness().value(), 100);
        assert_eq!(device.state_counter(), Some(5));
    }

    #[tokio::test]
    async fn test_confirming_report_completes_command() {
        let config = ClientConfig::default()
            .with_confirm_timeout(Duration::from_millis(200))
            .with_max_command_attempts(2);
        let (sender, shared, _receiver, _cancel) = sender_with_target(config).await;
        seed_device(&shared, 5, 100);

        // Simulate the device acknowledging with a newer state report
        let confirm_shared = Arc::clone(&shared);
        let confirmer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            let mut registry = confirm_shared.registry.lock().unwrap();
            registry.get_mut(DEVICE).unwrap().apply_report(
                6,
                LightState {
                    power: Power::On,
                    brightness: Brightness::new(128),
                    ..LightState::default()
                },
            );
        });

        sender
            .send(DEVICE, Command::SetBrightness(Brightness::new(128)))
            .await
            .unwrap();
        confirmer.await.unwrap();

        let registry = shared.registry.lock().unwrap();
        let device = registry.get(DEVICE).unwrap();
        assert_eq!(device.state_counter(), Some(6));
        assert_eq!(device.light_state().brightness().value(), 128);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_confirm_wait_and_reverts() {
        let config = ClientConfig::default()
            .with_confirm_timeout(Duration::from_millis(500))
            .with_max_command_attempts(3);
        let (sender, shared, _receiver, cancel) = sender_with_target(config).await;
        seed_device(&shared, 5, 100);

        let sender = Arc::new(sender);
        let worker = Arc::clone(&sender);
        let command = tokio::spawn(async move {
            worker
                .send(DEVICE, Command::SetBrightness(Brightness::new(128)))
                .await
        });

        // Trip teardown while the first confirm window is still open
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_millis(100), command)
            .await
            .expect("cancelled command must resolve promptly")
            .unwrap();
        assert!(matches!(result, Err(Error::NotRunning)));

        let registry = shared.registry.lock().unwrap();
        let device = registry.get(DEVICE).unwrap();
        assert_eq!(device.light_state().brightness().value(), 100);
        assert_eq!(device.state_counter(), Some(5));
    }
}
