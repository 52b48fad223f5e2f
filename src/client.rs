//! The shared client facade: lifecycle, sockets, and the public API.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::command::{Command, CommandSender};
use crate::config::{ClientConfig, DeviceFamily};
use crate::device::Device;
use crate::discovery;
use crate::errors::Error;
use crate::notify::{ChangeEvent, Subscribers, Subscription};
use crate::registry::DeviceRegistry;
use crate::sync;

type Result<T> = std::result::Result<T, Error>;

/// Client lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// State shared between the facade and its background tasks.
pub(crate) struct Shared {
    pub(crate) config: ClientConfig,
    pub(crate) registry: Mutex<DeviceRegistry>,
    pub(crate) subscribers: Subscribers,
}

impl Shared {
    pub(crate) fn new(config: ClientConfig) -> Self {
        Shared {
            config,
            registry: Mutex::new(DeviceRegistry::new()),
            subscribers: Subscribers::new(),
        }
    }
}

/// Resources that exist only while the client is running.
struct Active {
    sender: Arc<CommandSender>,
    cancel: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Active {
    /// Signal in-flight commands and rescans to stop, then abort the
    /// background tasks.
    fn abort_all(&self) {
        let _ = self.cancel.send(true);
        for task in &self.tasks {
            task.abort();
        }
    }

    /// Cancel all in-flight work and wait for the background tasks within
    /// the deadline. The sockets close when their last owner is gone.
    async fn shutdown(mut self, deadline: std::time::Duration) {
        self.abort_all();
        let tasks = std::mem::take(&mut self.tasks);
        let _ = tokio::time::timeout(deadline, async {
            for task in tasks {
                let _ = task.await;
            }
        })
        .await;
    }
}

impl Drop for Active {
    fn drop(&mut self) {
        self.abort_all();
    }
}

struct LifecycleInner {
    refcount: usize,
    state: Lifecycle,
    active: Option<Active>,
}

/// The PixelAir client facade.
///
/// Owns the discovery, state-report, and command sockets for the whole
/// device fleet; exactly one instance should exist per process, shared
/// (e.g. in an `Arc`) between all consumers. Consumers never open their own
/// sockets.
///
/// The client is reference-counted via [`acquire`](Self::acquire) /
/// [`release`](Self::release): the first acquisition binds the sockets,
/// seeds the registry with a discovery pass, and starts the push and poll
/// loops; the last release tears it all down again. The device registry
/// itself lives as long as the client value does.
///
/// # Example
///
/// ```ignore
/// use pixelair_rs::{ClientConfig, PixelAirClient};
///
/// let client = PixelAirClient::new(ClientConfig::default());
/// client.acquire().await?;
/// let _subscription = client.subscribe(|event| println!("{event:?}"));
/// for device in client.devices() {
///     println!("{} ({:?})", device.address(), device.availability());
/// }
/// client.release().await;
/// ```
pub struct PixelAirClient {
    shared: Arc<Shared>,
    lifecycle: tokio::sync::Mutex<LifecycleInner>,
}

impl Default for PixelAirClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl PixelAirClient {
    pub fn new(config: ClientConfig) -> Self {
        PixelAirClient {
            shared: Arc::new(Shared::new(config)),
            lifecycle: tokio::sync::Mutex::new(LifecycleInner {
                refcount: 0,
                state: Lifecycle::Stopped,
                active: None,
            }),
        }
    }

    /// Register a consumer. The 0 -> 1 transition binds the sockets and
    /// starts the background tasks; a bind failure is fatal for this
    /// acquisition attempt and leaves the client Stopped.
    pub async fn acquire(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.refcount > 0 {
            lifecycle.refcount += 1;
            return Ok(());
        }

        lifecycle.state = Lifecycle::Starting;
        match self.start().await {
            Ok(active) => {
                lifecycle.active = Some(active);
                lifecycle.refcount = 1;
                lifecycle.state = Lifecycle::Running;
                debug!("client started");
                Ok(())
            }
            Err(e) => {
                lifecycle.state = Lifecycle::Stopped;
                Err(e)
            }
        }
    }

    /// Deregister a consumer. The 1 -> 0 transition cancels all background
    /// work and closes the sockets, bounded by the teardown deadline.
    pub async fn release(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        match lifecycle.refcount {
            0 => warn!("release() called on a stopped client"),
            1 => {
                lifecycle.refcount = 0;
                lifecycle.state = Lifecycle::Stopping;
                if let Some(active) = lifecycle.active.take() {
                    active
                        .shutdown(self.shared.config.teardown_deadline())
                        .await;
                }
                lifecycle.state = Lifecycle::Stopped;
                debug!("client stopped");
            }
            _ => lifecycle.refcount -= 1,
        }
    }

    pub async fn lifecycle_state(&self) -> Lifecycle {
        self.lifecycle.lock().await.state
    }

    pub async fn is_running(&self) -> bool {
        self.lifecycle.lock().await.state == Lifecycle::Running
    }

    /// Snapshot of all known devices, including Offline ones.
    pub fn devices(&self) -> Vec<Device> {
        self.shared.registry.lock().unwrap().list()
    }

    /// Snapshot of a single device.
    pub fn device(&self, address: Ipv4Addr) -> Option<Device> {
        self.shared.registry.lock().unwrap().get(address).cloned()
    }

    /// Forget a device. Devices are never removed automatically; an
    /// unreachable device only goes Offline.
    pub async fn remove_device(&self, address: Ipv4Addr) {
        self.shared.registry.lock().unwrap().remove(address);
        let lifecycle = self.lifecycle.lock().await;
        if let Some(active) = lifecycle.active.as_ref() {
            active.sender.forget(address);
        }
    }

    /// Send a control command to a device.
    ///
    /// Fails with [`Error::UnknownDevice`] for addresses not in the
    /// registry (nothing is sent) and with [`Error::CommandTimeout`] when
    /// confirmation is enabled and no newer state report arrives after all
    /// retries, in which case the optimistic local state has been reverted.
    /// A release that stops the client mid-command cancels the retry
    /// ladder; the command resolves with [`Error::NotRunning`], also
    /// reverted.
    pub async fn command(&self, address: Ipv4Addr, command: Command) -> Result<()> {
        let sender = {
            let lifecycle = self.lifecycle.lock().await;
            let active = lifecycle.active.as_ref().ok_or(Error::NotRunning)?;
            Arc::clone(&active.sender)
        };
        sender.send(address, command).await
    }

    /// Subscribe to change notifications. The callback runs on the
    /// background task that accepted the packet; keep it short.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.shared.subscribers.add(callback)
    }

    /// Run another discovery pass ("scan again") and return the addresses
    /// newly seen during its window. Aborts with [`Error::NotRunning`]
    /// when the client is stopped, including mid-window.
    pub async fn rescan(&self) -> Result<Vec<Ipv4Addr>> {
        let mut cancel = {
            let lifecycle = self.lifecycle.lock().await;
            let active = lifecycle.active.as_ref().ok_or(Error::NotRunning)?;
            active.cancel.subscribe()
        };
        tokio::select! {
            result = discovery::run_discovery(&self.shared) => result,
            _ = cancel.changed() => Err(Error::NotRunning),
        }
    }

    async fn start(&self) -> Result<Active> {
        // One state socket per distinct port; families may share a socket
        let mut sockets_by_port: HashMap<u16, Arc<UdpSocket>> = HashMap::new();
        let mut family_sockets: HashMap<DeviceFamily, Arc<UdpSocket>> = HashMap::new();
        for profile in self.shared.config.profiles() {
            let socket = match sockets_by_port.get(&profile.state_port) {
                Some(socket) => Arc::clone(socket),
                None => {
                    let socket = UdpSocket::bind(("0.0.0.0", profile.state_port))
                        .await
                        .map_err(|e| Error::socket("bind state socket", e))?;
                    let socket = Arc::new(socket);
                    sockets_by_port.insert(profile.state_port, Arc::clone(&socket));
                    socket
                }
            };
            family_sockets.insert(profile.family, socket);
        }

        let command_socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| Error::socket("bind command socket", e))?;
        let (cancel, cancelled) = watch::channel(false);
        let sender = Arc::new(CommandSender::new(
            Arc::clone(&self.shared),
            Arc::new(command_socket),
            cancelled,
        ));

        let mut tasks = Vec::new();
        for socket in sockets_by_port.into_values() {
            tasks.push(tokio::spawn(sync::run_push_loop(
                Arc::clone(&self.shared),
                socket,
            )));
        }
        tasks.push(tokio::spawn(sync::run_poll_loop(
            Arc::clone(&self.shared),
            family_sockets,
        )));

        // Seed the registry without blocking the acquiring consumer
        let shared = Arc::clone(&self.shared);
        tasks.push(tokio::spawn(async move {
            match discovery::run_discovery(&shared).await {
                Ok(found) => debug!("initial discovery: {} new device(s)", found.len()),
                Err(e) => warn!("initial discovery failed: {}", e),
            }
        }));

        Ok(Active {
            sender,
            cancel,
            tasks,
        })
    }
}
