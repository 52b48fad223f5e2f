//! # pixelair_rs
//!
//! An async Rust library for discovering and controlling PixelAir smart
//! lights (Fluora, Monos) over UDP.
//!
//! The crate maintains a live, deduplicated registry of the devices on
//! your local network: a broadcast discovery pass seeds it, unsolicited
//! state packets keep it current, and a periodic poll loop fills the gaps
//! and drives Online/Offline detection. Control commands are OSC-encoded
//! datagrams with optimistic local updates and bounded confirm/retry.
//!
//! ## Quick Start
//!
//! ```ignore
//! use pixelair_rs::{Brightness, ClientConfig, Command, PixelAirClient};
//!
//! async fn dim_everything() -> Result<(), pixelair_rs::Error> {
//!     let client = PixelAirClient::new(ClientConfig::default());
//!
//!     // The first acquisition opens the sockets and scans the network
//!     client.acquire().await?;
//!
//!     for device in client.devices() {
//!         client
//!             .command(device.address(), Command::SetBrightness(Brightness::new(64)))
//!             .await?;
//!     }
//!
//!     // The last release tears everything down again
//!     client.release().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Communication
//!
//! Everything runs over UDP. Port assignment differs between device
//! families (Fluora devices use the 48899/48900 scheme, Monos devices
//! listen on 12345 and take commands on 6767), so ports are configured
//! per family via [`PortProfile`] rather than hardcoded.
//!
//! ## Concurrency
//!
//! [`PixelAirClient`] is the single sanctioned owner of all sockets for a
//! device fleet: create one per process, share it, and have each consumer
//! `acquire()`/`release()` it independently. State updates are ordered per
//! device by the device's own monotonic state counter, so out-of-order and
//! duplicate network delivery are harmless.

mod client;
mod command;
mod config;
mod device;
mod discovery;
mod errors;
mod notify;
mod osc;
mod protocol;
mod registry;
mod state;
mod sync;
mod types;

// Re-export public API
pub use client::{Lifecycle, PixelAirClient};
pub use command::Command;
pub use config::{ClientConfig, DeviceFamily, PortProfile};
pub use device::Device;
pub use errors::Error;
pub use notify::{ChangeEvent, ChangeKind, Subscription};
pub use registry::{DevicePatch, DeviceRegistry, UpsertOutcome};
pub use state::{Availability, LightState};
pub use types::{Brightness, Effect, EffectMode, HueSaturation, Power};
