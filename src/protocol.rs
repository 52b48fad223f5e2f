//! JSON wire packets for discovery and state reporting.
//!
//! Every datagram is a JSON object with a `method` tag and optional
//! `params`. Control commands do not live here; they are OSC-encoded (see
//! [`crate::osc`]).

use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::state::LightState;
use crate::types::{Effect, HueSaturation};

type Result<T> = std::result::Result<T, Error>;

/// A protocol datagram, either direction.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub(crate) enum Packet {
    /// Broadcast discovery request.
    Discover,
    /// Announcement reply a device sends identifying itself.
    Announce(Announcement),
    /// State query sent to a device (poll path).
    GetState,
    /// Unsolicited push packet or poll reply carrying full device state.
    StateReport(StateReport),
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub(crate) struct Announcement {
    pub mac: String,
    pub model: String,
    pub nickname: Option<String>,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub(crate) struct StateReport {
    pub counter: u64,
    pub power: bool,
    pub brightness: u8,
    pub hue: u16,
    pub saturation: u8,
    pub effect: Option<String>,
}

impl StateReport {
    /// Convert the wire fields into a [`LightState`].
    ///
    /// Out-of-range color values are clamped and unrecognized effect ids
    /// are treated as no effect; a report should never be rejected over a
    /// single bad field.
    pub fn light_state(&self) -> LightState {
        LightState {
            power: self.power.into(),
            brightness: self.brightness.into(),
            color: HueSaturation::create_or(self.hue, self.saturation),
            effect: self.effect.as_deref().and_then(Effect::parse),
        }
    }
}

pub(crate) fn encode_packet(packet: &Packet) -> Result<Vec<u8>> {
    serde_json::to_vec(packet).map_err(Error::JsonDump)
}

pub(crate) fn parse_packet(data: &[u8]) -> Result<Packet> {
    serde_json::from_slice(data).map_err(|e| Error::malformed(e.to_string()))
}
