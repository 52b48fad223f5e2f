//! Device records and the counter-gated update rule.

use std::net::Ipv4Addr;
use std::time::Instant;

use crate::config::DeviceFamily;
use crate::state::{Availability, LightState};

/// A known PixelAir device.
///
/// Devices are identified by their IPv4 address; if a device's address
/// changes it is treated as a new device. Records are created when a device
/// is first observed (announcement or state packet) and removed only on
/// explicit request.
#[derive(Debug, Clone)]
pub struct Device {
    pub(crate) address: Ipv4Addr,
    pub(crate) mac_address: Option<String>,
    pub(crate) model: Option<String>,
    pub(crate) nickname: Option<String>,
    pub(crate) family: DeviceFamily,
    pub(crate) state_counter: Option<u64>,
    pub(crate) light_state: LightState,
    pub(crate) availability: Availability,
    pub(crate) last_seen: Instant,
    pub(crate) missed_polls: u8,
}

/// Result of feeding a state report through the counter gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReportOutcome {
    /// Counter was not newer than the stored one; nothing changed.
    Discarded,
    /// State and counter were applied.
    Applied {
        /// The device was Offline and is Online again.
        came_online: bool,
    },
}

impl Device {
    pub(crate) fn new(address: Ipv4Addr) -> Self {
        Device {
            address,
            mac_address: None,
            model: None,
            nickname: None,
            family: DeviceFamily::Monos,
            state_counter: None,
            light_state: LightState::default(),
            availability: Availability::Online,
            last_seen: Instant::now(),
            missed_polls: 0,
        }
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn mac_address(&self) -> Option<&str> {
        self.mac_address.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    /// The device's monotonic state counter, `None` until the first
    /// accepted state report.
    pub fn state_counter(&self) -> Option<u64> {
        self.state_counter
    }

    pub fn light_state(&self) -> &LightState {
        &self.light_state
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    /// When the most recent accepted packet (announcement, push, or poll
    /// reply) arrived.
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Apply a state report if its counter is newer than the stored one.
    ///
    /// Both ingestion paths (push and poll) go through here, so the
    /// ordering rule lives in exactly one place.
    pub(crate) fn apply_report(&mut self, counter: u64, state: LightState) -> ReportOutcome {
        if self.state_counter.is_some_and(|stored| counter <= stored) {
            return ReportOutcome::Discarded;
        }

        self.state_counter = Some(counter);
        self.light_state = state;
        let came_online = self.mark_seen();
        ReportOutcome::Applied { came_online }
    }

    /// Record an accepted packet: refresh `last_seen`, reset the miss
    /// counter, and bring the device Online. Returns true on an
    /// Offline -> Online transition.
    pub(crate) fn mark_seen(&mut self) -> bool {
        self.last_seen = Instant::now();
        self.missed_polls = 0;
        let came_online = self.availability == Availability::Offline;
        self.availability = Availability::Online;
        came_online
    }

    /// Record a poll interval that produced no accepted packet. Returns
    /// true when this miss pushed an Online device Offline.
    pub(crate) fn note_missed_poll(&mut self, offline_after: u8) -> bool {
        self.missed_polls = self.missed_polls.saturating_add(1);
        if self.availability == Availability::Online && self.missed_polls >= offline_after {
            self.availability = Availability::Offline;
            return true;
        }
        false
    }
}
