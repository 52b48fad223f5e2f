//! In-memory device registry keyed by network address.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::config::DeviceFamily;
use crate::device::Device;

/// Descriptive fields merged into a device record by
/// [`DeviceRegistry::upsert`]. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct DevicePatch {
    pub mac_address: Option<String>,
    pub model: Option<String>,
    pub nickname: Option<String>,
}

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// A new record was created for this address.
    pub created: bool,
    /// The device was Offline and came back Online.
    pub came_online: bool,
}

/// The table of known devices.
///
/// A pure data structure: locking and notification dispatch are the
/// caller's concern. There is never more than one record per address;
/// upserting an existing address mutates it in place.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<Ipv4Addr, Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge descriptive fields into the record for `address`, creating it
    /// if this is the first observation. Counts as an accepted packet:
    /// `last_seen` is refreshed and the device is brought Online.
    pub fn upsert(&mut self, address: Ipv4Addr, patch: DevicePatch) -> UpsertOutcome {
        let mut created = false;
        let device = self.devices.entry(address).or_insert_with(|| {
            created = true;
            Device::new(address)
        });

        if let Some(mac) = patch.mac_address {
            device.mac_address = Some(mac);
        }
        if let Some(model) = patch.model {
            device.family = DeviceFamily::from_model(&model);
            device.model = Some(model);
        }
        if let Some(nickname) = patch.nickname {
            device.nickname = Some(nickname);
        }
        let came_online = device.mark_seen();

        UpsertOutcome {
            created,
            came_online,
        }
    }

    pub fn get(&self, address: Ipv4Addr) -> Option<&Device> {
        self.devices.get(&address)
    }

    pub(crate) fn get_mut(&mut self, address: Ipv4Addr) -> Option<&mut Device> {
        self.devices.get_mut(&address)
    }

    pub(crate) fn get_or_create(&mut self, address: Ipv4Addr) -> &mut Device {
        self.devices
            .entry(address)
            .or_insert_with(|| Device::new(address))
    }

    pub fn contains(&self, address: Ipv4Addr) -> bool {
        self.devices.contains_key(&address)
    }

    /// Snapshot of all known devices. The returned `Vec` is decoupled from
    /// the registry and can be iterated any number of times.
    pub fn list(&self) -> Vec<Device> {
        self.devices.values().cloned().collect()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.devices.values_mut()
    }

    /// Remove the record for `address`. A no-op for unknown addresses.
    pub fn remove(&mut self, address: Ipv4Addr) {
        self.devices.remove(&address);
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
