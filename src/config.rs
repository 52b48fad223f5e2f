//! Client configuration: device families, port profiles, and timing knobs.
//!
//! Port assignment differs between PixelAir device families and the two
//! documented schemes are not compatible, so ports are carried as a
//! per-family [`PortProfile`] rather than hardcoded constants.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// PixelAir device family.
///
/// The family is derived from the model string a device announces and
/// selects which [`PortProfile`] its commands and state queries use.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFamily {
    /// Fluora plant lights
    Fluora,
    /// Monos panels and other PixelAir devices
    Monos,
}

impl DeviceFamily {
    /// Detect the family from an announced model string
    /// (e.g. `"Fluora Mini"`, `"Monos 16"`).
    ///
    /// Unrecognized models fall back to [`DeviceFamily::Monos`], whose
    /// command port matches the generic PixelAir scheme.
    ///
    /// # Examples
    ///
    /// ```
    /// use pixelair_rs::DeviceFamily;
    ///
    /// assert_eq!(DeviceFamily::from_model("Fluora Mini"), DeviceFamily::Fluora);
    /// assert_eq!(DeviceFamily::from_model("Monos 16"), DeviceFamily::Monos);
    /// assert_eq!(DeviceFamily::from_model("PixelAir Proto"), DeviceFamily::Monos);
    /// ```
    pub fn from_model(model: &str) -> Self {
        let model = model.to_ascii_lowercase();
        if model.contains("fluora") {
            DeviceFamily::Fluora
        } else {
            DeviceFamily::Monos
        }
    }
}

/// UDP port assignment for one device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortProfile {
    /// Family this profile applies to.
    pub family: DeviceFamily,
    /// Port discovery requests are broadcast to.
    pub discovery_port: u16,
    /// Port the client listens on for announcements, push packets, and
    /// poll replies.
    pub state_port: u16,
    /// Port control commands are sent to.
    pub command_port: u16,
}

impl PortProfile {
    /// The Fluora scheme: broadcast on 48899, state and commands on 48900.
    pub fn fluora() -> Self {
        PortProfile {
            family: DeviceFamily::Fluora,
            discovery_port: 48899,
            state_port: 48900,
            command_port: 48900,
        }
    }

    /// The Monos/PixelAir scheme: discovery and state on 12345,
    /// commands on 6767.
    pub fn monos() -> Self {
        PortProfile {
            family: DeviceFamily::Monos,
            discovery_port: 12345,
            state_port: 12345,
            command_port: 6767,
        }
    }
}

/// Configuration for a [`PixelAirClient`](crate::PixelAirClient).
///
/// The defaults match the documented device behavior; tests and unusual
/// network setups can override any knob with the `with_*` methods.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use pixelair_rs::{ClientConfig, PortProfile};
///
/// let config = ClientConfig::new()
///     .with_profiles(vec![PortProfile::monos()])
///     .with_poll_interval(Duration::from_secs(10));
/// assert_eq!(config.profiles().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    profiles: Vec<PortProfile>,
    poll_interval: Duration,
    discovery_window: Duration,
    offline_after_misses: u8,
    confirm_commands: bool,
    confirm_timeout: Duration,
    max_command_attempts: u32,
    teardown_deadline: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            profiles: vec![PortProfile::fluora(), PortProfile::monos()],
            poll_interval: Duration::from_secs(30),
            discovery_window: Duration::from_secs(10),
            offline_after_misses: 3,
            confirm_commands: true,
            confirm_timeout: Duration::from_secs(1),
            max_command_attempts: 3,
            teardown_deadline: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the set of active port profiles. An empty set is ignored;
    /// the client always has at least one profile to fall back on.
    pub fn with_profiles(mut self, profiles: Vec<PortProfile>) -> Self {
        if !profiles.is_empty() {
            self.profiles = profiles;
        }
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_discovery_window(mut self, window: Duration) -> Self {
        self.discovery_window = window;
        self
    }

    /// Consecutive missed poll intervals before a device goes Offline.
    pub fn with_offline_after_misses(mut self, misses: u8) -> Self {
        self.offline_after_misses = misses;
        self
    }

    /// Disable the confirm/retry loop; commands become fire-and-forget.
    pub fn with_confirm_commands(mut self, confirm: bool) -> Self {
        self.confirm_commands = confirm;
        self
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    /// Commands are always attempted at least once; zero is treated as one.
    pub fn with_max_command_attempts(mut self, attempts: u32) -> Self {
        self.max_command_attempts = attempts.max(1);
        self
    }

    pub fn with_teardown_deadline(mut self, deadline: Duration) -> Self {
        self.teardown_deadline = deadline;
        self
    }

    pub fn profiles(&self) -> &[PortProfile] {
        &self.profiles
    }

    /// The profile for a family, falling back to the first configured
    /// profile when the family has none.
    pub fn profile_for(&self, family: DeviceFamily) -> &PortProfile {
        self.profiles
            .iter()
            .find(|p| p.family == family)
            .unwrap_or(&self.profiles[0])
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn discovery_window(&self) -> Duration {
        self.discovery_window
    }

    pub fn offline_after_misses(&self) -> u8 {
        self.offline_after_misses
    }

    pub fn confirm_commands(&self) -> bool {
        self.confirm_commands
    }

    pub fn confirm_timeout(&self) -> Duration {
        self.confirm_timeout
    }

    pub fn max_command_attempts(&self) -> u32 {
        self.max_command_attempts
    }

    pub fn teardown_deadline(&self) -> Duration {
        self.teardown_deadline
    }
}
