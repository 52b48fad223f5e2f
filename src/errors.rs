use std::net::Ipv4Addr;

/// All error types that can occur when talking to PixelAir devices.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A protocol packet could not be serialized to JSON.
    #[error("failed to dump json: {0:?}")]
    JsonDump(serde_json::Error),

    /// A network socket operation failed while communicating with a device.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: std::io::Error },

    /// A received datagram could not be parsed as a protocol packet.
    ///
    /// Malformed packets are dropped and logged by the background loops;
    /// this variant only surfaces from explicit parse calls.
    #[error("malformed packet: {reason}")]
    MalformedPacket { reason: String },

    /// A command was addressed to a device not present in the registry.
    #[error("unknown device {0}")]
    UnknownDevice(Ipv4Addr),

    /// No confirming state update arrived after all retries; the optimistic
    /// local state has been reverted to the last confirmed values.
    #[error("command to {address} unconfirmed after {attempts} attempts")]
    CommandTimeout { address: Ipv4Addr, attempts: u32 },

    /// The operation requires a running client (see
    /// [`PixelAirClient::acquire`](crate::PixelAirClient::acquire)).
    #[error("client is not running")]
    NotRunning,
}

impl Error {
    /// Create a new socket error
    pub fn socket(action: &str, err: std::io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }

    /// Create a new malformed packet error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedPacket {
            reason: reason.into(),
        }
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
