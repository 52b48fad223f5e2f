//! Minimal OSC message encoding for command datagrams.
//!
//! Only the encoder subset the command set needs: an address pattern, a
//! type-tag string, and int32 / float32 / string arguments, all padded to
//! 4-byte boundaries with big-endian numbers per the OSC 1.0 spec.

/// A typed OSC argument.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum OscArg {
    Int(i32),
    Float(f32),
    Str(String),
}

impl OscArg {
    fn type_tag(&self) -> char {
        match self {
            OscArg::Int(_) => 'i',
            OscArg::Float(_) => 'f',
            OscArg::Str(_) => 's',
        }
    }
}

/// An OSC message: address pattern plus typed argument list.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OscMessage {
    address: String,
    args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>) -> Self {
        OscMessage {
            address: address.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: OscArg) -> Self {
        self.args.push(arg);
        self
    }

    /// Encode to a wire datagram.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        write_padded_str(&mut out, &self.address);

        let mut tags = String::with_capacity(1 + self.args.len());
        tags.push(',');
        for arg in &self.args {
            tags.push(arg.type_tag());
        }
        write_padded_str(&mut out, &tags);

        for arg in &self.args {
            match arg {
                OscArg::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
                OscArg::Float(v) => out.extend_from_slice(&v.to_be_bytes()),
                OscArg::Str(v) => write_padded_str(&mut out, v),
            }
        }
        out
    }
}

/// OSC strings are NUL-terminated and padded to a multiple of 4 bytes.
fn write_padded_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    let pad = 4 - (s.len() % 4);
    out.extend(std::iter::repeat_n(0u8, pad));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_only() {
        let bytes = OscMessage::new("/on").encode();
        // "/on\0" + ",\0\0\0"
        assert_eq!(bytes, b"/on\0,\0\0\0");
    }

    #[test]
    fn test_padding_always_terminates() {
        // Length already a multiple of 4 still gets a full pad word
        let bytes = OscMessage::new("/osc").encode();
        assert_eq!(&bytes[..8], b"/osc\0\0\0\0");
    }

    #[test]
    fn test_int_argument() {
        let bytes = OscMessage::new("/brightness")
            .arg(OscArg::Int(200))
            .encode();
        assert_eq!(&bytes[..12], b"/brightness\0");
        assert_eq!(&bytes[12..16], b",i\0\0");
        assert_eq!(&bytes[16..20], &200i32.to_be_bytes());
    }

    #[test]
    fn test_mixed_arguments() {
        let bytes = OscMessage::new("/color")
            .arg(OscArg::Float(0.5))
            .arg(OscArg::Float(1.0))
            .encode();
        assert_eq!(&bytes[..8], b"/color\0\0");
        assert_eq!(&bytes[8..12], b",ff\0");
        assert_eq!(&bytes[12..16], &0.5f32.to_be_bytes());
        assert_eq!(&bytes[16..20], &1.0f32.to_be_bytes());
    }

    #[test]
    fn test_string_argument() {
        let bytes = OscMessage::new("/effect")
            .arg(OscArg::Str("scene:3".to_string()))
            .encode();
        assert_eq!(&bytes[..8], b"/effect\0");
        assert_eq!(&bytes[8..12], b",s\0\0");
        assert_eq!(&bytes[12..20], b"scene:3\0");
    }
}
