//! Control request vocabulary.
//!
//! pongoOS is driven entirely through class requests addressed to
//! interface 0. Each request is kept as its raw setup fields so what goes
//! on the wire is exactly what is written here; the direction, type and
//! recipient are decoded from `bmRequestType` only when a backend needs them.

use std::fmt;

use super::constants::*;

/// Data stage direction, bit 7 of `bmRequestType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to device.
    Out,
    /// Device to host.
    In,
}

/// Request type, bits 5..6 of `bmRequestType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Standard,
    Class,
    Vendor,
    Reserved,
}

/// Request recipient, bits 0..4 of `bmRequestType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestRecipient {
    Device,
    Interface,
    Endpoint,
    Other,
    Reserved,
}

/// Setup fields of a control transfer, minus the data stage.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ControlRequest {
    /// Raw `bmRequestType`.
    pub request_type: u8,
    /// `bRequest`.
    pub request: u8,
    /// `wValue`.
    pub value: u16,
    /// `wIndex`.
    pub index: u16,
}

impl ControlRequest {
    /// Announce an incoming command line.
    pub const COMMAND_BEGIN: Self = Self::new(REQUEST_TYPE_OUT, REQ_EXCHANGE, EXCHANGE_BEGIN, 0);

    /// Carry the command text (data stage holds the line).
    pub const COMMAND_LINE: Self = Self::new(REQUEST_TYPE_OUT, REQ_COMMAND_LINE, 0, 0);

    /// Poll console readiness (1 byte IN).
    pub const POLL_STATUS: Self = Self::new(REQUEST_TYPE_IN, REQ_POLL_STATUS, 0, 0);

    /// Read up to `MAX_CHUNK_SIZE` bytes of console output.
    pub const READ_CHUNK: Self = Self::new(REQUEST_TYPE_IN, REQ_READ_CHUNK, 0, 0);

    /// Close the current exchange.
    pub const EXCHANGE_END: Self = Self::new(REQUEST_TYPE_OUT, REQ_EXCHANGE, EXCHANGE_END, 0);

    /// Prepare the device for a bulk upload.
    ///
    /// This request is known to be able to destabilise a running pongoOS
    /// session. It is still part of the upload sequence the firmware expects.
    pub const UPLOAD_BEGIN: Self = Self::new(REQUEST_TYPE_OUT, REQ_UPLOAD_BEGIN, 0, 0);

    pub const fn new(request_type: u8, request: u8, value: u16, index: u16) -> Self {
        Self {
            request_type,
            request,
            value,
            index,
        }
    }

    pub fn direction(&self) -> Direction {
        if self.request_type & 0x80 != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }

    pub fn kind(&self) -> RequestKind {
        match (self.request_type >> 5) & 0x03 {
            0 => RequestKind::Standard,
            1 => RequestKind::Class,
            2 => RequestKind::Vendor,
            _ => RequestKind::Reserved,
        }
    }

    pub fn recipient(&self) -> RequestRecipient {
        match self.request_type & 0x1F {
            0 => RequestRecipient::Device,
            1 => RequestRecipient::Interface,
            2 => RequestRecipient::Endpoint,
            3 => RequestRecipient::Other,
            _ => RequestRecipient::Reserved,
        }
    }
}

impl fmt::Debug for ControlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ControlRequest(0x{:02X}, {}, 0x{:04X}, {})",
            self.request_type, self.request, self.value, self.index
        )
    }
}

impl fmt::Display for ControlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Decode console output.
///
/// The firmware emits single-byte character codes, so every byte maps to the
/// code point of the same value (Latin-1). Bytes >= 0x80 are never rejected.
pub fn decode_chunk(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_request_type_decodes() {
        let req = ControlRequest::COMMAND_BEGIN;
        assert_eq!(req.direction(), Direction::Out);
        assert_eq!(req.kind(), RequestKind::Class);
        assert_eq!(req.recipient(), RequestRecipient::Interface);
    }

    #[test]
    fn test_in_request_type_decodes() {
        let req = ControlRequest::READ_CHUNK;
        assert_eq!(req.direction(), Direction::In);
        assert_eq!(req.kind(), RequestKind::Class);
        assert_eq!(req.recipient(), RequestRecipient::Interface);
    }

    #[test]
    fn test_wire_constants() {
        assert_eq!(ControlRequest::COMMAND_BEGIN, ControlRequest::new(0x21, 4, 1, 0));
        assert_eq!(ControlRequest::COMMAND_LINE, ControlRequest::new(0x21, 3, 0, 0));
        assert_eq!(ControlRequest::POLL_STATUS, ControlRequest::new(0xA1, 2, 0, 0));
        assert_eq!(ControlRequest::READ_CHUNK, ControlRequest::new(0xA1, 1, 0, 0));
        assert_eq!(ControlRequest::EXCHANGE_END, ControlRequest::new(0x21, 4, 0xFFFF, 0));
        assert_eq!(ControlRequest::UPLOAD_BEGIN, ControlRequest::new(0x21, 1, 0, 0));
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(
            format!("{:?}", ControlRequest::EXCHANGE_END),
            "ControlRequest(0x21, 4, 0xFFFF, 0)"
        );
    }

    #[test]
    fn test_decode_chunk_latin1() {
        assert_eq!(decode_chunk(b"pongoOS"), "pongoOS");
        assert_eq!(decode_chunk(&[0x41, 0xE9, 0xFF]), "A\u{e9}\u{ff}");
        assert_eq!(decode_chunk(&[]), "");
    }
}
