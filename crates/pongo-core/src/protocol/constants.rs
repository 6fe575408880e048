//! Protocol constants for the pongoOS USB console.
//!
//! These values are the wire protocol spoken by the pongoOS firmware and
//! must match it bit-for-bit.

// ============================================================================
// Device Identification
// ============================================================================

/// Apple Inc. Vendor ID
pub const APPLE_VENDOR_ID: u16 = 0x05AC;

/// Product ID reported by pongoOS
pub const PONGO_PRODUCT_ID: u16 = 0x4141;

/// iManufacturer string reported by pongoOS
pub const PONGO_MANUFACTURER: &str = "checkra1n team";

/// iProduct string reported by pongoOS
pub const PONGO_PRODUCT: &str = "pongoOS USB Device";

// ============================================================================
// USB Topology
// ============================================================================

/// The only configuration pongoOS exposes.
pub const PONGO_CONFIGURATION: u8 = 1;

/// Interface carrying the console.
pub const PONGO_INTERFACE: u8 = 0;

/// Bulk OUT endpoint used for data uploads.
pub const BULK_OUT_ENDPOINT: u8 = 0x02;

// ============================================================================
// bmRequestType values
// ============================================================================

/// Host-to-device, class, interface
pub const REQUEST_TYPE_OUT: u8 = 0x21;

/// Device-to-host, class, interface
pub const REQUEST_TYPE_IN: u8 = 0xA1;

// ============================================================================
// bRequest values
// ============================================================================

/// Read a chunk of console output.
pub const REQ_READ_CHUNK: u8 = 1;

/// Upload setup (same request number as `REQ_READ_CHUNK`, OUT direction).
pub const REQ_UPLOAD_BEGIN: u8 = 1;

/// Poll console readiness.
pub const REQ_POLL_STATUS: u8 = 2;

/// Write a command line into the console buffer.
pub const REQ_COMMAND_LINE: u8 = 3;

/// Exchange framing: begin a command (`wValue = 1`) or end an exchange
/// (`wValue = 0xFFFF`).
pub const REQ_EXCHANGE: u8 = 4;

/// wValue for `REQ_EXCHANGE` announcing an incoming command.
pub const EXCHANGE_BEGIN: u16 = 1;

/// wValue for `REQ_EXCHANGE` closing the current exchange.
pub const EXCHANGE_END: u16 = 0xFFFF;

// ============================================================================
// Size Constants
// ============================================================================

/// Longest command line the firmware buffer accepts, in characters.
pub const MAX_COMMAND_LEN: usize = 512;

/// Largest console chunk returned by a single read.
pub const MAX_CHUNK_SIZE: u16 = 4096;

/// Length of the readiness poll response.
pub const POLL_STATUS_LEN: u16 = 1;

/// Length of the zeroed payload sent with the upload setup request.
pub const UPLOAD_BEGIN_LEN: usize = 4;

/// Line terminator appended to every command.
pub const COMMAND_TERMINATOR: char = '\n';
