//! USB Transport layer abstraction.
//!
//! Splits USB access into three seams so the protocol can run against
//! nusb in production and against a mock in tests:
//! - `UsbBus`: enumeration
//! - `UsbDevice`: descriptor queries and interface lifecycle
//! - `ControlChannel`: raw transfers over the claimed interface

use std::time::Duration;

use thiserror::Error;

use crate::protocol::ControlRequest;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to enumerate devices: {0}")]
    EnumerationFailed(String),

    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    #[error("Device is not open")]
    NotOpen,

    #[error("Failed to set configuration {configuration}: {message}")]
    ConfigurationFailed { configuration: u8, message: String },

    #[error("Failed to claim interface {interface}: {message}")]
    ClaimInterfaceFailed { interface: u8, message: String },

    #[error("Interface {interface} is not claimed")]
    NotClaimed { interface: u8 },

    #[error("Kernel driver on interface {interface}: {message}")]
    KernelDriver { interface: u8, message: String },

    #[error("Endpoint 0x{endpoint:02X} stalled")]
    Stall { endpoint: u8 },

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Raw transfers over a claimed interface.
///
/// Implementations carry no protocol logic and report USB errors as-is.
pub trait ControlChannel {
    /// Control transfer with an IN data stage of at most `length` bytes.
    fn control_in(
        &self,
        request: ControlRequest,
        length: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;

    /// Control transfer with an OUT data stage. Returns the bytes sent.
    fn control_out(
        &self,
        request: ControlRequest,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;

    /// Write raw bytes to a bulk OUT endpoint.
    fn bulk_write(
        &self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;
}

/// A USB device that can be validated and have an interface claimed.
pub trait UsbDevice: ControlChannel {
    fn vendor_id(&self) -> u16;

    fn product_id(&self) -> u16;

    /// iManufacturer string, if the device reported one.
    fn manufacturer_string(&self) -> Option<String>;

    /// iProduct string, if the device reported one.
    fn product_string(&self) -> Option<String>;

    /// Open a handle to the device. Opening an open device is a no-op.
    fn open(&mut self) -> Result<(), TransportError>;

    /// Whether an OS driver is currently bound to `interface`.
    fn kernel_driver_active(&self, interface: u8) -> Result<bool, TransportError>;

    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), TransportError>;

    fn attach_kernel_driver(&mut self, interface: u8) -> Result<(), TransportError>;

    /// bConfigurationValue of the active configuration, `None` when the
    /// device is unconfigured or not open.
    fn active_configuration(&self) -> Option<u8>;

    fn set_configuration(&mut self, configuration: u8) -> Result<(), TransportError>;

    fn claim_interface(&mut self, interface: u8) -> Result<(), TransportError>;

    fn release_interface(&mut self, interface: u8) -> Result<(), TransportError>;
}

/// Source of candidate devices, in the backend's enumeration order.
pub trait UsbBus {
    type Device: UsbDevice;

    fn devices(&self) -> Result<Vec<Self::Device>, TransportError>;
}
