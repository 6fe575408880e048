//! Transport layer module.

pub mod mock;
pub mod nusb;
pub mod traits;

pub use mock::{MockBus, MockCall, MockDevice};
pub use nusb::{NusbBus, NusbDevice};
pub use traits::{ControlChannel, TransportError, UsbBus, UsbDevice};
