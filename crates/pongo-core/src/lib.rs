//! pongo-core: host-side client for the pongoOS USB console.
//!
//! pongoOS is a small pre-boot console that checkra1n boots on Apple SoCs.
//! It shows up as a USB device and takes newline-terminated text commands
//! over class control transfers on interface 0, plus raw uploads on bulk
//! endpoint 2.
//!
//! # Architecture
//!
//! - **Protocol**: identity, constants, control request vocabulary
//! - **Transport**: USB abstraction (nusb, mock)
//! - **Backend**: ordered backend resolution with a libusb prefix scan fallback
//! - **Locator**: first device matching the pongoOS signature
//! - **Session**: exclusive interface claim, kernel driver detach/reattach
//! - **Command / Upload**: the two exchanges pongoOS supports
//! - **Client**: `init` + configured exchanges
//! - **Events**: observer hook for front ends
//!
//! # Example
//!
//! ```no_run
//! use pongo_core::{Client, ClientConfig};
//!
//! let client = Client::init(ClientConfig::default()).expect("no pongoOS device");
//! if let Some(output) = client.send_command("help").expect("exchange failed") {
//!     println!("{}", output);
//! }
//! client.close().expect("release failed");
//! ```

pub mod backend;
pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod locator;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod upload;

// Re-exports for convenience
pub use backend::{
    Backend, BackendPreference, BackendResolver, LibraryScan, NativeResolver, ResolverChain,
};
pub use client::Client;
pub use command::send_command;
pub use config::ClientConfig;
pub use error::{Error, IdentityMismatch, Result};
pub use events::{NullObserver, PongoEvent, PongoObserver, TracingObserver};
pub use locator::DeviceLocator;
pub use protocol::{ControlRequest, DeviceIdentity};
pub use session::Session;
pub use transport::{
    ControlChannel, MockBus, MockDevice, NusbBus, NusbDevice, TransportError, UsbBus, UsbDevice,
};
pub use upload::send_data;
