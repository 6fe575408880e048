//! Protocol module - pongoOS USB console definitions.

pub mod constants;
pub mod identity;
pub mod request;

pub use constants::*;
pub use identity::DeviceIdentity;
pub use request::{ControlRequest, Direction, RequestKind, RequestRecipient, decode_chunk};
