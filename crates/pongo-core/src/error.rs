//! Error taxonomy for the pongoOS client.

use std::path::PathBuf;

use thiserror::Error;

use crate::transport::TransportError;

/// Errors raised by the protocol core.
#[derive(Error, Debug)]
pub enum Error {
    #[error("No USB backend available (searched: {})", display_paths(.searched))]
    NoBackendAvailable { searched: Vec<PathBuf> },

    #[error("No pongoOS USB device found: VID={vendor_id:04X} PID={product_id:04X}")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error(transparent)]
    IdentityMismatch(#[from] IdentityMismatch),

    #[error("Command must be at most {max} characters long (got {length})")]
    InvalidCommand { length: usize, max: usize },

    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a device was refused before its interface was claimed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityMismatch {
    #[error("Device must be an Apple device (VID={vendor_id:04X})")]
    NotApple { vendor_id: u16 },

    #[error(
        "Device must be booted into pongoOS (manufacturer={manufacturer:?}, product={product:?})"
    )]
    NotPongo {
        manufacturer: Option<String>,
        product: Option<String>,
    },
}

/// Shorthand for a Result with the crate's own Error type.
pub type Result<T> = std::result::Result<T, Error>;

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".into();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_backend_lists_search_paths() {
        let err = Error::NoBackendAvailable {
            searched: vec![PathBuf::from("/usr/local/lib"), PathBuf::from("/usr/lib")],
        };
        assert_eq!(
            err.to_string(),
            "No USB backend available (searched: /usr/local/lib, /usr/lib)"
        );
    }

    #[test]
    fn test_device_not_found_formats_ids() {
        let err = Error::DeviceNotFound {
            vendor_id: 0x05AC,
            product_id: 0x4141,
        };
        assert_eq!(
            err.to_string(),
            "No pongoOS USB device found: VID=05AC PID=4141"
        );
    }

    #[test]
    fn test_transport_error_converts() {
        let err: Error = TransportError::Disconnected.into();
        assert!(matches!(err, Error::Transfer(TransportError::Disconnected)));
    }
}
