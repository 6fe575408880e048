//! Device identity matching.
//!
//! pongoOS identifies itself through its vendor/product IDs and its
//! manufacturer/product string descriptors. All four must match before a
//! device is used.

use std::fmt;

use super::constants::*;
use crate::error::IdentityMismatch;

/// Descriptor signature a device must present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: &'static str,
    pub product: &'static str,
}

impl DeviceIdentity {
    /// The signature of a device booted into pongoOS.
    pub const PONGO: Self = Self {
        vendor_id: APPLE_VENDOR_ID,
        product_id: PONGO_PRODUCT_ID,
        manufacturer: PONGO_MANUFACTURER,
        product: PONGO_PRODUCT,
    };

    /// Full four-field match used during enumeration.
    ///
    /// Unreadable string descriptors never match.
    pub fn matches(
        &self,
        vendor_id: u16,
        product_id: u16,
        manufacturer: Option<&str>,
        product: Option<&str>,
    ) -> bool {
        vendor_id == self.vendor_id
            && product_id == self.product_id
            && manufacturer == Some(self.manufacturer)
            && product == Some(self.product)
    }

    /// Check performed before a session touches interface state.
    ///
    /// The vendor is checked first, then the descriptor strings.
    pub fn verify(
        &self,
        vendor_id: u16,
        manufacturer: Option<&str>,
        product: Option<&str>,
    ) -> Result<(), IdentityMismatch> {
        if vendor_id != self.vendor_id {
            return Err(IdentityMismatch::NotApple { vendor_id });
        }

        if product != Some(self.product) || manufacturer != Some(self.manufacturer) {
            return Err(IdentityMismatch::NotPongo {
                manufacturer: manufacturer.map(str::to_owned),
                product: product.map(str::to_owned),
            });
        }

        Ok(())
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::PONGO
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04X}:{:04X} \"{}\" / \"{}\"",
            self.vendor_id, self.product_id, self.manufacturer, self.product
        )
    }
}
