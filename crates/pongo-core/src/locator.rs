//! Device discovery.

use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::protocol::DeviceIdentity;
use crate::transport::{UsbBus, UsbDevice};

/// Finds the first device on a bus matching an identity.
pub struct DeviceLocator<B: UsbBus> {
    bus: B,
    identity: DeviceIdentity,
}

impl<B: UsbBus> DeviceLocator<B> {
    /// Locator for the pongoOS signature.
    pub fn new(bus: B) -> Self {
        Self::with_identity(bus, DeviceIdentity::PONGO)
    }

    pub fn with_identity(bus: B, identity: DeviceIdentity) -> Self {
        Self { bus, identity }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Return the first matching device in enumeration order.
    ///
    /// Nothing is claimed here; the caller hands the device to a `Session`.
    #[instrument(level = "info", skip(self), fields(identity = %self.identity))]
    pub fn find(&self) -> Result<B::Device> {
        for device in self.bus.devices()? {
            let manufacturer = device.manufacturer_string();
            let product = device.product_string();

            if self.identity.matches(
                device.vendor_id(),
                device.product_id(),
                manufacturer.as_deref(),
                product.as_deref(),
            ) {
                info!(
                    vendor_id = %format!("{:04X}", device.vendor_id()),
                    product_id = %format!("{:04X}", device.product_id()),
                    "Found pongoOS device"
                );
                return Ok(device);
            }
        }

        debug!("No suitable device found");
        Err(Error::DeviceNotFound {
            vendor_id: self.identity.vendor_id,
            product_id: self.identity.product_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockBus, MockCall, MockDevice};

    #[test]
    fn test_empty_bus() {
        let locator = DeviceLocator::new(MockBus::default());
        assert!(matches!(
            locator.find(),
            Err(Error::DeviceNotFound {
                vendor_id: 0x05AC,
                product_id: 0x4141
            })
        ));
    }

    #[test]
    fn test_skips_non_matching_devices() {
        let dfu = MockDevice::new()
            .with_ids(0x05AC, 0x1227)
            .with_strings(Some("Apple Inc."), Some("Apple Mobile Device (DFU Mode)"));
        let hub = MockDevice::new()
            .with_ids(0x1D6B, 0x0002)
            .with_strings(None, None);
        let pongo = MockDevice::new();

        let locator = DeviceLocator::new(MockBus::new(vec![dfu, hub, pongo]));
        let found = locator.find().unwrap();
        assert_eq!(found.vendor_id(), 0x05AC);
        assert_eq!(found.product_id(), 0x4141);
    }

    #[test]
    fn test_first_match_wins() {
        let first = MockDevice::new();
        let second = MockDevice::new();
        let locator = DeviceLocator::new(MockBus::new(vec![first.clone(), second.clone()]));

        let mut found = locator.find().unwrap();
        found.open().unwrap();

        // Only the first device's shared state sees the call.
        assert_eq!(first.calls(), vec![MockCall::Open]);
        assert!(second.calls().is_empty());
    }

    #[test]
    fn test_find_does_not_claim() {
        let pongo = MockDevice::new();
        let locator = DeviceLocator::new(MockBus::new(vec![pongo.clone()]));
        locator.find().unwrap();
        assert!(pongo.calls().is_empty());
    }

    #[test]
    fn test_missing_strings_do_not_match() {
        let anonymous = MockDevice::new().with_strings(None, Some("pongoOS USB Device"));
        let locator = DeviceLocator::new(MockBus::new(vec![anonymous]));
        assert!(matches!(locator.find(), Err(Error::DeviceNotFound { .. })));
    }
}
