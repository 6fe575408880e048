//! Interface session - exclusive claim on the pongoOS console interface.
//!
//! A `Session` owns the claim on interface 0 for its whole lifetime. The
//! OS-level claim blocks every other client, so teardown runs on every exit
//! path: explicitly through [`Session::release`] / [`Session::close`], or
//! from `Drop` when the caller never closes it. Teardown is idempotent.

use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::protocol::{DeviceIdentity, PONGO_CONFIGURATION, PONGO_INTERFACE};
use crate::transport::UsbDevice;

pub struct Session<D: UsbDevice> {
    device: D,
    interface: u8,
    claimed: bool,
    driver_detached: bool,
    released: bool,
}

impl<D: UsbDevice> Session<D> {
    /// Validate `device` and claim its console interface.
    ///
    /// Identity is checked before any handle is opened. If the kernel driver
    /// was detached and a later step fails, the driver is reattached before
    /// the error is returned.
    #[instrument(level = "info", skip(device), fields(
        vid = %format!("{:04X}", device.vendor_id()),
        pid = %format!("{:04X}", device.product_id()),
    ))]
    pub fn acquire(mut device: D) -> Result<Self> {
        let manufacturer = device.manufacturer_string();
        let product = device.product_string();
        DeviceIdentity::PONGO.verify(
            device.vendor_id(),
            manufacturer.as_deref(),
            product.as_deref(),
        )?;

        device.open()?;
        let driver_active = device.kernel_driver_active(PONGO_INTERFACE)?;

        // From here on, dropping `session` undoes whatever has been done.
        let mut session = Self {
            device,
            interface: PONGO_INTERFACE,
            claimed: false,
            driver_detached: false,
            released: false,
        };

        if driver_active {
            session.device.detach_kernel_driver(PONGO_INTERFACE)?;
            session.driver_detached = true;
            debug!(interface = PONGO_INTERFACE, "Kernel driver detached");
        }

        // WinUSB cannot switch configurations; the OS has already selected one.
        match session.device.active_configuration() {
            Some(PONGO_CONFIGURATION) => {
                debug!(configuration = PONGO_CONFIGURATION, "Configuration already active");
            }
            _ => session.device.set_configuration(PONGO_CONFIGURATION)?,
        }
        session.device.claim_interface(PONGO_INTERFACE)?;
        session.claimed = true;

        debug!(interface = PONGO_INTERFACE, "Interface claimed");
        Ok(session)
    }

    /// The device, for issuing transfers over the claimed interface.
    pub fn channel(&self) -> &D {
        &self.device
    }

    pub fn interface(&self) -> u8 {
        self.interface
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release the interface, then reattach the kernel driver if it was
    /// detached. Runs at most once; later calls return `Ok(())`.
    ///
    /// Both steps are attempted even if the first fails; the first error
    /// is returned.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let mut first_err = None;

        if self.claimed {
            self.claimed = false;
            if let Err(e) = self.device.release_interface(self.interface) {
                warn!(interface = self.interface, error = %e, "Failed to release interface");
                first_err = first_err.or(Some(e));
            }
        }

        if self.driver_detached {
            self.driver_detached = false;
            match self.device.attach_kernel_driver(self.interface) {
                Ok(()) => debug!(interface = self.interface, "Kernel driver reattached"),
                Err(e) => {
                    warn!(interface = self.interface, error = %e, "Failed to reattach kernel driver");
                    first_err = first_err.or(Some(e));
                }
            }
        }

        debug!(interface = self.interface, "Session released");
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Release and consume the session.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }
}

impl<D: UsbDevice> Drop for Session<D> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "Teardown on drop failed");
        }
    }
}
