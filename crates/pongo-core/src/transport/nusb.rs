//! nusb-based USB transport implementation.

use std::io::{self, Write};
use std::time::Duration;

use nusb::transfer::{
    Buffer, Bulk, ControlIn, ControlOut, ControlType, Out, Recipient, TransferError,
};
use nusb::{Device, DeviceInfo, Interface, MaybeFuture, list_devices};
use tracing::{debug, info, instrument};

use super::traits::{ControlChannel, TransportError, UsbBus, UsbDevice};
use crate::protocol::{ControlRequest, RequestKind, RequestRecipient};

/// Bulk OUT transfers are submitted in segments of this size.
const BULK_SEGMENT_SIZE: usize = 4096;

/// Enumerates devices through nusb's platform backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct NusbBus;

impl UsbBus for NusbBus {
    type Device = NusbDevice;

    #[instrument(level = "debug", skip(self))]
    fn devices(&self) -> Result<Vec<NusbDevice>, TransportError> {
        let devices: Vec<NusbDevice> = list_devices()
            .wait()
            .map_err(|e| TransportError::EnumerationFailed(e.to_string()))?
            .map(NusbDevice::new)
            .collect();

        debug!(count = devices.len(), "Enumerated USB devices");
        Ok(devices)
    }
}

/// nusb-based device handle.
///
/// Descriptor strings come from the OS device cache, so matching a device
/// does not open it. The handle is opened on demand and the claimed
/// interface is released by dropping it.
pub struct NusbDevice {
    info: DeviceInfo,
    device: Option<Device>,
    interface: Option<Interface>,
}

impl NusbDevice {
    pub fn new(info: DeviceInfo) -> Self {
        Self {
            info,
            device: None,
            interface: None,
        }
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn device(&self) -> Result<&Device, TransportError> {
        self.device.as_ref().ok_or(TransportError::NotOpen)
    }

    fn interface(&self) -> Result<&Interface, TransportError> {
        self.interface
            .as_ref()
            .ok_or(TransportError::NotClaimed { interface: 0 })
    }
}

fn control_type(request: &ControlRequest) -> ControlType {
    match request.kind() {
        RequestKind::Standard => ControlType::Standard,
        RequestKind::Class => ControlType::Class,
        RequestKind::Vendor | RequestKind::Reserved => ControlType::Vendor,
    }
}

fn recipient(request: &ControlRequest) -> Recipient {
    match request.recipient() {
        RequestRecipient::Device => Recipient::Device,
        RequestRecipient::Interface => Recipient::Interface,
        RequestRecipient::Endpoint => Recipient::Endpoint,
        RequestRecipient::Other | RequestRecipient::Reserved => Recipient::Other,
    }
}

fn map_transfer_error(err: TransferError, endpoint: u8, timeout: Duration) -> TransportError {
    match err {
        TransferError::Stall => TransportError::Stall { endpoint },
        TransferError::Disconnected => TransportError::Disconnected,
        // nusb cancels a blocking transfer when its timeout expires.
        TransferError::Cancelled => TransportError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        },
        other => TransportError::TransferFailed(other.to_string()),
    }
}

fn map_io_error(err: io::Error, timeout: Duration) -> TransportError {
    match err.kind() {
        io::ErrorKind::TimedOut => TransportError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        },
        _ => TransportError::TransferFailed(err.to_string()),
    }
}

impl ControlChannel for NusbDevice {
    #[instrument(level = "trace", skip(self), fields(request = %request))]
    fn control_in(
        &self,
        request: ControlRequest,
        length: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let data = self
            .interface()?
            .control_in(
                ControlIn {
                    control_type: control_type(&request),
                    recipient: recipient(&request),
                    request: request.request,
                    value: request.value,
                    index: request.index,
                    length,
                },
                timeout,
            )
            .wait()
            .map_err(|e| map_transfer_error(e, 0, timeout))?;

        debug!(bytes_read = data.len(), "Control IN complete");
        Ok(data)
    }

    #[instrument(level = "trace", skip(self, data), fields(request = %request, len = data.len()))]
    fn control_out(
        &self,
        request: ControlRequest,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        self.interface()?
            .control_out(
                ControlOut {
                    control_type: control_type(&request),
                    recipient: recipient(&request),
                    request: request.request,
                    value: request.value,
                    index: request.index,
                    data,
                },
                timeout,
            )
            .wait()
            .map_err(|e| map_transfer_error(e, 0, timeout))?;

        debug!(bytes_written = data.len(), "Control OUT complete");
        Ok(data.len())
    }

    #[instrument(level = "trace", skip(self, data), fields(endpoint = %format!("0x{:02X}", endpoint), len = data.len()))]
    fn bulk_write(
        &self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        let mut ep = self
            .interface()?
            .endpoint::<Bulk, Out>(endpoint)
            .map_err(|e| TransportError::TransferFailed(e.to_string()))?;

        if data.is_empty() {
            // The writer sends nothing for an empty payload; submit a zero-length packet.
            ep.transfer_blocking(Buffer::new(0), timeout)
                .into_result()
                .map_err(|e| map_transfer_error(e, endpoint, timeout))?;
            debug!("Bulk zero-length write complete");
            return Ok(0);
        }

        // The timeout applies to each segment, not to the whole payload.
        let mut writer = ep.writer(BULK_SEGMENT_SIZE).with_write_timeout(timeout);
        writer.write_all(data).map_err(|e| map_io_error(e, timeout))?;
        writer.flush().map_err(|e| map_io_error(e, timeout))?;

        debug!(bytes_written = data.len(), "Bulk write complete");
        Ok(data.len())
    }
}

impl UsbDevice for NusbDevice {
    fn vendor_id(&self) -> u16 {
        self.info.vendor_id()
    }

    fn product_id(&self) -> u16 {
        self.info.product_id()
    }

    fn manufacturer_string(&self) -> Option<String> {
        self.info.manufacturer_string().map(str::to_owned)
    }

    fn product_string(&self) -> Option<String> {
        self.info.product_string().map(str::to_owned)
    }

    fn open(&mut self) -> Result<(), TransportError> {
        if self.device.is_some() {
            return Ok(());
        }

        let device = self
            .info
            .open()
            .wait()
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        info!(
            vendor_id = %format!("{:04X}", self.info.vendor_id()),
            product_id = %format!("{:04X}", self.info.product_id()),
            "Device opened"
        );
        self.device = Some(device);
        Ok(())
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn kernel_driver_active(&self, interface: u8) -> Result<bool, TransportError> {
        // usbfs has no query for this; sysfs links a bound interface to its driver.
        let sysfs = self.info.sysfs_path();
        let Some(name) = sysfs.file_name().and_then(|n| n.to_str()) else {
            return Ok(false);
        };
        let driver = sysfs
            .join(format!(
                "{}:{}.{}",
                name,
                crate::protocol::PONGO_CONFIGURATION,
                interface
            ))
            .join("driver");
        Ok(driver.exists())
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    fn kernel_driver_active(&self, _interface: u8) -> Result<bool, TransportError> {
        Ok(false)
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), TransportError> {
        self.device()?
            .detach_kernel_driver(interface)
            .map_err(|e| TransportError::KernelDriver {
                interface,
                message: e.to_string(),
            })
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), TransportError> {
        Err(TransportError::KernelDriver {
            interface,
            message: "not supported on this platform".into(),
        })
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn attach_kernel_driver(&mut self, interface: u8) -> Result<(), TransportError> {
        self.device()?
            .attach_kernel_driver(interface)
            .map_err(|e| TransportError::KernelDriver {
                interface,
                message: e.to_string(),
            })
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    fn attach_kernel_driver(&mut self, interface: u8) -> Result<(), TransportError> {
        Err(TransportError::KernelDriver {
            interface,
            message: "not supported on this platform".into(),
        })
    }

    fn active_configuration(&self) -> Option<u8> {
        let device = self.device.as_ref()?;
        device
            .active_configuration()
            .ok()
            .map(|config| config.configuration_value())
    }

    fn set_configuration(&mut self, configuration: u8) -> Result<(), TransportError> {
        self.device()?
            .set_configuration(configuration)
            .wait()
            .map_err(|e| TransportError::ConfigurationFailed {
                configuration,
                message: e.to_string(),
            })
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        let claimed = self
            .device()?
            .claim_interface(interface)
            .wait()
            .map_err(|e| TransportError::ClaimInterfaceFailed {
                interface,
                message: e.to_string(),
            })?;
        self.interface = Some(claimed);
        Ok(())
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        // nusb releases the claim when the Interface is dropped.
        match self.interface.take() {
            Some(claimed) => {
                drop(claimed);
                debug!(interface, "Interface released");
                Ok(())
            }
            None => Err(TransportError::NotClaimed { interface }),
        }
    }
}
