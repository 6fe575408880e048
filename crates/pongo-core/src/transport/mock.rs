//! Mock USB transport for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::{ControlChannel, TransportError, UsbBus, UsbDevice};
use crate::protocol::{
    APPLE_VENDOR_ID, ControlRequest, PONGO_MANUFACTURER, PONGO_PRODUCT, PONGO_PRODUCT_ID,
};

/// One call made against a `MockDevice`, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Open,
    DetachKernelDriver(u8),
    AttachKernelDriver(u8),
    SetConfiguration(u8),
    ClaimInterface(u8),
    ReleaseInterface(u8),
    ControlIn {
        request: ControlRequest,
        length: u16,
    },
    ControlOut {
        request: ControlRequest,
        data: Vec<u8>,
    },
    BulkWrite {
        endpoint: u8,
        data: Vec<u8>,
    },
}

#[derive(Default)]
struct MockState {
    calls: Vec<MockCall>,
    chunks: VecDeque<Result<Vec<u8>, TransportError>>,
    kernel_driver_bound: bool,
    open: bool,
    claimed: bool,
    active_configuration: Option<u8>,
    fail_set_configuration: bool,
    fail_claim: bool,
    fail_control_out: Option<ControlRequest>,
    fail_bulk: bool,
}

/// Mock device for unit testing the session and exchange logic.
///
/// Clones share state, so a test can keep a handle for inspection after
/// the device has been moved into a session.
#[derive(Clone)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
    /// Simulated descriptors.
    vid: u16,
    pid: u16,
    manufacturer: Option<String>,
    product: Option<String>,
}

impl MockDevice {
    /// A device presenting the pongoOS signature.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            vid: APPLE_VENDOR_ID,
            pid: PONGO_PRODUCT_ID,
            manufacturer: Some(PONGO_MANUFACTURER.to_string()),
            product: Some(PONGO_PRODUCT.to_string()),
        }
    }

    /// Set VID/PID.
    pub fn with_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = vid;
        self.pid = pid;
        self
    }

    /// Set the descriptor strings.
    pub fn with_strings(mut self, manufacturer: Option<&str>, product: Option<&str>) -> Self {
        self.manufacturer = manufacturer.map(str::to_owned);
        self.product = product.map(str::to_owned);
        self
    }

    /// Simulate an OS driver bound to the console interface.
    pub fn with_kernel_driver(self) -> Self {
        self.state.lock().unwrap().kernel_driver_bound = true;
        self
    }

    /// Start out with `configuration` already active.
    pub fn with_active_configuration(self, configuration: u8) -> Self {
        self.state.lock().unwrap().active_configuration = Some(configuration);
        self
    }

    /// Make `set_configuration` fail the way WinUSB does.
    pub fn fail_set_configuration(&self) {
        self.state.lock().unwrap().fail_set_configuration = true;
    }

    /// Make `claim_interface` fail.
    pub fn fail_claim(&self) {
        self.state.lock().unwrap().fail_claim = true;
    }

    /// Make every OUT control transfer matching `request` stall.
    pub fn fail_control_out(&self, request: ControlRequest) {
        self.state.lock().unwrap().fail_control_out = Some(request);
    }

    /// Make bulk writes fail.
    pub fn fail_bulk(&self) {
        self.state.lock().unwrap().fail_bulk = true;
    }

    /// Queue a console chunk for the next chunk read.
    pub fn queue_chunk(&self, bytes: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .chunks
            .push_back(Ok(bytes.to_vec()));
    }

    /// Queue an error for the next chunk read.
    pub fn queue_chunk_error(&self, error: TransportError) {
        self.state.lock().unwrap().chunks.push_back(Err(error));
    }

    /// Get all captured calls.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of captured calls equal to `call`.
    pub fn count(&self, call: &MockCall) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| *c == call)
            .count()
    }

    /// Captured control OUT requests, without their data.
    pub fn control_out_requests(&self) -> Vec<ControlRequest> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::ControlOut { request, .. } => Some(*request),
                _ => None,
            })
            .collect()
    }

    /// Whether the interface is currently claimed.
    pub fn is_claimed(&self) -> bool {
        self.state.lock().unwrap().claimed
    }

    /// Whether an OS driver is currently bound.
    pub fn kernel_driver_bound(&self) -> bool {
        self.state.lock().unwrap().kernel_driver_bound
    }

    fn record(&self, call: MockCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlChannel for MockDevice {
    fn control_in(
        &self,
        request: ControlRequest,
        length: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        self.record(MockCall::ControlIn { request, length });
        let mut state = self.state.lock().unwrap();
        if !state.claimed {
            return Err(TransportError::NotClaimed { interface: 0 });
        }
        if request == ControlRequest::READ_CHUNK {
            return state.chunks.pop_front().unwrap_or(Err(TransportError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }));
        }
        // Readiness poll and anything else: answer with a single ready byte.
        Ok(vec![1; length.min(1) as usize])
    }

    fn control_out(
        &self,
        request: ControlRequest,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        self.record(MockCall::ControlOut {
            request,
            data: data.to_vec(),
        });
        let state = self.state.lock().unwrap();
        if !state.claimed {
            return Err(TransportError::NotClaimed { interface: 0 });
        }
        if state.fail_control_out == Some(request) {
            return Err(TransportError::Stall { endpoint: 0 });
        }
        Ok(data.len())
    }

    fn bulk_write(
        &self,
        endpoint: u8,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        self.record(MockCall::BulkWrite {
            endpoint,
            data: data.to_vec(),
        });
        let state = self.state.lock().unwrap();
        if !state.claimed {
            return Err(TransportError::NotClaimed { interface: 0 });
        }
        if state.fail_bulk {
            return Err(TransportError::Disconnected);
        }
        Ok(data.len())
    }
}

impl UsbDevice for MockDevice {
    fn vendor_id(&self) -> u16 {
        self.vid
    }

    fn product_id(&self) -> u16 {
        self.pid
    }

    fn manufacturer_string(&self) -> Option<String> {
        self.manufacturer.clone()
    }

    fn product_string(&self) -> Option<String> {
        self.product.clone()
    }

    fn open(&mut self) -> Result<(), TransportError> {
        self.record(MockCall::Open);
        self.state.lock().unwrap().open = true;
        Ok(())
    }

    fn kernel_driver_active(&self, _interface: u8) -> Result<bool, TransportError> {
        Ok(self.state.lock().unwrap().kernel_driver_bound)
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), TransportError> {
        self.record(MockCall::DetachKernelDriver(interface));
        self.state.lock().unwrap().kernel_driver_bound = false;
        Ok(())
    }

    fn attach_kernel_driver(&mut self, interface: u8) -> Result<(), TransportError> {
        self.record(MockCall::AttachKernelDriver(interface));
        self.state.lock().unwrap().kernel_driver_bound = true;
        Ok(())
    }

    fn active_configuration(&self) -> Option<u8> {
        let state = self.state.lock().unwrap();
        if state.open {
            state.active_configuration
        } else {
            None
        }
    }

    fn set_configuration(&mut self, configuration: u8) -> Result<(), TransportError> {
        self.record(MockCall::SetConfiguration(configuration));
        let mut state = self.state.lock().unwrap();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        if state.fail_set_configuration {
            return Err(TransportError::ConfigurationFailed {
                configuration,
                message: "not supported".into(),
            });
        }
        state.active_configuration = Some(configuration);
        Ok(())
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        self.record(MockCall::ClaimInterface(interface));
        let mut state = self.state.lock().unwrap();
        if state.fail_claim {
            return Err(TransportError::ClaimInterfaceFailed {
                interface,
                message: "Resource busy".into(),
            });
        }
        state.claimed = true;
        Ok(())
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        self.record(MockCall::ReleaseInterface(interface));
        self.state.lock().unwrap().claimed = false;
        Ok(())
    }
}

/// Mock bus returning a fixed enumeration sequence.
#[derive(Default)]
pub struct MockBus {
    devices: Vec<MockDevice>,
}

impl MockBus {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        Self { devices }
    }
}

impl UsbBus for MockBus {
    type Device = MockDevice;

    fn devices(&self) -> Result<Vec<MockDevice>, TransportError> {
        Ok(self.devices.clone())
    }
}
