//! pongoOS client - connects to the device and runs exchanges.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::backend::{Backend, ResolverChain};
use crate::command;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::events::{PongoEvent, PongoObserver, TracingObserver};
use crate::locator::DeviceLocator;
use crate::session::Session;
use crate::transport::{NusbBus, NusbDevice, TransportError, UsbBus, UsbDevice};
use crate::upload;

/// A live connection to a device booted into pongoOS.
///
/// The console interface stays claimed until [`Client::close`] is called or
/// the client is dropped.
pub struct Client<D: UsbDevice> {
    session: Session<D>,
    config: ClientConfig,
    backend: Option<Backend>,
    observer: Arc<dyn PongoObserver>,
}

impl Client<NusbDevice> {
    /// Resolve a backend, find the first pongoOS device and claim it.
    pub fn init(config: ClientConfig) -> Result<Self> {
        Self::init_with(NusbBus, config, Arc::new(TracingObserver))
    }
}

impl<D: UsbDevice> Client<D> {
    /// `init` over an arbitrary bus and observer.
    #[instrument(level = "info", skip_all)]
    pub fn init_with<B>(
        bus: B,
        config: ClientConfig,
        observer: Arc<dyn PongoObserver>,
    ) -> Result<Self>
    where
        B: UsbBus<Device = D>,
    {
        let backend =
            ResolverChain::for_preference(config.backend, &config.library_search_paths).resolve()?;
        observer.on_event(&PongoEvent::BackendResolved {
            backend: backend.clone(),
        });

        let device = DeviceLocator::new(bus).find()?;
        observer.on_event(&PongoEvent::DeviceFound {
            vid: device.vendor_id(),
            pid: device.product_id(),
        });

        let mut client = Self::with_observer(device, config, observer)?;
        client.backend = Some(backend);
        Ok(client)
    }

    /// Claim an already chosen device.
    pub fn with_device(device: D, config: ClientConfig) -> Result<Self> {
        Self::with_observer(device, config, Arc::new(TracingObserver))
    }

    pub fn with_observer(
        device: D,
        config: ClientConfig,
        observer: Arc<dyn PongoObserver>,
    ) -> Result<Self> {
        let session = Session::acquire(device)?;
        observer.on_event(&PongoEvent::InterfaceClaimed {
            interface: session.interface(),
        });

        Ok(Self {
            session,
            config,
            backend: None,
            observer,
        })
    }

    /// Send one console command and return its output, if any.
    pub fn send_command(&self, command: &str) -> Result<Option<String>> {
        self.ensure_claimed()?;
        command::send_command(
            self.session.channel(),
            command,
            self.config.transfer_timeout(),
            self.observer.as_ref(),
        )
    }

    /// Upload a raw blob over the bulk endpoint.
    pub fn send_data(&self, data: &[u8]) -> Result<()> {
        self.ensure_claimed()?;
        upload::send_data(
            self.session.channel(),
            data,
            self.config.transfer_timeout(),
            self.observer.as_ref(),
        )
    }

    /// Release the interface and reattach the kernel driver.
    pub fn close(mut self) -> Result<()> {
        let interface = self.session.interface();
        self.session.release()?;
        self.observer.on_event(&PongoEvent::InterfaceReleased { interface });
        info!("Client closed");
        Ok(())
    }

    /// Backend chosen by `init`; `None` when the device was passed in.
    pub fn backend(&self) -> Option<&Backend> {
        self.backend.as_ref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Session<D> {
        &self.session
    }

    fn ensure_claimed(&self) -> Result<()> {
        if !self.session.is_claimed() {
            return Err(TransportError::NotClaimed {
                interface: self.session.interface(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::backend::BackendPreference;
    use crate::error::Error;
    use crate::events::NullObserver;
    use crate::transport::{MockBus, MockCall, MockDevice};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<PongoEvent>>,
    }

    impl PongoObserver for Recorder {
        fn on_event(&self, event: &PongoEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn native_config() -> ClientConfig {
        ClientConfig {
            backend: BackendPreference::Native,
            ..Default::default()
        }
    }

    #[test]
    fn test_init_claims_first_pongo_device() {
        let other = MockDevice::new().with_ids(0x05AC, 0x12A8);
        let pongo = MockDevice::new();
        let bus = MockBus::new(vec![other.clone(), pongo.clone()]);

        let client = Client::init_with(bus, native_config(), Arc::new(NullObserver)).unwrap();
        assert_eq!(client.backend(), Some(&Backend::Native));
        assert!(pongo.is_claimed());
        assert!(other.calls().is_empty());
    }

    #[test]
    fn test_init_without_device() {
        let result =
            Client::init_with(MockBus::default(), native_config(), Arc::new(NullObserver));
        assert!(matches!(result, Err(Error::DeviceNotFound { .. })));
    }

    #[test]
    fn test_init_without_backend_touches_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let pongo = MockDevice::new();
        let config = ClientConfig {
            backend: BackendPreference::LibraryScan,
            library_search_paths: vec![dir.path().to_path_buf()],
            ..Default::default()
        };

        let result = Client::init_with(
            MockBus::new(vec![pongo.clone()]),
            config,
            Arc::new(NullObserver),
        );
        assert!(matches!(result, Err(Error::NoBackendAvailable { .. })));
        assert!(pongo.calls().is_empty());
    }

    #[test]
    fn test_events_follow_session() {
        let pongo = MockDevice::new();
        pongo.queue_chunk(b"pongoOS> ");
        pongo.queue_chunk(b"");
        let recorder = Arc::new(Recorder::default());

        let client = Client::init_with(
            MockBus::new(vec![pongo.clone()]),
            native_config(),
            recorder.clone(),
        )
        .unwrap();
        client.send_command("help").unwrap();
        client.send_data(b"\x7fELF").unwrap();
        client.close().unwrap();

        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec![
                PongoEvent::BackendResolved {
                    backend: Backend::Native
                },
                PongoEvent::DeviceFound {
                    vid: 0x05AC,
                    pid: 0x4141
                },
                PongoEvent::InterfaceClaimed { interface: 0 },
                PongoEvent::CommandSent {
                    command: "help".into()
                },
                PongoEvent::ChunkReceived { length: 9 },
                PongoEvent::ExchangeComplete { bytes: 9 },
                PongoEvent::DataUploaded { length: 4 },
                PongoEvent::InterfaceReleased { interface: 0 },
            ]
        );
    }

    #[test]
    fn test_close_releases_once() {
        let pongo = MockDevice::new().with_kernel_driver();
        let client = Client::with_observer(pongo.clone(), native_config(), Arc::new(NullObserver))
            .unwrap();
        assert_eq!(client.backend(), None);

        client.close().unwrap();
        assert_eq!(pongo.count(&MockCall::ReleaseInterface(0)), 1);
        assert_eq!(pongo.count(&MockCall::AttachKernelDriver(0)), 1);
    }

    #[test]
    fn test_command_uses_configured_timeout() {
        let pongo = MockDevice::new();
        let config = ClientConfig {
            transfer_timeout_ms: 42,
            ..native_config()
        };
        let client = Client::with_observer(pongo.clone(), config, Arc::new(NullObserver)).unwrap();

        // No chunk queued: the mock times out with the timeout it was given.
        let err = client.send_command("ps").unwrap_err();
        assert!(matches!(
            err,
            Error::Transfer(TransportError::Timeout { timeout_ms: 42 })
        ));
    }
}
