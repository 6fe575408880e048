//! End-to-end runs of the public API over the mock bus.

use std::fs;
use std::sync::Arc;

use pongo_core::transport::MockCall;
use pongo_core::{
    Backend, BackendPreference, Client, ClientConfig, ControlRequest, Error, IdentityMismatch,
    MockBus, MockDevice, NullObserver, Session, TransportError,
};
use tempfile::TempDir;

fn native() -> ClientConfig {
    ClientConfig {
        backend: BackendPreference::Native,
        ..Default::default()
    }
}

#[test]
fn test_console_round_trip() {
    let pongo = MockDevice::new().with_kernel_driver();
    pongo.queue_chunk(b"pongoOS> ");
    pongo.queue_chunk(b"");
    pongo.queue_chunk(b"");

    let bus = MockBus::new(vec![pongo.clone()]);
    let client = Client::init_with(bus, native(), Arc::new(NullObserver)).unwrap();

    assert_eq!(client.send_command("help").unwrap().as_deref(), Some("pongoOS> "));
    assert_eq!(client.send_command("bootx").unwrap(), None);
    client.close().unwrap();

    assert_eq!(pongo.count(&MockCall::DetachKernelDriver(0)), 1);
    assert_eq!(pongo.count(&MockCall::AttachKernelDriver(0)), 1);
    assert!(!pongo.is_claimed());
}

#[test]
fn test_upload_then_command() {
    let pongo = MockDevice::new();
    pongo.queue_chunk(b"booting");
    pongo.queue_chunk(b"");

    let client = Client::with_observer(pongo.clone(), native(), Arc::new(NullObserver)).unwrap();
    client.send_data(&[0xCA, 0xFE]).unwrap();
    client.send_command("bootl").unwrap();
    drop(client);

    let outs = pongo.control_out_requests();
    assert_eq!(
        outs,
        vec![
            ControlRequest::UPLOAD_BEGIN,
            ControlRequest::EXCHANGE_END,
            ControlRequest::COMMAND_BEGIN,
            ControlRequest::COMMAND_LINE,
            ControlRequest::EXCHANGE_END,
        ]
    );
    assert_eq!(pongo.count(&MockCall::ReleaseInterface(0)), 1);
}

#[test]
fn test_recovery_mode_device_is_never_claimed() {
    // Same Apple vendor, different descriptor strings.
    let recovery = MockDevice::new().with_strings(Some("Apple Inc."), Some("Apple Mobile Device"));
    let result = Client::init_with(
        MockBus::new(vec![recovery.clone()]),
        native(),
        Arc::new(NullObserver),
    );

    assert!(matches!(result, Err(Error::DeviceNotFound { .. })));
    assert!(recovery.calls().is_empty());

    let err = Session::acquire(recovery.clone()).err().unwrap();
    assert!(matches!(
        err,
        Error::IdentityMismatch(IdentityMismatch::NotPongo { .. })
    ));
    assert!(recovery.calls().is_empty());
}

#[test]
fn test_library_scan_backend_from_config_file() {
    let root = TempDir::new().unwrap();
    let prefix = root.path().join("lib");
    fs::create_dir_all(prefix.join("x86_64-linux-gnu")).unwrap();
    let library = prefix.join("x86_64-linux-gnu").join("libusb-1.0.so");
    fs::write(&library, b"").unwrap();

    let config_path = root.path().join("pongo.toml");
    ClientConfig {
        backend: BackendPreference::LibraryScan,
        library_search_paths: vec![prefix],
        ..Default::default()
    }
    .save_to_file(&config_path)
    .unwrap();

    let config = ClientConfig::load_from_file(&config_path).unwrap();
    let client = Client::init_with(
        MockBus::new(vec![MockDevice::new()]),
        config,
        Arc::new(NullObserver),
    )
    .unwrap();
    assert_eq!(client.backend(), Some(&Backend::Library(library)));
}

#[test]
fn test_unplugged_during_upload() {
    let pongo = MockDevice::new();
    pongo.fail_bulk();

    let client = Client::with_observer(pongo.clone(), native(), Arc::new(NullObserver)).unwrap();
    let err = client.send_data(b"payload").unwrap_err();
    assert!(matches!(err, Error::Transfer(TransportError::Disconnected)));

    // The claim is still released.
    client.close().unwrap();
    assert!(!pongo.is_claimed());
}
