//! Event system for UI decoupling.
//!
//! Lets the CLI (or any other front end) follow a session without
//! coupling to the protocol code.

use std::fmt;

use crate::backend::Backend;

/// Transfer direction, from the host's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDirection {
    Tx, // Host -> Device
    Rx, // Device -> Host
}

impl fmt::Display for PacketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketDirection::Tx => write!(f, "TX"),
            PacketDirection::Rx => write!(f, "RX"),
        }
    }
}

/// Events emitted by a pongoOS client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PongoEvent {
    /// A USB backend was selected.
    BackendResolved { backend: Backend },
    /// A device matching the pongoOS signature was found.
    DeviceFound { vid: u16, pid: u16 },
    /// Interface claimed, session live.
    InterfaceClaimed { interface: u8 },
    /// A command line was sent.
    CommandSent { command: String },
    /// A chunk of console output arrived.
    ChunkReceived { length: usize },
    /// The exchange was closed; `bytes` is the total response size.
    ExchangeComplete { bytes: usize },
    /// A data blob was pushed over bulk.
    DataUploaded { length: usize },
    /// Interface released and kernel driver restored.
    InterfaceReleased { interface: u8 },
}

/// Observer trait for receiving client events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait PongoObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &PongoEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl PongoObserver for NullObserver {
    fn on_event(&self, _event: &PongoEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl PongoObserver for TracingObserver {
    fn on_event(&self, event: &PongoEvent) {
        match event {
            PongoEvent::BackendResolved { backend } => {
                tracing::debug!(backend = %backend, "Backend resolved");
            }
            PongoEvent::DeviceFound { vid, pid } => {
                tracing::info!(vid = %format!("{:04X}", vid), pid = %format!("{:04X}", pid), "Device found");
            }
            PongoEvent::InterfaceClaimed { interface } => {
                tracing::info!(interface, "Interface claimed");
            }
            PongoEvent::CommandSent { command } => {
                tracing::debug!(command = %command, "Command sent");
            }
            PongoEvent::ChunkReceived { length } => {
                tracing::trace!(dir = %PacketDirection::Rx, len = length, "Console chunk");
            }
            PongoEvent::ExchangeComplete { bytes } => {
                tracing::debug!(bytes, "Exchange complete");
            }
            PongoEvent::DataUploaded { length } => {
                tracing::info!(dir = %PacketDirection::Tx, len = length, "Data uploaded");
            }
            PongoEvent::InterfaceReleased { interface } => {
                tracing::info!(interface, "Interface released");
            }
        }
    }
}
