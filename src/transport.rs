//! The wireless boundary: everything the link session needs from a radio,
//! and nothing more.
//!
//! There are two implementations, [`BleTransport`](crate::ble_transport::BleTransport)
//! which talks to a real adapter, and
//! [`SimulatedTransport`](crate::simulated_transport::SimulatedTransport)
//! which pretends to be the robot.

use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt, sync::mpsc::Receiver, time::Duration};
use uuid::Uuid;

/// A service/characteristic pair on the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId {
    /// GATT service
    pub service: Uuid,
    /// GATT characteristic within the service
    pub characteristic: Uuid,
}

impl ChannelId {
    /// Makes a channel from two UUIDs.
    pub const fn new(service: Uuid, characteristic: Uuid) -> Self {
        Self {
            service,
            characteristic,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.service, self.characteristic)
    }
}

/// A peripheral seen while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Hardware address
    pub address: String,
    /// Advertised local name, when the peripheral sends one
    pub local_name: Option<String>,
}

impl Advertisement {
    /// An advertisement without a name.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            local_name: None,
        }
    }

    /// Adds the advertised name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.local_name = Some(name.into());
        self
    }
}

impl fmt::Display for Advertisement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.local_name {
            Some(name) => write!(f, "{}: {}", self.address, name),
            None => write!(f, "{}: (unnamed)", self.address),
        }
    }
}

/// Notification payloads, in arrival order. The sending side is dropped when
/// the peripheral goes away.
pub type Notifications = Receiver<Vec<u8>>;

/// Things that can go wrong below the link session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// There is no radio to scan with.
    NoAdapter,
    /// The peripheral is not (or no longer) connected.
    NotConnected,
    /// The peripheral does not expose the channel.
    ChannelNotFound(ChannelId),
    /// The notification stream ended.
    NotificationsClosed,
    /// Anything the radio library reports.
    Backend(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TransportError as TE;
        let msg = match self {
            TE::NoAdapter => Cow::from("no bluetooth adapter found"),
            TE::NotConnected => Cow::from("peripheral is not connected"),
            TE::ChannelNotFound(channel) => Cow::from(format!("no channel {}", channel)),
            TE::NotificationsClosed => Cow::from("notification stream closed"),
            TE::Backend(error) => Cow::from(format!("bluetooth error: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for TransportError {}

/// Whether an advertised hardware address is the one we are looking for.
/// Addresses are compared without regard to case, so `f7:6d:...` matches
/// `F7:6D:...`.
pub fn address_matches(candidate: &str, target: &str) -> bool {
    candidate.trim().eq_ignore_ascii_case(target.trim())
}

/// A radio that can find, connect to, and exchange data with one peripheral.
///
/// All calls block the caller. Implementations that do work on other threads
/// must hand results back through return values or [`Notifications`], never
/// by reaching into the caller's state.
pub trait Transport {
    /// Whatever identifies a discovered peripheral.
    type Handle;

    /// Scans for the whole of `timeout` and returns every peripheral seen, in
    /// the order they were first seen.
    fn scan(&mut self, timeout: Duration) -> Result<Vec<Advertisement>, TransportError>;

    /// Scans for at most `timeout`, returning the first peripheral whose
    /// address matches `address`. Scanning stops as soon as one is found.
    fn discover(
        &mut self,
        timeout: Duration,
        address: &str,
    ) -> Result<Option<Self::Handle>, TransportError>;

    /// Opens a connection to a discovered peripheral.
    fn connect(&mut self, peripheral: &Self::Handle) -> Result<(), TransportError>;

    /// Closes the connection.
    fn disconnect(&mut self, peripheral: &Self::Handle) -> Result<(), TransportError>;

    /// Every service/characteristic pair the connected peripheral exposes.
    fn channels(&mut self, peripheral: &Self::Handle) -> Result<Vec<ChannelId>, TransportError>;

    /// Writes without asking for a response. Success only means the write
    /// was handed to the radio.
    fn write(
        &mut self,
        peripheral: &Self::Handle,
        channel: &ChannelId,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    /// Subscribes to notifications on `channel`.
    fn subscribe(
        &mut self,
        peripheral: &Self::Handle,
        channel: &ChannelId,
    ) -> Result<Notifications, TransportError>;
}
