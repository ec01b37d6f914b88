//! The real radio, through [btleplug].
//!
//! btleplug is async, the rest of the remote is not. The transport owns a
//! small tokio runtime and blocks on it for each call. Notification streams
//! are the one thing that keeps running in the background: a runtime task
//! copies each value into a plain channel, which the link session drains at
//! its own pace.

use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use log::{debug, info};
use std::sync::mpsc;
use std::time::Duration;
use tokio::{runtime::Runtime, task::JoinHandle, time::Instant};

use crate::transport::{
    address_matches, Advertisement, ChannelId, Notifications, Transport, TransportError,
};

/// How often the adapter's peripheral list is checked while scanning.
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl From<btleplug::Error> for TransportError {
    fn from(value: btleplug::Error) -> Self {
        match value {
            btleplug::Error::NotConnected => TransportError::NotConnected,
            other => TransportError::Backend(other.to_string()),
        }
    }
}

/// A [`Transport`] over the first bluetooth adapter on the system.
pub struct BleTransport {
    runtime: Runtime,
    adapter: Adapter,
    forwarders: Vec<JoinHandle<()>>,
}

impl BleTransport {
    /// Opens the first adapter.
    pub fn new() -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|e| TransportError::Backend(e.to_string()))?;

        let adapter = runtime.block_on(async {
            let manager = Manager::new().await?;
            manager
                .adapters()
                .await?
                .into_iter()
                .next()
                .ok_or(TransportError::NoAdapter)
        })?;

        Ok(Self {
            runtime,
            adapter,
            forwarders: Vec::new(),
        })
    }

    fn find_characteristic(
        peripheral: &Peripheral,
        channel: &ChannelId,
    ) -> Result<Characteristic, TransportError> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == channel.characteristic && c.service_uuid == channel.service)
            .ok_or(TransportError::ChannelNotFound(*channel))
    }

    fn stop_forwarders(&mut self) {
        for forwarder in self.forwarders.drain(..) {
            forwarder.abort();
        }
    }
}

impl Transport for BleTransport {
    type Handle = Peripheral;

    fn scan(&mut self, timeout: Duration) -> Result<Vec<Advertisement>, TransportError> {
        let adapter = &self.adapter;
        self.runtime.block_on(async {
            adapter.start_scan(ScanFilter::default()).await?;
            tokio::time::sleep(timeout).await;

            let listed = async {
                let mut seen = Vec::new();
                for peripheral in adapter.peripherals().await? {
                    let local_name = peripheral
                        .properties()
                        .await?
                        .and_then(|properties| properties.local_name);
                    seen.push(Advertisement {
                        address: peripheral.address().to_string(),
                        local_name,
                    });
                }
                Ok::<_, TransportError>(seen)
            }
            .await;

            adapter.stop_scan().await?;
            listed
        })
    }

    fn discover(
        &mut self,
        timeout: Duration,
        address: &str,
    ) -> Result<Option<Self::Handle>, TransportError> {
        let adapter = &self.adapter;
        self.runtime.block_on(async {
            adapter.start_scan(ScanFilter::default()).await?;
            let deadline = Instant::now() + timeout;

            // Scanning has to stop whatever the outcome, so errors are only
            // propagated after stop_scan.
            let found = async {
                loop {
                    let peripherals = adapter.peripherals().await?;
                    let found = peripherals.into_iter().find(|p| {
                        let candidate = p.address().to_string();
                        debug!("advertisement from {}", candidate);
                        address_matches(&candidate, address)
                    });
                    if found.is_some() || Instant::now() >= deadline {
                        return Ok::<_, TransportError>(found);
                    }
                    tokio::time::sleep(SCAN_POLL_INTERVAL).await;
                }
            }
            .await;

            adapter.stop_scan().await?;
            found
        })
    }

    fn connect(&mut self, peripheral: &Self::Handle) -> Result<(), TransportError> {
        self.runtime.block_on(async {
            peripheral.connect().await?;
            peripheral.discover_services().await?;
            Ok::<_, TransportError>(())
        })
    }

    fn disconnect(&mut self, peripheral: &Self::Handle) -> Result<(), TransportError> {
        self.stop_forwarders();
        self.runtime.block_on(peripheral.disconnect())?;
        Ok(())
    }

    fn channels(&mut self, peripheral: &Self::Handle) -> Result<Vec<ChannelId>, TransportError> {
        if !self.runtime.block_on(peripheral.is_connected())? {
            return Err(TransportError::NotConnected);
        }
        Ok(peripheral
            .services()
            .iter()
            .flat_map(|service| {
                service
                    .characteristics
                    .iter()
                    .map(move |c| ChannelId::new(service.uuid, c.uuid))
            })
            .collect())
    }

    fn write(
        &mut self,
        peripheral: &Self::Handle,
        channel: &ChannelId,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let characteristic = Self::find_characteristic(peripheral, channel)?;
        self.runtime.block_on(peripheral.write(
            &characteristic,
            payload,
            WriteType::WithoutResponse,
        ))?;
        Ok(())
    }

    fn subscribe(
        &mut self,
        peripheral: &Self::Handle,
        channel: &ChannelId,
    ) -> Result<Notifications, TransportError> {
        let characteristic = Self::find_characteristic(peripheral, channel)?;
        let mut stream = self.runtime.block_on(async {
            peripheral.subscribe(&characteristic).await?;
            peripheral.notifications().await
        })?;

        let (tx, rx) = mpsc::channel();
        let uuid = characteristic.uuid;
        let forwarder = self.runtime.spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid != uuid {
                    continue;
                }
                if tx.send(notification.value).is_err() {
                    break;
                }
            }
            info!("notification stream for {} ended", uuid);
        });
        self.forwarders.push(forwarder);

        Ok(rx)
    }
}

impl Drop for BleTransport {
    fn drop(&mut self) {
        self.stop_forwarders();
    }
}
