//! A stand-in for the robot, so the remote can be exercised without a radio.
//!
//! It advertises a scripted list of addresses, records every call made on
//! it, and can either have notifications pushed into it by hand or run a
//! background thread that sweeps the radar across the grid with random
//! distances.

use crate::config::{LinkConfig, RemoteConfig};
use crate::transport::{
    address_matches, Advertisement, ChannelId, Notifications, Transport, TransportError,
};
use log::debug;
use rand::prelude::*;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use uuid::uuid;

/// Handle for a peripheral found by [`SimulatedTransport::discover`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedPeripheral {
    /// Address it advertised
    pub address: String,
}

/// One call made on the transport, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    /// A full scan listing every advertisement
    Scan,
    /// A scan for one address
    Discover,
    /// A connect attempt
    Connect,
    /// A disconnect
    Disconnect,
    /// Channel enumeration
    Channels,
    /// A write and its payload
    Write(ChannelId, Vec<u8>),
    /// A notification subscription
    Subscribe(ChannelId),
}

#[derive(Debug, Clone, Copy)]
struct SweepSettings {
    period: Duration,
    columns: usize,
    max_distance: i32,
}

enum Signal {
    Stop,
}

struct Sweeper {
    handle: Option<thread::JoinHandle<()>>,
    tx: mpsc::Sender<Signal>,
}

impl Sweeper {
    fn start(settings: SweepSettings, out: mpsc::Sender<Vec<u8>>) -> Self {
        let (tx, rx) = mpsc::channel::<Signal>();

        let handle = thread::spawn(move || {
            let mut rng = thread_rng();
            let mut position: usize = 0;
            let mut step: isize = 1;
            loop {
                if let Ok(Signal::Stop) = rx.try_recv() {
                    break;
                }
                let distance = rng.gen_range(0..=settings.max_distance.max(0));
                let payload = format!("b'{}&{}&'", position, distance);
                if out.send(payload.into_bytes()).is_err() {
                    break;
                }

                // Bounce between the two edges, like the servo does
                if settings.columns > 1 {
                    if (position == 0 && step < 0) || (position + 1 >= settings.columns && step > 0)
                    {
                        step = -step;
                    }
                    position = (position as isize + step) as usize;
                }
                thread::sleep(settings.period);
            }
        });

        Sweeper {
            handle: Some(handle),
            tx,
        }
    }

    fn stop(&mut self) {
        // The thread may already have exited on its own, so a failed send is
        // fine.
        let _ = self.tx.send(Signal::Stop);
        if let Some(thread) = self.handle.take() {
            thread.join().unwrap();
        }
    }
}

#[derive(Default)]
struct SimState {
    connected: bool,
    calls: Vec<TransportCall>,
    subscribers: Vec<mpsc::Sender<Vec<u8>>>,
    sweeper: Option<Sweeper>,
}

/// A pretend robot. See the module documentation.
pub struct SimulatedTransport {
    advertisements: Vec<Advertisement>,
    channels: Vec<ChannelId>,
    fail_connect: bool,
    sweep: Option<SweepSettings>,
    state: Arc<Mutex<SimState>>,
}

/// Sets up a [`SimulatedTransport`].
#[derive(Default)]
pub struct SimulatedTransportBuilder {
    advertisements: Vec<Advertisement>,
    channels: Option<Vec<ChannelId>>,
    fail_connect: bool,
    sweep: Option<SweepSettings>,
}

impl SimulatedTransportBuilder {
    /// Adds an address to the advertisements seen while scanning, in order.
    pub fn advertise(mut self, address: impl Into<String>) -> Self {
        self.advertisements.push(Advertisement::new(address));
        self
    }

    /// Like [`Self::advertise`], with a local name.
    pub fn advertise_named(mut self, address: impl Into<String>, name: impl Into<String>) -> Self {
        self.advertisements
            .push(Advertisement::new(address).named(name));
        self
    }

    /// Replaces the channels the peripheral exposes. By default these are the
    /// movement and radar channels plus a device information channel.
    pub fn channels(mut self, channels: Vec<ChannelId>) -> Self {
        self.channels = Some(channels);
        self
    }

    /// Makes every connect attempt fail.
    pub fn fail_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Once subscribed, push a radar reading every `period`, sweeping back
    /// and forth over `columns` with distances up to `max_distance`.
    pub fn sweep(mut self, period: Duration, columns: usize, max_distance: i32) -> Self {
        self.sweep = Some(SweepSettings {
            period,
            columns,
            max_distance,
        });
        self
    }

    /// Builds the transport.
    pub fn build(self) -> SimulatedTransport {
        let channels = self.channels.unwrap_or_else(|| {
            let link = LinkConfig::default();
            vec![
                ChannelId::new(
                    uuid!("0000180a-0000-1000-8000-00805f9b34fb"),
                    uuid!("00002a29-0000-1000-8000-00805f9b34fb"),
                ),
                link.command_channel,
                link.ranging_channel,
            ]
        });

        SimulatedTransport {
            advertisements: self.advertisements,
            channels,
            fail_connect: self.fail_connect,
            sweep: self.sweep,
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }
}

impl SimulatedTransport {
    /// Starts configuring a simulated robot.
    pub fn builder() -> SimulatedTransportBuilder {
        SimulatedTransportBuilder::default()
    }

    fn record(&self, call: TransportCall) -> bool {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state.connected
    }

    fn stop_sweeper(&self) {
        let sweeper = self.state.lock().unwrap().sweeper.take();
        if let Some(mut sweeper) = sweeper {
            sweeper.stop();
        }
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Payloads written, in order, whatever the channel.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Write(_, payload) => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    /// Pushes a notification to every subscriber.
    pub fn notify(&self, payload: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .subscribers
            .retain(|tx| tx.send(payload.to_vec()).is_ok());
    }

    /// Simulates the robot going out of range: the connection is lost and
    /// every notification stream ends.
    pub fn drop_link(&self) {
        self.stop_sweeper();
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.subscribers.clear();
    }
}

/// A robot at the configured address whose radar sweeps the whole grid,
/// for trying the remote out without hardware.
pub fn demo_robot(config: &RemoteConfig) -> SimulatedTransport {
    SimulatedTransport::builder()
        .advertise("4C:0B:9A:21:77:E0")
        .advertise_named(config.link.target_address.clone(), "Benjamin")
        .sweep(
            Duration::from_millis(50),
            config.grid.columns,
            config.grid.max_distance,
        )
        .build()
}

impl Transport for SimulatedTransport {
    type Handle = SimulatedPeripheral;

    fn scan(&mut self, _timeout: Duration) -> Result<Vec<Advertisement>, TransportError> {
        self.record(TransportCall::Scan);
        Ok(self.advertisements.clone())
    }

    fn discover(
        &mut self,
        _timeout: Duration,
        address: &str,
    ) -> Result<Option<Self::Handle>, TransportError> {
        self.record(TransportCall::Discover);
        let found = self
            .advertisements
            .iter()
            .inspect(|candidate| debug!("advertisement from {}", candidate))
            .find(|candidate| address_matches(&candidate.address, address))
            .map(|found| SimulatedPeripheral {
                address: found.address.clone(),
            });
        Ok(found)
    }

    fn connect(&mut self, _peripheral: &Self::Handle) -> Result<(), TransportError> {
        self.record(TransportCall::Connect);
        if self.fail_connect {
            return Err(TransportError::Backend("connection refused".to_owned()));
        }
        self.state.lock().unwrap().connected = true;
        Ok(())
    }

    fn disconnect(&mut self, _peripheral: &Self::Handle) -> Result<(), TransportError> {
        let was_connected = self.record(TransportCall::Disconnect);
        self.drop_link();
        if was_connected {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }

    fn channels(&mut self, _peripheral: &Self::Handle) -> Result<Vec<ChannelId>, TransportError> {
        if !self.record(TransportCall::Channels) {
            return Err(TransportError::NotConnected);
        }
        Ok(self.channels.clone())
    }

    fn write(
        &mut self,
        _peripheral: &Self::Handle,
        channel: &ChannelId,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        if !self.record(TransportCall::Write(*channel, payload.to_vec())) {
            return Err(TransportError::NotConnected);
        }
        if !self.channels.contains(channel) {
            return Err(TransportError::ChannelNotFound(*channel));
        }
        Ok(())
    }

    fn subscribe(
        &mut self,
        _peripheral: &Self::Handle,
        channel: &ChannelId,
    ) -> Result<Notifications, TransportError> {
        if !self.record(TransportCall::Subscribe(*channel)) {
            return Err(TransportError::NotConnected);
        }
        if !self.channels.contains(channel) {
            return Err(TransportError::ChannelNotFound(*channel));
        }

        let (tx, rx) = mpsc::channel();
        let mut state = self.state.lock().unwrap();
        if let Some(settings) = self.sweep {
            if state.sweeper.is_none() {
                state.sweeper = Some(Sweeper::start(settings, tx.clone()));
            }
        }
        state.subscribers.push(tx);
        Ok(rx)
    }
}

impl Drop for SimulatedTransport {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}
