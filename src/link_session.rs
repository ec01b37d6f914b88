//! The connection to the robot.
//!
//! [`LinkSession`] is the only owner of the link status and the peripheral
//! handle. Every transition happens through one of its methods, called from
//! a single event loop, so nothing here needs a lock. Anything the radio
//! produces on its own (notifications, drops) reaches the session through a
//! channel that is only read when the loop polls it.
//!
//! ```text
//!  Unknown ──new()──▶ Disconnected ──connect()──▶ Connecting
//!                         ▲                          │ found + connected
//!                         │ no match / failure ◀─────┤
//!                         │                          ▼
//!                    Disconnecting ◀──disconnect()── Connected
//! ```

use log::{debug, info, warn};
use std::{
    borrow::Cow,
    fmt,
    sync::mpsc::TryRecvError,
};

use crate::{
    config::LinkConfig,
    direction::Direction,
    ranging_decoder::{self, DecodeError, RangingSample},
    transport::{ChannelId, Notifications, Transport, TransportError},
};

/// Where the link is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkStatus {
    /// Before the session has been set up
    Unknown,
    /// Scanning for, or connecting to, the robot
    Connecting,
    /// Commands and notifications are flowing
    Connected,
    /// Tearing the connection down
    Disconnecting,
    /// Idle
    Disconnected,
}

impl LinkStatus {
    /// Label for the status line.
    pub fn name(self) -> &'static str {
        match self {
            LinkStatus::Unknown => "Unknown",
            LinkStatus::Connecting => "Connecting",
            LinkStatus::Connected => "Connected",
            LinkStatus::Disconnecting => "Disconnecting",
            LinkStatus::Disconnected => "Disconnected",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Why a link operation failed. None of these are fatal; the session is
/// always left in a consistent status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// The scan window elapsed without seeing the target address.
    DiscoveryTimeout,
    /// Scanning or connecting failed in the radio.
    ConnectionFailure(TransportError),
    /// The operation is not allowed from the current status.
    InvalidState {
        /// What was attempted
        op: &'static str,
        /// Status at the time
        status: LinkStatus,
    },
    /// The radio failed while connected. The link has been dropped.
    Transport(TransportError),
    /// A notification could not be decoded. The link is unaffected.
    Decode(DecodeError),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use LinkError as LE;
        let msg = match self {
            LE::DiscoveryTimeout => Cow::from("robot not found before the scan timed out"),
            LE::ConnectionFailure(error) => Cow::from(format!("connection failed: {}", error)),
            LE::InvalidState { op, status } => {
                Cow::from(format!("cannot {} while {}", op, status))
            }
            LE::Transport(error) => Cow::from(format!("link dropped: {}", error)),
            LE::Decode(error) => Cow::from(format!("bad notification: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for LinkError {}

impl From<DecodeError> for LinkError {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// The session with one robot.
pub struct LinkSession<T: Transport> {
    transport: T,
    config: LinkConfig,
    status: LinkStatus,
    peripheral: Option<T::Handle>,
    notifications: Option<Notifications>,
    channels: Vec<ChannelId>,
    latest_sample: Option<RangingSample>,
    sample_ready: bool,
    transitions: Vec<LinkStatus>,
}

impl<T: Transport> LinkSession<T> {
    /// A disconnected session that will use `transport` to reach the
    /// peripheral described by `config`.
    pub fn new(transport: T, config: LinkConfig) -> Self {
        let mut session = Self {
            transport,
            config,
            status: LinkStatus::Unknown,
            peripheral: None,
            notifications: None,
            channels: Vec::new(),
            latest_sample: None,
            sample_ready: false,
            transitions: Vec::new(),
        };
        session.set_status(LinkStatus::Disconnected);
        session
    }

    fn set_status(&mut self, status: LinkStatus) {
        info!("link {} -> {}", self.status, status);
        self.status = status;
        self.transitions.push(status);
    }

    fn expect_status(&self, op: &'static str, expected: LinkStatus) -> Result<(), LinkError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(LinkError::InvalidState {
                op,
                status: self.status,
            })
        }
    }

    /// Current status.
    pub fn status(&self) -> LinkStatus {
        self.status
    }

    /// Shorthand for `status() == Connected`.
    pub fn is_connected(&self) -> bool {
        self.status == LinkStatus::Connected
    }

    /// Every status the session has entered, oldest first.
    pub fn transitions(&self) -> &[LinkStatus] {
        &self.transitions
    }

    /// The configuration the session was built with.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// The channels enumerated on the current connection.
    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    /// The radio underneath.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Scans for the robot and connects to it, blocking for at most the scan
    /// window plus the connect itself. Only valid while `Disconnected`.
    pub fn connect(&mut self) -> Result<(), LinkError> {
        self.begin_connect()?;
        self.finish_connect()
    }

    /// First half of [`Self::connect`]: moves to `Connecting` without touching
    /// the radio, so a caller can show the new status before blocking.
    pub fn begin_connect(&mut self) -> Result<(), LinkError> {
        self.expect_status("connect", LinkStatus::Disconnected)?;
        self.set_status(LinkStatus::Connecting);
        Ok(())
    }

    /// Second half of [`Self::connect`]: the scan and the connect. Only valid
    /// while `Connecting`. On any failure the session goes back to
    /// `Disconnected`; there is no retry.
    pub fn finish_connect(&mut self) -> Result<(), LinkError> {
        self.expect_status("connect", LinkStatus::Connecting)?;

        match self.establish() {
            Ok(()) => {
                self.set_status(LinkStatus::Connected);
                Ok(())
            }
            Err(error) => {
                warn!("connection to {} failed: {}", self.config.target_address, error);
                self.set_status(LinkStatus::Disconnected);
                Err(error)
            }
        }
    }

    fn establish(&mut self) -> Result<(), LinkError> {
        info!(
            "scanning for {} ({} ms)",
            self.config.target_address, self.config.scan_timeout_ms
        );
        let peripheral = self
            .transport
            .discover(self.config.scan_timeout(), &self.config.target_address)
            .map_err(LinkError::ConnectionFailure)?
            .ok_or(LinkError::DiscoveryTimeout)?;

        info!("found {}, connecting", self.config.target_address);
        self.transport
            .connect(&peripheral)
            .map_err(LinkError::ConnectionFailure)?;

        match self.open_channels(&peripheral) {
            Ok((channels, notifications)) => {
                self.channels = channels;
                self.notifications = Some(notifications);
                self.peripheral = Some(peripheral);
                Ok(())
            }
            Err(error) => {
                if let Err(e) = self.transport.disconnect(&peripheral) {
                    warn!("could not disconnect after failed setup: {}", e);
                }
                Err(error)
            }
        }
    }

    fn open_channels(
        &mut self,
        peripheral: &T::Handle,
    ) -> Result<(Vec<ChannelId>, Notifications), LinkError> {
        let channels = self
            .transport
            .channels(peripheral)
            .map_err(LinkError::ConnectionFailure)?;
        info!("connected, {} channels:", channels.len());
        for channel in &channels {
            info!("  {}", channel);
        }

        let notifications = self
            .transport
            .subscribe(peripheral, &self.config.ranging_channel)
            .map_err(LinkError::ConnectionFailure)?;
        Ok((channels, notifications))
    }

    /// Tears the connection down. Only valid while `Connected`. The session
    /// ends up `Disconnected` even if the radio reports an error.
    pub fn disconnect(&mut self) -> Result<(), LinkError> {
        self.expect_status("disconnect", LinkStatus::Connected)?;
        self.set_status(LinkStatus::Disconnecting);
        let result = self.release();
        self.set_status(LinkStatus::Disconnected);
        result.map_err(LinkError::Transport)
    }

    /// Connects when `Disconnected`, disconnects when `Connected`, and does
    /// nothing while a transition is in flight.
    pub fn toggle(&mut self) -> Result<(), LinkError> {
        match self.status {
            LinkStatus::Disconnected => self.connect(),
            LinkStatus::Connected => self.disconnect(),
            status => {
                debug!("toggle ignored while {}", status);
                Ok(())
            }
        }
    }

    /// Forces the session to `Disconnected` from wherever it is, dropping the
    /// peripheral if one is held.
    pub fn cancel(&mut self) {
        if self.status == LinkStatus::Disconnected {
            return;
        }
        if let Err(error) = self.release() {
            warn!("error while cancelling: {}", error);
        }
        self.set_status(LinkStatus::Disconnected);
    }

    fn release(&mut self) -> Result<(), TransportError> {
        self.notifications = None;
        self.channels.clear();
        self.sample_ready = false;
        match self.peripheral.take() {
            Some(peripheral) => self.transport.disconnect(&peripheral),
            None => Ok(()),
        }
    }

    /// Drops the link after a transport fault while connected.
    fn fault(&mut self, error: TransportError) -> LinkError {
        warn!("transport fault while {}: {}", self.status, error);
        if let Err(e) = self.release() {
            debug!("disconnect after fault also failed: {}", e);
        }
        self.set_status(LinkStatus::Disconnected);
        LinkError::Transport(error)
    }

    /// Writes `direction` to the command channel as decimal text. Returns
    /// whether anything was written: when not `Connected` this does nothing
    /// and returns `Ok(false)`.
    pub fn send_command(&mut self, direction: Direction) -> Result<bool, LinkError> {
        if self.status != LinkStatus::Connected {
            return Ok(false);
        }
        let Some(peripheral) = self.peripheral.as_ref() else {
            return Ok(false);
        };

        let payload = direction.code().to_string();
        let result = self
            .transport
            .write(peripheral, &self.config.command_channel, payload.as_bytes());
        match result {
            Ok(()) => {
                debug!("sent {} ({})", direction, payload);
                Ok(true)
            }
            Err(error) => Err(self.fault(error)),
        }
    }

    /// Takes at most one payload off the notification channel, decodes it,
    /// and latches the sample. Returns whether a new sample is ready. When
    /// not `Connected` this does nothing and returns `Ok(false)`.
    ///
    /// A payload that does not decode is dropped and reported; the previous
    /// sample and the link stay as they were.
    pub fn poll_notification(&mut self) -> Result<bool, LinkError> {
        if self.status != LinkStatus::Connected {
            return Ok(false);
        }
        let Some(notifications) = self.notifications.as_ref() else {
            return Ok(false);
        };

        let payload = match notifications.try_recv() {
            Ok(payload) => payload,
            Err(TryRecvError::Empty) => return Ok(false),
            Err(TryRecvError::Disconnected) => {
                return Err(self.fault(TransportError::NotificationsClosed))
            }
        };

        match ranging_decoder::decode_bytes(&payload) {
            Ok(sample) => {
                debug!(
                    "notification {:?} -> position {} distance {}",
                    String::from_utf8_lossy(&payload),
                    sample.position,
                    sample.distance
                );
                self.latest_sample = Some(sample);
                self.sample_ready = true;
                Ok(true)
            }
            Err(error) => {
                warn!(
                    "dropping notification {:?}: {}",
                    String::from_utf8_lossy(&payload),
                    error
                );
                Err(error.into())
            }
        }
    }

    /// Whether a sample has been latched since the last [`Self::take_sample`].
    pub fn sample_ready(&self) -> bool {
        self.sample_ready
    }

    /// The latched sample, if it has not been taken yet. Clears the ready
    /// flag.
    pub fn take_sample(&mut self) -> Option<RangingSample> {
        if self.sample_ready {
            self.sample_ready = false;
            self.latest_sample
        } else {
            None
        }
    }

    /// The most recent sample, taken or not.
    pub fn last_sample(&self) -> Option<RangingSample> {
        self.latest_sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated_transport::{SimulatedTransport, TransportCall};

    fn session_with(transport: SimulatedTransport) -> LinkSession<SimulatedTransport> {
        LinkSession::new(transport, LinkConfig::default())
    }

    fn robot() -> SimulatedTransport {
        SimulatedTransport::builder()
            .advertise("11:22:33:44:55:66")
            .advertise("f7:6d:e3:5f:cb:f9")
            .build()
    }

    #[test]
    fn starts_disconnected() {
        let session = session_with(robot());
        assert_eq!(session.status(), LinkStatus::Disconnected);
        assert_eq!(session.transitions(), &[LinkStatus::Disconnected]);
        assert!(session.transport().calls().is_empty());
    }

    #[test]
    fn discovery_timeout_returns_to_disconnected() {
        let transport = SimulatedTransport::builder()
            .advertise("11:22:33:44:55:66")
            .build();
        let mut session = session_with(transport);

        assert_eq!(session.connect(), Err(LinkError::DiscoveryTimeout));
        assert_eq!(
            session.transitions(),
            &[
                LinkStatus::Disconnected,
                LinkStatus::Connecting,
                LinkStatus::Disconnected
            ]
        );
        assert!(!session
            .transitions()
            .contains(&LinkStatus::Connected));
        assert_eq!(session.transport().calls(), vec![TransportCall::Discover]);
    }

    #[test]
    fn connect_failure_returns_to_disconnected() {
        let transport = SimulatedTransport::builder()
            .advertise("F7:6D:E3:5F:CB:F9")
            .fail_connect()
            .build();
        let mut session = session_with(transport);

        assert!(matches!(
            session.connect(),
            Err(LinkError::ConnectionFailure(_))
        ));
        assert_eq!(session.status(), LinkStatus::Disconnected);
    }

    #[test]
    fn toggle_twice_goes_round_the_cycle() {
        let mut session = session_with(robot());

        session.toggle().unwrap();
        assert_eq!(session.status(), LinkStatus::Connected);
        assert!(!session.channels().is_empty());

        session.toggle().unwrap();
        assert_eq!(
            session.transitions(),
            &[
                LinkStatus::Disconnected,
                LinkStatus::Connecting,
                LinkStatus::Connected,
                LinkStatus::Disconnecting,
                LinkStatus::Disconnected
            ]
        );
        assert!(session.channels().is_empty());
    }

    #[test]
    fn toggle_is_ignored_mid_transition() {
        let mut session = session_with(robot());
        session.begin_connect().unwrap();
        session.toggle().unwrap();
        assert_eq!(session.status(), LinkStatus::Connecting);
        assert!(session.transport().calls().is_empty());
    }

    #[test]
    fn wrong_state_is_rejected() {
        let mut session = session_with(robot());
        assert_eq!(
            session.disconnect(),
            Err(LinkError::InvalidState {
                op: "disconnect",
                status: LinkStatus::Disconnected
            })
        );
        session.connect().unwrap();
        assert!(matches!(
            session.connect(),
            Err(LinkError::InvalidState { .. })
        ));
    }

    #[test]
    fn cancel_pending_connect() {
        let mut session = session_with(robot());
        session.begin_connect().unwrap();
        session.cancel();
        assert_eq!(session.status(), LinkStatus::Disconnected);
        assert!(matches!(
            session.finish_connect(),
            Err(LinkError::InvalidState { .. })
        ));
    }

    #[test]
    fn cancel_drops_an_established_link() {
        let mut session = session_with(robot());
        session.connect().unwrap();
        assert!(!session.channels().is_empty());

        session.cancel();
        assert_eq!(session.status(), LinkStatus::Disconnected);
        assert!(session.channels().is_empty());
        assert_eq!(
            session.transport().calls().last(),
            Some(&TransportCall::Disconnect)
        );
        assert_eq!(session.send_command(Direction::North), Ok(false));

        // Cancelling again is a no-op
        let calls = session.transport().calls().len();
        session.cancel();
        assert_eq!(session.transport().calls().len(), calls);
    }

    #[test]
    fn nothing_reaches_the_radio_while_disconnected() {
        let mut session = session_with(robot());
        assert_eq!(session.send_command(Direction::North), Ok(false));
        assert_eq!(session.poll_notification(), Ok(false));
        assert!(session.transport().calls().is_empty());

        session.begin_connect().unwrap();
        assert_eq!(session.send_command(Direction::North), Ok(false));
        assert_eq!(session.poll_notification(), Ok(false));
        assert!(session.transport().calls().is_empty());
    }

    #[test]
    fn commands_are_decimal_text() {
        let mut session = session_with(robot());
        session.connect().unwrap();
        assert_eq!(session.send_command(Direction::NorthWest), Ok(true));
        assert_eq!(session.send_command(Direction::None), Ok(true));
        assert_eq!(
            session.transport().written(),
            vec![b"8".to_vec(), b"0".to_vec()]
        );
    }

    #[test]
    fn notifications_are_latched_until_taken() {
        let mut session = session_with(robot());
        session.connect().unwrap();
        assert_eq!(session.poll_notification(), Ok(false));

        session.transport().notify(b"b'12&345&'");
        assert_eq!(session.poll_notification(), Ok(true));
        assert!(session.sample_ready());
        assert_eq!(
            session.take_sample(),
            Some(RangingSample {
                position: 12,
                distance: 345
            })
        );
        assert_eq!(session.take_sample(), None);
        assert_eq!(session.last_sample().map(|s| s.position), Some(12));
    }

    #[test]
    fn bad_notification_keeps_previous_sample() {
        let mut session = session_with(robot());
        session.connect().unwrap();
        session.transport().notify(b"XX3&40&");
        session.poll_notification().unwrap();

        session.transport().notify(b"garbage");
        assert_eq!(
            session.poll_notification(),
            Err(LinkError::Decode(DecodeError::MissingDelimiter))
        );
        assert_eq!(session.status(), LinkStatus::Connected);
        assert_eq!(
            session.take_sample(),
            Some(RangingSample {
                position: 3,
                distance: 40
            })
        );
    }

    #[test]
    fn dropped_peripheral_forces_disconnect() {
        let mut session = session_with(robot());
        session.connect().unwrap();
        session.transport().drop_link();

        assert_eq!(
            session.poll_notification(),
            Err(LinkError::Transport(TransportError::NotificationsClosed))
        );
        assert_eq!(session.status(), LinkStatus::Disconnected);
    }

    #[test]
    fn failed_write_forces_disconnect() {
        let mut session = session_with(robot());
        session.connect().unwrap();
        session.transport().drop_link();

        assert_eq!(
            session.send_command(Direction::South),
            Err(LinkError::Transport(TransportError::NotConnected))
        );
        assert_eq!(session.status(), LinkStatus::Disconnected);
        assert_eq!(session.send_command(Direction::South), Ok(false));
    }
}
