//! The two fixed-period jobs that keep data moving while the link is up.
//!
//! Neither owns a thread. The event loop hands them the current time, and
//! each runs at most once per period. Both return straight away when the
//! link is not `Connected`.

use log::debug;
use std::{
    fmt,
    time::{Duration, Instant},
};

use crate::{
    direction::Direction,
    link_session::{LinkError, LinkSession},
    occupancy_grid::{GridError, GridUpdate, OccupancyGrid},
    transport::Transport,
};

/// Decides when a periodic job is due, based on when it last ran.
#[derive(Debug, Clone)]
pub struct Ticker {
    period: Duration,
    last_tick: Option<Instant>,
}

impl Ticker {
    /// A ticker that is due immediately.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_tick: None,
        }
    }

    /// The configured period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether a full period has passed since the last tick.
    pub fn due(&self, now: Instant) -> bool {
        match self.last_tick {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.period,
        }
    }

    /// Time left until the next tick is due.
    pub fn until_due(&self, now: Instant) -> Duration {
        match self.last_tick {
            None => Duration::ZERO,
            Some(last) => self
                .period
                .saturating_sub(now.saturating_duration_since(last)),
        }
    }

    /// Ticks if due. Returns whether it did.
    pub fn try_tick(&mut self, now: Instant) -> bool {
        if self.due(now) {
            self.last_tick = Some(now);
            true
        } else {
            false
        }
    }
}

/// Sends the current direction to the robot every period.
#[derive(Debug, Clone)]
pub struct PeriodicTransmitter {
    ticker: Ticker,
}

impl PeriodicTransmitter {
    /// A transmitter running every `period`.
    pub fn new(period: Duration) -> Self {
        Self {
            ticker: Ticker::new(period),
        }
    }

    /// One transmission, regardless of timing. Returns whether a command was
    /// written.
    pub fn tick<T: Transport>(
        &mut self,
        session: &mut LinkSession<T>,
        direction: Direction,
    ) -> Result<bool, LinkError> {
        session.send_command(direction)
    }

    /// Runs [`Self::tick`] if a period has passed since the last one.
    pub fn poll<T: Transport>(
        &mut self,
        now: Instant,
        session: &mut LinkSession<T>,
        direction: Direction,
    ) -> Result<bool, LinkError> {
        if !self.ticker.try_tick(now) {
            return Ok(false);
        }
        self.tick(session, direction)
    }

    /// Time left until the next transmission.
    pub fn until_due(&self, now: Instant) -> Duration {
        self.ticker.until_due(now)
    }

    /// The transmission period.
    pub fn period(&self) -> Duration {
        self.ticker.period()
    }
}

/// Reasons a receive tick produced no grid update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveError {
    /// Polling the link failed
    Link(LinkError),
    /// The sample pointed outside of the grid
    Grid(GridError),
}

impl fmt::Display for ReceiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiveError::Link(error) => write!(f, "{}", error),
            ReceiveError::Grid(error) => write!(f, "{}", error),
        }
    }
}

impl std::error::Error for ReceiveError {}

impl From<LinkError> for ReceiveError {
    fn from(value: LinkError) -> Self {
        Self::Link(value)
    }
}

impl From<GridError> for ReceiveError {
    fn from(value: GridError) -> Self {
        Self::Grid(value)
    }
}

/// Polls for radar notifications every period and draws them on the grid.
#[derive(Debug, Clone)]
pub struct PeriodicReceiver {
    ticker: Ticker,
}

impl PeriodicReceiver {
    /// A receiver running every `period`.
    pub fn new(period: Duration) -> Self {
        Self {
            ticker: Ticker::new(period),
        }
    }

    /// One poll, regardless of timing. A ready sample is taken off the
    /// session and written to `grid`.
    pub fn tick<T: Transport>(
        &mut self,
        session: &mut LinkSession<T>,
        grid: &mut OccupancyGrid,
    ) -> Result<Option<GridUpdate>, ReceiveError> {
        if !session.is_connected() {
            return Ok(None);
        }
        session.poll_notification()?;

        match session.take_sample() {
            Some(sample) => {
                let update = grid.apply(&sample)?;
                debug!(
                    "column {} distance {} depth {}",
                    update.column, update.distance, update.depth
                );
                Ok(Some(update))
            }
            None => Ok(None),
        }
    }

    /// Runs [`Self::tick`] if a period has passed since the last one.
    pub fn poll<T: Transport>(
        &mut self,
        now: Instant,
        session: &mut LinkSession<T>,
        grid: &mut OccupancyGrid,
    ) -> Result<Option<GridUpdate>, ReceiveError> {
        if !self.ticker.try_tick(now) {
            return Ok(None);
        }
        self.tick(session, grid)
    }

    /// Time left until the next poll.
    pub fn until_due(&self, now: Instant) -> Duration {
        self.ticker.until_due(now)
    }

    /// The polling period.
    pub fn period(&self) -> Duration {
        self.ticker.period()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::LinkConfig,
        link_session::LinkStatus,
        simulated_transport::SimulatedTransport,
    };

    fn connected_session() -> LinkSession<SimulatedTransport> {
        let transport = SimulatedTransport::builder()
            .advertise("F7:6D:E3:5F:CB:F9")
            .build();
        let mut session = LinkSession::new(transport, LinkConfig::default());
        session.connect().unwrap();
        session
    }

    #[test]
    fn ticker_respects_period() {
        let start = Instant::now();
        let mut ticker = Ticker::new(Duration::from_millis(80));
        assert!(ticker.try_tick(start));
        assert!(!ticker.try_tick(start + Duration::from_millis(79)));
        assert_eq!(
            ticker.until_due(start + Duration::from_millis(30)),
            Duration::from_millis(50)
        );
        assert!(ticker.try_tick(start + Duration::from_millis(80)));
        assert_eq!(
            ticker.until_due(start + Duration::from_millis(500)),
            Duration::ZERO
        );
    }

    #[test]
    fn transmitter_sends_once_per_period() {
        let mut session = connected_session();
        let mut tx = PeriodicTransmitter::new(Duration::from_millis(80));
        let start = Instant::now();

        assert_eq!(tx.poll(start, &mut session, Direction::North), Ok(true));
        assert_eq!(
            tx.poll(start + Duration::from_millis(40), &mut session, Direction::East),
            Ok(false)
        );
        assert_eq!(
            tx.poll(start + Duration::from_millis(80), &mut session, Direction::East),
            Ok(true)
        );
        assert_eq!(
            session.transport().written(),
            vec![b"1".to_vec(), b"3".to_vec()]
        );
    }

    #[test]
    fn receiver_draws_ready_samples() {
        let mut session = connected_session();
        let mut grid = OccupancyGrid::default();
        let mut rx = PeriodicReceiver::new(Duration::from_millis(10));

        assert_eq!(rx.tick(&mut session, &mut grid), Ok(None));

        session.transport().notify(b"b'4&0&'");
        let update = rx.tick(&mut session, &mut grid).unwrap().unwrap();
        assert_eq!(update.column, 4);
        assert_eq!(grid.column_depth(4), 20);
        assert!(!session.sample_ready());
    }

    #[test]
    fn receiver_reports_off_grid_samples() {
        let mut session = connected_session();
        let mut grid = OccupancyGrid::default();
        let mut rx = PeriodicReceiver::new(Duration::from_millis(10));

        session.transport().notify(b"b'40&0&'");
        assert!(matches!(
            rx.tick(&mut session, &mut grid),
            Err(ReceiveError::Grid(GridError::OutOfRange { position: 40, .. }))
        ));
        assert_eq!(grid, OccupancyGrid::default());
        assert!(!session.sample_ready());
        assert_eq!(session.status(), LinkStatus::Connected);
    }

    #[test]
    fn both_are_idle_while_disconnected() {
        let transport = SimulatedTransport::builder().build();
        let mut session = LinkSession::new(transport, LinkConfig::default());
        let mut grid = OccupancyGrid::default();
        let now = Instant::now();

        let mut tx = PeriodicTransmitter::new(Duration::from_millis(80));
        let mut rx = PeriodicReceiver::new(Duration::from_millis(10));
        assert_eq!(tx.poll(now, &mut session, Direction::North), Ok(false));
        assert_eq!(rx.poll(now, &mut session, &mut grid), Ok(None));
        assert!(session.transport().calls().is_empty());
    }
}
