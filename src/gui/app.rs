//! State behind the remote's terminal screen, kept apart from the drawing so
//! it can be driven by hand.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use log::warn;
use std::{
    collections::HashMap,
    fmt::Display,
    time::{Duration, Instant},
};

use crate::{
    config::RemoteConfig,
    direction::{DirectionKey, DirectionResolver},
    link_session::{LinkError, LinkSession, LinkStatus},
    occupancy_grid::OccupancyGrid,
    periodic::{PeriodicReceiver, PeriodicTransmitter, ReceiveError},
    transport::Transport,
};

/// Without key release events, a key counts as released once it has not
/// been pressed or repeated for this long, or as soon as another movement
/// key is pressed.
pub const HOLD_TIMEOUT: Duration = Duration::from_millis(600);

/// Longest the event loop sleeps between redraws.
const FRAME: Duration = Duration::from_millis(50);

/// Everything the remote screen shows and reacts to.
pub struct RemoteApp<T: Transport> {
    session: LinkSession<T>,
    resolver: DirectionResolver,
    grid: OccupancyGrid,
    transmitter: PeriodicTransmitter,
    receiver: PeriodicReceiver,
    key_releases: bool,
    held_since: HashMap<DirectionKey, Instant>,
    connect_pending: bool,
    message: Option<String>,
    quit: bool,
}

impl<T: Transport> RemoteApp<T> {
    /// Builds the app around a disconnected session.
    pub fn new(session: LinkSession<T>, config: &RemoteConfig) -> Self {
        Self {
            transmitter: PeriodicTransmitter::new(session.config().transmit_period()),
            receiver: PeriodicReceiver::new(session.config().poll_period()),
            session,
            resolver: DirectionResolver::new(),
            grid: OccupancyGrid::new(config.grid),
            key_releases: false,
            held_since: HashMap::new(),
            connect_pending: false,
            message: None,
            quit: false,
        }
    }

    /// Whether the terminal reports key releases. Without them, held keys are
    /// timed out after [`HOLD_TIMEOUT`].
    pub fn with_key_releases(mut self, key_releases: bool) -> Self {
        self.key_releases = key_releases;
        self
    }

    /// The movement key bound to `code`, if any.
    pub fn direction_key(code: KeyCode) -> Option<DirectionKey> {
        match code {
            KeyCode::Char('w') | KeyCode::Char('W') | KeyCode::Up => Some(DirectionKey::Forward),
            KeyCode::Char('a') | KeyCode::Char('A') | KeyCode::Left => Some(DirectionKey::Left),
            KeyCode::Char('s') | KeyCode::Char('S') | KeyCode::Down => {
                Some(DirectionKey::Backward)
            }
            KeyCode::Char('d') | KeyCode::Char('D') | KeyCode::Right => Some(DirectionKey::Right),
            _ => None,
        }
    }

    /// Dispatches one terminal key event.
    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        match key.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => match key.code {
                KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => self.quit = true,
                KeyCode::Char('c') | KeyCode::Char('C') => {
                    if key.kind == KeyEventKind::Press {
                        self.request_toggle();
                    }
                }
                KeyCode::Char('x') | KeyCode::Char('X') => self.cancel(),
                code => {
                    if let Some(direction_key) = Self::direction_key(code) {
                        self.key_down(direction_key, now);
                    }
                }
            },
            KeyEventKind::Release => {
                if let Some(direction_key) = Self::direction_key(key.code) {
                    self.key_up(direction_key);
                }
            }
        }
    }

    /// A movement key went down (or repeated).
    pub fn key_down(&mut self, key: DirectionKey, now: Instant) {
        if !self.key_releases {
            // Terminals without release events only repeat the newest key
            let others: Vec<DirectionKey> = self
                .held_since
                .keys()
                .copied()
                .filter(|&held| held != key)
                .collect();
            for other in others {
                self.key_up(other);
            }
            self.held_since.insert(key, now);
        }
        self.resolver.press(key);
    }

    /// A movement key came up.
    pub fn key_up(&mut self, key: DirectionKey) {
        self.resolver.release(key);
        self.held_since.remove(&key);
    }

    /// Lets go of every movement key.
    pub fn release_all(&mut self) {
        self.resolver.release_all();
        self.held_since.clear();
    }

    /// The connect/disconnect button. A connect only moves the session to
    /// `Connecting` here; the scan itself runs in [`Self::run_pending`], after
    /// the new status has been drawn.
    pub fn request_toggle(&mut self) {
        match self.session.status() {
            LinkStatus::Disconnected => match self.session.begin_connect() {
                Ok(()) => {
                    self.message = None;
                    self.connect_pending = true;
                }
                Err(error) => self.report(error),
            },
            LinkStatus::Connected => {
                if let Err(error) = self.session.disconnect() {
                    self.report(error);
                }
            }
            _ => {}
        }
    }

    /// Abandons a pending connect, or drops the link outright.
    pub fn cancel(&mut self) {
        self.connect_pending = false;
        self.session.cancel();
    }

    /// Runs a connect requested by [`Self::request_toggle`]. Blocks for at
    /// most the scan window.
    pub fn run_pending(&mut self) {
        if !self.connect_pending {
            return;
        }
        self.connect_pending = false;
        if let Err(error) = self.session.finish_connect() {
            self.report(error);
        }
    }

    /// Runs whichever periodic jobs are due, and times out held keys.
    pub fn on_tick(&mut self, now: Instant) {
        if !self.key_releases {
            let expired: Vec<DirectionKey> = self
                .held_since
                .iter()
                .filter(|(_, &since)| now.saturating_duration_since(since) >= HOLD_TIMEOUT)
                .map(|(&key, _)| key)
                .collect();
            for key in expired {
                self.key_up(key);
            }
        }

        let direction = self.resolver.direction();
        if let Err(error) = self.transmitter.poll(now, &mut self.session, direction) {
            self.report(error);
        }
        match self.receiver.poll(now, &mut self.session, &mut self.grid) {
            Ok(_) => {}
            // Already logged by the session
            Err(ReceiveError::Link(LinkError::Decode(error))) => {
                self.message = Some(format!("bad notification: {}", error))
            }
            Err(error) => self.report(error),
        }
    }

    /// How long the event loop may wait for input before the next job is due.
    pub fn next_wakeup(&self, now: Instant) -> Duration {
        self.transmitter
            .until_due(now)
            .min(self.receiver.until_due(now))
            .min(FRAME)
    }

    fn report(&mut self, error: impl Display) {
        warn!("{}", error);
        self.message = Some(error.to_string());
    }

    /// The link.
    pub fn session(&self) -> &LinkSession<T> {
        &self.session
    }

    /// The movement keys and direction.
    pub fn resolver(&self) -> &DirectionResolver {
        &self.resolver
    }

    /// The radar picture.
    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    /// The most recent problem worth showing, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Whether a connect is waiting for [`Self::run_pending`].
    pub fn connect_pending(&self) -> bool {
        self.connect_pending
    }

    /// Whether the user asked to leave.
    pub fn should_quit(&self) -> bool {
        self.quit
    }
}
