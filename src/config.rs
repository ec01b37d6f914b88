//! Everything that used to be a constant at the top of the controller:
//! which robot to look for, which channels to use, and how often to talk to
//! it.
//!
//! The configuration is stored with [serde] and [ron]. A full file looks
//! like this:
//!
//! ```text
//! (
//!     link: (
//!         target_address: "F7:6D:E3:5F:CB:F9",
//!         scan_timeout_ms: 3000,
//!         command_channel: (
//!             service: "e9ea0001-e19b-482d-9293-c7907585fc48",
//!             characteristic: "e9ea0003-e19b-482d-9293-c7907585fc48",
//!         ),
//!         ranging_channel: (
//!             service: "6e400001-b5a3-f393-e0a9-e50e24dcca9e",
//!             characteristic: "6e400003-b5a3-f393-e0a9-e50e24dcca9e",
//!         ),
//!         transmit_period_ms: 80,
//!         poll_period_ms: 10,
//!     ),
//!     grid: (rows: 20, columns: 20, max_distance: 1000),
//! )
//! ```
//!
//! Missing fields fall back to their defaults.

use serde::{Deserialize, Serialize};
use std::{
    borrow::Cow,
    fmt,
    fs::File,
    io::{Read, Write},
    path::Path,
    time::Duration,
};
use uuid::{uuid, Uuid};

use crate::{
    occupancy_grid::{GridConfig, GridError},
    transport::ChannelId,
};

/// Hardware address of Benjamin.
pub const DEFAULT_TARGET_ADDRESS: &str = "F7:6D:E3:5F:CB:F9";

const MOVEMENT_SERVICE: Uuid = uuid!("e9ea0001-e19b-482d-9293-c7907585fc48");
const MOVEMENT_CHARACTERISTIC: Uuid = uuid!("e9ea0003-e19b-482d-9293-c7907585fc48");
const RADAR_SERVICE: Uuid = uuid!("6e400001-b5a3-f393-e0a9-e50e24dcca9e");
const RADAR_CHARACTERISTIC: Uuid = uuid!("6e400003-b5a3-f393-e0a9-e50e24dcca9e");

/// Where the robot is and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Hardware address of the peripheral to connect to
    pub target_address: String,
    /// How long a scan may run before the connect gives up
    pub scan_timeout_ms: u64,
    /// Where movement commands are written
    pub command_channel: ChannelId,
    /// Where radar readings are notified
    pub ranging_channel: ChannelId,
    /// Period of the movement command transmitter
    pub transmit_period_ms: u64,
    /// Period of the radar notification poller
    pub poll_period_ms: u64,
}

impl LinkConfig {
    /// The scan window.
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    /// The transmitter period.
    pub fn transmit_period(&self) -> Duration {
        Duration::from_millis(self.transmit_period_ms)
    }

    /// The poller period.
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            target_address: DEFAULT_TARGET_ADDRESS.to_owned(),
            scan_timeout_ms: 3000,
            command_channel: ChannelId::new(MOVEMENT_SERVICE, MOVEMENT_CHARACTERISTIC),
            ranging_channel: ChannelId::new(RADAR_SERVICE, RADAR_CHARACTERISTIC),
            transmit_period_ms: 80,
            poll_period_ms: 10,
        }
    }
}

/// The whole application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Radio settings
    pub link: LinkConfig,
    /// Radar picture settings
    pub grid: GridConfig,
}

/// Failures reading or writing a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    /// Returned when the file cannot be opened, read, or written.
    IoError(std::io::Error),

    /// Returned when serialization fails.
    RonError(ron::Error),

    /// Returned when the file is not valid RON for a [`RemoteConfig`].
    RonSpannedError(ron::de::SpannedError),

    /// Returned when the file parses but the grid settings are unusable.
    InvalidGrid(GridError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ConfigError as CE;
        let msg = match self {
            CE::IoError(error) => Cow::from(format!("io error: {}", error)),
            CE::RonError(error) => Cow::from(format!("ron error: {}", error)),
            CE::RonSpannedError(error) => Cow::from(format!("ron spanning error: {}", error)),
            CE::InvalidGrid(error) => Cow::from(format!("{}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ConfigError {}

impl RemoteConfig {
    /// Reads a configuration from the path provided.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut handle = File::open(path).map_err(ConfigError::IoError)?;
        let mut contents = String::new();
        handle
            .read_to_string(&mut contents)
            .map_err(ConfigError::IoError)?;
        Self::from_ron(&contents)
    }

    /// Parses a configuration from RON text and checks it.
    pub fn from_ron(s: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(s).map_err(ConfigError::RonSpannedError)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the remote cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grid.validate().map_err(ConfigError::InvalidGrid)
    }

    /// Pretty RON text for this configuration.
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(ConfigError::RonError)
    }

    /// Writes this configuration out to the path provided.
    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = self.to_ron()?;
        let mut handle = File::create(path).map_err(ConfigError::IoError)?;
        handle
            .write_all(text.as_bytes())
            .map_err(ConfigError::IoError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_robot() {
        let config = RemoteConfig::default();
        assert_eq!(config.link.target_address, "F7:6D:E3:5F:CB:F9");
        assert_eq!(config.link.scan_timeout(), Duration::from_millis(3000));
        assert_eq!(config.link.transmit_period(), Duration::from_millis(80));
        assert_eq!(config.link.poll_period(), Duration::from_millis(10));
        assert_eq!(
            config.link.command_channel.characteristic.to_string(),
            "e9ea0003-e19b-482d-9293-c7907585fc48"
        );
        assert_eq!(
            config.link.ranging_channel.service.to_string(),
            "6e400001-b5a3-f393-e0a9-e50e24dcca9e"
        );
        assert_eq!(config.grid.rows, 20);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config =
            RemoteConfig::from_ron("(link: (target_address: \"AA:BB:CC:DD:EE:FF\"))").unwrap();
        assert_eq!(config.link.target_address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(config.link.scan_timeout_ms, 3000);
        assert_eq!(config.grid, GridConfig::default());
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remote.ron");

        let mut config = RemoteConfig::default();
        config.link.scan_timeout_ms = 500;
        config.grid.columns = 30;
        config.to_path(&path).unwrap();

        assert_eq!(RemoteConfig::from_path(&path).unwrap(), config);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            RemoteConfig::from_ron("(link: 12)"),
            Err(ConfigError::RonSpannedError(_))
        ));
        assert!(matches!(
            RemoteConfig::from_path("/definitely/not/here.ron"),
            Err(ConfigError::IoError(_))
        ));
    }

    #[test]
    fn unusable_grid_is_rejected_on_load() {
        assert!(matches!(
            RemoteConfig::from_ron("(grid: (max_distance: -5))"),
            Err(ConfigError::InvalidGrid(GridError::InvalidConfig(_)))
        ));
        assert!(matches!(
            RemoteConfig::from_ron("(grid: (max_distance: 0))"),
            Err(ConfigError::InvalidGrid(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remote.ron");
        std::fs::write(&path, "(grid: (columns: 0))").unwrap();
        assert!(matches!(
            RemoteConfig::from_path(&path),
            Err(ConfigError::InvalidGrid(_))
        ));
    }
}
