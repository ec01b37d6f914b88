//! The radar picture: a fixed grid of cells where each column is one sweep
//! position of the sensor.
//!
//! A reading fills a column from row 0 down to a depth that grows as the
//! obstacle gets closer. Every write replaces the whole column, so a column
//! always holds a single contiguous run of filled cells.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ranging_decoder::RangingSample;

/// Dimensions and distance range of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Number of rows, i.e. the largest possible depth
    pub rows: usize,
    /// Number of columns, i.e. sweep positions
    pub columns: usize,
    /// Distances at or above this draw an empty column
    pub max_distance: i32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: 20,
            columns: 20,
            max_distance: 1000,
        }
    }
}

impl GridConfig {
    /// Checks that a grid can be built from these settings and that every
    /// distance maps onto it.
    pub fn validate(&self) -> Result<(), GridError> {
        if self.rows == 0 || self.rows > i32::MAX as usize {
            return Err(GridError::InvalidConfig("rows must be between 1 and i32::MAX"));
        }
        if self.columns == 0 || self.columns > i32::MAX as usize {
            return Err(GridError::InvalidConfig(
                "columns must be between 1 and i32::MAX",
            ));
        }
        if self.rows.checked_mul(self.columns).is_none() {
            return Err(GridError::InvalidConfig("rows x columns is too large"));
        }
        if self.max_distance <= 0 {
            return Err(GridError::InvalidConfig("max_distance must be positive"));
        }
        Ok(())
    }
}

/// Rejected grid settings and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    /// The sample's column is not on the grid.
    OutOfRange {
        /// Column that was asked for
        position: i32,
        /// Number of columns on the grid
        columns: usize,
    },
    /// The grid settings cannot describe a usable grid.
    InvalidConfig(&'static str),
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::OutOfRange { position, columns } => write!(
                f,
                "column {} is outside of the grid (0..{})",
                position, columns
            ),
            GridError::InvalidConfig(reason) => write!(f, "invalid grid settings: {}", reason),
        }
    }
}

impl std::error::Error for GridError {}

/// What the last accepted write did, for the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridUpdate {
    /// Column that was replaced
    pub column: usize,
    /// Distance as received, before clamping
    pub distance: i32,
    /// Number of filled rows written
    pub depth: usize,
}

/// Maps `val` from `[in_min, in_max]` onto `[out_min, out_max]`, clamping it
/// to the input range first and rounding to the nearest integer.
///
/// An empty or inverted input range degenerates into a step: `out_max` at or
/// above `in_max`, `out_min` below it.
pub fn scale(val: i32, in_min: i32, in_max: i32, out_min: i32, out_max: i32) -> i32 {
    if in_max <= in_min {
        return if val >= in_max { out_max } else { out_min };
    }
    let val = val.clamp(in_min, in_max);
    let scaled = (val - in_min) as f64 * (out_max - out_min) as f64 / (in_max - in_min) as f64
        + out_min as f64;
    scaled.round() as i32
}

/// A `rows` x `columns` grid of occupied cells, stored row major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    config: GridConfig,
    cells: Vec<bool>,
    last_update: Option<GridUpdate>,
}

impl OccupancyGrid {
    /// An empty grid.
    pub fn new(config: GridConfig) -> Self {
        Self {
            cells: vec![false; config.rows * config.columns],
            config,
            last_update: None,
        }
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.config.rows
    }

    /// Number of columns.
    pub fn columns(&self) -> usize {
        self.config.columns
    }

    /// How many rows a reading at `distance` fills. Closer means deeper.
    pub fn depth_for(&self, distance: i32) -> usize {
        let rows = self.config.rows as i32;
        let scaled = scale(distance, 0, self.config.max_distance, 0, rows);
        (rows - scaled) as usize
    }

    /// Replaces column `position` with the picture for `distance`.
    pub fn write_column(&mut self, position: i32, distance: i32) -> Result<GridUpdate, GridError> {
        let column = usize::try_from(position)
            .ok()
            .filter(|&c| c < self.config.columns)
            .ok_or(GridError::OutOfRange {
                position,
                columns: self.config.columns,
            })?;

        let depth = self.depth_for(distance);
        for row in 0..self.config.rows {
            let idx = row * self.config.columns + column;
            self.cells[idx] = row < depth;
        }

        let update = GridUpdate {
            column,
            distance,
            depth,
        };
        self.last_update = Some(update);
        Ok(update)
    }

    /// [`Self::write_column`] for a decoded sample.
    pub fn apply(&mut self, sample: &RangingSample) -> Result<GridUpdate, GridError> {
        self.write_column(sample.position, sample.distance)
    }

    /// Whether the cell is filled. Out-of-bounds cells read as empty.
    pub fn get(&self, row: usize, column: usize) -> bool {
        row < self.config.rows
            && column < self.config.columns
            && self.cells[row * self.config.columns + column]
    }

    /// Number of filled cells in a column.
    pub fn column_depth(&self, column: usize) -> usize {
        (0..self.config.rows).filter(|&r| self.get(r, column)).count()
    }

    /// Iterates over rows, top first, each as a slice of cells.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[bool]> {
        self.cells.chunks(self.config.columns.max(1))
    }

    /// The most recent accepted write, if any.
    pub fn last_update(&self) -> Option<GridUpdate> {
        self.last_update
    }

    /// Empties every cell.
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = false);
        self.last_update = None;
    }
}

impl Default for OccupancyGrid {
    fn default() -> Self {
        Self::new(GridConfig::default())
    }
}
