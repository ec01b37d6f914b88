//! Turns the four held movement keys into a single [`Direction`] for the
//! robot.
//!
//! Each key owns one bit of a 4-bit code (forward = `0b1000`, left = `0b0100`,
//! backward = `0b0010`, right = `0b0001`) and the code indexes a fixed table.
//! The table is kept literal rather than derived from the bits, because it
//! carries tie-breaks that arithmetic would not reproduce: opposite keys
//! cancel, and three keys collapse to the odd one out.

use std::fmt::{self, Display};

/// A movement command for the robot. The discriminant is the code that goes
/// on the wire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Stop
    #[default]
    None = 0,
    /// Straight ahead
    North = 1,
    /// Ahead and to the right
    NorthEast = 2,
    /// Turn right
    East = 3,
    /// Back and to the right
    SouthEast = 4,
    /// Straight back
    South = 5,
    /// Back and to the left
    SouthWest = 6,
    /// Turn left
    West = 7,
    /// Ahead and to the left
    NorthWest = 8,
}

impl Direction {
    /// The integer code the robot firmware expects, `0..=8`.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Human readable name, used by the direction label.
    pub fn name(self) -> &'static str {
        match self {
            Direction::None => "None",
            Direction::North => "North",
            Direction::NorthEast => "NorthEast",
            Direction::East => "East",
            Direction::SouthEast => "SouthEast",
            Direction::South => "South",
            Direction::SouthWest => "SouthWest",
            Direction::West => "West",
            Direction::NorthWest => "NorthWest",
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Indexed by the combined key code.
const DIRECTION_LUT: [Direction; 16] = [
    Direction::None,      // 0000
    Direction::East,      // 0001
    Direction::South,     // 0010
    Direction::SouthEast, // 0011
    Direction::West,      // 0100
    Direction::None,      // 0101
    Direction::SouthWest, // 0110
    Direction::South,     // 0111
    Direction::North,     // 1000
    Direction::NorthEast, // 1001
    Direction::None,      // 1010
    Direction::East,      // 1011
    Direction::NorthWest, // 1100
    Direction::North,     // 1101
    Direction::West,      // 1110
    Direction::None,      // 1111
];

/// One of the four movement keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectionKey {
    /// `W` by default
    Forward,
    /// `A` by default
    Left,
    /// `S` by default
    Backward,
    /// `D` by default
    Right,
}

impl DirectionKey {
    /// Every key, in the order of their bit weights (most significant first).
    pub const ALL: [DirectionKey; 4] = [
        DirectionKey::Forward,
        DirectionKey::Left,
        DirectionKey::Backward,
        DirectionKey::Right,
    ];

    /// The bit this key contributes to the combined code.
    pub fn bit(self) -> u8 {
        match self {
            DirectionKey::Forward => 0b1000,
            DirectionKey::Left => 0b0100,
            DirectionKey::Backward => 0b0010,
            DirectionKey::Right => 0b0001,
        }
    }
}

/// Which movement keys are currently held down. There is no debounce and no
/// repeat suppression; a flag is exactly "pressed and not yet released".
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DirectionalInputFlags {
    /// Forward key held
    pub forward: bool,
    /// Left key held
    pub left: bool,
    /// Backward key held
    pub backward: bool,
    /// Right key held
    pub right: bool,
}

impl DirectionalInputFlags {
    /// Whether `key` is held.
    pub fn get(&self, key: DirectionKey) -> bool {
        match key {
            DirectionKey::Forward => self.forward,
            DirectionKey::Left => self.left,
            DirectionKey::Backward => self.backward,
            DirectionKey::Right => self.right,
        }
    }

    fn set(&mut self, key: DirectionKey, held: bool) {
        let flag = match key {
            DirectionKey::Forward => &mut self.forward,
            DirectionKey::Left => &mut self.left,
            DirectionKey::Backward => &mut self.backward,
            DirectionKey::Right => &mut self.right,
        };
        *flag = held;
    }

    /// The combined 4-bit code, forward being the most significant bit.
    pub fn code(&self) -> u8 {
        DirectionKey::ALL
            .iter()
            .filter(|&&key| self.get(key))
            .fold(0, |acc, key| acc | key.bit())
    }
}

/// Holds the key flags and the direction they currently resolve to.
#[derive(Debug, Default, Clone)]
pub struct DirectionResolver {
    flags: DirectionalInputFlags,
    direction: Direction,
}

impl DirectionResolver {
    /// A resolver with no keys held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the direction for a set of held keys.
    pub fn resolve(flags: &DirectionalInputFlags) -> Direction {
        DIRECTION_LUT[flags.code() as usize]
    }

    /// Key-down. Returns the recomputed direction.
    pub fn press(&mut self, key: DirectionKey) -> Direction {
        self.set(key, true)
    }

    /// Key-up. Returns the recomputed direction.
    pub fn release(&mut self, key: DirectionKey) -> Direction {
        self.set(key, false)
    }

    /// Releases every key, e.g. when the window loses focus.
    pub fn release_all(&mut self) -> Direction {
        self.flags = DirectionalInputFlags::default();
        self.direction = Direction::None;
        self.direction
    }

    fn set(&mut self, key: DirectionKey, held: bool) -> Direction {
        self.flags.set(key, held);
        self.direction = Self::resolve(&self.flags);
        self.direction
    }

    /// The keys currently held.
    pub fn flags(&self) -> DirectionalInputFlags {
        self.flags
    }

    /// The direction for the keys currently held.
    pub fn direction(&self) -> Direction {
        self.direction
    }
}
