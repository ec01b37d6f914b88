//! Benjamin is a small two-wheeled robot with a sweeping ultrasonic radar.
//! This crate is the host side: a remote that drives Benjamin from the
//! keyboard over Bluetooth LE and draws what its radar sees.
//!
//! The pieces, leaves first:
//!
//! - [`ranging_decoder`] turns radar notifications (`XX<position>&<distance>&`)
//!   into [`RangingSample`](ranging_decoder::RangingSample)s.
//! - [`occupancy_grid`] keeps the radar picture, one column per sweep position.
//! - [`direction`] turns the four held movement keys into one of nine
//!   directions.
//! - [`link_session`] owns the connection: scanning for Benjamin's address,
//!   connecting, disconnecting, and the status in between.
//! - [`periodic`] holds the transmitter that sends the current direction
//!   every 80 ms and the receiver that polls for radar readings every 10 ms.
//! - [`transport`] is the boundary to the radio, implemented by
//!   [`ble_transport`] for real hardware and [`simulated_transport`] for
//!   tests and demos.
//! - [`gui`] is the terminal front end.
//!
//! Run the remote with `cargo run --bin benjamin-remote -- --simulate` to try
//! it without a robot. Logging goes through [`log`]; set `RUST_LOG` and send
//! stderr somewhere other than the terminal the remote is drawing on.

#![warn(missing_docs)]
pub mod args;
pub mod ble_transport;
pub mod config;
pub mod direction;
pub mod gui;
pub mod link_session;
pub mod occupancy_grid;
pub mod periodic;
pub mod ranging_decoder;
pub mod simulated_transport;
pub mod transport;
