//! Connects to Benjamin and prints every radar reading it sends, without
//! driving it. Handy for checking the radar firmware on its own.

use benjamin::{
    args::MonitorArgs,
    ble_transport::BleTransport,
    config::RemoteConfig,
    link_session::{LinkError, LinkSession},
    occupancy_grid::OccupancyGrid,
    periodic::PeriodicReceiver,
    simulated_transport::demo_robot,
    transport::Transport,
};
use clap::Parser;
use log::{info, warn};
use std::{
    error::Error,
    time::{Duration, Instant},
};

// Example:
// RUST_LOG=debug cargo run --bin radar-monitor -- --duration 10

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = MonitorArgs::parse();

    let config = args.link.load_config()?;
    if args.link.dump_config {
        println!("{}", config.to_ron()?);
        return Ok(());
    }

    if args.link.simulate {
        run(demo_robot(&config), &config, &args)
    } else {
        run(BleTransport::new()?, &config, &args)
    }
}

fn run<T: Transport>(
    mut transport: T,
    config: &RemoteConfig,
    args: &MonitorArgs,
) -> Result<(), Box<dyn Error>> {
    if args.link.scan {
        for advertisement in transport.scan(config.link.scan_timeout())? {
            println!("{}", advertisement);
        }
        return Ok(());
    }
    monitor(transport, config, args.duration)?;
    Ok(())
}

fn monitor<T: Transport>(
    transport: T,
    config: &RemoteConfig,
    duration: Option<Duration>,
) -> Result<(), LinkError> {
    let mut session = LinkSession::new(transport, config.link.clone());
    session.connect()?;

    let mut grid = OccupancyGrid::new(config.grid);
    let mut receiver = PeriodicReceiver::new(config.link.poll_period());
    let start = Instant::now();
    let mut n_samples = 0;

    while session.is_connected() {
        if duration.is_some_and(|d| start.elapsed() >= d) {
            break;
        }
        match receiver.tick(&mut session, &mut grid) {
            Ok(Some(update)) => {
                n_samples += 1;
                println!(
                    "Column: {}  Distance: {}  Depth: {}",
                    update.column, update.distance, update.depth
                );
            }
            Ok(None) => {}
            Err(e) => warn!("{}", e),
        }
        spin_sleep::sleep(receiver.period());
    }

    info!(
        "received {} samples in {:.1} s",
        n_samples,
        start.elapsed().as_secs_f64()
    );
    if session.is_connected() {
        session.disconnect()?;
    }
    Ok(())
}
