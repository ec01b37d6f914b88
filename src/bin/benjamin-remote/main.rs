//! The Benjamin remote: drive with W/A/S/D, connect with C, quit with Q.

use benjamin::{
    args::RemoteArgs,
    ble_transport::BleTransport,
    config::RemoteConfig,
    gui::{remote_console, RemoteApp, RemoteGuiError},
    link_session::LinkSession,
    simulated_transport::demo_robot,
    transport::Transport,
};
use clap::Parser;
use log::info;
use std::error::Error;

// Example:
// RUST_LOG=info cargo run --bin benjamin-remote -- --simulate 2> remote.log

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = RemoteArgs::parse();

    let config = args.link.load_config()?;
    if args.link.dump_config {
        println!("{}", config.to_ron()?);
        return Ok(());
    }

    if args.link.simulate {
        info!("using a simulated robot at {}", config.link.target_address);
        run(demo_robot(&config), &config, args.link.scan)?;
    } else {
        run_ble(&config, args.link.scan)?;
    }
    Ok(())
}

fn run_ble(config: &RemoteConfig, scan: bool) -> Result<(), RemoteGuiError> {
    run(BleTransport::new()?, config, scan)
}

fn run<T: Transport>(
    mut transport: T,
    config: &RemoteConfig,
    scan: bool,
) -> Result<(), RemoteGuiError> {
    if scan {
        for advertisement in transport.scan(config.link.scan_timeout())? {
            println!("{}", advertisement);
        }
        return Ok(());
    }
    let session = LinkSession::new(transport, config.link.clone());
    remote_console(RemoteApp::new(session, config))
}
