use benjamin::{
    config::{LinkConfig, RemoteConfig},
    direction::{Direction, DirectionKey, DirectionResolver},
    link_session::{LinkError, LinkSession, LinkStatus},
    occupancy_grid::OccupancyGrid,
    periodic::{PeriodicReceiver, PeriodicTransmitter, ReceiveError},
    simulated_transport::{SimulatedTransport, TransportCall},
    transport::TransportError,
};
use std::{
    thread,
    time::{Duration, Instant},
};

const ROBOT: &str = "F7:6D:E3:5F:CB:F9";

#[test]
fn drive_and_watch_then_disconnect() {
    let config = RemoteConfig::default();
    let transport = SimulatedTransport::builder().advertise(ROBOT).build();
    let mut session = LinkSession::new(transport, config.link.clone());
    let mut grid = OccupancyGrid::new(config.grid);
    let mut resolver = DirectionResolver::new();
    let mut tx = PeriodicTransmitter::new(config.link.transmit_period());
    let mut rx = PeriodicReceiver::new(config.link.poll_period());

    session.toggle().unwrap();
    assert_eq!(session.status(), LinkStatus::Connected);
    assert_eq!(session.channels().len(), 3);

    let start = Instant::now();
    resolver.press(DirectionKey::Backward);
    resolver.press(DirectionKey::Right);
    assert_eq!(resolver.direction(), Direction::SouthEast);
    assert_eq!(tx.poll(start, &mut session, resolver.direction()), Ok(true));

    session.transport().notify(b"b'0&0&'");
    session.transport().notify(b"b'1&1000&'");
    assert!(rx.poll(start, &mut session, &mut grid).unwrap().is_some());
    // Not due yet, the second reading waits
    assert_eq!(
        rx.poll(start + Duration::from_millis(5), &mut session, &mut grid),
        Ok(None)
    );
    let second = rx
        .poll(start + Duration::from_millis(10), &mut session, &mut grid)
        .unwrap()
        .unwrap();
    assert_eq!((second.column, second.depth), (1, 0));
    assert_eq!(grid.column_depth(0), 20);

    resolver.release_all();
    assert_eq!(
        tx.poll(start + Duration::from_millis(80), &mut session, resolver.direction()),
        Ok(true)
    );

    session.toggle().unwrap();
    assert_eq!(
        session.transitions(),
        &[
            LinkStatus::Disconnected,
            LinkStatus::Connecting,
            LinkStatus::Connected,
            LinkStatus::Disconnecting,
            LinkStatus::Disconnected,
        ]
    );
    assert_eq!(session.transport().written(), vec![b"4".to_vec(), b"0".to_vec()]);

    // Nothing reaches the radio once disconnected
    let calls = session.transport().calls().len();
    assert_eq!(
        tx.poll(start + Duration::from_secs(1), &mut session, Direction::North),
        Ok(false)
    );
    assert_eq!(rx.tick(&mut session, &mut grid), Ok(None));
    assert_eq!(session.transport().calls().len(), calls);
    assert_eq!(
        session.transport().calls().last(),
        Some(&TransportCall::Disconnect)
    );
}

#[test]
fn sweeping_radar_fills_columns_in_order() {
    let config = RemoteConfig::default();
    let transport = SimulatedTransport::builder()
        .advertise(ROBOT)
        .sweep(Duration::from_millis(1), config.grid.columns, 1000)
        .build();
    let mut session = LinkSession::new(transport, config.link.clone());
    let mut grid = OccupancyGrid::new(config.grid);
    let mut rx = PeriodicReceiver::new(config.link.poll_period());
    session.connect().unwrap();

    let mut columns = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    while columns.len() < 5 && Instant::now() < deadline {
        if let Some(update) = rx.tick(&mut session, &mut grid).unwrap() {
            assert!(update.depth <= grid.rows());
            columns.push(update.column);
        } else {
            thread::sleep(Duration::from_millis(1));
        }
    }
    assert_eq!(columns, vec![0, 1, 2, 3, 4]);

    session.disconnect().unwrap();
    assert_eq!(session.status(), LinkStatus::Disconnected);
}

#[test]
fn lost_robot_ends_up_disconnected() {
    let transport = SimulatedTransport::builder().advertise(ROBOT).build();
    let mut session = LinkSession::new(transport, LinkConfig::default());
    let mut grid = OccupancyGrid::default();
    let mut rx = PeriodicReceiver::new(Duration::from_millis(10));
    session.connect().unwrap();

    session.transport().notify(b"b'3&250&'");
    session.transport().drop_link();

    // The queued reading still arrives before the drop is noticed
    assert!(rx.tick(&mut session, &mut grid).unwrap().is_some());
    assert_eq!(
        rx.tick(&mut session, &mut grid),
        Err(ReceiveError::Link(LinkError::Transport(
            TransportError::NotificationsClosed
        )))
    );
    assert_eq!(session.status(), LinkStatus::Disconnected);
    assert_eq!(grid.column_depth(3), 15);

    // And it can come back
    session.connect().unwrap();
    assert!(session.is_connected());
}

#[test]
fn robot_out_of_range_times_out() {
    let transport = SimulatedTransport::builder()
        .advertise("00:11:22:33:44:55")
        .build();
    let mut session = LinkSession::new(transport, LinkConfig::default());
    assert_eq!(session.toggle(), Err(LinkError::DiscoveryTimeout));
    assert_eq!(session.status(), LinkStatus::Disconnected);
    assert_eq!(session.transport().calls(), vec![TransportCall::Discover]);
}
