use ping_engine::{CancelToken, PingError, Pinger, PingerConfig, SocketType, StopReason};
use std::sync::Once;
use std::time::{Duration, Instant};

use more_asserts as ma;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

static SETUP: Once = Once::new();

fn setup() {
    SETUP.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::ERROR).finish();
        tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
    });
}

fn config(socket_type: SocketType) -> PingerConfig {
    PingerConfig {
        count: 3,
        interval: Duration::from_millis(100),
        timeout: Duration::from_secs(1),
        socket_type,
        ..PingerConfig::default()
    }
}

fn ping_localhost(host: &str, socket_type: SocketType) {
    setup();
    let pinger = Pinger::with_config(host, config(socket_type)).unwrap();

    pinger.run(&CancelToken::new()).unwrap();

    let statistics = pinger.statistics();
    assert_eq!(3, statistics.packets_sent);
    assert_eq!(3, statistics.packets_received);
    assert!(statistics.packet_loss.abs() < f64::EPSILON);
    ma::assert_gt!(statistics.max_rtt, Duration::ZERO);
    assert_eq!(Some(StopReason::CountReached), pinger.stop_reason());
}

#[test]
#[ignore = "requires ICMP socket permissions (net.ipv4.ping_group_range)"]
fn ping_localhost_with_dgram_socket() {
    ping_localhost("127.0.0.1", SocketType::Dgram);
}

#[test]
#[ignore = "requires ICMP socket permissions (net.ipv4.ping_group_range) and IPv6 loopback"]
fn ping_ip6_localhost_with_dgram_socket() {
    ping_localhost("::1", SocketType::Dgram);
}

/*
* Note: Raw sockets work only with root privileges.
*/
#[test]
#[ignore = "requires root"]
fn ping_localhost_with_raw_socket() {
    ping_localhost("127.0.0.1", SocketType::Raw);
}

#[test]
fn socket_setup_failure_or_run_completes() {
    setup();
    let pinger = Pinger::with_config("127.0.0.1", PingerConfig { count: 1, ..config(SocketType::Raw) }).unwrap();
    let start = Instant::now();

    // Unprivileged runs cannot open a raw socket; privileged ones ping loopback.
    match pinger.run(&CancelToken::new()) {
        Ok(()) => assert_eq!(Some(StopReason::CountReached), pinger.stop_reason()),
        Err(PingError::Socket(_)) => {
            assert_eq!(Some(StopReason::Failed), pinger.stop_reason());
            assert_eq!(0, pinger.statistics().packets_sent);
        }
        Err(e) => panic!("unexpected error {e}"),
    }
    ma::assert_lt!(start.elapsed(), Duration::from_secs(5));
}
