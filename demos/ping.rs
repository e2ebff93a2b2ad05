use ping_engine::{CancelToken, Pinger, PingerConfig, SocketType};
use std::time::Duration;

type GenericError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(argh::FromArgs)]
/// ping - send ICMP ECHO_REQUEST to a host
struct Args {
    #[argh(option, short = 'c', default = "0")]
    /// stop after <count> requests, 0 pings until the deadline
    count: u64,

    #[argh(option, short = 'i', default = "1000")]
    /// milliseconds between requests
    interval: u64,

    #[argh(option, short = 'W', default = "1000")]
    /// milliseconds to wait for each reply
    timeout: u64,

    #[argh(option, short = 'w')]
    /// stop after <deadline> seconds
    deadline: Option<u64>,

    #[argh(option, short = 's', default = "56")]
    /// payload size in bytes
    size: usize,

    #[argh(option, short = 'n', default = "String::from(\"ip\")")]
    /// network: ip, ip4 or ip6
    network: String,

    #[argh(switch)]
    /// use a raw socket (requires root)
    raw: bool,

    #[argh(switch, short = 'v')]
    /// trace logging
    verbose: bool,

    #[argh(positional)]
    /// host name or IP address
    host: String,
}

fn main() -> Result<(), GenericError> {
    let args: Args = argh::from_env();

    let level = if args.verbose { tracing::Level::TRACE } else { tracing::Level::WARN };
    let subscriber = tracing_subscriber::FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = PingerConfig {
        family: ping_engine::AddressFamily::from_network(&args.network)?,
        count: args.count,
        interval: Duration::from_millis(args.interval),
        timeout: Duration::from_millis(args.timeout),
        deadline: args.deadline.map(Duration::from_secs),
        payload_size: args.size,
        socket_type: if args.raw { SocketType::Raw } else { SocketType::Dgram },
        ..PingerConfig::default()
    };
    let mut pinger = Pinger::with_config(&args.host, config)?;
    pinger.set_on_receive(|sample| {
        let ttl = sample.ttl.map_or_else(String::new, |ttl| format!(" ttl={ttl}"));
        println!(
            "{} bytes from {}: icmp_seq={}{} time={:?}",
            sample.package_size, sample.ip_addr, sample.sequence_number, ttl, sample.rtt
        );
    });

    println!("PING {} ({}) {} bytes of data.", pinger.host(), pinger.resolved_address(), args.size);
    pinger.run(&CancelToken::new())?;

    let statistics = pinger.statistics();
    println!("--- {} ping statistics ---", pinger.host());
    println!(
        "{} packets transmitted, {} received, {} duplicates, {:.1}% packet loss",
        statistics.packets_sent, statistics.packets_received, statistics.packets_duplicated, statistics.packet_loss
    );
    if statistics.packets_received > 0 {
        println!(
            "rtt min/avg/max/mdev = {:?}/{:?}/{:?}/{:?}",
            statistics.min_rtt, statistics.avg_rtt, statistics.max_rtt, statistics.std_dev_rtt
        );
    }
    Ok(())
}
