pub(crate) use correlation::CorrelationTable;
pub(crate) use icmp::socket::Socket;
pub(crate) use icmp::{EchoSocket, IcmpVersion};
pub use icmp::TSocket;
pub use identity::{Identity, IdentityAllocator};
pub(crate) use ping_receiver::{OnReceive, PingReceiver};
pub(crate) use ping_sender::{PingSender, SendSchedule};
pub use resolver::{resolve, resolve_with, HostLookup, SystemLookup};
pub(crate) use run_progress::{Outcome, RunProgress};
pub(crate) use statistics_aggregator::StatisticsAggregator;
pub(crate) use timeout_sweeper::TimeoutSweeper;

mod correlation;
pub(crate) mod icmp;
mod identity;
mod ping_receiver;
mod ping_sender;
mod records;
mod resolver;
mod run_progress;
mod statistics_aggregator;
mod timeout_sweeper;
