#![warn(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

//! An ICMP echo ("ping") engine.
//!
//! A [`Pinger`] resolves its target once, then [`Pinger::run`] drives three background threads
//! (transmitter, receiver and timeout sweep) until the configured count is answered or timed
//! out, the run is stopped, or an external [`CancelToken`] fires. [`Pinger::statistics`] can be
//! read at any time.

pub use cancel_token::CancelToken;
pub use details::{resolve, resolve_with, HostLookup, Identity, IdentityAllocator, SystemLookup, TSocket};
pub use ping_error::{LookupError, LookupErrorKind, PingError, PingResult};
pub use pinger::{Pinger, RunState, StopHandle, StopReason};
pub use pinger_config::{AddressFamily, PingerConfig, SocketType, MAX_PAYLOAD_SIZE};
pub use statistics::{Sample, Statistics};

mod cancel_token;
mod details;
mod ping_error;
mod pinger;
mod pinger_config;
mod statistics;
