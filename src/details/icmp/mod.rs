pub(crate) mod echo;
mod echo_socket;
mod sequence_number;
pub(crate) mod socket;

pub(crate) use echo::{EchoKind, IcmpVersion};
pub(crate) use echo_socket::EchoSocket;
pub(crate) use sequence_number::SequenceNumber;
pub use socket::TSocket;
