//! Interactive frame sender for poking a device emulator or gateway over UDP.
//!
//! Each prompt line is either raw hex bytes or CBOR diagnostic notation. The line is
//! encoded, wrapped in a frame with a 2-byte little-endian length prefix and sent as a
//! single datagram. Optionally one response is read back and printed as hex.
//!
//! The main entry point is [`Harness`], which drives the prompt loop over any
//! [`Transport`]. The [`command`], [`frame`] and [`hex`] modules expose the
//! classification and encoding steps on their own.

pub mod cbor;
pub mod command;
pub mod config;
pub mod frame;
mod harness;
pub mod hex;
mod transport;

pub use harness::{Control, Harness};
pub use transport::{Received, Transport, UdpTransport};
