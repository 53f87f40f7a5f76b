//! # SBMP
//! SBMP (Simple Binary Messaging Protocol) is a point-to-point framing and
//! messaging protocol for byte-stream transports such as UART: a
//! checksummed frame layer, a session-tagged datagram layer on top of it,
//! and an endpoint layer that handles session allocation, a two-way
//! handshake, and dispatch to registered listeners.
//!
//! ## Example
//! ```
//! use sbmp::checksum::ChecksumKind;
//! use sbmp::datagram::Datagram;
//! use sbmp::endpoint::Endpoint;
//! use sbmp::interface::Interface;
//!
//! struct LoopbackUart {
//!     wire: Vec<u8>,
//! }
//!
//! impl Interface for LoopbackUart {
//!     fn tx_byte(&mut self, byte: u8) {
//!         self.wire.push(byte);
//!     }
//! }
//!
//! fn on_message(_ep: &mut Endpoint<LoopbackUart, 128, 4>, dg: &Datagram) {
//!     println!("received type={} body={:?}", dg.kind, dg.body);
//! }
//!
//! fn main() {
//!     let mut ep: Endpoint<LoopbackUart, 128, 4> = Endpoint::new(
//!         "demo",
//!         LoopbackUart { wire: Vec::new() },
//!         128,
//!         ChecksumKind::Xor,
//!         on_message,
//!     );
//!     ep.send_message(1, b"hello");
//!     let wire = ep.hw_if().wire.clone();
//!     ep.receive(&wire);
//! }
//! ```

#![cfg_attr(not(test), allow(dead_code))]

pub mod checksum;
pub mod datagram;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod interface;

pub use checksum::ChecksumKind;
pub use datagram::Datagram;
pub use endpoint::Endpoint;
pub use error::Error;
pub use frame::Frame;
pub use handshake::HandshakeStatus;
pub use interface::Interface;
