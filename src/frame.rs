//! Frame layer: a per-byte receive state machine plus a symmetric transmit
//! API. Wire format:
//!
//! ```text
//! SOF(0x01) | CKSUM_KIND(1B) | LEN_LSB | LEN_MSB | payload[LEN] | CKSUM[0|1|4]
//! ```
//!
//! The receive side never buffers more than `CAP` payload bytes; anything
//! over that is a transport error (frame dropped, state reset to `Idle`).

use crate::checksum::{Accumulator, ChecksumKind};
use log::{trace, warn};

const SOF: u8 = 0x01;

/// State of the per-byte receive state machine. Payload-collecting states
/// carry their own progress and running checksum as associated data, per
/// the tagged-variant style over a switch on raw integers.
enum RxState {
    Idle,
    ChecksumType,
    LenLsb { kind: ChecksumKind },
    LenMsb { kind: ChecksumKind, len_lsb: u8 },
    Payload { kind: ChecksumKind, acc: Accumulator, received: usize, expected: usize },
    ChecksumBytes { kind: ChecksumKind, remaining: usize, collected: [u8; 4], idx: usize },
}

/// One frame instance: fixed receive buffer plus parser state. Backs exactly
/// one endpoint; `CAP` is the payload capacity in bytes, fixed at compile
/// time so no heap allocation is required on the receive path.
pub struct Frame<const CAP: usize> {
    state: RxState,
    buf: [u8; CAP],
    delivered_len: usize,
    rx_enabled: bool,
    tx_enabled: bool,
    tx_acc: Accumulator,
    tx_remaining: usize,
}

impl<const CAP: usize> Frame<CAP> {
    pub fn new() -> Self {
        Frame {
            state: RxState::Idle,
            buf: [0u8; CAP],
            delivered_len: 0,
            rx_enabled: true,
            tx_enabled: true,
            tx_acc: Accumulator::None,
            tx_remaining: 0,
        }
    }

    pub fn set_rx_enabled(&mut self, enabled: bool) {
        self.rx_enabled = enabled;
    }

    pub fn set_tx_enabled(&mut self, enabled: bool) {
        self.tx_enabled = enabled;
    }

    /// Reset parser state to `Idle`. Buffers are kept, not reallocated.
    pub fn reset(&mut self) {
        self.state = RxState::Idle;
    }

    /// Feed one received byte into the state machine. Returns `true` when
    /// this byte completed a valid frame; the payload is then available
    /// from `delivered_payload()` until the next call. Bytes are silently
    /// discarded while rx is disabled.
    ///
    /// Taking the payload by a follow-up call rather than a callback keeps
    /// this a plain `&mut self` method: callers that need to react to a
    /// delivered frame by mutating state the frame itself doesn't own (as
    /// the endpoint layer does) would otherwise have to re-borrow `self`
    /// from inside the callback.
    pub fn receive_byte(&mut self, byte: u8) -> bool {
        if !self.rx_enabled {
            return false;
        }

        let state = core::mem::replace(&mut self.state, RxState::Idle);
        let (next_state, delivered) = self.step(state, byte);
        self.state = next_state;

        if delivered {
            trace!("sbmp: frame delivered, len={}", self.delivered_len);
        }
        delivered
    }

    /// The payload delivered by the most recent `receive_byte` call that
    /// returned `true`. Only meaningful immediately after such a call.
    pub fn delivered_payload(&self) -> &[u8] {
        &self.buf[..self.delivered_len]
    }

    fn step(&mut self, state: RxState, byte: u8) -> (RxState, bool) {
        match state {
            RxState::Idle => {
                if byte == SOF {
                    (RxState::ChecksumType, false)
                } else {
                    (RxState::Idle, false)
                }
            }
            RxState::ChecksumType => match ChecksumKind::from_wire(byte) {
                Some(kind) => (RxState::LenLsb { kind }, false),
                None => {
                    warn!("sbmp: unknown checksum kind 0x{:02x}, dropping frame", byte);
                    (RxState::Idle, false)
                }
            },
            RxState::LenLsb { kind } => (RxState::LenMsb { kind, len_lsb: byte }, false),
            RxState::LenMsb { kind, len_lsb } => {
                let len = u16::from_le_bytes([len_lsb, byte]) as usize;
                if len == 0 {
                    self.delivered_len = 0;
                    self.begin_checksum_or_deliver(kind)
                } else if len > CAP {
                    warn!("sbmp: frame length {} exceeds capacity {}, dropping", len, CAP);
                    (RxState::Idle, false)
                } else {
                    (
                        RxState::Payload { kind, acc: Accumulator::new(kind), received: 0, expected: len },
                        false,
                    )
                }
            }
            RxState::Payload { kind, mut acc, mut received, expected } => {
                self.buf[received] = byte;
                acc.step(byte);
                received += 1;
                if received == expected {
                    self.delivered_len = expected;
                    self.begin_checksum_or_deliver(kind)
                } else {
                    (RxState::Payload { kind, acc, received, expected }, false)
                }
            }
            RxState::ChecksumBytes { kind, mut remaining, mut collected, mut idx } => {
                collected[idx] = byte;
                idx += 1;
                remaining -= 1;
                if remaining == 0 {
                    self.finish_checksum(kind, collected, idx)
                } else {
                    (RxState::ChecksumBytes { kind, remaining, collected, idx }, false)
                }
            }
        }
    }

    fn begin_checksum_or_deliver(&mut self, kind: ChecksumKind) -> (RxState, bool) {
        let trailer_len = kind.trailer_len();
        if trailer_len == 0 {
            self.finish_checksum(kind, [0; 4], 0)
        } else {
            (RxState::ChecksumBytes { kind, remaining: trailer_len, collected: [0; 4], idx: 0 }, false)
        }
    }

    fn finish_checksum(&mut self, kind: ChecksumKind, collected: [u8; 4], collected_len: usize) -> (RxState, bool) {
        let mut acc = Accumulator::new(kind);
        for &b in &self.buf[..self.delivered_len] {
            acc.step(b);
        }
        let expected = acc.trailer_bytes();
        let matches = expected.as_slice() == &collected[..collected_len];

        if matches {
            (RxState::Idle, true)
        } else {
            warn!("sbmp: checksum mismatch, dropping frame");
            (RxState::Idle, false)
        }
    }

    /// Begin a transmit: writes the header (SOF, checksum kind, length) and
    /// primes the running checksum. Returns `false` without writing if tx is
    /// disabled.
    pub fn start(&mut self, kind: ChecksumKind, len: u16, mut write: impl FnMut(u8)) -> bool {
        if !self.tx_enabled {
            return false;
        }
        write(SOF);
        write(kind.to_wire());
        let len_bytes = len.to_le_bytes();
        write(len_bytes[0]);
        write(len_bytes[1]);
        self.tx_acc = Accumulator::new(kind);
        self.tx_remaining = len as usize;
        if self.tx_remaining == 0 {
            self.flush_trailer(&mut write);
        }
        true
    }

    /// Send one body byte. Flushes the checksum trailer automatically once
    /// the declared length has been reached. Returns `false` (no byte
    /// written) if tx is disabled or the frame has no more body bytes
    /// expected.
    pub fn send_byte(&mut self, byte: u8, mut write: impl FnMut(u8)) -> bool {
        if !self.tx_enabled || self.tx_remaining == 0 {
            return false;
        }
        write(byte);
        self.tx_acc.step(byte);
        self.tx_remaining -= 1;
        if self.tx_remaining == 0 {
            self.flush_trailer(&mut write);
        }
        true
    }

    /// Send a whole buffer of body bytes in one call.
    pub fn send_buffer(&mut self, bytes: &[u8], mut write: impl FnMut(u8)) -> bool {
        if !self.tx_enabled {
            return false;
        }
        for &b in bytes {
            if !self.send_byte(b, &mut write) {
                return false;
            }
        }
        true
    }

    fn flush_trailer(&mut self, write: &mut impl FnMut(u8)) {
        for &b in self.tx_acc.trailer_bytes().as_slice() {
            write(b);
        }
    }
}

impl<const CAP: usize> Default for Frame<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deliver_bytes<const CAP: usize>(frame: &mut Frame<CAP>, bytes: &[u8]) -> Option<Vec<u8>> {
        let mut delivered = None;
        for &b in bytes {
            if frame.receive_byte(b) {
                delivered = Some(frame.delivered_payload().to_vec());
            }
        }
        delivered
    }

    #[test]
    fn clean_frame_xor() {
        let mut frame: Frame<64> = Frame::new();
        let bytes = [0x01, 0x01, 0x03, 0x00, 0xaa, 0xbb, 0xcc, 0x15];
        let delivered = deliver_bytes(&mut frame, &bytes);
        assert_eq!(delivered, Some(vec![0xaa, 0xbb, 0xcc]));
    }

    #[test]
    fn corrupted_checksum_is_dropped_and_frame_recovers() {
        let mut frame: Frame<64> = Frame::new();
        let bad = [0x01, 0x01, 0x03, 0x00, 0xaa, 0xbb, 0xcc, 0x14];
        assert_eq!(deliver_bytes(&mut frame, &bad), None);

        // The parser must be back at Idle and ready for the next SOF.
        let good = [0x01, 0x01, 0x03, 0x00, 0xaa, 0xbb, 0xcc, 0x15];
        assert_eq!(deliver_bytes(&mut frame, &good), Some(vec![0xaa, 0xbb, 0xcc]));
    }

    #[test]
    fn zero_length_payload_is_delivered() {
        let mut frame: Frame<64> = Frame::new();
        let bytes = [0x01, 0x00, 0x00, 0x00];
        assert_eq!(deliver_bytes(&mut frame, &bytes), Some(vec![]));
    }

    #[test]
    fn unknown_checksum_kind_drops_frame() {
        let mut frame: Frame<64> = Frame::new();
        let bytes = [0x01, 0x02, 0x00, 0x00];
        assert_eq!(deliver_bytes(&mut frame, &bytes), None);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let mut frame: Frame<4> = Frame::new();
        let bytes = [0x01, 0x00, 0x05, 0x00];
        assert_eq!(deliver_bytes(&mut frame, &bytes), None);
    }

    #[test]
    fn garbage_bytes_outside_a_frame_are_discarded() {
        let mut frame: Frame<64> = Frame::new();
        assert_eq!(deliver_bytes(&mut frame, &[0xff, 0x02, 0x10]), None);
        let bytes = [0x01, 0x00, 0x00, 0x00];
        assert_eq!(deliver_bytes(&mut frame, &bytes), Some(vec![]));
    }

    #[test]
    fn transmit_then_receive_round_trips_xor() {
        let mut tx: Frame<64> = Frame::new();
        let mut wire = Vec::new();
        let payload = [1u8, 2, 3, 4, 5];
        tx.start(ChecksumKind::Xor, payload.len() as u16, |b| wire.push(b));
        tx.send_buffer(&payload, |b| wire.push(b));

        let mut rx: Frame<64> = Frame::new();
        assert_eq!(deliver_bytes(&mut rx, &wire), Some(payload.to_vec()));
    }

    #[test]
    fn transmit_then_receive_round_trips_crc32() {
        let mut tx: Frame<64> = Frame::new();
        let mut wire = Vec::new();
        let payload = [9u8, 8, 7, 6];
        tx.start(ChecksumKind::Crc32, payload.len() as u16, |b| wire.push(b));
        tx.send_buffer(&payload, |b| wire.push(b));

        let mut rx: Frame<64> = Frame::new();
        assert_eq!(deliver_bytes(&mut rx, &wire), Some(payload.to_vec()));
    }

    #[test]
    fn disabled_tx_writes_nothing() {
        let mut tx: Frame<64> = Frame::new();
        tx.set_tx_enabled(false);
        let mut wire = Vec::new();
        assert!(!tx.start(ChecksumKind::None, 0, |b| wire.push(b)));
        assert!(wire.is_empty());
    }

    #[test]
    fn disabled_rx_discards_bytes() {
        let mut frame: Frame<64> = Frame::new();
        frame.set_rx_enabled(false);
        let bytes = [0x01, 0x01, 0x03, 0x00, 0xaa, 0xbb, 0xcc, 0x15];
        assert_eq!(deliver_bytes(&mut frame, &bytes), None);
    }
}
