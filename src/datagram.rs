//! Datagram layer: interprets a frame payload as `[session:2][type:1][body:..]`.
//! A `Datagram` never owns its bytes — it borrows the frame's receive buffer
//! for the lifetime of one upstream callback. Listeners that need to retain
//! the body past their callback must copy it out.

use crate::checksum::ChecksumKind;
use crate::frame::Frame;

/// Header size in bytes: 2-byte session, 1-byte type.
pub const HEADER_LEN: usize = 3;

/// A borrowed view over a frame payload, interpreted as a datagram.
#[derive(Debug, Clone, Copy)]
pub struct Datagram<'a> {
    pub session: u16,
    pub kind: u8,
    pub body: &'a [u8],
}

impl<'a> Datagram<'a> {
    /// Parse a frame payload. Fails (returns `None`) when the payload is
    /// shorter than the 3-byte header — a protocol error per the frame
    /// layer's delivery contract.
    pub fn parse(payload: &'a [u8]) -> Option<Self> {
        if payload.len() < HEADER_LEN {
            return None;
        }
        let session = u16::from_le_bytes([payload[0], payload[1]]);
        let kind = payload[2];
        Some(Datagram { session, kind, body: &payload[HEADER_LEN..] })
    }

    pub fn origin(&self) -> bool {
        self.session & 0x8000 != 0
    }
}

/// Begin transmitting a datagram: starts the underlying frame with
/// `HEADER_LEN + body_len` total bytes, then writes the 3-byte datagram
/// header. Body bytes follow via `Frame::send_byte` / `Frame::send_buffer`.
pub fn start<const CAP: usize>(
    frame: &mut Frame<CAP>,
    kind: ChecksumKind,
    session: u16,
    datagram_type: u8,
    body_len: u16,
    mut write: impl FnMut(u8),
) -> bool {
    let total_len = body_len.checked_add(HEADER_LEN as u16);
    let total_len = match total_len {
        Some(len) => len,
        None => return false,
    };
    if !frame.start(kind, total_len, &mut write) {
        return false;
    }
    let session_bytes = session.to_le_bytes();
    frame.send_byte(session_bytes[0], &mut write);
    frame.send_byte(session_bytes[1], &mut write);
    frame.send_byte(datagram_type, &mut write);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_short_payload() {
        assert!(Datagram::parse(&[0x00, 0x80]).is_none());
        assert!(Datagram::parse(&[]).is_none());
    }

    #[test]
    fn parse_extracts_session_type_and_body() {
        let payload = [0x34, 0x12, 0x05, 0xaa, 0xbb];
        let dg = Datagram::parse(&payload).unwrap();
        assert_eq!(dg.session, 0x1234);
        assert_eq!(dg.kind, 0x05);
        assert_eq!(dg.body, &[0xaa, 0xbb]);
    }

    #[test]
    fn origin_bit_is_top_bit_of_session() {
        let dg = Datagram { session: 0x8000, kind: 0, body: &[] };
        assert!(dg.origin());
        let dg = Datagram { session: 0x7fff, kind: 0, body: &[] };
        assert!(!dg.origin());
    }

    #[test]
    fn start_then_body_round_trips_through_frame_receive() {
        let mut tx: Frame<64> = Frame::new();
        let mut wire = Vec::new();
        let body = [1u8, 2, 3];
        start(&mut tx, ChecksumKind::Xor, 0xbeef, 7, body.len() as u16, |b| wire.push(b));
        tx.send_buffer(&body, |b| wire.push(b));

        let mut rx: Frame<64> = Frame::new();
        let mut delivered = None;
        for &b in &wire {
            if rx.receive_byte(b) {
                delivered = Some(rx.delivered_payload().to_vec());
            }
        }
        let payload = delivered.unwrap();
        let dg = Datagram::parse(&payload).unwrap();
        assert_eq!(dg.session, 0xbeef);
        assert_eq!(dg.kind, 7);
        assert_eq!(dg.body, &body);
    }
}
