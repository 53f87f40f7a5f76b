//! Endpoint layer: owns the session counter, origin bit, handshake state
//! machine, listener table and peer parameters, and dispatches incoming
//! datagrams to listeners, the handshake machine, or a default handler.

use crate::checksum::ChecksumKind;
use crate::datagram::{self, Datagram, HEADER_LEN};
use crate::error::Error;
use crate::frame::Frame;
use crate::handshake::{self, HandshakeStatus};
use crate::interface::Interface;
use log::{debug, error, trace, warn};

struct ListenerSlot<T, const CAP: usize, const SLOTS: usize> {
    session: u16,
    callback: fn(&mut Endpoint<T, CAP, SLOTS>, &Datagram),
}

/// A single SBMP endpoint. `CAP` is the receive payload capacity in bytes;
/// `SLOTS` is the number of session-listener slots. Both are fixed at
/// compile time, matching the "caller provides all buffers" embedded
/// profile — there is no required heap allocation in this type.
pub struct Endpoint<T, const CAP: usize, const SLOTS: usize> {
    name: &'static str,
    hw_if: T,
    frame: Frame<CAP>,
    session_counter: u16,
    origin: bool,
    own_buffer_size: u16,
    peer_buffer_size: u16,
    own_pref_cksum: ChecksumKind,
    peer_pref_cksum: ChecksumKind,
    hsk_status: HandshakeStatus,
    hsk_session: u16,
    listeners: [Option<ListenerSlot<T, CAP, SLOTS>>; SLOTS],
    default_handler: fn(&mut Endpoint<T, CAP, SLOTS>, &Datagram),
}

impl<T: Interface, const CAP: usize, const SLOTS: usize> Endpoint<T, CAP, SLOTS> {
    /// Construct an endpoint around a host interface. `own_buffer_size` is
    /// what this endpoint advertises during the handshake (typically `CAP`,
    /// but a caller may advertise less). `name` is used only to scope log
    /// messages.
    pub fn new(
        name: &'static str,
        hw_if: T,
        own_buffer_size: u16,
        own_pref_cksum: ChecksumKind,
        default_handler: fn(&mut Self, &Datagram),
    ) -> Self {
        Endpoint {
            name,
            hw_if,
            frame: Frame::new(),
            session_counter: 0,
            origin: false,
            own_buffer_size,
            peer_buffer_size: 0xffff,
            own_pref_cksum,
            peer_pref_cksum: ChecksumKind::Xor,
            hsk_status: HandshakeStatus::NotStarted,
            hsk_session: 0,
            listeners: [(); SLOTS].map(|_| None),
            default_handler,
        }
    }

    /// Clears handshake, session and listener state and resets the owned
    /// frame parser. Buffers are kept, not reallocated. The origin bit and
    /// own preferred checksum are caller-configured and survive a reset.
    pub fn reset(&mut self) {
        self.frame.reset();
        self.session_counter = 0;
        self.peer_buffer_size = 0xffff;
        self.peer_pref_cksum = ChecksumKind::Xor;
        self.hsk_status = HandshakeStatus::NotStarted;
        self.hsk_session = 0;
        for slot in self.listeners.iter_mut() {
            *slot = None;
        }
    }

    pub fn set_origin(&mut self, origin: bool) {
        self.origin = origin;
    }

    pub fn set_preferred_checksum(&mut self, kind: ChecksumKind) {
        self.own_pref_cksum = kind;
    }

    pub fn set_rx_enabled(&mut self, enabled: bool) {
        self.frame.set_rx_enabled(enabled);
    }

    pub fn set_tx_enabled(&mut self, enabled: bool) {
        self.frame.set_tx_enabled(enabled);
    }

    /// Seeds the 15-bit session counter. The caller is responsible for the
    /// top bit; only the low 15 bits of `seed` are kept.
    pub fn set_session_seed(&mut self, seed: u16) {
        self.session_counter = seed & 0x7fff;
    }

    pub fn origin(&self) -> bool {
        self.origin
    }

    pub fn peer_buffer_size(&self) -> u16 {
        self.peer_buffer_size
    }

    pub fn handshake_status(&self) -> HandshakeStatus {
        self.hsk_status
    }

    pub fn hw_if(&self) -> &T {
        &self.hw_if
    }

    pub fn hw_if_mut(&mut self) -> &mut T {
        &mut self.hw_if
    }

    /// Allocates the next locally-owned session number: the 15-bit counter
    /// OR'd with the origin bit in position 15, then advances the counter,
    /// wrapping to 0 past `0x7FFF`.
    pub fn next_session(&mut self) -> u16 {
        let counter = self.session_counter;
        let session = counter | ((self.origin as u16) << 15);
        self.session_counter = if counter >= 0x7fff { 0 } else { counter + 1 };
        session
    }

    fn effective_checksum(kind: ChecksumKind) -> ChecksumKind {
        if kind == ChecksumKind::Crc32 && !ChecksumKind::Crc32.is_available() {
            error!("sbmp: CRC32 requested but not compiled in, downgrading to XOR");
            ChecksumKind::Xor
        } else {
            kind
        }
    }

    fn effective_peer_checksum(&self) -> ChecksumKind {
        Self::effective_checksum(self.peer_pref_cksum)
    }

    fn handshake_payload(&self) -> [u8; handshake::PAYLOAD_LEN] {
        let cksum = Self::effective_checksum(self.own_pref_cksum);
        let buf = self.own_buffer_size.to_le_bytes();
        [cksum.to_wire(), buf[0], buf[1]]
    }

    fn apply_peer_handshake_payload(&mut self, body: &[u8]) {
        if body.len() < handshake::PAYLOAD_LEN {
            return;
        }
        self.peer_pref_cksum = ChecksumKind::from_wire(body[0]).unwrap_or(ChecksumKind::Xor);
        self.peer_buffer_size = u16::from_le_bytes([body[1], body[2]]);
    }

    fn send_raw_datagram(&mut self, cksum: ChecksumKind, session: u16, kind: u8, body: &[u8]) -> bool {
        let frame = &mut self.frame;
        let hw_if = &mut self.hw_if;
        if !datagram::start(frame, cksum, session, kind, body.len() as u16, |b| hw_if.tx_byte(b)) {
            return false;
        }
        frame.send_buffer(body, |b| hw_if.tx_byte(b))
    }

    fn stream_body(&mut self, body: &[u8]) -> usize {
        let frame = &mut self.frame;
        let hw_if = &mut self.hw_if;
        if frame.send_buffer(body, |b| hw_if.tx_byte(b)) {
            body.len()
        } else {
            0
        }
    }

    /// Starts (from any state) a new handshake: allocates a fresh session,
    /// sends `HSK_START`, and moves to `AwaitReply`. Reverts to
    /// `NotStarted` if the send fails.
    pub fn start_handshake(&mut self) -> bool {
        self.hsk_status = HandshakeStatus::NotStarted;
        let session = self.next_session();
        let payload = self.handshake_payload();
        let cksum = Self::effective_checksum(self.own_pref_cksum);
        if self.send_raw_datagram(cksum, session, handshake::HSK_START, &payload) {
            debug!("sbmp[{}]: handshake started, session={:#06x}", self.name, session);
            self.hsk_session = session;
            self.hsk_status = HandshakeStatus::AwaitReply;
            true
        } else {
            warn!("sbmp[{}]: failed to send HSK_START", self.name);
            false
        }
    }

    pub fn abort_handshake(&mut self) {
        self.hsk_session = 0;
        self.hsk_status = HandshakeStatus::NotStarted;
    }

    fn on_hsk_start(&mut self, dg: &Datagram) {
        if self.hsk_status == HandshakeStatus::AwaitReply {
            // Simultaneous initiation: both sides started a handshake at
            // once. Neither side can trust the other's origin assignment,
            // so both back off to CONFLICT and the caller must retry.
            warn!("sbmp[{}]: simultaneous handshake, session={:#06x}", self.name, dg.session);
            let cksum = self.effective_peer_checksum();
            self.send_raw_datagram(cksum, dg.session, handshake::HSK_CONFLICT, &[]);
            self.hsk_status = HandshakeStatus::Conflict;
            return;
        }

        // NOTE: this also fires when hsk_status is already SUCCESS — the
        // endpoint silently re-negotiates (overwrites peer info, flips
        // origin) rather than rejecting the re-handshake; see DESIGN.md.
        self.origin = !dg.origin();
        self.apply_peer_handshake_payload(dg.body);
        let cksum = self.effective_peer_checksum();
        let payload = self.handshake_payload();
        self.send_raw_datagram(cksum, dg.session, handshake::HSK_ACCEPT, &payload);
        self.hsk_status = HandshakeStatus::Success;
        debug!(
            "sbmp[{}]: handshake accepted session={:#06x}, origin={}",
            self.name, dg.session, self.origin as u8
        );
    }

    fn on_hsk_accept(&mut self, dg: &Datagram) {
        if self.hsk_status == HandshakeStatus::AwaitReply && dg.session == self.hsk_session {
            self.apply_peer_handshake_payload(dg.body);
            self.hsk_status = HandshakeStatus::Success;
            debug!("sbmp[{}]: handshake succeeded, session={:#06x}", self.name, dg.session);
        } else {
            warn!(
                "sbmp[{}]: ignoring unexpected HSK_ACCEPT for session {:#06x}",
                self.name, dg.session
            );
        }
    }

    fn on_hsk_conflict(&mut self, dg: &Datagram) {
        if self.hsk_status == HandshakeStatus::AwaitReply && dg.session == self.hsk_session {
            self.frame.reset();
            self.hsk_status = HandshakeStatus::Conflict;
            warn!("sbmp[{}]: handshake conflict, session={:#06x}", self.name, dg.session);
        } else {
            warn!(
                "sbmp[{}]: ignoring unexpected HSK_CONFLICT for session {:#06x}",
                self.name, dg.session
            );
        }
    }

    /// Fills the first empty listener slot. Returns `false` (no mutation)
    /// if the table is full.
    pub fn add_listener(&mut self, session: u16, callback: fn(&mut Self, &Datagram)) -> bool {
        for slot in self.listeners.iter_mut() {
            if slot.is_none() {
                *slot = Some(ListenerSlot { session, callback });
                return true;
            }
        }
        false
    }

    /// Clears the first listener slot matching `session`. Duplicate
    /// registrations for the same session are not detected or guarded
    /// against; only the first match is removed (see DESIGN.md).
    pub fn remove_listener(&mut self, session: u16) -> bool {
        for slot in self.listeners.iter_mut() {
            if matches!(slot, Some(s) if s.session == session) {
                *slot = None;
                return true;
            }
        }
        false
    }

    fn find_listener(&self, session: u16) -> Option<fn(&mut Self, &Datagram)> {
        self.listeners
            .iter()
            .flatten()
            .find(|slot| slot.session == session)
            .map(|slot| slot.callback)
    }

    /// Starts a response datagram on an already-known session. Rejects with
    /// `false` (no bytes written) if `length` would exceed what the peer
    /// advertised it can receive. Body bytes must then be streamed through
    /// the frame's `send_byte`/`send_buffer`, or use `send_response`/
    /// `send_message` for the combined call.
    pub fn start_response(&mut self, kind: u8, length: u16, session: u16) -> bool {
        let max_body = match self.peer_buffer_size.checked_sub(HEADER_LEN as u16) {
            Some(v) => v,
            None => return false,
        };
        if length > max_body {
            return false;
        }
        let cksum = self.effective_peer_checksum();
        let frame = &mut self.frame;
        let hw_if = &mut self.hw_if;
        datagram::start(frame, cksum, session, kind, length, |b| hw_if.tx_byte(b))
    }

    /// Allocates a fresh session and starts a response on it. Returns the
    /// allocated session on success, `None` if the message would exceed the
    /// peer's advertised buffer.
    pub fn start_session(&mut self, kind: u8, length: u16) -> Option<u16> {
        let session = self.next_session();
        if self.start_response(kind, length, session) {
            Some(session)
        } else {
            None
        }
    }

    /// Starts and streams a complete response body on a known session.
    /// Returns the number of body bytes accepted by the transmit path: 0 if
    /// rejected (oversized, or tx disabled), `body.len()` on success.
    pub fn send_response(&mut self, kind: u8, session: u16, body: &[u8]) -> usize {
        if body.len() > u16::MAX as usize {
            return 0;
        }
        if !self.start_response(kind, body.len() as u16, session) {
            return 0;
        }
        self.stream_body(body)
    }

    /// Allocates a fresh session and streams a complete message body on it.
    /// Returns the number of body bytes accepted: 0 on rejection,
    /// `body.len()` on success.
    pub fn send_message(&mut self, kind: u8, body: &[u8]) -> usize {
        if body.len() > u16::MAX as usize {
            return 0;
        }
        match self.start_session(kind, body.len() as u16) {
            Some(_session) => self.stream_body(body),
            None => 0,
        }
    }

    /// Like `send_response`, but reports how far over the peer's advertised
    /// buffer the request was instead of collapsing capacity failure to
    /// `0`. The bool-returning `start_response`/`send_response` pair remains
    /// the primary capacity-check surface; this variant exists for callers
    /// that want the shortfall instead of a bare `false`.
    pub fn try_send_response(&mut self, kind: u8, session: u16, body: &[u8]) -> Result<usize, Error> {
        let shortfall = self.tx_space_shortfall(body.len());
        if shortfall > 0 {
            return Err(Error::NoEnoughTxSpace(shortfall));
        }
        Ok(self.send_response(kind, session, body))
    }

    /// Like `send_message`, but on a too-large body reports the byte
    /// shortfall instead of just `0`.
    pub fn try_send_message(&mut self, kind: u8, body: &[u8]) -> Result<usize, Error> {
        let shortfall = self.tx_space_shortfall(body.len());
        if shortfall > 0 {
            return Err(Error::NoEnoughTxSpace(shortfall));
        }
        Ok(self.send_message(kind, body))
    }

    /// Bytes by which `body_len` exceeds the peer's advertised buffer, or
    /// `0` if it fits.
    fn tx_space_shortfall(&self, body_len: usize) -> u16 {
        let max_body = self.peer_buffer_size.saturating_sub(HEADER_LEN as u16) as usize;
        body_len.saturating_sub(max_body).min(u16::MAX as usize) as u16
    }

    /// Feeds received bytes into the frame parser, dispatching any
    /// completed datagram before returning.
    pub fn receive(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.receive_byte(b);
        }
    }

    /// Feeds a single received byte into the frame parser, dispatching a
    /// completed datagram (if any) before returning.
    pub fn receive_byte(&mut self, byte: u8) {
        if !self.frame.receive_byte(byte) {
            return;
        }

        // Copy the delivered payload into a stack-local view, independent
        // of `self`'s lifetime, so the dispatch below is free to take
        // `&mut self` (for handshake transitions, listener callbacks, and
        // the default handler) without fighting the borrow checker over
        // `self.frame`'s receive buffer.
        let len = self.frame.delivered_payload().len();
        let mut view = [0u8; CAP];
        view[..len].copy_from_slice(self.frame.delivered_payload());
        self.dispatch(&view[..len]);
    }

    fn dispatch(&mut self, payload: &[u8]) {
        let dg = match Datagram::parse(payload) {
            Some(dg) => dg,
            None => {
                error!("sbmp[{}]: datagram shorter than header, dropped", self.name);
                return;
            }
        };

        if handshake::is_handshake_type(dg.kind) {
            match dg.kind {
                handshake::HSK_START => self.on_hsk_start(&dg),
                handshake::HSK_ACCEPT => self.on_hsk_accept(&dg),
                handshake::HSK_CONFLICT => self.on_hsk_conflict(&dg),
                _ => unreachable!("is_handshake_type matched an unhandled kind"),
            }
            return;
        }

        if let Some(callback) = self.find_listener(dg.session) {
            trace!("sbmp[{}]: listener dispatch, session={:#06x}", self.name, dg.session);
            callback(self, &dg);
            return;
        }

        trace!("sbmp[{}]: default dispatch, session={:#06x}", self.name, dg.session);
        (self.default_handler)(self, &dg);
    }
}
