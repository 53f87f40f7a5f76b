/// The single host-supplied plug point SBMP needs on the transmit side: a
/// synchronous, non-blocking byte writer. Buffering policy beyond the fixed
/// receive buffer is the host's concern, not SBMP's.
pub trait Interface {
    fn tx_byte(&mut self, byte: u8);
}
