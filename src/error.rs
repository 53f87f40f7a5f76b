/// Errors surfaced by the handful of operations that return `Result` rather
/// than a plain `bool`. Most capacity errors collapse to `false` with no
/// partial state; calls that report how far over budget the caller was use
/// this `Error::NoEnoughTxSpace(u16)` shape instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Not enough peer buffer space for the requested message. The value is
    /// the number of bytes the request was over budget.
    NoEnoughTxSpace(u16),
}
