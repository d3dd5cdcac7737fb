//! Error type shared by the bridge driver and the SWD engine.

/// Everything that can go wrong between the host and the target.
///
/// Errors are scoped to the operation that returned them. Only
/// [`Error::Connection`] leaves you without a usable bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The bridge did not identify itself as expected when connecting.
    #[error("unexpected response from bridge: {0:?}")]
    Connection(String),

    /// Nothing arrived from the bridge within the channel timeout.
    #[error("timed out waiting for the bridge")]
    Timeout,

    /// The bridge replied with something malformed or unexpected, for
    /// example a missing `OK` or a short bit string.
    #[error("bridge protocol error: {0}")]
    Protocol(String),

    /// The target answered a request with an invalid ACK. `0b111` means the
    /// line was not driven at all, which is the usual case.
    #[error("no valid ACK from target (got {0:#05b})")]
    AckProtocol(u8),

    /// The target kept answering WAIT for the given number of attempts.
    #[error("target still busy after {0} WAIT responses")]
    AckWait(usize),

    /// The target answered FAULT. The sticky error flags in CTRL/STAT need
    /// clearing before further AP accesses will succeed.
    #[error("target answered FAULT")]
    AckFault,

    /// The parity bit of a read did not match its data.
    #[error("parity error reading {0:#010x}")]
    BadParity(u32),

    /// Buffered transfers carry their length in a single byte.
    #[error("{0} bits requested, at most 255 fit in one transfer")]
    TooManyBits(usize),

    /// Reading from or writing to the channel failed.
    #[error("channel I/O error")]
    Io(#[from] std::io::Error),

    /// The serial port could not be opened or configured.
    #[error("serial port error")]
    Serial(#[from] serialport::Error),
}

impl Error {
    /// Returns true if repeating the whole operation may succeed.
    pub fn requires_retry(&self) -> bool {
        matches!(self, Error::AckWait(_) | Error::Timeout)
    }

    /// Returns true if the line or the target is in an unknown state and
    /// should be reset with [`SwdEngine::switch_to_swd`] before continuing.
    ///
    /// [`SwdEngine::switch_to_swd`]: crate::engine::SwdEngine::switch_to_swd
    pub fn requires_reset(&self) -> bool {
        matches!(
            self,
            Error::AckProtocol(_) | Error::Protocol(_) | Error::AckFault | Error::BadParity(_)
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
