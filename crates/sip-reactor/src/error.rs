use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors the reactor itself can raise. I/O source registration errors
/// are passed through from the OS; everything else here is a misuse of
/// the reactor API (e.g. deregistering a token twice).
#[derive(Error, Debug)]
pub enum Error {
    #[error("poller I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("token {0:?} is not registered")]
    UnknownToken(crate::Token),
}
