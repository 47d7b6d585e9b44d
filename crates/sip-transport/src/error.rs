use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors the transport layer can raise.
///
/// Everything here maps onto spec §7's `NetworkProblem` kind: a socket
/// failure is logged by the caller and the operation aborted, it never
/// poisons the reactor or another transaction.
#[derive(Error, Debug)]
pub enum Error {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("reactor error: {0}")]
    Reactor(#[from] sip_reactor::Error),

    #[error("transport is not started")]
    NotStarted,

    #[error("transport is already started")]
    AlreadyStarted,
}
