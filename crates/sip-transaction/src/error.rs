use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors the transaction engine and SIP Core can raise.
///
/// Spec §7's `IllegalAction` kind (a response or ACK matching no
/// transaction) is handled entirely by `tracing::info!` at the call site
/// and never constructed as a value here — the spec is explicit that such
/// events are "dropped silently at INFO level," not surfaced to a caller.
/// What's left is `NetworkProblem`: failures from the layers below that a
/// caller (`sip-core-engine`'s embedder) does need to observe.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] sip_transport::Error),

    #[error(transparent)]
    Message(#[from] sip_message::Error),
}
