//! Crate-wide error type.
//!
//! Transient errors (`Transport`, `Overflow`) are absorbed at the lowest
//! level that can recover from them and never propagate past the owning
//! task or connection; see [`crate::caster`], [`crate::client`] and
//! [`crate::server`] for the recovery behaviour tied to each variant.

/// NTRIP error type shared by the caster, connector, client, server and
/// framer.
#[derive(Debug, thiserror::Error)]
pub enum NtripError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed request: {0}")]
    Protocol(String),

    #[error("authentication failed")]
    Auth,

    #[error("mountpoint {0} is not advertised")]
    UnknownMountpoint(String),

    #[error("mountpoint {0} already has a producer")]
    MountpointConflict(String),

    #[error("mountpoint {0} has no producer")]
    MountpointUnavailable(String),

    #[error("framer buffer overflow")]
    Overflow,

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("invalid URL")]
    InvalidUrl,

    #[error("invalid port number")]
    InvalidPort,

    #[error("fatal error: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, NtripError>;
