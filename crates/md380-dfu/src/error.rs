//! Errors surfaced by the protocol engine.

use thiserror::Error;

use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum DfuError {
    /// Operation attempted without a live session.
    #[error("Not connected to a DFU device")]
    NotConnected,

    /// The transport failed on a status, state or upload exchange. The
    /// session has been demoted to disconnected.
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransportError),

    /// `disconnect()` called with no transport held.
    #[error("No transport held by the session")]
    NoTransport,
}
