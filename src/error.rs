//! Splitter error taxonomy.
//!
//! Every failure the splitter can observe ends in a reply to the client,
//! so these errors are never returned through `Result` to the caller.
//! They are converted into canonical `RespValue::Error` replies, keeping
//! the error text identical across all request types.

use crate::protocol::RespValue;
use thiserror::Error;

/// Errors surfaced to the client as RESP error replies.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SplitError {
    /// The top-level command is not a non-empty array of bulk strings,
    /// or its name is empty.
    #[error("invalid request")]
    InvalidRequest,

    /// No handler is registered for the command name.
    #[error("unsupported command '{0}'")]
    UnsupportedCommand(String),

    /// The command has the wrong shape for its family.
    #[error("wrong number of arguments for '{0}' command")]
    WrongArguments(String),

    /// The pool could not resolve a shard for the key.
    #[error("no upstream host")]
    NoUpstreamHost,

    /// A dispatched sub-command failed at the connection level.
    #[error("upstream failure")]
    UpstreamFailure,

    /// A shard replied with a value of the wrong shape.
    #[error("upstream protocol error")]
    UpstreamProtocolError,
}

impl SplitError {
    /// Builds the error reply sent to the client.
    pub fn to_reply(&self) -> RespValue {
        RespValue::Error(self.to_string())
    }
}

impl From<SplitError> for RespValue {
    fn from(err: SplitError) -> Self {
        err.to_reply()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_messages() {
        assert_eq!(
            RespValue::from(SplitError::InvalidRequest),
            RespValue::error("invalid request")
        );
        assert_eq!(
            RespValue::from(SplitError::NoUpstreamHost),
            RespValue::error("no upstream host")
        );
        assert_eq!(
            RespValue::from(SplitError::UpstreamFailure),
            RespValue::error("upstream failure")
        );
        assert_eq!(
            RespValue::from(SplitError::UpstreamProtocolError),
            RespValue::error("upstream protocol error")
        );
    }

    #[test]
    fn test_named_messages() {
        assert_eq!(
            SplitError::UnsupportedCommand("foobar".into()).to_string(),
            "unsupported command 'foobar'"
        );
        assert_eq!(
            SplitError::WrongArguments("mset".into()).to_string(),
            "wrong number of arguments for 'mset' command"
        );
    }
}
