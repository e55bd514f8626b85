//! Queue transport errors.

use super::error_code::{self, CstructErrorCode};

/// Errors raised by the fact queue and its wire codec.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot open queue {path}: {message}")]
    QueueOpen { path: String, message: String },

    #[error("send failed: {message}")]
    SendFailed { message: String },

    #[error("receive failed: {message}")]
    ReceiveFailed { message: String },

    #[error("malformed message: {reason}")]
    Malformed { reason: String },

    #[error("field of {len} bytes does not fit a u16 length prefix")]
    FieldTooLong { len: usize },

    #[error("message of {len} bytes exceeds queue limit of {max}")]
    MessageTooLarge { len: usize, max: usize },

    #[error("writer thread has stopped")]
    WriterGone,
}

impl CstructErrorCode for TransportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed { .. } | Self::FieldTooLong { .. } => error_code::MALFORMED_MESSAGE,
            _ => error_code::TRANSPORT_ERROR,
        }
    }
}
