// Copyright 2026 the Framescope Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors returned by session operations.
//!
//! Rust callers get a [`TraceError`] from each fallible operation. Callers
//! on the other side of a foreign boundary work with the [`ErrorCode`]
//! integer values instead; [`ErrorCode::from`] folds any operation result
//! into one.
//!
//! Running out of buffer space is not an error. It is reported through the
//! overflow flag on frame and trace summaries.

/// Why a session operation was rejected.
///
/// A rejected operation has no side effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TraceError {
    /// The host engine is not initialized or not present.
    #[error("tracing engine is not available")]
    NotAvailable,
    /// An argument was out of range or missing.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The operation does not apply to the session's current state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
}

impl TraceError {
    /// Boundary code for this error.
    #[must_use]
    pub const fn code(self) -> ErrorCode {
        match self {
            Self::NotAvailable => ErrorCode::NotAvailable,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::InvalidState(_) => ErrorCode::InvalidState,
        }
    }
}

/// Integer result codes shared with foreign callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// The operation succeeded.
    NoError = 0,
    /// The host engine is not available.
    NotAvailable = -1,
    /// An argument was rejected.
    InvalidArgument = -2,
    /// The session state does not permit the operation.
    InvalidState = -3,
}

impl ErrorCode {
    /// Raw integer value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<TraceError> for ErrorCode {
    fn from(err: TraceError) -> Self {
        err.code()
    }
}

impl<T> From<&Result<T, TraceError>> for ErrorCode {
    fn from(result: &Result<T, TraceError>) -> Self {
        match result {
            Ok(_) => Self::NoError,
            Err(err) => err.code(),
        }
    }
}
