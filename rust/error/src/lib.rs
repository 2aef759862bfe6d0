//! Error codes shared by every Quiver error type, numbered after the gRPC
//! status codes so server responses map onto them directly.

use std::error::Error;

#[cfg(feature = "validator")]
mod validator;
#[cfg(feature = "validator")]
pub use validator::*;

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum ErrorCodes {
    // "Ok" is a keyword in Rust, so the zero code is Success.
    Success = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl ErrorCodes {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCodes::InvalidArgument => "InvalidArgumentError",
            ErrorCodes::NotFound => "NotFoundError",
            ErrorCodes::Internal => "InternalError",
            _ => "QuiverError",
        }
    }
}

pub trait QuiverError: Error + Send {
    fn code(&self) -> ErrorCodes;
    fn boxed(self) -> Box<dyn QuiverError>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
    fn should_trace_error(&self) -> bool {
        true
    }
}

impl Error for Box<dyn QuiverError> {}

impl QuiverError for Box<dyn QuiverError> {
    fn code(&self) -> ErrorCodes {
        self.as_ref().code()
    }
}

impl QuiverError for std::io::Error {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::Unknown
    }
}
