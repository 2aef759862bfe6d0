use crate::{ErrorCodes, QuiverError};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Validation error: {0}")]
pub struct QuiverValidationError(#[from] validator::ValidationErrors);

impl QuiverError for QuiverValidationError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}
