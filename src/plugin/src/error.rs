//! Plugin-specific error conversions.

use hyper::StatusCode;
use imagefs_core::error::ImagefsError;

use crate::protocol::ErrResponse;

/// Convert a driver error to the wire status and body.
///
/// The engine reads only the `Err` field, and every failure goes out as
/// 500 the same way the Go plugin helpers report it.
pub fn error_response(err: &ImagefsError) -> (StatusCode, ErrResponse) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrResponse::new(err.to_string()),
    )
}
