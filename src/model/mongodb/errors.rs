//! The mongodb crate doesn't provide error code constants.
//! This module fills in the gaps.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

pub const DUPLICATE_KEY: i32 = 11000;

/// Return true if the given result is a duplicate key error, whether reported
/// by a plain write or by a `findAndModify` command.
pub fn is_duplicate_key_error<T>(result: Result<T, &DbError>) -> bool {
    match result {
        Ok(_) => false,
        Err(err) => match *err.kind {
            ErrorKind::Write(WriteFailure::WriteError(ref e)) => e.code == DUPLICATE_KEY,
            ErrorKind::Command(ref e) => e.code == DUPLICATE_KEY,
            _ => false,
        },
    }
}
