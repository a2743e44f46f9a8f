//! Process exit codes.

use crate::calendar::ImportError;
use crate::config::ConfigError;
use crate::services::{AuthError, ServiceError};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_AUTH: i32 = 3;
pub const EXIT_NOT_FOUND: i32 = 4;
pub const EXIT_DATA: i32 = 5;

/// Exit code for the first recognised error in the chain.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if cause.is::<ConfigError>() {
            return EXIT_CONFIG;
        }
        if cause.is::<AuthError>() {
            return EXIT_AUTH;
        }
        if let Some(ServiceError::Auth(_)) = cause.downcast_ref::<ServiceError>() {
            return EXIT_AUTH;
        }
        if let Some(import) = cause.downcast_ref::<ImportError>() {
            return match import {
                ImportError::NotFound(_) => EXIT_NOT_FOUND,
                ImportError::Io(_) => EXIT_FAILURE,
                ImportError::Csv(e) if e.is_io_error() => EXIT_FAILURE,
                ImportError::MissingColumn(_) | ImportError::InvalidRow { .. } | ImportError::Csv(_) => EXIT_DATA,
            };
        }
    }
    EXIT_FAILURE
}
