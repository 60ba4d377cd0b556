//! HAL Access Error Types

use thiserror::Error;

use crate::property::PropertyType;
use crate::types::{four_cc_string, OsStatus};

/// Errors from property access operations
///
/// Every variant except `Os` is raised by the access layer itself, never by
/// the HAL. Most are raised before the HAL is called at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HalError {
    #[error("Property requires a qualifier")]
    MissingQualifier,

    #[error("Property requires an input value")]
    MissingInputValue,

    #[error("Operation not permitted by the property's read semantics")]
    InvalidOperation,

    #[error("HAL call failed with status {}", describe_status(*.0))]
    Os(OsStatus),

    #[error("Type mismatch: requested {requested}, property declares {declared:?}")]
    TypeMismatch {
        requested: &'static str,
        declared: PropertyType,
    },

    #[error(
        "Property data of {byte_size} bytes is not a whole number of {element_size}-byte elements"
    )]
    MisalignedData {
        byte_size: usize,
        element_size: usize,
    },

    #[error("Input of {input_size} bytes does not fit property data of {byte_size} bytes")]
    InputTooLarge { input_size: usize, byte_size: usize },

    #[error("Unsupported property type: {0:?}")]
    UnsupportedType(PropertyType),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl HalError {
    /// The raw HAL status, if this error came from the HAL itself
    pub fn os_status(&self) -> Option<OsStatus> {
        match self {
            HalError::Os(status) => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for property access
pub type HalResult<T> = Result<T, HalError>;

/// Render a status as `'code' (n)` when it spells a four-character code
fn describe_status(status: OsStatus) -> String {
    match four_cc_string(status as u32) {
        Some(code) => format!("'{}' ({})", code, status),
        None => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::status;

    #[test]
    fn test_error_display() {
        let err = HalError::Os(status::UNKNOWN_PROPERTY);
        assert!(err.to_string().contains("'who?'"));

        let err = HalError::Os(-50);
        assert!(err.to_string().contains("-50"));

        let err = HalError::MisalignedData {
            byte_size: 6,
            element_size: 4,
        };
        assert!(err.to_string().contains("6 bytes"));

        let err = HalError::InputTooLarge {
            input_size: 12,
            byte_size: 8,
        };
        assert!(err.to_string().contains("12 bytes"));
    }

    #[test]
    fn test_os_status_accessor() {
        assert_eq!(HalError::Os(42).os_status(), Some(42));
        assert_eq!(HalError::MissingQualifier.os_status(), None);
    }
}
