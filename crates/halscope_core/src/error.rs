//! Inspector Error Types

use halscope_hal::{four_cc_string, ClassId, HalError};
use thiserror::Error;

/// Errors that can occur while inspecting or editing objects
#[derive(Error, Debug)]
pub enum InspectorError {
    #[error("HAL error: {0}")]
    Hal(#[from] HalError),

    #[error("Object of class {} is not an editable control", class_label(*.0))]
    NotAControl(ClassId),

    #[error("Malformed control: {0}")]
    MalformedControl(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

fn class_label(class: ClassId) -> String {
    four_cc_string(class)
        .map(|code| format!("'{}'", code))
        .unwrap_or_else(|| class.to_string())
}

/// Result type alias for inspector operations
pub type InspectorResult<T> = Result<T, InspectorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use halscope_hal::fourcc;

    #[test]
    fn test_error_display() {
        let err = InspectorError::NotAControl(fourcc(b"adev"));
        assert!(err.to_string().contains("'adev'"));

        let err = InspectorError::MalformedControl("range has 1 entry".into());
        assert!(err.to_string().contains("range has 1 entry"));
    }

    #[test]
    fn test_error_from_hal() {
        let err: InspectorError = HalError::MissingQualifier.into();
        assert!(matches!(err, InspectorError::Hal(HalError::MissingQualifier)));
    }
}
