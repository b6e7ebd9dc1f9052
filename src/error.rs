use thiserror::Error;

/// Failures that end a load request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The source did not report a usable (known, non-negative) size.
    #[error("File size unavailable")]
    SizeUnavailable,
    /// A whole-file or chunk read failed or returned fewer bytes than expected.
    #[error("Failed to read file at offset {offset}: {message}")]
    ReadFailure { offset: u64, message: String },
    /// A newer request replaced this one; its result is never applied.
    #[error("Load superseded by a newer request")]
    Superseded,
}

impl LoadError {
    pub fn read_failure(offset: u64, err: impl std::fmt::Display) -> Self {
        LoadError::ReadFailure {
            offset,
            message: err.to_string(),
        }
    }
}

/// Rejections produced by the offset navigator. Local to the input control.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Invalid offset \"{input}\". Use decimal or 0x-prefixed hex")]
    Parse { input: String },
    #[error("{}", out_of_range_message(.length))]
    OutOfRange { length: u64 },
}

fn out_of_range_message(length: &u64) -> String {
    if *length == 0 {
        "Invalid offset. No bytes loaded".to_string()
    } else {
        format!("Invalid offset. Must be between 0 and {}", length - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message_states_bound() {
        let err = NavigationError::OutOfRange { length: 256 };
        assert_eq!(err.to_string(), "Invalid offset. Must be between 0 and 255");

        let empty = NavigationError::OutOfRange { length: 0 };
        assert_eq!(empty.to_string(), "Invalid offset. No bytes loaded");
    }

    #[test]
    fn test_read_failure_message() {
        let err = LoadError::read_failure(1024, "unexpected end of file");
        assert_eq!(
            err.to_string(),
            "Failed to read file at offset 1024: unexpected end of file"
        );
    }
}
