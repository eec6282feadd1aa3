use std::borrow::Cow;
use std::fmt;

/// All possible kinds of sensor read failures.
///
/// The taxonomy is flat: every failed read is classified as exactly one
/// kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A read was requested before the minimum interval elapsed since the
    /// previous attempt.
    RateLimited,
    /// The decoder did not deliver a frame within the bounded wait.
    AcquisitionTimeout,
    /// The checksum byte does not match the sum of the four data bytes.
    ChecksumMismatch,
    /// A decoded value falls outside the sensor operating range.
    OutOfRange,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::RateLimited => "Rate limited",
            Self::AcquisitionTimeout => "Acquisition timeout",
            Self::ChecksumMismatch => "Checksum mismatch",
            Self::OutOfRange => "Value out of operating range",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A sensor read failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {description}")]
pub struct ReadError {
    kind: ErrorKind,
    description: Cow<'static, str>,
}

impl ReadError {
    pub(crate) fn new(kind: ErrorKind, description: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    /// Returns the [`ErrorKind`] of this failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the description of this failure.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A specialized [`Result`] type for sensor reads.
pub type Result<T> = std::result::Result<T, ReadError>;

#[cfg(test)]
mod tests {
    use super::{ErrorKind, ReadError};

    #[test]
    fn display_joins_kind_and_description() {
        let error = ReadError::new(ErrorKind::ChecksumMismatch, "expected 0x99, found 0x98");

        assert_eq!(
            error.to_string(),
            "Checksum mismatch: expected 0x99, found 0x98"
        );
        assert_eq!(error.kind(), ErrorKind::ChecksumMismatch);
        assert_eq!(error.description(), "expected 0x99, found 0x98");
    }
}
