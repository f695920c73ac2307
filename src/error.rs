// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::frame::Outcome;

/// asciibus Error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Too many results requested by a read query
    #[error("Invalid result count: {0} (at most 127 results allowed)")]
    ResultCount(u16),
    /// Too much data for a write query
    #[error("Invalid data length: {0} byte(s) (at most 255 allowed)")]
    DataLength(usize),
    /// Invalid hexadecimal digit
    #[error("Invalid hex digit: {0:?}")]
    InvalidHexDigit(char),
    /// Hex string that does not split into byte pairs
    #[error("Invalid hex string length: {0}")]
    HexLength(usize),
    /// No reply within the read or write deadline
    #[error("Serial line timeout")]
    Timeout,
    /// The serial port is closed
    #[error("Serial port is not open")]
    PortNotOpen,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serial(#[from] serialport::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Classify the error in the outcome vocabulary reported to callers.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        use Error::*;

        match self {
            ResultCount(_) | DataLength(_) | InvalidHexDigit(_) | HexLength(_) => {
                Outcome::ArgumentError
            }
            Timeout => Outcome::Timeout,
            PortNotOpen | Io(_) | Serial(_) | Json(_) => Outcome::TransportError,
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_errors() {
        assert_eq!(Error::ResultCount(128).outcome(), Outcome::ArgumentError);
        assert_eq!(Error::DataLength(256).outcome(), Outcome::ArgumentError);
        assert_eq!(Error::InvalidHexDigit('x').outcome(), Outcome::ArgumentError);
        assert_eq!(Error::Timeout.outcome(), Outcome::Timeout);
        assert_eq!(Error::PortNotOpen.outcome(), Outcome::TransportError);
        let io = std::io::Error::from(std::io::ErrorKind::BrokenPipe);
        assert_eq!(Error::from(io).outcome(), Outcome::TransportError);
    }

    #[test]
    fn display_errors() {
        assert_eq!(
            Error::ResultCount(128).to_string(),
            "Invalid result count: 128 (at most 127 results allowed)"
        );
        assert_eq!(Error::InvalidHexDigit('g').to_string(), "Invalid hex digit: 'g'");
    }
}
