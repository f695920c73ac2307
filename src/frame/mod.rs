// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

mod buffer;
mod template;

pub use self::{buffer::*, template::*};

/// Slave ID (`0` - `247`, `0` is the broadcast address).
pub type SlaveId = u8;

/// The broadcast address. Slaves never reply to it.
pub const BROADCAST: SlaveId = 0;

/// Highest valid slave address.
pub const MAX_SLAVE_ID: SlaveId = 247;

/// A register address is represented by 16 bit (from `0` to `65535`).
pub type Address = u16;

/// Registers hold 16 bit words (big-endian representation).
pub type Word = u16;

/// A function code of the bus protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    /// Function Code: `04` (`0x04`).
    ReadResults,

    /// Function Code: `16` (`0x10`).
    WriteRegisters,

    /// Any other function code.
    Custom(u8),
}

impl FunctionCode {
    /// Create a new [`FunctionCode`] with `value`.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        match value {
            0x04 => Self::ReadResults,
            0x10 => Self::WriteRegisters,
            code => Self::Custom(code),
        }
    }

    /// Get the [`u8`] value of the current [`FunctionCode`].
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::ReadResults => 0x04,
            Self::WriteRegisters => 0x10,
            Self::Custom(code) => code,
        }
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value().fmt(f)
    }
}

/// The role of a byte range inside a command or a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    SlaveAddress,
    Function,
    Address,
    Data,
    Count,
    Checksum,
}

impl FieldKind {
    pub(crate) const COUNT: usize = 6;

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::SlaveAddress => 0,
            Self::Function => 1,
            Self::Address => 2,
            Self::Data => 3,
            Self::Count => 4,
            Self::Checksum => 5,
        }
    }
}

/// Classification of one protocol exchange.
///
/// `Succeed` and `Error` come from the response template that matched the
/// reply, everything else from the layers around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Outcome {
    /// The slave confirmed the command.
    Succeed,
    /// The slave rejected the command.
    Error,
    /// Well framed reply that matches no known template.
    Unknown,
    /// No reply within the deadline.
    Timeout,
    /// Serial I/O fault or port not open.
    TransportError,
    /// A caller supplied parameter is out of range.
    ArgumentError,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Calculate the checksum: the 8 bit wraparound sum of all bytes.
#[must_use]
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |sum, x| sum.wrapping_add(*x))
}
