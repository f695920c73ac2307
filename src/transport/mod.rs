// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access to the bus line

use crate::error::*;

mod serial;
#[cfg(test)]
pub(crate) mod sim;

pub use self::serial::*;

/// One end of the bus line.
///
/// An exchange is one [`send`](Transport::send) optionally followed by one
/// [`receive`](Transport::receive). Callers serialize exchanges, an
/// implementation never sees two of them interleaved.
pub trait Transport {
    /// Write one command payload.
    ///
    /// Fails with [`Error::Timeout`] if the line could not be written in
    /// time and with [`Error::PortNotOpen`] or an I/O error if the line is
    /// unusable.
    fn send(&mut self, payload: &[u8]) -> Result<()>;

    /// Wait for one reply and return its bytes.
    ///
    /// Fails with [`Error::Timeout`] if no complete line arrives in time.
    fn receive(&mut self) -> Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, payload: &[u8]) -> Result<()> {
        (**self).send(payload)
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        (**self).receive()
    }
}
