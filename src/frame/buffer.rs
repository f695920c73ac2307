// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;
use byteorder::{BigEndian, ByteOrder};

/// A command under construction.
///
/// The checksum is appended by [`CommandBuffer::finish`], which consumes the
/// buffer: nothing can follow the checksum byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandBuffer {
    data: Vec<u8>,
}

impl CommandBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single byte.
    pub fn push_u8(&mut self, value: u8) -> &mut Self {
        self.data.push(value);
        self
    }

    /// Append a big-endian word.
    pub fn push_u16(&mut self, value: Word) -> &mut Self {
        let mut word = [0; 2];
        BigEndian::write_u16(&mut word, value);
        self.data.extend_from_slice(&word);
        self
    }

    /// Append raw bytes.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append the checksum of all bytes so far and return the payload.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        let sum = checksum(&self.data);
        self.data.push(sum);
        self.data
    }
}
