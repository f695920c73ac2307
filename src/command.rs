// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command construction

use crate::{error::*, frame::*};

/// Maximum number of results a single read query may ask for.
pub const MAX_RESULTS: u16 = 127;

/// Maximum number of data bytes a single write query may carry.
pub const MAX_DATA_LEN: usize = 0xFF;

/// A command payload together with the replies it may provoke.
///
/// Templates are ordered by priority: the success template comes first,
/// the error template second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    payload: Vec<u8>,
    responses: Vec<ResponseTemplate>,
}

impl Query {
    /// Read `count` consecutive 16 bit results starting at `address`.
    pub fn read(slave: SlaveId, address: Address, count: u16) -> Result<Self> {
        if count > MAX_RESULTS {
            return Err(Error::ResultCount(count));
        }
        let fn_code = FunctionCode::ReadResults.value();

        let mut cmd = CommandBuffer::new();
        cmd.push_u8(slave)
            .push_u8(fn_code)
            .push_u16(address)
            .push_u16(count);

        // count <= 127, so the byte count always fits into a byte
        let byte_count = (count * 2) as u8;

        let success = ResponseTemplate::new(Outcome::Succeed)
            .expect_u8(FieldKind::SlaveAddress, slave)
            .expect_u8(FieldKind::Function, fn_code)
            .expect_u8(FieldKind::Count, byte_count)
            .words(FieldKind::Data, count.into())
            .checksum();

        let failure = ResponseTemplate::new(Outcome::Error)
            .expect_u8(FieldKind::SlaveAddress, slave)
            .expect_u8(FieldKind::Function, fn_code)
            .expect_u8(FieldKind::Count, 0)
            .checksum();

        Ok(Self {
            payload: cmd.finish(),
            responses: vec![success, failure],
        })
    }

    /// Write `data` into the registers starting at `address`.
    ///
    /// An odd number of bytes still occupies a whole register for the last
    /// byte.
    pub fn write(slave: SlaveId, address: Address, data: &[u8]) -> Result<Self> {
        if data.len() > MAX_DATA_LEN {
            return Err(Error::DataLength(data.len()));
        }
        let fn_code = FunctionCode::WriteRegisters.value();
        let registers = data.len().div_ceil(2) as u16;

        let mut cmd = CommandBuffer::new();
        cmd.push_u8(slave)
            .push_u8(fn_code)
            .push_u16(address)
            .push_u16(registers)
            .push_u8(data.len() as u8)
            .extend_from_slice(data);

        let success = ResponseTemplate::new(Outcome::Succeed)
            .expect_u8(FieldKind::SlaveAddress, slave)
            .expect_u8(FieldKind::Function, fn_code)
            .expect_u16(FieldKind::Address, address)
            .expect_u16(FieldKind::Count, registers)
            .checksum();

        let failure = ResponseTemplate::new(Outcome::Error)
            .expect_u8(FieldKind::SlaveAddress, slave)
            .expect_u8(FieldKind::Function, fn_code)
            .expect_u16(FieldKind::Address, address)
            .expect_u16(FieldKind::Count, 0)
            .checksum();

        Ok(Self {
            payload: cmd.finish(),
            responses: vec![success, failure],
        })
    }

    /// Drop all response templates: the command is sent without waiting
    /// for a reply (broadcasts, resets).
    #[must_use]
    pub fn without_responses(mut self) -> Self {
        self.responses.clear();
        self
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn responses(&self) -> &[ResponseTemplate] {
        &self.responses
    }
}
