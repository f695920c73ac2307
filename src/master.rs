// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bus master
//!
//! High level operations for callers that work with plain integers. Every
//! operation validates its arguments, runs one or more queries and reports
//! a [`CommandResult`].

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use crate::{
    codec::ascii::decode_hex,
    command::Query,
    discovery,
    engine::Engine,
    error::*,
    frame::*,
    transport::{SerialTransport, Transport},
};

/// First register of the slave memory window.
pub const MEMORY_START: Address = 0x200;

/// End of the slave memory window.
pub const MEMORY_END: Address = 0x2FE;

/// Size of the slave memory window in bytes.
pub const MEMORY_SIZE: usize = (MEMORY_END - MEMORY_START) as usize;

/// Highest address + length of a memory write.
pub const MEMORY_WRITE_LIMIT: usize = 0xFF;

/// First register of the option size table.
pub const OPTION_TABLE: Address = 0x20;

/// Number of entries in the option size table.
pub const OPTION_COUNT: i32 = 0x30;

/// Register address of a hard reset.
pub const HARD_RESET_ADDRESS: Address = 0;

/// Status and values of a master operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub status: Outcome,
    pub values: Vec<i32>,
}

impl CommandResult {
    #[must_use]
    pub const fn new(status: Outcome, values: Vec<i32>) -> Self {
        Self { status, values }
    }

    #[must_use]
    pub fn succeed(values: impl IntoIterator<Item = i32>) -> Self {
        Self::new(Outcome::Succeed, values.into_iter().collect())
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == Outcome::Succeed
    }
}

impl From<Outcome> for CommandResult {
    fn from(status: Outcome) -> Self {
        Self::new(status, Vec::new())
    }
}

impl From<Error> for CommandResult {
    fn from(err: Error) -> Self {
        err.outcome().into()
    }
}

fn slave_id(id: i32) -> Option<SlaveId> {
    u8::try_from(id).ok().filter(|id| *id <= MAX_SLAVE_ID)
}

fn register(address: i32) -> Option<Address> {
    Address::try_from(address).ok()
}

// The two bytes of a register value. Negative values are sent as their
// 16 bit two's complement.
fn register_value(value: i32) -> Option<[u8; 2]> {
    if !(i32::from(i16::MIN)..=i32::from(u16::MAX)).contains(&value) {
        return None;
    }
    let mut bytes = [0; 2];
    BigEndian::write_u16(&mut bytes, value as u16);
    Some(bytes)
}

// Parse a 32 character presence string, the first character is address 32.
fn presence_bits(ids: &str) -> Option<u32> {
    if ids.chars().count() != 32 {
        return None;
    }
    Some(ids.chars().fold(0, |mask, c| (mask << 1) | u32::from(c != '0')))
}

/// Master of one bus line.
#[derive(Debug)]
pub struct Master<T> {
    engine: Engine<T>,
}

impl<T: Transport> Master<T> {
    pub const fn new(transport: T) -> Self {
        Self {
            engine: Engine::new(transport),
        }
    }

    #[must_use]
    pub const fn engine(&self) -> &Engine<T> {
        &self.engine
    }

    /// Read a single register.
    pub fn get_register(&self, id: i32, address: i32) -> CommandResult {
        let (Some(id), Some(address)) = (slave_id(id), register(address)) else {
            return Outcome::ArgumentError.into();
        };
        match self.read_words(id, address, 1) {
            Ok(words) => CommandResult::succeed(words.into_iter().map(i32::from)),
            Err(res) => res,
        }
    }

    /// Write a single register.
    pub fn set_register(&self, id: i32, address: i32, value: i32) -> CommandResult {
        let (Some(id), Some(address), Some(data)) =
            (slave_id(id), register(address), register_value(value))
        else {
            return Outcome::ArgumentError.into();
        };
        self.write(id, address, &data).into()
    }

    /// Ask a slave to restart. The slave does not reply.
    pub fn hard_reset(&self, id: i32) -> CommandResult {
        let Some(id) = slave_id(id) else {
            return Outcome::ArgumentError.into();
        };
        match Query::write(id, HARD_RESET_ADDRESS, &[]) {
            Ok(query) => self.engine.execute(&query.without_responses()).outcome().into(),
            Err(err) => err.into(),
        }
    }

    /// Broadcast which slave addresses are taken.
    ///
    /// `ids` holds 32 characters, the first one stands for address 32 and
    /// the last one for address 1. Every character other than `0` marks
    /// the address as taken.
    pub fn reset_slaves(&self, ids: &str) -> CommandResult {
        let Some(mask) = presence_bits(ids) else {
            return Outcome::ArgumentError.into();
        };
        match discovery::presence_query(mask) {
            Ok(query) => self.engine.execute(&query).outcome().into(),
            Err(err) => err.into(),
        }
    }

    /// The 8 byte serial number of a slave.
    pub fn serial_number(&self, id: i32) -> CommandResult {
        let Some(id) = slave_id(id) else {
            return Outcome::ArgumentError.into();
        };
        match self.read_bytes(id, discovery::IDENTITY_ADDRESS, discovery::IDENTITY_WORDS) {
            Ok(bytes) => CommandResult::succeed(bytes.into_iter().map(i32::from)),
            Err(res) => res,
        }
    }

    /// Read `size` bytes from the memory window, starting at byte `address`.
    pub fn read_memory(&self, id: i32, address: i32, size: i32) -> CommandResult {
        let (Some(id), Ok(address), Ok(size)) =
            (slave_id(id), usize::try_from(address), usize::try_from(size))
        else {
            return Outcome::ArgumentError.into();
        };
        let words = size.div_ceil(2);
        let end = words.checked_mul(2).and_then(|len| len.checked_add(address));
        if end.is_none_or(|end| end > MEMORY_SIZE) {
            return Outcome::ArgumentError.into();
        }
        // Both fit: address + 2 * words <= MEMORY_SIZE
        let (start, count) = (MEMORY_START + address as Address, words as u16);
        match self.read_bytes(id, start, count) {
            Ok(bytes) => CommandResult::succeed(bytes.into_iter().take(size).map(i32::from)),
            Err(res) => res,
        }
    }

    /// Write the bytes of the hex string `data` into the memory window.
    pub fn write_memory(&self, id: i32, address: i32, data: &str) -> CommandResult {
        let (Some(id), Ok(address)) = (slave_id(id), usize::try_from(address)) else {
            return Outcome::ArgumentError.into();
        };
        let bytes = match decode_hex(data) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return Outcome::ArgumentError.into(),
            Err(err) => return err.into(),
        };
        if address
            .checked_add(bytes.len())
            .is_none_or(|end| end > MEMORY_WRITE_LIMIT)
        {
            return Outcome::ArgumentError.into();
        }
        self.write(id, MEMORY_START + address as Address, &bytes).into()
    }

    /// Read the data block of option `index`.
    ///
    /// The size of the block is looked up in the option table first.
    pub fn option_info(&self, id: i32, index: i32) -> CommandResult {
        let (Some(slave), true) = (slave_id(id), (0..OPTION_COUNT).contains(&index)) else {
            return Outcome::ArgumentError.into();
        };
        let size = match self.read_words(slave, OPTION_TABLE + index as Address, 1) {
            Ok(words) => words.first().copied().unwrap_or_default(),
            Err(res) => return res,
        };
        self.read_memory(id, 0, size.into())
    }

    /// Find all slaves on the bus.
    pub fn detect_slaves(&self) -> CommandResult {
        match discovery::detect_slaves(&self.engine) {
            Ok(res) => CommandResult::succeed(res.detected.into_iter().map(i32::from)),
            Err(err) => err.into(),
        }
    }

    fn read_bytes(
        &self,
        id: SlaveId,
        address: Address,
        count: u16,
    ) -> core::result::Result<Vec<u8>, CommandResult> {
        let query = Query::read(id, address, count)?;
        let reply = self.engine.execute(&query);
        match reply.outcome() {
            Outcome::Succeed => Ok(reply.field(FieldKind::Data).unwrap_or_default().to_vec()),
            outcome => Err(outcome.into()),
        }
    }

    fn read_words(
        &self,
        id: SlaveId,
        address: Address,
        count: u16,
    ) -> core::result::Result<Vec<Word>, CommandResult> {
        let bytes = self.read_bytes(id, address, count)?;
        Ok(bytes.chunks_exact(2).map(BigEndian::read_u16).collect())
    }

    fn write(&self, id: SlaveId, address: Address, data: &[u8]) -> Outcome {
        match Query::write(id, address, data) {
            Ok(query) => self.engine.execute(&query).outcome(),
            Err(err) => err.outcome(),
        }
    }
}

impl Master<SerialTransport> {
    /// Switch to another serial port.
    ///
    /// Waits for a running exchange to finish. Returns whether the new port
    /// could be opened.
    pub fn set_serial_port_name(&self, port_name: &str) -> bool {
        self.engine.with_transport(|port| port.reopen(port_name))
    }

    /// Name of the serial port in use.
    #[must_use]
    pub fn serial_port_name(&self) -> String {
        self.engine.with_transport(|port| port.port_name().to_owned())
    }
}
