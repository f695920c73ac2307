// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A simulated bus for tests
//!
//! Every payload passes through the line codec in both directions.

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder};

use super::Transport;
use crate::{
    codec::ascii::{decode_line, encode_line},
    error::*,
    frame::*,
};

/// How a simulated slave reacts to commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    /// Serve reads and writes from its registers.
    Answer,
    /// Reply with the error shape to everything.
    Reject,
    /// Reply with a broken checksum.
    Garble,
    /// Garble the first `n` replies, answer afterwards.
    GarbleTimes(usize),
}

#[derive(Debug, Default)]
pub(crate) struct SimSlave {
    behavior: Option<Behavior>,
    pub(crate) registers: HashMap<Address, Word>,
}

#[derive(Debug, Default)]
pub(crate) struct SimBus {
    slaves: HashMap<SlaveId, SimSlave>,
    pending: Option<Vec<u8>>,
    /// Every payload that was sent.
    pub(crate) sent: Vec<Vec<u8>>,
    /// Data of every broadcast write.
    pub(crate) broadcasts: Vec<(Address, Vec<u8>)>,
    /// Fail the next send with an I/O error, which closes the line.
    pub(crate) broken: bool,
    closed: bool,
}

impl SimBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_slave(mut self, id: SlaveId, behavior: Behavior) -> Self {
        self.slaves.entry(id).or_default().behavior = Some(behavior);
        self
    }

    pub(crate) fn is_open(&self) -> bool {
        !self.closed
    }

    pub(crate) fn reopen(&mut self) {
        self.closed = false;
        self.pending = None;
    }

    pub(crate) fn slave_mut(&mut self, id: SlaveId) -> &mut SimSlave {
        self.slaves.entry(id).or_default()
    }

    pub(crate) fn set_register(&mut self, id: SlaveId, address: Address, value: Word) {
        self.slave_mut(id).registers.insert(address, value);
    }

    pub(crate) fn register(&self, id: SlaveId, address: Address) -> Option<Word> {
        self.slaves.get(&id)?.registers.get(&address).copied()
    }

    fn handle(&mut self, req: &[u8]) -> Option<Vec<u8>> {
        let (&cs, head) = req.split_last()?;
        assert_eq!(checksum(head), cs, "invalid checksum in {req:02X?}");
        let (slave, fn_code) = (head[0], head[1]);
        let address = BigEndian::read_u16(&head[2..4]);
        let count = BigEndian::read_u16(&head[4..6]);
        let data = head.get(7..).unwrap_or_default();

        if slave == BROADCAST {
            self.broadcasts.push((address, data.to_vec()));
            return None;
        }

        let s = self.slaves.get_mut(&slave)?;
        let behavior = s.behavior?;
        let answer = match behavior {
            Behavior::Answer => true,
            Behavior::Reject => false,
            Behavior::Garble => {
                return Some(garbled(slave, fn_code));
            }
            Behavior::GarbleTimes(n) => {
                if n > 0 {
                    s.behavior = Some(Behavior::GarbleTimes(n - 1));
                    return Some(garbled(slave, fn_code));
                }
                true
            }
        };

        let mut rsp = CommandBuffer::new();
        rsp.push_u8(slave).push_u8(fn_code);
        match FunctionCode::new(fn_code) {
            FunctionCode::ReadResults if answer => {
                rsp.push_u8((count * 2) as u8);
                for offset in 0..count {
                    let value = s.registers.get(&(address + offset)).copied();
                    rsp.push_u16(value.unwrap_or_default());
                }
            }
            FunctionCode::ReadResults => {
                rsp.push_u8(0);
            }
            FunctionCode::WriteRegisters => {
                if answer {
                    for (offset, chunk) in data.chunks(2).enumerate() {
                        let value = (u16::from(chunk[0]) << 8)
                            | u16::from(chunk.get(1).copied().unwrap_or_default());
                        s.registers.insert(address + offset as u16, value);
                    }
                }
                rsp.push_u16(address).push_u16(if answer { count } else { 0 });
            }
            FunctionCode::Custom(_) => return None,
        }
        Some(rsp.finish())
    }
}

fn garbled(slave: SlaveId, fn_code: u8) -> Vec<u8> {
    let mut rsp = CommandBuffer::new();
    rsp.push_u8(slave).push_u8(fn_code).push_u8(0);
    let mut rsp = rsp.finish();
    if let Some(cs) = rsp.last_mut() {
        *cs = !*cs;
    }
    rsp
}

impl Transport for SimBus {
    fn send(&mut self, payload: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::PortNotOpen);
        }
        if self.broken {
            self.broken = false;
            self.closed = true;
            self.pending = None;
            return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into());
        }
        let req = decode_line(&encode_line(payload))?;
        self.sent.push(req.clone());
        self.pending = self.handle(&req);
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        if self.closed {
            return Err(Error::PortNotOpen);
        }
        let rsp = self.pending.take().ok_or(Error::Timeout)?;
        decode_line(&encode_line(&rsp))
    }
}
