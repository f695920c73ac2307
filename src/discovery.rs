// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slave discovery
//!
//! Every address of the scan range is probed with an identity read. Slaves
//! that reply with garbage are told which addresses are already taken by a
//! presence broadcast and probed again in the next round.

use std::{collections::BTreeSet, ops::RangeInclusive};

use byteorder::{BigEndian, ByteOrder};

use crate::{command::Query, engine::Engine, error::*, frame::*, transport::Transport};

/// Upper bound of probing rounds.
pub const MAX_ROUNDS: usize = 3;

/// The addresses that take part in discovery.
pub const SCAN_RANGE: RangeInclusive<SlaveId> = 1..=32;

/// Register address of the 8 byte identity (serial number).
pub const IDENTITY_ADDRESS: Address = 2;

/// Size of the identity in registers.
pub const IDENTITY_WORDS: u16 = 4;

/// Register address of the presence mask broadcast.
pub const PRESENCE_ADDRESS: Address = 1;

/// Query for the identity of `slave`.
pub fn identity_query(slave: SlaveId) -> Result<Query> {
    Query::read(slave, IDENTITY_ADDRESS, IDENTITY_WORDS)
}

/// Bit `i` is set if address `i + 1` is in `detected`.
///
/// Addresses outside of [`SCAN_RANGE`] are ignored.
#[must_use]
pub fn presence_mask<'a>(detected: impl IntoIterator<Item = &'a SlaveId>) -> u32 {
    detected
        .into_iter()
        .filter(|id| SCAN_RANGE.contains(*id))
        .fold(0, |mask, id| mask | (1_u32 << (id - 1)))
}

/// Broadcast `mask` to all slaves. Nobody replies.
pub fn presence_query(mask: u32) -> Result<Query> {
    let mut data = [0; 4];
    BigEndian::write_u32(&mut data, mask);
    Ok(Query::write(BROADCAST, PRESENCE_ADDRESS, &data)?.without_responses())
}

/// What a discovery run found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryResult {
    /// Addresses that answered the identity probe.
    pub detected: BTreeSet<SlaveId>,
    /// Addresses that replied but not properly in the last round.
    pub problem: BTreeSet<SlaveId>,
    /// Number of rounds that were run.
    pub rounds: usize,
}

/// Find all slaves on the bus.
///
/// A round probes every address that is not yet detected. A timeout means
/// there is nobody, anything else than a success marks the address as a
/// problem. The run stops after a round without problems or after
/// [`MAX_ROUNDS`] rounds. Each round with problems ends with a presence
/// broadcast of all addresses detected so far.
pub fn detect_slaves<T: Transport>(engine: &Engine<T>) -> Result<DiscoveryResult> {
    let mut res = DiscoveryResult::default();

    while res.rounds < MAX_ROUNDS {
        res.rounds += 1;
        res.problem.clear();

        for slave in SCAN_RANGE {
            if res.detected.contains(&slave) {
                continue;
            }
            let query = identity_query(slave)?;
            match engine.probe(&query).outcome() {
                Outcome::Succeed => {
                    res.detected.insert(slave);
                }
                Outcome::Timeout => {}
                outcome => {
                    debug!("Slave {slave} replied with {outcome} to identity probe");
                    res.problem.insert(slave);
                }
            }
        }
        info!(
            "Discovery round {}: detected {:?}, problems {:?}",
            res.rounds, res.detected, res.problem
        );
        if res.problem.is_empty() {
            break;
        }

        let mask = presence_mask(&res.detected);
        let reset = presence_query(mask)?;
        let outcome = engine.execute(&reset).outcome();
        if outcome != Outcome::Succeed {
            warn!("Presence broadcast {mask:#010X} failed: {outcome}");
        }
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::sim::{Behavior, SimBus};

    #[test]
    fn mask_of_detected_slaves() {
        assert_eq!(presence_mask(&BTreeSet::new()), 0);
        assert_eq!(presence_mask(&[1]), 0x0000_0001);
        assert_eq!(presence_mask(&[1, 2, 32]), 0x8000_0003);
        assert_eq!(presence_mask(&[0, 33, 100]), 0);
    }

    #[test]
    fn presence_broadcast_payload() {
        let q = presence_query(0x8000_0003).unwrap();
        assert!(q.responses().is_empty());
        assert_eq!(
            &q.payload()[..q.payload().len() - 1],
            &[0x00, 0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x80, 0x00, 0x00, 0x03]
        );
    }

    #[test]
    fn identity_probe_payload() {
        let q = identity_query(0x20).unwrap();
        assert_eq!(&q.payload()[..6], &[0x20, 0x04, 0x00, 0x02, 0x00, 0x04]);
    }

    #[test]
    fn detect_clean_bus() {
        let bus = SimBus::new()
            .with_slave(1, Behavior::Answer)
            .with_slave(2, Behavior::Answer);
        let engine = Engine::new(bus);
        let res = detect_slaves(&engine).unwrap();
        assert_eq!(res.detected, BTreeSet::from([1, 2]));
        assert!(res.problem.is_empty());
        assert_eq!(res.rounds, 1);

        let bus = engine.into_inner();
        assert!(bus.broadcasts.is_empty());
        assert_eq!(bus.sent.len(), 32);
    }

    #[test]
    fn detect_empty_bus() {
        let engine = Engine::new(SimBus::new());
        let res = detect_slaves(&engine).unwrap();
        assert!(res.detected.is_empty());
        assert_eq!(res.rounds, 1);
    }

    #[test]
    fn rejecting_slave_is_a_problem() {
        let engine = Engine::new(SimBus::new().with_slave(9, Behavior::Reject));
        let res = detect_slaves(&engine).unwrap();
        assert!(res.detected.is_empty());
        assert_eq!(res.problem, BTreeSet::from([9]));
        assert_eq!(res.rounds, MAX_ROUNDS);
    }

    #[test]
    fn bounded_retries() {
        let bus = SimBus::new()
            .with_slave(4, Behavior::Answer)
            .with_slave(5, Behavior::Garble);
        let engine = Engine::new(bus);
        let res = detect_slaves(&engine).unwrap();
        assert_eq!(res.detected, BTreeSet::from([4]));
        assert_eq!(res.problem, BTreeSet::from([5]));
        assert_eq!(res.rounds, MAX_ROUNDS);

        let bus = engine.into_inner();
        // 32 probes in the first round, 31 in each further round
        assert_eq!(bus.sent.len(), 32 + 31 + 31 + MAX_ROUNDS);
        assert_eq!(bus.broadcasts.len(), MAX_ROUNDS);
        for (address, data) in &bus.broadcasts {
            assert_eq!(*address, PRESENCE_ADDRESS);
            assert_eq!(data, &[0x00, 0x00, 0x00, 0x08]);
        }
    }

    #[test]
    fn recover_after_transient_garbage() {
        let bus = SimBus::new()
            .with_slave(1, Behavior::Answer)
            .with_slave(3, Behavior::GarbleTimes(1));
        let engine = Engine::new(bus);
        let res = detect_slaves(&engine).unwrap();
        assert_eq!(res.detected, BTreeSet::from([1, 3]));
        assert!(res.problem.is_empty());
        assert_eq!(res.rounds, 2);

        let bus = engine.into_inner();
        assert_eq!(bus.broadcasts, vec![(PRESENCE_ADDRESS, vec![0, 0, 0, 1])]);
        // the second round only probes addresses that are still unknown
        assert_eq!(bus.sent.len(), 32 + 1 + 31);
    }

    #[test]
    fn mask_covers_all_detected_slaves() {
        let bus = SimBus::new()
            .with_slave(1, Behavior::Answer)
            .with_slave(2, Behavior::GarbleTimes(1))
            .with_slave(6, Behavior::GarbleTimes(2));
        let engine = Engine::new(bus);
        let res = detect_slaves(&engine).unwrap();
        assert_eq!(res.detected, BTreeSet::from([1, 2, 6]));
        assert_eq!(res.rounds, 3);

        let bus = engine.into_inner();
        assert_eq!(
            bus.broadcasts,
            vec![
                (PRESENCE_ADDRESS, vec![0, 0, 0, 0b01]),
                (PRESENCE_ADDRESS, vec![0, 0, 0, 0b11]),
            ]
        );
    }
}
