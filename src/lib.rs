// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![doc = include_str!("../README.md")]

#[macro_use]
extern crate log;

mod codec;
mod error;
mod frame;

pub mod command;
pub mod discovery;
pub mod engine;
pub mod master;
pub mod settings;
pub mod transport;

pub use codec::ascii;
pub use command::Query;
pub use engine::{Engine, Reply};
pub use error::*;
pub use frame::*;
pub use master::{CommandResult, Master};
pub use settings::{LogLevel, Settings};
pub use transport::{SerialTransport, Transport};
