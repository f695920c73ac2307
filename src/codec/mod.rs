// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire codecs

use crate::error::*;

pub mod ascii;

/// First character of every line on the wire.
pub const LINE_START: char = ':';

/// Line terminator on the wire.
pub const LINE_END: &str = "\r\n";

/// Upper bound for one line: start character, two hex digits for each
/// byte of the longest command (7 header bytes, 255 data bytes, checksum)
/// and the terminator.
pub const MAX_LINE_LEN: usize = 1 + 2 * (7 + 255 + 1) + 2;
