// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ASCII hex line framing
//!
//! Every frame travels as one line: a `:`, two hex digits per byte without
//! separators and a `\r\n` terminator.

use hex::FromHexError;

use super::*;

/// Render `bytes` as one line (uppercase hex digits).
#[must_use]
pub fn encode_line(bytes: &[u8]) -> String {
    let mut line = String::with_capacity(1 + bytes.len() * 2 + LINE_END.len());
    line.push(LINE_START);
    line.push_str(&hex::encode_upper(bytes));
    line.push_str(LINE_END);
    line
}

/// Extract the bytes of a received line.
///
/// Searches for a `:` followed by one or more hex digit pairs and a `\r`.
/// Anything around that is ignored. A line without such a frame decodes to
/// no bytes at all; the caller treats it like any other reply that does not
/// match.
pub fn decode_line(line: &str) -> Result<Vec<u8>> {
    let bytes = line.as_bytes();
    for (start, _) in line.match_indices(LINE_START) {
        let digits = &line[start + 1..];
        let cnt = digits.bytes().take_while(u8::is_ascii_hexdigit).count();
        if cnt == 0 || cnt % 2 != 0 {
            continue;
        }
        if bytes.get(start + 1 + cnt) != Some(&b'\r') {
            continue;
        }
        return decode_hex(&digits[..cnt]);
    }
    if !line.trim().is_empty() {
        debug!("No frame in line {line:?}");
    }
    Ok(Vec::new())
}

/// Decode a string of hex digit pairs (either case).
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(s).map_err(|err| hex_error(s, err))
}

/// Value of a two digit hex string.
pub fn hex_byte(s: &str) -> Result<u8> {
    match decode_hex(s)?.as_slice() {
        [b] => Ok(*b),
        _ => Err(Error::HexLength(s.chars().count())),
    }
}

fn hex_error(s: &str, err: FromHexError) -> Error {
    match err {
        FromHexError::InvalidHexCharacter { c, .. } => Error::InvalidHexDigit(c),
        _ => Error::HexLength(s.chars().count()),
    }
}
