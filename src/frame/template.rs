// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;
use byteorder::{BigEndian, ByteOrder};

/// The location of one field inside a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpan {
    /// The index where the field starts
    pub offset: usize,
    /// Number of bytes that belong to the field
    pub len: usize,
    pub kind: FieldKind,
}

impl FieldSpan {
    /// One past the last byte of the field.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// A value a response must carry at a fixed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Byte { offset: usize, value: u8 },
    /// Big-endian word starting at `offset`.
    Word { offset: usize, value: Word },
}

impl Check {
    fn verify(self, buf: &[u8]) -> Result<(), Mismatch> {
        match self {
            Self::Byte { offset, value } => {
                let actual = buf[offset];
                if actual != value {
                    return Err(Mismatch::Byte {
                        offset,
                        expected: value,
                        actual,
                    });
                }
            }
            Self::Word { offset, value } => {
                let actual = BigEndian::read_u16(&buf[offset..offset + 2]);
                if actual != value {
                    return Err(Mismatch::Word {
                        offset,
                        expected: value,
                        actual,
                    });
                }
            }
        }
        Ok(())
    }
}

/// The first check a response failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    Length { expected: usize, actual: usize },
    Byte { offset: usize, expected: u8, actual: u8 },
    Word { offset: usize, expected: Word, actual: Word },
    Checksum { expected: u8, actual: u8 },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Mismatch::*;

        match self {
            Length { expected, actual } => {
                write!(f, "Length mismatch: expected = {expected}, actual = {actual}")
            }
            Byte {
                offset,
                expected,
                actual,
            } => write!(
                f,
                "Byte mismatch at {offset}: expected = 0x{expected:0>2X}, actual = 0x{actual:0>2X}"
            ),
            Word {
                offset,
                expected,
                actual,
            } => write!(
                f,
                "Word mismatch at {offset}: expected = 0x{expected:0>4X}, actual = 0x{actual:0>4X}"
            ),
            Checksum { expected, actual } => write!(
                f,
                "Invalid checksum: expected = 0x{expected:0>2X}, actual = 0x{actual:0>2X}"
            ),
        }
    }
}

/// The shape of one acceptable reply.
///
/// Fields are appended one after the other, so the spans never overlap and
/// the template length is always the sum of all span lengths.
///
/// A reply matches if it has exactly the template length, carries every
/// expected value and, if the template ends with a checksum field, the
/// checksum byte equals the sum of all bytes before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTemplate {
    outcome: Outcome,
    fields: Vec<FieldSpan>,
    first: [Option<usize>; FieldKind::COUNT],
    checks: Vec<Check>,
    len: usize,
}

impl ResponseTemplate {
    /// Create an empty template reporting `outcome` when it matches.
    #[must_use]
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            fields: Vec::new(),
            first: [None; FieldKind::COUNT],
            checks: Vec::new(),
            len: 0,
        }
    }

    /// Append a field of `len` bytes whose content is not checked.
    #[must_use]
    pub fn field(mut self, kind: FieldKind, len: usize) -> Self {
        let idx = &mut self.first[kind.index()];
        if idx.is_none() {
            *idx = Some(self.fields.len());
        }
        self.fields.push(FieldSpan {
            offset: self.len,
            len,
            kind,
        });
        self.len += len;
        self
    }

    /// Append a single byte field that must equal `value`.
    #[must_use]
    pub fn expect_u8(mut self, kind: FieldKind, value: u8) -> Self {
        self.checks.push(Check::Byte {
            offset: self.len,
            value,
        });
        self.field(kind, 1)
    }

    /// Append a word field that must equal `value`.
    #[must_use]
    pub fn expect_u16(mut self, kind: FieldKind, value: Word) -> Self {
        self.checks.push(Check::Word {
            offset: self.len,
            value,
        });
        self.field(kind, 2)
    }

    /// Append `count` unchecked words.
    #[must_use]
    pub fn words(self, kind: FieldKind, count: usize) -> Self {
        self.field(kind, count * 2)
    }

    /// Append the trailing checksum byte.
    #[must_use]
    pub fn checksum(self) -> Self {
        self.field(FieldKind::Checksum, 1)
    }

    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Total number of bytes of a matching reply.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldSpan] {
        &self.fields
    }

    #[must_use]
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// The first span of `kind`.
    #[must_use]
    pub fn span(&self, kind: FieldKind) -> Option<&FieldSpan> {
        self.first[kind.index()].map(|idx| &self.fields[idx])
    }

    /// Run all checks against `buf` and report the first failing one.
    pub fn validate(&self, buf: &[u8]) -> Result<(), Mismatch> {
        if buf.len() != self.len {
            return Err(Mismatch::Length {
                expected: self.len,
                actual: buf.len(),
            });
        }
        for check in &self.checks {
            check.verify(buf)?;
        }
        if let Some(span) = self.span(FieldKind::Checksum) {
            let expected = checksum(&buf[..span.offset]);
            let actual = buf[span.offset];
            if expected != actual {
                return Err(Mismatch::Checksum { expected, actual });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn matches(&self, buf: &[u8]) -> bool {
        self.validate(buf).is_ok()
    }

    /// The bytes of the first field of `kind`.
    #[must_use]
    pub fn extract<'b>(&self, kind: FieldKind, buf: &'b [u8]) -> Option<&'b [u8]> {
        let span = self.span(kind)?;
        buf.get(span.offset..span.end())
    }

    /// Extract a single byte field.
    ///
    /// # Panics
    ///
    /// Panics if the field is not exactly one byte wide.
    #[must_use]
    pub fn extract_u8(&self, kind: FieldKind, buf: &[u8]) -> Option<u8> {
        let bytes = self.extract(kind, buf)?;
        assert_eq!(bytes.len(), 1, "{kind:?} field is not a byte");
        Some(bytes[0])
    }

    /// Extract a big-endian word field.
    ///
    /// # Panics
    ///
    /// Panics if the field is not exactly two bytes wide.
    #[must_use]
    pub fn extract_u16(&self, kind: FieldKind, buf: &[u8]) -> Option<Word> {
        let bytes = self.extract(kind, buf)?;
        assert_eq!(bytes.len(), 2, "{kind:?} field is not a word");
        Some(BigEndian::read_u16(bytes))
    }

    /// Iterate over the big-endian words of a field.
    pub fn extract_words<'b>(
        &self,
        kind: FieldKind,
        buf: &'b [u8],
    ) -> Option<impl Iterator<Item = Word> + use<'b>> {
        let bytes = self.extract(kind, buf)?;
        Some(bytes.chunks_exact(2).map(BigEndian::read_u16))
    }
}
