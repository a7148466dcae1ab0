//! Character streams consumed by the scanner.
//!
//! The scanner reads strictly left to right, one code point at a time, so a
//! source only has to hand out the next character or report end of input.

use std::{
    collections::VecDeque,
    convert::Infallible,
    io::{BufReader, Bytes, Read},
    str::{self, Chars},
};

use crate::error::ReadError;

/// A sequential source of characters.
pub trait CharSource {
    /// Error raised when the next character cannot be produced.
    type Error;

    /// Returns the next character, or `None` at end of input.
    fn next_char(&mut self) -> Result<Option<char>, Self::Error>;
}

impl<S: CharSource + ?Sized> CharSource for &mut S {
    type Error = S::Error;

    fn next_char(&mut self) -> Result<Option<char>, Self::Error> {
        (**self).next_char()
    }
}

/// Unwraps the result of reading from a source that cannot fail.
pub fn unwrap_infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

/// Characters of an in-memory string. Never fails.
#[derive(Debug, Clone)]
pub struct StrSource<'a> {
    /// Remaining characters.
    chars: Chars<'a>,
}

impl<'a> StrSource<'a> {
    /// Creates a source over `input`.
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars(),
        }
    }
}

impl CharSource for StrSource<'_> {
    type Error = Infallible;

    fn next_char(&mut self) -> Result<Option<char>, Infallible> {
        Ok(self.chars.next())
    }
}

/// Characters decoded as UTF-8 from a byte reader.
///
/// The reader is buffered internally and decoded one code point per call,
/// so the whole input is never held in memory. A byte that does not start a
/// valid sequence decodes to U+FFFD and only that byte is consumed.
#[derive(Debug)]
pub struct ReaderSource<R> {
    /// Buffered byte stream.
    bytes: Bytes<BufReader<R>>,
    /// Bytes read ahead while rejecting an invalid sequence.
    pushback: VecDeque<u8>,
}

impl<R: Read> ReaderSource<R> {
    /// Creates a source reading from `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            bytes: BufReader::new(reader).bytes(),
            pushback: VecDeque::new(),
        }
    }

    /// Pulls one byte, preferring bytes that were pushed back.
    fn next_byte(&mut self) -> Result<Option<u8>, ReadError> {
        if let Some(byte) = self.pushback.pop_front() {
            return Ok(Some(byte));
        }
        Ok(self.bytes.next().transpose()?)
    }
}

impl<R: Read> CharSource for ReaderSource<R> {
    type Error = ReadError;

    fn next_char(&mut self) -> Result<Option<char>, ReadError> {
        let Some(lead) = self.next_byte()? else {
            return Ok(None);
        };

        let width = utf8_width(lead);
        if width == 0 {
            return Ok(Some(char::REPLACEMENT_CHARACTER));
        }

        let mut buf = [lead, 0, 0, 0];
        let mut len = 1;
        while len < width {
            let Some(byte) = self.next_byte()? else {
                break;
            };
            buf[len] = byte;
            len += 1;
        }

        if let Ok(decoded) = str::from_utf8(&buf[..len]) {
            return Ok(decoded.chars().next());
        }

        // Keep only the lead byte consumed; the rest are read again.
        for &byte in buf[1..len].iter().rev() {
            self.pushback.push_front(byte);
        }
        Ok(Some(char::REPLACEMENT_CHARACTER))
    }
}

/// Returns the encoded length implied by a UTF-8 lead byte, or 0 if the byte
/// cannot start a sequence.
fn utf8_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}
