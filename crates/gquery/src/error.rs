//! Error types for reading query input.
//!
//! Query syntax itself never fails to parse. The only failures come from the
//! character stream underneath the scanner.

use std::io;

use thiserror::Error;

/// Errors raised while pulling characters from a byte reader.
///
/// Invalid UTF-8 is not an error; it decodes to U+FFFD.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The underlying reader failed.
    #[error("failed to read query input: {0}")]
    Io(#[from] io::Error),
}
