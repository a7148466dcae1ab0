//! Google-style boolean search strings parsed into a query tree.
//!
//! The accepted syntax:
//!
//! - **Terms**: `rust` - words made of ASCII letters, digits and `_`
//! - **Phrases**: `"error handling"` or `“error handling”` - one term
//! - **AND**: `rust AND golang` - every term must match (also the default)
//! - **OR**: `rust OR golang` - at least one must match; AND binds tighter
//! - **Grouping**: `(a AND b) OR (c AND d)` - nested subqueries
//!
//! Keywords are case-sensitive. Parsing never fails: unknown characters are
//! dropped, unmatched parentheses are tolerated and an unterminated phrase
//! is discarded.
//!
//! # Example
//!
//! ```
//! use gquery::{Occur, parse};
//!
//! let query = parse("(apple OR pear) AND (pie OR crumble)");
//! assert_eq!(query.occur, Occur::Must);
//! assert_eq!(
//!     query.to_string(),
//!     r#"{Occur:MUST, SubQueries:[{Occur:SHOULD, Terms:["apple","pear"]},{Occur:SHOULD, Terms:["pie","crumble"]}]}"#
//! );
//! ```

#![warn(missing_docs)]

mod ast;
mod error;
mod lexer;
mod parser;
mod source;

pub use ast::{Occur, Query};
pub use error::ReadError;
pub use lexer::{Scanner, Token, tokenize};
pub use parser::{Parser, TokenBuffer, parse, parse_reader};
pub use source::{CharSource, ReaderSource, StrSource};
