//! Query scanner (tokenizer).
//!
//! Converts a character stream into classified tokens, one per call. Runs of
//! whitespace and identifier characters are consumed greedily; every other
//! character becomes a token on its own.

use std::fmt;

use crate::source::{CharSource, StrSource, unwrap_infallible};

/// A token in a search string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A character with no meaning in the query language.
    Illegal(char),

    /// The character stream is exhausted.
    EndOfInput,

    /// A run of spaces, tabs and newlines.
    Whitespace(String),

    /// A bare word: an ASCII letter followed by letters, digits or `_`.
    Literal(String),

    /// Left parenthesis.
    LeftParen,

    /// Right parenthesis.
    RightParen,

    /// A straight or curved double quote.
    QuoteMark,

    /// The `AND` keyword (case-sensitive).
    And,

    /// The `OR` keyword (case-sensitive).
    Or,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Illegal(ch) => write!(f, "{ch}"),
            Self::EndOfInput => Ok(()),
            Self::Whitespace(text) | Self::Literal(text) => f.write_str(text),
            Self::LeftParen => f.write_str("("),
            Self::RightParen => f.write_str(")"),
            Self::QuoteMark => f.write_str("\""),
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
        }
    }
}

/// Lexical scanner over a character source.
#[derive(Debug)]
pub struct Scanner<S> {
    /// Where characters come from.
    source: S,
    /// One character of lookahead returned by `unread`.
    pending: Option<char>,
}

impl<S: CharSource> Scanner<S> {
    /// Creates a scanner reading from `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            pending: None,
        }
    }

    /// Returns the next token. Repeats `EndOfInput` once the source is
    /// exhausted.
    pub fn scan(&mut self) -> Result<Token, S::Error> {
        let Some(ch) = self.read()? else {
            return Ok(Token::EndOfInput);
        };

        if is_whitespace(ch) {
            return self.scan_whitespace(ch);
        }
        if ch.is_ascii_alphabetic() {
            return self.scan_ident(ch);
        }

        Ok(match ch {
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            '"' | '\u{201C}' | '\u{201D}' => Token::QuoteMark,
            other => Token::Illegal(other),
        })
    }

    /// Consumes a whitespace run starting with `first`.
    fn scan_whitespace(&mut self, first: char) -> Result<Token, S::Error> {
        let mut text = String::from(first);

        while let Some(ch) = self.read()? {
            if !is_whitespace(ch) {
                self.unread(ch);
                break;
            }
            text.push(ch);
        }

        Ok(Token::Whitespace(text))
    }

    /// Consumes an identifier run starting with `first` and classifies it as
    /// a keyword or a literal.
    fn scan_ident(&mut self, first: char) -> Result<Token, S::Error> {
        let mut word = String::from(first);

        while let Some(ch) = self.read()? {
            if !is_ident_char(ch) {
                self.unread(ch);
                break;
            }
            word.push(ch);
        }

        Ok(match word.as_str() {
            "AND" => Token::And,
            "OR" => Token::Or,
            _ => Token::Literal(word),
        })
    }

    /// Reads the next character, preferring one that was put back.
    fn read(&mut self) -> Result<Option<char>, S::Error> {
        match self.pending.take() {
            Some(ch) => Ok(Some(ch)),
            None => self.source.next_char(),
        }
    }

    /// Puts a character back so the next `read` returns it.
    fn unread(&mut self, ch: char) {
        debug_assert!(self.pending.is_none(), "only one character of lookahead");
        self.pending = Some(ch);
    }
}

/// Returns true for the whitespace characters the query language knows.
fn is_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n')
}

/// Returns true for characters that may continue an identifier.
fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Tokenizes a string, including whitespace tokens and excluding the final
/// `EndOfInput`.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut scanner = Scanner::new(StrSource::new(input));
    let mut tokens = Vec::new();

    loop {
        match unwrap_infallible(scanner.scan()) {
            Token::EndOfInput => return tokens,
            token => tokens.push(token),
        }
    }
}
