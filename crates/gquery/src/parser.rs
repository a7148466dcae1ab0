//! Query parser.
//!
//! Builds a [`Query`] tree in a single pass over the token stream. There is
//! no grammar to reject input against: every token either mutates the node
//! under the cursor, moves the cursor, or is dropped.
//!
//! # Rules (outside a phrase)
//!
//! - `(` appends a MUST child to the current node and descends into it.
//! - `)` ascends one level; at the root it does nothing.
//! - A word becomes a term of the current node.
//! - `AND` forces the current node to MUST once it holds a term.
//! - `OR` makes the current node SHOULD. At the root, when more than one
//!   term has been collected and the root is still MUST, it instead opens a
//!   SHOULD child that receives every later term. Earlier terms stay on the
//!   root.
//!
//! Between quote marks, words and keywords are collected as phrase words and
//! parentheses are dropped. The closing quote joins the words with single
//! spaces into one term.

use std::io::Read;

use tracing::{debug, trace};

use crate::{
    ast::{Occur, Query},
    error::ReadError,
    lexer::{Scanner, Token},
    source::{CharSource, ReaderSource, StrSource, unwrap_infallible},
};

/// Scanner wrapper that can push back the most recent token.
#[derive(Debug)]
pub struct TokenBuffer<S> {
    /// Underlying scanner.
    scanner: Scanner<S>,
    /// The token most recently returned by `scan`.
    last: Option<Token>,
    /// A token pushed back by `unscan`, returned by the next `scan`.
    pending: Option<Token>,
}

impl<S: CharSource> TokenBuffer<S> {
    /// Creates a buffer over `scanner`.
    pub fn new(scanner: Scanner<S>) -> Self {
        Self {
            scanner,
            last: None,
            pending: None,
        }
    }

    /// Returns the pushed-back token if there is one, otherwise the next
    /// token from the scanner.
    pub fn scan(&mut self) -> Result<Token, S::Error> {
        let token = match self.pending.take() {
            Some(token) => token,
            None => self.scanner.scan()?,
        };
        self.last = Some(token.clone());
        Ok(token)
    }

    /// Pushes the most recently scanned token back. Only one token can be
    /// pushed back between two calls to `scan`; further calls do nothing.
    pub fn unscan(&mut self) {
        if self.pending.is_none() {
            self.pending = self.last.take();
        }
    }

    /// Returns the next token that is not whitespace.
    pub fn scan_ignore_whitespace(&mut self) -> Result<Token, S::Error> {
        loop {
            let token = self.scan()?;
            if !matches!(token, Token::Whitespace(_)) {
                return Ok(token);
            }
        }
    }
}

/// A node under construction. Children are arena indices.
#[derive(Debug)]
struct Node {
    /// Match requirement for this node.
    occur: Occur,
    /// Words and phrases collected on this node.
    terms: Vec<String>,
    /// Arena indices of the child nodes, in order.
    children: Vec<usize>,
}

impl Node {
    /// Creates an empty node.
    fn new(occur: Occur) -> Self {
        Self {
            occur,
            terms: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// Arena index of the root node.
const ROOT: usize = 0;

/// Single-pass builder of a query tree.
#[derive(Debug)]
pub struct Parser<S> {
    /// Token stream with one token of pushback.
    tokens: TokenBuffer<S>,
    /// Every node created so far; the root is at `ROOT`. A child always has
    /// a larger index than its parent.
    nodes: Vec<Node>,
    /// Arena indices of the open nodes below the root, innermost last.
    path: Vec<usize>,
    /// True between an opening and a closing quote mark.
    in_phrase: bool,
    /// Words of the phrase currently open.
    phrase_words: Vec<String>,
}

impl<S: CharSource> Parser<S> {
    /// Creates a parser reading characters from `source`.
    pub fn new(source: S) -> Self {
        Self {
            tokens: TokenBuffer::new(Scanner::new(source)),
            nodes: vec![Node::new(Occur::Must)],
            path: Vec::new(),
            in_phrase: false,
            phrase_words: Vec::new(),
        }
    }

    /// Consumes the whole source and returns the tree.
    ///
    /// Malformed queries never fail; an error here only comes from the
    /// character source.
    pub fn parse(mut self) -> Result<Query, S::Error> {
        loop {
            match self.tokens.scan_ignore_whitespace()? {
                Token::EndOfInput => return Ok(self.finish()),
                Token::QuoteMark => self.toggle_phrase(),
                Token::Literal(word) => self.push_word(word),
                keyword @ (Token::And | Token::Or) if self.in_phrase => {
                    self.phrase_words.push(keyword.to_string());
                }
                Token::LeftParen | Token::RightParen if self.in_phrase => {}
                Token::LeftParen => self.open_group(),
                Token::RightParen => self.close_group(),
                Token::And => self.apply_and(),
                Token::Or => self.apply_or(),
                Token::Illegal(ch) => trace!(?ch, "dropping unrecognized character"),
                Token::Whitespace(_) => {}
            }
        }
    }

    /// Returns the arena index of the node under the cursor.
    fn current(&self) -> usize {
        self.path.last().copied().unwrap_or(ROOT)
    }

    /// Returns the node under the cursor.
    fn current_mut(&mut self) -> &mut Node {
        let index = self.current();
        &mut self.nodes[index]
    }

    /// Appends a new child of `occur` to `parent` and moves the cursor to it.
    fn descend(&mut self, parent: usize, occur: Occur) {
        let child = self.nodes.len();
        self.nodes.push(Node::new(occur));
        self.nodes[parent].children.push(child);
        self.path.push(child);
    }

    /// Opens a phrase, or closes the open one and stores it as a term.
    fn toggle_phrase(&mut self) {
        if self.in_phrase {
            let phrase = self.phrase_words.join(" ");
            self.phrase_words.clear();
            self.current_mut().terms.push(phrase);
        }
        self.in_phrase = !self.in_phrase;
    }

    /// Adds a word to the open phrase or as a term of the current node.
    fn push_word(&mut self, word: String) {
        if self.in_phrase {
            self.phrase_words.push(word);
        } else {
            self.current_mut().terms.push(word);
        }
    }

    /// Appends a MUST child to the current node and descends into it.
    fn open_group(&mut self) {
        self.descend(self.current(), Occur::Must);
    }

    /// Ascends to the parent node, if there is one.
    fn close_group(&mut self) {
        if self.path.pop().is_none() {
            trace!("ignoring unmatched closing parenthesis");
        }
    }

    /// Forces MUST on the current node once it holds at least one term.
    fn apply_and(&mut self) {
        let current = self.current_mut();
        if !current.terms.is_empty() {
            current.occur = Occur::Must;
        }
    }

    /// Applies `OR`, splitting the root when AND has to bind tighter.
    fn apply_or(&mut self) {
        if !self.path.is_empty() {
            self.current_mut().occur = Occur::Should;
            return;
        }

        let root = &mut self.nodes[ROOT];
        if root.terms.len() > 1 && root.occur == Occur::Must {
            self.descend(ROOT, Occur::Should);
        } else {
            root.occur = Occur::Should;
        }
    }

    /// Ends the pass, discarding any phrase that was never closed, and
    /// assembles the owned tree.
    fn finish(self) -> Query {
        if self.in_phrase {
            debug!(
                words = ?self.phrase_words,
                "discarding unterminated phrase at end of input"
            );
        }
        if !self.path.is_empty() {
            debug!(
                open = self.path.len(),
                "end of input inside unclosed parentheses"
            );
        }
        assemble(self.nodes)
    }
}

/// Converts the arena into an owned tree.
///
/// Nodes are visited from the highest index down, so every child is built
/// before its parent and no recursion is needed.
fn assemble(nodes: Vec<Node>) -> Query {
    let mut built: Vec<Option<Query>> = Vec::new();
    built.resize_with(nodes.len(), || None);

    for (index, node) in nodes.into_iter().enumerate().rev() {
        let subqueries = node
            .children
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        built[index] = Some(Query {
            occur: node.occur,
            terms: node.terms,
            subqueries,
        });
    }

    built
        .first_mut()
        .and_then(Option::take)
        .unwrap_or_default()
}

/// Parses a search string into a query tree. Never fails.
pub fn parse(input: &str) -> Query {
    unwrap_infallible(Parser::new(StrSource::new(input)).parse())
}

/// Parses a search string read as UTF-8 from `reader`.
///
/// Invalid UTF-8 decodes to U+FFFD, which is dropped like any other
/// unrecognized character. Fails only if the reader itself fails.
pub fn parse_reader<R: Read>(reader: R) -> Result<Query, ReadError> {
    Parser::new(ReaderSource::new(reader)).parse()
}

#[cfg(test)]
mod tests {
    use std::{io, time::Instant};

    use super::*;

    fn node(occur: Occur, terms: &[&str], subqueries: Vec<Query>) -> Query {
        Query {
            occur,
            terms: terms.iter().map(|s| s.to_string()).collect(),
            subqueries,
        }
    }

    fn must(terms: &[&str], subqueries: Vec<Query>) -> Query {
        node(Occur::Must, terms, subqueries)
    }

    fn should(terms: &[&str], subqueries: Vec<Query>) -> Query {
        node(Occur::Should, terms, subqueries)
    }

    fn buffer(input: &str) -> TokenBuffer<StrSource<'_>> {
        TokenBuffer::new(Scanner::new(StrSource::new(input)))
    }

    #[test]
    fn buffer_unscan_replays_last_token() {
        let mut tokens = buffer("a b");
        assert_eq!(
            unwrap_infallible(tokens.scan()),
            Token::Literal("a".into())
        );
        tokens.unscan();
        assert_eq!(
            unwrap_infallible(tokens.scan()),
            Token::Literal("a".into())
        );
        assert_eq!(
            unwrap_infallible(tokens.scan()),
            Token::Whitespace(" ".into())
        );
    }

    #[test]
    fn buffer_unscan_holds_one_token() {
        let mut tokens = buffer("a b");
        unwrap_infallible(tokens.scan());
        tokens.unscan();
        tokens.unscan();
        assert_eq!(
            unwrap_infallible(tokens.scan()),
            Token::Literal("a".into())
        );
        assert_eq!(
            unwrap_infallible(tokens.scan()),
            Token::Whitespace(" ".into())
        );
    }

    #[test]
    fn buffer_unscan_before_scan_is_noop() {
        let mut tokens = buffer("x");
        tokens.unscan();
        assert_eq!(
            unwrap_infallible(tokens.scan()),
            Token::Literal("x".into())
        );
    }

    #[test]
    fn buffer_skips_whitespace() {
        let mut tokens = buffer("  \t a");
        assert_eq!(
            unwrap_infallible(tokens.scan_ignore_whitespace()),
            Token::Literal("a".into())
        );
        assert_eq!(
            unwrap_infallible(tokens.scan_ignore_whitespace()),
            Token::EndOfInput
        );
    }

    #[test]
    fn buffer_unscan_after_whitespace_skip() {
        let mut tokens = buffer(" ( a");
        assert_eq!(
            unwrap_infallible(tokens.scan_ignore_whitespace()),
            Token::LeftParen
        );
        tokens.unscan();
        assert_eq!(
            unwrap_infallible(tokens.scan_ignore_whitespace()),
            Token::LeftParen
        );
    }

    #[test]
    fn empty_input() {
        assert_eq!(parse(""), must(&[], vec![]));
        assert_eq!(parse("  \n\t "), must(&[], vec![]));
    }

    #[test]
    fn single_term() {
        assert_eq!(parse("foo"), must(&["foo"], vec![]));
    }

    #[test]
    fn words_are_must_terms() {
        assert_eq!(parse("foo bar"), must(&["foo", "bar"], vec![]));
    }

    #[test]
    fn phrase_collapses_whitespace() {
        assert_eq!(parse("\"foo   bar\""), must(&["foo bar"], vec![]));
    }

    #[test]
    fn empty_phrase_is_empty_term() {
        assert_eq!(parse("\"\" a"), must(&["", "a"], vec![]));
    }

    #[test]
    fn keywords_inside_phrase_are_words() {
        assert_eq!(
            parse("\"salt AND pepper OR vinegar\""),
            must(&["salt AND pepper OR vinegar"], vec![])
        );
    }

    #[test]
    fn illegal_chars_are_dropped() {
        assert_eq!(parse("foo, bar! 42"), must(&["foo", "bar"], vec![]));
        assert_eq!(parse("\"C++ code\""), must(&["C code"], vec![]));
    }

    #[test]
    fn and_without_terms_keeps_occur() {
        assert_eq!(parse("AND foo"), must(&["foo"], vec![]));
        assert_eq!(parse("(AND a)"), must(&[], vec![must(&["a"], vec![])]));
    }

    #[test]
    fn and_after_or_restores_must() {
        // OR with one term flips the root; a later AND with terms flips it back.
        assert_eq!(parse("a OR b AND c"), must(&["a", "b", "c"], vec![]));
    }

    #[test]
    fn and_restores_must_on_group() {
        assert_eq!(
            parse("(a OR b AND c)"),
            must(&[], vec![must(&["a", "b", "c"], vec![])])
        );
    }

    #[test]
    fn and_restores_must_on_implicit_split() {
        assert_eq!(
            parse("a b OR c AND d"),
            must(&["a", "b"], vec![must(&["c", "d"], vec![])])
        );
    }

    #[test]
    fn and_after_group_closes_applies_to_root() {
        // The root holds terms again, so AND flips it back to MUST.
        assert_eq!(
            parse("x OR (a) y AND z"),
            must(&["x", "y", "z"], vec![must(&["a"], vec![])])
        );
        // No terms on the root yet, so AND leaves it SHOULD.
        assert_eq!(
            parse("OR (a) AND b"),
            should(&["b"], vec![must(&["a"], vec![])])
        );
    }

    #[test]
    fn and_inside_group_leaves_root_alone() {
        assert_eq!(
            parse("x OR (a AND b)"),
            should(&["x"], vec![must(&["a", "b"], vec![])])
        );
    }

    #[test]
    fn leading_or_sets_should() {
        assert_eq!(parse("OR foo"), should(&["foo"], vec![]));
    }

    #[test]
    fn or_on_should_root_does_not_split() {
        assert_eq!(
            parse("a OR b c OR d"),
            should(&["a", "b", "c", "d"], vec![])
        );
    }

    #[test]
    fn implicit_split_keeps_earlier_terms_on_root() {
        assert_eq!(
            parse("a b OR c d"),
            must(&["a", "b"], vec![should(&["c", "d"], vec![])])
        );
    }

    #[test]
    fn or_inside_implicit_split_stays_should() {
        assert_eq!(
            parse("a b OR c OR d"),
            must(&["a", "b"], vec![should(&["c", "d"], vec![])])
        );
    }

    #[test]
    fn close_paren_leaves_implicit_split() {
        assert_eq!(
            parse("a b OR c) d"),
            must(&["a", "b", "d"], vec![should(&["c"], vec![])])
        );
    }

    #[test]
    fn implicit_split_appends_after_existing_groups() {
        assert_eq!(
            parse("(x) a b OR c"),
            must(
                &["a", "b"],
                vec![must(&["x"], vec![]), should(&["c"], vec![])]
            )
        );
    }

    #[test]
    fn close_paren_ascends_one_level() {
        assert_eq!(
            parse("((a) b) c"),
            must(&["c"], vec![must(&["b"], vec![must(&["a"], vec![])])])
        );
    }

    #[test]
    fn unmatched_close_paren_is_ignored() {
        assert_eq!(parse(") a ) b"), must(&["a", "b"], vec![]));
    }

    #[test]
    fn unmatched_open_paren_keeps_empty_group() {
        assert_eq!(parse("a ("), must(&["a"], vec![must(&[], vec![])]));
    }

    #[test]
    fn unterminated_phrase_is_dropped() {
        assert_eq!(parse("a \"b c"), must(&["a"], vec![]));
    }

    #[test]
    fn mixed_quote_styles_pair_up() {
        assert_eq!(parse("\u{201D}a b\""), must(&["a b"], vec![]));
    }

    #[test]
    fn parse_reader_matches_parse() {
        let input = "(apple OR pear) AND “pie crust”";
        assert_eq!(parse_reader(input.as_bytes()).unwrap(), parse(input));
    }

    #[test]
    fn parse_reader_drops_bad_utf8() {
        assert_eq!(
            parse_reader(&b"foo \xc0 bar"[..]).unwrap(),
            must(&["foo", "bar"], vec![])
        );
        assert_eq!(
            parse_reader(&b"caf\xe9 bar"[..]).unwrap(),
            must(&["caf", "bar"], vec![])
        );
    }

    #[test]
    fn parse_reader_reports_io_errors() {
        /// Reader that always fails.
        struct Broken;

        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("unplugged"))
            }
        }

        assert!(matches!(parse_reader(Broken), Err(ReadError::Io(_))));
    }

    #[test]
    fn parser_over_borrowed_source() {
        let mut source = StrSource::new("a OR b");
        let query = unwrap_infallible(Parser::new(&mut source).parse());
        assert_eq!(query, should(&["a", "b"], vec![]));
    }

    #[test]
    fn deep_nesting_is_linear() {
        let input = format!("{}x", "(".repeat(100_000));

        let start = Instant::now();
        let query = parse(&input);
        let elapsed = start.elapsed();

        assert_eq!(query.depth(), 100_001);
        assert!(
            elapsed.as_millis() < 5000,
            "Parsing 100,000 nested groups took {elapsed:?}, expected < 5s"
        );
    }

    #[test]
    fn deep_nesting_keeps_sibling_order() {
        assert_eq!(
            parse("((a) (b)) (c"),
            must(
                &[],
                vec![
                    must(&[], vec![must(&["a"], vec![]), must(&["b"], vec![])]),
                    must(&["c"], vec![]),
                ]
            )
        );
    }

    #[test]
    fn performance_many_queries() {
        let queries = [
            "foo",
            "foo bar baz",
            "\"foo   bar\"",
            "foo boo OR bar",
            "(a AND b) OR (c AND d) OR (e AND f)",
            "(apple OR pear) AND (pie OR crumble)",
            "\"parentheses (inside quotes) are ignored\"",
            "(((a",
        ];

        let start = Instant::now();
        for _ in 0..1000 {
            for query in &queries {
                let _ = parse(query);
            }
        }
        let elapsed = start.elapsed();

        assert!(
            elapsed.as_millis() < 2000,
            "Parsing 8,000 queries took {elapsed:?}, expected < 2s"
        );
    }
}
