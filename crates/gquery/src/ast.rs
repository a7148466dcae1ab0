//! Query tree.
//!
//! The parser's output: a tree of nodes, each holding terms and child
//! subqueries combined under a single match requirement.

use std::{fmt, mem};

use serde::{Deserialize, Serialize};

/// How a node's terms and subqueries combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Occur {
    /// Every term and every subquery must match.
    #[default]
    Must,

    /// At least one term or subquery must match.
    Should,
}

impl fmt::Display for Occur {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Must => "MUST",
            Self::Should => "SHOULD",
        })
    }
}

/// A node of the query tree.
///
/// Terms are single words or whole phrases, kept in input order. Each
/// subquery is owned by exactly one parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Match requirement for this node.
    pub occur: Occur,
    /// Words and phrases collected directly on this node.
    pub terms: Vec<String>,
    /// Child nodes, from parentheses or an implicit `OR` split.
    pub subqueries: Vec<Self>,
}

impl Query {
    /// Creates an empty node with the given match requirement.
    pub fn new(occur: Occur) -> Self {
        Self {
            occur,
            terms: Vec::new(),
            subqueries: Vec::new(),
        }
    }

    /// Returns true if the node has neither terms nor subqueries.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.subqueries.is_empty()
    }

    /// Returns the number of levels in the tree rooted here, counting this
    /// node.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((node, level)) = pending.pop() {
            deepest = deepest.max(level);
            pending.extend(node.subqueries.iter().map(|sub| (sub, level + 1)));
        }
        deepest
    }

    /// Writes the single-line form: `{Occur:MUST, Terms:["a"], SubQueries:[...]}`.
    fn fmt_compact(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pending = vec![Step::Node(self)];

        while let Some(step) = pending.pop() {
            let node = match step {
                Step::Text(text) => {
                    f.write_str(text)?;
                    continue;
                }
                Step::Node(node) => node,
            };

            write!(f, "{{Occur:{}", node.occur)?;

            if !node.terms.is_empty() {
                f.write_str(", Terms:[")?;
                for (i, term) in node.terms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "\"{term}\"")?;
                }
                f.write_str("]")?;
            }

            if node.subqueries.is_empty() {
                f.write_str("}")?;
                continue;
            }

            f.write_str(", SubQueries:[")?;
            pending.push(Step::Text("]}"));
            for (i, sub) in node.subqueries.iter().enumerate().rev() {
                pending.push(Step::Node(sub));
                if i > 0 {
                    pending.push(Step::Text(","));
                }
            }
        }

        Ok(())
    }

    /// Writes the node as an indented tree, one line per node or term.
    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pending = vec![(self, 0)];
        while let Some((node, indent)) = pending.pop() {
            let prefix = "  ".repeat(indent);
            writeln!(f, "{prefix}{}", node.occur)?;
            for term in &node.terms {
                writeln!(f, "{prefix}  {term:?}")?;
            }
            pending.extend(node.subqueries.iter().rev().map(|sub| (sub, indent + 1)));
        }
        Ok(())
    }
}

/// Frees nested subqueries without recursing, so arbitrarily deep trees can
/// be dropped.
impl Drop for Query {
    fn drop(&mut self) {
        let mut pending = mem::take(&mut self.subqueries);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.subqueries);
        }
    }
}

/// Pending work while rendering the single-line form.
enum Step<'a> {
    /// A node still to be written.
    Node(&'a Query),
    /// Punctuation closing or separating nodes.
    Text(&'static str),
}

/// `{}` gives the single-line form, `{:#}` an indented tree.
impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            self.fmt_tree(f)
        } else {
            self.fmt_compact(f)
        }
    }
}
