//! Reader for the Lisp-like architecture file format.
//!
//! A file is a sequence of parenthesized sections, each opening with a
//! keyword: `(primdef (attributes (name "buf") (size 4 4)) ...)`. Lines
//! whose first non-blank character is `#` are comments. Keywords are
//! matched case-insensitively and are lowercased as they are read; leaf
//! atoms keep their spelling.

use crate::atom::Atom;
use crate::error::{Error, Result};
use combine::stream::state::{SourcePosition, State};
use combine::*;
use std::fmt;
use std::fs;
use std::path::Path;

/// Maximum nesting of parenthesized sections.
pub const MAX_DEPTH: usize = 50;

#[derive(Debug, PartialEq)]
pub enum Value {
    Leaf(String),
    Branch(LispTree),
}

impl Value {
    pub fn leaf(&self) -> Option<&str> {
        match self {
            Value::Leaf(s) => Some(s),
            Value::Branch(_) => None,
        }
    }

    pub fn branch(&self) -> Option<&LispTree> {
        match self {
            Value::Branch(t) => Some(t),
            Value::Leaf(_) => None,
        }
    }
}

/// One parenthesized section: a keyword, the 1-based line it opened on,
/// and its ordered children.
#[derive(Debug, PartialEq)]
pub struct LispTree {
    pub keyword: Atom,
    pub line: i32,
    pub values: Vec<Value>,
}

impl LispTree {
    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn is_branch(&self, i: usize) -> bool {
        matches!(self.values.get(i), Some(Value::Branch(_)))
    }

    pub fn leaf_at(&self, i: usize) -> Option<&str> {
        self.values.get(i).and_then(Value::leaf)
    }

    pub fn branches(&self) -> impl Iterator<Item = &LispTree> {
        self.values.iter().filter_map(Value::branch)
    }

    /// The single atom of a one-parameter section like `(name buf)`.
    pub fn single_leaf(&self) -> Result<&str> {
        match &self.values[..] {
            [Value::Leaf(s)] => Ok(s),
            _ => Err(Error::semantic(
                self.line,
                format!("'{}' should take a single atomic parameter", self.keyword),
            )),
        }
    }

    /// The two atoms of a two-parameter section like `(size 4 4)`.
    pub fn leaf_pair(&self) -> Result<(&str, &str)> {
        match &self.values[..] {
            [Value::Leaf(a), Value::Leaf(b)] => Ok((a, b)),
            _ => Err(Error::semantic(
                self.line,
                format!("'{}' should take two atomic parameters", self.keyword),
            )),
        }
    }

    pub fn single_num(&self) -> Result<f64> {
        parse_num(self.single_leaf()?, self.line)
    }

    pub fn single_int(&self) -> Result<i64> {
        let s = self.single_leaf()?;
        s.parse::<i64>()
            .map_err(|_| Error::semantic(self.line, format!("expected an integer, found '{}'", s)))
    }

    pub fn num_pair(&self) -> Result<(f64, f64)> {
        let (a, b) = self.leaf_pair()?;
        Ok((parse_num(a, self.line)?, parse_num(b, self.line)?))
    }
}

pub(crate) fn parse_num(s: &str, line: i32) -> Result<f64> {
    s.parse::<f64>()
        .map_err(|_| Error::semantic(line, format!("expected a number, found '{}'", s)))
}

impl fmt::Display for LispTree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}", self.keyword)?;
        for v in &self.values {
            match v {
                Value::Leaf(s) if s.is_empty() || s.contains(char::is_whitespace) => {
                    write!(f, " \"{}\"", s)?
                }
                Value::Leaf(s) => write!(f, " {}", s)?,
                Value::Branch(t) => write!(f, " {}", t)?,
            }
        }
        write!(f, ")")
    }
}

/// Cursor over the atoms of a `segment` section, erroring with the
/// section's line number when an endpoint spec is incomplete. Endpoint
/// specs may be written flat (`segment port a port b`) or grouped
/// (`segment (port a) (port b)`); groups are flattened into their
/// keyword followed by their atoms.
pub(crate) struct Cursor<'t> {
    line: i32,
    tokens: Vec<&'t str>,
    pos: usize,
}

impl<'t> Cursor<'t> {
    pub(crate) fn new(tree: &'t LispTree) -> Self {
        let mut tokens = Vec::with_capacity(tree.size());
        flatten(tree, &mut tokens);
        Cursor {
            line: tree.line,
            tokens,
            pos: 0,
        }
    }

    pub(crate) fn line(&self) -> i32 {
        self.line
    }

    pub(crate) fn next_leaf(&mut self) -> Result<&'t str> {
        let token = self.tokens.get(self.pos).copied();
        self.pos += 1;
        token.ok_or_else(|| Error::semantic(self.line, "incomplete net segment"))
    }

    pub(crate) fn next_num(&mut self) -> Result<f64> {
        let line = self.line;
        parse_num(self.next_leaf()?, line)
    }
}

fn flatten<'t>(tree: &'t LispTree, tokens: &mut Vec<&'t str>) {
    for v in &tree.values {
        match v {
            Value::Leaf(s) => tokens.push(s),
            Value::Branch(t) => {
                tokens.push(&t.keyword);
                flatten(t, tokens);
            }
        }
    }
}

parser! {
    fn tree_parser['a, I]()(I) -> LispTree
    where [I: combine::Stream<Item = char> +
        combine::RangeStream +
        combine::StreamOnce<Range = &'a str, Position = SourcePosition>]
    {
        use combine::parser::char::{char as cmb_char, spaces};
        use combine::parser::range;
        use combine::{many, position};

        let keyword = range::take_while1(|c: char| {
            !c.is_whitespace() && c != '(' && c != ')' && c != '"'
        })
        .map(|s: &str| Atom::from(s.to_ascii_lowercase()));

        spaces()
            .with(position())
            .skip(cmb_char('('))
            .skip(spaces())
            .and(keyword.skip(spaces()))
            .and(many(value_parser()))
            .skip(cmb_char(')'))
            .map(|((pos, keyword), values): ((SourcePosition, Atom), Vec<Value>)| {
                LispTree {
                    keyword,
                    line: pos.line,
                    values,
                }
            })
            .skip(spaces())
    }
}

parser! {
    fn value_parser['a, I]()(I) -> Value
    where [I: combine::Stream<Item = char> +
        combine::RangeStream +
        combine::StreamOnce<Range = &'a str, Position = SourcePosition>]
    {
        use combine::parser::char::{char as cmb_char, spaces};
        use combine::parser::range;

        let quoted = cmb_char('"')
            .with(range::take_while(|c: char| c != '"'))
            .skip(cmb_char('"'))
            .map(|s: &str| Value::Leaf(s.to_string()));
        let leaf = range::take_while1(|c: char| {
            !c.is_whitespace() && c != '(' && c != ')' && c != '"'
        })
        .map(|s: &str| Value::Leaf(s.to_string()));

        spaces()
            .with(choice!(quoted, leaf, tree_parser().map(Value::Branch)))
            .skip(spaces())
    }
}

/// Blank out full-line comments while keeping line numbering intact.
fn mask_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if !line.trim_start().starts_with('#') {
            out.push_str(line);
        }
    }
    out
}

fn check_depth(tree: &LispTree, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::structure(
            tree.line,
            format!("nesting too deep (more than {})", MAX_DEPTH),
        ));
    }
    for b in tree.branches() {
        check_depth(b, depth + 1)?;
    }
    Ok(())
}

/// Read an architecture file into a synthetic `top` tree whose children
/// are the file's top-level sections.
pub fn read_path(path: &Path) -> Result<LispTree> {
    let text = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_str(&text)
}

pub fn read_str(text: &str) -> Result<LispTree> {
    let masked = mask_comments(text);
    if masked.trim().is_empty() {
        return Ok(LispTree {
            keyword: atom!("top"),
            line: 0,
            values: Vec::new(),
        });
    }
    let mut parser = many::<Vec<LispTree>, _>(tree_parser());
    let (tops, rest) = parser
        .easy_parse(State::new(masked.as_str()))
        .map_err(|e| {
            Error::structure(e.position.line, "not enough close parentheses or malformed token")
        })?;
    if !rest.input.trim_start().is_empty() {
        return Err(Error::structure(
            rest.positioner.line,
            "too many close parentheses",
        ));
    }

    let top = LispTree {
        keyword: atom!("top"),
        line: 0,
        values: tops.into_iter().map(Value::Branch).collect(),
    };
    for b in top.branches() {
        check_depth(b, 1)?;
    }
    Ok(top)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn leaf_count(tree: &LispTree) -> usize {
        tree.values
            .iter()
            .map(|v| match v {
                Value::Leaf(_) => 1,
                Value::Branch(t) => leaf_count(t),
            })
            .sum()
    }

    #[test]
    fn tokenizes_and_round_trips() {
        let src = "# comment line\n(primdef (attributes (name \"two words\") (size 4 4))\n  (ports (port (name a))))\n";
        let top = read_str(src).unwrap();
        // non-paren, non-comment, non-keyword atoms: "two words", 4, 4, a
        assert_eq!(leaf_count(&top), 4);

        let first = top.branches().next().unwrap();
        let reparsed = read_str(&first.to_string()).unwrap();
        assert_eq!(
            reparsed.branches().next().unwrap().to_string(),
            first.to_string()
        );
    }

    #[test]
    fn records_opening_line_numbers() {
        let top = read_str("(a)\n(b\n  (c))\n").unwrap();
        let lines: Vec<i32> = top.branches().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 2]);
        let b = top.branches().nth(1).unwrap();
        assert_eq!(b.branches().next().unwrap().line, 3);
    }

    #[test]
    fn unbalanced_input_is_a_structure_error() {
        assert!(matches!(
            read_str("(a (b)").unwrap_err(),
            Error::Structure { .. }
        ));
        assert!(matches!(
            read_str("(a))").unwrap_err(),
            Error::Structure { .. }
        ));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let depth = MAX_DEPTH + 1;
        let src = "(k ".repeat(depth) + &")".repeat(depth);
        assert!(matches!(
            read_str(&src).unwrap_err(),
            Error::Structure { .. }
        ));
    }

    #[test]
    fn quotes_are_stripped_and_keywords_lowercased() {
        let top = read_str("(Name \"hello there\")").unwrap();
        let t = top.branches().next().unwrap();
        assert_eq!(t.keyword, atom!("name"));
        assert_eq!(t.leaf_at(0), Some("hello there"));
    }
}
