use std::{borrow::Cow, fmt::Display};

use crate::error::ParseError;

mod lexer;
mod parser;

/// A KiCad S-expression borrowing from the source text.
///
/// Quoted strings keep their escape sequences and lose their quotes.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SExpr<'a> {
    SExpr(&'a str, Box<[SExpr<'a>]>),
    String(&'a str),
}

impl<'a> Display for SExpr<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SExpr::SExpr(label, children) => {
                write!(f, "({}", label)?;
                for child in children {
                    write!(f, " {}", child)?;
                }
                write!(f, ")")
            }
            SExpr::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl<'a> SExpr<'a> {
    pub fn label(&self) -> Option<&'a str> {
        match self {
            SExpr::SExpr(label, _) => Some(label),
            SExpr::String(_) => None,
        }
    }

    /// First string argument of the child labeled `label`
    pub fn value(&self, label: &str) -> Result<&'a str, ParseError> {
        self.child(label)?
            .arg(0)
            .ok_or(ParseError::MissingValue())
    }

    /// The `index`th bare or quoted string argument of this node
    pub fn arg(&self, index: usize) -> Option<&'a str> {
        self.args().nth(index)
    }

    pub fn args(&self) -> impl Iterator<Item = &'a str> + '_ {
        let children: &[SExpr<'a>] = match self {
            SExpr::SExpr(_, children) => &children[..],
            SExpr::String(_) => &[],
        };
        children.iter().filter_map(|child| match child {
            SExpr::String(s) => Some(*s),
            SExpr::SExpr(_, _) => None,
        })
    }

    /// The `index`th string argument parsed as a float
    pub fn float_arg(&self, index: usize) -> Result<f64, ParseError> {
        let s = self.arg(index).ok_or(ParseError::MissingValue())?;
        s.parse()
            .map_err(|_| ParseError::InvalidNumber(s.to_owned()))
    }

    pub fn children<'b, 'c>(&'b self, label: &'c str) -> LabeledChildIterator<'a, 'b, 'c> {
        let iter = match self {
            SExpr::String(_) => None,
            SExpr::SExpr(_, children) => Some(children.iter()),
        };
        LabeledChildIterator { iter, label }
    }

    pub fn child<'b>(&self, label: &'b str) -> Result<&SExpr<'a>, ParseError> {
        let mut iter = self.children(label);
        iter.next()
            .ok_or(ParseError::MissingChild(label.to_owned()))
    }

    /// Every node labeled `label` below this one, depth first, without
    /// descending into matches.
    pub fn descendants<'b>(&'b self, label: &'b str) -> Vec<&'b SExpr<'a>> {
        let mut found = Vec::new();
        self.collect_descendants(label, &mut found);
        found
    }

    fn collect_descendants<'b>(&'b self, label: &str, found: &mut Vec<&'b SExpr<'a>>) {
        if let SExpr::SExpr(_, children) = self {
            for child in children.iter() {
                match child.label() {
                    Some(l) if l == label => found.push(child),
                    Some(_) => child.collect_descendants(label, found),
                    None => {}
                }
            }
        }
    }
}

/// Byte range of `part` within `input`, if `part` was borrowed from it.
pub fn span_of(input: &str, part: &str) -> Option<std::ops::Range<usize>> {
    let start = (part.as_ptr() as usize).checked_sub(input.as_ptr() as usize)?;
    let end = start + part.len();
    (end <= input.len()).then_some(start..end)
}

/// Text of a quoted string with its `\"`, `\\` and `\n` escapes resolved
pub fn unescape(quoted: &str) -> Cow<'_, str> {
    if !quoted.contains('\\') {
        return Cow::Borrowed(quoted);
    }
    let mut text = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            text.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => text.push('\n'),
            Some(escaped) => text.push(escaped),
            None => text.push('\\'),
        }
    }
    Cow::Owned(text)
}

#[derive(Debug)]
pub struct LabeledChildIterator<'a, 'b, 'c> {
    iter: Option<std::slice::Iter<'b, SExpr<'a>>>,
    label: &'c str,
}

impl<'a, 'b, 'c> Iterator for LabeledChildIterator<'a, 'b, 'c> {
    type Item = &'b SExpr<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let iter = self.iter.as_mut()?;
        loop {
            let item = iter.next();
            match &item {
                None => return None,
                Some(SExpr::String(_)) => continue,
                Some(SExpr::SExpr(label, _)) => {
                    if *label == self.label {
                        return item;
                    }
                }
            }
        }
    }
}

impl<'a> TryFrom<&'a String> for SExpr<'a> {
    type Error = ParseError;

    fn try_from(input: &'a String) -> Result<Self, Self::Error> {
        SExpr::try_from(input.as_str())
    }
}
