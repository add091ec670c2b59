use std::fmt;

use thiserror::Error;

/// The stage of compilation that rejected a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unrecognized syntax, unterminated class, group name or comment.
    Lex,
    /// Malformed or unbalanced structure.
    Parse,
    /// A construct that parses but cannot be compiled (named groups, greedy
    /// repetition, repetition of an expression that can match empty).
    Unsupported,
    /// Two alternatives start with the same test.
    Ambiguous,
    /// The pattern exceeds a configured limit.
    TooComplex,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Lex => "lex error",
            ErrorKind::Parse => "parse error",
            ErrorKind::Unsupported => "unsupported construct",
            ErrorKind::Ambiguous => "ambiguous alternation",
            ErrorKind::TooComplex => "pattern too complex",
        };
        f.write_str(name)
    }
}

/// A single compilation error located at a byte offset of the pattern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message} at offset {offset}")]
pub struct Error {
    pub kind: ErrorKind,
    pub offset: usize,
    pub message: String,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, offset: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn lex(offset: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Lex, offset, message)
    }

    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, offset, message)
    }
}

/// Every error reported by one compilation, in the order they were found.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct Errors(Vec<Error>);

impl Errors {
    pub(crate) fn new(errors: Vec<Error>) -> Self {
        debug_assert!(!errors.is_empty());
        Self(errors)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&Error> {
        self.0.first()
    }

    /// Returns true if any of the errors is of the given kind.
    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.0.iter().any(|e| e.kind == kind)
    }
}

impl From<Error> for Errors {
    fn from(error: Error) -> Self {
        Self(vec![error])
    }
}

impl IntoIterator for Errors {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Errors {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}
