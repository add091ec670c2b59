use std::fmt;

use crate::error::Error;
use crate::pattern::Pattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    /// `*`
    Star,
    /// `*?`
    LazyStar,
    /// `+`
    Plus,
    /// `+?`
    LazyPlus,
    /// `?`
    Question,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Match(Pattern),
    /// `lo-hi`, only inside a character class.
    Range(u8, u8),
    Quantifier(Quantifier),
    /// `(`
    Group,
    /// `(?:`
    NonCapturingGroup,
    /// `(?'name'`
    NamedGroup(Vec<u8>),
    /// `)`
    GroupClose,
    /// `[` or, when inverted, `[^`
    Class { invert: bool },
    /// `]`
    ClassClose,
    /// `|`
    Alternation,
}

impl TokenKind {
    pub fn is_opener(&self) -> bool {
        matches!(
            self,
            TokenKind::Group
                | TokenKind::NonCapturingGroup
                | TokenKind::NamedGroup(_)
                | TokenKind::Class { .. }
        )
    }

    pub fn is_closer(&self) -> bool {
        matches!(self, TokenKind::GroupClose | TokenKind::ClassClose)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Match(p) => write!(f, "match {p}"),
            TokenKind::Range(lo, hi) => {
                write!(f, "range {}-{}", Pattern::byte(*lo), Pattern::byte(*hi))
            }
            TokenKind::Quantifier(q) => f.write_str(match q {
                Quantifier::Star => "`*`",
                Quantifier::LazyStar => "`*?`",
                Quantifier::Plus => "`+`",
                Quantifier::LazyPlus => "`+?`",
                Quantifier::Question => "`?`",
            }),
            TokenKind::Group => f.write_str("`(`"),
            TokenKind::NonCapturingGroup => f.write_str("`(?:`"),
            TokenKind::NamedGroup(name) => {
                write!(f, "`(?'{}'`", String::from_utf8_lossy(name))
            }
            TokenKind::GroupClose => f.write_str("`)`"),
            TokenKind::Class { invert: false } => f.write_str("`[`"),
            TokenKind::Class { invert: true } => f.write_str("`[^`"),
            TokenKind::ClassClose => f.write_str("`]`"),
            TokenKind::Alternation => f.write_str("`|`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token in the pattern.
    pub offset: usize,
}

/// Cursor over the pattern bytes.
struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
    /// Offset of the opener of the class being lexed, if any.
    class: Option<usize>,
}

/// Split a pattern into tokens. Comments `(?#...)` are dropped.
pub fn lex(src: &[u8]) -> Result<Vec<Token>, Error> {
    let mut lexer = Lexer {
        src,
        pos: 0,
        tokens: Vec::new(),
        class: None,
    };

    while lexer.pos < src.len() {
        if lexer.class.is_some() {
            lexer.class_item()?;
        } else {
            lexer.item()?;
        }
    }

    if let Some(offset) = lexer.class {
        return Err(Error::lex(offset, "unterminated character class"));
    }

    Ok(lexer.tokens)
}

impl<'a> Lexer<'a> {
    fn peek(&self, n: usize) -> Option<u8> {
        self.src.get(self.pos + n).copied()
    }

    fn starts_with(&self, s: &[u8]) -> bool {
        self.src[self.pos..].starts_with(s)
    }

    fn push(&mut self, kind: TokenKind, len: usize) {
        self.tokens.push(Token {
            kind,
            offset: self.pos,
        });
        self.pos += len;
    }

    /// `\x` escape at the cursor.
    fn escape(&mut self) -> Result<(), Error> {
        let Some(c) = self.peek(1) else {
            return Err(Error::lex(self.pos, "trailing backslash"));
        };
        let pattern = match c {
            b't' => Pattern::byte(b'\t'),
            b'r' => Pattern::byte(b'\r'),
            b'n' => Pattern::byte(b'\n'),
            b'f' => Pattern::byte(0x0c),
            b's' => Pattern::WHITESPACE,
            _ => Pattern::byte(c),
        };
        self.push(TokenKind::Match(pattern), 2);
        Ok(())
    }

    fn class_item(&mut self) -> Result<(), Error> {
        let c = self.src[self.pos];
        match c {
            b']' => {
                self.class = None;
                self.push(TokenKind::ClassClose, 1);
            }
            b'\\' => self.escape()?,
            _ => match (self.peek(1), self.peek(2)) {
                (Some(b'-'), Some(hi)) if hi != b']' => self.range(c, hi)?,
                _ => self.push(TokenKind::Match(Pattern::byte(c)), 1),
            },
        }
        Ok(())
    }

    /// `lo-hi` at the cursor.
    fn range(&mut self, lo: u8, hi: u8) -> Result<(), Error> {
        if lo > hi {
            return Err(Error::lex(self.pos, "character range out of order"));
        }
        self.push(TokenKind::Range(lo, hi), 3);
        Ok(())
    }

    fn item(&mut self) -> Result<(), Error> {
        let c = self.src[self.pos];
        // Ranges take priority, between two bytes that would be literals.
        if let (Some(b'-'), Some(hi)) = (self.peek(1), self.peek(2)) {
            if !is_special(c) && !is_special(hi) {
                return self.range(c, hi);
            }
        }
        match c {
            b'.' => self.push(TokenKind::Match(Pattern::ANY), 1),
            b'\\' => self.escape()?,
            b'*' | b'+' => {
                let lazy = self.peek(1) == Some(b'?');
                let q = match (c, lazy) {
                    (b'*', false) => Quantifier::Star,
                    (b'*', true) => Quantifier::LazyStar,
                    (_, false) => Quantifier::Plus,
                    (_, true) => Quantifier::LazyPlus,
                };
                self.push(TokenKind::Quantifier(q), if lazy { 2 } else { 1 });
            }
            b'?' => self.push(TokenKind::Quantifier(Quantifier::Question), 1),
            b'(' => self.group()?,
            b')' => self.push(TokenKind::GroupClose, 1),
            b'[' => {
                let invert = self.peek(1) == Some(b'^');
                self.class = Some(self.pos);
                self.push(TokenKind::Class { invert }, if invert { 2 } else { 1 });
            }
            b']' => self.push(TokenKind::ClassClose, 1),
            b'|' => self.push(TokenKind::Alternation, 1),
            b'^' => self.push(TokenKind::Match(Pattern::START), 1),
            b'$' => self.push(TokenKind::Match(Pattern::END), 1),
            _ => self.push(TokenKind::Match(Pattern::byte(c)), 1),
        }
        Ok(())
    }

    fn group(&mut self) -> Result<(), Error> {
        if self.starts_with(b"(?:") {
            self.push(TokenKind::NonCapturingGroup, 3);
        } else if self.starts_with(b"(?'") {
            let name_start = self.pos + 3;
            let Some(len) = self.src[name_start..].iter().position(|&b| b == b'\'') else {
                return Err(Error::lex(self.pos, "unterminated group name"));
            };
            let name = self.src[name_start..name_start + len].to_vec();
            self.push(TokenKind::NamedGroup(name), len + 4);
        } else if self.starts_with(b"(?#") {
            let Some(len) = self.src[self.pos..].iter().position(|&b| b == b')') else {
                return Err(Error::lex(self.pos, "unterminated comment"));
            };
            self.pos += len + 1;
        } else if self.peek(1) == Some(b'?') {
            return Err(Error::lex(self.pos, "unrecognized group syntax"));
        } else {
            self.push(TokenKind::Group, 1);
        }
        Ok(())
    }
}

/// Bytes with a meaning of their own outside a class.
fn is_special(c: u8) -> bool {
    matches!(
        c,
        b'.' | b'\\' | b'*' | b'+' | b'?' | b'(' | b')' | b'[' | b']' | b'|' | b'^' | b'$'
    )
}
