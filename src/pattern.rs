use std::fmt;

/// What a single automaton node tests the input against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    Byte(u8),
    Any,
    Whitespace,
    EndOfInput,
    StartOfInput,
}

/// A single-character test, optionally inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pattern {
    pub class: Class,
    pub invert: bool,
}

impl Pattern {
    pub const ANY: Pattern = Pattern::new(Class::Any);
    pub const WHITESPACE: Pattern = Pattern::new(Class::Whitespace);
    pub const START: Pattern = Pattern::new(Class::StartOfInput);
    pub const END: Pattern = Pattern::new(Class::EndOfInput);
    /// Fails on every input.
    pub const NEVER: Pattern = Pattern::ANY.inverted();

    pub const fn new(class: Class) -> Self {
        Self {
            class,
            invert: false,
        }
    }

    pub const fn byte(b: u8) -> Self {
        Self::new(Class::Byte(b))
    }

    pub const fn inverted(self) -> Self {
        Self {
            class: self.class,
            invert: !self.invert,
        }
    }

    /// Whether a successful test advances the cursor. Anchors don't.
    pub fn consumes(&self) -> bool {
        !matches!(self.class, Class::StartOfInput | Class::EndOfInput)
    }

    /// Tests the pattern at cursor `pos`; `byte` is `None` at end of input.
    ///
    /// Consuming tests never match at end of input, inverted or not.
    pub fn matches(&self, byte: Option<u8>, pos: usize) -> bool {
        let hit = match (self.class, byte) {
            (Class::StartOfInput, _) => pos == 0,
            (Class::EndOfInput, b) => b.is_none(),
            (_, None) => return false,
            (Class::Any, Some(_)) => true,
            (Class::Whitespace, Some(b)) => is_space(b),
            (Class::Byte(c), Some(b)) => c == b,
        };
        hit != self.invert
    }
}

/// Same set as C's `isspace` in the "C" locale.
fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.invert {
            f.write_str("!")?;
        }
        match self.class {
            Class::Byte(b) if b.is_ascii_graphic() || b == b' ' => write!(f, "'{}'", b as char),
            Class::Byte(b) => write!(f, "{b:#04x}"),
            Class::Any => f.write_str("ANY"),
            Class::Whitespace => f.write_str("SPACE"),
            Class::EndOfInput => f.write_str("END"),
            Class::StartOfInput => f.write_str("START"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn byte() {
        let p = Pattern::byte(b'a');
        assert!(p.matches(Some(b'a'), 3));
        assert!(!p.matches(Some(b'b'), 3));
        assert!(!p.matches(None, 3));

        let p = p.inverted();
        assert!(!p.matches(Some(b'a'), 0));
        assert!(p.matches(Some(b'b'), 0));
        // Inverted consuming tests still fail at the end.
        assert!(!p.matches(None, 0));
    }

    #[test]
    fn classes() {
        assert!(Pattern::ANY.matches(Some(0), 0));
        assert!(!Pattern::ANY.matches(None, 0));
        assert!(!Pattern::NEVER.matches(Some(b'x'), 0));
        assert!(!Pattern::NEVER.matches(None, 0));

        for b in [b' ', b'\t', b'\n', 0x0b, 0x0c, b'\r'] {
            assert!(Pattern::WHITESPACE.matches(Some(b), 1));
        }
        assert!(!Pattern::WHITESPACE.matches(Some(b'x'), 1));
        assert!(Pattern::WHITESPACE.inverted().matches(Some(b'x'), 1));
    }

    #[test]
    fn anchors() {
        assert!(Pattern::START.matches(Some(b'a'), 0));
        assert!(!Pattern::START.matches(Some(b'a'), 1));
        assert!(Pattern::END.matches(None, 4));
        assert!(!Pattern::END.matches(Some(b'a'), 4));
        assert!(!Pattern::START.consumes());
        assert!(!Pattern::END.consumes());
        assert!(Pattern::ANY.consumes());
    }

    #[test]
    fn display() {
        assert_eq!(Pattern::byte(b'r').to_string(), "'r'");
        assert_eq!(Pattern::byte(b'\n').to_string(), "0x0a");
        assert_eq!(Pattern::WHITESPACE.to_string(), "SPACE");
        assert_eq!(Pattern::NEVER.to_string(), "!ANY");
        assert_eq!(Pattern::byte(b'a').inverted().to_string(), "!'a'");
    }
}
