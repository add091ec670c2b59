//! A regular expression compiler that lowers lazy patterns into a
//! stack-free automaton.
//!
//! Every automaton node is a single byte test with a success and a failure
//! target. Instead of pushing backtrack points, a failing node rewinds the
//! cursor by a distance fixed at compile time. Only patterns for which such
//! distances exist are accepted: repetition must be lazy (`*?`, `+?`) and
//! the alternatives of an alternation must start differently.
//!
//! ```
//! use lazyre::Regex;
//!
//! let re = Regex::new(r"\s*?(red|green|blue)?\s*?(car|train)\s*?").unwrap();
//! let m = re.find(b"  red    train  ");
//! assert!(m.found());
//! assert_eq!(m.group(1), Some(2..5));
//! assert_eq!(m.group(2), Some(9..14));
//! ```

use std::ffi::CStr;

use log::debug;

mod ast;
mod codegen;
mod error;
mod lexer;
mod machine;
mod parser;
mod pattern;
mod transform;

pub use crate::ast::GroupId;
pub use crate::codegen::{Automaton, AutomatonNode, Target};
pub use crate::error::{Error, ErrorKind, Errors};
pub use crate::machine::{Match, Span};
pub use crate::pattern::{Class, Pattern};

use crate::machine::Machine;

/// A compiled pattern.
#[derive(Debug, Clone)]
pub struct Regex {
    pattern: String,
    automaton: Automaton,
}

impl Regex {
    pub fn new(pattern: &str) -> Result<Self, Errors> {
        RegexBuilder::new(pattern).build()
    }

    /// Compiles a pattern that is not valid UTF-8.
    pub fn from_bytes(pattern: &[u8]) -> Result<Self, Errors> {
        RegexBuilder::from_bytes(pattern).build()
    }

    /// Matches at the start of `haystack`. Every byte, NUL included, is
    /// input.
    pub fn find(&self, haystack: &[u8]) -> Match {
        Machine::new(&self.automaton).find(haystack)
    }

    /// Matches at the start of `haystack`, which ends at its first NUL.
    pub fn find_nul_terminated(&self, haystack: &[u8]) -> Match {
        Machine::new(&self.automaton).find_nul_terminated(haystack)
    }

    pub fn find_cstr(&self, haystack: &CStr) -> Match {
        self.find_nul_terminated(haystack.to_bytes())
    }

    pub fn is_match(&self, haystack: &[u8]) -> bool {
        self.find(haystack).found()
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    /// The pattern this was compiled from. Invalid UTF-8 is replaced.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn group_count(&self) -> usize {
        self.automaton.max_group
    }
}

/// Compiles a [`Regex`] with non-default limits.
///
/// ```
/// use lazyre::{ErrorKind, RegexBuilder};
///
/// let err = RegexBuilder::new("((a))").nest_limit(1).build().unwrap_err();
/// assert_eq!(err.first().unwrap().kind, ErrorKind::Parse);
/// ```
#[derive(Debug, Clone)]
pub struct RegexBuilder {
    pattern: Vec<u8>,
    nest_limit: usize,
    size_limit: usize,
    depth_limit: usize,
}

impl RegexBuilder {
    pub fn new(pattern: &str) -> Self {
        Self::from_bytes(pattern.as_bytes())
    }

    pub fn from_bytes(pattern: &[u8]) -> Self {
        Self {
            pattern: pattern.to_vec(),
            nest_limit: 64,
            size_limit: 1 << 16,
            depth_limit: 500,
        }
    }

    /// Maximum depth of nested groups and classes.
    pub fn nest_limit(mut self, limit: usize) -> Self {
        self.nest_limit = limit;
        self
    }

    /// Maximum number of syntax tree nodes the rewrites may create. Moving
    /// what follows an alternation into each alternative can multiply the
    /// size of a pattern.
    pub fn size_limit(mut self, limit: usize) -> Self {
        self.size_limit = limit;
        self
    }

    /// Maximum depth of the syntax tree. Every element of a concatenation
    /// adds a level, so this also bounds the length of a pattern.
    pub fn depth_limit(mut self, limit: usize) -> Self {
        self.depth_limit = limit;
        self
    }

    pub fn build(&self) -> Result<Regex, Errors> {
        let tokens = lexer::lex(&self.pattern)?;
        let (mut ast, root) = parser::parse(tokens, self.nest_limit)?;
        let limits = transform::Limits {
            size: self.size_limit,
            depth: self.depth_limit,
        };
        let (root, max_group) = transform::transform(&mut ast, root, limits)?;
        let automaton = codegen::generate_code(&ast, root, max_group)?;

        let pattern = String::from_utf8_lossy(&self.pattern).into_owned();
        debug!(
            "compiled {:?}: {} nodes, {} groups",
            pattern,
            automaton.node_count(),
            max_group
        );

        Ok(Regex { pattern, automaton })
    }
}

#[cfg(test)]
mod test {
    use std::ffi::CString;

    use pretty_assertions::assert_eq;

    use super::*;

    const COLORS: &str = r"\s*?(red|green|blue)?\s*?(car|train)\s*?";
    const COLORS_SEPARATED: &str = r"\s*?(?:(red|green|blue)\s+?)?(car|train)\s*?";

    /// Both entry points, checked to agree on NUL-free input.
    fn find(re: &Regex, haystack: &str) -> Match {
        let bounded = re.find(haystack.as_bytes());
        let cstr = CString::new(haystack).unwrap();
        assert_eq!(bounded, re.find_cstr(&cstr), "{haystack:?}");
        assert_eq!(bounded, re.find_nul_terminated(cstr.as_bytes_with_nul()));
        bounded
    }

    fn groups<'h>(m: &Match, haystack: &'h str) -> Vec<Option<&'h str>> {
        (1..m.spans().len())
            .map(|i| m.group(i).map(|r| &haystack[r]))
            .collect()
    }

    fn kinds(pattern: &str) -> Vec<ErrorKind> {
        Regex::new(pattern)
            .unwrap_err()
            .iter()
            .map(|e| e.kind)
            .collect()
    }

    #[test]
    fn colors() {
        let re = Regex::new(COLORS).unwrap();
        assert_eq!(re.group_count(), 2);

        let haystack = "  red    train  ";
        let m = find(&re, haystack);
        assert!(m.found());
        assert_eq!(groups(&m, haystack), vec![Some("red"), Some("train")]);

        let haystack = "   car ";
        let m = find(&re, haystack);
        assert!(m.found());
        assert_eq!(groups(&m, haystack), vec![None, Some("car")]);
        assert_eq!(m.spans()[1].len, 0);

        let haystack = "bluecar";
        let m = find(&re, haystack);
        assert!(m.found());
        assert_eq!(groups(&m, haystack), vec![Some("blue"), Some("car")]);

        let haystack = "green";
        assert!(!find(&re, haystack).found());
        assert!(!find(&re, "").found());
        assert!(!find(&re, "x car").found());
    }

    #[test]
    fn colors_separated() {
        let re = Regex::new(COLORS_SEPARATED).unwrap();
        assert_eq!(re.group_count(), 2);

        assert!(!find(&re, "bluecar").found());

        let haystack = " blue \t car";
        let m = find(&re, haystack);
        assert!(m.found());
        assert_eq!(groups(&m, haystack), vec![Some("blue"), Some("car")]);

        let haystack = "train";
        let m = find(&re, haystack);
        assert!(m.found());
        assert_eq!(groups(&m, haystack), vec![None, Some("train")]);
    }

    #[test]
    fn lazy() {
        let re = Regex::new("(a*?)b").unwrap();
        let m = re.find(b"aaab");
        assert_eq!(m.group(1), Some(0..3));

        let re = Regex::new("(x+?)y").unwrap();
        assert!(!re.is_match(b"y"));
        assert_eq!(re.find(b"xxy").group(1), Some(0..2));

        let re = Regex::new("a.*?$").unwrap();
        assert!(re.is_match(b"abc"));
        assert!(!re.is_match(b"b"));
    }

    #[test]
    fn lazy_tries_continuation_first() {
        let re = Regex::new(".*?x").unwrap();
        assert!(re.is_match(b"abx"));
        assert!(re.is_match(b"x"));
        assert!(!re.is_match(b"ab"));

        let re = Regex::new("(a*?)a").unwrap();
        let m = re.find(b"aa");
        assert!(m.found());
        assert_eq!(m.group(1), None);

        let re = Regex::new("(.*?)b").unwrap();
        assert_eq!(re.find(b"aab").group(1), Some(0..2));
        assert_eq!(re.find(b"abab").group(1), Some(0..1));

        let re = Regex::new(r"\s*?x\s*?y").unwrap();
        assert!(re.is_match(b" x y"));

        // A partial match of the continuation is undone before the body runs.
        let re = Regex::new("(.*?)xy").unwrap();
        assert_eq!(re.find(b"xaxy").group(1), Some(0..2));
    }

    #[test]
    fn classes() {
        let re = Regex::new("[a-c]+?[^xy]").unwrap();
        assert!(re.is_match(b"abcz"));
        assert!(re.is_match(b"ab\n"));
        // `ab` already matches.
        assert!(re.is_match(b"abcx"));
        assert!(!re.is_match(b"ax"));
        assert!(!re.is_match(b"a"));
        assert!(!re.is_match(b"z"));
    }

    #[test]
    fn range_outside_class() {
        let re = Regex::new("xa-c").unwrap();
        assert!(re.is_match(b"xb"));
        assert!(!re.is_match(b"xd"));
        assert!(!re.is_match(b"x-"));

        let re = Regex::new("a-").unwrap();
        assert!(re.is_match(b"a-"));
    }

    #[test]
    fn anchored_at_start() {
        let re = Regex::new("^ab").unwrap();
        assert!(re.is_match(b"abc"));
        assert!(!re.is_match(b"cab"));
        // Without `^` matching still starts at offset 0.
        assert!(!Regex::new("ab").unwrap().is_match(b"cab"));
    }

    #[test]
    fn embedded_nul() {
        let re = Regex::from_bytes(b"a\0?b").unwrap();
        let haystack = b"a\0b";
        assert!(re.find(haystack).found());
        assert!(!re.find_nul_terminated(haystack).found());

        let re = Regex::new("a$").unwrap();
        assert!(!re.find(b"a\0").found());
        assert!(re.find_nul_terminated(b"a\0").found());
    }

    #[test]
    fn errors() {
        assert_eq!(kinds("(?'color'red|blue)"), vec![ErrorKind::Unsupported]);
        assert_eq!(kinds("a*b+"), vec![ErrorKind::Unsupported, ErrorKind::Unsupported]);
        assert_eq!(kinds("a*?b|ac"), vec![ErrorKind::Ambiguous]);
        assert_eq!(kinds("$*?"), vec![ErrorKind::Unsupported]);
        assert_eq!(kinds("[abc"), vec![ErrorKind::Lex]);
        assert_eq!(kinds("(ab"), vec![ErrorKind::Parse]);

        let errs = Regex::new("red|(?'x'blue)").unwrap_err();
        let err = errs.first().unwrap();
        assert_eq!(err.offset, 4);
        assert_eq!(
            err.to_string(),
            "unsupported construct: named capture groups are not supported at offset 4"
        );

        let errs = RegexBuilder::new("(a|b)(c|d)(e|f)(g|h)")
            .size_limit(40)
            .build()
            .unwrap_err();
        assert!(errs.contains(ErrorKind::TooComplex));
    }

    #[test]
    fn long_literal() {
        let pattern = "a".repeat(300);
        let re = Regex::new(&pattern).unwrap();
        assert!(re.is_match(pattern.as_bytes()));
        assert!(!re.is_match(&pattern.as_bytes()[1..]));

        let errs = Regex::new(&"a".repeat(5000)).unwrap_err();
        assert_eq!(errs.first().unwrap().kind, ErrorKind::TooComplex);

        let errs = RegexBuilder::new("abc").depth_limit(2).build().unwrap_err();
        assert!(errs.contains(ErrorKind::TooComplex));
    }

    #[test]
    fn deterministic() {
        let a = Regex::new(COLORS_SEPARATED).unwrap();
        let b = Regex::new(COLORS_SEPARATED).unwrap();
        assert_eq!(a.automaton(), b.automaton());
        assert_eq!(a.automaton().to_string(), b.automaton().to_string());
        assert_eq!(a.as_str(), COLORS_SEPARATED);
    }

    #[test]
    fn shared_between_threads() {
        let re = Regex::new(COLORS).unwrap();
        std::thread::scope(|s| {
            for haystack in ["red car", "  train", "bluetrain"] {
                let re = &re;
                s.spawn(move || assert!(re.is_match(haystack.as_bytes())));
            }
        });
    }

    #[test]
    fn display() {
        let re = Regex::new(COLORS).unwrap();
        let haystack = b"  red    train  ";
        assert_eq!(
            re.find(haystack).display(haystack).to_string(),
            "matches:\n  group 1: red\n  group 2: train\n"
        );
        assert_eq!(
            re.find(b"boat").display(b"boat").to_string(),
            "does not match\n"
        );
    }
}
