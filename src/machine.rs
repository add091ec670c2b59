use std::fmt;
use std::ops::Range;

use crate::ast::GroupId;
use crate::codegen::{Automaton, Target};

/// String pointer.
/// This is used to point to the current byte of the haystack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sp(usize);

impl Sp {
    fn inc(&mut self) {
        self.0 += 1;
    }

    fn rewind(&mut self, n: usize) {
        self.0 = self.0.saturating_sub(n);
    }
}

/// How the engine reads the haystack and where the haystack ends.
trait Input {
    /// The byte at `pos`, or `None` at end of input.
    fn byte_at(&self, pos: usize) -> Option<u8>;
}

/// Ends at the slice length. NUL is an ordinary byte.
struct Bounded<'h>(&'h [u8]);

impl Input for Bounded<'_> {
    fn byte_at(&self, pos: usize) -> Option<u8> {
        self.0.get(pos).copied()
    }
}

/// Ends at the first NUL byte, or at the slice length if there is none.
struct NulTerminated<'h>(&'h [u8]);

impl Input for NulTerminated<'_> {
    fn byte_at(&self, pos: usize) -> Option<u8> {
        self.0.get(pos).copied().filter(|&b| b != 0)
    }
}

/// The part of the haystack recorded for a capture group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub begin: usize,
    pub len: usize,
}

impl Span {
    pub fn range(&self) -> Range<usize> {
        self.begin..self.begin + self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn extend(&mut self, pos: usize) {
        if self.len == 0 {
            self.begin = pos;
        }
        self.len += 1;
    }

    /// Forget whatever the span recorded at or after `pos`.
    fn truncate(&mut self, pos: usize) {
        self.len = if self.begin >= pos {
            0
        } else {
            self.len.min(pos - self.begin)
        };
    }
}

/// The result of running an automaton over a haystack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    found: bool,
    /// Indexed by group id; index 0 is unused.
    groups: Vec<Span>,
}

impl Match {
    pub fn found(&self) -> bool {
        self.found
    }

    /// The byte range of group `group`, or `None` when the pattern did not
    /// match, the group took no input, or no such group exists.
    pub fn group(&self, group: GroupId) -> Option<Range<usize>> {
        if !self.found || group == 0 {
            return None;
        }
        self.groups
            .get(group)
            .filter(|span| !span.is_empty())
            .map(Span::range)
    }

    /// Raw spans of every group, including empty ones. Index 0 is unused.
    pub fn spans(&self) -> &[Span] {
        &self.groups
    }

    /// Renders the match against the haystack it was found in:
    ///
    /// ```txt
    /// matches:
    ///   group 1: red
    ///   group 2: train
    /// ```
    pub fn display<'a>(&'a self, haystack: &'a [u8]) -> impl fmt::Display + 'a {
        MatchDisplay {
            m: self,
            haystack,
        }
    }
}

struct MatchDisplay<'a> {
    m: &'a Match,
    haystack: &'a [u8],
}

impl fmt::Display for MatchDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.m.found {
            return writeln!(f, "does not match");
        }
        writeln!(f, "matches:")?;
        for (group, span) in self.m.groups.iter().enumerate().skip(1) {
            let text = self.haystack.get(span.range()).unwrap_or_default();
            writeln!(f, "  group {group}: {}", String::from_utf8_lossy(text))?;
        }
        Ok(())
    }
}

/// Walks an automaton over a haystack.
///
/// There is no backtrack stack: the state is one cursor, one node id and the
/// group spans. A failing node rewinds the cursor by its fixed distance.
#[derive(Debug, Clone, Copy)]
pub struct Machine<'a> {
    automaton: &'a Automaton,
}

impl<'a> Machine<'a> {
    pub fn new(automaton: &'a Automaton) -> Self {
        Self { automaton }
    }

    /// Match against `haystack`, which ends at its length.
    pub fn find(&self, haystack: &[u8]) -> Match {
        self.run(Bounded(haystack))
    }

    /// Match against `haystack`, which ends at its first NUL byte.
    pub fn find_nul_terminated(&self, haystack: &[u8]) -> Match {
        self.run(NulTerminated(haystack))
    }

    fn run(&self, input: impl Input) -> Match {
        let mut groups = vec![Span::default(); self.automaton.max_group + 1];
        let mut sp = Sp(0);
        let mut target = self.automaton.first;

        while let Target::Node(id) = target {
            // A dangling id can only come from a hand-built automaton.
            let Some(node) = self.automaton.nodes.get(id) else {
                target = Target::Fail;
                break;
            };

            if node.pattern.matches(input.byte_at(sp.0), sp.0) {
                if node.pattern.consumes() {
                    if node.group != 0 {
                        if let Some(span) = groups.get_mut(node.group) {
                            span.extend(sp.0);
                        }
                    }
                    sp.inc();
                }
                target = node.ok;
            } else {
                sp.rewind(node.backtrack);
                for span in &mut groups {
                    span.truncate(sp.0);
                }
                target = node.err;
            }
        }

        Match {
            found: target == Target::Done,
            groups,
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::codegen::AutomatonNode;
    use crate::pattern::Pattern;
    use Target::{Done, Fail, Node};

    fn node(pattern: Pattern, ok: Target, err: Target, backtrack: usize, group: GroupId) -> AutomatonNode {
        AutomatonNode {
            pattern,
            ok,
            err,
            backtrack,
            group,
        }
    }

    #[test]
    fn concat() {
        // abc
        let automaton = Automaton {
            first: Node(0),
            max_group: 0,
            nodes: vec![
                /* 0 */ node(Pattern::byte(b'a'), Node(1), Fail, 0, 0),
                /* 1 */ node(Pattern::byte(b'b'), Node(2), Fail, 1, 0),
                /* 2 */ node(Pattern::byte(b'c'), Done, Fail, 2, 0),
            ],
        };
        let machine = Machine::new(&automaton);
        assert!(machine.find(b"abc").found());
        assert!(machine.find(b"abcd").found());
        assert!(!machine.find(b"ab").found());
        assert!(!machine.find(b"xabc").found());
        assert!(!machine.find(b"").found());
    }

    #[test]
    fn or() {
        // ab|cd
        let automaton = Automaton {
            first: Node(0),
            max_group: 0,
            nodes: vec![
                /* 0 */ node(Pattern::byte(b'a'), Node(2), Node(1), 0, 0),
                /* 1 */ node(Pattern::byte(b'c'), Node(3), Fail, 0, 0),
                /* 2 */ node(Pattern::byte(b'b'), Done, Node(1), 1, 0),
                /* 3 */ node(Pattern::byte(b'd'), Done, Fail, 1, 0),
            ],
        };
        let machine = Machine::new(&automaton);
        assert!(machine.find(b"ab").found());
        assert!(machine.find(b"cd").found());
        assert!(!machine.find(b"ad").found());
        assert!(!machine.find(b"ac").found());
    }

    #[test]
    fn lazy_star() {
        // (a)*?b
        let automaton = Automaton {
            first: Node(0),
            max_group: 1,
            nodes: vec![
                /* 0 */ node(Pattern::byte(b'b'), Done, Node(1), 0, 0),
                /* 1 */ node(Pattern::byte(b'a'), Node(0), Fail, 0, 1),
            ],
        };
        let machine = Machine::new(&automaton);
        let m = machine.find(b"aaab");
        assert!(m.found());
        assert_eq!(m.group(1), Some(0..3));

        let m = machine.find(b"b");
        assert!(m.found());
        assert_eq!(m.group(1), None);
        assert_eq!(m.spans(), &[Span::default(), Span::default()]);

        assert!(!machine.find(b"aaa").found());
    }

    #[test]
    fn rewind_truncates_groups() {
        // (ab)c|abd, unfactored: the failing 'c' rewinds across group 1.
        let automaton = Automaton {
            first: Node(0),
            max_group: 1,
            nodes: vec![
                node(Pattern::byte(b'a'), Node(1), Fail, 0, 1),
                node(Pattern::byte(b'b'), Node(2), Fail, 1, 1),
                node(Pattern::byte(b'c'), Done, Node(3), 2, 0),
                node(Pattern::byte(b'a'), Node(4), Fail, 0, 0),
                node(Pattern::byte(b'b'), Node(5), Fail, 1, 0),
                node(Pattern::byte(b'd'), Done, Fail, 2, 0),
            ],
        };
        let machine = Machine::new(&automaton);
        assert_eq!(machine.find(b"abc").group(1), Some(0..2));
        let m = machine.find(b"abd");
        assert!(m.found());
        assert_eq!(m.group(1), None);
    }

    #[test]
    fn anchors() {
        // ^a$
        let automaton = Automaton {
            first: Node(0),
            max_group: 0,
            nodes: vec![
                node(Pattern::START, Node(1), Fail, 0, 0),
                node(Pattern::byte(b'a'), Node(2), Fail, 0, 0),
                node(Pattern::END, Done, Fail, 1, 0),
            ],
        };
        let machine = Machine::new(&automaton);
        assert!(machine.find(b"a").found());
        assert!(!machine.find(b"ab").found());
        assert!(machine.find_nul_terminated(b"a\0b").found());
        assert!(!machine.find(b"a\0b").found());
    }

    #[test]
    fn nul_terminated() {
        // a.
        let automaton = Automaton {
            first: Node(0),
            max_group: 0,
            nodes: vec![
                node(Pattern::byte(b'a'), Node(1), Fail, 0, 0),
                node(Pattern::ANY, Done, Fail, 1, 0),
            ],
        };
        let machine = Machine::new(&automaton);
        assert!(machine.find(b"a\0").found());
        assert!(!machine.find_nul_terminated(b"a\0").found());
        assert!(machine.find_nul_terminated(b"ab").found());
    }

    #[test]
    fn dangling_target() {
        let automaton = Automaton {
            first: Node(0),
            max_group: 0,
            nodes: vec![node(Pattern::byte(b'a'), Node(7), Fail, 0, 0)],
        };
        assert!(!Machine::new(&automaton).find(b"a").found());
    }

    #[test]
    fn display() {
        let m = Match {
            found: true,
            groups: vec![
                Span::default(),
                Span { begin: 2, len: 3 },
                Span::default(),
            ],
        };
        assert_eq!(
            m.display(b"  red car").to_string(),
            "matches:\n  group 1: red\n  group 2: \n"
        );

        let m = Match {
            found: false,
            groups: vec![Span::default()],
        };
        assert_eq!(m.display(b"").to_string(), "does not match\n");
    }
}
