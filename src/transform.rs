//! Whole-tree rewrites applied between parsing and lowering.
//!
//! The lowering step has no backtrack stack: every automaton node carries a
//! fixed rewind distance. The passes here put the tree in a shape where such
//! distances exist, and reject what cannot be put in that shape.

use log::trace;

use crate::ast::{Ast, GroupId, NodeId, NodeKind};
use crate::error::{Error, ErrorKind, Errors};

/// Bounds on what the passes accept and produce.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum number of syntax tree nodes.
    pub size: usize,
    /// Maximum distance from the root to a leaf.
    pub depth: usize,
}

struct Passes<'a> {
    ast: &'a mut Ast,
    limits: Limits,
}

/// Run every pass in order. Returns the new root and the highest group id.
pub fn transform(ast: &mut Ast, root: NodeId, limits: Limits) -> Result<(NodeId, GroupId), Errors> {
    let mut passes = Passes { ast, limits };

    // The passes and the lowering recurse along the tree.
    passes.check_depth(root)?;
    passes.verify(root)?;

    let mut next = 0;
    let root = passes.groups(root, 0, &mut next);
    trace!("groups: {} capture groups", next);

    let root = passes.expand_lazy_plus(root)?;
    trace!("fix_0: {} nodes", passes.ast.size(root));

    let root = passes.distribute(root)?;
    trace!("fix_1: {} nodes", passes.ast.size(root));

    let root = passes.factor(root)?;
    trace!("fix_2: {} nodes", passes.ast.size(root));

    passes.check_depth(root)?;
    passes.check_legal(root)?;

    Ok((root, next))
}

impl Passes<'_> {
    fn grow(&self) -> Result<(), Error> {
        if self.ast.len() > self.limits.size {
            return Err(Error::new(
                ErrorKind::TooComplex,
                0,
                format!("pattern expands to more than {} nodes", self.limits.size),
            ));
        }
        Ok(())
    }

    fn check_depth(&self, root: NodeId) -> Result<(), Error> {
        if self.ast.depth(root) > self.limits.depth {
            return Err(Error::new(
                ErrorKind::TooComplex,
                0,
                format!("pattern nests deeper than {} levels", self.limits.depth),
            ));
        }
        Ok(())
    }

    /// Reject what parses but cannot be lowered yet.
    fn verify(&self, root: NodeId) -> Result<(), Errors> {
        let mut errors = Vec::new();
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            let node = self.ast.node(id);
            let message = match node.kind {
                NodeKind::NamedCaptureGroup(..) => Some("named capture groups are not supported"),
                NodeKind::RepeatLeast0(_) => Some("greedy `*` is not supported, use `*?`"),
                NodeKind::RepeatLeast1(_) => Some("greedy `+` is not supported, use `+?`"),
                _ => None,
            };
            if let Some(message) = message {
                trace!("verify: rejecting {} at {}", node.kind.name(), node.offset);
                errors.push(Error::new(ErrorKind::Unsupported, node.offset, message));
            }
            // Reversed so errors come out in pattern order.
            pending.extend(node.kind.children().into_iter().rev());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            errors.sort_by_key(|e| e.offset);
            Err(Errors::new(errors))
        }
    }

    /// Stamp every node with the id of its nearest enclosing capture group
    /// and drop the group wrappers. Ids follow the order of the openers.
    fn groups(&mut self, id: NodeId, group: GroupId, next: &mut GroupId) -> NodeId {
        match self.ast.kind(id).clone() {
            NodeKind::CaptureGroup(inner) | NodeKind::NamedCaptureGroup(_, inner) => {
                *next += 1;
                let group = *next;
                self.groups(inner, group, next)
            }
            NodeKind::NonCapturingGroup(inner) => self.groups(inner, group, next),
            kind => {
                let kind = kind.map(|child| self.groups(child, group, next));
                let node = self.ast.node_mut(id);
                node.kind = kind;
                node.group = group;
                id
            }
        }
    }

    /// fix_0: `e+?` becomes `e e*?`.
    fn expand_lazy_plus(&mut self, id: NodeId) -> Result<NodeId, Error> {
        let kind = self
            .ast
            .kind(id)
            .clone()
            .try_map(|child| self.expand_lazy_plus(child))?;

        if let NodeKind::LazyRepeatLeast1(inner) = kind {
            let once = self.ast.deep_clone(inner);
            let rest = self.ast.add_like(id, NodeKind::LazyRepeatLeast0(inner));
            self.grow()?;
            return Ok(self.append(once, rest));
        }

        // An expansion on the left of a concatenation leaves it left-nested.
        if let NodeKind::Chain(left, right) = kind {
            if matches!(self.ast.kind(left), NodeKind::Chain(..)) {
                return Ok(self.append(left, right));
            }
        }

        self.ast.node_mut(id).kind = kind;
        Ok(id)
    }

    /// `a` followed by `c`, keeping concatenations right-nested.
    fn append(&mut self, a: NodeId, c: NodeId) -> NodeId {
        match *self.ast.kind(a) {
            NodeKind::Chain(head, tail) => {
                let tail = self.append(tail, c);
                self.ast.node_mut(a).kind = NodeKind::Chain(head, tail);
                a
            }
            _ => self.ast.add_like(a, NodeKind::Chain(a, c)),
        }
    }

    /// fix_1: `(a|b)c` becomes `ac|bc`, for every leaf of a nested
    /// alternation, and `a?c` becomes `ac|c`. Whatever follows an alternation
    /// is then lowered once per alternative, with a rewind distance that
    /// matches that alternative, and a loop inside `a` sees `c` as its
    /// continuation.
    fn distribute(&mut self, id: NodeId) -> Result<NodeId, Error> {
        self.grow()?;

        let mut kind = self
            .ast
            .kind(id)
            .clone()
            .try_map(|child| self.distribute(child))?;

        if let NodeKind::Chain(left, right) = kind {
            match *self.ast.kind(left) {
                NodeKind::Or(a, b) => {
                    let right_copy = self.ast.deep_clone(right);
                    let a = self.append(a, right);
                    let b = self.append(b, right_copy);
                    let a = self.distribute(a)?;
                    let b = self.distribute(b)?;
                    return Ok(self.ast.add_like(left, NodeKind::Or(a, b)));
                }
                NodeKind::Maybe(e) => {
                    let right_copy = self.ast.deep_clone(right);
                    let e = self.append(e, right);
                    let e = self.distribute(e)?;
                    return Ok(self.ast.add_like(left, NodeKind::Or(e, right_copy)));
                }
                NodeKind::LazyRepeatLeast0(e) => {
                    kind = NodeKind::Chain(left, self.merge_loops(e, right));
                }
                _ => {}
            }
        }

        self.ast.node_mut(id).kind = kind;
        Ok(id)
    }

    /// `e*?(a|e*?b)` becomes `e*?(a|b)`. Both loops would consume the same
    /// input at the same position, and the inner one could only give it
    /// back with a rewind it does not know the length of.
    fn merge_loops(&mut self, e: NodeId, rest: NodeId) -> NodeId {
        match *self.ast.kind(rest) {
            NodeKind::Or(a, b) => {
                let a = self.merge_loops(e, a);
                let b = self.merge_loops(e, b);
                self.ast.node_mut(rest).kind = NodeKind::Or(a, b);
                rest
            }
            NodeKind::Chain(head, tail) => match *self.ast.kind(head) {
                NodeKind::LazyRepeatLeast0(inner) if self.ast.same(e, inner) => {
                    trace!("fix_1: merging loops at {}", self.ast.node(head).offset);
                    self.merge_loops(e, tail)
                }
                _ => rest,
            },
            _ => rest,
        }
    }

    /// fix_2: `ab|ac` becomes `a(b|c)`.
    fn factor(&mut self, id: NodeId) -> Result<NodeId, Error> {
        let kind = self
            .ast
            .kind(id)
            .clone()
            .try_map(|child| self.factor(child))?;
        self.ast.node_mut(id).kind = kind.clone();

        let NodeKind::Or(a, b) = kind else {
            return Ok(id);
        };
        let (&NodeKind::Chain(head, rest_a), &NodeKind::Chain(head_b, rest_b)) =
            (self.ast.kind(a), self.ast.kind(b))
        else {
            return Ok(id);
        };
        if !self.ast.same(head, head_b) {
            return Ok(id);
        }

        trace!("fix_2: hoisting common prefix at {}", self.ast.node(id).offset);
        self.grow()?;
        let rest = self.ast.add_like(id, NodeKind::Or(rest_a, rest_b));
        let rest = self.factor(rest)?;
        Ok(self.ast.add_like(id, NodeKind::Chain(head, rest)))
    }

    /// Reject alternations whose alternatives can start with the same test,
    /// and repetitions whose body can match without consuming input.
    fn check_legal(&self, root: NodeId) -> Result<(), Errors> {
        let mut errors = Vec::new();
        self.check(root, false, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Errors::new(errors))
        }
    }

    fn check(&self, id: NodeId, in_or: bool, errors: &mut Vec<Error>) {
        let node = self.ast.node(id);
        match node.kind {
            // Members of a negated class are never alternatives.
            NodeKind::Not(_) => return,
            NodeKind::Or(..) if !in_or => {
                let mut alternatives = Vec::new();
                self.alternatives(id, &mut alternatives);
                let heads: Vec<Vec<NodeId>> = alternatives
                    .iter()
                    .map(|&alt| {
                        let mut heads = Vec::new();
                        self.heads(alt, &mut heads);
                        heads
                    })
                    .collect();

                let ambiguous = heads.iter().enumerate().any(|(i, a)| {
                    heads[i + 1..].iter().any(|b| {
                        a.iter()
                            .any(|&x| b.iter().any(|&y| self.ast.same_ignoring_groups(x, y)))
                    })
                });
                if ambiguous {
                    trace!("check_legal: ambiguous alternation at {}", node.offset);
                    errors.push(Error::new(
                        ErrorKind::Ambiguous,
                        node.offset,
                        "alternatives can start with the same element",
                    ));
                }
            }
            NodeKind::LazyRepeatLeast0(inner) if self.ast.min_len(inner) == 0 => {
                errors.push(Error::new(
                    ErrorKind::Unsupported,
                    node.offset,
                    "repetition of an expression that can match empty input",
                ));
            }
            _ => {}
        }

        let is_or = matches!(node.kind, NodeKind::Or(..));
        for child in node.kind.children() {
            self.check(child, is_or, errors);
        }
    }

    fn alternatives(&self, id: NodeId, out: &mut Vec<NodeId>) {
        match *self.ast.kind(id) {
            NodeKind::Or(a, b) => {
                self.alternatives(a, out);
                self.alternatives(b, out);
            }
            _ => out.push(id),
        }
    }

    /// The consuming tests that can come first in a match of `id`.
    fn heads(&self, id: NodeId, out: &mut Vec<NodeId>) {
        match *self.ast.kind(id) {
            NodeKind::Match(p) => {
                if p.consumes() {
                    out.push(id);
                }
            }
            NodeKind::Not(_) => out.push(id),
            NodeKind::Chain(a, b) => {
                self.heads(a, out);
                if self.ast.min_len(a) == 0 {
                    self.heads(b, out);
                }
            }
            NodeKind::Or(a, b) => {
                self.heads(a, out);
                self.heads(b, out);
            }
            NodeKind::Maybe(e)
            | NodeKind::RepeatLeast0(e)
            | NodeKind::RepeatLeast1(e)
            | NodeKind::LazyRepeatLeast0(e)
            | NodeKind::LazyRepeatLeast1(e)
            | NodeKind::NonCapturingGroup(e)
            | NodeKind::CaptureGroup(e)
            | NodeKind::NamedCaptureGroup(_, e) => self.heads(e, out),
        }
    }
}
