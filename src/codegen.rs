use std::fmt;

use crate::ast::{Ast, GroupId, NodeId, NodeKind};
use crate::error::{Error, ErrorKind};
use crate::pattern::Pattern;

/// Where control goes after a node's test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Node(usize),
    /// The whole pattern matched.
    Done,
    /// The whole pattern failed.
    Fail,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Node(id) => write!(f, "{id:05}"),
            Target::Done => f.write_str("DONE"),
            Target::Fail => f.write_str("FAIL"),
        }
    }
}

/// One state of the automaton: a single test and two exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutomatonNode {
    pub pattern: Pattern,
    pub ok: Target,
    pub err: Target,
    /// How many bytes to rewind the cursor when the test fails.
    pub backtrack: usize,
    pub group: GroupId,
}

/// A compiled pattern. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Automaton {
    pub first: Target,
    pub max_group: GroupId,
    pub nodes: Vec<AutomatonNode>,
}

impl Automaton {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl fmt::Display for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, node) in self.nodes.iter().enumerate() {
            writeln!(
                f,
                "{id:05}: {} ok={} err={} bt={} group={}",
                node.pattern, node.ok, node.err, node.backtrack, node.group
            )?;
        }
        Ok(())
    }
}

/// Lower a transformed AST into an [`Automaton`].
pub fn generate_code(ast: &Ast, root: NodeId, max_group: GroupId) -> Result<Automaton, Error> {
    CodeGenerator {
        ast,
        nodes: Vec::new(),
    }
    .generate_code(root, max_group)
}

struct CodeGenerator<'a> {
    ast: &'a Ast,
    nodes: Vec<AutomatonNode>,
}

impl CodeGenerator<'_> {
    fn generate_code(mut self, root: NodeId, max_group: GroupId) -> Result<Automaton, Error> {
        let first = self.reserve();
        self.expr(root, first, Target::Done, Target::Fail, 0)?;
        Ok(Automaton {
            first: Target::Node(first),
            max_group,
            nodes: self.nodes,
        })
    }

    /// Allocate a node id; the node is written later by [`Self::emit`].
    fn reserve(&mut self) -> usize {
        self.nodes.push(AutomatonNode {
            pattern: Pattern::NEVER,
            ok: Target::Fail,
            err: Target::Fail,
            backtrack: 0,
            group: 0,
        });
        self.nodes.len() - 1
    }

    fn emit(&mut self, id: usize, node: AutomatonNode) {
        self.nodes[id] = node;
    }

    /// Lower `id` with its entry at node `this`.
    ///
    /// `bt` is the number of bytes consumed between the position `on_err`
    /// expects and the entry of `id`. Returns the number of bytes `id` is
    /// guaranteed to consume when it succeeds.
    fn expr(
        &mut self,
        id: NodeId,
        this: usize,
        on_ok: Target,
        on_err: Target,
        bt: usize,
    ) -> Result<usize, Error> {
        let ast = self.ast;
        let node = ast.node(id);
        match node.kind {
            NodeKind::Match(pattern) => {
                self.emit(
                    this,
                    AutomatonNode {
                        pattern,
                        ok: on_ok,
                        err: on_err,
                        backtrack: bt,
                        group: node.group,
                    },
                );
                Ok(usize::from(pattern.consumes()))
            }
            NodeKind::Chain(a, b) => self.chain(a, b, this, on_ok, on_err, bt),
            NodeKind::Or(a, b) => self.or(a, b, this, on_ok, on_err, bt),
            NodeKind::Maybe(e) => self.maybe(e, this, on_ok),
            NodeKind::LazyRepeatLeast0(e) => self.lazy_star(e, None, this, on_ok, on_err, bt),
            NodeKind::Not(e) => self.not(e, node.group, this, on_ok, on_err, bt),
            ref kind => Err(Error::new(
                ErrorKind::Unsupported,
                node.offset,
                format!("cannot lower {}", kind.name()),
            )),
        }
    }

    /// e1e2
    /// ```txt
    /// this: e1 code   ok -> J, err -> on_err
    /// J:    e2 code   ok -> on_ok, err -> on_err (rewinds across e1 too)
    /// ```
    fn chain(
        &mut self,
        a: NodeId,
        b: NodeId,
        this: usize,
        on_ok: Target,
        on_err: Target,
        bt: usize,
    ) -> Result<usize, Error> {
        if let NodeKind::LazyRepeatLeast0(e) = *self.ast.kind(a) {
            return self.lazy_star(e, Some(b), this, on_ok, on_err, bt);
        }
        let junction = self.reserve();
        let consumed_a = self.expr(a, this, Target::Node(junction), on_err, bt)?;
        let consumed_b = self.expr(b, junction, on_ok, on_err, bt + consumed_a)?;
        Ok(consumed_a + consumed_b)
    }

    /// e1|e2
    /// ```txt
    /// this: e1 code   ok -> on_ok, err -> L2 (rewinds to the start of e1)
    /// L2:   e2 code   ok -> on_ok, err -> on_err
    /// ```
    fn or(
        &mut self,
        a: NodeId,
        b: NodeId,
        this: usize,
        on_ok: Target,
        on_err: Target,
        bt: usize,
    ) -> Result<usize, Error> {
        let l2 = self.reserve();
        let consumed_a = self.expr(a, this, on_ok, Target::Node(l2), 0)?;
        let consumed_b = self.expr(b, l2, on_ok, on_err, bt)?;
        Ok(consumed_a.min(consumed_b))
    }

    /// e?
    /// ```txt
    /// this: e code    ok -> on_ok, err -> on_ok (rewinds to the start of e)
    /// ```
    fn maybe(&mut self, e: NodeId, this: usize, on_ok: Target) -> Result<usize, Error> {
        self.expr(e, this, on_ok, on_ok, 0)?;
        Ok(0)
    }

    /// e*?k
    /// ```txt
    /// this: k code    ok -> on_ok, err -> B (rewinds to the loop entry)
    /// B:    e code    ok -> this, err -> on_err
    /// ```
    /// `k` is tried before every iteration. Without a `k` the loop never
    /// iterates and `this` is a jump to `on_ok`.
    fn lazy_star(
        &mut self,
        e: NodeId,
        k: Option<NodeId>,
        this: usize,
        on_ok: Target,
        on_err: Target,
        bt: usize,
    ) -> Result<usize, Error> {
        let Some(k) = k else {
            self.emit(
                this,
                AutomatonNode {
                    pattern: Pattern::NEVER,
                    ok: on_ok,
                    err: on_ok,
                    backtrack: 0,
                    group: 0,
                },
            );
            return Ok(0);
        };

        let body = self.reserve();
        let consumed = self.expr(k, this, on_ok, Target::Node(body), 0)?;
        self.expr(e, body, Target::Node(this), on_err, bt)?;
        Ok(consumed)
    }

    /// [^m1 m2 ...]
    /// ```txt
    /// this: m1        ok -> R, err -> M2
    /// M2:   m2        ok -> R, err -> ...
    /// ...   mn        ok -> R, err -> A
    /// R:    !ANY      err -> on_err (rewinds the member and bt)
    /// A:    ANY       ok -> on_ok, err -> on_err
    /// ```
    /// A single member is lowered to one inverted test.
    fn not(
        &mut self,
        members: NodeId,
        group: GroupId,
        this: usize,
        on_ok: Target,
        on_err: Target,
        bt: usize,
    ) -> Result<usize, Error> {
        let mut patterns = Vec::new();
        self.members(members, &mut patterns)?;

        let node = |pattern, ok, err, backtrack| AutomatonNode {
            pattern,
            ok,
            err,
            backtrack,
            group,
        };

        if let [pattern] = patterns[..] {
            self.emit(this, node(pattern.inverted(), on_ok, on_err, bt));
            return Ok(1);
        }

        let mut ids = vec![this];
        ids.extend((1..patterns.len()).map(|_| self.reserve()));
        let reject = self.reserve();
        let accept = self.reserve();

        for (i, &pattern) in patterns.iter().enumerate() {
            let next = ids.get(i + 1).copied().unwrap_or(accept);
            self.emit(
                ids[i],
                node(pattern, Target::Node(reject), Target::Node(next), 0),
            );
        }
        self.emit(reject, node(Pattern::NEVER, on_err, on_err, bt + 1));
        self.emit(accept, node(Pattern::ANY, on_ok, on_err, bt));
        Ok(1)
    }

    fn members(&self, id: NodeId, out: &mut Vec<Pattern>) -> Result<(), Error> {
        let node = self.ast.node(id);
        match node.kind {
            NodeKind::Or(a, b) => {
                self.members(a, out)?;
                self.members(b, out)
            }
            NodeKind::Match(pattern) if pattern.consumes() && !pattern.invert => {
                out.push(pattern);
                Ok(())
            }
            _ => Err(Error::new(
                ErrorKind::Unsupported,
                node.offset,
                "negated classes may only contain single characters",
            )),
        }
    }
}
