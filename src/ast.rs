use std::fmt;

use crate::pattern::Pattern;

/// Index of a node in an [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Capture group number. 0 means "not inside any capture group".
pub type GroupId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Match(Pattern),
    Chain(NodeId, NodeId),
    Or(NodeId, NodeId),
    Maybe(NodeId),
    Not(NodeId),
    RepeatLeast0(NodeId),
    RepeatLeast1(NodeId),
    LazyRepeatLeast0(NodeId),
    LazyRepeatLeast1(NodeId),
    NonCapturingGroup(NodeId),
    CaptureGroup(NodeId),
    NamedCaptureGroup(Vec<u8>, NodeId),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Match(_) => "match",
            NodeKind::Chain(..) => "chain",
            NodeKind::Or(..) => "or",
            NodeKind::Maybe(_) => "maybe",
            NodeKind::Not(_) => "not",
            NodeKind::RepeatLeast0(_) => "repeat_least_0",
            NodeKind::RepeatLeast1(_) => "repeat_least_1",
            NodeKind::LazyRepeatLeast0(_) => "lazy_repeat_least_0",
            NodeKind::LazyRepeatLeast1(_) => "lazy_repeat_least_1",
            NodeKind::NonCapturingGroup(_) => "non_capturing_group",
            NodeKind::CaptureGroup(_) => "capture_group",
            NodeKind::NamedCaptureGroup(..) => "named_capture_group",
        }
    }

    /// Rebuilds the kind with the same shape and `f` applied to every child.
    pub fn map(&self, mut f: impl FnMut(NodeId) -> NodeId) -> NodeKind {
        match self {
            NodeKind::Match(p) => NodeKind::Match(*p),
            NodeKind::Chain(a, b) => {
                let a = f(*a);
                NodeKind::Chain(a, f(*b))
            }
            NodeKind::Or(a, b) => {
                let a = f(*a);
                NodeKind::Or(a, f(*b))
            }
            NodeKind::Maybe(e) => NodeKind::Maybe(f(*e)),
            NodeKind::Not(e) => NodeKind::Not(f(*e)),
            NodeKind::RepeatLeast0(e) => NodeKind::RepeatLeast0(f(*e)),
            NodeKind::RepeatLeast1(e) => NodeKind::RepeatLeast1(f(*e)),
            NodeKind::LazyRepeatLeast0(e) => NodeKind::LazyRepeatLeast0(f(*e)),
            NodeKind::LazyRepeatLeast1(e) => NodeKind::LazyRepeatLeast1(f(*e)),
            NodeKind::NonCapturingGroup(e) => NodeKind::NonCapturingGroup(f(*e)),
            NodeKind::CaptureGroup(e) => NodeKind::CaptureGroup(f(*e)),
            NodeKind::NamedCaptureGroup(name, e) => {
                NodeKind::NamedCaptureGroup(name.clone(), f(*e))
            }
        }
    }

    /// Like [`NodeKind::map`] for a fallible `f`; stops at the first error.
    pub fn try_map<E>(&self, mut f: impl FnMut(NodeId) -> Result<NodeId, E>) -> Result<NodeKind, E> {
        let mut error = None;
        let kind = self.map(|id| {
            if error.is_some() {
                return id;
            }
            f(id).unwrap_or_else(|e| {
                error = Some(e);
                id
            })
        });
        match error {
            Some(e) => Err(e),
            None => Ok(kind),
        }
    }

    pub fn children(&self) -> Vec<NodeId> {
        let mut children = Vec::with_capacity(2);
        self.map(|id| {
            children.push(id);
            id
        });
        children
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub group: GroupId,
    /// Byte offset in the pattern of the token that produced the node.
    pub offset: usize,
}

/// Arena holding the syntax tree of one pattern while it is compiled.
///
/// Passes never share a node between two parents; whenever a subtree has to
/// appear twice it is copied with [`Ast::deep_clone`].
#[derive(Debug, Default, Clone)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn add(&mut self, kind: NodeKind, offset: usize) -> NodeId {
        self.add_in_group(kind, 0, offset)
    }

    pub fn add_in_group(&mut self, kind: NodeKind, group: GroupId, offset: usize) -> NodeId {
        self.nodes.push(Node {
            kind,
            group,
            offset,
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    /// Adds a node that inherits group and offset from `like`.
    pub fn add_like(&mut self, like: NodeId, kind: NodeKind) -> NodeId {
        let node = self.node(like);
        let (group, offset) = (node.group, node.offset);
        self.add_in_group(kind, group, offset)
    }

    /// `a` followed by `b`, where either side may be absent.
    pub fn concat(&mut self, a: Option<NodeId>, b: Option<NodeId>) -> Option<NodeId> {
        match (a, b) {
            (Some(a), Some(b)) => Some(self.add_like(a, NodeKind::Chain(a, b))),
            (a, None) => a,
            (None, b) => b,
        }
    }

    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let kind = self.kind(id).clone().map(|child| self.deep_clone(child));
        self.add_like(id, kind)
    }

    /// Structural equality, including group ids.
    pub fn same(&self, a: NodeId, b: NodeId) -> bool {
        self.same_shape(a, b, true)
    }

    /// Structural equality ignoring group ids.
    pub fn same_ignoring_groups(&self, a: NodeId, b: NodeId) -> bool {
        self.same_shape(a, b, false)
    }

    fn same_shape(&self, a: NodeId, b: NodeId, groups: bool) -> bool {
        let (na, nb) = (self.node(a), self.node(b));
        if groups && na.group != nb.group {
            return false;
        }
        match (&na.kind, &nb.kind) {
            (NodeKind::Match(p), NodeKind::Match(q)) => p == q,
            (NodeKind::NamedCaptureGroup(x, _), NodeKind::NamedCaptureGroup(y, _)) if x != y => {
                false
            }
            (ka, kb) if std::mem::discriminant(ka) == std::mem::discriminant(kb) => ka
                .children()
                .into_iter()
                .zip(kb.children())
                .all(|(ca, cb)| self.same_shape(ca, cb, groups)),
            _ => false,
        }
    }

    /// Minimum number of input bytes consumed by any successful match of
    /// the subtree.
    pub fn min_len(&self, id: NodeId) -> usize {
        match self.kind(id) {
            NodeKind::Match(p) => usize::from(p.consumes()),
            NodeKind::Chain(a, b) => self.min_len(*a) + self.min_len(*b),
            NodeKind::Or(a, b) => self.min_len(*a).min(self.min_len(*b)),
            NodeKind::Maybe(_) | NodeKind::RepeatLeast0(_) | NodeKind::LazyRepeatLeast0(_) => 0,
            NodeKind::Not(_) => 1,
            NodeKind::RepeatLeast1(e)
            | NodeKind::LazyRepeatLeast1(e)
            | NodeKind::NonCapturingGroup(e)
            | NodeKind::CaptureGroup(e)
            | NodeKind::NamedCaptureGroup(_, e) => self.min_len(*e),
        }
    }

    /// Number of nodes reachable from `root`.
    pub fn size(&self, root: NodeId) -> usize {
        1 + self
            .kind(root)
            .children()
            .into_iter()
            .map(|c| self.size(c))
            .sum::<usize>()
    }

    /// Number of nodes on the longest path from `root` to a leaf.
    pub fn depth(&self, root: NodeId) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(root, 1)];
        while let Some((id, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            pending.extend(self.kind(id).children().into_iter().map(|c| (c, depth + 1)));
        }
        deepest
    }

    /// Renders the subtree as an s-expression, e.g. `(chain 'a' (or 'b' 'c'))`.
    /// Nodes inside a capture group are suffixed with `#<group>`.
    pub fn display(&self, root: NodeId) -> impl fmt::Display + '_ {
        Sexpr { ast: self, root }
    }
}

struct Sexpr<'a> {
    ast: &'a Ast,
    root: NodeId,
}

impl fmt::Display for Sexpr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.ast.node(self.root);
        match &node.kind {
            NodeKind::Match(p) => write!(f, "{p}")?,
            NodeKind::NamedCaptureGroup(name, e) => write!(
                f,
                "({} {} {})",
                node.kind.name(),
                String::from_utf8_lossy(name),
                self.ast.display(*e)
            )?,
            kind => {
                write!(f, "({}", kind.name())?;
                for child in kind.children() {
                    write!(f, " {}", self.ast.display(child))?;
                }
                f.write_str(")")?;
            }
        }
        if node.group != 0 {
            write!(f, "#{}", node.group)?;
        }
        Ok(())
    }
}
