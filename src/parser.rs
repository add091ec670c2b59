use log::trace;

use crate::ast::{Ast, NodeId, NodeKind};
use crate::error::Error;
use crate::lexer::{Quantifier, Token, TokenKind};
use crate::pattern::Pattern;

/// Recursive-descent parser over sub-ranges of the token sequence.
///
/// Recursion happens once per nesting level (group or class), never per
/// token, so `nest_limit` bounds the depth of the call stack.
struct Parser {
    tokens: Vec<Token>,
    ast: Ast,
    nest_limit: usize,
}

/// Parse a token sequence into an abstract syntax tree (AST).
pub fn parse(tokens: Vec<Token>, nest_limit: usize) -> Result<(Ast, NodeId), Error> {
    let len = tokens.len();
    let mut parser = Parser {
        tokens,
        ast: Ast::new(),
        nest_limit,
    };
    match parser.expr(0, len, 0)? {
        Some(root) => {
            trace!("parsed {} tokens into {} nodes", len, parser.ast.len());
            Ok((parser.ast, root))
        }
        None => Err(Error::parse(0, "empty pattern")),
    }
}

impl Parser {
    fn offset(&self, i: usize) -> usize {
        self.tokens[i].offset
    }

    /// Index of the closer matching the opener at `open`, searching before `end`.
    fn closer(&self, open: usize, end: usize) -> Result<usize, Error> {
        let mut depth = 0usize;
        for i in open..end {
            let kind = &self.tokens[i].kind;
            if kind.is_opener() {
                depth += 1;
            } else if kind.is_closer() {
                depth -= 1;
                if depth == 0 {
                    let class = matches!(self.tokens[open].kind, TokenKind::Class { .. });
                    if class != (*kind == TokenKind::ClassClose) {
                        return Err(Error::parse(self.offset(i), format!("mismatched {kind}")));
                    }
                    return Ok(i);
                }
            }
        }
        Err(Error::parse(
            self.offset(open),
            format!("unclosed {}", self.tokens[open].kind),
        ))
    }

    /// Parse `tokens[start..end]`. Returns `None` for an empty range.
    fn expr(&mut self, start: usize, end: usize, depth: usize) -> Result<Option<NodeId>, Error> {
        if start == end {
            return Ok(None);
        }

        // Alternation has the lowest precedence: split at top-level `|`.
        let mut separators = Vec::new();
        let mut nesting = 0usize;
        for i in start..end {
            let kind = &self.tokens[i].kind;
            if kind.is_opener() {
                nesting += 1;
            } else if kind.is_closer() {
                if nesting == 0 {
                    return Err(Error::parse(self.offset(i), format!("unexpected {kind}")));
                }
                nesting -= 1;
            } else if nesting == 0 && *kind == TokenKind::Alternation {
                separators.push(i);
            }
        }

        if separators.is_empty() {
            return self.sequence(start, end, depth);
        }

        let mut operands = Vec::with_capacity(separators.len() + 1);
        let mut from = start;
        for &sep in separators.iter().chain(std::iter::once(&end)) {
            match self.sequence(from, sep, depth)? {
                Some(operand) => operands.push(operand),
                None => {
                    let at = if sep < end { sep } else { sep - 1 };
                    return Err(Error::parse(self.offset(at), "missing operand of `|`"));
                }
            }
            from = sep + 1;
        }

        Ok(self.or_ast(operands))
    }

    /// Fold the alternatives right-associatively: `a|b|c` is `a|(b|c)`.
    fn or_ast(&mut self, mut operands: Vec<NodeId>) -> Option<NodeId> {
        let mut ast = operands.pop()?;
        while let Some(operand) = operands.pop() {
            ast = self.ast.add_like(operand, NodeKind::Or(operand, ast));
        }
        Some(ast)
    }

    /// Parse a range without top-level `|`: primaries, each optionally
    /// followed by postfix operators, concatenated.
    fn sequence(&mut self, start: usize, end: usize, depth: usize) -> Result<Option<NodeId>, Error> {
        let mut concat: Vec<NodeId> = Vec::new();
        // Whether the last item of `concat` may still take a postfix operator.
        let mut operand = false;

        let mut i = start;
        while i < end {
            let offset = self.offset(i);
            match self.tokens[i].kind.clone() {
                TokenKind::Quantifier(q) => {
                    let wrap: fn(NodeId) -> NodeKind = match q {
                        Quantifier::Star => NodeKind::RepeatLeast0,
                        Quantifier::LazyStar => NodeKind::LazyRepeatLeast0,
                        Quantifier::Plus => NodeKind::RepeatLeast1,
                        Quantifier::LazyPlus => NodeKind::LazyRepeatLeast1,
                        Quantifier::Question => NodeKind::Maybe,
                    };
                    // Applies to the immediately preceding item only.
                    match concat.pop() {
                        Some(prev) if operand => {
                            concat.push(self.ast.add(wrap(prev), offset));
                            operand = false;
                        }
                        _ => return Err(Error::parse(offset, "quantifier without operand")),
                    }
                    i += 1;
                    continue;
                }
                TokenKind::Match(p) => {
                    concat.push(self.ast.add(NodeKind::Match(p), offset));
                    i += 1;
                }
                TokenKind::Range(lo, hi) => {
                    let bytes = (lo..=hi)
                        .map(|b| self.ast.add(NodeKind::Match(Pattern::byte(b)), offset))
                        .collect();
                    concat.extend(self.or_ast(bytes));
                    i += 1;
                }
                kind if kind.is_opener() => {
                    if depth >= self.nest_limit {
                        return Err(Error::parse(offset, "nesting limit exceeded"));
                    }
                    let close = self.closer(i, end)?;
                    let Some(inner) = self.expr(i + 1, close, depth + 1)? else {
                        return Err(Error::parse(offset, format!("empty {kind}")));
                    };
                    let node = match kind {
                        TokenKind::Group => self.ast.add(NodeKind::CaptureGroup(inner), offset),
                        TokenKind::NonCapturingGroup => {
                            self.ast.add(NodeKind::NonCapturingGroup(inner), offset)
                        }
                        TokenKind::NamedGroup(name) => {
                            self.ast.add(NodeKind::NamedCaptureGroup(name, inner), offset)
                        }
                        TokenKind::Class { invert } => {
                            // A class is "any of these", not "this followed by that".
                            let members = self.chain_to_or(inner);
                            if invert {
                                self.ast.add(NodeKind::Not(members), offset)
                            } else {
                                members
                            }
                        }
                        _ => unreachable!("not an opener: {kind}"),
                    };
                    concat.push(node);
                    i = close + 1;
                }
                kind => return Err(Error::parse(offset, format!("unexpected {kind}"))),
            }
            operand = true;
        }

        let mut ast = None;
        while let Some(prev) = concat.pop() {
            ast = self.ast.concat(Some(prev), ast);
        }
        Ok(ast)
    }

    fn chain_to_or(&mut self, id: NodeId) -> NodeId {
        match *self.ast.kind(id) {
            NodeKind::Chain(a, b) => {
                let a = self.chain_to_or(a);
                let b = self.chain_to_or(b);
                self.ast.add_like(id, NodeKind::Or(a, b))
            }
            _ => id,
        }
    }
}
