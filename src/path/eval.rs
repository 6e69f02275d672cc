//! The step engine: evaluates a compiled step list against a root node.
//!
//! The result of evaluation is itself an OT node — a `multi` array
//! whose producer is [`PathEngine`] — so a path can be iterated
//! directly or composed as a predicate's sub-path operand
//! ([`crate::predicate::Expr::SubPath`]).
//!
//! Cursor-advance timing mirrors the original step engine exactly: a
//! slice's ordinal advances only after a successful yield; an
//! indexes/keys list's position advances on every attempt regardless
//! of whether that attempt matched.

use std::rc::Rc;

use crate::error::Result;
use crate::node::{ContainerProducer, Cursor, Flags, Kind, Node, NodeKey, Producer};
use crate::path::step::{Match, Step};
use crate::path::Location;
use crate::predicate;

type Chain = Vec<NodeKey>;

/// Drain a container's direct children into a [`FixedProducer`][crate::node::FixedProducer]
/// wrapper, one level deep. Scalars pass through unchanged. Nested
/// containers inside the collected children are left exactly as
/// produced — still lazy, still `External` if that's what they were.
fn shallow_materialize(mut node: Node) -> Result<Node> {
    if !node.is_container() {
        return Ok(node);
    }
    let items = node.collect()?;
    let materialized = if node.kind == Kind::Array {
        Node::fixed_array(node.key.clone(), items)
    } else {
        Node::fixed_object(node.key.clone(), items)
    };
    Ok(materialized.with_flags(node.flags))
}

enum Frame {
    Slice { input: Node, ordinal: i64, end: i64, step: i64 },
    Indexes { input: Node, list: Rc<[i64]>, pos: i64 },
    Keys { input: Node, list: Rc<[String]>, pos: i64 },
    Deep { pending_self: Option<Node>, stack: Vec<(Node, Cursor, Chain)> },
}

/// Drives one step list against one root node. Depth state (which
/// frame is active) persists across calls to `next`, exactly as the
/// original engine keeps `ctx->depth` alive between iterate calls.
pub struct PathEngine {
    steps: Rc<[Step]>,
    frames: Vec<Frame>,
    current: Vec<Node>,
    chain: Vec<Chain>,
    bare_root: Option<Node>,
    result_index: i64,
    error: Option<crate::error::Error>,
}

impl PathEngine {
    pub fn new(root: Node, steps: Rc<[Step]>) -> Self {
        let mut engine = PathEngine {
            steps,
            frames: Vec::new(),
            current: Vec::new(),
            chain: Vec::new(),
            bare_root: None,
            result_index: 0,
            error: None,
        };
        if engine.steps.is_empty() {
            engine.bare_root = Some(root);
        } else if let Err(e) = engine.enter(root, 0) {
            engine.error = Some(e);
        }
        engine
    }

    /// The breadcrumb for the most recently yielded result. Only
    /// meaningful immediately after a call to `next` returned `Ok(true)`.
    pub fn location(&self) -> Location {
        Location(self.chain.iter().flatten().cloned().collect())
    }

    /// `Index`/`Indexes`/`Slice` steps need true random access by
    /// ordinal — including negative ordinals, which require knowing the
    /// total length — but a source like the JSON parser only supports
    /// forward, single-shot consumption (its producer ignores the
    /// requested `cursor.index` entirely and just yields whatever is
    /// next). Materializing one level (the same shallow collect-and-wrap
    /// [`deep_visit`] uses) gives a [`crate::node::FixedProducer`]
    /// underneath, which does honor arbitrary/negative `cursor.index`;
    /// nested containers stay untouched and lazy.
    fn enter(&mut self, input: Node, depth: usize) -> Result<()> {
        let frame = match &self.steps[depth].kind {
            Match::Deep => Frame::Deep { pending_self: Some(input), stack: Vec::new() },
            Match::Slice { start, end, step } => {
                let input = shallow_materialize(input)?;
                Frame::Slice { input, ordinal: *start, end: *end, step: *step }
            }
            Match::Index(i) => {
                let input = shallow_materialize(input)?;
                Frame::Indexes { input, list: Rc::from(vec![*i]), pos: 0 }
            }
            Match::Indexes(v) => {
                let input = shallow_materialize(input)?;
                Frame::Indexes { input, list: Rc::from(v.clone()), pos: 0 }
            }
            // `Keys`/`Key` look each requested key up by scanning from
            // the top every time, which would silently miss an
            // out-of-document-order request (e.g. `$['z','x']`) against
            // a forward-only source — materialize for the same reason
            // as the ordinal-based kinds above.
            Match::Key(k) => {
                let input = shallow_materialize(input)?;
                Frame::Keys { input, list: Rc::from(vec![k.clone()]), pos: 0 }
            }
            Match::Keys(v) => {
                let input = shallow_materialize(input)?;
                Frame::Keys { input, list: Rc::from(v.clone()), pos: 0 }
            }
        };
        debug_assert_eq!(self.frames.len(), depth);
        self.frames.push(frame);
        self.current.push(Node::null(NodeKey::none()));
        self.chain.push(Vec::new());
        Ok(())
    }

    fn pop(&mut self) {
        self.frames.pop();
        self.current.pop();
        self.chain.pop();
    }

    /// One node encountered by a `deep` walk: yield it, and if it's a
    /// container, materialise its children so the walk can continue
    /// into them independently of whatever this node is handed to next
    /// (the matched candidate may itself become the next step's input,
    /// which needs its own live iteration over the same children).
    fn deep_visit(node: Node, stack: &mut Vec<(Node, Cursor, Chain)>, prefix: Chain) -> Result<(Node, Chain)> {
        let mut chain = prefix;
        chain.push(node.key.clone());
        if !node.is_container() {
            return Ok((node, chain));
        }
        let materialized = shallow_materialize(node)?;
        stack.push((materialized.clone(), Cursor::start(), chain.clone()));
        Ok((materialized, chain))
    }

    fn advance(&mut self, depth: usize) -> Result<bool> {
        match &mut self.frames[depth] {
            Frame::Slice { input, ordinal, end, step } => {
                let idx = *ordinal;
                let stop = if *end >= 0 { idx >= *end } else { idx <= *end };
                if stop {
                    return Ok(false);
                }
                let mut cursor = Cursor { index: idx, key: None };
                let mut out = Node::null(NodeKey::none());
                if input.iterate(&mut cursor, &mut out)? {
                    *ordinal += *step;
                    let key = out.key.clone();
                    self.current[depth] = out;
                    self.chain[depth] = vec![key];
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Frame::Indexes { input, list, pos } => loop {
                let p = *pos as usize;
                if p >= list.len() {
                    return Ok(false);
                }
                let idx = list[p];
                *pos += 1;
                let mut cursor = Cursor { index: idx, key: None };
                let mut out = Node::null(NodeKey::none());
                if input.iterate(&mut cursor, &mut out)? {
                    let key = out.key.clone();
                    self.current[depth] = out;
                    self.chain[depth] = vec![key];
                    return Ok(true);
                }
            },
            Frame::Keys { input, list, pos } => {
                if input.kind != Kind::Object {
                    return Ok(false);
                }
                loop {
                    let p = *pos as usize;
                    if p >= list.len() {
                        return Ok(false);
                    }
                    let wanted = list[p].clone();
                    *pos += 1;
                    let mut cursor = Cursor::start();
                    let found = loop {
                        let mut out = Node::null(NodeKey::none());
                        if !input.iterate(&mut cursor, &mut out)? {
                            break None;
                        }
                        if out.key.string.as_deref() == Some(wanted.as_str()) {
                            break Some(out);
                        }
                    };
                    if let Some(out) = found {
                        let key = out.key.clone();
                        self.current[depth] = out;
                        self.chain[depth] = vec![key];
                        return Ok(true);
                    }
                }
            }
            Frame::Deep { pending_self, stack } => {
                if let Some(root) = pending_self.take() {
                    let (yielded, chain) = Self::deep_visit(root, stack, Vec::new())?;
                    self.current[depth] = yielded;
                    self.chain[depth] = chain;
                    return Ok(true);
                }
                loop {
                    if stack.is_empty() {
                        return Ok(false);
                    }
                    let top_idx = stack.len() - 1;
                    let prefix = stack[top_idx].2.clone();
                    let mut out = Node::null(NodeKey::none());
                    let got = {
                        let (node, cursor, _) = &mut stack[top_idx];
                        node.iterate(cursor, &mut out)?
                    };
                    if got {
                        let (yielded, chain) = Self::deep_visit(out, stack, prefix)?;
                        self.current[depth] = yielded;
                        self.chain[depth] = chain;
                        return Ok(true);
                    } else {
                        stack.pop();
                    }
                }
            }
        }
    }
}

impl ContainerProducer for PathEngine {
    fn next(&mut self, _cursor: &mut Cursor, out: &mut Node) -> Result<bool> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        if self.steps.is_empty() {
            return match self.bare_root.take() {
                Some(mut root) => {
                    root.key = NodeKey::at(0);
                    *out = root;
                    Ok(true)
                }
                None => Ok(false),
            };
        }
        if self.frames.is_empty() {
            // `enter` for depth 0 failed during construction and the
            // error was already returned above on the first call.
            return Ok(false);
        }
        loop {
            let depth = self.frames.len() - 1;
            if !self.advance(depth)? {
                if depth == 0 {
                    return Ok(false);
                }
                self.pop();
                continue;
            }
            if let Some(filter) = self.steps[depth].filter.clone() {
                if !predicate::eval(&filter, &mut self.current[depth])? {
                    continue;
                }
            }
            if depth + 1 < self.steps.len() {
                let candidate = std::mem::replace(&mut self.current[depth], Node::null(NodeKey::none()));
                if let Err(e) = self.enter(candidate, depth + 1) {
                    return Err(e);
                }
                continue;
            }
            let mut result = std::mem::replace(&mut self.current[depth], Node::null(NodeKey::none()));
            result.key = NodeKey::at(self.result_index);
            self.result_index += 1;
            *out = result;
            return Ok(true);
        }
    }
}

/// Evaluate `steps` against `root`, returning a `multi` array node
/// whose iteration drives the step engine.
pub fn evaluate(root: Node, steps: Rc<[Step]>) -> Node {
    let engine = PathEngine::new(root, steps);
    let mut flags = Flags::default();
    flags.multi = true;
    Node::array(NodeKey::none(), Producer::External(Box::new(engine))).with_flags(flags)
}

/// Evaluate `steps` against `root`, eagerly collecting every result
/// alongside the absolute [`Location`] breadcrumb it was found at. Used
/// by the `--path` CLI mode, which needs the full chain of keys/indices
/// from the root, not just a result's own key — information that only
/// exists while [`PathEngine`] is actively descending, not once a
/// result has been handed back as a plain [`Node`].
pub fn collect_with_locations(root: Node, steps: Rc<[Step]>) -> Result<Vec<(Node, Location)>> {
    let mut engine = PathEngine::new(root, steps);
    let mut out = Vec::new();
    loop {
        let mut sub = Node::null(NodeKey::none());
        let mut cursor = Cursor::start();
        if !ContainerProducer::next(&mut engine, &mut cursor, &mut sub)? {
            break;
        }
        out.push((sub, engine.location()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json;
    use crate::node::Scalar;

    fn ints(node: &mut Node) -> Vec<i64> {
        node.collect()
            .unwrap()
            .into_iter()
            .map(|n| match n.scalar() {
                Some(Scalar::Number { value, .. }) => *value as i64,
                other => panic!("expected number, got {other:?}"),
            })
            .collect()
    }

    #[test]
    fn slice_yields_in_order() {
        let root = json::parse("[10,20,30,40,50]").unwrap();
        let steps: Rc<[Step]> = Rc::from(vec![Step::new(Match::Slice { start: 1, end: 4, step: 2 })]);
        let mut result = evaluate(root, steps);
        assert_eq!(ints(&mut result), vec![20, 40]);
    }

    #[test]
    fn negative_index_is_last_element() {
        let root = json::parse("[10,20,30,40,50]").unwrap();
        let steps: Rc<[Step]> = Rc::from(vec![Step::new(Match::Index(-1))]);
        let mut result = evaluate(root, steps);
        assert_eq!(ints(&mut result), vec![50]);
    }

    #[test]
    fn keys_yield_requested_order() {
        let root = json::parse(r#"{"x":1,"y":2,"z":3}"#).unwrap();
        let steps: Rc<[Step]> =
            Rc::from(vec![Step::new(Match::Keys(vec!["x".into(), "z".into()]))]);
        let mut result = evaluate(root, steps);
        assert_eq!(ints(&mut result), vec![1, 3]);
    }

    #[test]
    fn bare_path_yields_root_once() {
        let root = json::parse("[1,2,3]").unwrap();
        let steps: Rc<[Step]> = Rc::from(Vec::new());
        let mut result = evaluate(root, steps);
        let items = result.collect().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, Kind::Array);
    }
}
