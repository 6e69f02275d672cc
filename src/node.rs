//! Object-tree (OT) primitives.
//!
//! A [`Node`] is the universal tree element: a scalar carries its value
//! directly, a container carries a [`Producer`] that yields children one
//! at a time against a caller-owned [`Cursor`]. Setting up a container
//! never materialises any child — producing a child is a function call.

use crate::error::Result;

/// The six JSON-ish kinds a node can take. Never changes over a node's
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

/// Display/iteration hints carried on a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    /// Dumper should render this container inline, without newlines.
    pub flat: bool,
    /// Entering this container triggers a round-trip to an external
    /// system; the dumper may stop descending below a configured cutoff.
    pub expensive: bool,
    /// This array's children are alternatives, not siblings — the
    /// predicate engine treats it existentially.
    pub multi: bool,
    /// This number has no fractional part and should be rendered as an
    /// integer.
    pub int: bool,
    /// Suppress the `"k": ` prefix when dumping.
    pub no_key: bool,
}

/// A node's position within its parent: an optional
/// ordinal index (array context) and/or an optional string key (object
/// context). Carried on the node itself, not looked up from the parent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeKey {
    pub index: Option<i64>,
    pub string: Option<String>,
}

impl NodeKey {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn at(index: i64) -> Self {
        NodeKey { index: Some(index), string: None }
    }

    pub fn named(index: i64, key: impl Into<String>) -> Self {
        NodeKey { index: Some(index), string: Some(key.into()) }
    }
}

/// Caller-owned iteration state. A negative
/// index counts from the end (`-1` = last); translating it is the
/// producer's job.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    pub index: i64,
    pub key: Option<String>,
}

impl Cursor {
    /// The cursor value that restarts a restartable producer from the
    /// beginning.
    pub fn start() -> Self {
        Cursor { index: 0, key: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number { value: f64, integer: bool },
    String(String),
}

/// A container's iteration contract. Every concrete data source (the
/// JSON parser's streaming cursor, the dict adaptor's ordinal walk, the
/// registry adaptor's lazy round-trips, the path step engine, an
/// externally supplied POD walker) implements this once and is wrapped
/// into a [`Producer`]; `Node::iterate` dispatches to it uniformly.
///
/// Implementors are restartable (resetting `cursor` to [`Cursor::start`]
/// re-yields the sequence from the start) unless documented otherwise —
/// the JSON parser is the one deliberate exception.
pub trait ContainerProducer {
    fn next(&mut self, cursor: &mut Cursor, out: &mut Node) -> Result<bool>;
}

/// An in-memory, eagerly-built sequence of children. Used for small or
/// already-materialised containers (predicate literals, the `multi`
/// wrapper, fixed adaptor output) where a full `ContainerProducer` impl
/// would be pure overhead.
#[derive(Debug, Clone, Default)]
pub struct FixedProducer {
    items: Vec<Node>,
}

impl FixedProducer {
    pub fn new(items: Vec<Node>) -> Self {
        FixedProducer { items }
    }
}

impl ContainerProducer for FixedProducer {
    fn next(&mut self, cursor: &mut Cursor, out: &mut Node) -> Result<bool> {
        let len = self.items.len() as i64;
        let mut idx = cursor.index;
        if idx < 0 {
            idx += len;
        }
        if idx < 0 || idx >= len {
            return Ok(false);
        }
        *out = self.items[idx as usize].clone();
        cursor.index = idx + 1;
        Ok(true)
    }
}

#[cfg(test)]
mod producer_properties {
    use super::*;
    use proptest::prelude::*;

    fn scalars(n: usize) -> Vec<Node> {
        (0..n).map(|i| Node::integer(NodeKey::at(i as i64), i as i64)).collect()
    }

    proptest! {
        /// Restartability (spec §8): resetting the cursor to `Cursor::start`
        /// re-yields the same sequence of kinds-and-keys.
        #[test]
        fn fixed_producer_is_restartable(len in 0usize..12) {
            let mut node = Node::fixed_array(NodeKey::none(), scalars(len));
            let first = node.collect().unwrap();
            let second = node.collect().unwrap();
            prop_assert_eq!(first.len(), second.len());
            for (a, b) in first.iter().zip(second.iter()) {
                prop_assert_eq!(&a.key, &b.key);
                prop_assert_eq!(a.scalar(), b.scalar());
            }
        }

        /// Negative-index semantics (spec §8): index `-1` on an array of
        /// length N yields the same child as index `N-1`.
        #[test]
        fn negative_one_is_last_element(len in 1usize..20) {
            let mut node = Node::fixed_array(NodeKey::none(), scalars(len));
            let mut last = Node::null(NodeKey::none());
            let mut cur = Cursor { index: len as i64 - 1, key: None };
            node.iterate(&mut cur, &mut last).unwrap();

            let mut node2 = Node::fixed_array(NodeKey::none(), scalars(len));
            let mut neg = Node::null(NodeKey::none());
            let mut cur2 = Cursor { index: -1, key: None };
            node2.iterate(&mut cur2, &mut neg).unwrap();

            prop_assert_eq!(last.scalar(), neg.scalar());
        }
    }
}

pub enum Producer {
    Fixed(FixedProducer),
    External(Box<dyn ContainerProducer>),
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Producer::Fixed(p) => f.debug_tuple("Fixed").field(p).finish(),
            Producer::External(_) => f.write_str("External(..)"),
        }
    }
}

impl ContainerProducer for Producer {
    fn next(&mut self, cursor: &mut Cursor, out: &mut Node) -> Result<bool> {
        match self {
            Producer::Fixed(p) => p.next(cursor, out),
            Producer::External(p) => p.next(cursor, out),
        }
    }
}

#[derive(Debug)]
enum Data {
    Scalar(Scalar),
    Container(Producer),
}

/// The universal tree element. Nodes are short-lived,
/// stack-resident values: a parent node lives for exactly one iteration
/// step (the producer writes into the caller's output, the caller
/// descends, the node is discarded). There is deliberately no `parent`
/// back-pointer; path results instead carry their own
/// [`crate::path::Location`] breadcrumb, built by the step evaluator as
/// it descends, and the dumper's `--path` mode reads that instead of
/// walking parents.
#[derive(Debug)]
pub struct Node {
    pub kind: Kind,
    pub key: NodeKey,
    pub flags: Flags,
    data: Data,
}

impl Clone for Node {
    fn clone(&self) -> Self {
        match &self.data {
            Data::Scalar(s) => Node {
                kind: self.kind,
                key: self.key.clone(),
                flags: self.flags,
                data: Data::Scalar(s.clone()),
            },
            // A `Fixed` producer is plain data, so it clones genuinely
            // (the recursive-descent walker relies on this to hand the
            // same materialised subtree to two independent cursors).
            // An `External` producer is not Clone in general (it may
            // hold a lazy round-trip in progress); cloning it yields an
            // empty container of the same kind instead — callers that
            // need a restartable copy should re-enter the adaptor.
            Data::Container(Producer::Fixed(p)) => Node {
                kind: self.kind,
                key: self.key.clone(),
                flags: self.flags,
                data: Data::Container(Producer::Fixed(p.clone())),
            },
            Data::Container(Producer::External(_)) => Node {
                kind: self.kind,
                key: self.key.clone(),
                flags: self.flags,
                data: Data::Container(Producer::Fixed(FixedProducer::default())),
            },
        }
    }
}

impl Node {
    pub fn null(key: NodeKey) -> Self {
        Node { kind: Kind::Null, key, flags: Flags::default(), data: Data::Scalar(Scalar::Null) }
    }

    pub fn bool(key: NodeKey, value: bool) -> Self {
        Node { kind: Kind::Bool, key, flags: Flags::default(), data: Data::Scalar(Scalar::Bool(value)) }
    }

    pub fn integer(key: NodeKey, value: i64) -> Self {
        let mut flags = Flags::default();
        flags.int = true;
        Node {
            kind: Kind::Number,
            key,
            flags,
            data: Data::Scalar(Scalar::Number { value: value as f64, integer: true }),
        }
    }

    pub fn float(key: NodeKey, value: f64) -> Self {
        Node {
            kind: Kind::Number,
            key,
            flags: Flags::default(),
            data: Data::Scalar(Scalar::Number { value, integer: false }),
        }
    }

    pub fn string(key: NodeKey, value: impl Into<String>) -> Self {
        Node { kind: Kind::String, key, flags: Flags::default(), data: Data::Scalar(Scalar::String(value.into())) }
    }

    pub fn array(key: NodeKey, producer: Producer) -> Self {
        Node { kind: Kind::Array, key, flags: Flags::default(), data: Data::Container(producer) }
    }

    pub fn object(key: NodeKey, producer: Producer) -> Self {
        Node { kind: Kind::Object, key, flags: Flags::default(), data: Data::Container(producer) }
    }

    /// A container with no producer at all yields the empty sequence.
    pub fn empty_array(key: NodeKey) -> Self {
        Node::array(key, Producer::Fixed(FixedProducer::default()))
    }

    pub fn empty_object(key: NodeKey) -> Self {
        Node::object(key, Producer::Fixed(FixedProducer::default()))
    }

    pub fn fixed_array(key: NodeKey, items: Vec<Node>) -> Self {
        Node::array(key, Producer::Fixed(FixedProducer::new(items)))
    }

    pub fn fixed_object(key: NodeKey, items: Vec<Node>) -> Self {
        Node::object(key, Producer::Fixed(FixedProducer::new(items)))
    }

    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_container(&self) -> bool {
        matches!(self.data, Data::Container(_))
    }

    pub fn scalar(&self) -> Option<&Scalar> {
        match &self.data {
            Data::Scalar(s) => Some(s),
            Data::Container(_) => None,
        }
    }

    /// The single iteration primitive: `Ok(true)` when a
    /// new child was written into `out`, `Ok(false)` at end of sequence,
    /// `Err` on a producer error. Scalar nodes never call their producer.
    pub fn iterate(&mut self, cursor: &mut Cursor, out: &mut Node) -> Result<bool> {
        match &mut self.data {
            Data::Scalar(_) => Ok(false),
            Data::Container(p) => p.next(cursor, out),
        }
    }

    /// Collect all children eagerly (convenience for adaptors/tests;
    /// not used by the lazy evaluator itself).
    pub fn collect(&mut self) -> Result<Vec<Node>> {
        let mut cursor = Cursor::start();
        let mut out = Vec::new();
        loop {
            let mut sub = Node::null(NodeKey::none());
            if !self.iterate(&mut cursor, &mut sub)? {
                break;
            }
            out.push(sub);
        }
        Ok(out)
    }

    /// Consume this container's producer into a fully in-memory,
    /// restartable copy, recursively: every descendant container is
    /// drained and rebuilt as a `Fixed` producer too, not just this
    /// one level. A shallow materialize would leave `External`
    /// children inside the rebuilt `Vec`, and those still clone to
    /// empty per [`Clone`] above — recursing all the way down is what
    /// makes the returned copy (and `self`, left in the same state)
    /// safe to clone and re-iterate afterward. Used wherever a JSON
    /// container needs to be read more than once despite being
    /// single-shot: the recursive-descent walker and predicate
    /// sub-path evaluation against a relative/absolute operand.
    /// Scalars pass through via a plain clone.
    pub fn materialize(&mut self) -> Result<Node> {
        if !self.is_container() {
            return Ok(self.clone());
        }
        let mut items = self.collect()?;
        for item in items.iter_mut() {
            if item.is_container() {
                *item = item.materialize()?;
            }
        }
        let rebuilt = if self.kind == Kind::Array {
            Node::fixed_array(self.key.clone(), items)
        } else {
            Node::fixed_object(self.key.clone(), items)
        }
        .with_flags(self.flags);
        *self = rebuilt.clone();
        Ok(rebuilt)
    }

    /// Boolean coercion per truthy table.
    pub fn to_bool(&mut self) -> Result<bool> {
        Ok(match &self.data {
            Data::Scalar(Scalar::Null) => false,
            Data::Scalar(Scalar::Bool(b)) => *b,
            Data::Scalar(Scalar::Number { value, .. }) => *value != 0.0 && !value.is_nan(),
            Data::Scalar(Scalar::String(s)) => !s.is_empty(),
            Data::Container(_) => {
                if self.kind == Kind::Array {
                    let mut cursor = Cursor::start();
                    let mut sub = Node::null(NodeKey::none());
                    self.iterate(&mut cursor, &mut sub)?
                } else {
                    true
                }
            }
        })
    }
}
