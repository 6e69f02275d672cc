//! Compiled path step types — the output of [`crate::path::parser`] and
//! the input to [`crate::path::eval`].

use crate::predicate::Expr;

/// One step's match kind. Carries only the compiled shape; all
/// per-evaluation state (the current ordinal, the walk stack, ...)
/// lives in the evaluator's own frames, not here, since a `Step` is
/// compiled once and reused across many evaluations.
#[derive(Debug, Clone)]
pub enum Match {
    /// `..` / `//`: recursive descent over every node of the subtree,
    /// document pre-order.
    Deep,
    /// `[start:end:step]`. `end < 0` (including the default `-1`, "to
    /// the end") stops when the ordinal would pass it in `step`'s
    /// direction.
    Slice { start: i64, end: i64, step: i64 },
    /// `[i]` / bareword-following-sep with a single numeric index.
    Index(i64),
    /// `[i0,i1,...]`.
    Indexes(Vec<i64>),
    /// `.k` / `['k']` with a single key.
    Key(String),
    /// `['k0','k1',...]`.
    Keys(Vec<String>),
}

/// A compiled step: a match kind plus an optional filter attached by a
/// trailing `[?(...)]`.
#[derive(Debug, Clone)]
pub struct Step {
    pub kind: Match,
    pub filter: Option<Expr>,
}

impl Step {
    pub fn new(kind: Match) -> Self {
        Step { kind, filter: None }
    }

    pub fn with_filter(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }
}
