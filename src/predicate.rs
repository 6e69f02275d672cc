//! Filter-predicate expression AST and evaluator.
//!
//! An [`Expr`] is compiled once (by [`crate::path::parser`]) and attached
//! to a path step; the step evaluator calls [`eval`] against each
//! candidate node the step produces. Evaluation itself may recurse into
//! [`crate::path::eval`] for sub-path operands, which is why the two
//! modules are mutually dependent rather than layered.

use std::rc::Rc;

use regex::Regex;

use crate::error::{Error, Result};
use crate::node::{Node, Scalar};
use crate::path::step::Step;

/// One node of the predicate AST. Cheap to clone: sub-expressions are
/// boxed, the compiled path and regex are reference-counted, so cloning
/// an `Expr` to hand a copy to each step-engine frame never re-parses or
/// re-compiles anything.
#[derive(Debug, Clone)]
pub enum Expr {
    Eq(Box<Expr>, Box<Expr>),
    Neq(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Lte(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Gte(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// `~=`; the right-hand side was a string literal, compiled once at
    /// parse time into a substring matcher.
    Regex(Box<Expr>, Rc<Regex>),
    /// A literal scalar (`true`, `false`, `null`, a number, a quoted
    /// string).
    Literal(Scalar),
    /// `$...`/`@...` embedded inside a condition: a fully compiled,
    /// relative-or-absolute sub-path.
    SubPath { absolute: bool, steps: Rc<[Step]> },
    /// Reserved for a future function-call surface (`fn(args...)`); no
    /// functions are registered yet, so calling one is a `NotSupported`
    /// error rather than a parse failure — the grammar accepts the
    /// shape, evaluation rejects it.
    FunctionCall { name: String, args: Vec<Expr> },
}

/// Outcome of comparing two operands, per the coercion table. All of
/// `eq/neq/lt/lte/gt/gte` are pure functions of this tag, which keeps
/// the coercion cascade in one place instead of scattered through each
/// operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    Equal,
    Less,
    Greater,
    Unordered,
}

/// A single evaluated operand: not just a node, but possibly several —
/// a `multi` array (typically the yield of a sub-path) is evaluated
/// once per child, and a comparison against it is the existential join
/// over those children (§4.6).
enum Value {
    Single(Scalar),
    /// Always has at least the `Single` fallback collapsed in; this
    /// variant only appears when the operand was itself a container.
    Multi(Vec<Scalar>),
}

impl Value {
    fn values(&self) -> Vec<&Scalar> {
        match self {
            Value::Single(s) => vec![s],
            Value::Multi(items) => items.iter().collect(),
        }
    }
}

/// `node` is the step's current candidate, used as the relative root
/// for `@`-rooted sub-paths. `root` is the absolute tree root, used for
/// `$`-rooted sub-paths.
pub fn eval(expr: &Expr, node: &mut Node) -> Result<bool> {
    // `Node::clone()` of an `External`-backed container yields an empty
    // stand-in (see its doc comment) rather than re-entering the
    // adaptor, so the absolute root used by `$`-rooted sub-paths has to
    // be drained explicitly instead of cloned.
    let mut root = node.materialize()?;
    eval_with_root(expr, node, &mut root)
}

fn eval_with_root(expr: &Expr, node: &mut Node, root: &mut Node) -> Result<bool> {
    Ok(match expr {
        Expr::And(a, b) => eval_with_root(a, node, root)? && eval_with_root(b, node, root)?,
        Expr::Or(a, b) => eval_with_root(a, node, root)? || eval_with_root(b, node, root)?,
        Expr::Not(a) => !eval_with_root(a, node, root)?,
        Expr::Eq(a, b) => join(a, b, node, root, |o| o == Order::Equal)?,
        Expr::Neq(a, b) => join(a, b, node, root, |o| o != Order::Equal)?,
        Expr::Lt(a, b) => join(a, b, node, root, |o| o == Order::Less)?,
        Expr::Lte(a, b) => join(a, b, node, root, |o| matches!(o, Order::Less | Order::Equal))?,
        Expr::Gt(a, b) => join(a, b, node, root, |o| o == Order::Greater)?,
        Expr::Gte(a, b) => join(a, b, node, root, |o| matches!(o, Order::Greater | Order::Equal))?,
        Expr::Regex(a, re) => {
            let value = evaluate_operand(a, node, root)?;
            value.values().into_iter().any(|s| re.is_match(&scalar_as_string(s)))
        }
        Expr::Literal(_) | Expr::SubPath { .. } | Expr::FunctionCall { .. } => {
            truthy_of(expr, node, root)?
        }
    })
}

/// Multi-value join: true iff *any* combination of (left value, right
/// value) satisfies `pred` on their coercion order.
fn join(
    a: &Expr,
    b: &Expr,
    node: &mut Node,
    root: &mut Node,
    pred: impl Fn(Order) -> bool,
) -> Result<bool> {
    let left = evaluate_operand(a, node, root)?;
    let right = evaluate_operand(b, node, root)?;
    for l in left.values() {
        for r in right.values() {
            if pred(compare(l, r)) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn truthy_of(expr: &Expr, node: &mut Node, root: &mut Node) -> Result<bool> {
    let value = evaluate_operand(expr, node, root)?;
    Ok(value.values().into_iter().any(scalar_truthy))
}

/// Evaluate one operand, collapsing a `multi` array into its member
/// scalars (§4.6's "treat a multi array existentially"). A non-`multi`
/// container operand coerces to its own boolean-ish scalar instead
/// (there's nothing else sensible to compare it against).
fn evaluate_operand(expr: &Expr, node: &mut Node, root: &mut Node) -> Result<Value> {
    match expr {
        Expr::Literal(s) => Ok(Value::Single(s.clone())),
        Expr::SubPath { absolute, steps } => {
            let base = if *absolute { root } else { &mut *node };
            // Same reasoning as `eval`'s root snapshot: an `External`
            // producer can't be `Clone`d into something re-iterable, so
            // drain it into a restartable copy before handing it to the
            // step engine.
            let materialized = base.materialize()?;
            let mut result = crate::path::eval::evaluate(materialized, steps.clone());
            let items = result.collect()?;
            if items.is_empty() {
                return Ok(Value::Multi(Vec::new()));
            }
            let scalars: Vec<Scalar> = items
                .into_iter()
                .filter_map(|mut n| operand_scalar(&mut n).ok())
                .collect();
            Ok(Value::Multi(scalars))
        }
        Expr::FunctionCall { name, .. } => {
            Err(Error::NotSupported(format!("predicate function '{name}' is not registered")))
        }
        other => {
            // Comparisons/logical forms used as an operand (e.g. `(a && b) == true`)
            // coerce through their own boolean result.
            let b = eval_with_root(other, node, root)?;
            Ok(Value::Single(Scalar::Bool(b)))
        }
    }
}

fn operand_scalar(n: &mut Node) -> Result<Scalar> {
    Ok(match n.scalar() {
        Some(s) => s.clone(),
        None => Scalar::Bool(n.to_bool()?),
    })
}

fn scalar_truthy(s: &Scalar) -> bool {
    match s {
        Scalar::Null => false,
        Scalar::Bool(b) => *b,
        Scalar::Number { value, .. } => *value != 0.0 && !value.is_nan(),
        Scalar::String(s) => !s.is_empty(),
    }
}

fn scalar_as_string(s: &Scalar) -> String {
    match s {
        Scalar::Null => String::new(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Number { value, integer } => {
            if *integer {
                (*value as i64).to_string()
            } else {
                value.to_string()
            }
        }
        Scalar::String(s) => s.clone(),
    }
}

fn scalar_as_number(s: &Scalar) -> Option<f64> {
    match s {
        Scalar::Number { value, .. } => Some(*value),
        Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Scalar::Null => Some(0.0),
        Scalar::String(s) => s.parse::<f64>().ok(),
    }
}

/// The coercion table of §4.6, collapsed to a total function on the
/// pair of scalar kinds.
fn compare(left: &Scalar, right: &Scalar) -> Order {
    match (left, right) {
        (Scalar::Null, Scalar::Null) => Order::Equal,
        (Scalar::Null, _) | (_, Scalar::Null) => Order::Unordered,
        (Scalar::String(a), Scalar::String(b)) => match a.as_bytes().cmp(b.as_bytes()) {
            std::cmp::Ordering::Equal => Order::Equal,
            std::cmp::Ordering::Less => Order::Less,
            std::cmp::Ordering::Greater => Order::Greater,
        },
        (Scalar::Bool(a), Scalar::Bool(b)) => {
            if a == b {
                Order::Equal
            } else if !a && *b {
                Order::Less
            } else {
                Order::Greater
            }
        }
        (Scalar::Number { value: a, .. }, Scalar::Number { value: b, .. }) => order_f64(*a, *b),
        (Scalar::Number { value: a, .. }, other) | (other, Scalar::Number { value: a, .. }) => {
            let flip = matches!(left, Scalar::Number { .. });
            match scalar_as_number(other) {
                Some(b) => {
                    let o = order_f64(*a, b);
                    if flip {
                        o
                    } else {
                        flip_order(o)
                    }
                }
                None => Order::Unordered,
            }
        }
        _ => {
            // Any other mixed pairing: fall back to boolean-interpretation
            // compare (equal iff same truth, never ordered).
            if scalar_truthy(left) == scalar_truthy(right) {
                Order::Equal
            } else {
                Order::Unordered
            }
        }
    }
}

fn order_f64(a: f64, b: f64) -> Order {
    if a.is_nan() || b.is_nan() {
        return Order::Unordered;
    }
    if a == b {
        Order::Equal
    } else if a < b {
        Order::Less
    } else {
        Order::Greater
    }
}

fn flip_order(o: Order) -> Order {
    match o {
        Order::Less => Order::Greater,
        Order::Greater => Order::Less,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKey as NK;

    fn num(v: f64) -> Scalar {
        Scalar::Number { value: v, integer: v.fract() == 0.0 }
    }

    #[test]
    fn equality_coerces_numbers() {
        assert_eq!(compare(&num(2.0), &num(2.0)), Order::Equal);
        assert_eq!(compare(&Scalar::String("2".into()), &num(2.0)), Order::Equal);
    }

    #[test]
    fn null_is_unordered_against_everything_else() {
        assert_eq!(compare(&Scalar::Null, &num(0.0)), Order::Unordered);
        assert_eq!(compare(&Scalar::Null, &Scalar::Null), Order::Equal);
    }

    #[test]
    fn eq_expr_on_literals() {
        let mut dummy = Node::null(NK::none());
        let expr = Expr::Eq(Box::new(Expr::Literal(num(1.0))), Box::new(Expr::Literal(num(1.0))));
        assert!(eval(&expr, &mut dummy).unwrap());
    }

    #[test]
    fn not_negates_boolean_coercion() {
        let mut dummy = Node::null(NK::none());
        let expr = Expr::Not(Box::new(Expr::Literal(Scalar::Bool(false))));
        assert!(eval(&expr, &mut dummy).unwrap());
    }
}
