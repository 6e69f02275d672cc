//! String dictionary → OT object.
//!
//! A dict is small and already fully resident in memory, so unlike the
//! JSON parser or the registry adaptor it doesn't need a streaming
//! producer — it's coerced once, eagerly, into a [`FixedProducer`]
//! ([`crate::node::FixedProducer`]).

use crate::node::{Node, NodeKey};

/// Build an OT object from an insertion-ordered key/value dictionary.
/// Scalar coercion matches the JSON parser's bareword rule exactly
/// (`null`/`true`/`false`, then integer, then float, then string) —
/// the two sources describe the same underlying property-bag shape, so
/// there is no reason for them to disagree on what `"42"` means.
pub fn from_entries(entries: impl IntoIterator<Item = (String, String)>) -> Node {
    let items = entries
        .into_iter()
        .enumerate()
        .map(|(i, (key, value))| coerce(NodeKey::named(i as i64, key), &value))
        .collect();
    Node::fixed_object(NodeKey::none(), items)
}

/// Look up `key` in `entries`, or `None` — the dict adaptor emits
/// `null` for keys absent from the backing store rather than erroring,
/// so callers building a dict node from a sparse lookup source should
/// coerce a missing value to the empty string first, or call this to
/// get `Node::null` directly.
pub fn get(entries: &[(String, String)], key: &str) -> Node {
    match entries.iter().find(|(k, _)| k == key) {
        Some((_, v)) => coerce(NodeKey::named(0, key), v),
        None => Node::null(NodeKey::named(0, key)),
    }
}

fn coerce(key: NodeKey, text: &str) -> Node {
    match text {
        "null" => Node::null(key),
        "true" => Node::bool(key, true),
        "false" => Node::bool(key, false),
        _ => {
            if let Ok(i) = text.parse::<i64>() {
                Node::integer(key, i)
            } else if let Ok(f) = text.parse::<f64>() {
                Node::float(key, f)
            } else {
                Node::string(key, text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Scalar;

    #[test]
    fn coerces_values_like_json() {
        let mut node = from_entries(vec![
            ("a".into(), "1".into()),
            ("b".into(), "true".into()),
            ("c".into(), "hello".into()),
        ]);
        let items = node.collect().unwrap();
        assert_eq!(items[0].scalar(), Some(&Scalar::Number { value: 1.0, integer: true }));
        assert_eq!(items[1].scalar(), Some(&Scalar::Bool(true)));
        assert_eq!(items[2].scalar(), Some(&Scalar::String("hello".into())));
    }

    #[test]
    fn preserves_insertion_order() {
        let mut node = from_entries(vec![("z".into(), "1".into()), ("a".into(), "2".into())]);
        let items = node.collect().unwrap();
        assert_eq!(items[0].key.string.as_deref(), Some("z"));
        assert_eq!(items[1].key.string.as_deref(), Some("a"));
    }
}
