//! Lazy, incremental JSON parser exposed as an OT tree.
//!
//! Instead of building an AST, the parser advances exactly far enough to
//! locate the next sibling at the current nesting depth, hands it back as
//! a [`Node`], and stops. Container nodes share the source buffer and a
//! single monotonically-advancing scan position with the whole document
//! — the one deliberate exception to the restartability invariant: a
//! JSON container may be iterated exactly once, in order, because the
//! scan position keeps moving even after control returns to the caller.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::node::{ContainerProducer, Cursor, Node, NodeKey, Producer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    None,
    Struct,
    Bare,
    Str,
    Utf8,
    Esc,
}

struct Scanner {
    buf: Rc<[u8]>,
    pos: usize,
}

impl Scanner {
    fn byte(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn slice(&self, start: usize, end: usize) -> Result<String> {
        std::str::from_utf8(&self.buf[start..end])
            .map(str::to_string)
            .map_err(|_| Error::Parse { offset: start, message: "invalid utf-8".into() })
    }
}

/// The producer behind every array/object node the JSON parser yields.
/// One instance owns one nesting level's worth of state; all instances
/// derived from one [`parse`] call share the same [`Scanner`].
pub struct JsonProducer {
    scanner: Rc<RefCell<Scanner>>,
    state: State,
    depth: i32,
    is_object: bool,
    pending_key: Option<String>,
    next_index: i64,
    done: bool,
}

impl JsonProducer {
    fn new(scanner: Rc<RefCell<Scanner>>, is_object: bool) -> Self {
        JsonProducer {
            scanner,
            state: State::Struct,
            depth: 0,
            is_object,
            pending_key: None,
            next_index: 0,
            done: false,
        }
    }

    /// Object children carry only their string key (no ordinal); array
    /// children carry their ordinal position and nothing else — the
    /// invariant in spec §3 ("object children always carry a non-empty
    /// string key; array children always carry an index").
    fn next_key(&mut self, string: Option<String>) -> NodeKey {
        if self.is_object {
            NodeKey { index: None, string }
        } else {
            let index = self.next_index;
            self.next_index += 1;
            NodeKey { index: Some(index), string: None }
        }
    }
}

fn bare_to_node(key: NodeKey, text: &str) -> Node {
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

impl ContainerProducer for JsonProducer {
    fn next(&mut self, _cursor: &mut Cursor, out: &mut Node) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        loop {
            let (byte, pos) = {
                let s = self.scanner.borrow();
                (s.byte(), s.pos)
            };
            let cur = match byte {
                Some(b) => b,
                None => {
                    self.done = true;
                    return if self.depth == 0 {
                        Ok(false)
                    } else {
                        Err(Error::Parse { offset: pos, message: "unexpected end of input".into() })
                    };
                }
            };

            match self.state {
                State::None => unreachable!("producer is constructed already in Struct state"),
                State::Struct => match cur {
                    b'\t' | b' ' | b'\r' | b'\n' | b':' | b',' => {
                        self.scanner.borrow_mut().pos += 1;
                    }
                    b'"' => {
                        self.scanner.borrow_mut().pos += 1;
                        self.state = State::Str;
                    }
                    b'[' | b'{' => {
                        self.depth += 1;
                        if self.depth > 1 {
                            self.scanner.borrow_mut().pos += 1;
                            continue;
                        }
                        self.scanner.borrow_mut().pos += 1;
                        let key = self.pending_key.take();
                        let node_key = self.next_key(key);
                        let child = JsonProducer::new(self.scanner.clone(), cur == b'{');
                        *out = if cur == b'{' {
                            Node::object(node_key, Producer::External(Box::new(child)))
                        } else {
                            Node::array(node_key, Producer::External(Box::new(child)))
                        };
                        return Ok(true);
                    }
                    b'}' | b']' => {
                        if self.depth == 0 {
                            self.done = true;
                            return Ok(false);
                        }
                        self.depth -= 1;
                        self.scanner.borrow_mut().pos += 1;
                    }
                    b'-' | b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' => {
                        self.state = State::Bare;
                    }
                    _ => return Err(Error::Parse { offset: pos, message: format!("unexpected byte {cur:#x}") }),
                },
                State::Bare => {
                    let start = pos;
                    let end = {
                        let s = self.scanner.borrow();
                        let bytes: &[u8] = &s.buf;
                        let mut i = start;
                        while i < bytes.len() {
                            match bytes[i] {
                                b'\t' | b' ' | b'\r' | b'\n' | b':' | b',' | b']' | b'}' => break,
                                32..=126 => i += 1,
                                _ => return Err(Error::Parse { offset: i, message: "invalid byte in bare token".into() }),
                            }
                        }
                        i
                    };
                    let text = self.scanner.borrow().slice(start, end)?;
                    self.scanner.borrow_mut().pos = end;
                    self.state = State::Struct;
                    if self.is_object && self.pending_key.is_none() {
                        self.pending_key = Some(text);
                        continue;
                    }
                    let key = self.pending_key.take();
                    let node_key = self.next_key(key);
                    *out = bare_to_node(node_key, &text);
                    return Ok(true);
                }
                State::Str => {
                    let start = pos;
                    let mut i = start;
                    let mut value = String::new();
                    let end;
                    loop {
                        let s = self.scanner.borrow();
                        let bytes: &[u8] = &s.buf;
                        if i >= bytes.len() {
                            return Err(Error::Parse { offset: i, message: "unterminated string".into() });
                        }
                        let b = bytes[i];
                        match b {
                            b'\\' => {
                                self.state = State::Esc;
                                drop(s);
                                let escaped = self.consume_escape(i + 1)?;
                                value.push(escaped.0);
                                i = escaped.1;
                                self.state = State::Str;
                            }
                            b'"' => {
                                end = i;
                                break;
                            }
                            0xf0..=0xf7 | 0xe0..=0xef | 0xc0..=0xdf => {
                                drop(s);
                                let (decoded_len, _) = utf8_len(b)?;
                                let slice_end = i + decoded_len;
                                let s2 = self.scanner.borrow();
                                let bytes2: &[u8] = &s2.buf;
                                if slice_end > bytes2.len() {
                                    return Err(Error::Parse { offset: i, message: "truncated utf-8 sequence".into() });
                                }
                                let text = std::str::from_utf8(&bytes2[i..slice_end])
                                    .map_err(|_| Error::Parse { offset: i, message: "invalid utf-8".into() })?;
                                value.push_str(text);
                                i = slice_end;
                            }
                            32..=126 => {
                                value.push(b as char);
                                i += 1;
                            }
                            _ => return Err(Error::Parse { offset: i, message: "invalid byte in string".into() }),
                        }
                    }
                    self.scanner.borrow_mut().pos = end + 1;
                    self.state = State::Struct;
                    if self.is_object && self.pending_key.is_none() {
                        self.pending_key = Some(value);
                        continue;
                    }
                    let key = self.pending_key.take();
                    let node_key = self.next_key(key);
                    *out = Node::string(node_key, value);
                    return Ok(true);
                }
                State::Utf8 | State::Esc => unreachable!("handled inline by consume_escape/utf8_len"),
            }
        }
    }
}

fn utf8_len(lead: u8) -> Result<(usize, u8)> {
    Ok(match lead {
        0xc0..=0xdf => (2, 1),
        0xe0..=0xef => (3, 2),
        0xf0..=0xf7 => (4, 3),
        _ => return Err(Error::Parse { offset: 0, message: "invalid utf-8 lead byte".into() }),
    })
}

impl JsonProducer {
    /// Decode one `\X` escape starting just after the backslash at byte
    /// `at`; returns the decoded character and the byte offset just past
    /// the escape.
    fn consume_escape(&self, at: usize) -> Result<(char, usize)> {
        let s = self.scanner.borrow();
        let bytes: &[u8] = &s.buf;
        let b = *bytes.get(at).ok_or(Error::Parse { offset: at, message: "truncated escape".into() })?;
        Ok(match b {
            b'"' => ('"', at + 1),
            b'\\' => ('\\', at + 1),
            b'/' => ('/', at + 1),
            b'b' => ('\u{8}', at + 1),
            b'f' => ('\u{c}', at + 1),
            b'n' => ('\n', at + 1),
            b'r' => ('\r', at + 1),
            b't' => ('\t', at + 1),
            b'u' => {
                let hex = s
                    .buf
                    .get(at + 1..at + 5)
                    .ok_or(Error::Parse { offset: at, message: "truncated \\u escape".into() })?;
                let hex = std::str::from_utf8(hex)
                    .map_err(|_| Error::Parse { offset: at, message: "invalid \\u escape".into() })?;
                let cp = u32::from_str_radix(hex, 16)
                    .map_err(|_| Error::Parse { offset: at, message: "invalid \\u escape".into() })?;
                let c = char::from_u32(cp).ok_or(Error::Parse { offset: at, message: "invalid code point".into() })?;
                (c, at + 5)
            }
            _ => return Err(Error::Parse { offset: at, message: "invalid escape".into() }),
        })
    }
}

/// Parse a UTF-8 JSON document, returning its root OT node. The root's
/// `iterate` is single-shot: siblings must be consumed in order, and a
/// given container may not be iterated twice.
pub fn parse(data: &str) -> Result<Node> {
    if data.is_empty() {
        return Err(Error::InvalidArgument("empty JSON input".into()));
    }
    let scanner = Rc::new(RefCell::new(Scanner { buf: Rc::from(data.as_bytes()), pos: 0 }));
    // The root is modelled as a one-element array whose sole child is the
    // actual top-level value; this lets `bare_to_node`/object-vs-array
    // detection live entirely inside `JsonProducer::next` instead of
    // needing a special case for "the first token".
    let mut root_producer = JsonProducer::new(scanner, false);
    root_producer.depth = -1; // one '[' / '{' / scalar token, then end
    let mut out = Node::null(NodeKey::none());
    let mut cursor = Cursor::start();
    if !ContainerProducer::next(&mut root_producer, &mut cursor, &mut out)? {
        return Err(Error::Parse { offset: 0, message: "empty document".into() });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Kind;

    fn collect_object(node: &mut Node) -> Vec<(String, Node)> {
        node.collect()
            .unwrap()
            .into_iter()
            .map(|n| (n.key.string.clone().unwrap(), n))
            .collect()
    }

    #[test]
    fn parses_scalars() {
        let mut root =
            parse(r#"{"a":1,"b":1.5,"c":true,"d":null,"e":"hi"}"#).unwrap();
        assert_eq!(root.kind, Kind::Object);
        let fields = collect_object(&mut root);
        assert_eq!(fields.len(), 5);
        let get = |k: &str| fields.iter().find(|(n, _)| n == k).unwrap().1.scalar().cloned();
        assert_eq!(get("a"), Some(crate::node::Scalar::Number { value: 1.0, integer: true }));
        assert_eq!(get("c"), Some(crate::node::Scalar::Bool(true)));
        assert_eq!(get("d"), Some(crate::node::Scalar::Null));
        assert_eq!(get("e"), Some(crate::node::Scalar::String("hi".into())));
    }

    #[test]
    fn parses_nested_array() {
        let mut root = parse(r#"[10,20,30,40,50]"#).unwrap();
        assert_eq!(root.kind, Kind::Array);
        let items = root.collect().unwrap();
        assert_eq!(items.len(), 5);
    }

    #[test]
    fn container_is_single_shot() {
        let mut root = parse(r#"[1,2,3]"#).unwrap();
        let first = root.collect().unwrap();
        assert_eq!(first.len(), 3);
        let second = root.collect().unwrap();
        assert_eq!(second.len(), 0, "a JSON container may not be iterated twice");
    }
}
