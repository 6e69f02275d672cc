//! Remote object directory → OT array.
//!
//! Grounded in the original tool's `tree.c`: a registry entry's static
//! fields (`id`, `type`, `version`, `permissions`, `props`) are known
//! up front from the directory listing; `info` is lazily populated by
//! binding to the live object and driving a sync round-trip, and each
//! parameter id is lazily fetched the same way once `info` has been
//! entered. Both are flagged `expensive` so the dumper can elide them
//! past a cutoff without even asking the producer to iterate.
//!
//! Re-entering `info` (or a `param` entry) after it has already been
//! populated reuses the cache unless the backing object reports that
//! field group as dirty, in which case only that group is discarded
//! and re-fetched — not the whole node. This mirrors the per-field
//! change-mask the original event handlers expose.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, warn};

use crate::error::Result;
use crate::node::{ContainerProducer, Cursor, Flags, Node, NodeKey, Producer};

/// One field group inside `info` (e.g. "props", "params", "state").
/// Grouped, rather than one flag per leaf field, because that's the
/// granularity the original's changed-bit actually operates at.
pub struct FieldGroup {
    pub name: String,
    pub value: Node,
}

pub struct InfoUpdate {
    pub groups: Vec<FieldGroup>,
}

/// The live counterpart of one directory entry: bind/sync round-trips
/// and per-param enumeration. Implemented by the caller's transport
/// layer; this crate only fixes the shape.
pub trait RemoteObject {
    /// Bind to the object and perform the sync round-trip that
    /// populates its info field groups.
    fn fetch_info(&self) -> Result<InfoUpdate>;
    /// Bitmask of info field groups (by position in the last
    /// `fetch_info` result) that changed since they were cached; an
    /// empty/zero mask after the first fetch means nothing to refresh.
    fn dirty_groups(&self) -> u64;
    /// Which parameter ids this object currently exposes.
    fn known_param_ids(&self) -> Vec<u32>;
    /// Enum-params round-trip for one id.
    fn fetch_param(&self, param_id: u32) -> Result<Node>;
    fn param_dirty(&self, param_id: u32) -> bool;
}

/// One row of the directory listing.
pub struct Entry {
    pub id: u32,
    pub type_name: String,
    pub version: u32,
    pub permissions: u32,
    pub props: Vec<(String, String)>,
}

/// The registry itself: a directory listing plus a way to reach the
/// live object behind any entry.
pub trait Directory {
    fn entries(&self) -> Vec<Entry>;
    fn object(&self, id: u32) -> Option<Box<dyn RemoteObject>>;
}

struct InfoCache {
    groups: Option<Vec<FieldGroup>>,
}

/// Producer for one entry's `info` object: on first entry (or whenever
/// a dirty bit is set), performs the round-trip; otherwise replays the
/// cached groups, plus a trailing `param` object.
struct InfoProducer {
    object: Rc<dyn RemoteObject>,
    cache: Rc<RefCell<InfoCache>>,
}

impl InfoProducer {
    fn refresh(&self) {
        let mut cache = self.cache.borrow_mut();
        let dirty = self.object.dirty_groups();
        if cache.groups.is_some() && dirty == 0 {
            return;
        }
        match self.object.fetch_info() {
            Ok(update) => {
                if let Some(existing) = &mut cache.groups {
                    for (i, group) in update.groups.into_iter().enumerate() {
                        if cache_bit_set(dirty, i) || existing.get(i).is_none() {
                            debug!("registry: info group '{}' invalidated, refetched", group.name);
                            if i < existing.len() {
                                existing[i] = group;
                            } else {
                                existing.push(group);
                            }
                        }
                    }
                } else {
                    cache.groups = Some(update.groups);
                }
            }
            Err(err) => {
                warn!("registry: info round-trip failed: {err}");
                if cache.groups.is_none() {
                    cache.groups = Some(Vec::new());
                }
            }
        }
    }
}

fn cache_bit_set(mask: u64, bit: usize) -> bool {
    bit < 64 && (mask & (1 << bit)) != 0
}

impl ContainerProducer for InfoProducer {
    fn next(&mut self, cursor: &mut Cursor, out: &mut Node) -> Result<bool> {
        if cursor.index == 0 {
            self.refresh();
        }
        let cache = self.cache.borrow();
        let groups = cache.groups.as_ref().map(Vec::as_slice).unwrap_or(&[]);
        let idx = cursor.index;
        if idx >= 0 && (idx as usize) < groups.len() {
            let group = &groups[idx as usize];
            *out = clone_field(group, idx);
            cursor.index += 1;
            return Ok(true);
        }
        let param_slot = groups.len() as i64;
        if idx == param_slot {
            let mut flags = Flags::default();
            flags.expensive = true;
            let producer = ParamProducer { object: self.object.clone(), cache: RefCell::new(Vec::new()) };
            *out = Node::object(
                NodeKey::named(idx, "param"),
                Producer::External(Box::new(producer)),
            )
            .with_flags(flags);
            cursor.index += 1;
            return Ok(true);
        }
        Ok(false)
    }
}

fn clone_field(group: &FieldGroup, idx: i64) -> Node {
    let mut node = group.value.clone();
    node.key = NodeKey::named(idx, group.name.clone());
    node
}

struct ParamCacheEntry {
    id: u32,
    value: Node,
}

struct ParamProducer {
    object: Rc<dyn RemoteObject>,
    cache: RefCell<Vec<ParamCacheEntry>>,
}

impl ContainerProducer for ParamProducer {
    fn next(&mut self, cursor: &mut Cursor, out: &mut Node) -> Result<bool> {
        let ids = self.object.known_param_ids();
        let idx = cursor.index;
        if idx < 0 || idx as usize >= ids.len() {
            return Ok(false);
        }
        let id = ids[idx as usize];
        let mut cache = self.cache.borrow_mut();
        let cached = cache.iter().position(|e| e.id == id);
        let needs_fetch = match cached {
            Some(_) => self.object.param_dirty(id),
            None => true,
        };
        if needs_fetch {
            match self.object.fetch_param(id) {
                Ok(mut value) => {
                    value.key = NodeKey::named(idx, id.to_string());
                    if let Some(pos) = cached {
                        cache[pos] = ParamCacheEntry { id, value };
                    } else {
                        cache.push(ParamCacheEntry { id, value });
                    }
                }
                Err(err) => {
                    warn!("registry: param {id} round-trip failed: {err}");
                    let value = Node::null(NodeKey::named(idx, id.to_string()));
                    if let Some(pos) = cached {
                        cache[pos] = ParamCacheEntry { id, value };
                    } else {
                        cache.push(ParamCacheEntry { id, value });
                    }
                }
            }
        }
        let pos = cache.iter().position(|e| e.id == id).expect("just inserted");
        *out = cache[pos].value.clone();
        cursor.index += 1;
        Ok(true)
    }
}

/// Producer for one directory entry: the five static fields, then a
/// lazily-populated `info`.
struct EntryProducer {
    entry: Rc<Entry>,
    object: Option<Rc<dyn RemoteObject>>,
}

impl ContainerProducer for EntryProducer {
    fn next(&mut self, cursor: &mut Cursor, out: &mut Node) -> Result<bool> {
        let idx = cursor.index;
        *out = match idx {
            0 => Node::integer(NodeKey::named(0, "id"), self.entry.id as i64),
            1 => Node::string(NodeKey::named(1, "type"), self.entry.type_name.clone()),
            2 => Node::integer(NodeKey::named(2, "version"), self.entry.version as i64),
            3 => Node::integer(NodeKey::named(3, "permissions"), self.entry.permissions as i64),
            4 => {
                let props = crate::adaptors::dict::from_entries(self.entry.props.clone());
                let mut node = props;
                node.key = NodeKey::named(4, "props");
                node
            }
            5 => {
                let object = match &self.object {
                    Some(o) => o.clone(),
                    None => return Ok(false),
                };
                let mut flags = Flags::default();
                flags.expensive = true;
                let cache = Rc::new(RefCell::new(InfoCache { groups: None }));
                let producer = InfoProducer { object, cache };
                Node::object(NodeKey::named(5, "info"), Producer::External(Box::new(producer)))
                    .with_flags(flags)
            }
            _ => return Ok(false),
        };
        cursor.index += 1;
        Ok(true)
    }
}

/// Build the OT array for a whole registry: one object per directory
/// entry, in global-add (listing) order.
pub fn from_directory(directory: &dyn Directory) -> Node {
    let items: Vec<Node> = directory
        .entries()
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let object = directory
                .object(entry.id)
                .map(|o| Rc::from(o) as Rc<dyn RemoteObject>);
            let producer = EntryProducer { entry: Rc::new(entry), object };
            Node::object(NodeKey::at(i as i64), Producer::External(Box::new(producer)))
        })
        .collect();
    Node::fixed_array(NodeKey::none(), items)
}
