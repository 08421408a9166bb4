//! B-tree implementation
//!
//! Insert is a recursive descent that returns at most one `Promotion` per
//! level; the tree only grows taller when a promotion leaves the root.

use std::fmt;

use crate::error::{KdbError, Result};
use super::node::{Entry, Node, Promotion};
use super::{Key, Value, MAX_KEYS};

/// Order-4 B-tree keyed by `Key`
#[derive(Debug, Default)]
pub struct BTree {
    root: Option<Box<Node>>,
    /// Total number of keys
    len: usize,
}

impl BTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self { root: None, len: 0 }
    }

    /// Insert a key that is not in the tree yet
    ///
    /// This is a blind insert: duplicates are not detected here, callers
    /// check with `get`/`search` first.
    pub fn insert(&mut self, key: Key, value: Value) {
        let entry = Entry { key, value };

        let promotion = match self.root.as_deref_mut() {
            Some(root) => insert_into(root, entry),
            None => {
                self.root = Some(Box::new(Node::leaf(entry)));
                None
            }
        };
        self.len += 1;

        if let Some(promotion) = promotion {
            if let Some(old_root) = self.root.take() {
                self.root = Some(Box::new(Node::root(old_root, promotion)));
            }
        }
    }

    /// Find the node holding `key`
    pub fn search(&self, key: Key) -> Option<&Node> {
        search_from(self.root.as_deref(), key)
    }

    /// Look up the value for `key`
    pub fn get(&self, key: Key) -> Option<&Value> {
        let mut node = self.root.as_deref();
        while let Some(current) = node {
            if let Some(value) = current.value(key) {
                return Some(value);
            }
            node = current.child(current.child_index(key));
        }
        None
    }

    pub fn contains(&self, key: Key) -> bool {
        self.get(key).is_some()
    }

    /// Total number of keys
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.as_deref()
    }

    /// Number of levels (0 for an empty tree)
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut node = self.root.as_deref();
        while let Some(current) = node {
            height += 1;
            node = current.child(0);
        }
        height
    }

    /// Visit every entry in ascending key order
    pub fn for_each(&self, mut visit: impl FnMut(&Entry)) {
        if let Some(root) = self.root.as_deref() {
            walk(root, &mut visit);
        }
    }

    /// All keys in ascending order
    pub fn keys(&self) -> Vec<Key> {
        let mut keys = Vec::with_capacity(self.len);
        self.for_each(|entry| keys.push(entry.key));
        keys
    }

    /// Check every structural invariant
    ///
    /// Occupancy, strictly increasing keys, `size + 1` children for internal
    /// nodes, separator bounds, uniform leaf depth and the key count.
    pub fn verify(&self) -> Result<()> {
        let Some(root) = self.root.as_deref() else {
            return if self.len == 0 {
                Ok(())
            } else {
                Err(KdbError::Invariant(format!("empty tree reports {} keys", self.len)))
            };
        };

        let mut check = Verifier::default();
        check.node(root, None, None, 1)?;

        if check.keys != self.len {
            return Err(KdbError::Invariant(format!(
                "tree holds {} keys but reports {}",
                check.keys, self.len
            )));
        }
        Ok(())
    }

    /// Indented dump of the tree, one line per node and per key
    pub fn render(&self) -> String {
        self.to_string()
    }
}

fn insert_into(node: &mut Node, entry: Entry) -> Option<Promotion> {
    if node.is_leaf() {
        if node.size() < MAX_KEYS {
            node.insert_entry(entry);
            return None;
        }
        return Some(node.split(entry, None));
    }

    let index = node.child_index(entry.key);
    let promotion = match node.child_mut(index) {
        Some(child) => insert_into(child, entry)?,
        None => {
            node.set_child(index, Node::leaf(entry));
            return None;
        }
    };

    if node.size() < MAX_KEYS {
        node.absorb(promotion, index);
        None
    } else {
        Some(node.split(promotion.entry, Some((index, promotion.right))))
    }
}

fn search_from(node: Option<&Node>, key: Key) -> Option<&Node> {
    let node = node?;
    if node.contains(key) {
        return Some(node);
    }
    search_from(node.child(node.child_index(key)), key)
}

fn walk(node: &Node, visit: &mut impl FnMut(&Entry)) {
    for (index, entry) in node.entries().enumerate() {
        if let Some(child) = node.child(index) {
            walk(child, visit);
        }
        visit(entry);
    }
    if let Some(last) = node.child(node.size()) {
        walk(last, visit);
    }
}

#[derive(Default)]
struct Verifier {
    keys: usize,
    leaf_depth: Option<usize>,
}

impl Verifier {
    /// `lower`/`upper` are exclusive bounds inherited from the parent
    fn node(&mut self, node: &Node, lower: Option<Key>, upper: Option<Key>, depth: usize) -> Result<()> {
        let size = node.size();
        if !(1..=MAX_KEYS).contains(&size) {
            return Err(KdbError::Invariant(format!("node at depth {depth} has size {size}")));
        }
        if node.entries().count() != size {
            return Err(KdbError::Invariant(format!(
                "node at depth {depth} has size {size} but {} entries",
                node.entries().count()
            )));
        }

        let mut previous = lower;
        for key in node.keys() {
            if previous.is_some_and(|p| key <= p) {
                return Err(KdbError::Invariant(format!("key {key} out of order at depth {depth}")));
            }
            previous = Some(key);
        }
        if let (Some(last), Some(upper)) = (previous, upper) {
            if last >= upper {
                return Err(KdbError::Invariant(format!(
                    "key {last} not below separator {upper} at depth {depth}"
                )));
            }
        }

        self.keys += size;

        if node.is_leaf() {
            return match self.leaf_depth {
                Some(expected) if expected != depth => Err(KdbError::Invariant(format!(
                    "leaf at depth {depth}, expected {expected}"
                ))),
                _ => {
                    self.leaf_depth = Some(depth);
                    Ok(())
                }
            };
        }

        let linked = node.children().filter(Option::is_some).count();
        if linked != size + 1 || node.children().take(size + 1).any(|c| c.is_none()) {
            return Err(KdbError::Invariant(format!(
                "internal node at depth {depth} with {size} keys has {linked} children"
            )));
        }

        let keys: Vec<Key> = node.keys().collect();
        for (index, child) in node.children().take(size + 1).flatten().enumerate() {
            let low = if index == 0 { lower } else { Some(keys[index - 1]) };
            let high = keys.get(index).copied().or(upper);
            self.node(child, low, high, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for BTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.root.as_deref() {
            Some(root) => fmt_node(f, root, 0, "ROOT"),
            None => writeln!(f, "(empty tree)"),
        }
    }
}

fn fmt_node(f: &mut fmt::Formatter<'_>, node: &Node, level: usize, position: &str) -> fmt::Result {
    let indent = "    ".repeat(level);
    writeln!(f, "{indent}[{position}] Node (size={}):", node.size())?;
    for (index, entry) in node.entries().enumerate() {
        writeln!(f, "{indent}  key{}: {} -> {:?}", index + 1, entry.key, &*entry.value)?;
    }
    for (index, child) in node.children().enumerate() {
        if let Some(child) = child {
            fmt_node(f, child, level + 1, &format!("CP{}", index + 1))?;
        }
    }
    Ok(())
}
