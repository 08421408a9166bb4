//! B-tree node
//!
//! A fixed-slot 2-3-4 node: up to three sorted entries and up to four
//! owned children. A node is a leaf iff it has no children; an internal
//! node always has `size + 1` children packed at the front.

use super::{Key, Value, MAX_CHILDREN, MAX_KEYS};

/// A key and the handle to its value
#[derive(Debug, Clone)]
pub struct Entry {
    pub key: Key,
    pub value: Value,
}

/// Split output travelling up to the parent
#[derive(Debug)]
pub(super) struct Promotion {
    /// Middle entry of the split
    pub entry: Entry,
    /// New right sibling; the split node stays as the left half
    pub right: Box<Node>,
}

/// A node of the B-tree
#[derive(Debug, Default)]
pub struct Node {
    entries: [Option<Entry>; MAX_KEYS],
    children: [Option<Box<Node>>; MAX_CHILDREN],
    size: usize,
}

impl Node {
    /// Singleton leaf
    pub(super) fn leaf(entry: Entry) -> Self {
        let mut node = Self::default();
        node.entries[0] = Some(entry);
        node.size = 1;
        node
    }

    /// New root above a split: old root on the left, sibling on the right
    pub(super) fn root(left: Box<Node>, promotion: Promotion) -> Self {
        let mut node = Self::leaf(promotion.entry);
        node.children[0] = Some(left);
        node.children[1] = Some(promotion.right);
        node
    }

    /// Number of occupied key slots
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    /// Occupied entries in key order
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().take(self.size).flatten()
    }

    /// Keys in order
    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.entries().map(|e| e.key)
    }

    /// Child links in slot order, empty slots included
    pub fn children(&self) -> impl Iterator<Item = Option<&Node>> {
        self.children.iter().map(|c| c.as_deref())
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.children.get(index).and_then(|c| c.as_deref())
    }

    /// Value stored under `key` in this node only
    pub fn value(&self, key: Key) -> Option<&Value> {
        self.entries().find(|e| e.key == key).map(|e| &e.value)
    }

    pub fn contains(&self, key: Key) -> bool {
        self.value(key).is_some()
    }

    /// Child slot whose range holds `key`: the first separator not
    /// exceeded, else the last child
    pub(super) fn child_index(&self, key: Key) -> usize {
        self.keys().position(|k| key < k).unwrap_or(self.size)
    }

    pub(super) fn child_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.children.get_mut(index).and_then(|c| c.as_deref_mut())
    }

    /// Attach a fresh leaf in an empty child slot
    pub(super) fn set_child(&mut self, index: usize, child: Node) {
        self.children[index] = Some(Box::new(child));
    }

    /// Insert into a node with a free slot, keeping keys sorted
    pub(super) fn insert_entry(&mut self, entry: Entry) {
        debug_assert!(self.size < MAX_KEYS);
        let pos = self.child_index(entry.key);
        self.entries[pos..=self.size].rotate_right(1);
        self.entries[pos] = Some(entry);
        self.size += 1;
    }

    /// Take in a promotion from the child at `from_child`
    ///
    /// The promoted entry lands at key slot `from_child` and its right
    /// sibling directly after the child that split.
    pub(super) fn absorb(&mut self, promotion: Promotion, from_child: usize) {
        debug_assert!(self.size < MAX_KEYS);
        self.entries[from_child..=self.size].rotate_right(1);
        self.entries[from_child] = Some(promotion.entry);
        self.children[from_child + 1..=self.size + 1].rotate_right(1);
        self.children[from_child + 1] = Some(promotion.right);
        self.size += 1;
    }

    /// Split a full node around one extra entry
    ///
    /// The four entries are sorted; this node keeps the smallest, a new
    /// right sibling takes the two largest and the second smallest is
    /// promoted. For an internal node, `new_child` is the sibling produced
    /// by the child at index `.0`; the five children are divided two to the
    /// left and three to the right.
    pub(super) fn split(&mut self, entry: Entry, new_child: Option<(usize, Box<Node>)>) -> Promotion {
        let mut items: Vec<Entry> = self.entries.iter_mut().filter_map(Option::take).collect();
        items.push(entry);
        items.sort_by_key(|e| e.key);

        let mut items = items.into_iter();
        let (Some(smallest), Some(middle)) = (items.next(), items.next()) else {
            unreachable!("split is only called on a full node");
        };

        self.entries[0] = Some(smallest);
        self.size = 1;

        let mut right = Node::default();
        for (slot, item) in right.entries.iter_mut().zip(items) {
            *slot = Some(item);
        }
        right.size = 2;

        if let Some((from_child, sibling)) = new_child {
            let mut children: Vec<Option<Box<Node>>> =
                self.children.iter_mut().map(Option::take).collect();
            children.insert(from_child + 1, Some(sibling));

            let mut children = children.into_iter();
            for slot in self.children.iter_mut().take(2) {
                *slot = children.next().flatten();
            }
            for slot in right.children.iter_mut() {
                *slot = children.next().flatten();
            }
        }

        Promotion {
            entry: middle,
            right: Box::new(right),
        }
    }
}
