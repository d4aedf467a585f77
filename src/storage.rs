use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;

use crate::node::Node;
use crate::reference::{Ref, NO_VARIABLE};

/// A hasher that passes the precomputed `MyHash` value through unchanged.
#[derive(Default)]
pub struct MyHasher {
    hash: u64,
}

impl std::hash::Hasher for MyHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.hash
    }

    #[inline]
    fn write(&mut self, _bytes: &[u8]) {
        unreachable!("MyHasher only supports write_u64")
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.hash = i;
    }
}

/// The unique table: a hash-consing node store shared by all workers.
///
/// Node records live in an append-only arena indexed by `u32`; a concurrent
/// map deduplicates `(variable, low, high)` triples so structurally equal
/// functions share one index. The arena doubles on demand up to a fixed
/// maximum; running into the maximum is fatal (the operator must rerun with a
/// larger table).
///
/// Indices 0 and 1 are the FALSE and TRUE terminals, allocated up front and
/// absent from the dedup map.
pub struct Storage {
    nodes: RwLock<Vec<Node>>,
    index: DashMap<Node, u32, BuildHasherDefault<MyHasher>>,
    max_capacity: usize,
    grown: AtomicUsize,
}

impl Storage {
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Storage bits should be in the range 0..=31");

        let max_capacity = 1usize << bits;
        let mut nodes = Vec::with_capacity(1024.min(max_capacity));
        // Terminal records. Their variable is the sentinel and their children
        // point at themselves; accessors must never follow them.
        nodes.push(Node::new(NO_VARIABLE, Ref::FALSE, Ref::FALSE));
        nodes.push(Node::new(NO_VARIABLE, Ref::TRUE, Ref::TRUE));

        Self {
            nodes: RwLock::new(nodes),
            index: DashMap::with_hasher(BuildHasherDefault::default()),
            max_capacity,
            grown: AtomicUsize::new(0),
        }
    }

    /// Number of allocated nodes, terminals included.
    pub fn filled(&self) -> usize {
        self.nodes.read().expect("node table lock poisoned").len()
    }

    /// Maximum number of nodes the table may hold.
    pub fn capacity(&self) -> usize {
        self.max_capacity
    }

    /// Number of times the arena doubled.
    pub fn growths(&self) -> usize {
        self.grown.load(Ordering::Relaxed)
    }

    pub fn node(&self, index: u32) -> Node {
        let nodes = self.nodes.read().expect("node table lock poisoned");
        nodes[index as usize]
    }

    /// Inserts a node, returning the index of the existing record if the
    /// triple is already present.
    pub fn put(&self, node: Node) -> u32 {
        if let Some(i) = self.index.get(&node) {
            return *i;
        }

        let mut nodes = self.nodes.write().expect("node table lock poisoned");
        match self.index.entry(node) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                let i = nodes.len();
                if i >= self.max_capacity {
                    panic!(
                        "Node table full: {} nodes (rerun with a larger table)",
                        self.max_capacity
                    );
                }
                if i == nodes.capacity() {
                    self.grown.fetch_add(1, Ordering::Relaxed);
                    debug!("node table growing past {} nodes", i);
                }
                nodes.push(node);
                e.insert(i as u32);
                i as u32
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminals_preallocated() {
        let storage = Storage::new(4);
        assert_eq!(storage.filled(), 2);
        assert_eq!(storage.node(0).variable, NO_VARIABLE);
        assert_eq!(storage.node(1).variable, NO_VARIABLE);
    }

    #[test]
    fn test_put_dedup() {
        let storage = Storage::new(4);
        let a = storage.put(Node::new(2, Ref::FALSE, Ref::TRUE));
        let b = storage.put(Node::new(2, Ref::FALSE, Ref::TRUE));
        let c = storage.put(Node::new(4, Ref::FALSE, Ref::TRUE));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(storage.filled(), 4);
    }

    #[test]
    fn test_tags_distinguish_nodes() {
        let storage = Storage::new(4);
        let a = storage.put(Node::new(2, Ref::new(1, 4), Ref::FALSE));
        let b = storage.put(Node::new(2, Ref::new(1, 6), Ref::FALSE));
        assert_ne!(a, b);
    }

    #[test]
    #[should_panic(expected = "Node table full")]
    fn test_put_too_much() {
        let storage = Storage::new(2);
        for v in 0..4 {
            storage.put(Node::new(2 * v, Ref::FALSE, Ref::TRUE));
        }
    }
}
