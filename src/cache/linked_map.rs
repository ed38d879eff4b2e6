//! Linked Map Module
//!
//! An insertion-ordered map whose order can be rearranged in O(1).
//!
//! Nodes live in a flat arena (`Vec`) and link to each other by index; a
//! `key -> index` table gives O(1) lookup. Freed slots are recycled, so moving
//! a key never allocates.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::mem;

/// Sentinel index for "no node"
const NIL: usize = usize::MAX;

#[derive(Debug, Clone)]
struct Node<K, T> {
    /// None while the slot sits on the free list
    slot: Option<(K, T)>,
    prev: usize,
    next: usize,
}

// == Linked Map ==
/// Ordered map backed by an arena of doubly linked nodes.
///
/// - Front = oldest (first inserted / least recently moved)
/// - Back = newest
#[derive(Debug, Clone)]
pub struct LinkedMap<K, T> {
    index: HashMap<K, usize>,
    nodes: Vec<Node<K, T>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl<K, T> Default for LinkedMap<K, T>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> LinkedMap<K, T>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&T>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index.get(key)?;
        self.nodes[idx].slot.as_ref().map(|(_, value)| value)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut T>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index.get(key)?;
        self.nodes[idx].slot.as_mut().map(|(_, value)| value)
    }

    /// Returns the stored (owned) key equal to `key`.
    pub fn get_key<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get_key_value(key).map(|(stored, _)| stored)
    }

    // == Insert ==
    /// Inserts at the back.
    ///
    /// An existing key keeps its position; only its value is replaced and the
    /// previous value is returned.
    pub fn insert(&mut self, key: K, value: T) -> Option<T> {
        if let Some(&idx) = self.index.get(&key) {
            if let Some((_, existing)) = self.nodes[idx].slot.as_mut() {
                return Some(mem::replace(existing, value));
            }
        }

        let idx = self.alloc(key.clone(), value);
        self.link_back(idx);
        self.index.insert(key, idx);
        None
    }

    // == Move To Back ==
    /// Marks a key as newest. Returns false if the key is absent.
    pub fn move_to_back<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some(&idx) = self.index.get(key) else {
            return false;
        };
        if idx != self.tail {
            self.unlink(idx);
            self.link_back(idx);
        }
        true
    }

    // == Remove ==
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, value)| value)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, T)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.index.remove(key)?;
        self.release(idx)
    }

    // == Pop Front ==
    /// Removes and returns the oldest entry.
    pub fn pop_front(&mut self) -> Option<(K, T)> {
        if self.head == NIL {
            return None;
        }
        let (key, value) = self.release(self.head)?;
        self.index.remove(&key);
        Some((key, value))
    }

    // == Peek ==
    pub fn front(&self) -> Option<(&K, &T)> {
        self.entry_at(self.head)
    }

    pub fn back(&self) -> Option<(&K, &T)> {
        self.entry_at(self.tail)
    }

    /// Key following `key` in order, or None if `key` is last or absent.
    pub fn next_key<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index.get(key)?;
        self.entry_at(self.nodes[idx].next).map(|(key, _)| key)
    }

    pub fn iter(&self) -> Iter<'_, K, T> {
        Iter {
            nodes: &self.nodes,
            cursor: self.head,
            remaining: self.len(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.nodes.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    // == Arena Internals ==
    fn entry_at(&self, idx: usize) -> Option<(&K, &T)> {
        if idx == NIL {
            return None;
        }
        self.nodes[idx].slot.as_ref().map(|(key, value)| (key, value))
    }

    fn alloc(&mut self, key: K, value: T) -> usize {
        let node = Node {
            slot: Some((key, value)),
            prev: NIL,
            next: NIL,
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Unlinks a node, returns its slot to the free list and hands back the payload.
    /// The caller is responsible for the `index` entry.
    fn release(&mut self, idx: usize) -> Option<(K, T)> {
        self.unlink(idx);
        self.free.push(idx);
        self.nodes[idx].slot.take()
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        if prev == NIL {
            self.head = next;
        } else {
            self.nodes[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.nodes[next].prev = prev;
        }
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = NIL;
    }

    fn link_back(&mut self, idx: usize) {
        self.nodes[idx].prev = self.tail;
        self.nodes[idx].next = NIL;
        if self.tail == NIL {
            self.head = idx;
        } else {
            self.nodes[self.tail].next = idx;
        }
        self.tail = idx;
    }
}

// == Iterator ==
/// Front-to-back iterator over a [`LinkedMap`].
pub struct Iter<'a, K, T> {
    nodes: &'a [Node<K, T>],
    cursor: usize,
    remaining: usize,
}

impl<'a, K, T> Iterator for Iter<'a, K, T> {
    type Item = (&'a K, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }
        let node = &self.nodes[self.cursor];
        self.cursor = node.next;
        self.remaining = self.remaining.saturating_sub(1);
        node.slot.as_ref().map(|(key, value)| (key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
