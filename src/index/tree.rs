use slotmap::{new_key_type, SlotMap};

use crate::core::state::Timestamp;

new_key_type! {
    struct NodeId;
}

#[derive(Debug)]
struct Node {
    value: Timestamp,
    freq: u64,
    height: i32,
    size: u64,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

// AVL multiset over timestamps. Equal values coalesce into one node with
// a frequency; subtree sizes count occurrences, not nodes.
#[derive(Debug, Default)]
pub struct TimeTree {
    nodes: SlotMap<NodeId, Node>,
    root: Option<NodeId>,
}

impl TimeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> u64 {
        self.size_of(self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn min(&self) -> Option<Timestamp> {
        let mut cur = self.root?;
        while let Some(left) = self.nodes[cur].left {
            cur = left;
        }
        Some(self.nodes[cur].value)
    }

    pub fn max(&self) -> Option<Timestamp> {
        let mut cur = self.root?;
        while let Some(right) = self.nodes[cur].right {
            cur = right;
        }
        Some(self.nodes[cur].value)
    }

    pub fn count_at_most(&self, bound: Timestamp) -> u64 {
        let mut total = 0;
        let mut cur = self.root;
        while let Some(id) = cur {
            let node = &self.nodes[id];
            if node.value <= bound {
                total += self.size_of(node.left) + node.freq;
                cur = node.right;
            } else {
                cur = node.left;
            }
        }
        total
    }

    pub fn insert(&mut self, value: Timestamp) {
        self.insert_count(value, 1);
    }

    pub fn insert_count(&mut self, value: Timestamp, count: u64) {
        if count == 0 {
            return;
        }
        self.root = Some(self.insert_at(self.root, value, count));
    }

    // Removes one occurrence of the smallest stored value. Callers must
    // check count_at_most(bound) > 0 first, which puts the minimum at or
    // below bound; the always-left descent then never deletes a node with
    // two children.
    pub fn consume_at_most(&mut self, bound: Timestamp) {
        self.root = self.consume_at(self.root, bound);
    }

    // Removes one occurrence of exactly `value`; no-op when absent.
    pub fn remove(&mut self, value: Timestamp) {
        self.root = self.remove_at(self.root, value);
    }

    pub fn counts(&self) -> Vec<(Timestamp, u64)> {
        let mut out = Vec::new();
        self.collect_in_order(self.root, &mut out);
        out
    }

    fn collect_in_order(&self, node: Option<NodeId>, out: &mut Vec<(Timestamp, u64)>) {
        let Some(id) = node else { return };
        let (left, right) = (self.nodes[id].left, self.nodes[id].right);
        self.collect_in_order(left, out);
        out.push((self.nodes[id].value, self.nodes[id].freq));
        self.collect_in_order(right, out);
    }

    fn size_of(&self, node: Option<NodeId>) -> u64 {
        node.map_or(0, |id| self.nodes[id].size)
    }

    fn height_of(&self, node: Option<NodeId>) -> i32 {
        node.map_or(0, |id| self.nodes[id].height)
    }

    fn balance_of(&self, id: NodeId) -> i32 {
        self.height_of(self.nodes[id].left) - self.height_of(self.nodes[id].right)
    }

    fn refresh(&mut self, id: NodeId) {
        let (left, right) = (self.nodes[id].left, self.nodes[id].right);
        let height = self.height_of(left).max(self.height_of(right)) + 1;
        let size = self.size_of(left) + self.nodes[id].freq + self.size_of(right);
        let node = &mut self.nodes[id];
        node.height = height;
        node.size = size;
    }

    fn rotate_right(&mut self, y: NodeId) -> NodeId {
        let x = self.nodes[y].left.expect("right rotation requires a left child");
        self.nodes[y].left = self.nodes[x].right;
        self.nodes[x].right = Some(y);
        self.refresh(y);
        self.refresh(x);
        x
    }

    fn rotate_left(&mut self, x: NodeId) -> NodeId {
        let y = self.nodes[x].right.expect("left rotation requires a right child");
        self.nodes[x].right = self.nodes[y].left;
        self.nodes[y].left = Some(x);
        self.refresh(x);
        self.refresh(y);
        y
    }

    fn rebalance(&mut self, id: NodeId) -> NodeId {
        let balance = self.balance_of(id);
        if balance > 1 {
            let left = self.nodes[id].left.expect("left-heavy node has a left child");
            if self.balance_of(left) < 0 {
                let rotated = self.rotate_left(left);
                self.nodes[id].left = Some(rotated);
            }
            return self.rotate_right(id);
        }
        if balance < -1 {
            let right = self.nodes[id].right.expect("right-heavy node has a right child");
            if self.balance_of(right) > 0 {
                let rotated = self.rotate_right(right);
                self.nodes[id].right = Some(rotated);
            }
            return self.rotate_left(id);
        }
        id
    }

    fn insert_at(&mut self, node: Option<NodeId>, value: Timestamp, count: u64) -> NodeId {
        let Some(id) = node else {
            return self.nodes.insert(Node {
                value,
                freq: count,
                height: 1,
                size: count,
                left: None,
                right: None,
            });
        };
        let current = self.nodes[id].value;
        if value == current {
            let node = &mut self.nodes[id];
            node.freq += count;
            node.size += count;
            return id;
        }
        if value < current {
            let child = self.insert_at(self.nodes[id].left, value, count);
            self.nodes[id].left = Some(child);
        } else {
            let child = self.insert_at(self.nodes[id].right, value, count);
            self.nodes[id].right = Some(child);
        }
        self.refresh(id);
        self.rebalance(id)
    }

    fn consume_at(&mut self, node: Option<NodeId>, bound: Timestamp) -> Option<NodeId> {
        let id = node?;
        let (value, left, right, freq) = {
            let n = &self.nodes[id];
            (n.value, n.left, n.right, n.freq)
        };
        if value > bound || left.is_some() {
            let child = self.consume_at(left, bound);
            self.nodes[id].left = child;
        } else if freq > 1 {
            let node = &mut self.nodes[id];
            node.freq -= 1;
            node.size -= 1;
            return Some(id);
        } else {
            // No left subtree, so any right child is a lone leaf and can
            // replace this node without rebalancing.
            let removed = self.nodes.remove(id);
            debug_assert!(removed.is_some(), "arena lost a node");
            return right;
        }
        self.refresh(id);
        Some(self.rebalance(id))
    }

    fn remove_at(&mut self, node: Option<NodeId>, value: Timestamp) -> Option<NodeId> {
        let id = node?;
        let current = self.nodes[id].value;
        if value < current {
            let child = self.remove_at(self.nodes[id].left, value);
            self.nodes[id].left = child;
        } else if value > current {
            let child = self.remove_at(self.nodes[id].right, value);
            self.nodes[id].right = child;
        } else if self.nodes[id].freq > 1 {
            let node = &mut self.nodes[id];
            node.freq -= 1;
            node.size -= 1;
            return Some(id);
        } else {
            let (left, right) = (self.nodes[id].left, self.nodes[id].right);
            match (left, right) {
                (None, child) | (child, None) => {
                    let removed = self.nodes.remove(id);
                    debug_assert!(removed.is_some(), "arena lost a node");
                    return child;
                }
                (Some(_), Some(right)) => {
                    // Two children: adopt one occurrence of the in-order
                    // successor's value and remove that occurrence below.
                    let successor = self.min_from(right);
                    self.nodes[id].value = successor;
                    let child = self.remove_at(Some(right), successor);
                    self.nodes[id].right = child;
                }
            }
        }
        self.refresh(id);
        Some(self.rebalance(id))
    }

    fn min_from(&self, mut id: NodeId) -> Timestamp {
        while let Some(left) = self.nodes[id].left {
            id = left;
        }
        self.nodes[id].value
    }
}
