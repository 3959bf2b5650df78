//! Keys currently being derived in one session.

use std::collections::HashSet;

use condor_core::Key;

/// Ordered set of in-progress keys.
///
/// The order is the derivation stack, outermost first, so a cycle can be
/// reported as the chain of keys that led back to itself.
#[derive(Debug, Default)]
pub struct InFlight {
    order: Vec<Key>,
    members: HashSet<Key>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` in progress. Returns false if it already was.
    pub fn enter(&mut self, key: Key) -> bool {
        if !self.members.insert(key) {
            return false;
        }
        self.order.push(key);
        true
    }

    /// Clear the mark on `key`. Returns false if it was not marked.
    pub fn leave(&mut self, key: Key) -> bool {
        if !self.members.remove(&key) {
            return false;
        }
        if self.order.last() == Some(&key) {
            self.order.pop();
        } else if let Some(pos) = self.order.iter().rposition(|k| *k == key) {
            self.order.remove(pos);
        }
        true
    }

    pub fn contains(&self, key: Key) -> bool {
        self.members.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The in-progress chain from `key` onward, closed with `key` again.
    pub fn chain_from(&self, key: Key) -> Vec<Key> {
        let start = self
            .order
            .iter()
            .position(|k| *k == key)
            .unwrap_or(self.order.len());
        let mut chain = self.order[start..].to_vec();
        chain.push(key);
        chain
    }

    /// Drop every mark above depth `len`.
    pub fn unwind_to(&mut self, len: usize) {
        while self.order.len() > len {
            if let Some(key) = self.order.pop() {
                self.members.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_leave() {
        let mut marks = InFlight::new();
        let a = Key::global("A");
        assert!(marks.enter(a));
        assert!(!marks.enter(a));
        assert!(marks.contains(a));
        assert!(marks.leave(a));
        assert!(!marks.leave(a));
        assert!(marks.is_empty());
    }

    #[test]
    fn test_chain_from_closes_loop() {
        let mut marks = InFlight::new();
        let (a, b, c) = (Key::global("A"), Key::global("B"), Key::global("C"));
        marks.enter(a);
        marks.enter(b);
        marks.enter(c);
        assert_eq!(marks.chain_from(b), vec![b, c, b]);
        assert_eq!(marks.chain_from(a), vec![a, b, c, a]);
    }

    #[test]
    fn test_unwind_to_clears_members() {
        let mut marks = InFlight::new();
        let keys: Vec<Key> = (0..5).map(|i| Key::global(&format!("k{}", i))).collect();
        for key in &keys {
            marks.enter(*key);
        }
        marks.unwind_to(2);
        assert_eq!(marks.len(), 2);
        assert!(marks.contains(keys[1]));
        assert!(!marks.contains(keys[2]));
        assert!(!marks.contains(keys[4]));
        // A cleared key can be entered again.
        assert!(marks.enter(keys[3]));
    }
}
