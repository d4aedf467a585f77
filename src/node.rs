use std::hash::{Hash, Hasher};

use crate::reference::Ref;
use crate::utils::{fold, mix64, MyHash};

/// A TBDD node: one decision point in the diagram.
///
/// Each node represents a Shannon decomposition over its variable:
/// ```text
/// f = (¬v ∧ f_low) ∨ (v ∧ f_high)
/// ```
/// with both children being tagged edges. Tags on the children encode the
/// don't-care / zero-suppressed runs between this variable and the child's
/// variable; the node itself carries no tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Node {
    pub variable: u32,
    pub low: Ref,
    pub high: Ref,
}

impl Node {
    pub fn new(variable: u32, low: Ref, high: Ref) -> Self {
        Self { variable, low, high }
    }
}

impl MyHash for Node {
    fn hash(&self) -> u64 {
        fold(fold(mix64(self.variable as u64), self.low.raw()), self.high.raw())
    }
}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(MyHash::hash(self));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_equality() {
        let a = Node::new(2, Ref::FALSE, Ref::TRUE);
        let b = Node::new(2, Ref::FALSE, Ref::TRUE);
        let c = Node::new(4, Ref::FALSE, Ref::TRUE);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(MyHash::hash(&a), MyHash::hash(&b));
    }

    #[test]
    fn test_node_hash_sees_tags() {
        let a = Node::new(2, Ref::new(1, 4), Ref::FALSE);
        let b = Node::new(2, Ref::new(1, 6), Ref::FALSE);
        assert_ne!(a, b);
        assert_ne!(MyHash::hash(&a), MyHash::hash(&b));
    }
}
