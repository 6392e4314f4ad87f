//! Depth-first walk over the leaves of a schema tree.
use crate::node::Node;

/// Yields `(ancestors, leaf)` for every literal and abstract-literal node,
/// left to right. `ancestors` runs from the root to the leaf's parent.
pub struct Walk<'a> {
    stack: Vec<(Vec<&'a Node>, &'a Node)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (Vec<&'a Node>, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((path, node)) = self.stack.pop() {
            if node.is_leaf() {
                return Some((path, node));
            }
            let mut inner = path;
            inner.push(node);
            // reversed so the first child is popped first
            for child in node.children().into_iter().rev() {
                self.stack.push((inner.clone(), child));
            }
        }
        None
    }
}

impl Node {
    /// Lazy and finite; every call starts a fresh walk from the root.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![(Vec::new(), self)] }
    }
}

// ------------------------------- Tests ------------------------------------ //
