use generational_arena::{Arena, Index};

/// Tree node in the arena-based hierarchy structure.
#[derive(Debug, Clone)]
pub struct TreeNode<T> {
    /// Payload for this node
    pub data: T,
    /// Index of parent node in the arena, None for the root
    pub parent: Option<Index>,
    /// Indices of child nodes in the arena, in insertion order
    pub children: Vec<Index>,
}

/// Arena-based rooted tree.
///
/// Uses generational arena for memory-safe node references and O(1) lookups.
/// The hierarchy metadata and the annotated count tree share this storage.
#[derive(Debug, Clone)]
pub struct TreeArena<T> {
    arena: Arena<TreeNode<T>>,
    root: Option<Index>,
}

impl<T> Default for TreeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TreeArena<T> {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
        }
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            arena: Arena::with_capacity(n),
            root: None,
        }
    }

    pub fn insert_node(&mut self, data: T, parent: Option<Index>) -> Index {
        let node = TreeNode {
            data,
            parent,
            children: Vec::new(),
        };
        let node_idx = self.arena.insert(node);

        if let Some(parent_idx) = parent {
            if let Some(parent) = self.arena.get_mut(parent_idx) {
                parent.children.push(node_idx);
            }
        } else {
            self.root = Some(node_idx);
        }

        node_idx
    }

    pub fn get_node(&self, idx: Index) -> Option<&TreeNode<T>> {
        self.arena.get(idx)
    }

    pub fn get_node_mut(&mut self, idx: Index) -> Option<&mut TreeNode<T>> {
        self.arena.get_mut(idx)
    }

    pub fn root(&self) -> Option<Index> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Pre-order traversal, children left to right.
    pub fn iter(&self) -> TreeIterator<'_, T> {
        TreeIterator::new(self)
    }

    pub fn iter_postorder(&self) -> PostOrderIterator<'_, T> {
        PostOrderIterator::new(self)
    }

    /// Collects all leaf nodes (nodes with no children) below `idx`, left to right.
    ///
    /// A leaf is its own single descendant.
    pub fn leaves_under(&self, idx: Index) -> Vec<Index> {
        let mut leaves = Vec::new();
        self.collect_leaves(idx, &mut leaves);
        leaves
    }

    fn collect_leaves(&self, node_idx: Index, leaves: &mut Vec<Index>) {
        if let Some(node) = self.get_node(node_idx) {
            if node.children.is_empty() {
                leaves.push(node_idx);
            } else {
                for &child in &node.children {
                    self.collect_leaves(child, leaves);
                }
            }
        }
    }

    /// Builds a tree of identical shape with every payload mapped through `f`.
    ///
    /// Returned pairs relate each source index to its new index.
    pub fn map<U, F>(&self, mut f: F) -> (TreeArena<U>, Vec<(Index, Index)>)
    where
        F: FnMut(Index, &T) -> U,
    {
        let mut mapped = TreeArena::with_capacity(self.len());
        let mut pairs = Vec::with_capacity(self.len());
        let mut stack: Vec<(Index, Option<Index>)> = self.root.map(|r| (r, None)).into_iter().collect();

        while let Some((src_idx, parent_idx)) = stack.pop() {
            if let Some(node) = self.get_node(src_idx) {
                let new_idx = mapped.insert_node(f(src_idx, &node.data), parent_idx);
                pairs.push((src_idx, new_idx));
                // Reverse so children keep their left-to-right order
                for &child in node.children.iter().rev() {
                    stack.push((child, Some(new_idx)));
                }
            }
        }

        (mapped, pairs)
    }
}

pub struct TreeIterator<'a, T> {
    arena: &'a TreeArena<T>,
    stack: Vec<Index>,
}

impl<'a, T> TreeIterator<'a, T> {
    fn new(arena: &'a TreeArena<T>) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = arena.root() {
            stack.push(root);
        }
        Self { arena, stack }
    }
}

impl<'a, T> Iterator for TreeIterator<'a, T> {
    type Item = (Index, &'a TreeNode<T>);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.arena.get_node(current_idx) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current_idx, node));
            }
        }
        None
    }
}

pub struct PostOrderIterator<'a, T> {
    arena: &'a TreeArena<T>,
    stack: Vec<(Index, bool)>,
}

impl<'a, T> PostOrderIterator<'a, T> {
    fn new(arena: &'a TreeArena<T>) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = arena.root() {
            stack.push((root, false));
        }
        Self { arena, stack }
    }
}

impl<'a, T> Iterator for PostOrderIterator<'a, T> {
    type Item = (Index, &'a TreeNode<T>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, visited)) = self.stack.pop() {
            if let Some(node) = self.arena.get_node(current_idx) {
                if !visited {
                    self.stack.push((current_idx, true));
                    for &child in node.children.iter().rev() {
                        self.stack.push((child, false));
                    }
                } else {
                    return Some((current_idx, node));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (TreeArena<&'static str>, Index, Index, Index) {
        let mut tree = TreeArena::new();
        let root = tree.insert_node("root", None);
        let a = tree.insert_node("a", Some(root));
        let b = tree.insert_node("b", Some(root));
        let a1 = tree.insert_node("a1", Some(a));
        tree.insert_node("a2", Some(a));
        tree.insert_node("b1", Some(b));
        (tree, root, a, a1)
    }

    #[test]
    fn test_preorder_and_postorder() {
        let (tree, _, _, _) = sample();
        let pre: Vec<_> = tree.iter().map(|(_, n)| n.data).collect();
        assert_eq!(pre, vec!["root", "a", "a1", "a2", "b", "b1"]);
        let post: Vec<_> = tree.iter_postorder().map(|(_, n)| n.data).collect();
        assert_eq!(post, vec!["a1", "a2", "a", "b1", "b", "root"]);
    }

    #[test]
    fn test_leaves_under() {
        let (tree, root, a, a1) = sample();
        assert_eq!(tree.leaves_under(root).len(), 3);
        assert_eq!(tree.leaves_under(a).len(), 2);
        assert_eq!(tree.leaves_under(a1), vec![a1]);
    }

    #[test]
    fn test_map_preserves_shape() {
        let (tree, _, _, _) = sample();
        let (mapped, pairs) = tree.map(|_, s| s.len());
        assert_eq!(pairs.len(), 6);
        let pre: Vec<_> = mapped.iter().map(|(_, n)| n.data).collect();
        assert_eq!(pre, vec![4, 1, 2, 2, 1, 2]);
    }
}
