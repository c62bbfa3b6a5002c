//! Rendering arena trees as `termtree` trees for terminal display.

use generational_arena::Index;
use termtree::Tree;
use tracing::instrument;

use crate::domain::{AnnotatedTree, Hierarchy, Selection, TreeArena};

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

/// Build a display tree from an arena, labelling each node with `label`.
fn arena_to_tree<T, F>(arena: &TreeArena<T>, label: F) -> Tree<String>
where
    F: Fn(&T) -> String,
{
    fn build_tree<T, F: Fn(&T) -> String>(
        arena: &TreeArena<T>,
        node_idx: Index,
        parent_tree: &mut Tree<String>,
        label: &F,
    ) {
        if let Some(node) = arena.get_node(node_idx) {
            for &child_idx in &node.children {
                if let Some(child) = arena.get_node(child_idx) {
                    let mut child_tree = Tree::new(label(&child.data));
                    build_tree(arena, child_idx, &mut child_tree, label);
                    parent_tree.push(child_tree);
                }
            }
        }
    }

    match arena.root().and_then(|idx| arena.get_node(idx).map(|n| (idx, n))) {
        Some((root_idx, root)) => {
            let mut tree = Tree::new(label(&root.data));
            build_tree(arena, root_idx, &mut tree, &label);
            tree
        }
        None => Tree::new("Empty tree".to_string()),
    }
}

impl TreeNodeConvert for Hierarchy {
    fn to_tree_string(&self) -> Tree<String> {
        arena_to_tree(self.tree(), |meta| {
            format!("{} (span={}, p0={:.4})", meta.id, meta.leaf_span, meta.background_prob)
        })
    }
}

impl TreeNodeConvert for AnnotatedTree {
    #[instrument(level = "debug", skip(self))]
    fn to_tree_string(&self) -> Tree<String> {
        arena_to_tree(self.tree(), |node| node.to_string())
    }
}

impl TreeNodeConvert for Selection {
    /// Annotated tree with surviving features marked.
    fn to_tree_string(&self) -> Tree<String> {
        arena_to_tree(self.tree().tree(), |node| {
            if self.features().contains(&node.feature_id) {
                format!("{node} [survivor]")
            } else {
                node.to_string()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{select_survival_features, CountsTable, SelectionOptions, ROOT_FEATURE};
    use crate::domain::trinucleotide::leaf_contexts;

    #[test]
    fn test_hierarchy_tree_lists_every_feature() {
        let h = Hierarchy::uniform_trinucleotide().unwrap();
        let rendered = h.to_tree_string().to_string();
        assert!(rendered.starts_with(ROOT_FEATURE));
        assert_eq!(rendered.lines().count(), 1 + 6 + 24 + 96);
        assert!(rendered.contains("A[C>T]G (span=1, p0=0.2500)"));
    }

    #[test]
    fn test_selection_tree_marks_survivors() {
        let h = Hierarchy::uniform_trinucleotide().unwrap();
        let table = CountsTable::from_totals(
            leaf_contexts()
                .into_iter()
                .map(|c| if c == "A[C>A]A" { (c, 2100) } else { (c, 100) }),
        )
        .unwrap();
        let selection = select_survival_features(&h, &table, &SelectionOptions::default()).unwrap();
        let rendered = selection.to_tree_string().to_string();
        let marked: Vec<&str> = rendered.lines().filter(|l| l.contains("[survivor]")).collect();
        assert_eq!(marked.len(), selection.features().len());
        assert!(marked.iter().any(|l| l.contains("A[C>A]A q=2100")));
    }
}
