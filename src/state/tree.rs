//! Arena tree shared by snapshots and live router state.
//!
//! # Responsibilities
//! - Own every node of a route tree in one `Vec`
//! - Answer parent, children and root-path lookups by `NodeId`
//!
//! # Design Decisions
//! - Parent links are plain indices used for lookups only; the arena owns all nodes
//! - Trees are assembled from the recursive `TreeNode` form, then frozen into the arena
//! - Node 0 is always the root

/// Index of a node inside a `Tree`.
pub type NodeId = usize;

/// Recursive, owning form used while a tree is being built.
#[derive(Debug, Clone)]
pub struct TreeNode<T> {
    pub value: T,
    pub children: Vec<TreeNode<T>>,
}

impl<T> TreeNode<T> {
    pub fn new(value: T, children: Vec<TreeNode<T>>) -> Self {
        Self { value, children }
    }

    pub fn leaf(value: T) -> Self {
        Self::new(value, Vec::new())
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    value: T,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A frozen tree with index-based navigation.
#[derive(Debug, Clone)]
pub struct Tree<T> {
    nodes: Vec<Slot<T>>,
}

impl<T> Tree<T> {
    pub const ROOT: NodeId = 0;

    /// Freeze a recursive tree. Nodes are stored in pre-order.
    pub fn from_node(root: TreeNode<T>) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.push(root, None);
        tree
    }

    fn push(&mut self, node: TreeNode<T>, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Slot {
            value: node.value,
            parent,
            children: Vec::with_capacity(node.children.len()),
        });
        for child in node.children {
            let child_id = self.push(child, Some(id));
            self.nodes[id].children.push(child_id);
        }
        id
    }

    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn value(&self, id: NodeId) -> &T {
        &self.nodes[id].value
    }

    pub fn value_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.nodes[id].value
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].children.first().copied()
    }

    /// Ids from the root down to `id`, inclusive.
    pub fn path_from_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Every id in pre-order; parents always precede their children.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        0..self.nodes.len()
    }

    /// A tree of the same shape with mapped values.
    pub fn map<U>(&self, mut f: impl FnMut(NodeId, &T) -> U) -> Tree<U> {
        Tree {
            nodes: self
                .nodes
                .iter()
                .enumerate()
                .map(|(id, slot)| Slot {
                    value: f(id, &slot.value),
                    parent: slot.parent,
                    children: slot.children.clone(),
                })
                .collect(),
        }
    }

    /// Find the first node (pre-order) whose value satisfies `pred`.
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<NodeId> {
        self.nodes.iter().position(|slot| pred(&slot.value))
    }
}

impl<T: Clone> Tree<T> {
    /// Copy the subtree rooted at `id` back into recursive form.
    pub fn subtree(&self, id: NodeId) -> TreeNode<T> {
        TreeNode::new(
            self.nodes[id].value.clone(),
            self.nodes[id].children.iter().map(|&c| self.subtree(c)).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tree<&'static str> {
        Tree::from_node(TreeNode::new(
            "root",
            vec![
                TreeNode::new("a", vec![TreeNode::leaf("a1"), TreeNode::leaf("a2")]),
                TreeNode::leaf("b"),
            ],
        ))
    }

    #[test]
    fn test_preorder_layout() {
        let tree = sample();
        let values: Vec<_> = tree.ids().map(|id| *tree.value(id)).collect();
        assert_eq!(values, vec!["root", "a", "a1", "a2", "b"]);
    }

    #[test]
    fn test_parent_and_path() {
        let tree = sample();
        let a2 = tree.find(|v| *v == "a2").unwrap();
        assert_eq!(tree.parent(a2).map(|p| *tree.value(p)), Some("a"));
        let path: Vec<_> = tree.path_from_root(a2).into_iter().map(|id| *tree.value(id)).collect();
        assert_eq!(path, vec!["root", "a", "a2"]);
    }

    #[test]
    fn test_subtree_roundtrip() {
        let tree = sample();
        let a = tree.find(|v| *v == "a").unwrap();
        let sub = tree.subtree(a);
        assert_eq!(sub.value, "a");
        assert_eq!(sub.children.len(), 2);
    }
}
