//! Type tree nodes
//!
//! A generated tree is a pre-order flat sequence: the root sits at level 0
//! and a node's children are the run of following nodes one level deeper.
//! [`TypeTree`] is the nested view of the same data.

/// One node of a flattened type tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeTreeNode {
    /// Display type after alias and generic substitution
    pub type_name: String,
    /// Field name, `"Base"` for the root, `"data"` for array elements
    pub name: String,
    /// Depth from the root (root = 0)
    pub level: i32,
    /// Meta flag bits (see [`crate::alias::meta_flags`])
    pub meta_flag: i32,
    /// Serialized size in bytes, `-1` when variable
    pub byte_size: i32,
}

impl TypeTreeNode {
    /// Create a node
    pub fn new(
        type_name: impl Into<String>,
        name: impl Into<String>,
        level: i32,
        meta_flag: i32,
        byte_size: i32,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            level,
            meta_flag,
            byte_size,
        }
    }
}

/// Check the level invariant of a flat sequence
///
/// The first node is at level 0, no other node is at level 0, and levels
/// never increase by more than one between consecutive nodes.
pub fn validate_levels(nodes: &[TypeTreeNode]) -> bool {
    let Some(first) = nodes.first() else {
        return true;
    };
    if first.level != 0 {
        return false;
    }
    nodes
        .windows(2)
        .all(|pair| pair[1].level >= 1 && pair[1].level <= pair[0].level + 1)
}

/// Nested type tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeTree {
    /// This node, with its original level
    pub node: TypeTreeNode,
    /// Direct children in order
    pub children: Vec<TypeTree>,
}

impl TypeTree {
    /// Rebuild the nested tree from a flat pre-order sequence
    ///
    /// Returns `None` for an empty sequence or one that breaks the level
    /// invariant.
    pub fn from_flat(nodes: &[TypeTreeNode]) -> Option<TypeTree> {
        if nodes.is_empty() || !validate_levels(nodes) {
            return None;
        }

        // Stack of open subtrees; the bottom entry is the root
        let mut stack: Vec<TypeTree> = Vec::new();
        for node in nodes {
            while stack
                .last()
                .is_some_and(|open| open.node.level >= node.level)
            {
                let done = stack.pop()?;
                stack.last_mut()?.children.push(done);
            }
            stack.push(TypeTree {
                node: node.clone(),
                children: Vec::new(),
            });
        }
        while stack.len() > 1 {
            let done = stack.pop()?;
            stack.last_mut()?.children.push(done);
        }
        stack.pop()
    }

    /// Flatten back into pre-order
    pub fn flatten(&self) -> Vec<TypeTreeNode> {
        let mut out = Vec::with_capacity(self.len());
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut Vec<TypeTreeNode>) {
        out.push(self.node.clone());
        for child in &self.children {
            child.flatten_into(out);
        }
    }

    /// Total number of nodes
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(TypeTree::len).sum::<usize>()
    }

    /// Always false; a tree has at least its root
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Direct child by field name
    pub fn child(&self, name: &str) -> Option<&TypeTree> {
        self.children.iter().find(|c| c.node.name == name)
    }
}
