use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

const ROOT_NAME: &str = "root";

#[derive(Debug, Error, PartialEq)]
pub enum TreeError {
    #[error("Tree has no nodes")]
    Empty,
    #[error("Tree must have at least one leaf")]
    NoLeaves,
    #[error("Tree has no root (every node has a parent)")]
    NoRoot,
    #[error("Tree has more than one root: nodes {first} and {second}")]
    MultipleRoots { first: usize, second: usize },
    #[error("Node {node} refers to parent {parent}, which does not exist")]
    ParentOutOfRange { node: usize, parent: usize },
    #[error("Node {node} is part of a cycle and cannot be reached from the root")]
    Cycle { node: usize },
    #[error("Node {node} has invalid branch length {length}")]
    InvalidBranchLength { node: usize, length: f64 },
    #[error("Leaf node {node} has no identifier")]
    UnnamedLeaf { node: usize },
    #[error("Leaf identifier '{0}' is used more than once")]
    DuplicateLeafId(String),
}

/// External description of one tree node.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeSpec {
    #[serde(default)]
    pub parent: Option<usize>,
    /// Distance to the parent. Ignored for the root.
    #[serde(default)]
    pub branch_length: f64,
    /// Required for leaves, optional for internal nodes.
    #[serde(default)]
    pub name: Option<String>,
}

impl NodeSpec {
    pub fn root() -> Self {
        Self {
            parent: None,
            branch_length: 0.0,
            name: Some(ROOT_NAME.to_string()),
        }
    }

    pub fn child(parent: usize, branch_length: f64, name: impl Into<String>) -> Self {
        Self {
            parent: Some(parent),
            branch_length,
            name: Some(name.into()),
        }
    }

    pub fn internal(parent: usize, branch_length: f64) -> Self {
        Self {
            parent: Some(parent),
            branch_length,
            name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub parent: Option<usize>,
    pub branch_length: f64,
    pub name: Option<String>,
    pub children: Vec<usize>,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A validated, rooted phylogenetic tree.
///
/// Nodes are addressed by their index in the originating node list. A `Tree`
/// can only be obtained through [`Tree::from_nodes`], [`Tree::binary`] or
/// [`Tree::star`], all of which reject malformed topologies, so samplers never
/// discover a structural problem halfway through a traversal.
///
/// Leaves are kept in depth-first pre-order (children in declaration order);
/// this is the row order of every alignment sampled along the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
    root: usize,
    leaves: Vec<usize>,
}

impl Tree {
    /// Builds a tree from an external node list.
    ///
    /// # Arguments
    ///
    /// * `specs` - One entry per node; parents are referenced by index.
    ///
    /// # Errors
    ///
    /// Returns a [`TreeError`] for a missing or duplicated root, out-of-range
    /// parent references, cycles, negative or non-finite branch lengths,
    /// unnamed leaves and duplicated leaf identifiers.
    pub fn from_nodes(specs: &[NodeSpec]) -> Result<Self, TreeError> {
        if specs.is_empty() {
            return Err(TreeError::Empty);
        }

        let mut nodes: Vec<Node> = specs
            .iter()
            .map(|spec| Node {
                parent: spec.parent,
                branch_length: spec.branch_length,
                name: spec.name.clone(),
                children: Vec::new(),
            })
            .collect();

        let mut root = None;
        for (index, spec) in specs.iter().enumerate() {
            match spec.parent {
                None => match root {
                    None => root = Some(index),
                    Some(first) => {
                        return Err(TreeError::MultipleRoots {
                            first,
                            second: index,
                        });
                    }
                },
                Some(parent) => {
                    if parent >= specs.len() {
                        return Err(TreeError::ParentOutOfRange {
                            node: index,
                            parent,
                        });
                    }
                    let length = spec.branch_length;
                    if !length.is_finite() || length < 0.0 {
                        return Err(TreeError::InvalidBranchLength {
                            node: index,
                            length,
                        });
                    }
                    nodes[parent].children.push(index);
                }
            }
        }
        let root = root.ok_or(TreeError::NoRoot)?;
        nodes[root].branch_length = 0.0;

        if nodes[root].is_leaf() {
            return Err(TreeError::NoLeaves);
        }

        let mut visited = vec![false; nodes.len()];
        let mut leaves = Vec::new();
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            visited[index] = true;
            let node = &nodes[index];
            if node.is_leaf() {
                leaves.push(index);
            }
            stack.extend(node.children.iter().rev());
        }
        if let Some(node) = visited.iter().position(|&seen| !seen) {
            return Err(TreeError::Cycle { node });
        }

        let mut seen_ids = HashSet::with_capacity(leaves.len());
        for &leaf in &leaves {
            let name = nodes[leaf]
                .name
                .as_deref()
                .filter(|name| !name.is_empty())
                .ok_or(TreeError::UnnamedLeaf { node: leaf })?;
            if !seen_ids.insert(name) {
                return Err(TreeError::DuplicateLeafId(name.to_string()));
            }
        }

        Ok(Self {
            nodes,
            root,
            leaves,
        })
    }

    /// Balanced bifurcating tree with `n_leaves` leaves.
    ///
    /// Every root-to-leaf path has the same length `max(1, ceil(log2 n))`:
    /// internal edges have length 1 and a leaf that splits off early carries
    /// the remaining depth on its own edge. Leaf identifiers spell the path of
    /// child indices from the root, e.g. `root|0|1|1`.
    pub fn binary(n_leaves: usize) -> Result<Self, TreeError> {
        if n_leaves == 0 {
            return Err(TreeError::NoLeaves);
        }
        let depth = balanced_depth(n_leaves);
        let mut specs = vec![NodeSpec::root()];
        grow_balanced(&mut specs, 0, ROOT_NAME.to_string(), n_leaves, 0, depth);
        Self::from_nodes(&specs)
    }

    /// Star tree: every leaf hangs off the root with the same branch length as
    /// the root-to-leaf distance of [`Tree::binary`] for the same leaf count.
    pub fn star(n_leaves: usize) -> Result<Self, TreeError> {
        if n_leaves == 0 {
            return Err(TreeError::NoLeaves);
        }
        let length = balanced_depth(n_leaves) as f64;
        let mut specs = Vec::with_capacity(n_leaves + 1);
        specs.push(NodeSpec::root());
        specs.extend((0..n_leaves).map(|i| NodeSpec::child(0, length, format!("{ROOT_NAME}|{i}"))));
        Self::from_nodes(&specs)
    }

    #[inline]
    pub fn root(&self) -> usize {
        self.root
    }

    #[inline]
    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Leaf node indices in output order.
    pub fn leaves(&self) -> &[usize] {
        &self.leaves
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Leaf identifiers in output order.
    pub fn leaf_ids(&self) -> Vec<String> {
        self.leaves
            .iter()
            .map(|&leaf| self.nodes[leaf].name.clone().unwrap_or_default())
            .collect()
    }

    /// Nodes grouped by depth, starting with `[root]`.
    pub fn levels(&self) -> Vec<Vec<usize>> {
        let mut levels = Vec::new();
        let mut frontier = vec![self.root];
        while !frontier.is_empty() {
            let next: Vec<usize> = frontier
                .iter()
                .flat_map(|&index| self.nodes[index].children.iter().copied())
                .collect();
            levels.push(frontier);
            frontier = next;
        }
        levels
    }
}

fn balanced_depth(n_leaves: usize) -> usize {
    let depth = n_leaves.next_power_of_two().trailing_zeros() as usize;
    depth.max(1)
}

fn grow_balanced(
    specs: &mut Vec<NodeSpec>,
    parent: usize,
    parent_name: String,
    n_leaves: usize,
    level: usize,
    depth: usize,
) {
    let halves = [n_leaves.div_ceil(2), n_leaves / 2];
    for (child_index, &size) in halves.iter().enumerate() {
        if size == 0 {
            continue;
        }
        let name = format!("{parent_name}|{child_index}");
        if size == 1 {
            specs.push(NodeSpec::child(parent, (depth - level) as f64, name));
        } else {
            specs.push(NodeSpec::internal(parent, 1.0));
            let index = specs.len() - 1;
            grow_balanced(specs, index, name, size, level + 1, depth);
        }
    }
}
