use crate::{Arg, ArgError};
use arg_common::{NodeName, Time};
use std::collections::BTreeMap;

/// A node of a plain labeled tree.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeNode {
    pub name: NodeName,
    pub parent: Option<NodeName>,
    pub children: Vec<NodeName>,
    pub age: Time,
    /// Branch length to the parent; 0 at the root.
    pub dist: Time,
}

/// A plain labeled tree with branch lengths.
///
/// This is the adapter surface for clients that serialize trees (newick and
/// friends); it carries no graph machinery.  Iteration order is ascending
/// node name.
#[derive(Clone, Debug, PartialEq)]
pub struct Tree {
    pub root: NodeName,
    nodes: BTreeMap<NodeName, TreeNode>,
}

impl Tree {
    /// Reinterpret a tree-shaped graph as a plain tree.
    ///
    /// Fails unless every node has at most one parent and exactly one node
    /// has none.
    pub(crate) fn from_arg(arg: &Arg) -> Result<Self, ArgError> {
        let mut nodes = BTreeMap::new();
        let mut root = None;
        for name in arg.sorted_names() {
            let node = arg.node(name)?;
            let parent = match node.parents.len() {
                0 => None,
                1 => Some(node.parents[0]),
                _ => return Err(ArgError::NotATree),
            };
            let dist = match parent {
                Some(p) => arg.node(p)?.age - node.age,
                None => {
                    if root.is_some() {
                        return Err(ArgError::NotATree);
                    }
                    root = Some(name);
                    0.0
                }
            };
            nodes.insert(
                name,
                TreeNode {
                    name,
                    parent,
                    children: vec![],
                    age: node.age,
                    dist,
                },
            );
        }
        let root = root.ok_or(ArgError::NoRoot)?;
        let names: Vec<NodeName> = nodes.keys().copied().collect();
        for name in names {
            if let Some(parent) = nodes[&name].parent {
                match nodes.get_mut(&parent) {
                    Some(p) => p.children.push(name),
                    None => return Err(ArgError::UnknownName { name: parent }),
                }
            }
        }
        Ok(Self { root, nodes })
    }

    pub fn node(&self, name: NodeName) -> Option<&TreeNode> {
        self.nodes.get(&name)
    }

    pub fn contains(&self, name: NodeName) -> bool {
        self.nodes.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.values()
    }

    pub fn leaf_names(&self) -> Vec<NodeName> {
        self.nodes
            .values()
            .filter(|n| n.children.is_empty())
            .map(|n| n.name)
            .collect()
    }
}
