//! Canonicalize a graph by removing everything that carries no ancestral
//! material.

use crate::node::Event;
use crate::segment::{split_regions, Side};
use crate::{Arg, ArgError};
use arg_common::NodeName;
use bitflags::bitflags;

bitflags! {
    /// Options for [`Arg::prune`].
    pub struct PruneOptions: u32 {
        /// Contract internal nodes left with exactly one parent and one
        /// child, rewiring parent and child directly.
        const REMOVE_SINGLE = 1 << 0;
    }
}

impl Default for PruneOptions {
    fn default() -> Self {
        PruneOptions::REMOVE_SINGLE
    }
}

impl Arg {
    /// Remove empty-material edges and nodes, optionally contract
    /// pass-through nodes, and re-elect the root.
    ///
    /// Idempotent: pruning a pruned graph changes nothing.
    pub fn prune(&mut self, options: PruneOptions) -> Result<(), ArgError> {
        // 1. edges carrying no ancestral material
        let mut dead_edges: Vec<(NodeName, usize)> = vec![];
        for name in self.sorted_names() {
            let node = self.node(name)?;
            for at in 0..node.parents.len() {
                let empty = match node.event {
                    Event::Recomb => {
                        let pos = node.pos.ok_or(ArgError::RecombPositionNotSet { name })?;
                        let side = if at == 0 { Side::Left } else { Side::Right };
                        split_regions(pos, side, &node.regions).is_empty()
                    }
                    _ => node.regions.is_empty(),
                };
                if empty {
                    dead_edges.push((name, at));
                }
            }
        }
        // reverse order keeps later indices on the same node valid
        for (name, at) in dead_edges.iter().rev() {
            let parent = self.node(*name)?.parents[*at];
            self.node_mut(*name)?.parents.remove(*at);
            let pnode = self.node_mut(parent)?;
            if let Some(j) = pnode.children.iter().position(|c| c == name) {
                pnode.children.remove(j);
            }
        }

        // 2. nodes carrying no ancestral material
        for name in self.sorted_names() {
            if self.node(name)?.regions.is_empty() {
                self.remove(name)?;
            }
        }

        // 3. pruning must never turn an internal node into a leaf
        for name in self.leaf_names(None)? {
            let node = self.node(name)?;
            if node.age != 0.0 {
                return Err(ArgError::InvalidLeafAge {
                    name,
                    age: node.age,
                });
            }
        }

        // 4. contract pass-through nodes
        if options.contains(PruneOptions::REMOVE_SINGLE) {
            for name in self.sorted_names() {
                let (parent, child) = match self.get(name) {
                    Some(node) if node.parents.len() == 1 && node.children.len() == 1 => {
                        (node.parents[0], node.children[0])
                    }
                    _ => continue,
                };
                for p in self.node_mut(child)?.parents.iter_mut() {
                    if *p == name {
                        *p = parent;
                    }
                }
                for c in self.node_mut(parent)?.children.iter_mut() {
                    if *c == name {
                        *c = child;
                    }
                }
                self.take(name);
            }
        }

        // 5. re-elect the root: from the first parentless node, walk down
        // through single-child tops until a branching node
        let parentless: Vec<NodeName> = self
            .sorted_names()
            .into_iter()
            .filter(|n| self.get(*n).map_or(false, |node| node.parents.is_empty()))
            .collect();
        let mut root = match parentless.first() {
            Some(r) => *r,
            None => {
                self.root = None;
                return Ok(());
            }
        };
        loop {
            let node = self.node(root)?;
            if node.children.len() == 1 {
                let child = node.children[0];
                self.remove(root)?;
                root = child;
            } else {
                break;
            }
        }
        self.root = Some(root);
        Ok(())
    }
}
