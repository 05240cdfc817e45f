//! Marginal-tree extraction.
//!
//! At any single position the graph collapses to a tree: each node has one
//! *local parent*, the parent carrying the material for that position.
//! Walking local parents from every leaf up to the position's block MRCA
//! yields the marginal tree.

use crate::arg::NameSet;
use crate::node::{Event, Node};
use crate::segment::regions_contain;
use crate::tree::Tree;
use crate::{Arg, ArgError};
use arg_common::{NodeName, Position, Time};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Heap key ordering nodes by age, ties by name.
#[derive(Clone, Copy, Debug, PartialEq)]
struct AgeKey {
    age: Time,
    name: NodeName,
}

impl Eq for AgeKey {}

impl Ord for AgeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.age
            .total_cmp(&other.age)
            .then(self.name.cmp(&other.name))
    }
}

impl PartialOrd for AgeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn check_pos(arg: &Arg, pos: Position) -> Result<(), ArgError> {
    if arg.start <= pos && pos < arg.end {
        Ok(())
    } else {
        Err(ArgError::PositionOutOfRange {
            pos,
            start: arg.start,
            end: arg.end,
        })
    }
}

/// The parent of `name` carrying the material at `pos`.
///
/// Sample and coalescence nodes have at most one parent; a recombination
/// node dispatches on which side of its breakpoint `pos` falls.
pub fn local_parent(arg: &Arg, name: NodeName, pos: Position) -> Result<Option<NodeName>, ArgError> {
    let node = arg.node(name)?;
    match node.event {
        Event::Sample | Event::Coal => Ok(node.parents.first().copied()),
        Event::Recomb => {
            let rpos = node.pos.ok_or(ArgError::RecombPositionNotSet { name })?;
            if node.parents.len() != 2 {
                return Err(ArgError::InvalidParentCount {
                    name,
                    expected: 2,
                    found: node.parents.len(),
                });
            }
            if pos < rpos {
                Ok(Some(node.parents[0]))
            } else {
                Ok(Some(node.parents[1]))
            }
        }
    }
}

impl Arg {
    /// Walk the marginal tree at `pos` from the leaves up, yielding nodes in
    /// ascending age order.  Iteration ends once the block MRCA has been
    /// yielded; its ancestors do not carry material for `pos`.
    pub fn postorder_marginal_tree(&self, pos: Position) -> Result<MarginalPostorder<'_>, ArgError> {
        check_pos(self, pos)?;
        let mut heap = BinaryHeap::new();
        for name in self.leaf_names(None)? {
            let age = self.node(name)?.age;
            heap.push(Reverse(AgeKey { age, name }));
        }
        Ok(MarginalPostorder {
            arg: self,
            pos,
            heap,
            seen: NameSet::default(),
            done: false,
        })
    }

    /// Walk the marginal tree at `pos` downward from `root` (default: the
    /// designated root), recursing only into children whose local parent at
    /// `pos` is the current node.
    pub fn preorder_marginal_tree(
        &self,
        pos: Position,
        root: Option<NodeName>,
    ) -> Result<MarginalPreorder<'_>, ArgError> {
        check_pos(self, pos)?;
        let root = root.or(self.root).ok_or(ArgError::NoRoot)?;
        if !self.contains(root) {
            return Err(ArgError::UnknownName { name: root });
        }
        Ok(MarginalPreorder {
            arg: self,
            pos,
            stack: vec![root],
            done: false,
        })
    }

    /// Extract the marginal tree at `pos` as a fresh graph.
    ///
    /// Each cloned node keeps its name, age, event and regions; its only
    /// parent is the clone of its local parent.  The clone without a local
    /// parent in the set (the block MRCA) becomes the root.
    pub fn get_marginal_tree(&self, pos: Position) -> Result<Arg, ArgError> {
        check_pos(self, pos)?;
        let mut names = vec![];
        for item in self.postorder_marginal_tree(pos)? {
            names.push(item?.name);
        }
        let mut out = Arg::new(self.start, self.end)?;
        for name in &names {
            let src = self.node(*name)?;
            let mut clone = Node::new(*name, src.age, src.event);
            clone.pos = src.pos;
            clone.regions = src.regions.clone();
            out.add(clone)?;
        }
        for name in &names {
            match local_parent(self, *name, pos)? {
                Some(parent) if out.contains(parent) => out.link(parent, *name)?,
                _ => out.root = Some(*name),
            }
        }
        Ok(out)
    }

    /// The plain labeled tree at `pos`, or of the whole graph when `pos` is
    /// `None` (which requires the graph to already be a tree).
    pub fn get_tree(&self, pos: Option<Position>) -> Result<Tree, ArgError> {
        match pos {
            Some(pos) => Tree::from_arg(&self.get_marginal_tree(pos)?),
            None => Tree::from_arg(self),
        }
    }
}

pub struct MarginalPostorder<'a> {
    arg: &'a Arg,
    pos: Position,
    heap: BinaryHeap<Reverse<AgeKey>>,
    seen: NameSet,
    done: bool,
}

impl<'a> Iterator for MarginalPostorder<'a> {
    type Item = Result<&'a Node, ArgError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        while let Some(Reverse(key)) = self.heap.pop() {
            if !self.seen.insert(key.name) {
                continue;
            }
            let node = match self.arg.node(key.name) {
                Ok(node) => node,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            if !regions_contain(&node.regions, self.pos) {
                // past the block MRCA
                self.done = true;
                return None;
            }
            match local_parent(self.arg, key.name, self.pos) {
                Ok(Some(parent)) => {
                    if !self.seen.contains(&parent) {
                        match self.arg.node(parent) {
                            Ok(p) => self.heap.push(Reverse(AgeKey {
                                age: p.age,
                                name: parent,
                            })),
                            Err(e) => {
                                self.done = true;
                                return Some(Err(e));
                            }
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
            return Some(Ok(node));
        }
        self.done = true;
        None
    }
}

pub struct MarginalPreorder<'a> {
    arg: &'a Arg,
    pos: Position,
    stack: Vec<NodeName>,
    done: bool,
}

impl<'a> Iterator for MarginalPreorder<'a> {
    type Item = Result<&'a Node, ArgError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let name = self.stack.pop()?;
        let node = match self.arg.node(name) {
            Ok(node) => node,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        for child in node.distinct_children().into_iter().rev() {
            match local_parent(self.arg, child, self.pos) {
                Ok(Some(parent)) if parent == name => self.stack.push(child),
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        Some(Ok(node))
    }
}

/// The recombination blocks of `[start, end)`, final block inclusive of
/// `end`.  Breakpoints outside the window are ignored; duplicates collapse.
pub fn iter_recomb_blocks(arg: &Arg, start: Position, end: Position) -> RecombBlocks {
    let mut breaks: Vec<Position> = arg
        .nodes()
        .filter(|n| n.event == Event::Recomb)
        .filter_map(|n| n.pos)
        .filter(|p| start < *p && *p < end)
        .collect();
    breaks.sort_by(|a, b| a.total_cmp(b));
    breaks.dedup();
    let mut bounds = vec![start];
    bounds.extend(breaks);
    bounds.push(end);
    RecombBlocks { bounds, at: 0 }
}

pub struct RecombBlocks {
    bounds: Vec<Position>,
    at: usize,
}

impl Iterator for RecombBlocks {
    type Item = (Position, Position);

    fn next(&mut self) -> Option<Self::Item> {
        if self.at + 1 < self.bounds.len() {
            let block = (self.bounds[self.at], self.bounds[self.at + 1]);
            self.at += 1;
            Some(block)
        } else {
            None
        }
    }
}

/// One marginal tree per recombination block of `[start, end)`, evaluated
/// at the block midpoint.
pub fn iter_marginal_trees(
    arg: &Arg,
    start: Position,
    end: Position,
) -> impl Iterator<Item = Result<Tree, ArgError>> + '_ {
    iter_recomb_blocks(arg, start, end).map(move |(a, b)| arg.get_tree(Some((a + b) / 2.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segment;

    /// Two samples, one recombination at 0.4; see the fixture sketch in the
    /// ancestral tests.
    fn one_recomb_arg() -> Arg {
        let mut arg = Arg::new(0.0, 1.0).unwrap();
        for name in [0, 1] {
            arg.add(Node::new_sample_mapping_whole_interval(name, 0.0, 1.0))
                .unwrap();
        }
        let r = arg.new_node(0.2, Event::Recomb);
        arg.get_mut(r).unwrap().pos = Some(0.4);
        let c3 = arg.new_node(0.5, Event::Coal);
        let c4 = arg.new_node(0.9, Event::Coal);
        arg.link(r, 1).unwrap();
        arg.link(c3, 0).unwrap();
        arg.link(c3, r).unwrap();
        arg.link(c4, c3).unwrap();
        arg.link(c4, r).unwrap();
        arg.root = Some(c4);
        arg.set_ancestral().unwrap();
        arg
    }

    #[test]
    fn test_local_parent_dispatch() {
        let arg = one_recomb_arg();
        assert_eq!(local_parent(&arg, 0, 0.1).unwrap(), Some(3));
        assert_eq!(local_parent(&arg, 2, 0.1).unwrap(), Some(3));
        assert_eq!(local_parent(&arg, 2, 0.4).unwrap(), Some(4));
        assert_eq!(local_parent(&arg, 2, 0.9).unwrap(), Some(4));
        assert_eq!(local_parent(&arg, 4, 0.9).unwrap(), None);
    }

    #[test]
    fn test_postorder_marginal_stops_at_mrca() {
        let arg = one_recomb_arg();
        let names: Vec<NodeName> = arg
            .postorder_marginal_tree(0.2)
            .unwrap()
            .map(|r| r.unwrap().name)
            .collect();
        // node 3 is the MRCA of [0, 0.4); node 4 is never yielded
        assert_eq!(names, vec![0, 1, 2, 3]);
        let names: Vec<NodeName> = arg
            .postorder_marginal_tree(0.7)
            .unwrap()
            .map(|r| r.unwrap().name)
            .collect();
        assert_eq!(names, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_preorder_marginal() {
        let arg = one_recomb_arg();
        let names: Vec<NodeName> = arg
            .preorder_marginal_tree(0.7, None)
            .unwrap()
            .map(|r| r.unwrap().name)
            .collect();
        assert_eq!(names[0], 4);
        assert_eq!(names.len(), 5);
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3, 4]);
        // under the left block, node 3 spans the whole marginal tree
        let names: Vec<NodeName> = arg
            .preorder_marginal_tree(0.2, Some(3))
            .unwrap()
            .map(|r| r.unwrap().name)
            .collect();
        assert_eq!(names[0], 3);
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_get_marginal_tree_is_a_tree() {
        let arg = one_recomb_arg();
        for pos in [0.2, 0.7] {
            let marginal = arg.get_marginal_tree(pos).unwrap();
            let root = marginal.root.unwrap();
            for name in marginal.sorted_names() {
                let node = marginal.node(name).unwrap();
                if name == root {
                    assert!(node.parents.is_empty());
                } else {
                    assert_eq!(node.parents.len(), 1);
                }
            }
        }
        assert_eq!(arg.get_marginal_tree(0.2).unwrap().root, Some(3));
        assert_eq!(arg.get_marginal_tree(0.7).unwrap().root, Some(4));
    }

    #[test]
    fn test_get_tree_branch_lengths() {
        let arg = one_recomb_arg();
        let tree = arg.get_tree(Some(0.2)).unwrap();
        assert_eq!(tree.root, 3);
        assert_eq!(tree.node(0).unwrap().dist, 0.5);
        assert_eq!(tree.node(1).unwrap().dist, 0.2);
        assert_eq!(tree.node(2).unwrap().dist, 0.5 - 0.2);
        assert_eq!(tree.node(3).unwrap().dist, 0.0);
    }

    #[test]
    fn test_get_tree_without_pos_requires_tree() {
        let arg = one_recomb_arg();
        assert_eq!(arg.get_tree(None).err(), Some(ArgError::NotATree));
    }

    #[test]
    fn two_blocks_two_topologies() {
        let arg = one_recomb_arg();
        let blocks: Vec<(Position, Position)> = iter_recomb_blocks(&arg, 0.0, 1.0).collect();
        assert_eq!(blocks, vec![(0.0, 0.4), (0.4, 1.0)]);
        // a window right of the breakpoint sees a single block
        let window: Vec<(Position, Position)> = iter_recomb_blocks(&arg, 0.5, 1.0).collect();
        assert_eq!(window, vec![(0.5, 1.0)]);
        let trees: Vec<Tree> = iter_marginal_trees(&arg, 0.0, 1.0)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(trees.len(), 2);
        assert!(!trees[0].contains(4));
        assert!(trees[1].contains(4));
        assert_eq!(trees[0].root, 3);
        assert_eq!(trees[1].root, 4);
    }

    #[test]
    fn test_position_out_of_range() {
        let arg = one_recomb_arg();
        assert!(matches!(
            arg.get_marginal_tree(1.0),
            Err(ArgError::PositionOutOfRange { .. })
        ));
        assert!(matches!(
            arg.postorder_marginal_tree(-0.5),
            Err(ArgError::PositionOutOfRange { .. })
        ));
    }

    #[test]
    fn test_marginal_regions_copied() {
        let arg = one_recomb_arg();
        let marginal = arg.get_marginal_tree(0.7).unwrap();
        assert_eq!(
            marginal.node(4).unwrap().regions,
            vec![Segment::new(0.4, 1.0)]
        );
    }
}
