//! Ancestral-material propagation.
//!
//! Each recombination position partitions `[start, end)` into blocks; within
//! a block the genealogy is a single tree.  [`BlockCounts`] tracks, per
//! block, how many live lineages still carry material for it.  When a
//! block's count reaches 1 its MRCA has been found and the material stops
//! propagating rootward.

use crate::node::Event;
use crate::region_overlapper::RegionOverlapper;
use crate::segment::{normalize_regions, split_regions, Segment, Side};
use crate::{Arg, ArgError};
use arg_common::{NodeName, Position};

/// Live-lineage counters keyed by block start.
///
/// Block starts are kept sorted.  Inserting a position that is already a
/// block start keeps the duplicate as a zero-width block; clipping skips it.
#[derive(Clone, Debug)]
pub struct BlockCounts {
    starts: Vec<Position>,
    counts: Vec<usize>,
    end: Position,
}

impl BlockCounts {
    pub fn new(start: Position, end: Position, k: usize) -> Self {
        Self {
            starts: vec![start],
            counts: vec![k],
            end,
        }
    }

    pub fn with_breakpoints(start: Position, end: Position, breakpoints: &[Position], k: usize) -> Self {
        let mut starts = vec![start];
        starts.extend(breakpoints.iter().copied().filter(|p| start < *p && *p < end));
        starts.sort_by(|a, b| a.total_cmp(b));
        let counts = vec![k; starts.len()];
        Self { starts, counts, end }
    }

    /// Split the block containing `pos`; the new block inherits the live
    /// count of the block it was cut from.
    pub fn insert(&mut self, pos: Position) {
        let at = self.starts.partition_point(|s| *s <= pos);
        debug_assert!(at > 0);
        let seed = self.counts[at - 1];
        self.starts.insert(at, pos);
        self.counts.insert(at, seed);
    }

    pub fn num_blocks(&self) -> usize {
        self.starts.len()
    }

    pub fn count(&self, idx: usize) -> usize {
        self.counts[idx]
    }

    pub fn decrement(&mut self, idx: usize) {
        // saturating: replaying a graph whose breakpoints were reassigned
        // can merge more carrier pairs than a consistent history would
        self.counts[idx] = self.counts[idx].saturating_sub(1);
    }

    fn block_end(&self, idx: usize) -> Position {
        if idx + 1 < self.starts.len() {
            self.starts[idx + 1]
        } else {
            self.end
        }
    }

    /// Blocks overlapping `[a, b)`, clipped to it; zero-width blocks from
    /// duplicate insertions are skipped.
    pub fn clip(&self, a: Position, b: Position) -> Vec<(usize, Position, Position)> {
        let mut out = vec![];
        let mut idx = self.starts.partition_point(|s| *s <= a).saturating_sub(1);
        while idx < self.starts.len() {
            let bs = self.starts[idx];
            if bs >= b {
                break;
            }
            let be = self.block_end(idx);
            let left = if a > bs { a } else { bs };
            let right = if b < be { b } else { be };
            if left < right {
                out.push((idx, left, right));
            }
            idx += 1;
        }
        out
    }
}

/// Merge the material of two coalescing lineages.
///
/// Returns `(ancestral, onward)`: the regions recorded at the coalescence
/// node, and the regions the merged lineage keeps carrying.  A piece where
/// both lineages overlap decrements its block's live count; once a block's
/// count reaches 1 its material is ancestral at this node (the MRCA) but
/// goes no further.  Single-lineage pieces in a finished block are dropped
/// entirely.
pub fn coalesce_regions(
    r0: &[Segment],
    r1: &[Segment],
    blocks: &mut BlockCounts,
) -> (Vec<Segment>, Vec<Segment>) {
    let mut ancestral = vec![];
    let mut onward = vec![];
    for (a, b, count) in RegionOverlapper::new(&[r0, r1]) {
        for (idx, left, right) in blocks.clip(a, b) {
            if count == 2 {
                blocks.decrement(idx);
                ancestral.push(Segment::new(left, right));
                if blocks.count(idx) > 1 {
                    onward.push(Segment::new(left, right));
                }
            } else if blocks.count(idx) > 1 {
                ancestral.push(Segment::new(left, right));
                onward.push(Segment::new(left, right));
            }
        }
    }
    normalize_regions(&mut ancestral);
    normalize_regions(&mut onward);
    (ancestral, onward)
}

/// Drop the sub-pieces of `regions` whose block already found its MRCA.
fn filter_finished_blocks(regions: &[Segment], blocks: &BlockCounts) -> Vec<Segment> {
    let mut out = vec![];
    for seg in regions {
        for (idx, left, right) in blocks.clip(seg.left, seg.right) {
            if blocks.count(idx) > 1 {
                out.push(Segment::new(left, right));
            }
        }
    }
    normalize_regions(&mut out);
    out
}

impl Arg {
    /// Ancestral regions on the edge from `name` toward one of its parents,
    /// chosen by side.  Sample and coalescence nodes carry the same regions
    /// on every outgoing edge; a recombination node carries the half of its
    /// regions matching the side.
    pub fn get_ancestral(
        &self,
        name: NodeName,
        side: Option<Side>,
    ) -> Result<Vec<Segment>, ArgError> {
        let node = self.node(name)?;
        match node.event {
            Event::Sample | Event::Coal => Ok(node.regions.clone()),
            Event::Recomb => {
                let pos = node.pos.ok_or(ArgError::RecombPositionNotSet { name })?;
                let side = side.ok_or(ArgError::MissingSide { name })?;
                Ok(split_regions(pos, side, &node.regions))
            }
        }
    }

    /// Like [`Arg::get_ancestral`], with the side derived from the identity
    /// of the receiving parent.  When both parent slots point at the same
    /// node (its two lineages coalesced with each other) the side is
    /// ambiguous and the full regions are returned.
    pub fn get_ancestral_toward(
        &self,
        name: NodeName,
        parent: NodeName,
    ) -> Result<Vec<Segment>, ArgError> {
        let node = self.node(name)?;
        match node.event {
            Event::Sample | Event::Coal => Ok(node.regions.clone()),
            Event::Recomb => {
                let pos = node.pos.ok_or(ArgError::RecombPositionNotSet { name })?;
                let first = node
                    .parents
                    .iter()
                    .position(|p| *p == parent)
                    .ok_or(ArgError::NotAParent { name, parent })?;
                let last = node.parents.iter().rposition(|p| *p == parent);
                if last != Some(first) {
                    return Ok(node.regions.clone());
                }
                let side = if first == 0 { Side::Left } else { Side::Right };
                Ok(split_regions(pos, side, &node.regions))
            }
        }
    }

    /// Rebuild every node's ancestral region set from the leaves up.
    ///
    /// Replays the coalescent history in ascending age order with fresh
    /// per-block counters, so it reproduces exactly the regions the
    /// simulator records inline.  Every recombination node must have its
    /// position set.
    pub fn set_ancestral(&mut self) -> Result<(), ArgError> {
        let mut breakpoints = vec![];
        for node in self.nodes() {
            if node.event == Event::Recomb {
                match node.pos {
                    Some(p) => breakpoints.push(p),
                    None => return Err(ArgError::RecombPositionNotSet { name: node.name }),
                }
            }
        }
        breakpoints.sort_by(|a, b| a.total_cmp(b));
        let k = self.leaf_names(None)?.len();
        let mut blocks = BlockCounts::with_breakpoints(self.start, self.end, &breakpoints, k);

        for name in self.names_by_age() {
            let (event, children) = {
                let node = self.node(name)?;
                (node.event, node.children.clone())
            };
            let regions = match event {
                Event::Sample => vec![Segment::new(self.start, self.end)],
                Event::Coal => {
                    if children.len() != 2 {
                        return Err(ArgError::InvalidChildCount {
                            name,
                            expected: 2,
                            found: children.len(),
                        });
                    }
                    if children[0] == children[1] {
                        // the two lineages of one recombination merging
                        // back; one side contributes everything, the other
                        // nothing, and no block count changes
                        let full = self.get_ancestral_toward(children[0], name)?;
                        filter_finished_blocks(&full, &blocks)
                    } else {
                        let r0 = self.get_ancestral_toward(children[0], name)?;
                        let r1 = self.get_ancestral_toward(children[1], name)?;
                        coalesce_regions(&r0, &r1, &mut blocks).0
                    }
                }
                Event::Recomb => {
                    if children.len() != 1 {
                        return Err(ArgError::InvalidChildCount {
                            name,
                            expected: 1,
                            found: children.len(),
                        });
                    }
                    let r = self.get_ancestral_toward(children[0], name)?;
                    filter_finished_blocks(&r, &blocks)
                }
            };
            self.node_mut(name)?.regions = regions;
        }
        Ok(())
    }
}


#[cfg(test)]
mod set_ancestral_tests {
    use super::*;
    use crate::node::Node;

    /// Two samples, one recombination on sample 1 at 0.4.
    ///
    ///        4
    ///       / \
    ///      3   \
    ///     / \   |
    ///    |   2--+   (recomb, pos 0.4; left parent 3, right parent 4)
    ///    0   1
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
        // recombination parents are ordered [left, right]
        arg.get_mut(r).unwrap().parents = vec![c3, c4];
        arg.root = Some(c4);
        arg
    }

    #[test]
    fn test_set_ancestral_one_recomb() {
        let mut arg = one_recomb_arg();
        arg.set_ancestral().unwrap();
        assert_eq!(arg.node(0).unwrap().regions, vec![Segment::new(0.0, 1.0)]);
        assert_eq!(arg.node(1).unwrap().regions, vec![Segment::new(0.0, 1.0)]);
        assert_eq!(arg.node(2).unwrap().regions, vec![Segment::new(0.0, 1.0)]);
        // node 3 is the MRCA of [0, 0.4) and still carries [0.4, 1) onward
        assert_eq!(arg.node(3).unwrap().regions, vec![Segment::new(0.0, 1.0)]);
        // node 4 only ever sees the unfinished block
        assert_eq!(arg.node(4).unwrap().regions, vec![Segment::new(0.4, 1.0)]);
    }

    #[test]
    fn test_get_ancestral_sides() {
        let mut arg = one_recomb_arg();
        arg.set_ancestral().unwrap();
        assert_eq!(
            arg.get_ancestral(2, Some(Side::Left)).unwrap(),
            vec![Segment::new(0.0, 0.4)]
        );
        assert_eq!(
            arg.get_ancestral(2, Some(Side::Right)).unwrap(),
            vec![Segment::new(0.4, 1.0)]
        );
        assert_eq!(
            arg.get_ancestral(2, None).err(),
            Some(ArgError::MissingSide { name: 2 })
        );
        assert_eq!(
            arg.get_ancestral_toward(2, 3).unwrap(),
            vec![Segment::new(0.0, 0.4)]
        );
        assert_eq!(
            arg.get_ancestral_toward(2, 4).unwrap(),
            vec![Segment::new(0.4, 1.0)]
        );
        assert_eq!(
            arg.get_ancestral_toward(2, 0).err(),
            Some(ArgError::NotAParent { name: 2, parent: 0 })
        );
    }

    #[test]
    fn test_position_must_be_set() {
        let mut arg = one_recomb_arg();
        arg.get_mut(2).unwrap().pos = None;
        assert_eq!(
            arg.set_ancestral().err(),
            Some(ArgError::RecombPositionNotSet { name: 2 })
        );
    }

    #[test]
    fn self_coalescence_regions() {
        // a recombination whose two lineages merge right back together
        let mut arg = Arg::new(0.0, 1.0).unwrap();
        for name in [0, 1] {
            arg.add(Node::new_sample_mapping_whole_interval(name, 0.0, 1.0))
                .unwrap();
        }
        let r = arg.new_node(0.2, Event::Recomb);
        arg.get_mut(r).unwrap().pos = Some(0.5);
        let c = arg.new_node(0.4, Event::Coal);
        let top = arg.new_node(0.8, Event::Coal);
        arg.link(r, 1).unwrap();
        arg.link(c, r).unwrap();
        arg.link(c, r).unwrap();
        arg.link(top, 0).unwrap();
        arg.link(top, c).unwrap();
        arg.root = Some(top);

        let cnode = arg.node(c).unwrap();
        assert_eq!(cnode.children[0], r);
        assert_eq!(cnode.children[1], r);

        arg.set_ancestral().unwrap();
        assert_eq!(arg.node(r).unwrap().regions, arg.node(1).unwrap().regions);
        assert_eq!(arg.node(c).unwrap().regions, arg.node(r).unwrap().regions);
        assert_eq!(arg.node(top).unwrap().regions, vec![Segment::new(0.0, 1.0)]);
        // the ambiguous-parent query answers with the full regions
        assert_eq!(
            arg.get_ancestral_toward(r, c).unwrap(),
            vec![Segment::new(0.0, 1.0)]
        );
    }
}
