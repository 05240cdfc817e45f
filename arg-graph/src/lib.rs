//! Ancestral recombination graph core.
//!
//! An [`Arg`] is a labeled DAG of sampling, coalescence and recombination
//! events over a continuous genomic interval.  Each edge carries the set of
//! half-open intervals that are ancestral to at least one sample; different
//! positions along the interval therefore see different marginal trees.
//!
//! This crate holds the deterministic machinery: interval algebra, the node
//! arena, ancestral-region propagation, marginal-tree extraction, alignment
//! materialization and pruning.  Everything driven by randomness (the
//! simulator and the mutation sampler) lives in the `coalescent-sim` crate.

use arg_common::{NodeName, Position, Time};
use thiserror::Error;

pub mod alignment;
pub mod ancestral;
pub mod arg;
pub mod marginal;
pub mod mutation;
pub mod node;
pub mod prune;
pub mod region_overlapper;
pub mod segment;
pub mod tree;
pub mod util;

pub use alignment::{make_alignment, make_alignment_default, write_sequences, Alignment};
pub use ancestral::{coalesce_regions, BlockCounts};
pub use arg::Arg;
pub use marginal::{iter_marginal_trees, iter_recomb_blocks, local_parent};
pub use mutation::Mutation;
pub use node::{Event, Node};
pub use prune::PruneOptions;
pub use region_overlapper::count_region_overlaps;
pub use segment::{split_regions, Segment, Side};
pub use tree::{Tree, TreeNode};

#[derive(Error, Debug, PartialEq)]
pub enum ArgError {
    #[error("invalid genomic interval [{start}, {end})")]
    InvalidInterval { start: Position, end: Position },
    #[error("duplicate node name {name}")]
    DuplicateName { name: NodeName },
    #[error("unknown node name {name}")]
    UnknownName { name: NodeName },
    #[error("recombination position not set for node {name}")]
    RecombPositionNotSet { name: NodeName },
    #[error("position {pos} outside of [{start}, {end})")]
    PositionOutOfRange {
        pos: Position,
        start: Position,
        end: Position,
    },
    #[error("edge side of recombination node {name} is unknown; supply a side or a parent")]
    MissingSide { name: NodeName },
    #[error("{parent} is not a parent of node {name}")]
    NotAParent { name: NodeName, parent: NodeName },
    #[error("node {name} has {found} children but its event requires {expected}")]
    InvalidChildCount {
        name: NodeName,
        expected: usize,
        found: usize,
    },
    #[error("node {name} has {found} parents but its event requires {expected}")]
    InvalidParentCount {
        name: NodeName,
        expected: usize,
        found: usize,
    },
    #[error("edge {parent} -> {child} does not have parent age above child age")]
    NonMonotoneAges { parent: NodeName, child: NodeName },
    #[error("links between {parent} and {child} do not agree in both directions")]
    AsymmetricLink { parent: NodeName, child: NodeName },
    #[error("leaf {name} has nonzero age {age}")]
    InvalidLeafAge { name: NodeName, age: Time },
    #[error("node {name} carries an unsorted or overlapping region set")]
    InvalidRegions { name: NodeName },
    #[error("recombination node {name} carries material on the wrong side of its position")]
    SideOrderViolation { name: NodeName },
    #[error("the graph is not a tree")]
    NotATree,
    #[error("the graph has no root")]
    NoRoot,
}
