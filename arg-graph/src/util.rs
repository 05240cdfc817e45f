//! Whole-graph consistency checks.

use crate::node::Event;
use crate::segment::{regions_are_disjoint, Side};
use crate::{Arg, ArgError};

impl Arg {
    /// Validate the structural invariants of a completed graph: per-event
    /// degrees, strict age growth along every edge, sorted and disjoint
    /// region sets, recombination side containment, and link symmetry.
    pub fn validate_graph(&self) -> Result<(), ArgError> {
        for name in self.sorted_names() {
            let node = self.node(name)?;
            match node.event {
                Event::Sample => {
                    if !node.children.is_empty() {
                        return Err(ArgError::InvalidChildCount {
                            name,
                            expected: 0,
                            found: node.children.len(),
                        });
                    }
                    if node.parents.len() > 1 {
                        return Err(ArgError::InvalidParentCount {
                            name,
                            expected: 1,
                            found: node.parents.len(),
                        });
                    }
                    if node.age != 0.0 {
                        return Err(ArgError::InvalidLeafAge {
                            name,
                            age: node.age,
                        });
                    }
                }
                Event::Coal => {
                    if node.children.len() != 2 {
                        return Err(ArgError::InvalidChildCount {
                            name,
                            expected: 2,
                            found: node.children.len(),
                        });
                    }
                    if node.parents.len() > 1 {
                        return Err(ArgError::InvalidParentCount {
                            name,
                            expected: 1,
                            found: node.parents.len(),
                        });
                    }
                }
                Event::Recomb => {
                    if node.children.len() != 1 {
                        return Err(ArgError::InvalidChildCount {
                            name,
                            expected: 1,
                            found: node.children.len(),
                        });
                    }
                    if node.parents.len() != 2 {
                        return Err(ArgError::InvalidParentCount {
                            name,
                            expected: 2,
                            found: node.parents.len(),
                        });
                    }
                    let pos = node.pos.ok_or(ArgError::RecombPositionNotSet { name })?;
                    if !(self.start < pos && pos < self.end) {
                        return Err(ArgError::PositionOutOfRange {
                            pos,
                            start: self.start,
                            end: self.end,
                        });
                    }
                    let left = self.get_ancestral(name, Some(Side::Left))?;
                    if left.iter().any(|s| s.right > pos) {
                        return Err(ArgError::SideOrderViolation { name });
                    }
                    let right = self.get_ancestral(name, Some(Side::Right))?;
                    if right.iter().any(|s| s.left < pos) {
                        return Err(ArgError::SideOrderViolation { name });
                    }
                }
            }
            if !regions_are_disjoint(&node.regions) {
                return Err(ArgError::InvalidRegions { name });
            }
            for parent in &node.parents {
                let pnode = self.node(*parent)?;
                if pnode.age <= node.age {
                    return Err(ArgError::NonMonotoneAges {
                        parent: *parent,
                        child: name,
                    });
                }
                let down = pnode.children.iter().filter(|c| **c == name).count();
                let up = node.parents.iter().filter(|p| **p == *parent).count();
                if down != up {
                    return Err(ArgError::AsymmetricLink {
                        parent: *parent,
                        child: name,
                    });
                }
            }
        }
        Ok(())
    }
}
