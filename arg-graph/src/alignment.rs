//! Materialize the biallelic alignment implied by a graph plus mutations.

use crate::mutation::Mutation;
use crate::node::Event;
use crate::{Arg, ArgError};
use arg_common::{NodeName, Position};
use std::collections::BTreeMap;
use std::io;

/// Per-leaf sequences, keyed by leaf name in ascending order.
pub type Alignment = BTreeMap<NodeName, String>;

/// Leaves beneath `name` in the marginal tree at `pos`.
fn marginal_leaves_below(
    arg: &Arg,
    name: NodeName,
    pos: Position,
) -> Result<Vec<NodeName>, ArgError> {
    let mut leaves = vec![];
    for item in arg.preorder_marginal_tree(pos, Some(name))? {
        let node = item?;
        if node.event == Event::Sample {
            leaves.push(node.name);
        }
    }
    Ok(leaves)
}

/// Build per-leaf biallelic sequences.
///
/// The site count is `end - start` truncated to an integer.  Mutations are
/// applied in position order; the leaves beneath a mutation's child node in
/// the marginal tree at its position carry `derived` at that site, everyone
/// else `ancestral`.  A later mutation at the same site overwrites the
/// column.
pub fn make_alignment(
    arg: &Arg,
    mutations: &[Mutation],
    ancestral: char,
    derived: char,
) -> Result<Alignment, ArgError> {
    let nsites = (arg.end - arg.start) as usize;
    let leaf_names = arg.leaf_names(None)?;
    let mut columns: BTreeMap<NodeName, Vec<char>> = leaf_names
        .iter()
        .map(|name| (*name, vec![ancestral; nsites]))
        .collect();

    let mut ordered: Vec<&Mutation> = mutations.iter().collect();
    ordered.sort_by(|a, b| a.pos.total_cmp(&b.pos));

    for mutation in ordered {
        let site = (mutation.pos - arg.start) as usize;
        if site >= nsites {
            // fractional tail beyond the last whole site
            continue;
        }
        let below = marginal_leaves_below(arg, mutation.child, mutation.pos)?;
        for (name, column) in columns.iter_mut() {
            column[site] = if below.contains(name) {
                derived
            } else {
                ancestral
            };
        }
    }

    Ok(columns
        .into_iter()
        .map(|(name, column)| (name, column.into_iter().collect()))
        .collect())
}

/// [`make_alignment`] with the conventional `'A'`/`'C'` characters.
pub fn make_alignment_default(arg: &Arg, mutations: &[Mutation]) -> Result<Alignment, ArgError> {
    make_alignment(arg, mutations, 'A', 'C')
}

/// Stream `name <tab> sequence` lines; formatting beyond that is up to the
/// caller.
pub fn write_sequences<W: io::Write>(writer: &mut W, alignment: &Alignment) -> io::Result<()> {
    for (name, sequence) in alignment {
        writeln!(writer, "{}\t{}", name, sequence)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    /// Two samples over [0, 10) joined by one coalescence.
    fn two_leaf_arg() -> Arg {
        let mut arg = Arg::new(0.0, 10.0).unwrap();
        for name in [0, 1] {
            arg.add(Node::new_sample_mapping_whole_interval(name, 0.0, 10.0))
                .unwrap();
        }
        let c = arg.new_node(1.0, Event::Coal);
        arg.link(c, 0).unwrap();
        arg.link(c, 1).unwrap();
        arg.root = Some(c);
        arg.set_ancestral().unwrap();
        arg
    }

    #[test]
    fn mutation_column_matches_subtree() {
        let arg = two_leaf_arg();
        let mutations = vec![
            Mutation::new(0, 2, 2.3, 0.5),
            Mutation::new(1, 2, 7.9, 0.25),
        ];
        let alignment = make_alignment_default(&arg, &mutations).unwrap();
        assert_eq!(alignment[&0], "AACAAAAAAA");
        assert_eq!(alignment[&1], "AAAAAAACAA");
    }

    #[test]
    fn test_no_mutations_all_ancestral() {
        let arg = two_leaf_arg();
        let alignment = make_alignment(&arg, &[], '0', '1').unwrap();
        assert_eq!(alignment[&0], "0000000000");
        assert_eq!(alignment[&1], "0000000000");
    }

    #[test]
    fn test_mutation_above_root_block_hits_all_leaves() {
        let arg = two_leaf_arg();
        // a mutation whose child is the root marks every leaf derived
        let mutations = vec![Mutation::new(2, 2, 0.5, 1.0)];
        let alignment = make_alignment_default(&arg, &mutations).unwrap();
        assert_eq!(alignment[&0], "CAAAAAAAAA");
        assert_eq!(alignment[&1], "CAAAAAAAAA");
    }

    #[test]
    fn test_same_site_overwrites() {
        let arg = two_leaf_arg();
        let mutations = vec![
            Mutation::new(0, 2, 4.2, 0.5),
            Mutation::new(1, 2, 4.7, 0.5),
        ];
        let alignment = make_alignment_default(&arg, &mutations).unwrap();
        // the later mutation at site 4 wins
        assert_eq!(alignment[&0], "AAAAAAAAAA");
        assert_eq!(alignment[&1], "AAAACAAAAA");
    }

    #[test]
    fn test_write_sequences() {
        let arg = two_leaf_arg();
        let alignment = make_alignment(&arg, &[], 'A', 'C').unwrap();
        let mut out = vec![];
        write_sequences(&mut out, &alignment).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "0\tAAAAAAAAAA\n1\tAAAAAAAAAA\n");
    }
}
