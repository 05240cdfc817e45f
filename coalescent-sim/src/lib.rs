//! Forward simulation of the coalescent with recombination.
//!
//! Produces fully linked [`Arg`]s with ancestral regions populated inline.
//! Every entry point takes the random source by argument so a fixed seed
//! reproduces a run bit for bit.

use arg_common::{NodeName, Position, Time};
use arg_graph::ancestral::{coalesce_regions, BlockCounts};
use arg_graph::segment::{regions_length, split_regions, Segment, Side};
use arg_graph::{Arg, ArgError, Event, Node};
use rand::Rng;
use rand_distr::{Distribution, Exp};
use std::collections::HashMap;
use thiserror::Error;

pub mod mutation;

pub use mutation::sample_mutations;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("at least one sample is required, got {k}")]
    TooFewSamples { k: usize },
    #[error("population size must be positive, got {n}")]
    InvalidPopulationSize { n: f64 },
    #[error("rate must be non-negative, got {rate}")]
    InvalidRate { rate: f64 },
    #[error("expected {expected} event times, got {found}")]
    WrongNumberOfTimes { expected: usize, found: usize },
    #[error("{0}")]
    Graph(#[from] ArgError),
}

/// A live line of descent and the material it still carries.
struct Lineage {
    node: NodeName,
    /// Which half of a recombination this lineage is, when its node is one.
    side: Option<Side>,
    regions: Vec<Segment>,
    seqlen: f64,
}

impl Lineage {
    fn new(node: NodeName, side: Option<Side>, regions: Vec<Segment>) -> Self {
        let seqlen = regions_length(&regions);
        Self {
            node,
            side,
            regions,
            seqlen,
        }
    }
}

/// When a lineage gains its parent, remember which recombination side the
/// parent serves so the parent pair can be ordered after the run.
fn record_side(
    table: &mut HashMap<NodeName, [Option<NodeName>; 2]>,
    lineage: &Lineage,
    parent: NodeName,
) {
    if let Some(side) = lineage.side {
        let slot = table.entry(lineage.node).or_insert([None, None]);
        let at = match side {
            Side::Left => 0,
            Side::Right => 1,
        };
        slot[at] = Some(parent);
    }
}

/// Simulate an ancestral recombination graph for `k` samples over
/// `[start, end)` under haploid population size `n` and recombination rate
/// `rho` per unit length per generation, starting the event clock at `t`.
pub fn sample_arg<R: Rng>(
    k: usize,
    n: f64,
    rho: f64,
    start: Position,
    end: Position,
    t: Time,
    rng: &mut R,
) -> Result<Arg, SimError> {
    if k < 1 {
        return Err(SimError::TooFewSamples { k });
    }
    if n <= 0.0 {
        return Err(SimError::InvalidPopulationSize { n });
    }
    if rho < 0.0 {
        return Err(SimError::InvalidRate { rate: rho });
    }
    let mut arg = Arg::new(start, end)?;
    let mut lineages: Vec<Lineage> = (0..k)
        .map(|i| {
            let name = i as NodeName;
            Lineage::new(name, None, vec![Segment::new(start, end)])
        })
        .collect();
    for lineage in &lineages {
        arg.add(Node::new_sample_mapping_whole_interval(
            lineage.node,
            start,
            end,
        ))?;
    }
    let mut blocks = BlockCounts::new(start, end, k);
    let mut recomb_parents: HashMap<NodeName, [Option<NodeName>; 2]> = HashMap::new();
    let mut t = t;
    let mut last = (k - 1) as NodeName;

    while lineages.len() > 1 {
        let live = lineages.len() as f64;
        let coal_rate = live * (live - 1.0) / 2.0 / n;
        let total_seqlen: f64 = lineages.iter().map(|l| l.seqlen).sum();
        let recomb_rate = rho * total_seqlen;
        let total_rate = coal_rate + recomb_rate;
        let waiting = Exp::new(total_rate).map_err(|_| SimError::InvalidRate { rate: total_rate })?;
        t += waiting.sample(rng);

        if rng.gen::<f64>() < recomb_rate / total_rate {
            // recombination: pick a lineage weighted by carried length,
            // then a breakpoint uniform within its material
            let mut draw = rng.gen::<f64>() * total_seqlen;
            let mut at = lineages.len() - 1;
            for (i, lineage) in lineages.iter().enumerate() {
                if draw < lineage.seqlen {
                    at = i;
                    break;
                }
                draw -= lineage.seqlen;
            }
            let lineage = lineages.swap_remove(at);
            let mut draw = rng.gen::<f64>() * lineage.seqlen;
            let mut segment = lineage.regions[lineage.regions.len() - 1];
            for seg in &lineage.regions {
                if draw < seg.length() {
                    segment = *seg;
                    break;
                }
                draw -= seg.length();
            }
            let pos = rng.gen_range(segment.left..segment.right);

            let name = arg.new_node(t, Event::Recomb);
            last = name;
            arg.node_mut(name)?.pos = Some(pos);
            arg.node_mut(name)?.regions = lineage.regions.clone();
            arg.link(name, lineage.node)?;
            record_side(&mut recomb_parents, &lineage, name);
            blocks.insert(pos);

            let left = split_regions(pos, Side::Left, &lineage.regions);
            let right = split_regions(pos, Side::Right, &lineage.regions);
            for (side, regions) in [(Side::Left, left), (Side::Right, right)] {
                if !regions.is_empty() {
                    lineages.push(Lineage::new(name, Some(side), regions));
                }
            }
        } else {
            // coalescence of two distinct lineages, uniformly
            let i = rng.gen_range(0..lineages.len());
            let mut j = rng.gen_range(0..lineages.len() - 1);
            if j >= i {
                j += 1;
            }
            let (lo, hi) = if i < j { (i, j) } else { (j, i) };
            let second = lineages.swap_remove(hi);
            let first = lineages.swap_remove(lo);

            let name = arg.new_node(t, Event::Coal);
            last = name;
            arg.link(name, first.node)?;
            arg.link(name, second.node)?;
            record_side(&mut recomb_parents, &first, name);
            record_side(&mut recomb_parents, &second, name);

            let (ancestral, onward) = coalesce_regions(&first.regions, &second.regions, &mut blocks);
            arg.node_mut(name)?.regions = ancestral;
            if !onward.is_empty() {
                lineages.push(Lineage::new(name, None, onward));
            }
        }
    }

    // order every recombination's parents as [left, right]
    for (name, sides) in recomb_parents {
        let parents: Vec<NodeName> = sides.iter().flatten().copied().collect();
        arg.node_mut(name)?.parents = parents;
    }
    arg.root = Some(last);

    #[cfg(debug_assertions)]
    arg.validate_graph()?;

    Ok(arg)
}

/// Draw only the event times of a plain coalescent: `k - 1` waiting times
/// with rates `m(m-1)/2/n (+ rho)`.  The degenerate companion of
/// [`make_arg_from_times`], used for testing.
pub fn sample_coal_recomb_times<R: Rng>(
    k: usize,
    n: f64,
    rho: f64,
    rng: &mut R,
) -> Result<Vec<Time>, SimError> {
    if k < 1 {
        return Err(SimError::TooFewSamples { k });
    }
    if n <= 0.0 {
        return Err(SimError::InvalidPopulationSize { n });
    }
    if rho < 0.0 {
        return Err(SimError::InvalidRate { rate: rho });
    }
    let mut times = vec![];
    let mut t = 0.0;
    let mut live = k as f64;
    while live > 1.0 {
        let rate = live * (live - 1.0) / 2.0 / n + rho;
        let waiting = Exp::new(rate).map_err(|_| SimError::InvalidRate { rate })?;
        t += waiting.sample(rng);
        times.push(t);
        live -= 1.0;
    }
    Ok(times)
}

/// Wire a recombination-free topology from `k - 1` coalescence times,
/// pairing lineages uniformly at random, and populate its regions.
pub fn make_arg_from_times<R: Rng>(
    k: usize,
    start: Position,
    end: Position,
    times: &[Time],
    rng: &mut R,
) -> Result<Arg, SimError> {
    if k < 1 {
        return Err(SimError::TooFewSamples { k });
    }
    if times.len() + 1 != k {
        return Err(SimError::WrongNumberOfTimes {
            expected: k - 1,
            found: times.len(),
        });
    }
    let mut arg = Arg::new(start, end)?;
    let mut lineages: Vec<NodeName> = vec![];
    for i in 0..k {
        let name = i as NodeName;
        arg.add(Node::new_sample_mapping_whole_interval(name, start, end))?;
        lineages.push(name);
    }
    let mut ordered = times.to_vec();
    ordered.sort_by(|a, b| a.total_cmp(b));
    for t in ordered {
        let i = rng.gen_range(0..lineages.len());
        let mut j = rng.gen_range(0..lineages.len() - 1);
        if j >= i {
            j += 1;
        }
        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        let second = lineages.swap_remove(hi);
        let first = lineages.swap_remove(lo);
        let name = arg.new_node(t, Event::Coal);
        arg.link(name, first)?;
        arg.link(name, second)?;
        lineages.push(name);
    }
    arg.root = lineages.first().copied();
    arg.set_ancestral()?;
    Ok(arg)
}

/// Reassign every recombination position: uniform in `[start, end)`, or the
/// midpoint form `randint(start, end - 1) + 0.5` in discrete mode.  Regions
/// must be recomputed with `set_ancestral` afterwards.
pub fn set_recomb_pos<R: Rng>(
    arg: &mut Arg,
    start: Option<Position>,
    end: Option<Position>,
    discrete: bool,
    rng: &mut R,
) -> Result<(), SimError> {
    let lo = start.unwrap_or(arg.start);
    let hi = end.unwrap_or(arg.end);
    if lo >= hi {
        return Err(SimError::Graph(ArgError::InvalidInterval {
            start: lo,
            end: hi,
        }));
    }
    for name in arg.sorted_names() {
        if arg.node(name)?.event != Event::Recomb {
            continue;
        }
        let pos = if discrete {
            let (ilo, ihi) = (lo as i64, hi as i64);
            if ilo >= ihi {
                return Err(SimError::Graph(ArgError::InvalidInterval {
                    start: lo,
                    end: hi,
                }));
            }
            rng.gen_range(ilo..ihi) as Position + 0.5
        } else {
            rng.gen_range(lo..hi)
        };
        arg.node_mut(name)?.pos = Some(pos);
    }
    Ok(())
}
