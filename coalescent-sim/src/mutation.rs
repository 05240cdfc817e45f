//! Poisson mutation sampling along every edge.

use crate::SimError;
use arg_graph::segment::split_regions;
use arg_graph::{Arg, ArgError, Event, Mutation, Side};
use rand::Rng;
use rand_distr::{Distribution, Exp};

/// Sample mutations under rate `u` per unit length per generation.
///
/// For each edge and each ancestral region on it, inter-arrival times are
/// drawn from `Exp(u * region_length / interval_length)` walking down from
/// the parent's age to the child's; positions are uniform within the
/// region.  `u == 0` yields no mutations.
pub fn sample_mutations<R: Rng>(arg: &Arg, u: f64, rng: &mut R) -> Result<Vec<Mutation>, SimError> {
    if u < 0.0 {
        return Err(SimError::InvalidRate { rate: u });
    }
    let mut mutations = vec![];
    if u == 0.0 {
        return Ok(mutations);
    }
    let interval = arg.end - arg.start;
    for name in arg.sorted_names() {
        let node = arg.node(name)?;
        for (at, parent) in node.parents.iter().enumerate() {
            let regions = match node.event {
                Event::Recomb => {
                    let pos = node
                        .pos
                        .ok_or(ArgError::RecombPositionNotSet { name })?;
                    let side = if at == 0 { Side::Left } else { Side::Right };
                    split_regions(pos, side, &node.regions)
                }
                _ => node.regions.clone(),
            };
            let top = arg.node(*parent)?.age;
            let bottom = node.age;
            for segment in regions {
                let rate = u * segment.length() / interval;
                if rate <= 0.0 {
                    continue;
                }
                let waiting = Exp::new(rate).map_err(|_| SimError::InvalidRate { rate })?;
                let mut time = top;
                loop {
                    time -= waiting.sample(rng);
                    if time < bottom {
                        break;
                    }
                    let pos = rng.gen_range(segment.left..segment.right);
                    mutations.push(Mutation::new(name, *parent, pos, time));
                }
            }
        }
    }
    Ok(mutations)
}
