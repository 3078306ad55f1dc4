//! Monte-Carlo rollout scoring.
//!
//! A partial network is scored by completing it with random comparators a
//! number of times and looking at how long and how deep the completions
//! come out. The aggregate is a truncated elite mean: samples are ranked by
//! the objective the depth weight favors and only the best few are
//! averaged, which damps the variance of occasional long rollouts. During
//! successive halving the sample set of a surviving candidate keeps
//! growing, and the elite count grows proportionally so that the truncation
//! ratio stays fixed.

use rand::Rng;

use crate::state::State;
use crate::SearchCtx;

/// Outcome of one random completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sample {
    pub length: u32,
    pub depth: u32,
}

/// Run `num_tests` random completions of `base`, appending one sample per
/// completion to `out`. `scratch` provides the reusable clone the rollouts
/// run on.
pub fn collect_samples(
    base: &State,
    num_tests: usize,
    ctx: &SearchCtx,
    scratch: &mut State,
    rng: &mut impl Rng,
    out: &mut Vec<Sample>,
) {
    let net_size = ctx.config.net_size;
    for _ in 0..num_tests {
        scratch.clone_from(base);
        while !scratch.is_complete() {
            scratch.random_rollout_step(ctx, rng);
        }
        scratch.minimize_depth(net_size);
        out.push(Sample {
            length: scratch.current_level() as u32,
            depth: scratch.compute_depth(net_size) as u32,
        });
    }
}

/// Elite count for an accumulated sample set:
/// max(1, base_elites · total_samples / base_tests), never more than the
/// samples available.
pub fn scaled_elites(base_elites: usize, base_tests: usize, total_samples: usize) -> usize {
    ((base_elites * total_samples) / base_tests)
        .max(1)
        .min(total_samples)
}

/// Truncated elite mean of `samples`; lower is better. Sorting favors
/// length below a depth weight of 0.5 and depth at or above it.
pub fn aggregate(samples: &mut [Sample], num_elites: usize, depth_weight: f64) -> f64 {
    debug_assert!(!samples.is_empty());
    if depth_weight < 0.5 {
        samples.sort_unstable_by_key(|s| (s.length, s.depth));
    } else {
        samples.sort_unstable_by_key(|s| (s.depth, s.length));
    }

    let take = num_elites.min(samples.len());
    let mut length_sum = 0u64;
    let mut depth_sum = 0u64;
    for s in &samples[..take] {
        length_sum += s.length as u64;
        depth_sum += s.depth as u64;
    }
    let mean_length = length_sum as f64 / take as f64;
    let mean_depth = depth_sum as f64 / take as f64;

    (1.0 - depth_weight) * mean_length + depth_weight * mean_depth
}
