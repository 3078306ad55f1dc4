//! Beam search over partial networks.
//!
//! Each level expands every beam entry with all of its legal next
//! comparators, merges isomorphic continuations by canonical hash, ranks
//! the survivors by rollout score under a successive-halving budget, and
//! keeps the best K as the next beam. Beam entries store only their
//! comparator sequence; the corresponding state is rebuilt by replay
//! wherever it is needed, which is far cheaper than keeping 2ᴺ-slot states
//! alive per beam slot.
//!
//! Both parallel phases are shared-nothing fork-joins: workers carry their
//! own scratch states, successor matrix, and RNG, and only the per-entry
//! result vectors are merged at the barrier. Phase-1 results are merged in
//! beam order, so candidate traversal (and therefore dedup) is
//! deterministic for a fixed seed; rollout outcomes still depend on which
//! worker scores which candidate, so only single-threaded runs reproduce
//! bit-for-bit.

use std::collections::HashSet;
use std::io::Write;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::error::SearchError;
use crate::normalize::canonical_hash_extended;
use crate::score::{aggregate, collect_samples, scaled_elites, Sample};
use crate::state::{State, SuccMatrix};
use crate::{Operation, SearchCtx};

/// A proposed extension of one beam entry, alive for a single level.
struct Candidate {
    beam_index: usize,
    op: Operation,
    hash: u64,
    samples: Vec<Sample>,
    score: f64,
}

/// Per-worker scratch: two states (replay target and rollout clone), the
/// successor matrix, a sequence buffer for hashing, and a generator seeded
/// from the search seed and the worker's pool index.
struct Scratch {
    state: State,
    rollout: State,
    succ: SuccMatrix,
    ops_buf: Vec<Operation>,
    rng: ChaCha8Rng,
}

impl Scratch {
    fn new(ctx: &SearchCtx, base_seed: u64) -> Self {
        let thread_id = rayon::current_thread_index().unwrap_or(0) as u64;
        Scratch {
            state: State::new(ctx),
            rollout: State::new(ctx),
            succ: SuccMatrix::new(ctx.config.net_size),
            ops_buf: Vec::with_capacity(ctx.config.length_upper_bound),
            rng: ChaCha8Rng::seed_from_u64(base_seed ^ thread_id),
        }
    }
}

struct EntryExpansion {
    complete: bool,
    candidates: Vec<Candidate>,
}

/// Expand one beam entry: replay its sequence, enumerate legal successors,
/// and emit one candidate per successor, or a single mirrored successor
/// when the symmetry shortcut applies.
fn expand_entry(
    scratch: &mut Scratch,
    entry: &[Operation],
    beam_index: usize,
    ctx: &SearchCtx,
) -> EntryExpansion {
    let n = ctx.config.net_size;

    scratch.state.reset(ctx);
    for &op in entry {
        scratch.state.apply(op, ctx);
    }

    if scratch.state.enumerate_legal_successors(&mut scratch.succ) == 0 {
        return EntryExpansion {
            complete: true,
            candidates: Vec::new(),
        };
    }

    let emit = |op: Operation, scratch: &mut Scratch| Candidate {
        beam_index,
        op,
        hash: canonical_hash_extended(entry, op, n, &mut scratch.ops_buf),
        samples: Vec::new(),
        score: 0.0,
    };

    // Symmetry shortcut: optimal even-N networks tend to pair every
    // comparator with its top/bottom mirror, so when the previous
    // comparator sits strictly off the reversal axis and its mirror is
    // legal, that mirror is the only successor this entry emits.
    if ctx.config.use_symmetry {
        if let Some(&last) = entry.last() {
            let (n1, n2) = (last.lo as usize, last.hi as usize);
            let (m1, m2) = (n - 1 - n2, n - 1 - n1);
            let off_axis =
                n1 != n - 1 - n1 && n1 != n - 1 - n2 && n2 != n - 1 - n1 && n2 != n - 1 - n2;
            if off_axis && scratch.succ.is_set(m1, m2) {
                let op = Operation::new(m1 as u8, m2 as u8);
                let only = emit(op, scratch);
                return EntryExpansion {
                    complete: false,
                    candidates: vec![only],
                };
            }
        }
    }

    let mut candidates = Vec::new();
    for lo in 0..n - 1 {
        for hi in lo + 1..n {
            if scratch.succ.is_set(lo, hi) {
                let op = Operation::new(lo as u8, hi as u8);
                let cand = emit(op, scratch);
                candidates.push(cand);
            }
        }
    }
    EntryExpansion {
        complete: false,
        candidates,
    }
}

/// Successive halving: every round buys each surviving candidate another
/// `num_scoring_tests` rollouts (samples accumulate), rescored with the
/// elite count scaled to the accumulated total, then the worse half is
/// dropped. Rounds stop once halving would fall below the beam size; the
/// final survivors are cut to the K best.
fn successive_halving(
    mut cands: Vec<Candidate>,
    beam: &[Vec<Operation>],
    ctx: &SearchCtx,
    base_seed: u64,
) -> Vec<Candidate> {
    let k = ctx.config.max_beam_size;
    let base_tests = ctx.config.num_scoring_tests;
    let base_elites = ctx.config.num_elites;
    let depth_weight = ctx.config.depth_weight;

    while cands.len() > k {
        let accumulated = cands[0].samples.len() + base_tests;
        print!("{{{accumulated}}} ");
        std::io::stdout().flush().ok();

        cands
            .par_iter_mut()
            .for_each_init(
                || Scratch::new(ctx, base_seed),
                |scratch, cand| {
                    scratch.state.reset(ctx);
                    for &op in &beam[cand.beam_index] {
                        scratch.state.apply(op, ctx);
                    }
                    scratch.state.apply(cand.op, ctx);

                    collect_samples(
                        &scratch.state,
                        base_tests,
                        ctx,
                        &mut scratch.rollout,
                        &mut scratch.rng,
                        &mut cand.samples,
                    );
                    let elites = scaled_elites(base_elites, base_tests, cand.samples.len());
                    cand.score = aggregate(&mut cand.samples, elites, depth_weight);
                },
            );

        // Stable sort: candidates tying on score keep traversal order.
        cands.sort_by(|a, b| a.score.total_cmp(&b.score));

        let half = cands.len() / 2;
        if half < k {
            break;
        }
        cands.truncate(half);
    }

    cands.truncate(k);
    cands
}

/// Run one beam search from the empty network to the first completed
/// sorting network, returned as a replayed [`State`].
///
/// Fails only if a level would exceed the configured length upper bound;
/// with the bound at twice the best known length this indicates a
/// pathological configuration, not a normal search outcome.
pub fn beam_search(ctx: &SearchCtx, base_seed: u64) -> Result<State, SearchError> {
    let k = ctx.config.max_beam_size;
    let mut beam: Vec<Vec<Operation>> = vec![Vec::new()];

    for level in 0.. {
        print!("{level}");
        std::io::stdout().flush().ok();

        // Phase 1: expand all beam entries in parallel, merged in beam order.
        let expansions: Vec<EntryExpansion> = beam
            .par_iter()
            .enumerate()
            .map_init(
                || Scratch::new(ctx, base_seed),
                |scratch, (beam_index, entry)| expand_entry(scratch, entry, beam_index, ctx),
            )
            .collect();

        if let Some(done) = expansions.iter().position(|e| e.complete) {
            println!();
            let mut result = State::new(ctx);
            for &op in &beam[done] {
                result.apply(op, ctx);
            }
            debug_assert!(result.is_complete());
            return Ok(result);
        }

        if level + 1 > ctx.config.length_upper_bound {
            return Err(SearchError::LengthBudgetExhausted {
                limit: ctx.config.length_upper_bound,
            });
        }

        let mut candidates: Vec<Candidate> =
            Vec::with_capacity(beam.len() * ctx.config.branching_factor);
        for expansion in expansions {
            candidates.extend(expansion.candidates);
        }

        // Isomorphic dedup: first occurrence in traversal order wins.
        let before = candidates.len();
        let mut seen = HashSet::with_capacity(candidates.len());
        candidates.retain(|c| seen.insert(c.hash));
        let after = candidates.len();
        if before == after {
            print!(" [{after}] ");
        } else {
            print!(" [{before}\u{2192}{after}] ");
        }
        std::io::stdout().flush().ok();

        let survivors = if candidates.len() > k {
            successive_halving(candidates, &beam, ctx, base_seed)
        } else {
            candidates
        };

        beam = survivors
            .iter()
            .map(|c| {
                let mut ops = beam[c.beam_index].clone();
                ops.push(c.op);
                ops
            })
            .collect();
    }

    unreachable!("the level loop only exits by return");
}

/// Run up to the configured number of independent searches.
///
/// Each iteration draws a fresh seed, runs one beam search, minimizes the
/// result's depth, and hands (state, length, depth) to `report`. The loop
/// ends early when a network beats the best known length or depth (a new
/// record makes further searching pointless) or when `stop` returns true at
/// an iteration boundary; a search in flight is never interrupted. Returns
/// the number of iterations that ran.
pub fn run_iterations(
    ctx: &SearchCtx,
    mut next_seed: impl FnMut() -> u64,
    stop: impl Fn() -> bool,
    mut report: impl FnMut(&State, usize, usize),
) -> Result<usize, SearchError> {
    let net_size = ctx.config.net_size;
    let mut iterations = 0;

    while iterations < ctx.config.max_iterations && !stop() {
        println!("Iteration {}:", iterations + 1);

        let mut state = beam_search(ctx, next_seed())?;
        let length = state.current_level();
        state.minimize_depth(net_size);
        let depth = state.compute_depth(net_size);

        iterations += 1;
        report(&state, length, depth);

        if length < ctx.config.length_lower_bound || depth < ctx.config.depth_lower_bound {
            break;
        }
    }

    Ok(iterations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::normalize::canonical_normalize;

    fn ctx(n: u32, beam: usize, symmetry: bool) -> SearchCtx {
        SearchCtx::new(Config::resolve(n, beam, 5, 1, Some(symmetry), 0.0001, 1).unwrap())
    }

    fn sorts_every_binary_input(state: &State, ctx: &SearchCtx) -> bool {
        let n = ctx.config.net_size;
        (0..1u32 << n).all(|p| {
            let out = state.ops().iter().fold(p, |acc, &op| {
                if (acc >> op.lo) & 1 == 0 && (acc >> op.hi) & 1 == 1 {
                    (acc | (1 << op.lo)) & !(1 << op.hi)
                } else {
                    acc
                }
            });
            ctx.lookups.is_sorted(out)
        })
    }

    #[test]
    fn three_wire_search_finds_the_optimal_network() {
        let ctx = ctx(3, 10, false);
        let state = beam_search(&ctx, 1234).unwrap();
        assert_eq!(state.current_level(), 3);
        assert!(state.is_complete());
        assert!(sorts_every_binary_input(&state, &ctx));
    }

    #[test]
    fn four_wire_search_finds_a_five_comparator_network() {
        let ctx = ctx(4, 100, false);
        let mut state = beam_search(&ctx, 99).unwrap();
        assert!(state.current_level() <= 5);
        assert!(sorts_every_binary_input(&state, &ctx));

        state.minimize_depth(4);
        assert!(state.compute_depth(4) <= 3);
    }

    #[test]
    fn narrow_beams_still_complete() {
        // K = 1 forces scoring at every level past the first.
        let ctx = ctx(4, 1, false);
        let state = beam_search(&ctx, 7).unwrap();
        assert!(state.is_complete());
        assert!(sorts_every_binary_input(&state, &ctx));
        assert!(state.current_level() <= ctx.config.length_upper_bound);
    }

    #[test]
    fn symmetry_shortcut_produces_a_valid_network() {
        let ctx = ctx(6, 50, true);
        let state = beam_search(&ctx, 5).unwrap();
        assert!(state.is_complete());
        assert!(sorts_every_binary_input(&state, &ctx));
    }

    #[test]
    fn result_survives_canonicalization() {
        let ctx = ctx(4, 100, false);
        let state = beam_search(&ctx, 3).unwrap();
        let mut ops = state.ops().to_vec();
        canonical_normalize(&mut ops, 4);
        assert_eq!(ops.len(), state.current_level());
    }

    #[test]
    fn halving_never_returns_more_than_the_beam_size() {
        let ctx = ctx(4, 2, false);
        let beam: Vec<Vec<Operation>> = vec![Vec::new()];
        let cands: Vec<Candidate> = (0..4)
            .flat_map(|lo| (lo + 1..4).map(move |hi| (lo, hi)))
            .enumerate()
            .map(|(i, (lo, hi))| Candidate {
                beam_index: 0,
                op: Operation::new(lo as u8, hi as u8),
                hash: i as u64,
                samples: Vec::new(),
                score: 0.0,
            })
            .collect();

        let survivors = successive_halving(cands, &beam, &ctx, 17);
        assert!(survivors.len() <= ctx.config.max_beam_size);
        assert!(!survivors.is_empty());
        for c in &survivors {
            assert!(!c.samples.is_empty(), "survivors must carry samples");
        }
    }

    #[test]
    fn iteration_loop_runs_to_the_configured_cap() {
        let config = Config::resolve(3, 10, 5, 1, Some(false), 0.0001, 2).unwrap();
        let ctx = SearchCtx::new(config);

        let mut seeds = 0u64;
        let mut reports = 0;
        let ran = run_iterations(
            &ctx,
            || {
                seeds += 1;
                seeds
            },
            || false,
            |state, length, depth| {
                reports += 1;
                assert!(state.is_complete());
                assert_eq!(length, state.current_level());
                assert!(depth <= length);
            },
        )
        .unwrap();

        assert_eq!(ran, 2);
        assert_eq!(reports, 2);
    }

    #[test]
    fn iteration_loop_breaks_early_on_a_new_record() {
        // Inflating the known length bound makes any result a record.
        let mut config = Config::resolve(3, 10, 5, 1, Some(false), 0.0001, 5).unwrap();
        config.length_lower_bound = 100;
        let ctx = SearchCtx::new(config);

        let ran = run_iterations(&ctx, || 1, || false, |_, _, _| {}).unwrap();
        assert_eq!(ran, 1);
    }

    #[test]
    fn iteration_loop_honors_the_stop_flag() {
        let ctx = ctx(3, 10, false);
        let mut reports = 0;
        let ran = run_iterations(&ctx, || 1, || true, |_, _, _| reports += 1).unwrap();
        assert_eq!(ran, 0);
        assert_eq!(reports, 0);
    }
}
