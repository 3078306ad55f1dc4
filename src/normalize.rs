//! Canonical form for comparator sequences.
//!
//! Two partial networks that differ only by a renaming of wires, or by the
//! order of comparators inside one parallel layer, induce identical
//! continuations up to the same renaming; the beam should explore only one
//! of them. The canonical form relabels wires by a greedy structural
//! ordering (Choi & Moon, "Isomorphism, Normalization, and a Genetic
//! Algorithm for Sorting Network Optimization"), partitions the rewritten
//! sequence into parallel layers, sorts each layer lexicographically, and
//! hashes the result. The labeling is exact whenever every greedy pick is a
//! strict (degree, neighbor-sum) maximizer; when unrelated wires tie, the
//! index tie-break can split permutation-related networks across hashes or
//! conflate distinct ones. Both directions only cost the beam a little
//! pruning quality, never correctness, and the hash itself is 64-bit with
//! the usual collision caveat.

use crate::{Operation, MAX_NET_SIZE};

const FNV_OFFSET: u64 = 14695981039346656037;
const FNV_PRIME: u64 = 1099511628211;

const UNASSIGNED: u8 = u8::MAX;

/// FNV-1a over the (lo, hi) byte stream.
fn fnv1a(ops: &[Operation]) -> u64 {
    let mut hash = FNV_OFFSET;
    for op in ops {
        hash ^= op.lo as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        hash ^= op.hi as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn wire_degrees(ops: &[Operation]) -> [i32; MAX_NET_SIZE] {
    let mut degrees = [0; MAX_NET_SIZE];
    for op in ops {
        degrees[op.lo as usize] += 1;
        degrees[op.hi as usize] += 1;
    }
    degrees
}

fn neighbor_sums(ops: &[Operation], degrees: &[i32; MAX_NET_SIZE]) -> [i32; MAX_NET_SIZE] {
    let mut sums = [0; MAX_NET_SIZE];
    for op in ops {
        sums[op.lo as usize] += degrees[op.hi as usize];
        sums[op.hi as usize] += degrees[op.lo as usize];
    }
    sums
}

/// Greedy canonical relabeling: for each new label pick the unassigned wire
/// with the highest degree, breaking ties by highest neighbor-degree sum and
/// then by lowest original index; after assigning, discount the wire's
/// degree from its unassigned neighbors' sums.
fn canonical_mapping(ops: &[Operation], net_size: usize) -> [u8; MAX_NET_SIZE] {
    let degrees = wire_degrees(ops);
    let mut sums = neighbor_sums(ops, &degrees);

    let mut mapping = [UNASSIGNED; MAX_NET_SIZE];
    let mut assigned = [false; MAX_NET_SIZE];

    for new_label in 0..net_size {
        let mut best = usize::MAX;
        for wire in 0..net_size {
            if assigned[wire] {
                continue;
            }
            if best == usize::MAX
                || degrees[wire] > degrees[best]
                || (degrees[wire] == degrees[best] && sums[wire] > sums[best])
            {
                best = wire;
            }
        }
        debug_assert!(best != usize::MAX);

        mapping[best] = new_label as u8;
        assigned[best] = true;
        for op in ops {
            if op.lo as usize == best && !assigned[op.hi as usize] {
                sums[op.hi as usize] -= degrees[best];
            } else if op.hi as usize == best && !assigned[op.lo as usize] {
                sums[op.lo as usize] -= degrees[best];
            }
        }
    }

    mapping
}

fn apply_mapping(ops: &mut [Operation], mapping: &[u8; MAX_NET_SIZE]) {
    for op in ops {
        let a = mapping[op.lo as usize];
        let b = mapping[op.hi as usize];
        *op = Operation::new(a.min(b), a.max(b));
    }
}

/// Partition the sequence into parallel layers in order (a comparator joins
/// the current layer iff both wires are still free in it) and sort each
/// layer by (lo, hi). Preserves length and the comparator multiset.
fn normalize_layer_order(ops: &mut Vec<Operation>) {
    let mut result = Vec::with_capacity(ops.len());
    let mut layer: Vec<Operation> = Vec::new();
    let mut used = [false; MAX_NET_SIZE];

    for &op in ops.iter() {
        if used[op.lo as usize] || used[op.hi as usize] {
            layer.sort_unstable();
            result.append(&mut layer);
            used = [false; MAX_NET_SIZE];
        }
        layer.push(op);
        used[op.lo as usize] = true;
        used[op.hi as usize] = true;
    }
    layer.sort_unstable();
    result.append(&mut layer);

    *ops = result;
}

/// Rewrite `ops` into canonical form in place.
pub fn canonical_normalize(ops: &mut Vec<Operation>, net_size: usize) {
    if ops.is_empty() {
        return;
    }
    let mapping = canonical_mapping(ops, net_size);
    apply_mapping(ops, &mapping);
    normalize_layer_order(ops);
}

/// Canonical 64-bit hash of `ops` extended by `extra`, using `scratch` to
/// avoid an allocation per call. Hashing the empty sequence yields 0.
pub fn canonical_hash_extended(
    ops: &[Operation],
    extra: Operation,
    net_size: usize,
    scratch: &mut Vec<Operation>,
) -> u64 {
    scratch.clear();
    scratch.extend_from_slice(ops);
    scratch.push(extra);
    canonical_normalize(scratch, net_size);
    fnv1a(scratch)
}

/// Canonical 64-bit hash of a comparator sequence.
pub fn canonical_hash(ops: &[Operation], net_size: usize) -> u64 {
    if ops.is_empty() {
        return 0;
    }
    let mut scratch = ops.to_vec();
    canonical_normalize(&mut scratch, net_size);
    fnv1a(&scratch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn net(pairs: &[(u8, u8)]) -> Vec<Operation> {
        pairs.iter().map(|&(a, b)| Operation::new(a, b)).collect()
    }

    fn relabel(ops: &[Operation], perm: &[u8]) -> Vec<Operation> {
        ops.iter()
            .map(|op| {
                let a = perm[op.lo as usize];
                let b = perm[op.hi as usize];
                Operation::new(a.min(b), a.max(b))
            })
            .collect()
    }

    fn random_network(n: usize, len: usize, rng: &mut impl Rng) -> Vec<Operation> {
        (0..len)
            .map(|_| {
                let lo = rng.gen_range(0..n - 1);
                let hi = rng.gen_range(lo + 1..n);
                Operation::new(lo as u8, hi as u8)
            })
            .collect()
    }

    /// True when some greedy pick ties with another unassigned wire on
    /// (degree, neighbor-sum). Only unambiguous networks canonicalize
    /// identically under every relabeling; ambiguous ones may split.
    fn labeling_is_ambiguous(ops: &[Operation], net_size: usize) -> bool {
        let degrees = wire_degrees(ops);
        let mut sums = neighbor_sums(ops, &degrees);
        let mut assigned = [false; MAX_NET_SIZE];

        for _ in 0..net_size {
            let mut best = usize::MAX;
            let mut tied = false;
            for wire in 0..net_size {
                if assigned[wire] {
                    continue;
                }
                if best == usize::MAX {
                    best = wire;
                } else if degrees[wire] > degrees[best]
                    || (degrees[wire] == degrees[best] && sums[wire] > sums[best])
                {
                    best = wire;
                    tied = false;
                } else if degrees[wire] == degrees[best] && sums[wire] == sums[best] {
                    tied = true;
                }
            }
            let remaining = (0..net_size).filter(|&w| !assigned[w]).count();
            if tied && remaining > 1 {
                return true;
            }
            assigned[best] = true;
            for op in ops {
                if op.lo as usize == best && !assigned[op.hi as usize] {
                    sums[op.hi as usize] -= degrees[best];
                } else if op.hi as usize == best && !assigned[op.lo as usize] {
                    sums[op.lo as usize] -= degrees[best];
                }
            }
        }
        false
    }

    #[test]
    fn hash_is_invariant_under_wire_relabeling() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut tested = 0;
        for n in [4usize, 6, 8] {
            for _ in 0..300 {
                let ops = random_network(n, rng.gen_range(1..=3 * n), &mut rng);
                if labeling_is_ambiguous(&ops, n) {
                    continue;
                }
                tested += 1;
                let reference = canonical_hash(&ops, n);

                let mut perm: Vec<u8> = (0..n as u8).collect();
                for _ in 0..5 {
                    perm.shuffle(&mut rng);
                    let relabeled = relabel(&ops, &perm);
                    assert_eq!(
                        canonical_hash(&relabeled, n),
                        reference,
                        "n={n} ops={ops:?} perm={perm:?}"
                    );
                }
            }
        }
        assert!(tested >= 20, "only {tested} unambiguous samples");
    }

    #[test]
    fn hash_is_invariant_under_intra_layer_reordering() {
        // (0,1) and (2,3) form one layer; swapping them is a no-op.
        let a = net(&[(0, 1), (2, 3), (0, 2)]);
        let b = net(&[(2, 3), (0, 1), (0, 2)]);
        assert_eq!(canonical_hash(&a, 4), canonical_hash(&b, 4));
    }

    #[test]
    fn wire_reversed_five_comparator_networks_collide() {
        let a = net(&[(0, 1), (2, 3), (0, 2), (1, 3), (1, 2)]);
        let b = net(&[(2, 3), (0, 1), (1, 3), (0, 2), (1, 2)]);
        assert_eq!(canonical_hash(&a, 4), canonical_hash(&b, 4));
    }

    #[test]
    fn normalization_is_deterministic_and_preserves_length() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..40 {
            let ops = random_network(6, rng.gen_range(1..15), &mut rng);

            let mut a = ops.clone();
            let mut b = ops.clone();
            canonical_normalize(&mut a, 6);
            canonical_normalize(&mut b, 6);
            assert_eq!(a, b, "ops={ops:?}");
            assert_eq!(a.len(), ops.len());

            // Relabeling permutes wires, so per-wire degrees survive as a
            // multiset.
            let mut before: Vec<i32> = wire_degrees(&ops)[..6].to_vec();
            let mut after: Vec<i32> = wire_degrees(&a)[..6].to_vec();
            before.sort_unstable();
            after.sort_unstable();
            assert_eq!(before, after);
        }
    }

    #[test]
    fn layer_partition_keeps_every_comparator() {
        // A sequence whose later ops could be pulled over an earlier
        // conflict; the partition must neither drop nor duplicate.
        let mut ops = net(&[(0, 1), (0, 2), (2, 3)]);
        normalize_layer_order(&mut ops);
        let mut sorted = ops.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, net(&[(0, 1), (0, 2), (2, 3)]));
        assert_eq!(ops.len(), 3);
    }

    #[test]
    fn distinct_structures_hash_apart() {
        let a = net(&[(0, 1), (2, 3)]);
        let b = net(&[(0, 1), (1, 2)]);
        assert_ne!(canonical_hash(&a, 4), canonical_hash(&b, 4));
    }

    #[test]
    fn empty_sequence_hashes_to_zero() {
        assert_eq!(canonical_hash(&[], 8), 0);
    }

    #[test]
    fn extended_hash_matches_rebuilt_sequence() {
        let base = net(&[(0, 1), (2, 3)]);
        let extra = Operation::new(0, 2);
        let mut scratch = Vec::new();
        let mut full = base.clone();
        full.push(extra);
        assert_eq!(
            canonical_hash_extended(&base, extra, 4, &mut scratch),
            canonical_hash(&full, 4)
        );
    }
}
