//! Search state: which binary patterns a partial network has not yet sorted.
//!
//! The unsorted patterns live in an intrusive singly-linked list threaded
//! through a flat slab of 2ᴺ slots, one per pattern value. A slot's
//! `in_list` flag answers membership for the *pattern with that value* in
//! O(1), while the slot's `pattern` field holds whatever image currently
//! occupies that list node; after a few comparators the node at index k
//! usually no longer carries pattern k. Applying a comparator is a single
//! sweep of the list: each affected node either moves to its image's slot
//! flag, merges with a node already carrying that image, or leaves the list
//! when the image is sorted. The in-place reuse is safe because a comparator
//! is idempotent on its own image: the sweep can never re-transform a node
//! it already rewrote.

use rand::Rng;

use crate::{Operation, SearchCtx, END_OF_LIST, MAX_NET_SIZE};

#[derive(Clone, Copy)]
struct ListSlot {
    in_list: bool,
    pattern: u32,
    next: i32,
}

/// Flat N×N successor matrix; only cells with row < column are ever set.
pub struct SuccMatrix {
    n: usize,
    cells: Vec<u8>,
}

impl SuccMatrix {
    pub fn new(net_size: usize) -> Self {
        SuccMatrix {
            n: net_size,
            cells: vec![0; net_size * net_size],
        }
    }

    #[inline]
    pub fn is_set(&self, lo: usize, hi: usize) -> bool {
        self.cells[lo * self.n + hi] != 0
    }

    #[inline]
    fn set(&mut self, lo: usize, hi: usize) {
        self.cells[lo * self.n + hi] = 1;
    }

    fn clear(&mut self) {
        self.cells.fill(0);
    }

    fn count_set(&self) -> usize {
        self.cells.iter().filter(|&&c| c != 0).count()
    }
}

/// Progress of one network construction: the live unsorted-pattern list
/// plus the comparator sequence applied so far.
pub struct State {
    slots: Vec<ListSlot>,
    first: i32,
    num_unsorted: usize,
    ops: Vec<Operation>,
}

impl Clone for State {
    fn clone(&self) -> Self {
        State {
            slots: self.slots.clone(),
            first: self.first,
            num_unsorted: self.num_unsorted,
            ops: self.ops.clone(),
        }
    }

    // Rollout scratch states are re-cloned from their base thousands of
    // times; reusing the slab and ops allocations keeps that free of
    // allocator traffic.
    fn clone_from(&mut self, source: &Self) {
        self.slots.clone_from(&source.slots);
        self.first = source.first;
        self.num_unsorted = source.num_unsorted;
        self.ops.clear();
        self.ops.extend_from_slice(&source.ops);
    }
}

impl State {
    /// A fresh state at the start set: every pattern that is not already
    /// sorted, i.e. 2ᴺ − (N+1) live patterns.
    pub fn new(ctx: &SearchCtx) -> Self {
        let mut state = State {
            slots: vec![
                ListSlot {
                    in_list: false,
                    pattern: 0,
                    next: END_OF_LIST,
                };
                ctx.config.num_patterns
            ],
            first: END_OF_LIST,
            num_unsorted: 0,
            ops: Vec::with_capacity(ctx.config.length_upper_bound),
        };
        state.reset(ctx);
        state
    }

    /// Rebuild the start set and clear the comparator sequence.
    pub fn reset(&mut self, ctx: &SearchCtx) {
        self.first = END_OF_LIST;
        for p in 0..ctx.config.num_patterns {
            let sorted = ctx.lookups.is_sorted(p as u32);
            let slot = &mut self.slots[p];
            if sorted {
                slot.in_list = false;
            } else {
                slot.in_list = true;
                slot.pattern = p as u32;
                slot.next = self.first;
                self.first = p as i32;
            }
        }
        self.num_unsorted = ctx.config.num_patterns - (ctx.config.net_size + 1);
        self.ops.clear();
    }

    #[inline]
    pub fn num_unsorted(&self) -> usize {
        self.num_unsorted
    }

    #[inline]
    pub fn current_level(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    /// A state with no unsorted patterns left has built a complete sorting
    /// network (zero-one principle).
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.num_unsorted == 0
    }

    /// Live pattern values, in list order (order carries no meaning).
    pub fn unsorted_patterns(&self) -> impl Iterator<Item = u32> + '_ {
        let mut cur = self.first;
        std::iter::from_fn(move || {
            if cur == END_OF_LIST {
                return None;
            }
            let slot = &self.slots[cur as usize];
            cur = slot.next;
            Some(slot.pattern)
        })
    }

    /// Apply comparator `op` to every live pattern in one sweep and append
    /// it to the sequence.
    pub fn apply(&mut self, op: Operation, ctx: &SearchCtx) {
        debug_assert!(op.lo < op.hi && (op.hi as usize) < ctx.config.net_size);
        let (lo, hi) = (op.lo as u32, op.hi as u32);

        let mut prev = END_OF_LIST;
        let mut cur = self.first;
        while cur != END_OF_LIST {
            let next = self.slots[cur as usize].next;
            let pattern = self.slots[cur as usize].pattern;

            if (pattern >> lo) & 1 == 0 && (pattern >> hi) & 1 == 1 {
                self.slots[pattern as usize].in_list = false;
                let image = (pattern | (1 << lo)) & !(1 << hi);

                if self.slots[image as usize].in_list || ctx.lookups.is_sorted(image) {
                    // Merged with another live pattern, or sorted: drop the node.
                    self.num_unsorted -= 1;
                    if prev != END_OF_LIST {
                        self.slots[prev as usize].next = next;
                    } else {
                        self.first = next;
                    }
                } else {
                    // Still unsorted: reuse the node for the image.
                    self.slots[image as usize].in_list = true;
                    self.slots[cur as usize].pattern = image;
                    if prev != END_OF_LIST {
                        self.slots[prev as usize].next = cur;
                    } else {
                        self.first = cur;
                    }
                    prev = cur;
                }
            } else {
                prev = cur;
            }

            cur = next;
        }

        self.ops.push(op);
    }

    /// One rollout step: a uniformly random live pattern, then a uniformly
    /// random comparator among those that would change it. Picking the
    /// pattern first weights comparators by how many live patterns they
    /// touch; that bias is deliberate.
    pub fn random_rollout_step(&mut self, ctx: &SearchCtx, rng: &mut impl Rng) {
        debug_assert!(self.num_unsorted > 0);
        let target = rng.gen_range(0..self.num_unsorted);

        let mut pattern = 0;
        let mut cur = self.first;
        let mut seen = 0;
        while cur != END_OF_LIST {
            if seen == target {
                pattern = self.slots[cur as usize].pattern;
                break;
            }
            seen += 1;
            cur = self.slots[cur as usize].next;
        }
        debug_assert!(cur != END_OF_LIST, "list shorter than num_unsorted");

        let allowed = ctx.lookups.allowed_ops(pattern);
        let op = allowed[rng.gen_range(0..allowed.len())];
        self.apply(op, ctx);
    }

    /// Mark every comparator that would change at least one live pattern.
    /// Returns the number of marked cells; 0 means the network is complete.
    pub fn enumerate_legal_successors(&self, succ: &mut SuccMatrix) -> usize {
        succ.clear();
        let n = succ.n;

        let mut cur = self.first;
        while cur != END_OF_LIST {
            let pattern = self.slots[cur as usize].pattern;
            for lo in 0..n - 1 {
                if (pattern >> lo) & 1 != 0 {
                    continue;
                }
                for hi in lo + 1..n {
                    if (pattern >> hi) & 1 == 1 {
                        succ.set(lo, hi);
                    }
                }
            }
            cur = self.slots[cur as usize].next;
        }

        succ.count_set()
    }

    /// Number of parallel layers of the current sequence: a layer ends when
    /// the next comparator reuses a wire.
    pub fn compute_depth(&self, net_size: usize) -> usize {
        debug_assert!(net_size <= MAX_NET_SIZE);
        let mut used = [false; MAX_NET_SIZE];
        let mut depth = 1;

        for op in &self.ops {
            if used[op.lo as usize] || used[op.hi as usize] {
                used = [false; MAX_NET_SIZE];
                depth += 1;
            }
            used[op.lo as usize] = true;
            used[op.hi as usize] = true;
        }

        depth
    }

    /// Greedily reorder the sequence into fewer parallel layers.
    ///
    /// When a comparator conflicts with the layer being built, scan forward
    /// for a later comparator whose wires are free in the layer and which
    /// commutes with everything skipped on the way (two comparators commute
    /// iff their wire sets are disjoint), and swap it in. Repeats until a
    /// full pass changes nothing. Swaps only ever move a comparator to an
    /// earlier position, so the pass terminates; the commuting condition
    /// keeps the computed function identical.
    pub fn minimize_depth(&mut self, net_size: usize) {
        debug_assert!(net_size <= MAX_NET_SIZE);
        loop {
            let mut altered = false;
            let mut layer = [false; MAX_NET_SIZE];

            let mut l1 = 0;
            while l1 < self.ops.len() {
                let op = self.ops[l1];
                if layer[op.lo as usize] || layer[op.hi as usize] {
                    // `blocked` accumulates wires of the comparators skipped
                    // over; once a candidate touches one of them it can no
                    // longer be moved past them.
                    let mut blocked = [false; MAX_NET_SIZE];
                    let mut l2 = l1;
                    while l2 < self.ops.len() {
                        let cand = self.ops[l2];
                        if blocked[cand.lo as usize] || blocked[cand.hi as usize] {
                            break;
                        }
                        if !layer[cand.lo as usize] && !layer[cand.hi as usize] {
                            layer[cand.lo as usize] = true;
                            layer[cand.hi as usize] = true;
                            self.ops.swap(l1, l2);
                            l2 = l1 + 1;
                            l1 += 1;
                            blocked = [false; MAX_NET_SIZE];
                            altered = true;
                            continue;
                        }
                        blocked[cand.lo as usize] = true;
                        blocked[cand.hi as usize] = true;
                        l2 += 1;
                    }
                    layer = [false; MAX_NET_SIZE];
                }
                if l1 < self.ops.len() {
                    let op = self.ops[l1];
                    layer[op.lo as usize] = true;
                    layer[op.hi as usize] = true;
                }
                l1 += 1;
            }

            if !altered {
                break;
            }
        }
    }
}
