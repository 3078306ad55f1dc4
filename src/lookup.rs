//! Precomputed zero-one tables.
//!
//! For an N-wire network there are 2ᴺ binary input patterns. A pattern is
//! sorted when all of its 0 bits precede all of its 1 bits (reading from
//! bit 0 upward), i.e. it has the shape 0ᵃ1ᵇ. For every pattern the tables
//! also hold the comparators that would alter it: exactly the pairs (i,j)
//! with i<j, bit i = 0 and bit j = 1. N ≈ 24 is the practical ceiling,
//! since the tables grow as 2ᴺ.

use crate::config::Config;
use crate::Operation;

pub struct LookupTables {
    sorted: Vec<bool>,
    allowed: Vec<Vec<Operation>>,
}

impl LookupTables {
    pub fn new(config: &Config) -> Self {
        let n = config.net_size;
        let num_patterns = config.num_patterns;

        let sorted: Vec<bool> = (0..num_patterns)
            .map(|p| pattern_is_sorted(p as u32, n))
            .collect();

        let mut allowed = Vec::with_capacity(num_patterns);
        for p in 0..num_patterns as u32 {
            let mut ops = Vec::new();
            for lo in 0..n - 1 {
                if (p >> lo) & 1 != 0 {
                    continue;
                }
                for hi in lo + 1..n {
                    if (p >> hi) & 1 == 1 {
                        ops.push(Operation::new(lo as u8, hi as u8));
                    }
                }
            }
            allowed.push(ops);
        }

        LookupTables { sorted, allowed }
    }

    #[inline]
    pub fn is_sorted(&self, pattern: u32) -> bool {
        self.sorted[pattern as usize]
    }

    /// The comparators that would change `pattern`.
    #[inline]
    pub fn allowed_ops(&self, pattern: u32) -> &[Operation] {
        &self.allowed[pattern as usize]
    }
}

/// True iff no 1 bit is immediately below a 0 bit.
fn pattern_is_sorted(pattern: u32, net_size: usize) -> bool {
    for i in 0..net_size - 1 {
        if (pattern >> i) & 1 == 0 && (pattern >> (i + 1)) & 1 == 1 {
            return false;
        }
    }
    true
}
