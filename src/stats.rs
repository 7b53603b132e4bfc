//! Component J: statistics. Traverses a class's bucket table and reports
//! displacement, chain, and reachability metrics alongside its header
//! counters (§4.10).

use crate::class::Class;

/// Bucket-table and header statistics for one class.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    pub num_buckets: u32,
    pub used_buckets: u32,
    pub num_chains: u32,
    pub max_chain_len: u32,
    pub chain_len_sum: u32,
    pub max_displacement: u32,
    pub unreachable: u32,

    pub learnings: u32,
    pub extra_learnings: u32,
    pub false_negatives: u32,
    pub false_positives: u32,
    pub classifications: u64,
}

impl Stats {
    pub fn avg_chain_length(&self) -> f64 {
        if self.num_chains == 0 {
            0.0
        } else {
            self.chain_len_sum as f64 / self.num_chains as f64
        }
    }
}

/// Computes [`Stats`] for `class`. Chains are allowed to wrap from the
/// last bucket to the first, so the scan starts at an empty bucket (if
/// any exists) to avoid splitting a wrapped chain in two.
pub fn stats(class: &mut Class) -> Stats {
    let header = class.header;
    let n = class.num_buckets() as usize;
    let mut s = Stats {
        num_buckets: n as u32,
        learnings: header.learnings,
        extra_learnings: header.extra_learnings,
        false_negatives: header.false_negatives,
        false_positives: header.false_positives,
        classifications: header.classifications,
        ..Default::default()
    };
    if n == 0 {
        return s;
    }

    let table = class.table();
    let gap = (0..n).find(|&i| !table.is_occupied(i));
    let scan_order: Vec<usize> = match gap {
        Some(g) => (0..n).map(|k| (g + k) % n).collect(),
        None => (0..n).collect(),
    };

    let mut chain_len = 0u32;
    for &i in &scan_order {
        if table.is_occupied(i) {
            s.used_buckets += 1;
            if chain_len == 0 {
                s.num_chains += 1;
            }
            chain_len += 1;
            let h1 = table.buckets[i].hash1.get();
            s.max_displacement = s.max_displacement.max(table.displacement(i, h1));
        } else if chain_len > 0 {
            s.chain_len_sum += chain_len;
            s.max_chain_len = s.max_chain_len.max(chain_len);
            chain_len = 0;
        }
    }
    if chain_len > 0 {
        s.chain_len_sum += chain_len;
        s.max_chain_len = s.max_chain_len.max(chain_len);
    }

    for i in 0..n {
        if !table.is_occupied(i) {
            continue;
        }
        let h1 = table.buckets[i].hash1.get();
        let home = table.home_slot(h1);
        let mut j = home;
        let mut unreachable = false;
        while j != i {
            if !table.is_occupied(j) {
                unreachable = true;
                break;
            }
            j = (j + 1) % n;
        }
        if unreachable {
            s.unreachable += 1;
        }
    }

    s
}
