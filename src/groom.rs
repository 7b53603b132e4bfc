//! Component D: the microgroomer and packer. Evicts the least-used
//! reachable buckets in an overflowing chain, then compacts the chain so
//! every remaining bucket stays reachable from its home slot.

use crate::bucket::BucketTable;

/// §4.4 Microgroomer. `i` is some index inside (or adjacent to) an
/// overflowing chain.
pub fn microgroom(table: &mut BucketTable<'_>, i: usize, stop_after: u32, groom_locked: bool) {
    let n = table.len();
    if n == 0 || !table.is_occupied(i) {
        return;
    }

    // Step 1: walk backward, skipping at most one full revolution, to find
    // the chain's minimum count among unlocked buckets (and, separately,
    // among any bucket, as a fallback for an all-locked chain).
    let mut min_unlocked: Option<u32> = None;
    let mut min_any: Option<u32> = None;
    let mut p = i;
    for _ in 0..n {
        if !table.is_occupied(p) {
            break;
        }
        let count = table.buckets[p].count.get();
        if !table.is_locked(p) {
            min_unlocked = Some(min_unlocked.map_or(count, |m| m.min(count)));
        }
        min_any = Some(min_any.map_or(count, |m| m.min(count)));
        let prev = if p == 0 { n - 1 } else { p - 1 };
        if prev == p {
            break;
        }
        p = prev;
    }

    let min_v = match min_unlocked.or(min_any) {
        Some(v) => v,
        None => return,
    };

    // Step 2: forward walk to find the chain's start and length.
    let (packstart, packlen) = table.chain_bounds(i);

    // Step 3: escalate the allowed displacement until at least one bucket
    // is marked FREE. Bounded by `n` passes so an all-locked chain with
    // `groom_locked` disabled cannot spin forever.
    let mut marked = 0u32;
    let mut d = 1u32;
    while marked == 0 && d <= n as u32 {
        let mut q = packstart;
        for _ in 0..packlen {
            if marked >= stop_after {
                break;
            }
            let locked = table.is_locked(q);
            let eligible = !locked || groom_locked;
            let h1 = table.buckets[q].hash1.get();
            if eligible
                && table.buckets[q].count.get() == min_v
                && table.displacement(q, h1) < d
            {
                table.mark_free(q);
                marked += 1;
            }
            q = (q + 1) % n;
        }
        if marked == 0 {
            d += 1;
        }
    }

    pack(table, packstart, packlen);
}

/// §4.4 Pack. Relocates every occupied, non-`FREE` bucket into an earlier
/// `FREE` slot between its home slot and its current position if one
/// exists, then zeroes whatever is still `FREE` and clears every flag in
/// the chain.
pub fn pack(table: &mut BucketTable<'_>, packstart: usize, packlen: usize) {
    let n = table.len();
    if packlen == 0 {
        return;
    }

    let mut p = packstart;
    for _ in 0..packlen {
        if table.is_occupied(p) && !table.is_free(p) {
            let h1 = table.buckets[p].hash1.get();
            let home = table.home_slot(h1);
            let mut q = home;
            let mut dest = None;
            while q != p {
                if table.is_free(q) {
                    dest = Some(q);
                    break;
                }
                q = (q + 1) % n;
            }
            if let Some(dest) = dest {
                let moved = table.buckets[p];
                let moved_flags = table.flags[p];
                table.buckets[dest] = moved;
                table.flags[dest] = moved_flags;
                table.mark_free(p);
            }
        }
        p = (p + 1) % n;
    }

    let mut p = packstart;
    for _ in 0..packlen {
        if table.is_free(p) {
            table.buckets[p] = crate::bucket::Bucket::ZERO;
        }
        table.flags[p] = 0;
        p = (p + 1) % n;
    }
}
