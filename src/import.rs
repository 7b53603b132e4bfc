//! Component I: import. Merges one class's buckets and counters into
//! another, using the bucket primitives (D) for each transferred bucket.

use tracing::instrument;

use crate::bucket::{Bucket, Find};
use crate::class::Class;
use crate::config::EngineConfig;
use crate::error::{OsbfError, Result};

/// Adds `src`'s scalar header counters and occupied buckets into `dst`,
/// which must be open `WriteAll`. `src` need only be open `ReadOnly`, but
/// borrows it mutably since reading its bucket table goes through the
/// same `Class::table()` path a write would.
#[instrument(skip(dst, src, config), fields(dst = %dst.path.display(), src = %src.path.display()))]
pub fn import(dst: &mut Class, src: &mut Class, config: &EngineConfig) -> Result<()> {
    if !dst.usage.is_writable() {
        return Err(OsbfError::Usage(dst.usage));
    }

    dst.header.learnings = dst.header.learnings.saturating_add(src.header.learnings);
    dst.header.extra_learnings = dst
        .header
        .extra_learnings
        .saturating_add(src.header.extra_learnings);
    dst.header.false_negatives = dst
        .header
        .false_negatives
        .saturating_add(src.header.false_negatives);
    dst.header.false_positives = dst
        .header
        .false_positives
        .saturating_add(src.header.false_positives);
    dst.header.classifications = dst
        .header
        .classifications
        .saturating_add(src.header.classifications);

    dst.clear_flags();

    let src_buckets: Vec<Bucket> = {
        let table = src.table();
        table.buckets.iter().copied().filter(|b| b.is_occupied()).collect()
    };

    let d_trig = dst.displacement_trigger(config);
    let mut dst_table = dst.table();
    for b in src_buckets {
        let h1 = b.hash1.get();
        let h2 = b.hash2.get();
        let count = b.count.get();
        match dst_table.find(h1, h2) {
            Find::Found(i) => dst_table.update(i, count as i64),
            Find::Insertable(i) => dst_table.insert(
                i,
                h1,
                h2,
                count,
                d_trig,
                config.stop_after,
                config.groom_locked,
            ),
            Find::Full => return Err(OsbfError::FullTable),
        }
    }

    Ok(())
}
