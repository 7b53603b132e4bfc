//! Component D: the bucket table. A bounded open-addressing hash table
//! with a displacement cap, plus the transient `bflags` byte array that
//! tracks which buckets are `LOCK`ed or slated `FREE`. See [`groom`] for
//! the microgroomer and packer that keep the table within its cap.

use zerocopy::byteorder::little_endian::U32 as LeU32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Maximum representable bucket count, per §4.4's saturation rule.
pub const MAX_COUNT: u32 = 65_535;

/// `bflags` bit set when a bucket has been updated this call (trainer) or
/// observed this call (classifier); protects against grooming / double
/// counting.
pub const LOCK: u8 = 0x80;
/// `bflags` bit the microgroomer sets on a bucket it has slated for
/// eviction, ahead of [`groom::pack`] physically zeroing it.
pub const FREE: u8 = 0x40;

/// On-disk bucket layout: three little-endian `u32`s. Implements
/// `zerocopy`'s traits so a memory-mapped byte range can be reinterpreted
/// as `&[Bucket]` directly, with correct behavior on big-endian hosts.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct Bucket {
    pub hash1: LeU32,
    pub hash2: LeU32,
    pub count: LeU32,
}

impl Bucket {
    pub const ZERO: Bucket = Bucket {
        hash1: LeU32::new(0),
        hash2: LeU32::new(0),
        count: LeU32::new(0),
    };

    pub fn is_occupied(&self) -> bool {
        self.count.get() > 0
    }
}

/// Outcome of [`BucketTable::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Find {
    /// An occupied bucket matching `(h1, h2)` at this index.
    Found(usize),
    /// An empty bucket at this index, usable as an insert slot.
    Insertable(usize),
    /// The probe sequence wrapped all the way back to the home slot
    /// without finding a match or an empty slot: the table is full.
    Full,
}

/// Either a mutable or a read-only view of the bucket array. A class
/// opened `ReadOnly` maps its native image with `PROT_READ` only (§4.6);
/// writing through such a mapping would segfault, so its `BucketTable`
/// carries a `Ro` view instead. Every read (`Deref`) works the same either
/// way; only `insert`/`update`/`pack` (gated on the class's usage by their
/// callers before `BucketTable` is ever obtained) go through `DerefMut`.
pub(crate) enum Buckets<'a> {
    Mut(&'a mut [Bucket]),
    Ro(&'a [Bucket]),
}

impl<'a> std::ops::Deref for Buckets<'a> {
    type Target = [Bucket];
    fn deref(&self) -> &[Bucket] {
        match self {
            Buckets::Mut(b) => b,
            Buckets::Ro(b) => b,
        }
    }
}

impl<'a> std::ops::DerefMut for Buckets<'a> {
    fn deref_mut(&mut self) -> &mut [Bucket] {
        match self {
            Buckets::Mut(b) => b,
            Buckets::Ro(_) => {
                unreachable!("bucket table opened read-only was asked to mutate a bucket")
            }
        }
    }
}

/// A bucket array together with its private, non-persistent flags buffer.
///
/// Borrows both slices rather than owning them: the buckets live either in
/// a memory-mapped file ([`crate::class`]) or a freshly allocated `Vec`
/// (legacy-format upconversion), and the flags buffer is always a plain
/// heap allocation that never touches disk.
pub struct BucketTable<'a> {
    pub(crate) buckets: Buckets<'a>,
    pub(crate) flags: &'a mut [u8],
}

impl<'a> BucketTable<'a> {
    pub fn new(buckets: &'a mut [Bucket], flags: &'a mut [u8]) -> Self {
        assert_eq!(buckets.len(), flags.len(), "bflags must mirror the bucket array 1:1");
        BucketTable { buckets: Buckets::Mut(buckets), flags }
    }

    /// Wraps a read-only bucket view (a `PROT_READ`-only mapping). Valid
    /// for lookups and flag updates; panics if a caller ever reaches an
    /// `update`/`insert`/`pack` through it.
    pub fn new_ro(buckets: &'a [Bucket], flags: &'a mut [u8]) -> Self {
        assert_eq!(buckets.len(), flags.len(), "bflags must mirror the bucket array 1:1");
        BucketTable { buckets: Buckets::Ro(buckets), flags }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn home_slot(&self, h1: u32) -> usize {
        h1 as usize % self.len()
    }

    /// Distance from `h1`'s home slot to `i`, wrapping.
    pub fn displacement(&self, i: usize, h1: u32) -> u32 {
        let n = self.len();
        ((i + n - self.home_slot(h1)) % n) as u32
    }

    pub fn is_occupied(&self, i: usize) -> bool {
        self.buckets[i].is_occupied()
    }

    pub fn is_locked(&self, i: usize) -> bool {
        self.flags[i] & LOCK != 0
    }

    pub fn is_free(&self, i: usize) -> bool {
        self.flags[i] & FREE != 0
    }

    pub fn set_lock(&mut self, i: usize) {
        self.flags[i] |= LOCK;
    }

    pub fn mark_free(&mut self, i: usize) {
        self.flags[i] |= FREE;
    }

    /// Zeroes every flag byte. Run at the start of every train/classify
    /// call, since `bflags` is never persisted across calls.
    pub fn clear_flags(&mut self) {
        self.flags.fill(0);
    }

    /// §4.4 Lookup.
    pub fn find(&self, h1: u32, h2: u32) -> Find {
        let n = self.len();
        let i0 = self.home_slot(h1);
        let mut i = i0;
        loop {
            if !self.is_occupied(i) {
                return Find::Insertable(i);
            }
            let b = &self.buckets[i];
            if b.hash1.get() == h1 && b.hash2.get() == h2 {
                return Find::Found(i);
            }
            i = (i + 1) % n;
            if i == i0 {
                return Find::Full;
            }
        }
    }

    /// §4.4 Update.
    pub fn update(&mut self, i: usize, delta: i64) {
        let count = self.buckets[i].count.get() as i64;
        if delta > 0 && count + delta >= MAX_COUNT as i64 {
            self.buckets[i].count.set(MAX_COUNT);
            self.set_lock(i);
        } else if delta < 0 && -delta >= count {
            self.mark_free(i);
            if count != 0 {
                let (start, len) = self.chain_bounds(i);
                crate::groom::pack(self, start, len);
            }
        } else {
            self.buckets[i].count.set((count + delta) as u32);
            self.set_lock(i);
        }
    }

    /// §4.4 Insert. `delta` is the initial count to write (always positive:
    /// callers only insert on a positive training sense).
    pub fn insert(
        &mut self,
        mut i: usize,
        h1: u32,
        h2: u32,
        delta: u32,
        d_trig: u32,
        stop_after: u32,
        groom_locked: bool,
    ) {
        let n = self.len();
        while self.displacement(i, h1) > d_trig {
            let prev = if i == 0 { n - 1 } else { i - 1 };
            crate::groom::microgroom(self, prev, stop_after, groom_locked);
            i = match self.find(h1, h2) {
                Find::Insertable(idx) | Find::Found(idx) => idx,
                Find::Full => break,
            };
        }
        self.buckets[i].hash1.set(h1);
        self.buckets[i].hash2.set(h2);
        self.buckets[i].count.set(delta);
        self.set_lock(i);
    }

    /// Start index and length (in bucket units) of the maximal occupied
    /// run containing `i`, wrapping at the array bounds.
    pub(crate) fn chain_bounds(&self, i: usize) -> (usize, usize) {
        let n = self.len();
        if !self.is_occupied(i) {
            return (i, 0);
        }
        let mut start = i;
        for _ in 0..n {
            let prev = if start == 0 { n - 1 } else { start - 1 };
            if !self.is_occupied(prev) || prev == i {
                break;
            }
            start = prev;
        }
        let mut len = 0;
        let mut p = start;
        for _ in 0..n {
            if !self.is_occupied(p) {
                break;
            }
            len += 1;
            p = (p + 1) % n;
            if p == start {
                break;
            }
        }
        (start, len)
    }
}
