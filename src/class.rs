//! Component F: class lifecycle. Open/close, the `Closed` / `Copied` /
//! `Mapped` state machine, and the storage backing each state.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapMut, MmapOptions};
use tracing::{debug, instrument};

use crate::bucket::{Bucket, BucketTable};
use crate::config::{EngineConfig, Usage};
use crate::error::{OsbfError, Result};
use crate::format::{self, expected_native_size, Format, Header};
use crate::lock::{self, FileLock};

/// The state a class is in, per §3/§4.6.
enum Storage {
    /// Native-format file, memory-mapped read-write (any usage above
    /// `ReadOnly`).
    Mapped { mmap: MmapMut },
    /// Native-format file, memory-mapped `PROT_READ`-only: a `ReadOnly`
    /// open never requests write permission on the fd or the mapping, per
    /// §4.6 ("a `ReadOnly` open takes no lock, relying on the writer's
    /// atomic rewrites").
    MappedRo { mmap: Mmap },
    /// Non-native format, upconverted into freshly allocated buffers.
    Copied { buckets: Vec<Bucket> },
}

/// An open class: header, bucket table, transient flags, and everything
/// needed to flush and close it correctly.
pub struct Class {
    pub path: PathBuf,
    pub usage: Usage,
    pub header: Header,
    storage: Storage,
    flags: Vec<u8>,
    file: std::fs::File,
    d_trig: Option<u32>,
    lock: Option<FileLock>,
}

impl Class {
    /// Creates a brand-new native-format class file with `num_buckets`
    /// empty buckets and opens it `WriteAll`.
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn create(path: impl AsRef<Path>, num_buckets: u32, config: &EngineConfig) -> Result<Self> {
        let path = path.as_ref();
        let size = expected_native_size(num_buckets);
        let mut image = vec![0u8; size as usize];
        format::write_native_header(&mut image, &Header::new(num_buckets));
        std::fs::write(path, &image)?;
        Self::open(path, Usage::WriteAll, config)
    }

    /// Opens a class file per §4.6's state machine, dispatching on the
    /// recognized format (§4.5).
    #[instrument(skip(config), fields(path = %path.as_ref().display(), usage = ?usage))]
    pub fn open(path: impl AsRef<Path>, usage: Usage, config: &EngineConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(usage.is_writable())
            .open(&path)?;

        let lock = if usage.is_writable() {
            Some(FileLock::acquire(&file, format::HEADER_LEN as i64)?)
        } else {
            None
        };

        let len = file.metadata()?.len();
        let mut full = vec![0u8; len as usize];
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut f = file.try_clone()?;
            f.seek(SeekFrom::Start(0))?;
            f.read_exact(&mut full)?;
        }
        let (fmt, header, bucket_offset) = format::recognize(&full)?;

        let (storage, header) = match fmt {
            Format::Native => {
                let expected = expected_native_size(header.num_buckets);
                if full.len() as u64 != expected {
                    return Err(OsbfError::Format(format!(
                        "native image size {} does not match expected {} for {} buckets",
                        full.len(),
                        expected,
                        header.num_buckets
                    )));
                }
                // SAFETY: the fd stays open and the mapping is dropped
                // before the fd is closed; no other mapping of this file
                // is created within this process.
                if usage.is_writable() {
                    let mmap = unsafe { MmapOptions::new().len(full.len()).map_mut(&file)? };
                    (Storage::Mapped { mmap }, header)
                } else {
                    let mmap = unsafe { MmapOptions::new().len(full.len()).map(&file)? };
                    (Storage::MappedRo { mmap }, header)
                }
            }
            Format::LegacyV6 | Format::LegacyV5 { .. } => {
                let bucket_bytes = &full[bucket_offset..];
                let buckets = format::buckets_from_bytes(bucket_bytes, header.num_buckets);
                (Storage::Copied { buckets }, header)
            }
        };

        let n = header.num_buckets as usize;
        Ok(Class {
            path,
            usage,
            header,
            storage,
            flags: vec![0u8; n],
            file,
            d_trig: None,
            lock,
        })
    }

    pub fn num_buckets(&self) -> u32 {
        self.header.num_buckets
    }

    /// Cached displacement trigger, computed once per open class (§4.4).
    pub fn displacement_trigger(&mut self, config: &EngineConfig) -> u32 {
        if let Some(d) = self.d_trig {
            return d;
        }
        let d = config.displacement_trigger(self.header.num_buckets);
        self.d_trig = Some(d);
        d
    }

    /// Borrows the bucket array and flags buffer together as a
    /// [`BucketTable`], ready for find/update/insert. `Mapped`/`Copied`
    /// classes yield a writable view; a `MappedRo` class (a `ReadOnly`
    /// open of a native-format file, mapped `PROT_READ`-only) yields a
    /// read-only view that still supports lookups and flag updates but
    /// panics if a caller reaches `update`/`insert` through it.
    pub fn table(&mut self) -> BucketTable<'_> {
        let flags = &mut self.flags[..];
        match &mut self.storage {
            Storage::Mapped { mmap } => {
                let buckets = zerocopy::FromBytes::mut_from_bytes(&mut mmap[format::HEADER_LEN..])
                    .expect("mapped image was size-checked against header.num_buckets at open");
                BucketTable::new(buckets, flags)
            }
            Storage::MappedRo { mmap } => {
                let buckets = zerocopy::FromBytes::ref_from_bytes(&mmap[format::HEADER_LEN..])
                    .expect("mapped image was size-checked against header.num_buckets at open");
                BucketTable::new_ro(buckets, flags)
            }
            Storage::Copied { buckets } => BucketTable::new(buckets.as_mut_slice(), flags),
        }
    }

    pub fn clear_flags(&mut self) {
        self.flags.fill(0);
    }

    /// Rewrites the native header bytes (and, for `Copied` classes, keeps
    /// the in-memory header as the source of truth) after scalar counters
    /// change.
    fn sync_header_into_storage(&mut self) {
        if let Storage::Mapped { mmap } = &mut self.storage {
            format::write_native_header(&mut mmap[..format::HEADER_LEN], &self.header);
        }
    }

    /// Destroys the class per §4.6's close table, writing back if usage
    /// warrants it, then releases the lock and fd.
    #[instrument(skip(self), fields(path = %self.path.display(), usage = ?self.usage))]
    pub fn close(mut self) -> Result<()> {
        self.sync_header_into_storage();
        match (&self.storage, self.usage) {
            (Storage::Mapped { mmap }, usage) if usage.is_writable() => {
                mmap.flush()?;
            }
            (Storage::Mapped { .. }, _) => {}
            (Storage::MappedRo { .. }, _) => {}
            (Storage::Copied { buckets }, usage) if usage.is_writable() => {
                // A legacy (v5/v6) image was upconverted into memory at
                // open; a native header can never be spliced onto its
                // legacy-layout body, so any writable close rewrites the
                // whole file as native, the same as a fresh WriteAll close.
                let mut image =
                    vec![0u8; expected_native_size(self.header.num_buckets) as usize];
                format::write_native_header(&mut image, &self.header);
                for (i, b) in buckets.iter().enumerate() {
                    let off = format::HEADER_LEN + i * format::BUCKET_LEN;
                    image[off..off + format::BUCKET_LEN].copy_from_slice(zerocopy::IntoBytes::as_bytes(b));
                }
                std::fs::write(&self.path, &image)?;
            }
            (Storage::Copied { .. }, Usage::ReadOnly) => {}
        }

        if self.usage.is_writable() {
            lock::touch(&self.file)?;
        }
        if let Some(lock) = self.lock.take() {
            lock.release()?;
            debug!("released class file lock");
        }
        Ok(())
    }
}
