//! Component N: CSV interchange. Dump a class to the four-line-header
//! text format of §4.11/§6, and restore one back into a fresh native
//! class file. Framed as an external collaborator by the distilled
//! purpose statement, but implemented here since it is the only way to
//! exercise the round-trip law in §8 without a second on-disk format.

use std::io::{BufRead, Write};
use std::path::Path;

use zerocopy::byteorder::little_endian::U32 as LeU32;
use zerocopy::IntoBytes;

use crate::bucket::Bucket;
use crate::class::Class;
use crate::config::EngineConfig;
use crate::error::{OsbfError, Result};
use crate::format::{self, Header};

/// Writes `class`'s header and every bucket (occupied or not, in array
/// order) as CSV to `writer`.
pub fn dump(class: &mut Class, writer: &mut impl Write) -> Result<()> {
    let h = class.header;
    writeln!(writer, "{};0", h.db_version)?;
    writeln!(writer, "{};{}", h.num_buckets, h.learnings)?;
    writeln!(writer, "{};{}", h.false_negatives, h.false_positives)?;
    writeln!(writer, "{};{}", h.classifications, h.extra_learnings)?;

    let table = class.table();
    for b in table.buckets.iter() {
        writeln!(writer, "{};{};{}", b.hash1.get(), b.hash2.get(), b.count.get())?;
    }
    Ok(())
}

fn next_line<R: BufRead>(lines: &mut std::io::Lines<R>) -> Result<String> {
    lines
        .next()
        .ok_or_else(|| OsbfError::Format("unexpected end of CSV input".into()))?
        .map_err(OsbfError::Io)
}

fn parse_pair(line: &str) -> Result<(u64, u64)> {
    let mut parts = line.splitn(2, ';');
    let a = parts
        .next()
        .ok_or_else(|| OsbfError::Format("missing field in CSV header line".into()))?;
    let b = parts
        .next()
        .ok_or_else(|| OsbfError::Format("missing field in CSV header line".into()))?;
    let a: u64 = a
        .trim()
        .parse()
        .map_err(|_| OsbfError::Format(format!("not a number: {a}")))?;
    let b: u64 = b
        .trim()
        .parse()
        .map_err(|_| OsbfError::Format(format!("not a number: {b}")))?;
    Ok((a, b))
}

/// Parses a four-line CSV header plus `num_buckets` bucket lines from
/// `reader`, writes the result as a fresh native-format file at
/// `dst_path`, and opens it `WriteAll`.
pub fn restore<R: BufRead>(
    dst_path: impl AsRef<Path>,
    reader: R,
    config: &EngineConfig,
) -> Result<Class> {
    let mut lines = reader.lines();

    let (db_version, _unused) = parse_pair(&next_line(&mut lines)?)?;
    let (num_buckets, learnings) = parse_pair(&next_line(&mut lines)?)?;
    let (false_negatives, false_positives) = parse_pair(&next_line(&mut lines)?)?;
    let (classifications, extra_learnings) = parse_pair(&next_line(&mut lines)?)?;

    let header = Header {
        db_version: db_version as u32,
        num_buckets: num_buckets as u32,
        learnings: learnings as u32,
        false_negatives: false_negatives as u32,
        false_positives: false_positives as u32,
        classifications,
        extra_learnings: extra_learnings as u32,
    };

    let mut buckets = Vec::with_capacity(header.num_buckets as usize);
    for _ in 0..header.num_buckets {
        let line = next_line(&mut lines)?;
        let mut parts = line.splitn(3, ';');
        let field = |p: &mut std::str::SplitN<'_, char>| -> Result<u32> {
            p.next()
                .and_then(|s| s.trim().parse().ok())
                .ok_or_else(|| OsbfError::Format("malformed bucket line".into()))
        };
        let hash1 = field(&mut parts)?;
        let hash2 = field(&mut parts)?;
        let count = field(&mut parts)?;
        buckets.push(Bucket {
            hash1: LeU32::new(hash1),
            hash2: LeU32::new(hash2),
            count: LeU32::new(count),
        });
    }

    let mut image = vec![0u8; format::expected_native_size(header.num_buckets) as usize];
    format::write_native_header(&mut image, &header);
    for (i, b) in buckets.iter().enumerate() {
        let off = format::HEADER_LEN + i * format::BUCKET_LEN;
        image[off..off + format::BUCKET_LEN].copy_from_slice(b.as_bytes());
    }
    std::fs::write(dst_path.as_ref(), &image)?;

    Class::open(dst_path, crate::config::Usage::WriteAll, config)
}
