//! Builds legacy v5 and v6 class-file images by hand, per §6's byte
//! layouts, and verifies that `Class::open` recognizes and upconverts them
//! rather than mapping them natively.

use osbf::class::Class;
use osbf::config::{EngineConfig, Usage};
use osbf::format;
use tempfile::tempdir;

fn bucket_bytes(hash1: u32, hash2: u32, count: u32) -> [u8; 12] {
    let mut out = [0u8; 12];
    out[0..4].copy_from_slice(&hash1.to_le_bytes());
    out[4..8].copy_from_slice(&hash2.to_le_bytes());
    out[8..12].copy_from_slice(&count.to_le_bytes());
    out
}

/// v6 ("OSBF-FP-FN"): `{db_version=6, db_id=5, db_flags=0, num_buckets,
/// learnings, false_negatives, false_positives, classifications,
/// extra_learnings}`, immediately followed by buckets.
fn v6_image(num_buckets: u32, learnings: u32) -> Vec<u8> {
    let mut image = Vec::new();
    image.extend_from_slice(&6u32.to_le_bytes());
    image.extend_from_slice(&5u32.to_le_bytes()); // db_id
    image.extend_from_slice(&0u32.to_le_bytes()); // db_flags
    image.extend_from_slice(&num_buckets.to_le_bytes());
    image.extend_from_slice(&learnings.to_le_bytes());
    image.extend_from_slice(&0u32.to_le_bytes()); // false_negatives
    image.extend_from_slice(&0u32.to_le_bytes()); // false_positives
    image.extend_from_slice(&0u64.to_le_bytes()); // classifications
    image.extend_from_slice(&0u32.to_le_bytes()); // extra_learnings

    image.extend_from_slice(&bucket_bytes(123, 456, 7));
    for _ in 1..num_buckets {
        image.extend_from_slice(&bucket_bytes(0, 0, 0));
    }
    image
}

/// v5 ("OSBF-old"): `{version=5, db_flags, buckets_start, num_buckets,
/// learnings, mistakes, classifications, extra_learnings}`; buckets start
/// at byte `buckets_start * 12` from the start of the image.
fn v5_image(num_buckets: u32, learnings: u32) -> Vec<u8> {
    let buckets_start_buckets = format::HEADER_LEN as u32 / format::BUCKET_LEN as u32;
    let mut image = Vec::new();
    image.extend_from_slice(&5u32.to_le_bytes()); // version
    image.extend_from_slice(&0u32.to_le_bytes()); // db_flags
    image.extend_from_slice(&buckets_start_buckets.to_le_bytes());
    image.extend_from_slice(&num_buckets.to_le_bytes());
    image.extend_from_slice(&learnings.to_le_bytes());
    image.extend_from_slice(&0u32.to_le_bytes()); // mistakes
    image.extend_from_slice(&0u64.to_le_bytes()); // classifications
    image.extend_from_slice(&0u32.to_le_bytes()); // extra_learnings
    assert_eq!(image.len(), buckets_start_buckets as usize * format::BUCKET_LEN);

    image.extend_from_slice(&bucket_bytes(111, 222, 3));
    for _ in 1..num_buckets {
        image.extend_from_slice(&bucket_bytes(0, 0, 0));
    }
    image
}

#[test]
fn opens_a_legacy_v6_image_read_only_and_upconverts_its_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("legacy_v6.osbf");
    std::fs::write(&path, v6_image(10, 4)).unwrap();

    let config = EngineConfig::default();
    let mut class = Class::open(&path, Usage::ReadOnly, &config).unwrap();
    assert_eq!(class.header.learnings, 4);
    assert_eq!(class.num_buckets(), 10);

    let table = class.table();
    assert_eq!(table.find(123, 456), osbf::bucket::Find::Found(123 % 10));
    drop(table);
    class.close().unwrap();
}

#[test]
fn writeall_close_upconverts_a_v6_image_to_native_on_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("legacy_v6_rewrite.osbf");
    std::fs::write(&path, v6_image(20, 2)).unwrap();

    let config = EngineConfig::default();
    let class = Class::open(&path, Usage::WriteAll, &config).unwrap();
    class.close().unwrap();

    let on_disk = std::fs::read(&path).unwrap();
    let (fmt, header, _) = format::recognize(&on_disk).unwrap();
    assert_eq!(fmt, format::Format::Native);
    assert_eq!(header.num_buckets, 20);
    assert_eq!(header.learnings, 2);
}

#[test]
fn writeheader_close_of_a_legacy_image_also_rewrites_it_as_native() {
    // A native header can never be spliced onto a legacy-layout body (a v6
    // header is wider than the native one), so a WriteHeader close of a
    // Copied class must rewrite the whole file, not just its header bytes,
    // or the result is unopenable.
    let dir = tempdir().unwrap();
    let path = dir.path().join("legacy_v6_writeheader.osbf");
    std::fs::write(&path, v6_image(20, 2)).unwrap();

    let config = EngineConfig::default();
    let class = Class::open(&path, Usage::WriteHeader, &config).unwrap();
    class.close().unwrap();

    let on_disk = std::fs::read(&path).unwrap();
    assert_eq!(on_disk.len() as u64, format::expected_native_size(20));
    let (fmt, header, _) = format::recognize(&on_disk).unwrap();
    assert_eq!(fmt, format::Format::Native);
    assert_eq!(header.num_buckets, 20);
    assert_eq!(header.learnings, 2);

    Class::open(&path, Usage::ReadOnly, &config).unwrap();
}

#[test]
fn opens_a_legacy_v5_image_and_locates_buckets_past_the_indirection_offset() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("legacy_v5.osbf");
    std::fs::write(&path, v5_image(8, 1)).unwrap();

    let config = EngineConfig::default();
    let mut class = Class::open(&path, Usage::ReadOnly, &config).unwrap();
    assert_eq!(class.header.learnings, 1);
    assert_eq!(class.num_buckets(), 8);

    let table = class.table();
    assert_eq!(table.find(111, 222), osbf::bucket::Find::Found(111 % 8));
    drop(table);
    class.close().unwrap();
}
