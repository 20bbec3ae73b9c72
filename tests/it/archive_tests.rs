use rstest::rstest;
use std::io::Cursor;
use zipcodec::zip::{Attributes, FLAG_DATA_DESCRIPTOR};
use zipcodec::{Archive, CompressionMode, CreateMode, InputSource, RemoveMode};

use crate::{method, sample_data, save, save_and_reopen};

#[rstest]
fn test_round_trip(
    #[values("store", "deflate", "lzma")] method_name: &str,
    #[values(false, true)] data_descriptor: bool,
    #[values(CompressionMode::Immediate, CompressionMode::Deferred)] mode: CompressionMode,
) {
    let data = sample_data(10_000);
    let mut archive = Archive::new();
    let entry = archive.add_entry("dir/data.bin").unwrap();
    entry.use_data_descriptor(data_descriptor);
    entry
        .set_compression_stream(data.clone(), method(method_name), mode)
        .unwrap();
    if mode == CompressionMode::Immediate {
        assert!(!entry.is_new_or_changed());
        assert_eq!(entry.read_to_vec().unwrap().unwrap(), data);
    } else {
        assert!(entry.is_new_or_changed());
        assert!(entry.read_to_vec().unwrap().is_none());
    }

    let mut reopened = save_and_reopen(&mut archive);
    let entry = &mut reopened[0];
    assert_eq!(entry.compression_method(), method(method_name).code());
    assert_eq!(entry.size(), data.len() as u64);
    assert_eq!(entry.crc32(), crc32fast::hash(&data));
    assert_eq!(entry.is_using_data_descriptor(), data_descriptor);
    assert!(!entry.is_password_protected());
    assert!(entry.can_extract());
    assert_eq!(entry.read_to_vec().unwrap().unwrap(), data);
    if method_name == "store" {
        assert_eq!(entry.compressed_size(), data.len() as u64);
    } else if method_name == "deflate" {
        assert!(entry.compressed_size() < data.len() as u64);
    }
}

#[rstest]
#[case::store("store", 10)]
#[case::deflate("deflate", 20)]
#[case::lzma("lzma", 63)]
fn test_version_needed_follows_method(#[case] method_name: &str, #[case] version: u16) {
    let mut archive = Archive::new();
    archive
        .add_entry("file")
        .unwrap()
        .set_compression_stream(b"x".to_vec(), method(method_name), CompressionMode::Deferred)
        .unwrap();
    let reopened = save_and_reopen(&mut archive);
    assert_eq!(reopened[0].version_needed_to_extract(), version);
    assert_eq!(reopened[0].version_made_by(), 63);
}

#[test]
fn test_remove_keeps_other_entries() {
    let mut archive = Archive::new();
    for (name, contents) in [("x", &b"first"[..]), ("y", &b"second"[..])] {
        archive
            .add_entry(name)
            .unwrap()
            .set_compression_stream(contents, method("deflate"), CompressionMode::Deferred)
            .unwrap();
    }
    let mut reopened = save_and_reopen(&mut archive);

    reopened.entry_mut("x").remove(RemoveMode::FailIfNotExists).unwrap();
    assert_eq!(reopened.len(), 1);

    let mut again = save_and_reopen(&mut reopened);
    assert_eq!(again.len(), 1);
    assert!(!again.entry("x").exists());
    let y = again.entry_mut("y").into_entry().unwrap();
    assert_eq!(y.read_to_vec().unwrap().unwrap(), b"second");
}

#[test]
fn test_unchanged_entries_are_copied_raw() {
    let data = sample_data(5_000);
    let mut archive = Archive::new();
    archive
        .add_entry("keep.bin")
        .unwrap()
        .set_compression_stream(data.clone(), method("deflate"), CompressionMode::Deferred)
        .unwrap();
    archive
        .add_entry("change.txt")
        .unwrap()
        .set_compression_stream(&b"old"[..], method("store"), CompressionMode::Deferred)
        .unwrap();

    let mut first = save_and_reopen(&mut archive);
    let mut original_raw = Vec::new();
    first[0]
        .raw_stream()
        .unwrap()
        .unwrap()
        .read_to_end(&mut original_raw)
        .unwrap();
    assert!(first[0].is_raw_stream_opened());

    first
        .entry_mut("change.txt")
        .get_mut()
        .unwrap()
        .set_compression_stream(&b"new contents"[..], method("lzma"), CompressionMode::Deferred)
        .unwrap();

    let mut second = save_and_reopen(&mut first);
    let mut copied_raw = Vec::new();
    second[0]
        .raw_stream()
        .unwrap()
        .unwrap()
        .read_to_end(&mut copied_raw)
        .unwrap();
    assert_eq!(copied_raw, original_raw);
    assert_eq!(second[0].read_to_vec().unwrap().unwrap(), data);

    let changed = &mut second[1];
    assert_eq!(changed.compression_method(), 14);
    assert_eq!(changed.read_to_vec().unwrap().unwrap(), b"new contents");
}

#[test]
fn test_deferred_seekable_input_saves_twice() {
    let mut archive = Archive::new();
    archive
        .add_entry("twice.txt")
        .unwrap()
        .set_compression_stream(b"same bytes".to_vec(), method("deflate"), CompressionMode::Deferred)
        .unwrap();

    let first = save(&mut archive);
    let second = save(&mut archive);
    assert_eq!(first, second);
}

#[test]
fn test_stream_input_with_data_descriptor() {
    let mut archive = Archive::new();
    let entry = archive.add_entry("piped.txt").unwrap();
    entry.use_data_descriptor(true);
    entry
        .set_compression_stream(
            InputSource::stream(Cursor::new(b"from a pipe".to_vec())),
            method("deflate"),
            CompressionMode::Deferred,
        )
        .unwrap();

    let mut reopened = save_and_reopen(&mut archive);
    assert_ne!(reopened[0].flags() & FLAG_DATA_DESCRIPTOR, 0);
    assert_eq!(reopened[0].read_to_vec().unwrap().unwrap(), b"from a pipe");
}

#[test]
fn test_stream_input_cannot_be_saved_twice() {
    let mut archive = Archive::new();
    archive
        .add_entry("piped.txt")
        .unwrap()
        .set_compression_stream(
            InputSource::stream(Cursor::new(b"from a pipe".to_vec())),
            method("store"),
            CompressionMode::Deferred,
        )
        .unwrap();

    let mut reopened = save_and_reopen(&mut archive);
    assert_eq!(reopened[0].read_to_vec().unwrap().unwrap(), b"from a pipe");

    let mut out = Cursor::new(Vec::new());
    assert!(matches!(
        archive.write_to(&mut out),
        Err(zipcodec::Error::InputConsumed(name)) if name == "piped.txt"
    ));
}

/// Overwrite every occurrence of `from` with the same-length `to`.
fn patch_bytes(bytes: &mut [u8], from: &[u8], to: &[u8]) -> usize {
    let mut count = 0;
    for i in 0..=bytes.len() - from.len() {
        if &bytes[i..i + from.len()] == from {
            bytes[i..i + from.len()].copy_from_slice(to);
            count += 1;
        }
    }
    count
}

#[test]
fn test_legacy_name_bytes_survive_save() {
    let mut archive = Archive::new();
    archive
        .add_entry("caf#.txt")
        .unwrap()
        .set_compression_stream(b"contents".to_vec(), method("store"), CompressionMode::Deferred)
        .unwrap();
    archive.set_comment("r#sum");
    let mut bytes = save(&mut archive);
    // 0x82 is an e-acute in code page 437 and not valid UTF-8 on its own
    assert_eq!(patch_bytes(&mut bytes, b"caf#.txt", b"caf\x82.txt"), 2);
    assert_eq!(patch_bytes(&mut bytes, b"r#sum", b"r\x82sum"), 1);

    let mut loaded = Archive::open_seekable(Cursor::new(bytes)).unwrap();
    assert_eq!(loaded[0].full_name(), "caf\u{fffd}.txt");
    assert_eq!(loaded.comment(), "r\u{fffd}sum");
    assert_eq!(loaded.find("caf\u{fffd}.txt"), Some(0));

    let mut resaved = save(&mut loaded);
    assert_eq!(patch_bytes(&mut resaved, b"caf\x82.txt", b"caf\x82.txt"), 2);
    assert_eq!(patch_bytes(&mut resaved, b"r\x82sum", b"r\x82sum"), 1);
    assert_eq!(patch_bytes(&mut resaved, "\u{fffd}".as_bytes(), "\u{fffd}".as_bytes()), 0);

    loaded[0].set_name("cafe.txt").unwrap();
    let renamed = save_and_reopen(&mut loaded);
    assert_eq!(renamed[0].full_name(), "cafe.txt");
}

#[test]
fn test_oversized_header_size_is_not_trusted_for_allocation() {
    let mut archive = Archive::new();
    archive
        .add_entry("small.bin")
        .unwrap()
        .set_compression_stream(b"tiny".to_vec(), method("store"), CompressionMode::Deferred)
        .unwrap();
    let mut bytes = save(&mut archive);
    let central = bytes
        .windows(4)
        .position(|w| w == b"PK\x01\x02")
        .unwrap();
    bytes[central + 24..central + 28].copy_from_slice(&u32::MAX.to_le_bytes());

    let mut loaded = Archive::open_seekable(Cursor::new(bytes)).unwrap();
    assert_eq!(loaded[0].size(), u32::MAX as u64);
    let data = loaded[0].read_to_vec().unwrap().unwrap();
    assert_eq!(data, b"tiny");
    assert!(data.capacity() <= 1 << 20);
}

#[test]
fn test_metadata_survives_save() {
    let mut archive = Archive::new();
    archive.set_comment("archive comment");
    let entry = archive.add_entry("notes.txt").unwrap();
    entry.set_comment("entry comment");
    entry.set_last_write_time(1_700_000_000);
    entry.set_attributes(Attributes::READ_ONLY);
    entry.set_unicode_name(true);

    let reopened = save_and_reopen(&mut archive);
    assert_eq!(reopened.comment(), "archive comment");
    let entry = &reopened[0];
    assert_eq!(entry.comment(), "entry comment");
    assert_eq!(entry.last_write_time(), Some(1_700_000_000));
    assert_eq!(entry.modified(), (2023, 11, 14, 22, 13, 20));
    assert!(entry.attributes().contains(Attributes::READ_ONLY | Attributes::ARCHIVE));
    assert!(entry.is_unicode_name());
}

#[test]
fn test_lookup_create_and_rename() {
    let mut archive = Archive::new();
    archive
        .entry_mut("folder\\report.txt")
        .create(CreateMode::FailIfExists)
        .unwrap()
        .set_name("summary.txt")
        .unwrap();
    assert_eq!(archive[0].full_name(), "folder/summary.txt");

    let reopened = save_and_reopen(&mut archive);
    assert!(reopened.entry("/folder/summary.txt").exists());
    assert!(!reopened.entry("folder/report.txt").exists());
}

#[test]
fn test_file_becomes_directory() {
    let mut archive = Archive::new();
    let entry = archive.add_entry("thing").unwrap();
    entry
        .set_compression_stream(b"data".to_vec(), method("store"), CompressionMode::Immediate)
        .unwrap();
    entry.set_attributes(Attributes::DIRECTORY);
    assert_eq!(entry.full_name(), "thing/");
    assert_eq!(entry.size(), 0);

    let reopened = save_and_reopen(&mut archive);
    assert!(reopened[0].is_directory());
    assert_eq!(reopened[0].compressed_size(), 0);
}

#[test]
fn test_not_a_zip() {
    let err = Archive::open_seekable(Cursor::new(b"definitely not an archive".to_vec())).unwrap_err();
    assert!(matches!(err, zipcodec::Error::MissingEndOfCentralDirectory));
}
