mod archive_tests;
mod encryption_tests;
mod property_tests;

use std::io::Cursor;
use std::sync::Arc;
use zipcodec::{Archive, CompressionMethod, CompressionMode, MethodRegistry};

/// Save `archive` into a fresh buffer and parse that buffer back.
pub fn save_and_reopen(archive: &mut Archive) -> Archive {
    Archive::open_seekable(Cursor::new(save(archive))).unwrap()
}

pub fn save(archive: &mut Archive) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    archive.write_to(&mut out).unwrap();
    out.into_inner()
}

pub fn method(name: &str) -> Arc<dyn CompressionMethod> {
    MethodRegistry::shared().by_name(name).unwrap()
}

/// Compressible but not trivially repetitive sample data.
pub fn sample_data(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| b"the quick brown fox jumps over the lazy dog "[i % 44] ^ (i / 997) as u8)
        .collect()
}

#[test]
fn test_single_file_in_subdirectory() {
    let mut archive = Archive::new();
    archive
        .add_entry("a/b.txt")
        .unwrap()
        .set_compression_stream(b"hello".to_vec(), method("store"), CompressionMode::Deferred)
        .unwrap();

    let mut reopened = save_and_reopen(&mut archive);
    assert_eq!(reopened.len(), 1);
    let entry = &mut reopened[0];
    assert_eq!(entry.full_name(), "a/b.txt");
    assert_eq!(entry.name(), "b.txt");
    assert_eq!(entry.size(), 5);
    assert_eq!(entry.crc32(), crc32fast::hash(b"hello"));
    assert_eq!(entry.compression_method(), 0);
    assert!(!entry.is_directory());
    assert_eq!(entry.read_to_vec().unwrap().unwrap(), b"hello");
}

#[test]
fn test_directory_entry() {
    let mut archive = Archive::new();
    let dir = archive.add_entry("docs/").unwrap();
    assert!(dir.is_directory());
    assert!(matches!(
        dir.set_compression_stream(b"data".to_vec(), method("store"), CompressionMode::Immediate),
        Err(zipcodec::Error::DirectoryData(_))
    ));

    let mut reopened = save_and_reopen(&mut archive);
    let entry = &mut reopened[0];
    assert_eq!(entry.full_name(), "docs/");
    assert_eq!(entry.name(), "docs");
    assert!(entry.is_directory());
    assert_eq!((entry.crc32(), entry.size(), entry.compressed_size()), (0, 0, 0));
    assert_eq!(entry.read_to_vec().unwrap().unwrap(), b"");
}

#[test]
fn test_end_record_signature_inside_stored_data() {
    let mut data = b"leading bytes ".to_vec();
    data.extend_from_slice(b"PK\x05\x06");
    data.extend_from_slice(&[0u8; 40]);
    let mut archive = Archive::new();
    archive
        .add_entry("tricky.bin")
        .unwrap()
        .set_compression_stream(data.clone(), method("store"), CompressionMode::Deferred)
        .unwrap();
    archive.set_comment("real end");

    let mut reopened = save_and_reopen(&mut archive);
    assert_eq!(reopened.comment(), "real end");
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened[0].read_to_vec().unwrap().unwrap(), data);
}
