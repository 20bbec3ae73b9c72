use rstest::rstest;
use std::io::Cursor;
use zipcodec::zip::FLAG_ENCRYPTED;
use zipcodec::{Archive, CompressionMode, Error, InputSource};

use crate::{method, sample_data, save_and_reopen};

const ENCRYPTION_HEADER_SIZE: u64 = 12;

fn encrypted_archive(
    method_name: &str,
    data: &[u8],
    data_descriptor: bool,
    mode: CompressionMode,
) -> Archive {
    let mut archive = Archive::new();
    let entry = archive.add_entry("secret.bin").unwrap();
    entry.set_password(Some("correct horse"));
    entry.use_data_descriptor(data_descriptor);
    entry
        .set_compression_stream(data.to_vec(), method(method_name), mode)
        .unwrap();
    archive
}

#[rstest]
fn test_encrypted_round_trip(
    #[values("store", "deflate", "lzma")] method_name: &str,
    #[values(false, true)] data_descriptor: bool,
    #[values(CompressionMode::Immediate, CompressionMode::Deferred)] mode: CompressionMode,
) {
    let data = sample_data(3_000);
    let mut archive = encrypted_archive(method_name, &data, data_descriptor, mode);

    let mut reopened = save_and_reopen(&mut archive);
    let entry = &mut reopened[0];
    assert!(entry.is_password_protected());
    assert_ne!(entry.flags() & FLAG_ENCRYPTED, 0);
    assert_eq!(entry.is_using_data_descriptor(), data_descriptor);
    assert_eq!(entry.size(), data.len() as u64);
    if method_name == "store" {
        assert_eq!(entry.compressed_size(), data.len() as u64 + ENCRYPTION_HEADER_SIZE);
    }

    assert!(entry.read_to_vec().unwrap().is_none());
    entry.set_password(Some("correct horse"));
    assert!(entry.is_password_protected());
    assert_eq!(entry.read_to_vec().unwrap().unwrap(), data);
}

#[test]
fn test_wrong_password_does_not_reveal_data() {
    let data = sample_data(1_000);
    let mut archive = encrypted_archive("store", &data, false, CompressionMode::Deferred);
    archive
        .add_entry("public.txt")
        .unwrap()
        .set_compression_stream(b"readable".to_vec(), method("deflate"), CompressionMode::Deferred)
        .unwrap();
    let mut reopened = save_and_reopen(&mut archive);

    let entry = &mut reopened[0];
    entry.set_password(Some("wrong"));
    // The check byte rejects a wrong password 255 times out of 256.
    match entry.read_to_vec().unwrap() {
        None => {}
        Some(decrypted) => assert_ne!(decrypted, data),
    }
    assert_eq!(reopened[1].read_to_vec().unwrap().unwrap(), b"readable");
}

#[test]
fn test_stream_is_cached_until_password_changes() {
    let mut archive = encrypted_archive("deflate", b"cached", true, CompressionMode::Deferred);
    let mut reopened = save_and_reopen(&mut archive);
    let entry = &mut reopened[0];

    entry.set_password(Some("correct horse"));
    assert!(entry.decompression_stream().unwrap().is_some());
    assert!(entry.is_decompression_stream_opened());

    entry.set_password(None);
    assert!(!entry.is_decompression_stream_opened());
    assert!(entry.decompression_stream().unwrap().is_none());
}

#[test]
fn test_password_on_stored_data_keeps_flag() {
    let mut archive = Archive::new();
    archive
        .add_entry("plain.txt")
        .unwrap()
        .set_compression_stream(b"not secret".to_vec(), method("store"), CompressionMode::Deferred)
        .unwrap();
    archive.add_entry("empty.txt").unwrap();

    let mut reopened = save_and_reopen(&mut archive);
    reopened[0].set_password(Some("late"));
    assert!(!reopened[0].is_password_protected());
    assert_eq!(reopened[0].read_to_vec().unwrap().unwrap(), b"not secret");

    reopened[1].set_password(Some("late"));
    assert!(reopened[1].is_password_protected());
}

#[test]
fn test_recompressing_loaded_entry_with_password() {
    let mut archive = Archive::new();
    archive
        .add_entry("doc.txt")
        .unwrap()
        .set_compression_stream(b"plain at first".to_vec(), method("deflate"), CompressionMode::Deferred)
        .unwrap();
    let mut reopened = save_and_reopen(&mut archive);

    let entry = &mut reopened[0];
    let contents = entry.read_to_vec().unwrap().unwrap();
    entry.set_password(Some("now locked"));
    entry
        .set_compression_stream(contents, method("deflate"), CompressionMode::Deferred)
        .unwrap();

    let mut again = save_and_reopen(&mut reopened);
    let entry = &mut again[0];
    assert!(entry.is_password_protected());
    entry.set_password(Some("now locked"));
    assert_eq!(entry.read_to_vec().unwrap().unwrap(), b"plain at first");
}

#[test]
fn test_encrypting_unseekable_input_needs_data_descriptor() {
    let mut archive = Archive::new();
    let entry = archive.add_entry("piped.bin").unwrap();
    entry.set_password(Some("pw"));
    let input = InputSource::stream(Cursor::new(b"from a pipe".to_vec()));
    assert!(matches!(
        entry.set_compression_stream(input, method("store"), CompressionMode::Immediate),
        Err(Error::UnseekableInput)
    ));
}
