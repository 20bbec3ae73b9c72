use quickcheck::TestResult;
use quickcheck_macros::quickcheck;
use std::io::{Cursor, Seek};
use zipcodec::zip::{ExtraField, normalize_name};
use zipcodec::{Archive, CompressionMode};

use crate::{method, save_and_reopen};

#[quickcheck]
fn normalized_names_are_stable(name: String) -> TestResult {
    let Ok(normalized) = normalize_name(&name) else {
        return TestResult::discard();
    };
    TestResult::from_bool(
        normalize_name(&normalized).ok().as_deref() == Some(normalized.as_str())
            && !normalized.starts_with('/')
            && !normalized.contains("//")
            && !normalized.contains('\\'),
    )
}

#[quickcheck]
fn extra_fields_read_back(fields: Vec<(u16, Vec<u8>)>, junk: u8) -> bool {
    let fields: Vec<ExtraField> = fields
        .into_iter()
        .map(|(tag, data)| ExtraField::new(tag, data))
        .collect();
    let mut blob = Vec::new();
    ExtraField::write_all(&fields, &mut blob).unwrap();
    // Fewer than four trailing bytes cannot form another field
    blob.extend(std::iter::repeat_n(0xAB, usize::from(junk % 4)));

    let mut cursor = Cursor::new(blob.clone());
    let read = ExtraField::read_all(&mut cursor, blob.len() as u16).unwrap();
    read == fields && cursor.stream_position().unwrap() == blob.len() as u64
}

#[quickcheck]
fn archives_read_what_we_write(data: Vec<u8>, deflate: bool) {
    let method = method(if deflate { "deflate" } else { "store" });
    let mut archive = Archive::new();
    archive
        .add_entry("file.bin")
        .unwrap()
        .set_compression_stream(data.clone(), method, CompressionMode::Deferred)
        .unwrap();

    let mut reopened = save_and_reopen(&mut archive);
    let entry = &mut reopened[0];
    assert_eq!(entry.size(), data.len() as u64);
    assert_eq!(entry.crc32(), crc32fast::hash(&data));
    assert_eq!(entry.read_to_vec().unwrap().unwrap(), data);
}
