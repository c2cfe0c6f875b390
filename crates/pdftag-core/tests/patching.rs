//! End-to-end patching: load, fix, write, reload, compare structure dumps

mod common;

use std::fs;

use common::{expected_structure, normalize, tagged_fixture};
use pdftag_core::{
    Document, EncryptionSettings, PdfTagError, ENCRYPTION_REVISION_AES_128,
    ENCRYPTION_REVISION_AES_256, ENCRYPTION_REVISION_AES_256U, PRINT_LOW,
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn patched(bytes: &[u8]) -> Document {
    let mut doc = Document::from_memory(bytes, None).unwrap();
    assert_eq!(doc.mark_paths_as_artifacts().unwrap(), 1);
    assert_eq!(doc.ensure_bbox().unwrap(), 2);
    doc
}

#[test]
fn test_file_roundtrip_matches_expected_structure() {
    let fixture = tagged_fixture();
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.pdf");
    let output = dir.path().join("output.pdf");
    fs::write(&input, &fixture.bytes).unwrap();

    let mut doc = Document::open(&input, None).unwrap();
    doc.mark_paths_as_artifacts().unwrap();
    doc.ensure_bbox().unwrap();
    doc.write(&output).unwrap();

    let reopened = Document::open(&output, None).unwrap();
    assert_eq!(
        normalize(&reopened.show_structure().unwrap()),
        normalize(&expected_structure(&fixture))
    );
}

#[test]
fn test_memory_roundtrip_matches_file_roundtrip() {
    let fixture = tagged_fixture();
    let dir = tempdir().unwrap();
    let output = dir.path().join("output.pdf");

    let doc = patched(&fixture.bytes);
    doc.write(&output).unwrap();
    let from_file = Document::open(&output, None).unwrap();

    let in_memory = patched(&fixture.bytes).to_memory().unwrap();
    let from_memory = Document::from_memory(&in_memory, None).unwrap();

    assert_eq!(
        from_memory.show_structure().unwrap(),
        from_file.show_structure().unwrap()
    );
    assert_eq!(fs::read(&output).unwrap(), in_memory);
}

#[test]
fn test_encrypted_output_reopens_with_either_password() {
    let fixture = tagged_fixture();
    let expected = normalize(&expected_structure(&fixture));

    for revision in [
        ENCRYPTION_REVISION_AES_128,
        ENCRYPTION_REVISION_AES_256,
        ENCRYPTION_REVISION_AES_256U,
    ] {
        let dir = tempdir().unwrap();
        let output = dir.path().join("protected.pdf");

        let mut doc = patched(&fixture.bytes);
        let settings = EncryptionSettings {
            print: PRINT_LOW,
            extract: false,
            assemble: false,
            annotate_and_form: false,
            form_filling: false,
            ..EncryptionSettings::new("userpass", "ownerpass").with_revision(revision)
        };
        doc.encrypt(settings).unwrap();
        doc.write(&output).unwrap();

        for password in ["userpass", "ownerpass"] {
            let reopened = Document::open(&output, Some(password)).unwrap();
            assert_eq!(
                normalize(&reopened.show_structure().unwrap()),
                expected,
                "revision {:?} with {}",
                revision,
                password
            );
        }
    }
}

#[test]
fn test_wrong_password_is_rejected_without_output() {
    let fixture = tagged_fixture();
    let dir = tempdir().unwrap();
    let protected = dir.path().join("protected.pdf");
    let output = dir.path().join("never.pdf");

    let mut doc = Document::from_memory(&fixture.bytes, None).unwrap();
    doc.encrypt(EncryptionSettings::new("userpass", "ownerpass"))
        .unwrap();
    doc.write(&protected).unwrap();

    let result = Document::open(&protected, Some("not-the-password"))
        .and_then(|doc| doc.write(&output));
    assert!(matches!(result, Err(PdfTagError::InvalidPassword)));
    assert!(!output.exists());
}

#[test]
fn test_ensure_bbox_is_idempotent() {
    let fixture = tagged_fixture();
    let mut doc = patched(&fixture.bytes);
    let once = doc.to_memory().unwrap();

    assert_eq!(doc.ensure_bbox().unwrap(), 0);
    assert_eq!(doc.mark_paths_as_artifacts().unwrap(), 0);
    assert_eq!(doc.to_memory().unwrap(), once);
}

#[test]
fn test_unencrypted_output_is_reproducible() {
    let fixture = tagged_fixture();
    let first = patched(&fixture.bytes).to_memory().unwrap();
    let second = patched(&fixture.bytes).to_memory().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_failed_write_leaves_destination_intact() {
    let fixture = tagged_fixture();
    let dir = tempdir().unwrap();
    // A non-empty directory cannot be replaced by a file
    let destination = dir.path().join("out.pdf");
    fs::create_dir(&destination).unwrap();
    fs::write(destination.join("keep.txt"), b"previous").unwrap();

    let doc = patched(&fixture.bytes);
    let result = doc.write(&destination);
    assert!(matches!(result, Err(PdfTagError::Io { .. })));

    assert_eq!(fs::read(destination.join("keep.txt")).unwrap(), b"previous");
    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("out.pdf")]);
}

#[test]
fn test_write_into_missing_directory_fails() {
    let fixture = tagged_fixture();
    let dir = tempdir().unwrap();
    let destination = dir.path().join("missing").join("out.pdf");

    let doc = Document::from_memory(&fixture.bytes, None).unwrap();
    assert!(matches!(
        doc.write(&destination),
        Err(PdfTagError::Io { .. })
    ));
    assert!(!destination.exists());
}
