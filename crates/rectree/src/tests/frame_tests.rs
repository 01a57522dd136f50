use super::helpers::{key, open_temp_file};
use crate::{
    data_len, init_file, post_record, read_header_at, read_value_block, verify_file_header,
    Cursor, TreeError, FILE_HEADER_LEN, HEADER_LEN,
};
use anyhow::Result;

#[test]
fn init_writes_the_reserved_literal() -> Result<()> {
    let (_dir, file) = open_temp_file("init.data");
    init_file(&file)?;

    let mut head = [0u8; 16];
    file.read_exact_at(0, &mut head)?;
    assert_eq!(&head, b"0000000000000000");
    assert_eq!(data_len(&file)?, 0);
    Ok(())
}

#[test]
fn verify_accepts_empty_and_valid_files() -> Result<()> {
    let (_dir, file) = open_temp_file("ok.data");
    verify_file_header(&file)?;

    init_file(&file)?;
    post_record(&file, &[&key(1)], 8)?;
    verify_file_header(&file)?;
    Ok(())
}

#[test]
fn verify_rejects_a_foreign_file() -> Result<()> {
    let (_dir, file) = open_temp_file("foreign.data");
    file.append(b"this is not a data file at all")?;

    assert!(matches!(
        verify_file_header(&file),
        Err(TreeError::IllegalRecordHeader(0))
    ));
    Ok(())
}

#[test]
fn value_block_carries_uniquifier_and_magic() -> Result<()> {
    let (_dir, file) = open_temp_file("block.data");
    init_file(&file)?;

    let header = post_record(&file, &[&key(9)], 8)?;
    let block = read_value_block(&file, &header)?;

    // key text + 16-hex uniquifier + ";EOB"
    assert_eq!(block.len(), 8 + 16 + 4);
    assert!(block.starts_with(key(9).as_bytes()));
    assert!(block.ends_with(b";EOB"));
    // First record: the data area was empty, so the uniquifier is zero.
    assert_eq!(&block[8..24], b"0000000000000000");
    Ok(())
}

#[test]
fn corrupt_block_trailer_is_rejected() -> Result<()> {
    let (_dir, file) = open_temp_file("badblock.data");
    init_file(&file)?;

    let header = post_record(&file, &[&key(1)], 8)?;
    let trailer_pos = header.address + HEADER_LEN as u64 + header.buffer_len - 4;
    file.write_all_at(trailer_pos, b"????")?;

    assert!(matches!(
        read_value_block(&file, &header),
        Err(TreeError::IllegalRecordLength(_))
    ));
    Ok(())
}

#[test]
fn primary_len_covers_the_key_prefix_only() -> Result<()> {
    let (_dir, file) = open_temp_file("plen.data");
    init_file(&file)?;

    // Two key fields and one payload field: the prefix is "AAAA;BBBB".
    let header = post_record(&file, &["AAAA", "BBBB", "payload"], 9)?;
    assert_eq!(header.primary_len, 9);

    let block = read_value_block(&file, &header)?;
    assert_eq!(&block[..9], b"AAAA;BBBB");
    assert_eq!(block[9], b';');
    Ok(())
}

#[test]
fn frames_are_contiguous_after_the_file_header() -> Result<()> {
    let (_dir, file) = open_temp_file("layout.data");
    init_file(&file)?;

    let first = post_record(&file, &[&key(1)], 8)?;
    let second = post_record(&file, &[&key(2)], 8)?;

    assert_eq!(first.address, FILE_HEADER_LEN);
    assert_eq!(
        second.address,
        first.address + HEADER_LEN as u64 + first.buffer_len + first.side_len
    );
    Ok(())
}

#[test]
fn num_records_counts_tombstones() -> Result<()> {
    let (_dir, file) = open_temp_file("count.data");
    init_file(&file)?;

    for n in 1..=4 {
        post_record(&file, &[&key(n)], 8)?;
    }
    let mut cursor = Cursor::new(1);
    cursor.first(&file, b"")?;
    cursor.delete(&file, false)?;

    let root = read_header_at(&file, FILE_HEADER_LEN)?;
    assert_eq!(root.num_records, 4);
    Ok(())
}
