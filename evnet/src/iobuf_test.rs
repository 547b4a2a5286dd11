use super::*;

#[test]
fn test_append_then_delete_prefix() {
    let mut buf = IoBuf::new();
    let data: Vec<u8> = (1..=10).collect();
    buf.append(&data).unwrap();
    assert_eq!(buf.len(), 10);

    assert_eq!(buf.delete(0, 4), 4);
    assert_eq!(buf.len(), 6);
    assert_eq!(buf.as_slice()[0], data[4]);
    assert_eq!(buf.as_slice(), &data[4..]);
}

#[test]
fn test_grows_in_chunks() {
    let mut buf = IoBuf::with_chunk_size(16);
    assert_eq!(buf.capacity(), 0);

    buf.append(b"hello").unwrap();
    assert!(buf.capacity() >= 16);

    buf.append(&[0u8; 20]).unwrap();
    assert_eq!(buf.len(), 25);
    assert!(buf.capacity() >= 32);
}

#[test]
fn test_delete_middle_keeps_order() {
    let mut buf = IoBuf::with_chunk_size(4);
    buf.append(b"abcdefgh").unwrap();
    assert_eq!(buf.delete(2, 3), 3);
    assert_eq!(buf.as_slice(), b"abfgh");
}

#[test]
fn test_delete_out_of_range() {
    let mut buf = IoBuf::new();
    buf.append(b"abc").unwrap();
    assert_eq!(buf.delete(2, 2), 0);
    assert_eq!(buf.delete(4, 0), 0);
    assert_eq!(buf.delete(usize::MAX, 2), 0);
    assert_eq!(buf.as_slice(), b"abc");
}

#[test]
fn test_drained_buffer_releases_storage() {
    let mut buf = IoBuf::new();
    buf.append(&[7u8; 100]).unwrap();
    assert!(buf.capacity() > 0);

    assert_eq!(buf.delete(0, 100), 100);
    assert!(buf.is_empty());
    assert_eq!(buf.capacity(), 0);
}

#[test]
fn test_resize() {
    let mut buf = IoBuf::with_chunk_size(10);
    buf.resize(25).unwrap();
    assert!(buf.capacity() >= 30);
    assert!(buf.is_empty());

    buf.append(b"0123456789").unwrap();
    assert_eq!(buf.resize(5), Err(Error::ErrBufferShort));
    assert_eq!(buf.as_slice(), b"0123456789");

    buf.clear();
    buf.resize(0).unwrap();
    assert_eq!(buf.capacity(), 0);
}

#[test]
fn test_append_huge_fails_closed() {
    let mut buf = IoBuf::with_chunk_size(1);
    buf.append(b"keep").unwrap();
    assert_eq!(buf.resize(usize::MAX), Err(Error::ErrOutOfMemory));
    assert_eq!(buf.as_slice(), b"keep");
}
