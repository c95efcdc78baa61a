//! Big-endian primitives for session request payloads.
//!
//! Wire format of a string: `[4-byte big-endian length][bytes]`.
//!
//! Every parser borrows its input and returns `Some((value, rest))` on
//! success. On failure it returns `None` and the caller's slice is left as it
//! was, so a rejected field never consumes bytes.

/// Read a length-prefixed string.
///
/// Fails if fewer than 4 bytes remain or the declared length runs past the
/// end of the buffer. Invalid UTF-8 is replaced rather than rejected; the
/// framing is what gets validated, not the content.
pub fn parse_string(buf: &[u8]) -> Option<(String, &[u8])> {
    let (len, rest) = parse_u32(buf)?;
    let len = usize::try_from(len).ok()?;
    if rest.len() < len {
        return None;
    }
    let (bytes, rest) = rest.split_at(len);
    Some((String::from_utf8_lossy(bytes).into_owned(), rest))
}

/// Read a big-endian `u32`.
pub fn parse_u32(buf: &[u8]) -> Option<(u32, &[u8])> {
    if buf.len() < 4 {
        return None;
    }
    let (head, rest) = buf.split_at(4);
    Some((u32::from_be_bytes([head[0], head[1], head[2], head[3]]), rest))
}

/// Read a one-byte boolean.
///
/// Only the exact byte `1` is `true`; `0` and every value `>= 2` read as
/// `false`. Callers must not assume the peer only ever sends 0 or 1.
pub fn parse_bool(buf: &[u8]) -> Option<(bool, &[u8])> {
    let (&first, rest) = buf.split_first()?;
    Some((first == 1, rest))
}

/// Append a length-prefixed string.
pub fn put_string(buf: &mut Vec<u8>, s: &str) {
    put_u32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

/// Append a big-endian `u32`.
pub fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_with_rest() {
        let mut buf = Vec::new();
        put_string(&mut buf, "xterm");
        buf.extend_from_slice(b"tail");
        let (s, rest) = parse_string(&buf).unwrap();
        assert_eq!(s, "xterm");
        assert_eq!(rest, b"tail");
    }

    #[test]
    fn empty_string() {
        let (s, rest) = parse_string(&[0, 0, 0, 0]).unwrap();
        assert!(s.is_empty());
        assert!(rest.is_empty());
    }

    #[test]
    fn string_short_prefix() {
        for len in 0..4 {
            assert!(parse_string(&[0u8; 3][..len]).is_none());
        }
    }

    #[test]
    fn string_declared_length_too_long() {
        // Claims 5 bytes, carries 4.
        let buf = [0, 0, 0, 5, b'a', b'b', b'c', b'd'];
        assert!(parse_string(&buf).is_none());
    }

    #[test]
    fn string_huge_declared_length() {
        let buf = [0xff, 0xff, 0xff, 0xff, b'a'];
        assert!(parse_string(&buf).is_none());
    }

    #[test]
    fn string_invalid_utf8_is_lossy() {
        let buf = [0, 0, 0, 2, 0xff, b'a'];
        let (s, _) = parse_string(&buf).unwrap();
        assert_eq!(s, "\u{fffd}a");
    }

    #[test]
    fn u32_big_endian() {
        let (v, rest) = parse_u32(&[0x01, 0x02, 0x03, 0x04, 0x05]).unwrap();
        assert_eq!(v, 0x0102_0304);
        assert_eq!(rest, &[0x05]);
    }

    #[test]
    fn u32_short_buffer() {
        assert!(parse_u32(&[]).is_none());
        assert!(parse_u32(&[1, 2, 3]).is_none());
    }

    #[test]
    fn bool_only_one_is_true() {
        assert_eq!(parse_bool(&[1]), Some((true, &[][..])));
        assert_eq!(parse_bool(&[0]), Some((false, &[][..])));
        assert_eq!(parse_bool(&[2]), Some((false, &[][..])));
        assert_eq!(parse_bool(&[255, 7]), Some((false, &[7][..])));
    }

    #[test]
    fn bool_empty_buffer() {
        assert!(parse_bool(&[]).is_none());
    }

    #[test]
    fn put_u32_layout() {
        let mut buf = Vec::new();
        put_u32(&mut buf, 6010);
        assert_eq!(buf, [0x00, 0x00, 0x17, 0x7a]);
    }
}
