//! Checked access to guest linear memory.
//!
//! Every byte transfer between a host import and the guest goes through the
//! functions here. A range that does not lie wholly inside the guest's
//! current memory bounds is a broken guest: the returned error is a trap
//! naming the field being transferred, which aborts the in-flight
//! `__guest_call`. No partial reads, no bounds relaxation.

use std::ops::Range;

use wasmtime::Error;

/// Copy `len` bytes at `offset` out of the guest memory.
pub(crate) fn read(data: &[u8], field: &str, offset: u32, len: u32) -> Result<Vec<u8>, Error> {
    let range = checked_range(data.len(), field, "reading", offset, len)?;
    Ok(data[range].to_vec())
}

/// Like [`read`], but interpret the bytes as text. Bytes are opaque: invalid
/// UTF-8 is replaced, never rejected.
pub(crate) fn read_string(data: &[u8], field: &str, offset: u32, len: u32) -> Result<String, Error> {
    let range = checked_range(data.len(), field, "reading", offset, len)?;
    Ok(String::from_utf8_lossy(&data[range]).into_owned())
}

/// Copy `bytes` into the guest memory at `offset`.
pub(crate) fn write(data: &mut [u8], field: &str, offset: u32, bytes: &[u8]) -> Result<(), Error> {
    let range = checked_range(data.len(), field, "writing", offset, bytes.len() as u32)?;
    data[range].copy_from_slice(bytes);
    Ok(())
}

fn checked_range(
    size: usize,
    field: &str,
    verb: &str,
    offset: u32,
    len: u32,
) -> Result<Range<usize>, Error> {
    let start = offset as usize;
    start
        .checked_add(len as usize)
        .filter(|end| *end <= size)
        .map(|end| start..end)
        .ok_or_else(|| Error::msg(format!("out of memory {verb} {field}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_in_bounds() {
        let data = vec![1u8, 2, 3, 4, 5];

        assert_eq!(read(&data, "payload", 1, 3).unwrap(), vec![2, 3, 4]);
        assert_eq!(read(&data, "payload", 0, 5).unwrap(), data);
        assert!(read(&data, "payload", 5, 0).unwrap().is_empty());
    }

    #[test]
    fn test_read_out_of_bounds() {
        let data = vec![0u8; 8];

        let err = read(&data, "payload", 4, 5).unwrap_err();
        assert!(err.to_string().contains("out of memory reading payload"));

        // offset + len overflowing u32 arithmetic must not wrap into range
        let err = read(&data, "binding", u32::MAX, 2).unwrap_err();
        assert!(err.to_string().contains("binding"));
    }

    #[test]
    fn test_read_string_lossy() {
        let data = b"ok\xff".to_vec();

        let text = read_string(&data, "msg", 0, 3).unwrap();
        assert_eq!(text, "ok\u{fffd}");
    }

    #[test]
    fn test_write_round_trip() {
        let mut data = vec![0u8; 8];

        write(&mut data, "hostResp", 2, b"abc").unwrap();
        assert_eq!(read(&data, "hostResp", 2, 3).unwrap(), b"abc");
    }

    #[test]
    fn test_write_out_of_bounds() {
        let mut data = vec![0u8; 4];

        let err = write(&mut data, "hostErr", 2, b"abc").unwrap_err();
        assert!(err.to_string().contains("out of memory writing hostErr"));
        // the target range must be untouched
        assert_eq!(data, vec![0u8; 4]);
    }
}
