//! Size-bounded memory helpers shared by the receive reassembly buffers.
//!
//! Both the Firehose XML scanner and the HSUART flow-control ring keep a
//! single-writer byte buffer with a hard capacity. `BoundedBuffer` is the one
//! primitive both build on, so the `start <= end <= capacity` invariant only
//! has to be proven once.

use crate::error::FramingError;

/// A single-writer, capacity-bounded byte buffer with a `start..end` window
/// of valid data, used for both the Firehose 4 KiB XML buffer and the
/// HSUART 1 MiB pre-READY_TO_READ ring.
#[derive(Debug)]
pub struct BoundedBuffer {
    data: Vec<u8>,
    start: usize,
    end: usize,
}

impl BoundedBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity],
            start: 0,
            end: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.start..self.end]
    }

    /// Discards `n` bytes from the front of the buffer.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.len());
        self.start += n;
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }
    }

    /// Shifts any remaining bytes to the start of the backing storage so
    /// that subsequent appends have the full remaining capacity available.
    pub fn compact(&mut self) {
        if self.start == 0 {
            return;
        }
        self.data.copy_within(self.start..self.end, 0);
        self.end -= self.start;
        self.start = 0;
    }

    /// Appends `bytes` to the buffer, compacting first if needed.
    ///
    /// Returns [`FramingError::BufferOverflow`] if the data would not fit
    /// even after compaction, leaving the buffer unchanged.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), FramingError> {
        if bytes.len() > self.capacity() - self.len() {
            return Err(FramingError::BufferOverflow);
        }
        if bytes.len() > self.capacity() - self.end {
            self.compact();
        }
        self.data[self.end..self.end + bytes.len()].copy_from_slice(bytes);
        self.end += bytes.len();
        self.debug_check_invariant();
        Ok(())
    }

    fn debug_check_invariant(&self) {
        debug_assert!(self.start <= self.end);
        debug_assert!(self.end <= self.capacity());
    }
}

/// Bounded-copy helper: copies `src` into `dst`, returning the number of
/// bytes actually copied (`min(src.len(), dst.len())`) rather than panicking
/// on a length mismatch.
pub fn bounded_copy(dst: &mut [u8], src: &[u8]) -> usize {
    let n = dst.len().min(src.len());
    dst[..n].copy_from_slice(&src[..n]);
    n
}

/// Bounded-move helper: drains up to `max` bytes from the front of `src`
/// into a freshly allocated `Vec`, leaving the remainder in `src`.
pub fn bounded_take(src: &mut Vec<u8>, max: usize) -> Vec<u8> {
    let n = max.min(src.len());
    src.drain(..n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_consume_round_trip() {
        let mut buf = BoundedBuffer::new(8);
        buf.append(b"abcd").unwrap();
        assert_eq!(buf.as_slice(), b"abcd");
        buf.consume(2);
        assert_eq!(buf.as_slice(), b"cd");
        buf.append(b"efgh").unwrap();
        assert_eq!(buf.as_slice(), b"cdefgh");
    }

    #[test]
    fn append_overflow_is_rejected() {
        let mut buf = BoundedBuffer::new(4);
        buf.append(b"abcd").unwrap();
        assert!(matches!(
            buf.append(b"e"),
            Err(FramingError::BufferOverflow)
        ));
    }

    #[test]
    fn compact_reclaims_consumed_space() {
        let mut buf = BoundedBuffer::new(4);
        buf.append(b"ab").unwrap();
        buf.consume(2);
        buf.append(b"cd").unwrap();
        assert_eq!(buf.as_slice(), b"cd");
    }

    #[test]
    fn bounded_copy_truncates_to_shorter_side() {
        let mut dst = [0u8; 2];
        let n = bounded_copy(&mut dst, b"abcd");
        assert_eq!(n, 2);
        assert_eq!(&dst, b"ab");
    }

    #[test]
    fn bounded_take_drains_front() {
        let mut src = b"abcdef".to_vec();
        let taken = bounded_take(&mut src, 3);
        assert_eq!(taken, b"abc");
        assert_eq!(src, b"def");
    }
}
