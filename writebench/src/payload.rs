//! Deterministic pseudo-random upload payloads.

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use writebench_storage::PayloadStream;

/// Size of the buffer generated by [`RandomPayload::generate`].
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024 * 1024; // 64 MiB

/// An immutable buffer of seeded random bytes.
///
/// Arbitrarily large uploads are produced by streaming the buffer repeatedly, so the buffer is
/// generated once at startup and never touches the disk. Cloning is cheap and shares the buffer.
#[derive(Clone)]
pub struct RandomPayload {
    seed: u64,
    buffer: Bytes,
}

impl RandomPayload {
    /// Generates a buffer of [`DEFAULT_BUFFER_SIZE`] bytes from `seed`.
    pub fn generate(seed: u64) -> Self {
        Self::with_len(seed, DEFAULT_BUFFER_SIZE)
    }

    /// Generates a buffer of `len` bytes from `seed`.
    ///
    /// The same seed always yields the same bytes.
    pub fn with_len(seed: u64, len: usize) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut buffer = BytesMut::zeroed(len);
        rng.fill_bytes(&mut buffer);

        Self {
            seed,
            buffer: buffer.freeze(),
        }
    }

    /// The seed the buffer was generated from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The size of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns `length` bytes starting at `offset` without copying.
    ///
    /// # Panics
    ///
    /// Panics if the range exceeds the buffer. Reads never wrap around.
    pub fn read(&self, offset: usize, length: usize) -> Bytes {
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= self.buffer.len())
            .unwrap_or_else(|| {
                panic!(
                    "read of {length} bytes at offset {offset} exceeds payload of {} bytes",
                    self.buffer.len()
                )
            });

        self.buffer.slice(offset..end)
    }

    /// Streams `total` bytes by repeating the buffer, one chunk of at most the buffer size at a
    /// time.
    ///
    /// # Panics
    ///
    /// Panics if `total` is non-zero and the buffer is empty.
    pub fn stream(&self, total: u64) -> PayloadStream {
        assert!(
            total == 0 || !self.is_empty(),
            "cannot stream {total} bytes from an empty payload"
        );

        let payload = self.clone();
        let chunk_size = self.buffer.len() as u64;
        futures_util::stream::unfold(total, move |remaining| {
            let payload = payload.clone();
            async move {
                if remaining == 0 {
                    return None;
                }
                let length = remaining.min(chunk_size);
                let chunk = payload.read(0, length as usize);
                Some((Ok::<_, std::io::Error>(chunk), remaining - length))
            }
        })
        .boxed()
    }
}

impl std::fmt::Debug for RandomPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomPayload")
            .field("seed", &self.seed)
            .field("len", &self.buffer.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use futures_util::TryStreamExt;

    use super::*;

    #[test]
    fn same_seed_same_bytes() {
        let first = RandomPayload::with_len(42, 4096);
        let second = RandomPayload::with_len(42, 4096);
        let other = RandomPayload::with_len(43, 4096);

        assert_eq!(first.read(0, 4096), second.read(0, 4096));
        assert_ne!(first.read(0, 4096), other.read(0, 4096));
    }

    #[test]
    fn read_is_a_window_into_the_buffer() {
        let payload = RandomPayload::with_len(7, 100);

        let all = payload.read(0, 100);
        assert_eq!(payload.read(10, 5), all.slice(10..15));
        assert!(payload.read(100, 0).is_empty());
    }

    #[test]
    #[should_panic(expected = "exceeds payload")]
    fn read_does_not_wrap_around() {
        RandomPayload::with_len(7, 100).read(90, 11);
    }

    #[tokio::test]
    async fn stream_repeats_buffer() {
        let payload = RandomPayload::with_len(1, 10);

        let chunks: Vec<Bytes> = payload.stream(25).try_collect().await.unwrap();

        let lengths: Vec<_> = chunks.iter().map(Bytes::len).collect();
        assert_eq!(lengths, [10, 10, 5]);
        assert_eq!(chunks[0], payload.read(0, 10));
        assert_eq!(chunks[2], payload.read(0, 5));
    }

    #[tokio::test]
    async fn stream_of_nothing_is_empty() {
        let payload = RandomPayload::with_len(1, 0);
        let chunks: Vec<Bytes> = payload.stream(0).try_collect().await.unwrap();
        assert!(chunks.is_empty());
    }
}
