//! Growable byte container shared by `IoChannel` and `PacketFramer`.
//!
//! All mutators are serialized by the buffer's own lock — no buffer is ever
//! concurrently consumed by two coroutines, but the lock still makes the
//! contract explicit rather than relying on external discipline.

use bytes::{Buf, BufMut, BytesMut};
use parking_lot::Mutex;

/// Ordered byte sequence with append/erase/stream-drain operations.
#[derive(Default)]
pub struct ByteBuffer {
    inner: Mutex<BytesMut>,
}

impl std::fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteBuffer").field("len", &self.len()).finish()
    }
}

impl ByteBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BytesMut::new()),
        }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(BytesMut::with_capacity(capacity)),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Appends a copy of `slice`.
    pub fn append(&self, slice: &[u8]) {
        self.inner.lock().put_slice(slice);
    }

    /// Appends `n` bytes read from `src`. Named after the original's
    /// `AppendRaw(ptr, n)`; Rust has no raw-pointer-plus-length callers so
    /// this takes a slice like [`ByteBuffer::append`], kept distinct to
    /// preserve the two-contract shape the rest of the system (and tests)
    /// expect.
    pub fn append_raw(&self, src: &[u8], n: usize) {
        let take = n.min(src.len());
        self.inner.lock().put_slice(&src[..take]);
    }

    /// Removes `[from, to)`. No-op unless `from < to <= len`.
    pub fn erase_range(&self, from: usize, to: usize) {
        let mut guard = self.inner.lock();
        if from >= to || to > guard.len() {
            return;
        }
        let mut remaining = BytesMut::with_capacity(guard.len() - (to - from));
        remaining.put_slice(&guard[..from]);
        remaining.put_slice(&guard[to..]);
        *guard = remaining;
    }

    /// Copies the whole buffer out without consuming it.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.inner.lock().to_vec()
    }

    /// Drains up to `n` bytes into `out`, preserving order. Returns the
    /// number of bytes written. Leaves the buffer untouched if `out` is
    /// too small to hold `n.min(len)` bytes.
    pub fn drain_to_stream(&self, out: &mut Vec<u8>, n: usize) -> usize {
        let mut guard = self.inner.lock();
        let take = n.min(guard.len());
        out.extend_from_slice(&guard[..take]);
        guard.advance(take);
        take
    }

    /// Appends all bytes currently in `input` (the "stream" side — in
    /// practice a just-completed read's staging buffer).
    pub fn fill_from_stream(&self, input: &[u8]) {
        self.append(input);
    }

    /// Empties the buffer.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}
