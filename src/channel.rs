//! Direction-tagged `(buffer, callback, buffer_size)` aggregate (`IOChannel`
//! in the original). A [`Session`](crate::session::Session) owns exactly two
//! of these: `channels[Input]` and `channels[Output]`.

use std::sync::Arc;

use crate::buffer::ByteBuffer;

/// Staging-buffer size hint used by `Receive` to pre-size its read, matching
/// `IOChannel::m_BufferSize`'s default of 512.
pub const DEFAULT_BUFFER_SIZE: usize = 512;

/// User-supplied per-direction callback: invoked after each successful
/// Receive (Input channel) or before each Send (Output channel) to drain or
/// refill `buffer`. Returns whether it did anything useful — mirrors the
/// original's `bool`-returning action functor.
pub type ChannelCallback = Arc<dyn Fn(&ByteBuffer) -> bool + Send + Sync>;

/// One direction's buffer, callback, and staging-size hint.
pub struct IoChannel {
    buffer: ByteBuffer,
    callback: Option<ChannelCallback>,
    buffer_size: usize,
}

impl Default for IoChannel {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl IoChannel {
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer: ByteBuffer::new(),
            callback: None,
            buffer_size,
        }
    }

    #[must_use]
    pub fn buffer(&self) -> &ByteBuffer {
        &self.buffer
    }

    #[must_use]
    pub const fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn set_buffer_size(&mut self, buffer_size: usize) {
        self.buffer_size = buffer_size;
    }

    /// Installs (or replaces) the per-direction callback.
    pub fn set_callback(&mut self, callback: impl Fn(&ByteBuffer) -> bool + Send + Sync + 'static) {
        self.callback = Some(Arc::new(callback));
    }

    #[must_use]
    pub fn callback_exists(&self) -> bool {
        self.callback.is_some()
    }

    /// Returns `false` if no callback is installed; otherwise calls it with
    /// the channel's buffer and returns its result.
    pub fn execute(&self) -> bool {
        match &self.callback {
            Some(callback) => callback(&self.buffer),
            None => false,
        }
    }

    pub fn clear(&self) {
        self.buffer.clear();
    }
}
