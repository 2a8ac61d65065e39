//! Owned byte storage for everything the message keeps unparsed.
//!
//! Raw header values and raw bodies are stored as [`RawRange`]s: a buffer id
//! plus an offset and a length into a [`BufferArena`] owned by the message.
//! A range is only ever resolved against the arena of the message holding it,
//! so cloning a message deep-copies the buffers its ranges still reference and
//! every range stays valid as is.

use bytes::Bytes;

/// `(buffer, offset, length)` into a [`BufferArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRange {
    buffer: u32,
    start: u32,
    len: u32,
}

impl RawRange {
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The first `len` bytes of this range.
    pub(crate) fn truncate(self, len: usize) -> Self {
        let len = u32::try_from(len).unwrap_or(u32::MAX).min(self.len);
        Self { len, ..self }
    }
}

/// A raw header line: the name as received and the value.
///
/// The name is `None` for values added through the typed dictionary; those
/// are written with the canonical header name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawField {
    pub(crate) name: Option<RawRange>,
    pub(crate) value: RawRange,
}

impl RawField {
    pub fn new(name: Option<RawRange>, value: RawRange) -> Self {
        Self { name, value }
    }

    pub fn value(&self) -> RawRange {
        self.value
    }
}

/// Immutable byte buffers owned by exactly one message.
#[derive(Debug, Default)]
pub struct BufferArena {
    buffers: Vec<Bytes>,
}

impl BufferArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `bytes` and returns the range covering all of it.
    pub fn push(&mut self, bytes: Bytes) -> RawRange {
        let len = bytes.len();
        let buffer = self.buffers.len();
        self.buffers.push(bytes);
        RawRange { buffer: to_u32(buffer), start: 0, len: to_u32(len) }
    }

    /// Copies `bytes` into a new buffer.
    pub fn push_slice(&mut self, bytes: &[u8]) -> RawRange {
        self.push(Bytes::copy_from_slice(bytes))
    }

    /// A sub-range of an already stored buffer.
    pub fn range(&self, buffer: RawRange, start: usize, end: usize) -> RawRange {
        debug_assert!(start <= end && end <= buffer.len());
        RawRange { buffer: buffer.buffer, start: buffer.start + to_u32(start), len: to_u32(end - start) }
    }

    /// Zero-copy view of the bytes behind `range`.
    pub fn get(&self, range: RawRange) -> Bytes {
        let start = range.start as usize;
        self.buffers[range.buffer as usize].slice(start..start + range.len())
    }

    pub fn slice(&self, range: RawRange) -> &[u8] {
        let start = range.start as usize;
        &self.buffers[range.buffer as usize][start..start + range.len()]
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Total bytes held by the arena.
    pub fn size(&self) -> usize {
        self.buffers.iter().map(Bytes::len).sum()
    }

    /// Deep copy holding only the buffers `live` points into.
    ///
    /// Buffer ids are kept, so the live ranges resolve unchanged against the
    /// copy. Dead buffers become empty and trailing ones are dropped.
    pub(crate) fn copy_live(&self, live: impl IntoIterator<Item = RawRange>) -> Self {
        let mut used = vec![false; self.buffers.len()];
        for range in live {
            if let Some(flag) = used.get_mut(range.buffer as usize) {
                *flag = true;
            }
        }
        let keep = used.iter().rposition(|flag| *flag).map_or(0, |last| last + 1);

        let buffers = self
            .buffers
            .iter()
            .zip(used)
            .take(keep)
            .map(|(buffer, used)| if used { Bytes::copy_from_slice(buffer) } else { Bytes::new() })
            .collect();
        Self { buffers }
    }
}

impl Clone for BufferArena {
    /// Copies every buffer, so the clone never shares storage with the source.
    fn clone(&self) -> Self {
        Self { buffers: self.buffers.iter().map(|buffer| Bytes::copy_from_slice(buffer)).collect() }
    }
}

#[inline]
fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_resolve_against_their_buffer() {
        let mut arena = BufferArena::new();
        let first = arena.push(Bytes::from_static(b"Call-ID: abc"));
        let second = arena.push_slice(b"body");

        let name = arena.range(first, 0, 7);
        let value = arena.range(first, 9, 12);
        assert_eq!(arena.slice(name), b"Call-ID");
        assert_eq!(arena.get(value), Bytes::from_static(b"abc"));
        assert_eq!(arena.slice(second), b"body");
        assert_eq!(arena.buffer_count(), 2);
        assert_eq!(arena.size(), 16);
    }

    #[test]
    fn nested_ranges_keep_the_offset() {
        let mut arena = BufferArena::new();
        let whole = arena.push_slice(b"0123456789");
        let middle = arena.range(whole, 2, 8);
        let inner = arena.range(middle, 1, 3);
        assert_eq!(arena.slice(inner), b"34");
        assert_eq!(arena.slice(middle.truncate(2)), b"23");
    }

    #[test]
    fn clone_does_not_share_storage() {
        let mut arena = BufferArena::new();
        let range = arena.push_slice(b"INVITE");
        let cloned = arena.clone();

        assert_eq!(cloned.slice(range), b"INVITE");
        assert_ne!(arena.slice(range).as_ptr(), cloned.slice(range).as_ptr());
    }

    #[test]
    fn copy_live_drops_dead_buffers() {
        let mut arena = BufferArena::new();
        let dead = arena.push_slice(b"replaced value");
        let live = arena.push_slice(b"Alice <sip:alice@atlanta.com>");
        let tail = arena.push_slice(b"old body");

        let compact = arena.copy_live([arena.range(live, 0, 5)]);
        assert_eq!(compact.buffer_count(), 2);
        assert_eq!(compact.size(), live.len());
        assert_eq!(compact.slice(live), b"Alice <sip:alice@atlanta.com>");
        assert!(compact.slice(dead.truncate(0)).is_empty());
        assert_eq!(arena.slice(tail), b"old body");

        assert_eq!(arena.copy_live([]).buffer_count(), 0);
    }
}
