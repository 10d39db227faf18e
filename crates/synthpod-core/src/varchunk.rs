//! Single-producer/single-consumer byte ring with variable-sized records
//! (§4.1). Wait-free on both ends: `write_request`/`write_advance` never
//! block and never allocate; same for `read_request`/`read_advance`.
//!
//! Records are length-prefixed (`u32` header) and may wrap around the end
//! of the buffer; when a record would straddle the boundary, the writer
//! instead publishes a gap marker at the tail of the buffer and restarts
//! the record at offset 0, so a reader always sees one record as one
//! contiguous slice.

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

const HEADER_LEN: usize = std::mem::size_of::<u32>();
/// Sentinel record length marking "skip to the start of the buffer".
const GAP_MARKER: u32 = u32::MAX;

/// A lock-free SPSC ring of variable-sized byte records.
///
/// `capacity` must be a power of two. A single record's payload may be at
/// most `capacity / 2` bytes, matching the varchunk contract in §4.1.
pub struct Varchunk {
    data: Box<[u8]>,
    mask: usize,
    /// Next byte offset the producer will write to. Monotonically
    /// increasing (never wraps); the true ring index is `head & mask`.
    /// Written only by the producer; read (Acquire) by the consumer to
    /// discover newly published records.
    head: AtomicUsize,
    /// Next byte offset the consumer will read from. Same monotonic
    /// counter discipline as `head`, mirrored for the producer.
    tail: AtomicUsize,
    /// Producer-local: offset of the header of the record currently
    /// outstanding between `write_request` and `write_advance`.
    write_pending: Cell<Option<usize>>,
    /// Consumer-local: offset and length of the record currently
    /// outstanding between `read_request` and `read_advance`.
    read_pending: Cell<Option<(usize, usize)>>,
}

// SAFETY: all mutable access to `data` goes through raw pointer slices whose
// ranges are disjoint between producer and consumer by construction — the
// producer only ever writes `[head, head_after_reserved)` and the consumer
// only ever reads `[tail, tail_after_published)`, and a producer never
// advances `head` past the region the consumer still owns (`write_request`
// checks free space against the current `tail`). `Varchunk` is therefore
// `Sync` when shared as `&Varchunk` between exactly one producer thread and
// one consumer thread, which the single-producer/single-consumer contract
// requires callers to uphold.
unsafe impl Sync for Varchunk {}

impl Varchunk {
    /// Creates a new ring of the given capacity, rounded up to the next
    /// power of two (minimum 64 bytes).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(64).next_power_of_two();
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            write_pending: Cell::new(None),
            read_pending: Cell::new(None),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    fn free_space(&self, head: usize, tail: usize) -> usize {
        self.capacity() - (head - tail)
    }

    // SAFETY: caller guarantees `offset..offset+len` lies within a region
    // this thread currently owns exclusively (checked by the free-space
    // arithmetic in `write_request`/`read_request` before this is called).
    unsafe fn slice_mut(&self, offset: usize, len: usize) -> &mut [u8] {
        let base = self.data.as_ptr() as *mut u8;
        let start = offset & self.mask;
        debug_assert!(start + len <= self.capacity());
        unsafe { std::slice::from_raw_parts_mut(base.add(start), len) }
    }

    // SAFETY: same contract as `slice_mut`, immutable variant for readers.
    unsafe fn slice(&self, offset: usize, len: usize) -> &[u8] {
        let base = self.data.as_ptr();
        let start = offset & self.mask;
        debug_assert!(start + len <= self.capacity());
        unsafe { std::slice::from_raw_parts(base.add(start), len) }
    }

    fn write_header(&self, offset: usize, len: u32) {
        // SAFETY: header writes are bounded within the producer's reserved
        // region, validated by the caller before invoking this.
        let slice = unsafe { self.slice_mut(offset, HEADER_LEN) };
        slice.copy_from_slice(&len.to_ne_bytes());
    }

    fn read_header(&self, offset: usize) -> u32 {
        // SAFETY: header reads are bounded within a published record,
        // guaranteed present because `head >= offset + HEADER_LEN` was
        // already confirmed by the caller.
        let slice = unsafe { self.slice(offset, HEADER_LEN) };
        u32::from_ne_bytes(slice.try_into().expect("header is 4 bytes"))
    }

    /// Reserves `n` bytes for a new record. Returns `None` if there is not
    /// enough free space or `n` exceeds half the buffer's capacity — the
    /// caller must drop the message in that case (§4.1, §7 `NoSpace`).
    ///
    /// Must be called by the single producer only. A second call before
    /// [`write_advance`](Self::write_advance) panics — the contract is one
    /// outstanding reservation at a time.
    pub fn write_request(&self, n: usize) -> Option<&mut [u8]> {
        assert!(
            self.write_pending.get().is_none(),
            "write_request called while a previous reservation is outstanding"
        );
        if n > self.capacity() / 2 {
            return None;
        }

        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let need = HEADER_LEN + n;
        let offset_in_buf = head & self.mask;
        let contiguous = self.capacity() - offset_in_buf;

        if contiguous < need {
            // Record would straddle the end of the buffer: publish a gap
            // marker (if there's room for one) and restart at offset 0.
            let free = self.free_space(head, tail);
            if free < contiguous + need {
                return None;
            }
            if contiguous >= HEADER_LEN {
                self.write_header(head, GAP_MARKER);
            }
            let wrapped_head = head + contiguous;
            self.write_header(wrapped_head, n as u32);
            self.write_pending.set(Some(wrapped_head));
            // SAFETY: [wrapped_head+HEADER_LEN, wrapped_head+HEADER_LEN+n)
            // was just confirmed free via `free - contiguous >= need`.
            return Some(unsafe { self.slice_mut(wrapped_head + HEADER_LEN, n) });
        }

        let free = self.free_space(head, tail);
        if free < need {
            return None;
        }
        self.write_header(head, n as u32);
        self.write_pending.set(Some(head));
        // SAFETY: [head+HEADER_LEN, head+HEADER_LEN+n) was just confirmed
        // free via `free >= need`.
        Some(unsafe { self.slice_mut(head + HEADER_LEN, n) })
    }

    /// Publishes the record reserved by the last [`write_request`](Self::write_request).
    ///
    /// `n` may be less than the reserved size (the record shrinks to fit);
    /// it must not exceed it. Panics if no reservation is outstanding.
    pub fn write_advance(&self, n: usize) {
        let base = self
            .write_pending
            .take()
            .expect("write_advance called with no outstanding write_request");
        self.write_header(base, n as u32);
        self.head.store(base + HEADER_LEN + n, Ordering::Release);
    }

    /// Returns the next unread record, if any, as `(payload, len)`.
    ///
    /// Must be called by the single consumer only. A second call before
    /// [`read_advance`](Self::read_advance) panics.
    pub fn read_request(&self) -> Option<(&[u8], usize)> {
        assert!(
            self.read_pending.get().is_none(),
            "read_request called while a previous record is outstanding"
        );

        let mut tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }

        let mut len = self.read_header(tail);
        if len == GAP_MARKER {
            // Skip to the start of the buffer; the real record immediately
            // follows, published atomically by the same `write_advance`
            // that published the gap (both precede the same `head` store).
            let offset_in_buf = tail & self.mask;
            tail += self.capacity() - offset_in_buf;
            len = self.read_header(tail);
        }

        self.read_pending.set(Some((tail, len as usize)));
        // SAFETY: [tail+HEADER_LEN, tail+HEADER_LEN+len) was published by
        // the producer before the `head` store we just Acquire-loaded.
        let slice = unsafe { self.slice(tail + HEADER_LEN, len as usize) };
        Some((slice, len as usize))
    }

    /// Releases the record returned by the last [`read_request`](Self::read_request).
    pub fn read_advance(&self) {
        let (base, len) = self
            .read_pending
            .take()
            .expect("read_advance called with no outstanding read_request");
        self.tail.store(base + HEADER_LEN + len, Ordering::Release);
    }

    /// True if no record is currently available to read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Relaxed)
    }
}
