//! Buffer allocation seam.
//!
//! The store obtains every scalar buffer it creates from a
//! [`BufferAllocator`] and hands every buffer it releases back to it,
//! including buffers that were attached by the caller.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Result, TensorError};

/// Source and sink of flat element buffers.
pub trait BufferAllocator<T> {
    /// Allocate a buffer of `len` elements, each set to `fill`.
    fn allocate(&self, len: usize, fill: T) -> Result<Vec<T>>;

    /// Take back a buffer that is no longer referenced.
    fn release(&self, buffer: Vec<T>);
}

/// Empty vector with room for exactly `len` items.
pub(crate) fn try_with_capacity<U>(len: usize) -> Result<Vec<U>> {
    let mut out = Vec::new();
    out.try_reserve_exact(len)
        .map_err(|_| TensorError::AllocationFailed { len })?;
    Ok(out)
}

fn try_filled<T: Clone>(len: usize, fill: T) -> Result<Vec<T>> {
    let mut buffer = try_with_capacity(len)?;
    buffer.resize(len, fill);
    Ok(buffer)
}

/// Allocator backed by the global heap.
#[derive(Debug, Clone, Copy, Default)]
pub struct Global;

impl<T: Clone> BufferAllocator<T> for Global {
    fn allocate(&self, len: usize, fill: T) -> Result<Vec<T>> {
        try_filled(len, fill)
    }

    fn release(&self, buffer: Vec<T>) {
        drop(buffer);
    }
}

/// Heap allocator that counts allocations and releases.
///
/// Used to check that every stored buffer is released exactly once.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    allocations: AtomicUsize,
    releases: AtomicUsize,
    allocated_elements: AtomicUsize,
    released_elements: AtomicUsize,
}

impl CountingAllocator {
    /// Create an allocator with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffers handed out.
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }

    /// Number of buffers taken back.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::Relaxed)
    }

    /// Buffers handed out and not yet taken back.
    pub fn live(&self) -> usize {
        self.allocations().saturating_sub(self.releases())
    }

    /// Total elements handed out.
    pub fn allocated_elements(&self) -> usize {
        self.allocated_elements.load(Ordering::Relaxed)
    }

    /// Total elements taken back.
    pub fn released_elements(&self) -> usize {
        self.released_elements.load(Ordering::Relaxed)
    }
}

impl<T: Clone> BufferAllocator<T> for CountingAllocator {
    fn allocate(&self, len: usize, fill: T) -> Result<Vec<T>> {
        let buffer = try_filled(len, fill)?;
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.allocated_elements.fetch_add(len, Ordering::Relaxed);
        Ok(buffer)
    }

    fn release(&self, buffer: Vec<T>) {
        self.releases.fetch_add(1, Ordering::Relaxed);
        self.released_elements
            .fetch_add(buffer.len(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_allocate() {
        let buf = BufferAllocator::<f64>::allocate(&Global, 4, 1.5).unwrap();
        assert_eq!(buf, vec![1.5; 4]);
        BufferAllocator::release(&Global, buf);
    }

    #[test]
    fn test_counting_allocator() {
        let alloc = CountingAllocator::new();
        let a = alloc.allocate(3, 0.0f64).unwrap();
        let b = alloc.allocate(5, 0.0f64).unwrap();
        assert_eq!(alloc.allocations(), 2);
        assert_eq!(alloc.live(), 2);
        assert_eq!(alloc.allocated_elements(), 8);
        alloc.release(a);
        alloc.release(b);
        assert_eq!(alloc.releases(), 2);
        assert_eq!(alloc.live(), 0);
        assert_eq!(alloc.released_elements(), 8);
    }

    #[test]
    fn test_try_with_capacity() {
        let v: Vec<u8> = try_with_capacity(16).unwrap();
        assert!(v.is_empty());
        assert!(v.capacity() >= 16);
        assert_eq!(
            try_with_capacity::<[u64; 4]>(usize::MAX / 2),
            Err(TensorError::AllocationFailed {
                len: usize::MAX / 2
            })
        );
    }

    #[test]
    fn test_allocation_failure() {
        let err = BufferAllocator::<u64>::allocate(&Global, usize::MAX, 0).unwrap_err();
        assert_eq!(err, TensorError::AllocationFailed { len: usize::MAX });
    }
}
