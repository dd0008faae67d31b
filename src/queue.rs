//! Fixed-capacity FIFO of encoded wire bytes

use heapless::Deque;

use crate::error::{BusError, Result};

/// Default number of wire bytes a connection can hold
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Bounded FIFO backed by inline storage. Never allocates.
///
/// A push into a full queue is rejected and leaves the queued bytes
/// untouched; the caller decides whether to retry later or drop the data.
#[derive(Debug, Clone)]
pub struct FixedQueue<const N: usize = DEFAULT_QUEUE_CAPACITY> {
    items: Deque<u8, N>,
}

impl<const N: usize> FixedQueue<N> {
    /// Create an empty queue
    pub const fn new() -> Self {
        FixedQueue {
            items: Deque::new(),
        }
    }

    /// Append a byte at the back
    pub fn push(&mut self, byte: u8) -> Result<()> {
        self.items.push_back(byte).map_err(|rejected| {
            BusError::queue_overflow(format!(
                "queue full ({} bytes), rejected {:#04x}",
                N, rejected
            ))
        })
    }

    /// Remove and return the oldest byte
    pub fn pop(&mut self) -> Option<u8> {
        self.items.pop_front()
    }

    /// Number of queued bytes
    pub fn size(&self) -> usize {
        self.items.len()
    }

    /// Slots still available
    pub fn free(&self) -> usize {
        N - self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Drop everything queued
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<const N: usize> Default for FixedQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_order() -> Result<()> {
        let mut queue: FixedQueue = FixedQueue::new();
        queue.push(0x11)?;
        queue.push(0x22)?;
        queue.push(0x33)?;

        assert_eq!(queue.size(), 3);
        assert_eq!(queue.pop(), Some(0x11));
        assert_eq!(queue.pop(), Some(0x22));
        assert_eq!(queue.pop(), Some(0x33));
        assert_eq!(queue.pop(), None);
        Ok(())
    }

    #[test]
    fn test_overflow_keeps_existing_entries() -> Result<()> {
        let mut queue: FixedQueue<4> = FixedQueue::new();
        for byte in 1..=4 {
            queue.push(byte)?;
        }

        let err = queue.push(5).unwrap_err();
        assert!(matches!(err, BusError::QueueOverflow(_)));
        assert_eq!(queue.size(), 4);
        assert_eq!(queue.free(), 0);

        for expected in 1..=4 {
            assert_eq!(queue.pop(), Some(expected));
        }
        assert!(queue.is_empty());
        Ok(())
    }

    #[test]
    fn test_wrap_around_after_partial_drain() -> Result<()> {
        let mut queue: FixedQueue<4> = FixedQueue::new();
        queue.push(1)?;
        queue.push(2)?;
        queue.push(3)?;
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));

        queue.push(4)?;
        queue.push(5)?;
        queue.push(6)?;
        assert!(queue.push(7).is_err());

        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), Some(4));
        assert_eq!(queue.pop(), Some(5));
        assert_eq!(queue.pop(), Some(6));
        Ok(())
    }

    #[test]
    fn test_clear() -> Result<()> {
        let mut queue: FixedQueue = FixedQueue::default();
        queue.push(0xAA)?;
        queue.clear();
        assert_eq!(queue.size(), 0);
        assert_eq!(queue.free(), DEFAULT_QUEUE_CAPACITY);
        assert_eq!(queue.pop(), None);
        Ok(())
    }
}
