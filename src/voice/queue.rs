//! Bounded drop-oldest chunk queue shared between the capture thread and
//! the orchestrator

use std::collections::VecDeque;
use std::sync::Mutex;

use super::AudioChunk;

/// Default number of chunks held before the oldest is evicted
pub const QUEUE_CAPACITY: usize = 5;

/// Fixed-capacity ring of audio chunks
///
/// Pushing into a full queue evicts the oldest entry, so the producer never
/// waits on a slow consumer.
#[derive(Debug)]
pub struct ChunkQueue {
    inner: Mutex<VecDeque<AudioChunk>>,
    capacity: usize,
}

impl Default for ChunkQueue {
    fn default() -> Self {
        Self::new(QUEUE_CAPACITY)
    }
}

impl ChunkQueue {
    /// Create a queue holding at most `capacity` chunks (minimum 1)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Push a chunk, returning the evicted chunk if the queue was full
    pub fn push(&self, chunk: AudioChunk) -> Option<AudioChunk> {
        let Ok(mut queue) = self.inner.lock() else {
            return Some(chunk);
        };
        let evicted = if queue.len() >= self.capacity {
            queue.pop_front()
        } else {
            None
        };
        queue.push_back(chunk);
        drop(queue);

        if evicted.is_some() {
            tracing::debug!(capacity = self.capacity, "chunk queue full, dropped oldest");
        }
        evicted
    }

    /// Take the oldest chunk without blocking
    #[must_use]
    pub fn pop(&self) -> Option<AudioChunk> {
        self.inner.lock().ok().and_then(|mut q| q.pop_front())
    }

    /// Number of queued chunks
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map(|q| q.len()).unwrap_or_default()
    }

    /// Whether the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of chunks held
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every queued chunk
    pub fn clear(&self) {
        if let Ok(mut queue) = self.inner.lock() {
            queue.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(tag: u8) -> AudioChunk {
        AudioChunk::with_energy(vec![tag], 0.5)
    }

    #[test]
    fn pops_in_fifo_order() {
        let queue = ChunkQueue::default();
        queue.push(tagged(1));
        queue.push(tagged(2));
        assert_eq!(queue.pop().unwrap().pcm(), &[1]);
        assert_eq!(queue.pop().unwrap().pcm(), &[2]);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn sixth_push_evicts_oldest() {
        let queue = ChunkQueue::default();
        for tag in 1..=5 {
            assert!(queue.push(tagged(tag)).is_none());
        }
        let evicted = queue.push(tagged(6)).expect("full queue evicts");
        assert_eq!(evicted.pcm(), &[1]);
        assert_eq!(queue.len(), 5);

        let remaining: Vec<u8> = std::iter::from_fn(|| queue.pop())
            .map(|c| c.pcm()[0])
            .collect();
        assert_eq!(remaining, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn never_exceeds_capacity() {
        let queue = ChunkQueue::new(3);
        for tag in 0..50 {
            queue.push(tagged(tag));
            assert!(queue.len() <= queue.capacity());
        }
        assert_eq!(queue.pop().unwrap().pcm(), &[47]);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let queue = ChunkQueue::new(0);
        queue.push(tagged(1));
        queue.push(tagged(2));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop().unwrap().pcm(), &[2]);
    }
}
