use std::collections::VecDeque;
use crate::scope::ScopeError;
/// Rolling history of one channel that only accepts fixed-size blocks.
pub struct FifoAccumulator {
    samples: VecDeque<f32>,
    capacity: usize,
    block_size: usize,
}
impl FifoAccumulator {
    pub fn new(capacity: usize, block_size: usize) -> Result<Self, ScopeError> {
        if block_size == 0 || block_size > capacity {
            return Err(ScopeError::InvalidFifoGeometry {
                capacity,
                block_size,
            });
        }
        Ok(Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            block_size,
        })
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn block_size(&self) -> usize {
        self.block_size
    }
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
    /// Append one block, evicting the oldest samples once `capacity` would be exceeded.
    pub fn append(&mut self, block: &[f32]) -> Result<(), ScopeError> {
        if block.len() != self.block_size {
            return Err(ScopeError::BlockLengthMismatch {
                expected: self.block_size,
                actual: block.len(),
            });
        }
        let excess = (self.samples.len() + block.len()).saturating_sub(self.capacity);
        self.samples.drain(..excess);
        self.samples.extend(block.iter().copied());
        Ok(())
    }
    /// Oldest-first copy of the retained samples.
    pub fn contents(&self) -> Vec<f32> {
        self.samples.iter().copied().collect()
    }
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
