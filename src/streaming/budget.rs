//! Memory budget for decoded thumbnails
//!
//! Tracks bytes held by the image cache and provides a pressure metric to
//! guide eviction.

/// Byte budget tracker
#[derive(Clone, Debug)]
pub struct MemoryBudget {
    /// Maximum memory allowed (bytes)
    budget_bytes: usize,
    /// Currently used memory (bytes)
    used_bytes: usize,
}

impl MemoryBudget {
    /// Create a new memory budget
    ///
    /// # Arguments
    /// * `budget_bytes` - Maximum memory in bytes
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes, used_bytes: 0 }
    }

    pub fn add(&mut self, bytes: usize) {
        self.used_bytes = self.used_bytes.saturating_add(bytes);
    }

    pub fn remove(&mut self, bytes: usize) {
        self.used_bytes = self.used_bytes.saturating_sub(bytes);
    }

    pub fn used(&self) -> usize {
        self.used_bytes
    }

    /// Memory pressure (0.0 to 1.0+)
    ///
    /// Values above 1.0 indicate over-budget.
    pub fn pressure(&self) -> f32 {
        if self.budget_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f32 / self.budget_bytes as f32
    }

    /// True once usage exceeds the budget
    pub fn is_over(&self) -> bool {
        self.used_bytes > self.budget_bytes
    }
}
