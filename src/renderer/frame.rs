//! Per-frame slot bookkeeping
//!
//! One `FrameSlot` per swap-chain back buffer. The slot index selects the
//! backend's command allocator and back-buffer resource; the fence value
//! records when the slot's last submission retires. Slots are created once
//! at initialization and live until full shutdown.

use crate::renderer::sync::FenceValue;

/// State for one in-flight frame
#[derive(Debug, Clone, Copy)]
pub struct FrameSlot {
    /// Slot index, matching the back buffer and allocator it governs
    index: usize,

    /// Fence value that must complete before the slot's allocator may be
    /// reset again. Starts at 0, which is always complete.
    fence_value: FenceValue,
}

impl FrameSlot {
    /// Create a fresh slot for back buffer `index`
    pub fn new(index: usize) -> Self {
        Self {
            index,
            fence_value: FenceValue::default(),
        }
    }

    /// The back-buffer index this slot governs
    pub fn index(&self) -> usize {
        self.index
    }

    /// Fence value of the slot's most recent submission
    pub fn fence_value(&self) -> FenceValue {
        self.fence_value
    }

    /// Record the fence value signaled after this slot's submission
    pub fn record_submission(&mut self, value: FenceValue) {
        self.fence_value = value;
    }

    /// Whether the slot's last submission has retired at `completed`
    pub fn is_retired(&self, completed: FenceValue) -> bool {
        completed >= self.fence_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_slot_is_retired() {
        let slot = FrameSlot::new(1);

        assert_eq!(slot.index(), 1);
        assert_eq!(slot.fence_value(), FenceValue::default());
        // Nothing submitted yet, so any completed value retires it
        assert!(slot.is_retired(FenceValue::new(0)));
    }

    #[test]
    fn test_submission_tracking() {
        let mut slot = FrameSlot::new(0);
        slot.record_submission(FenceValue::new(7));

        assert_eq!(slot.fence_value(), FenceValue::new(7));
        assert!(!slot.is_retired(FenceValue::new(6)));
        assert!(slot.is_retired(FenceValue::new(7)));
        assert!(slot.is_retired(FenceValue::new(9)));
    }
}
