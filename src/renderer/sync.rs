//! Fence synchronization
//!
//! CPU-side fence bookkeeping for the frame pipeline. The manager owns the
//! monotonically increasing watermark; the device owns the completed value
//! the GPU has actually reached. Everything runs on the single render
//! thread, so the watermarks are plain integers.

use std::time::Duration;

use crate::core::error::Result;
use crate::gfx::device::GpuDevice;

/// A point on the fence timeline
///
/// Strictly increasing, never reused. Value 0 is the pre-submission state
/// and is always complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FenceValue(u64);

impl FenceValue {
    /// Wrap a raw fence value
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw value
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Fence watermark manager
///
/// Tracks the highest value handed to the queue for signaling. Pairing it
/// with a device yields the three core operations: signal, wait, flush.
#[derive(Debug, Default)]
pub struct FenceManager {
    current_value: u64,
}

impl FenceManager {
    /// Create a manager with the watermark at 0
    pub fn new() -> Self {
        Self { current_value: 0 }
    }

    /// Highest value requested so far
    pub fn current_value(&self) -> FenceValue {
        FenceValue(self.current_value)
    }

    /// Request a new signal covering all work submitted so far
    ///
    /// Increments the watermark, asks the queue to signal it, and returns
    /// the new value.
    pub fn signal<G: GpuDevice>(&mut self, gpu: &mut G) -> Result<FenceValue> {
        self.current_value += 1;
        gpu.signal_fence(self.current_value)?;
        Ok(FenceValue(self.current_value))
    }

    /// Whether the device has retired work up to `value`
    pub fn is_complete<G: GpuDevice>(&self, gpu: &G, value: FenceValue) -> bool {
        gpu.completed_fence_value() >= value.0
    }

    /// Block until `value` is retired or `timeout` elapses
    ///
    /// Returns immediately when the value is already complete. A timeout or
    /// wait-primitive failure propagates as a fatal error.
    pub fn wait<G: GpuDevice>(
        &self,
        gpu: &mut G,
        value: FenceValue,
        timeout: Duration,
    ) -> Result<()> {
        if self.is_complete(gpu, value) {
            return Ok(());
        }
        gpu.wait_fence(value.0, timeout)
    }

    /// Drain the queue: every value signaled so far is retired on return
    ///
    /// When the current watermark has already completed this is a no-op
    /// returning the existing watermark, so back-to-back flushes are cheap
    /// and yield the same value. Otherwise it signals a fresh watermark and
    /// waits for it.
    pub fn flush<G: GpuDevice>(&mut self, gpu: &mut G, timeout: Duration) -> Result<FenceValue> {
        let current = FenceValue(self.current_value);
        if self.is_complete(gpu, current) {
            return Ok(current);
        }

        let value = self.signal(gpu)?;
        self.wait(gpu, value, timeout)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::sim::{SimDevice, SimOp};

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[test]
    fn test_fence_value_ordering() {
        let a = FenceValue::new(1);
        let b = FenceValue::new(2);

        assert!(a < b);
        assert_eq!(a.value(), 1);
        assert_eq!(FenceValue::default().value(), 0);
    }

    #[test]
    fn test_signal_then_wait_round_trip() {
        let mut gpu = SimDevice::new(3, 800, 600);
        gpu.set_completion_delay(3);
        let mut fence = FenceManager::new();

        let value = fence.signal(&mut gpu).unwrap();
        assert_eq!(value.value(), 1);
        assert!(!fence.is_complete(&gpu, value));

        fence.wait(&mut gpu, value, TIMEOUT).unwrap();
        assert!(fence.is_complete(&gpu, value));
    }

    #[test]
    fn test_signal_values_strictly_increase() {
        let mut gpu = SimDevice::new(2, 800, 600);
        let mut fence = FenceManager::new();

        let a = fence.signal(&mut gpu).unwrap();
        let b = fence.signal(&mut gpu).unwrap();
        let c = fence.signal(&mut gpu).unwrap();

        assert!(a < b && b < c);
        assert_eq!(c, fence.current_value());
    }

    #[test]
    fn test_wait_on_complete_value_returns_immediately() {
        let mut gpu = SimDevice::new(2, 800, 600);
        let mut fence = FenceManager::new();

        let value = fence.signal(&mut gpu).unwrap();
        gpu.clear_ops();

        // Value already retired: the device wait must not even be reached
        gpu.inject_wait_failure();
        fence.wait(&mut gpu, value, TIMEOUT).unwrap();
        assert!(gpu.ops().is_empty());
    }

    #[test]
    fn test_flush_idempotent() {
        let mut gpu = SimDevice::new(3, 800, 600);
        gpu.set_completion_delay(3);
        let mut fence = FenceManager::new();

        fence.signal(&mut gpu).unwrap();
        fence.signal(&mut gpu).unwrap();

        let first = fence.flush(&mut gpu, TIMEOUT).unwrap();
        assert!(fence.is_complete(&gpu, first));

        // Second flush: same value, no new signal or retire activity
        let ops_before = gpu.ops().len();
        let second = fence.flush(&mut gpu, TIMEOUT).unwrap();
        assert_eq!(first, second);
        assert_eq!(gpu.ops().len(), ops_before);
    }

    #[test]
    fn test_flush_on_idle_queue_does_not_signal() {
        let mut gpu = SimDevice::new(2, 800, 600);
        let mut fence = FenceManager::new();

        let value = fence.flush(&mut gpu, TIMEOUT).unwrap();
        assert_eq!(value.value(), 0);
        assert!(!gpu.ops().iter().any(|op| matches!(op, SimOp::Signal(_))));
    }

    #[test]
    fn test_wait_failure_propagates() {
        let mut gpu = SimDevice::new(2, 800, 600);
        gpu.set_completion_delay(2);
        let mut fence = FenceManager::new();

        let value = fence.signal(&mut gpu).unwrap();
        gpu.inject_wait_failure();

        let err = fence.wait(&mut gpu, value, TIMEOUT).unwrap_err();
        assert!(err.to_string().contains("Device lost"));
    }

    #[test]
    fn test_wait_on_unsignaled_value_times_out() {
        let mut gpu = SimDevice::new(2, 800, 600);
        let fence = FenceManager::new();

        let err = fence
            .wait(&mut gpu, FenceValue::new(5), TIMEOUT)
            .unwrap_err();
        assert!(err.to_string().contains("Timed out"));
    }
}
