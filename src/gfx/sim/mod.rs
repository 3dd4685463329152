//! Simulated graphics device
//!
//! A stand-in device with a virtual fence timeline and no GPU, window or
//! OS dependency. Every operation appends to an op log, so callers can
//! assert on exact command ordering. The presentation engine is modeled as
//! round-robin: the reported back-buffer index advances only on present.
//!
//! Used as the `sim` backend for headless runs and as the device under
//! every frame-pipeline unit test.

use std::collections::VecDeque;
use std::time::Duration;

use crate::core::error::{GraphicsError, Result};
use crate::core::scene::SceneConfig;
use crate::gfx::device::GpuDevice;

/// One recorded device operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimOp {
    /// Queue asked to signal a fence value
    Signal(u64),
    /// The virtual GPU retired a fence value
    Retire(u64),
    /// A slot's command allocator was reset
    ResetAllocator(usize),
    /// Barrier: slot's back buffer became a render target
    TransitionToRenderTarget(usize),
    /// Slot's back buffer cleared
    Clear(usize),
    /// One brush drawn
    DrawBrush,
    /// One point entity drawn
    DrawEntity,
    /// Barrier: slot's back buffer became presentable
    TransitionToPresent(usize),
    /// Command list closed
    CloseList,
    /// Command list submitted to the queue
    Execute,
    /// Back buffer presented
    Present { interval: u32, tearing: bool },
    /// All back-buffer references dropped
    ReleaseTargets,
    /// Buffers resized
    Resize(u32, u32),
}

/// Simulated device state
#[derive(Debug)]
pub struct SimDevice {
    buffer_count: usize,
    width: u32,
    height: u32,
    tearing: bool,

    // Virtual fence timeline
    signaled: u64,
    completed: u64,
    pending: VecDeque<u64>,
    completion_delay: usize,
    fail_next_wait: bool,

    current_index: usize,
    ops: Vec<SimOp>,
}

impl SimDevice {
    /// Create a simulated device
    ///
    /// Defaults: tearing supported, zero completion delay (signals retire
    /// instantly, like a GPU that never falls behind).
    pub fn new(buffer_count: usize, width: u32, height: u32) -> Self {
        tracing::info!(buffer_count, width, height, "Simulated device created");
        Self {
            buffer_count,
            width,
            height,
            tearing: true,
            signaled: 0,
            completed: 0,
            pending: VecDeque::new(),
            completion_delay: 0,
            fail_next_wait: false,
            current_index: 0,
            ops: Vec::new(),
        }
    }

    /// Let up to `delay` signaled values linger unretired
    ///
    /// With a non-zero delay the virtual GPU only retires work when a
    /// wait forces it to, which is how a slow GPU looks to the scheduler.
    pub fn set_completion_delay(&mut self, delay: usize) {
        self.completion_delay = delay;
        self.drain_ready();
    }

    /// Report tearing as unsupported (forces vsync-style presents)
    pub fn set_tearing_supported(&mut self, supported: bool) {
        self.tearing = supported;
    }

    /// Make the next fence wait fail as if the device were lost
    pub fn inject_wait_failure(&mut self) {
        self.fail_next_wait = true;
    }

    /// Recorded operations, oldest first
    pub fn ops(&self) -> &[SimOp] {
        &self.ops
    }

    /// Forget recorded operations
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Current simulated buffer dimensions
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Highest value queued for signaling
    pub fn signaled_value(&self) -> u64 {
        self.signaled
    }

    // Retire queued values until at most `completion_delay` remain pending
    fn drain_ready(&mut self) {
        while self.pending.len() > self.completion_delay {
            if let Some(value) = self.pending.pop_front() {
                self.completed = value;
                self.ops.push(SimOp::Retire(value));
            }
        }
    }

    // Retire queued values until `value` is complete
    fn drain_until(&mut self, value: u64) {
        while self.completed < value {
            if let Some(v) = self.pending.pop_front() {
                self.completed = v;
                self.ops.push(SimOp::Retire(v));
            } else {
                break;
            }
        }
    }
}

impl GpuDevice for SimDevice {
    fn buffer_count(&self) -> usize {
        self.buffer_count
    }

    fn tearing_supported(&self) -> bool {
        self.tearing
    }

    fn current_back_buffer_index(&self) -> usize {
        self.current_index
    }

    fn signal_fence(&mut self, value: u64) -> Result<()> {
        self.signaled = value;
        self.pending.push_back(value);
        self.ops.push(SimOp::Signal(value));
        self.drain_ready();
        Ok(())
    }

    fn completed_fence_value(&self) -> u64 {
        self.completed
    }

    fn wait_fence(&mut self, value: u64, _timeout: Duration) -> Result<()> {
        if self.fail_next_wait {
            self.fail_next_wait = false;
            return Err(GraphicsError::DeviceLost(
                "simulated wait failure".to_string(),
            )
            .into());
        }

        if self.completed >= value {
            return Ok(());
        }

        // A value that was never signaled can never arrive
        if value > self.signaled {
            return Err(GraphicsError::FenceTimeout(value).into());
        }

        self.drain_until(value);
        Ok(())
    }

    fn reset_frame_commands(&mut self, slot: usize) -> Result<()> {
        self.ops.push(SimOp::ResetAllocator(slot));
        Ok(())
    }

    fn record_transition_to_render_target(&mut self, slot: usize) -> Result<()> {
        self.ops.push(SimOp::TransitionToRenderTarget(slot));
        Ok(())
    }

    fn record_clear(&mut self, slot: usize, _color: [f32; 4]) -> Result<()> {
        self.ops.push(SimOp::Clear(slot));
        Ok(())
    }

    fn record_scene(&mut self, scene: &SceneConfig) -> Result<()> {
        for _ in &scene.brushes {
            self.ops.push(SimOp::DrawBrush);
        }
        for _ in &scene.entities {
            self.ops.push(SimOp::DrawEntity);
        }
        Ok(())
    }

    fn record_transition_to_present(&mut self, slot: usize) -> Result<()> {
        self.ops.push(SimOp::TransitionToPresent(slot));
        Ok(())
    }

    fn close_frame_commands(&mut self) -> Result<()> {
        self.ops.push(SimOp::CloseList);
        Ok(())
    }

    fn submit_frame_commands(&mut self) -> Result<()> {
        self.ops.push(SimOp::Execute);
        Ok(())
    }

    fn present(&mut self, sync_interval: u32, allow_tearing: bool) -> Result<()> {
        self.ops.push(SimOp::Present {
            interval: sync_interval,
            tearing: allow_tearing,
        });
        // The presentation engine hands out the next buffer round-robin
        self.current_index = (self.current_index + 1) % self.buffer_count;
        Ok(())
    }

    fn release_frame_targets(&mut self) {
        self.ops.push(SimOp::ReleaseTargets);
    }

    fn resize_buffers(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        // Resizing restarts the buffer rotation at the first slot
        self.current_index = 0;
        self.ops.push(SimOp::Resize(width, height));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait(dev: &mut SimDevice, value: u64) -> Result<()> {
        dev.wait_fence(value, Duration::from_secs(1))
    }

    #[test]
    fn test_zero_delay_retires_on_signal() {
        let mut dev = SimDevice::new(3, 800, 600);

        dev.signal_fence(1).unwrap();
        assert_eq!(dev.completed_fence_value(), 1);
        assert_eq!(dev.ops(), &[SimOp::Signal(1), SimOp::Retire(1)]);
    }

    #[test]
    fn test_delayed_completion_requires_wait() {
        let mut dev = SimDevice::new(3, 800, 600);
        dev.set_completion_delay(2);

        dev.signal_fence(1).unwrap();
        dev.signal_fence(2).unwrap();
        assert_eq!(dev.completed_fence_value(), 0);

        wait(&mut dev, 1).unwrap();
        assert_eq!(dev.completed_fence_value(), 1);

        wait(&mut dev, 2).unwrap();
        assert_eq!(dev.completed_fence_value(), 2);
    }

    #[test]
    fn test_wait_for_unsignaled_value_times_out() {
        let mut dev = SimDevice::new(2, 800, 600);

        let err = wait(&mut dev, 5).unwrap_err();
        assert!(err.to_string().contains("Timed out"));
    }

    #[test]
    fn test_index_advances_only_on_present() {
        let mut dev = SimDevice::new(3, 800, 600);
        assert_eq!(dev.current_back_buffer_index(), 0);

        dev.reset_frame_commands(0).unwrap();
        dev.close_frame_commands().unwrap();
        dev.submit_frame_commands().unwrap();
        assert_eq!(dev.current_back_buffer_index(), 0);

        dev.present(1, false).unwrap();
        assert_eq!(dev.current_back_buffer_index(), 1);

        dev.present(1, false).unwrap();
        dev.present(1, false).unwrap();
        assert_eq!(dev.current_back_buffer_index(), 0);
    }

    #[test]
    fn test_injected_wait_failure() {
        let mut dev = SimDevice::new(2, 800, 600);
        dev.signal_fence(1).unwrap();
        dev.inject_wait_failure();

        assert!(wait(&mut dev, 1).is_err());
        // The failure is one-shot
        assert!(wait(&mut dev, 1).is_ok());
    }
}
