//! Frame scheduler
//!
//! The state machine that drives one GPU frame per tick: wait for the
//! target slot to retire, record and submit the frame, present, signal,
//! advance to the slot the presentation engine reports next. Owns the
//! frame slots and the shared command recorder.
//!
//! # Lifecycle
//!
//! `Uninitialized -> Ready -> Rendering -> Presenting -> Ready` per tick,
//! then `-> Flushing -> Shutdown` exactly once at teardown. The flush runs
//! before any GPU object is released; there is no other legal teardown
//! order. A shutdown request only raises a flag; the host observes it at
//! the top of its loop, so a tick already past submission always finishes
//! its present and signal.

use std::fmt;
use std::time::Duration;

use crate::core::error::{Result, ToastRenderError};
use crate::core::scene::SceneConfig;
use crate::gfx::device::GpuDevice;
use crate::renderer::command::CommandRecorder;
use crate::renderer::frame::FrameSlot;
use crate::renderer::swapchain::SwapChain;
use crate::renderer::sync::FenceManager;

/// Ceiling on every GPU wait
///
/// A device silent for this long is treated as hung and surfaces as a
/// fatal fence timeout instead of freezing the loop.
pub const GPU_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Scheduler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created, no slots yet
    Uninitialized,
    /// Idle between ticks; rendering and resize are legal
    Ready,
    /// Mid-tick, before present
    Rendering,
    /// Presenting and signaling
    Presenting,
    /// Draining the queue for teardown
    Flushing,
    /// Torn down; no further work accepted
    Shutdown,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerState::Uninitialized => write!(f, "Uninitialized"),
            SchedulerState::Ready => write!(f, "Ready"),
            SchedulerState::Rendering => write!(f, "Rendering"),
            SchedulerState::Presenting => write!(f, "Presenting"),
            SchedulerState::Flushing => write!(f, "Flushing"),
            SchedulerState::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Frame pipeline orchestrator
pub struct FrameScheduler {
    state: SchedulerState,
    slots: Vec<FrameSlot>,
    current_index: usize,
    fence: FenceManager,
    recorder: CommandRecorder,
    shutdown_requested: bool,
    frame_count: u64,
}

impl FrameScheduler {
    /// Create an uninitialized scheduler
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Uninitialized,
            slots: Vec::new(),
            current_index: 0,
            fence: FenceManager::new(),
            recorder: CommandRecorder::new(),
            shutdown_requested: false,
            frame_count: 0,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Frames completed since initialization
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Build one slot per back buffer and enter `Ready`
    ///
    /// The starting index comes from the device: the presentation engine
    /// decides where the first frame lands.
    pub fn initialize<G: GpuDevice>(&mut self, gpu: &mut G) -> Result<()> {
        if self.state != SchedulerState::Uninitialized {
            return Err(ToastRenderError::Runtime(format!(
                "Cannot initialize scheduler from state {}",
                self.state
            )));
        }

        let buffer_count = gpu.buffer_count();
        self.slots = (0..buffer_count).map(FrameSlot::new).collect();
        self.current_index = gpu.current_back_buffer_index();
        self.state = SchedulerState::Ready;

        tracing::info!(buffer_count, "Frame scheduler initialized");
        Ok(())
    }

    /// Flag shutdown; observed by the host at the top of its next tick
    pub fn request_shutdown(&mut self) {
        if !self.shutdown_requested {
            tracing::info!("Shutdown requested");
        }
        self.shutdown_requested = true;
    }

    /// Whether teardown has been requested or already ran
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_requested
            || matches!(
                self.state,
                SchedulerState::Flushing | SchedulerState::Shutdown
            )
    }

    /// Run one full tick
    ///
    /// Rendering is only legal from `Ready`. Any error is fatal to the
    /// loop; the scheduler stays in its mid-tick state so the only legal
    /// follow-up is [`shutdown`](Self::shutdown).
    pub fn render_frame<G: GpuDevice>(
        &mut self,
        gpu: &mut G,
        swap_chain: &SwapChain,
        scene: Option<&SceneConfig>,
        clear_color: [f32; 4],
    ) -> Result<()> {
        if self.state != SchedulerState::Ready {
            return Err(ToastRenderError::Runtime(format!(
                "Cannot render from state {}",
                self.state
            )));
        }

        #[cfg(debug_assertions)]
        tracing::trace!(
            frame = self.frame_count,
            slot = self.current_index,
            "Begin frame"
        );

        self.wait_for_slot(gpu)?;
        self.record_and_submit(gpu, scene, clear_color)?;
        self.present_and_signal(gpu, swap_chain)
    }

    /// Resize the swap chain; legal only from `Ready`
    ///
    /// Flush first, drop every back-buffer reference, resize, then reseed
    /// every slot with the flush watermark; the old per-slot values refer
    /// to buffers that no longer exist.
    pub fn resize<G: GpuDevice>(
        &mut self,
        gpu: &mut G,
        swap_chain: &mut SwapChain,
        width: u32,
        height: u32,
    ) -> Result<()> {
        if self.state != SchedulerState::Ready {
            return Err(ToastRenderError::Runtime(format!(
                "Resize is only legal from Ready, not {}",
                self.state
            )));
        }

        let watermark = self.fence.flush(gpu, GPU_WAIT_TIMEOUT)?;
        gpu.release_frame_targets();
        swap_chain.resize(gpu, width, height)?;

        for slot in &mut self.slots {
            slot.record_submission(watermark);
        }
        self.current_index = swap_chain.current_index(gpu);

        tracing::debug!(
            width,
            height,
            watermark = watermark.value(),
            "Frame slots reseeded after resize"
        );
        Ok(())
    }

    /// Drain the queue and enter `Shutdown`
    ///
    /// Legal from any state, idempotent. Even when the flush fails (device
    /// lost) the scheduler still lands in `Shutdown`; the error propagates
    /// so the host knows the drain was incomplete.
    pub fn shutdown<G: GpuDevice>(&mut self, gpu: &mut G) -> Result<()> {
        if self.state == SchedulerState::Shutdown {
            return Ok(());
        }

        self.state = SchedulerState::Flushing;
        let result = self.fence.flush(gpu, GPU_WAIT_TIMEOUT);
        self.state = SchedulerState::Shutdown;

        match result {
            Ok(watermark) => {
                tracing::info!(
                    frames = self.frame_count,
                    watermark = watermark.value(),
                    "Frame scheduler shut down"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!("Shutdown flush failed: {}", e);
                Err(e)
            }
        }
    }

    // Phase 1: make the target slot's allocator safe to reset
    fn wait_for_slot<G: GpuDevice>(&mut self, gpu: &mut G) -> Result<()> {
        self.state = SchedulerState::Rendering;

        let slot = self.slots[self.current_index];
        if !self.fence.is_complete(gpu, slot.fence_value()) {
            #[cfg(debug_assertions)]
            tracing::trace!(
                slot = slot.index(),
                fence_value = slot.fence_value().value(),
                "Waiting for slot to retire"
            );
            self.fence.wait(gpu, slot.fence_value(), GPU_WAIT_TIMEOUT)?;
        }
        Ok(())
    }

    // Phase 2: record the frame into the slot and hand it to the queue
    fn record_and_submit<G: GpuDevice>(
        &mut self,
        gpu: &mut G,
        scene: Option<&SceneConfig>,
        clear_color: [f32; 4],
    ) -> Result<()> {
        let slot = self.slots[self.current_index];
        self.recorder.begin(gpu, &slot, &self.fence)?;
        self.recorder.record_frame(gpu, &slot, clear_color, scene)?;
        self.recorder.submit(gpu)
    }

    // Phase 3: present, signal, store the value, advance the index
    fn present_and_signal<G: GpuDevice>(
        &mut self,
        gpu: &mut G,
        swap_chain: &SwapChain,
    ) -> Result<()> {
        self.state = SchedulerState::Presenting;

        swap_chain.present(gpu)?;
        let value = self.fence.signal(gpu)?;
        self.slots[self.current_index].record_submission(value);

        // The presentation engine picks the next slot; never assume +1 mod N
        self.current_index = swap_chain.current_index(gpu);
        self.frame_count += 1;
        self.state = SchedulerState::Ready;
        Ok(())
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::sim::{SimDevice, SimOp};

    const CLEAR: [f32; 4] = [0.0, 0.5, 0.75, 1.0];

    fn ready_scheduler(
        buffer_count: usize,
        completion_delay: usize,
    ) -> (SimDevice, SwapChain, FrameScheduler) {
        let mut gpu = SimDevice::new(buffer_count, 800, 600);
        gpu.set_completion_delay(completion_delay);
        let swap_chain = SwapChain::new(&gpu, 800, 600, true);
        let mut scheduler = FrameScheduler::new();
        scheduler.initialize(&mut gpu).unwrap();
        (gpu, swap_chain, scheduler)
    }

    // Walk the op log and fail on any allocator reset that happened while
    // the slot's previous submission was still outstanding.
    fn assert_resets_after_retire(ops: &[SimOp], buffer_count: usize) -> Vec<usize> {
        let mut last_signal_for_slot: Vec<Option<u64>> = vec![None; buffer_count];
        let mut completed = 0u64;
        let mut active_slot = None;
        let mut resets = Vec::new();

        for op in ops {
            match *op {
                SimOp::Retire(value) => completed = value,
                SimOp::ResetAllocator(slot) => {
                    if let Some(pending) = last_signal_for_slot[slot] {
                        assert!(
                            completed >= pending,
                            "slot {} allocator reset at completed value {} \
                             while fence value {} was outstanding",
                            slot,
                            completed,
                            pending
                        );
                    }
                    active_slot = Some(slot);
                    resets.push(slot);
                }
                SimOp::Signal(value) => {
                    if let Some(slot) = active_slot.take() {
                        last_signal_for_slot[slot] = Some(value);
                    }
                }
                _ => {}
            }
        }
        resets
    }

    #[test]
    fn test_initialize_builds_slots() {
        let (gpu, _swap_chain, scheduler) = ready_scheduler(3, 0);

        assert_eq!(scheduler.state(), SchedulerState::Ready);
        assert_eq!(scheduler.slots.len(), 3);
        assert_eq!(scheduler.current_index, gpu.current_back_buffer_index());
    }

    #[test]
    fn test_initialize_twice_fails() {
        let (mut gpu, _swap_chain, mut scheduler) = ready_scheduler(2, 0);
        assert!(scheduler.initialize(&mut gpu).is_err());
    }

    #[test]
    fn test_render_before_initialize_fails() {
        let mut gpu = SimDevice::new(2, 800, 600);
        let swap_chain = SwapChain::new(&gpu, 800, 600, true);
        let mut scheduler = FrameScheduler::new();

        let err = scheduler
            .render_frame(&mut gpu, &swap_chain, None, CLEAR)
            .unwrap_err();
        assert!(err.to_string().contains("Uninitialized"));
    }

    #[test]
    fn test_triple_buffer_reset_ordering() {
        // Slow GPU: nothing retires unless a wait forces it
        let (mut gpu, swap_chain, mut scheduler) = ready_scheduler(3, 16);

        for _ in 0..4 {
            scheduler
                .render_frame(&mut gpu, &swap_chain, None, CLEAR)
                .unwrap();
        }

        let resets = assert_resets_after_retire(gpu.ops(), 3);
        assert_eq!(resets.len(), 4);
        for slot in 0..3 {
            assert!(resets.contains(&slot), "slot {} never reset", slot);
        }
        assert_eq!(scheduler.frame_count(), 4);
    }

    #[test]
    fn test_double_buffer_reset_ordering() {
        let (mut gpu, swap_chain, mut scheduler) = ready_scheduler(2, 16);

        for _ in 0..3 {
            scheduler
                .render_frame(&mut gpu, &swap_chain, None, CLEAR)
                .unwrap();
        }

        let resets = assert_resets_after_retire(gpu.ops(), 2);
        assert_eq!(resets, vec![0, 1, 0]);
    }

    #[test]
    fn test_index_advances_only_after_present() {
        let (mut gpu, swap_chain, mut scheduler) = ready_scheduler(3, 0);
        assert_eq!(scheduler.current_index, 0);

        scheduler.wait_for_slot(&mut gpu).unwrap();
        scheduler.record_and_submit(&mut gpu, None, CLEAR).unwrap();

        // Submitted but not presented: both views agree the index is unchanged
        assert_eq!(scheduler.current_index, 0);
        assert_eq!(swap_chain.current_index(&gpu), 0);

        scheduler.present_and_signal(&mut gpu, &swap_chain).unwrap();
        assert_eq!(scheduler.current_index, 1);
        assert_eq!(swap_chain.current_index(&gpu), 1);
    }

    #[test]
    fn test_shutdown_requested_mid_frame_completes_present() {
        let (mut gpu, swap_chain, mut scheduler) = ready_scheduler(3, 16);

        scheduler.wait_for_slot(&mut gpu).unwrap();
        scheduler.record_and_submit(&mut gpu, None, CLEAR).unwrap();

        // Host asks for shutdown between submit and present
        scheduler.request_shutdown();
        assert!(scheduler.is_shutting_down());

        scheduler.present_and_signal(&mut gpu, &swap_chain).unwrap();
        scheduler.shutdown(&mut gpu).unwrap();

        // The frame's present and signal landed before the teardown flush
        let ops = gpu.ops();
        let present_at = ops
            .iter()
            .position(|op| matches!(op, SimOp::Present { .. }))
            .unwrap();
        let signal_at = ops
            .iter()
            .position(|op| matches!(op, SimOp::Signal(1)))
            .unwrap();
        let last_retire = ops
            .iter()
            .rposition(|op| matches!(op, SimOp::Retire(_)))
            .unwrap();
        assert!(present_at < signal_at && signal_at < last_retire);
        assert_eq!(scheduler.state(), SchedulerState::Shutdown);
        assert_eq!(scheduler.frame_count(), 1);
    }

    #[test]
    fn test_shutdown_drains_outstanding_work() {
        let (mut gpu, swap_chain, mut scheduler) = ready_scheduler(3, 16);

        scheduler
            .render_frame(&mut gpu, &swap_chain, None, CLEAR)
            .unwrap();
        scheduler
            .render_frame(&mut gpu, &swap_chain, None, CLEAR)
            .unwrap();
        scheduler.shutdown(&mut gpu).unwrap();

        assert_eq!(gpu.completed_fence_value(), gpu.signaled_value());
        assert_eq!(scheduler.state(), SchedulerState::Shutdown);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (mut gpu, _swap_chain, mut scheduler) = ready_scheduler(2, 0);

        scheduler.shutdown(&mut gpu).unwrap();
        let ops_before = gpu.ops().len();

        scheduler.shutdown(&mut gpu).unwrap();
        assert_eq!(gpu.ops().len(), ops_before);
    }

    #[test]
    fn test_render_after_shutdown_fails() {
        let (mut gpu, swap_chain, mut scheduler) = ready_scheduler(2, 0);

        scheduler.shutdown(&mut gpu).unwrap();
        let err = scheduler
            .render_frame(&mut gpu, &swap_chain, None, CLEAR)
            .unwrap_err();
        assert!(err.to_string().contains("Shutdown"));
    }

    #[test]
    fn test_resize_flushes_and_reseeds_slots() {
        let (mut gpu, mut swap_chain, mut scheduler) = ready_scheduler(3, 16);

        scheduler
            .render_frame(&mut gpu, &swap_chain, None, CLEAR)
            .unwrap();
        scheduler
            .resize(&mut gpu, &mut swap_chain, 1024, 768)
            .unwrap();

        // Flush retires everything before targets are released and resized
        let ops = gpu.ops();
        let release_at = ops
            .iter()
            .position(|op| matches!(op, SimOp::ReleaseTargets))
            .unwrap();
        let resize_at = ops
            .iter()
            .position(|op| matches!(op, SimOp::Resize(1024, 768)))
            .unwrap();
        let last_retire = ops
            .iter()
            .rposition(|op| matches!(op, SimOp::Retire(_)))
            .unwrap();
        assert!(last_retire < release_at && release_at < resize_at);

        // Every slot reseeded with the (completed) flush watermark
        let watermark = scheduler.fence.current_value();
        for slot in &scheduler.slots {
            assert_eq!(slot.fence_value(), watermark);
        }
        assert!(scheduler.fence.is_complete(&gpu, watermark));
        assert_eq!(scheduler.current_index, gpu.current_back_buffer_index());
        assert_eq!(swap_chain.size(), (1024, 768));
    }

    #[test]
    fn test_resize_outside_ready_fails() {
        let (mut gpu, mut swap_chain, mut scheduler) = ready_scheduler(3, 0);

        scheduler.wait_for_slot(&mut gpu).unwrap();
        let err = scheduler
            .resize(&mut gpu, &mut swap_chain, 640, 480)
            .unwrap_err();
        assert!(err.to_string().contains("only legal from Ready"));
    }

    #[test]
    fn test_device_loss_aborts_tick() {
        let (mut gpu, swap_chain, mut scheduler) = ready_scheduler(2, 16);

        // Fill both slots so the next tick must wait
        scheduler
            .render_frame(&mut gpu, &swap_chain, None, CLEAR)
            .unwrap();
        scheduler
            .render_frame(&mut gpu, &swap_chain, None, CLEAR)
            .unwrap();

        gpu.inject_wait_failure();
        let err = scheduler
            .render_frame(&mut gpu, &swap_chain, None, CLEAR)
            .unwrap_err();

        assert!(err.to_string().contains("Device lost"));
        assert_eq!(scheduler.state(), SchedulerState::Rendering);
    }
}
