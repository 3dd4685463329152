//! Graphics device interface
//!
//! The primitive operation set the frame pipeline drives. Backends stay
//! dumb: each method is one GPU action with no ordering logic of its own.
//! Ordering, state checking and fence bookkeeping all live in the
//! `renderer` components, so every backend gets them for free.

use std::time::Duration;

use crate::core::error::Result;
use crate::core::scene::SceneConfig;

/// Primitive GPU operations a backend must supply
pub trait GpuDevice {
    /// Number of swap-chain back buffers
    fn buffer_count(&self) -> usize;

    /// Whether presenting without vsync may tear
    fn tearing_supported(&self) -> bool;

    /// The back-buffer slot the presentation engine will render into next
    fn current_back_buffer_index(&self) -> usize;

    /// Ask the execution queue to signal `value` once prior work retires
    fn signal_fence(&mut self, value: u64) -> Result<()>;

    /// Latest fence value the device reports as complete
    fn completed_fence_value(&self) -> u64;

    /// Block until the device reports `value` complete, or `timeout` elapses
    ///
    /// Timeout and wait-primitive failure are both errors; the latter means
    /// the device is lost.
    fn wait_fence(&mut self, value: u64, timeout: Duration) -> Result<()>;

    /// Reset the slot's command allocator and the shared command list
    ///
    /// Callers must have verified the slot's previous submission retired.
    fn reset_frame_commands(&mut self, slot: usize) -> Result<()>;

    /// Record a barrier moving the slot's back buffer into render-target state
    fn record_transition_to_render_target(&mut self, slot: usize) -> Result<()>;

    /// Record a clear of the slot's back buffer to `color`
    fn record_clear(&mut self, slot: usize, color: [f32; 4]) -> Result<()>;

    /// Record one draw per brush and per entity in `scene`
    fn record_scene(&mut self, scene: &SceneConfig) -> Result<()>;

    /// Record a barrier moving the slot's back buffer back to presentable state
    fn record_transition_to_present(&mut self, slot: usize) -> Result<()>;

    /// Close the command list; no further recording until the next reset
    fn close_frame_commands(&mut self) -> Result<()>;

    /// Submit the closed command list to the execution queue
    fn submit_frame_commands(&mut self) -> Result<()>;

    /// Present the current back buffer
    ///
    /// `sync_interval` 0 presents immediately, 1 waits one vblank.
    /// `allow_tearing` is only legal with interval 0 on a supporting device.
    fn present(&mut self, sync_interval: u32, allow_tearing: bool) -> Result<()>;

    /// Drop every back-buffer reference ahead of a buffer resize
    fn release_frame_targets(&mut self);

    /// Resize the swap-chain buffers and recreate their views
    ///
    /// Requires a prior flush and `release_frame_targets`.
    fn resize_buffers(&mut self, width: u32, height: u32) -> Result<()>;
}
