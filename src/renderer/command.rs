//! Command recording
//!
//! One reusable recorder drives the shared command list through its
//! lifecycle. The state machine guarantees the two recording rules the
//! GPU cares about: a slot's allocator is only reset after its previous
//! submission retired, and at most one recording is open at a time.
//!
//! # States
//!
//! - **Initial**: nothing recorded, ready for `begin`
//! - **Recording**: a frame is being recorded
//! - **Executable**: recording closed, ready for `submit`

use std::fmt;

use crate::core::error::{GraphicsError, Result};
use crate::core::scene::SceneConfig;
use crate::gfx::device::GpuDevice;
use crate::renderer::frame::FrameSlot;
use crate::renderer::sync::FenceManager;

/// Recorder lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// No open recording
    Initial,
    /// A frame is being recorded
    Recording,
    /// Recording closed, awaiting submission
    Executable,
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderState::Initial => write!(f, "Initial"),
            RecorderState::Recording => write!(f, "Recording"),
            RecorderState::Executable => write!(f, "Executable"),
        }
    }
}

/// The single shared frame recorder
#[derive(Debug)]
pub struct CommandRecorder {
    state: RecorderState,
}

impl CommandRecorder {
    /// Create a recorder in the Initial state
    pub fn new() -> Self {
        Self {
            state: RecorderState::Initial,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Open a recording against `slot`
    ///
    /// Fails when another recording is open, or when the slot's previous
    /// submission has not retired; the caller must have waited first.
    /// On success the slot's allocator and the shared list are reset.
    pub fn begin<G: GpuDevice>(
        &mut self,
        gpu: &mut G,
        slot: &FrameSlot,
        fence: &FenceManager,
    ) -> Result<()> {
        if self.state == RecorderState::Recording {
            return Err(GraphicsError::CommandExecution(format!(
                "Invalid state for begin: {}",
                self.state
            ))
            .into());
        }

        if !fence.is_complete(gpu, slot.fence_value()) {
            return Err(GraphicsError::CommandExecution(format!(
                "Frame slot {} still in flight at fence value {}",
                slot.index(),
                slot.fence_value().value()
            ))
            .into());
        }

        gpu.reset_frame_commands(slot.index())?;
        self.state = RecorderState::Recording;
        Ok(())
    }

    /// Record one complete frame into the open recording, then close it
    ///
    /// The recorded sequence is fixed: transition the slot's back buffer to
    /// render-target state, clear it, draw the scene when one is present,
    /// transition back to presentable, close.
    pub fn record_frame<G: GpuDevice>(
        &mut self,
        gpu: &mut G,
        slot: &FrameSlot,
        clear_color: [f32; 4],
        scene: Option<&SceneConfig>,
    ) -> Result<()> {
        if self.state != RecorderState::Recording {
            return Err(GraphicsError::CommandExecution(format!(
                "Invalid state for record_frame: {}",
                self.state
            ))
            .into());
        }

        gpu.record_transition_to_render_target(slot.index())?;
        gpu.record_clear(slot.index(), clear_color)?;
        if let Some(scene) = scene {
            gpu.record_scene(scene)?;
        }
        gpu.record_transition_to_present(slot.index())?;
        gpu.close_frame_commands()?;

        self.state = RecorderState::Executable;
        Ok(())
    }

    /// Submit the closed recording to the execution queue
    pub fn submit<G: GpuDevice>(&mut self, gpu: &mut G) -> Result<()> {
        if self.state != RecorderState::Executable {
            return Err(GraphicsError::CommandExecution(format!(
                "Invalid state for submit: {}",
                self.state
            ))
            .into());
        }

        gpu.submit_frame_commands()?;
        self.state = RecorderState::Initial;
        Ok(())
    }
}

impl Default for CommandRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::sim::{SimDevice, SimOp};
    use crate::renderer::sync::FenceManager;

    const CLEAR: [f32; 4] = [0.0, 0.5, 0.75, 1.0];

    fn recorder_setup() -> (SimDevice, FrameSlot, FenceManager, CommandRecorder) {
        (
            SimDevice::new(3, 800, 600),
            FrameSlot::new(0),
            FenceManager::new(),
            CommandRecorder::new(),
        )
    }

    #[test]
    fn test_full_recording_cycle() {
        let (mut gpu, slot, fence, mut recorder) = recorder_setup();
        let scene = SceneConfig::default();

        recorder.begin(&mut gpu, &slot, &fence).unwrap();
        assert_eq!(recorder.state(), RecorderState::Recording);

        recorder
            .record_frame(&mut gpu, &slot, CLEAR, Some(&scene))
            .unwrap();
        assert_eq!(recorder.state(), RecorderState::Executable);

        recorder.submit(&mut gpu).unwrap();
        assert_eq!(recorder.state(), RecorderState::Initial);

        // Defaults: two brushes, one entity
        assert_eq!(
            gpu.ops(),
            &[
                SimOp::ResetAllocator(0),
                SimOp::TransitionToRenderTarget(0),
                SimOp::Clear(0),
                SimOp::DrawBrush,
                SimOp::DrawBrush,
                SimOp::DrawEntity,
                SimOp::TransitionToPresent(0),
                SimOp::CloseList,
                SimOp::Execute,
            ]
        );
    }

    #[test]
    fn test_record_without_scene_skips_draws() {
        let (mut gpu, slot, fence, mut recorder) = recorder_setup();

        recorder.begin(&mut gpu, &slot, &fence).unwrap();
        recorder.record_frame(&mut gpu, &slot, CLEAR, None).unwrap();

        assert!(!gpu.ops().iter().any(|op| matches!(op, SimOp::DrawBrush)));
        assert!(gpu.ops().contains(&SimOp::Clear(0)));
    }

    #[test]
    fn test_begin_twice_fails() {
        let (mut gpu, slot, fence, mut recorder) = recorder_setup();

        recorder.begin(&mut gpu, &slot, &fence).unwrap();
        assert!(recorder.begin(&mut gpu, &slot, &fence).is_err());
        // The failed begin must not have reset anything
        assert_eq!(gpu.ops(), &[SimOp::ResetAllocator(0)]);
    }

    #[test]
    fn test_begin_while_slot_in_flight_fails() {
        let (mut gpu, mut slot, mut fence, mut recorder) = recorder_setup();
        gpu.set_completion_delay(3);

        // Simulate a prior submission that has not retired
        let value = fence.signal(&mut gpu).unwrap();
        slot.record_submission(value);

        let err = recorder.begin(&mut gpu, &slot, &fence).unwrap_err();
        assert!(err.to_string().contains("still in flight"));
        assert_eq!(recorder.state(), RecorderState::Initial);
    }

    #[test]
    fn test_record_before_begin_fails() {
        let (mut gpu, slot, _fence, mut recorder) = recorder_setup();

        assert!(recorder
            .record_frame(&mut gpu, &slot, CLEAR, None)
            .is_err());
    }

    #[test]
    fn test_submit_before_close_fails() {
        let (mut gpu, slot, fence, mut recorder) = recorder_setup();

        recorder.begin(&mut gpu, &slot, &fence).unwrap();
        assert!(recorder.submit(&mut gpu).is_err());
        assert_eq!(recorder.state(), RecorderState::Recording);
    }

    #[test]
    fn test_begin_discards_unsubmitted_recording() {
        let (mut gpu, slot, fence, mut recorder) = recorder_setup();

        recorder.begin(&mut gpu, &slot, &fence).unwrap();
        recorder.record_frame(&mut gpu, &slot, CLEAR, None).unwrap();

        // Closed but never submitted; a fresh begin reclaims the recorder
        recorder.begin(&mut gpu, &slot, &fence).unwrap();
        assert_eq!(recorder.state(), RecorderState::Recording);
    }
}
