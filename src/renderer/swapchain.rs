//! Swap chain wrapper
//!
//! Presentation policy and buffer geometry for the frame pipeline. The
//! backend owns the actual buffers; this wrapper owns the decisions: which
//! sync interval to present with, when tearing is allowed, and how resize
//! requests are clamped.

use crate::core::error::Result;
use crate::gfx::device::GpuDevice;

/// Swap chain state
#[derive(Debug)]
pub struct SwapChain {
    width: u32,
    height: u32,
    buffer_count: usize,
    vsync: bool,
    tearing_supported: bool,
}

impl SwapChain {
    /// Wrap the device's swap chain
    ///
    /// Buffer count and tearing support are read from the device once;
    /// both are fixed for the swap chain's lifetime.
    pub fn new<G: GpuDevice>(gpu: &G, width: u32, height: u32, vsync: bool) -> Self {
        Self {
            width,
            height,
            buffer_count: gpu.buffer_count(),
            vsync,
            tearing_supported: gpu.tearing_supported(),
        }
    }

    /// Current buffer width
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Current buffer height
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Current buffer dimensions
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of back buffers
    pub fn buffer_count(&self) -> usize {
        self.buffer_count
    }

    /// Whether presents wait for vertical blank
    pub fn vsync(&self) -> bool {
        self.vsync
    }

    /// Whether the device can present mid-refresh
    pub fn tearing_supported(&self) -> bool {
        self.tearing_supported
    }

    /// Flip vsync, returning the new setting
    pub fn toggle_vsync(&mut self) -> bool {
        self.vsync = !self.vsync;
        tracing::info!(vsync = self.vsync, "VSync toggled");
        self.vsync
    }

    /// The slot the presentation engine will next present into
    ///
    /// This is the slot the scheduler must record into; the engine picks
    /// it, not the caller.
    pub fn current_index<G: GpuDevice>(&self, gpu: &G) -> usize {
        gpu.current_back_buffer_index()
    }

    /// Present the current back buffer
    ///
    /// With vsync off and tearing supported, presents immediately
    /// (interval 0, tearing flag set); otherwise waits one vblank.
    pub fn present<G: GpuDevice>(&self, gpu: &mut G) -> Result<()> {
        let sync_interval = if self.vsync { 1 } else { 0 };
        let allow_tearing = !self.vsync && self.tearing_supported;
        gpu.present(sync_interval, allow_tearing)
    }

    /// Resize the back buffers
    ///
    /// The caller must have flushed the device and released every
    /// back-buffer reference first. Degenerate dimensions (a minimized
    /// window reports 0x0) are clamped to 1x1.
    pub fn resize<G: GpuDevice>(&mut self, gpu: &mut G, width: u32, height: u32) -> Result<()> {
        let width = width.max(1);
        let height = height.max(1);

        gpu.resize_buffers(width, height)?;
        self.width = width;
        self.height = height;

        tracing::info!(width, height, "Swap chain buffers resized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::sim::{SimDevice, SimOp};

    #[test]
    fn test_resize_clamps_degenerate_size() {
        let mut gpu = SimDevice::new(3, 800, 600);
        let mut swap_chain = SwapChain::new(&gpu, 800, 600, true);

        swap_chain.resize(&mut gpu, 0, 0).unwrap();

        assert_eq!(swap_chain.size(), (1, 1));
        assert_eq!(gpu.size(), (1, 1));
        assert!(gpu.ops().contains(&SimOp::Resize(1, 1)));
    }

    #[test]
    fn test_present_with_vsync() {
        let mut gpu = SimDevice::new(3, 800, 600);
        let swap_chain = SwapChain::new(&gpu, 800, 600, true);

        swap_chain.present(&mut gpu).unwrap();

        assert_eq!(
            gpu.ops(),
            &[SimOp::Present {
                interval: 1,
                tearing: false
            }]
        );
    }

    #[test]
    fn test_present_without_vsync_allows_tearing() {
        let mut gpu = SimDevice::new(3, 800, 600);
        let swap_chain = SwapChain::new(&gpu, 800, 600, false);

        swap_chain.present(&mut gpu).unwrap();

        assert_eq!(
            gpu.ops(),
            &[SimOp::Present {
                interval: 0,
                tearing: true
            }]
        );
    }

    #[test]
    fn test_no_tearing_flag_without_device_support() {
        let mut gpu = SimDevice::new(3, 800, 600);
        gpu.set_tearing_supported(false);
        let swap_chain = SwapChain::new(&gpu, 800, 600, false);

        swap_chain.present(&mut gpu).unwrap();

        assert_eq!(
            gpu.ops(),
            &[SimOp::Present {
                interval: 0,
                tearing: false
            }]
        );
    }

    #[test]
    fn test_toggle_vsync() {
        let gpu = SimDevice::new(2, 800, 600);
        let mut swap_chain = SwapChain::new(&gpu, 800, 600, true);

        assert!(!swap_chain.toggle_vsync());
        assert!(swap_chain.toggle_vsync());
    }

    #[test]
    fn test_current_index_follows_device() {
        let mut gpu = SimDevice::new(3, 800, 600);
        let swap_chain = SwapChain::new(&gpu, 800, 600, true);

        assert_eq!(swap_chain.current_index(&gpu), 0);
        swap_chain.present(&mut gpu).unwrap();
        assert_eq!(swap_chain.current_index(&gpu), 1);
    }
}
