//! DirectX 12 backend
//!
//! The real presentation path. Split into:
//! - `context`: device, queue, swap chain, RTV heap, fence
//! - `pipeline`: root signature, shaders and the shared box geometry
//! - [`Dx12Device`]: the `GpuDevice` implementation tying them together
//!
//! One command allocator exists per back-buffer slot and one command list
//! is shared by all of them; the list is re-opened against the slot's
//! allocator each frame after the slot's previous work has retired.

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::time::Duration;

use windows::Win32::Foundation::{RECT, WAIT_OBJECT_0, WAIT_TIMEOUT};
use windows::Win32::Graphics::Direct3D::D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::{
    DXGI_ERROR_DEVICE_REMOVED, DXGI_ERROR_DEVICE_RESET, DXGI_PRESENT, DXGI_PRESENT_ALLOW_TEARING,
};
use windows::Win32::System::Threading::WaitForSingleObject;
use winit::window::Window;

use crate::core::config::Config;
use crate::core::error::{GraphicsError, Result, ToastRenderError};
use crate::core::math::Matrix4;
use crate::core::scene::SceneConfig;
use crate::gfx::device::GpuDevice;

pub mod context;
pub mod pipeline;

use context::{Dx12Context, BACK_BUFFER_FORMAT};
use pipeline::{BrushPipeline, DRAW_CONSTANT_COUNT};

// Flat tints for the two marker kinds drawn by the scene pass
const BRUSH_TINT: [f32; 4] = [0.78, 0.78, 0.78, 1.0];
const ENTITY_TINT: [f32; 4] = [1.0, 0.62, 0.12, 1.0];

/// DirectX 12 implementation of [`GpuDevice`]
pub struct Dx12Device {
    ctx: Dx12Context,
    pipeline: BrushPipeline,
    command_allocators: Vec<ID3D12CommandAllocator>,
    command_list: ID3D12GraphicsCommandList,
    viewport: D3D12_VIEWPORT,
    scissor_rect: RECT,
}

impl Dx12Device {
    pub fn new(config: &Config, width: u32, height: u32, window: &Window) -> Result<Self> {
        let ctx = Dx12Context::new(config, width, height, window)?;
        let pipeline = BrushPipeline::new(&ctx.device)?;

        let command_allocators = (0..ctx.buffer_count)
            .map(|i| unsafe {
                ctx.device
                    .CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT)
                    .map_err(|e| {
                        GraphicsError::DeviceCreation(format!(
                            "Failed to create command allocator {}: {:?}",
                            i, e
                        ))
                        .into()
                    })
            })
            .collect::<Result<Vec<ID3D12CommandAllocator>>>()?;

        let command_list: ID3D12GraphicsCommandList = unsafe {
            ctx.device
                .CreateCommandList(
                    0,
                    D3D12_COMMAND_LIST_TYPE_DIRECT,
                    &command_allocators[0],
                    Some(&pipeline.pso),
                )
                .map_err(|e| {
                    GraphicsError::DeviceCreation(format!(
                        "Failed to create command list: {:?}",
                        e
                    ))
                })?
        };
        // Lists are created open; the first frame expects it closed
        unsafe {
            command_list.Close().map_err(|e| {
                GraphicsError::CommandExecution(format!(
                    "Failed to close initial command list: {:?}",
                    e
                ))
            })?;
        }

        let viewport = D3D12_VIEWPORT {
            TopLeftX: 0.0,
            TopLeftY: 0.0,
            Width: width as f32,
            Height: height as f32,
            MinDepth: 0.0,
            MaxDepth: 1.0,
        };
        let scissor_rect = RECT {
            left: 0,
            top: 0,
            right: width as i32,
            bottom: height as i32,
        };

        Ok(Self {
            ctx,
            pipeline,
            command_allocators,
            command_list,
            viewport,
            scissor_rect,
        })
    }

    fn back_buffer(&self, slot: usize) -> Result<&ID3D12Resource> {
        self.ctx.back_buffers.get(slot).ok_or_else(|| {
            GraphicsError::CommandExecution(format!("No back buffer for slot {}", slot)).into()
        })
    }

    fn push_draw(&mut self, mvp: &Matrix4, tint: [f32; 4]) {
        let mut constants = [0.0f32; DRAW_CONSTANT_COUNT as usize];
        constants[..16].copy_from_slice(mvp.as_slice());
        constants[16..].copy_from_slice(&tint);
        unsafe {
            self.command_list.SetGraphicsRoot32BitConstants(
                0,
                DRAW_CONSTANT_COUNT,
                constants.as_ptr() as *const c_void,
                0,
            );
            self.command_list
                .DrawIndexedInstanced(self.pipeline.index_count, 1, 0, 0, 0);
        }
    }

    fn present_error(&self, e: windows::core::Error) -> ToastRenderError {
        let code = e.code();
        if code == DXGI_ERROR_DEVICE_REMOVED || code == DXGI_ERROR_DEVICE_RESET {
            let reason = unsafe { self.ctx.device.GetDeviceRemovedReason() };
            GraphicsError::DeviceLost(format!(
                "Device removed during present: {:?}",
                reason.err()
            ))
            .into()
        } else {
            GraphicsError::SwapchainError(format!("Present failed: {:?}", e)).into()
        }
    }
}

impl GpuDevice for Dx12Device {
    fn buffer_count(&self) -> usize {
        self.ctx.buffer_count
    }

    fn tearing_supported(&self) -> bool {
        self.ctx.tearing_supported
    }

    fn current_back_buffer_index(&self) -> usize {
        unsafe { self.ctx.swap_chain.GetCurrentBackBufferIndex() as usize }
    }

    fn signal_fence(&mut self, value: u64) -> Result<()> {
        unsafe {
            self.ctx
                .command_queue
                .Signal(&self.ctx.fence, value)
                .map_err(|e| {
                    GraphicsError::DeviceLost(format!("Failed to signal fence: {:?}", e)).into()
                })
        }
    }

    fn completed_fence_value(&self) -> u64 {
        unsafe { self.ctx.fence.GetCompletedValue() }
    }

    fn wait_fence(&mut self, value: u64, timeout: Duration) -> Result<()> {
        unsafe {
            self.ctx
                .fence
                .SetEventOnCompletion(value, self.ctx.fence_event)
                .map_err(|e| {
                    GraphicsError::DeviceLost(format!("Failed to arm fence event: {:?}", e))
                })?;

            let timeout_ms = timeout.as_millis().min(u128::from(u32::MAX)) as u32;
            let wait = WaitForSingleObject(self.ctx.fence_event, timeout_ms);
            if wait == WAIT_OBJECT_0 {
                Ok(())
            } else if wait == WAIT_TIMEOUT {
                Err(GraphicsError::FenceTimeout(value).into())
            } else {
                Err(GraphicsError::DeviceLost(format!("Fence wait failed: {:?}", wait)).into())
            }
        }
    }

    fn reset_frame_commands(&mut self, slot: usize) -> Result<()> {
        unsafe {
            let allocator = &self.command_allocators[slot];
            allocator.Reset().map_err(|e| {
                GraphicsError::CommandExecution(format!(
                    "Failed to reset command allocator {}: {:?}",
                    slot, e
                ))
            })?;
            self.command_list
                .Reset(allocator, Some(&self.pipeline.pso))
                .map_err(|e| {
                    GraphicsError::CommandExecution(format!(
                        "Failed to reset command list: {:?}",
                        e
                    ))
                })?;

            // Frame-fixed state; per-draw constants are pushed during the scene pass
            self.command_list
                .SetGraphicsRootSignature(&self.pipeline.root_signature);
            self.command_list.RSSetViewports(&[self.viewport]);
            self.command_list.RSSetScissorRects(&[self.scissor_rect]);
            self.command_list
                .IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
            self.command_list
                .IASetVertexBuffers(0, Some(&[self.pipeline.vertex_buffer_view]));
            self.command_list
                .IASetIndexBuffer(Some(&self.pipeline.index_buffer_view));
        }
        Ok(())
    }

    fn record_transition_to_render_target(&mut self, slot: usize) -> Result<()> {
        let barrier = transition_barrier(
            self.back_buffer(slot)?,
            D3D12_RESOURCE_STATE_PRESENT,
            D3D12_RESOURCE_STATE_RENDER_TARGET,
        );
        unsafe { self.command_list.ResourceBarrier(&[barrier]) };
        Ok(())
    }

    fn record_clear(&mut self, slot: usize, color: [f32; 4]) -> Result<()> {
        let rtv = self.ctx.rtv_handle(slot);
        unsafe {
            self.command_list
                .OMSetRenderTargets(1, Some(&rtv), false, None);
            self.command_list.ClearRenderTargetView(rtv, &color, None);
        }
        Ok(())
    }

    fn record_scene(&mut self, scene: &SceneConfig) -> Result<()> {
        let aspect = self.viewport.Width / self.viewport.Height;
        let view = scene.camera.view_matrix();
        let projection = depth_range_remap() * scene.camera.projection_matrix(aspect);
        let view_projection = projection * view;

        for brush in &scene.brushes {
            let mvp = view_projection * brush.transform().to_matrix();
            self.push_draw(&mvp, BRUSH_TINT);
        }
        for entity in &scene.entities {
            let mvp = view_projection * entity.transform().to_matrix();
            self.push_draw(&mvp, ENTITY_TINT);
        }
        Ok(())
    }

    fn record_transition_to_present(&mut self, slot: usize) -> Result<()> {
        let barrier = transition_barrier(
            self.back_buffer(slot)?,
            D3D12_RESOURCE_STATE_RENDER_TARGET,
            D3D12_RESOURCE_STATE_PRESENT,
        );
        unsafe { self.command_list.ResourceBarrier(&[barrier]) };
        Ok(())
    }

    fn close_frame_commands(&mut self) -> Result<()> {
        unsafe {
            self.command_list.Close().map_err(|e| {
                GraphicsError::CommandExecution(format!("Failed to close command list: {:?}", e))
                    .into()
            })
        }
    }

    fn submit_frame_commands(&mut self) -> Result<()> {
        unsafe {
            let command_lists = [Some(self.command_list.clone().into())];
            self.ctx.command_queue.ExecuteCommandLists(&command_lists);
        }
        Ok(())
    }

    fn present(&mut self, sync_interval: u32, allow_tearing: bool) -> Result<()> {
        // Tearing is only legal with an unsynchronized present on a chain
        // created with the tearing flag
        let flags = if allow_tearing && sync_interval == 0 && self.ctx.tearing_supported {
            DXGI_PRESENT_ALLOW_TEARING
        } else {
            DXGI_PRESENT(0)
        };

        let hr = unsafe { self.ctx.swap_chain.Present(sync_interval, flags) };
        if let Err(e) = hr.ok() {
            return Err(self.present_error(e));
        }
        Ok(())
    }

    fn release_frame_targets(&mut self) {
        self.ctx.release_render_targets();
    }

    fn resize_buffers(&mut self, width: u32, height: u32) -> Result<()> {
        unsafe {
            self.ctx
                .swap_chain
                .ResizeBuffers(
                    self.ctx.buffer_count as u32,
                    width,
                    height,
                    BACK_BUFFER_FORMAT,
                    self.ctx.swap_chain_flags(),
                )
                .map_err(|e| {
                    GraphicsError::SwapchainError(format!(
                        "Failed to resize swap chain buffers: {:?}",
                        e
                    ))
                })?;
        }

        self.ctx.width = width;
        self.ctx.height = height;
        self.ctx.create_render_targets()?;

        self.viewport.Width = width as f32;
        self.viewport.Height = height as f32;
        self.scissor_rect.right = width as i32;
        self.scissor_rect.bottom = height as i32;
        Ok(())
    }
}

// The barrier struct borrows the resource pointer; no ownership is taken,
// so the swap-chain surfaces stay releasable before a resize
fn transition_barrier(
    resource: &ID3D12Resource,
    before: D3D12_RESOURCE_STATES,
    after: D3D12_RESOURCE_STATES,
) -> D3D12_RESOURCE_BARRIER {
    D3D12_RESOURCE_BARRIER {
        Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
        Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
        Anonymous: D3D12_RESOURCE_BARRIER_0 {
            Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                pResource: unsafe { std::mem::transmute_copy(resource) },
                Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
                StateBefore: before,
                StateAfter: after,
            }),
        },
    }
}

// Scene math produces clip-space depth in [-1, 1]; D3D rasterizes [0, 1]
fn depth_range_remap() -> Matrix4 {
    Matrix4::new(
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 0.5, 0.5, //
        0.0, 0.0, 0.0, 1.0,
    )
}
