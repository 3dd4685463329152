//! DirectX 12 device context
//!
//! Owns the core API objects the whole backend shares: device, command
//! queue, swap chain, RTV heap, back-buffer references and the frame
//! fence. Creation follows the usual bring-up order:
//!
//! 1. Enable the debug layer (debug builds)
//! 2. Create the DXGI factory
//! 3. Pick an adapter (hardware with the most video memory, or WARP)
//! 4. Create the device and the direct command queue
//! 5. Query tearing support
//! 6. Create the swap chain for the window
//! 7. Create the RTV heap and the render-target views
//! 8. Create the fence and its wait event
//!
//! Every back-buffer reference lives in `back_buffers`; dropping them is
//! what releases the swap-chain surfaces, which must happen before
//! `ResizeBuffers` is legal.

use std::ffi::c_void;

use tracing::{debug, info, warn};
use windows::core::{Interface, BOOL};
use windows::Win32::Foundation::{CloseHandle, HANDLE, HWND};
use windows::Win32::Graphics::Direct3D::D3D_FEATURE_LEVEL_11_0;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;
use windows::Win32::System::Threading::CreateEventA;
use winit::raw_window_handle::{HasWindowHandle, RawWindowHandle};
use winit::window::Window;

use crate::core::config::Config;
use crate::core::error::{GraphicsError, Result};

/// Swap chain and render-target format used everywhere in this backend
pub const BACK_BUFFER_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM;

/// Core DirectX 12 objects
pub struct Dx12Context {
    pub device: ID3D12Device,
    pub command_queue: ID3D12CommandQueue,
    pub swap_chain: IDXGISwapChain3,
    pub rtv_heap: ID3D12DescriptorHeap,
    pub rtv_descriptor_size: usize,
    /// Strong references to the swap-chain surfaces, indexed by slot
    pub back_buffers: Vec<ID3D12Resource>,
    pub fence: ID3D12Fence,
    pub fence_event: HANDLE,
    pub buffer_count: usize,
    pub tearing_supported: bool,
    pub width: u32,
    pub height: u32,
}

// D3D12 device objects are free-threaded
unsafe impl Send for Dx12Context {}
unsafe impl Sync for Dx12Context {}

impl Dx12Context {
    pub fn new(config: &Config, width: u32, height: u32, window: &Window) -> Result<Self> {
        let buffer_count = config.graphics.buffer_count;
        let hwnd = window_hwnd(window)?;

        unsafe {
            #[cfg(debug_assertions)]
            {
                let mut debug_interface: Option<ID3D12Debug> = None;
                if D3D12GetDebugInterface(&mut debug_interface).is_ok() {
                    if let Some(debug_interface) = debug_interface {
                        debug_interface.EnableDebugLayer();
                        debug!("DX12 debug layer enabled");
                    }
                } else {
                    warn!("Failed to enable DX12 debug layer");
                }
            }

            #[cfg(debug_assertions)]
            let factory_flags = DXGI_CREATE_FACTORY_DEBUG;
            #[cfg(not(debug_assertions))]
            let factory_flags = DXGI_CREATE_FACTORY_FLAGS(0);

            let factory: IDXGIFactory4 = CreateDXGIFactory2(factory_flags).map_err(|e| {
                GraphicsError::DeviceCreation(format!("Failed to create DXGI factory: {:?}", e))
            })?;

            let adapter = select_adapter(&factory, config.graphics.use_warp)?;

            let mut device: Option<ID3D12Device> = None;
            D3D12CreateDevice(&adapter, D3D_FEATURE_LEVEL_11_0, &mut device).map_err(|e| {
                GraphicsError::DeviceCreation(format!("Failed to create D3D12 device: {:?}", e))
            })?;
            let device = device.ok_or_else(|| {
                GraphicsError::DeviceCreation("D3D12CreateDevice returned no device".to_string())
            })?;

            #[cfg(debug_assertions)]
            debug!("D3D12 device created");

            let queue_desc = D3D12_COMMAND_QUEUE_DESC {
                Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
                Flags: D3D12_COMMAND_QUEUE_FLAG_NONE,
                ..Default::default()
            };
            let command_queue: ID3D12CommandQueue =
                device.CreateCommandQueue(&queue_desc).map_err(|e| {
                    GraphicsError::DeviceCreation(format!(
                        "Failed to create command queue: {:?}",
                        e
                    ))
                })?;

            let tearing_supported = query_tearing_support(&factory);

            let swap_chain_desc = DXGI_SWAP_CHAIN_DESC1 {
                Width: width,
                Height: height,
                Format: BACK_BUFFER_FORMAT,
                SampleDesc: DXGI_SAMPLE_DESC {
                    Count: 1,
                    ..Default::default()
                },
                BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
                BufferCount: buffer_count as u32,
                SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
                Flags: swap_chain_flags(tearing_supported).0 as u32,
                ..Default::default()
            };

            let swap_chain: IDXGISwapChain1 = factory
                .CreateSwapChainForHwnd(&command_queue, hwnd, &swap_chain_desc, None, None)
                .map_err(|e| {
                    GraphicsError::SwapchainError(format!("Failed to create swap chain: {:?}", e))
                })?;
            let swap_chain: IDXGISwapChain3 = swap_chain.cast().map_err(|e| {
                GraphicsError::SwapchainError(format!(
                    "Swap chain does not support IDXGISwapChain3: {:?}",
                    e
                ))
            })?;

            // The swap chain owns presentation; Alt+Enter fullscreen toggling
            // through DXGI would bypass the window system
            if let Err(e) = factory.MakeWindowAssociation(hwnd, DXGI_MWA_NO_ALT_ENTER) {
                warn!("Failed to disable Alt+Enter handling: {:?}", e);
            }

            info!(
                width,
                height,
                buffers = buffer_count,
                tearing = tearing_supported,
                "Swap chain created"
            );

            let rtv_heap_desc = D3D12_DESCRIPTOR_HEAP_DESC {
                NumDescriptors: buffer_count as u32,
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
                Flags: D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
                NodeMask: 0,
            };
            let rtv_heap: ID3D12DescriptorHeap =
                device.CreateDescriptorHeap(&rtv_heap_desc).map_err(|e| {
                    GraphicsError::ResourceCreation(format!("Failed to create RTV heap: {:?}", e))
                })?;
            let rtv_descriptor_size =
                device.GetDescriptorHandleIncrementSize(D3D12_DESCRIPTOR_HEAP_TYPE_RTV) as usize;

            let fence: ID3D12Fence = device.CreateFence(0, D3D12_FENCE_FLAG_NONE).map_err(|e| {
                GraphicsError::DeviceCreation(format!("Failed to create fence: {:?}", e))
            })?;
            let fence_event = CreateEventA(None, false, false, None).map_err(|e| {
                GraphicsError::DeviceCreation(format!("Failed to create fence event: {:?}", e))
            })?;

            #[cfg(debug_assertions)]
            debug!("Synchronization objects created");

            let mut context = Self {
                device,
                command_queue,
                swap_chain,
                rtv_heap,
                rtv_descriptor_size,
                back_buffers: Vec::new(),
                fence,
                fence_event,
                buffer_count,
                tearing_supported,
                width,
                height,
            };
            context.create_render_targets()?;

            Ok(context)
        }
    }

    /// Fetch the swap-chain surfaces and build one RTV per slot
    pub fn create_render_targets(&mut self) -> Result<()> {
        self.back_buffers.clear();
        unsafe {
            let heap_start = self.rtv_heap.GetCPUDescriptorHandleForHeapStart();
            for i in 0..self.buffer_count {
                let surface: ID3D12Resource =
                    self.swap_chain.GetBuffer(i as u32).map_err(|e| {
                        GraphicsError::SwapchainError(format!(
                            "Failed to get swap chain buffer {}: {:?}",
                            i, e
                        ))
                    })?;
                let handle = D3D12_CPU_DESCRIPTOR_HANDLE {
                    ptr: heap_start.ptr + i * self.rtv_descriptor_size,
                };
                self.device.CreateRenderTargetView(&surface, None, handle);
                self.back_buffers.push(surface);
            }
        }
        Ok(())
    }

    /// Drop every back-buffer reference; required before `ResizeBuffers`
    pub fn release_render_targets(&mut self) {
        self.back_buffers.clear();
    }

    /// CPU descriptor handle of one slot's render-target view
    pub fn rtv_handle(&self, slot: usize) -> D3D12_CPU_DESCRIPTOR_HANDLE {
        let heap_start = unsafe { self.rtv_heap.GetCPUDescriptorHandleForHeapStart() };
        D3D12_CPU_DESCRIPTOR_HANDLE {
            ptr: heap_start.ptr + slot * self.rtv_descriptor_size,
        }
    }

    /// Flags the swap chain was created with; ResizeBuffers must repeat them
    pub fn swap_chain_flags(&self) -> DXGI_SWAP_CHAIN_FLAG {
        swap_chain_flags(self.tearing_supported)
    }
}

impl Drop for Dx12Context {
    fn drop(&mut self) {
        unsafe {
            _ = CloseHandle(self.fence_event);
        }
    }
}

fn swap_chain_flags(tearing_supported: bool) -> DXGI_SWAP_CHAIN_FLAG {
    if tearing_supported {
        DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING
    } else {
        DXGI_SWAP_CHAIN_FLAG(0)
    }
}

fn window_hwnd(window: &Window) -> Result<HWND> {
    let handle = window.window_handle().map_err(|e| {
        GraphicsError::DeviceCreation(format!("Failed to get window handle: {}", e))
    })?;
    match handle.as_raw() {
        RawWindowHandle::Win32(h) => Ok(HWND(h.hwnd.get() as *mut c_void)),
        _ => Err(GraphicsError::DeviceCreation(
            "Expected a Win32 window handle".to_string(),
        )
        .into()),
    }
}

/// Pick the hardware adapter with the most dedicated video memory
///
/// Software adapters are skipped unless WARP was requested explicitly.
fn select_adapter(factory: &IDXGIFactory4, use_warp: bool) -> Result<IDXGIAdapter1> {
    unsafe {
        if use_warp {
            let adapter: IDXGIAdapter1 = factory.EnumWarpAdapter().map_err(|e| {
                GraphicsError::DeviceCreation(format!("Failed to get WARP adapter: {:?}", e))
            })?;
            info!("Using WARP software adapter");
            return Ok(adapter);
        }

        let mut best: Option<(IDXGIAdapter1, u64)> = None;
        let mut i = 0;
        while let Ok(adapter) = factory.EnumAdapters1(i) {
            i += 1;
            let Ok(desc) = adapter.GetDesc1() else {
                continue;
            };
            if desc.Flags & DXGI_ADAPTER_FLAG_SOFTWARE.0 as u32 != 0 {
                continue;
            }
            let memory = desc.DedicatedVideoMemory as u64;
            if best.as_ref().map_or(true, |(_, m)| memory > *m) {
                let name = String::from_utf16_lossy(&desc.Description);
                debug!(
                    adapter = %name.trim_end_matches('\0'),
                    video_memory = memory,
                    "Adapter candidate"
                );
                best = Some((adapter, memory));
            }
        }

        match best {
            Some((adapter, _)) => Ok(adapter),
            None => Err(GraphicsError::DeviceCreation(
                "No hardware graphics adapter found".to_string(),
            )
            .into()),
        }
    }
}

/// Ask DXGI whether unthrottled presents are allowed
fn query_tearing_support(factory: &IDXGIFactory4) -> bool {
    let Ok(factory5) = factory.cast::<IDXGIFactory5>() else {
        return false;
    };
    let mut allow_tearing = BOOL(0);
    let supported = unsafe {
        factory5
            .CheckFeatureSupport(
                DXGI_FEATURE_PRESENT_ALLOW_TEARING,
                &mut allow_tearing as *mut BOOL as *mut c_void,
                std::mem::size_of::<BOOL>() as u32,
            )
            .is_ok()
    };
    supported && allow_tearing.as_bool()
}
