//! Brush drawing pipeline
//!
//! Root signature, pipeline state and the shared unit-box geometry every
//! brush and entity draw reuses. The box is a canonical [-1, 1] cube; each
//! draw positions it with a model-view-projection matrix and colors it with
//! a tint, both pushed as root constants.

use std::mem::ManuallyDrop;

use bytemuck::{Pod, Zeroable};
use tracing::debug;
use windows::core::PCSTR;
use windows::Win32::Graphics::Direct3D::Fxc::D3DCompile;
use windows::Win32::Graphics::Direct3D::ID3DBlob;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::core::error::{GraphicsError, Result};
use crate::core::scene::{Brush, BRUSH_INDICES};

use super::context::BACK_BUFFER_FORMAT;

/// Root constants per draw: a float4x4 and a float4 tint
pub const DRAW_CONSTANT_COUNT: u32 = 20;

const VERTEX_SHADER: &str = include_str!("shaders/vertex.hlsl");
const PIXEL_SHADER: &str = include_str!("shaders/fragment.hlsl");

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
}

/// Pipeline objects for drawing tinted boxes
pub struct BrushPipeline {
    pub root_signature: ID3D12RootSignature,
    pub pso: ID3D12PipelineState,
    // The views borrow GPU memory owned by these buffers
    #[allow(dead_code)]
    vertex_buffer: ID3D12Resource,
    #[allow(dead_code)]
    index_buffer: ID3D12Resource,
    pub vertex_buffer_view: D3D12_VERTEX_BUFFER_VIEW,
    pub index_buffer_view: D3D12_INDEX_BUFFER_VIEW,
    pub index_count: u32,
}

impl BrushPipeline {
    pub fn new(device: &ID3D12Device) -> Result<Self> {
        let root_signature = create_root_signature(device)?;

        let vs_blob = compile_shader(
            VERTEX_SHADER,
            windows::core::s!("VSMain"),
            windows::core::s!("vs_5_0"),
        )?;
        let ps_blob = compile_shader(
            PIXEL_SHADER,
            windows::core::s!("PSMain"),
            windows::core::s!("ps_5_0"),
        )?;

        let input_element_descs = [D3D12_INPUT_ELEMENT_DESC {
            SemanticName: windows::core::s!("POSITION"),
            SemanticIndex: 0,
            Format: DXGI_FORMAT_R32G32B32_FLOAT,
            InputSlot: 0,
            AlignedByteOffset: 0,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            InstanceDataStepRate: 0,
        }];

        let mut pso_desc = D3D12_GRAPHICS_PIPELINE_STATE_DESC::default();
        pso_desc.pRootSignature = ManuallyDrop::new(Some(root_signature.clone()));
        pso_desc.VS = D3D12_SHADER_BYTECODE {
            pShaderBytecode: unsafe { vs_blob.GetBufferPointer() },
            BytecodeLength: unsafe { vs_blob.GetBufferSize() },
        };
        pso_desc.PS = D3D12_SHADER_BYTECODE {
            pShaderBytecode: unsafe { ps_blob.GetBufferPointer() },
            BytecodeLength: unsafe { ps_blob.GetBufferSize() },
        };
        pso_desc.BlendState = D3D12_BLEND_DESC {
            AlphaToCoverageEnable: false.into(),
            IndependentBlendEnable: false.into(),
            RenderTarget: [
                // Blending off, but every enum still needs a legal value
                D3D12_RENDER_TARGET_BLEND_DESC {
                    BlendEnable: false.into(),
                    LogicOpEnable: false.into(),
                    SrcBlend: D3D12_BLEND_ONE,
                    DestBlend: D3D12_BLEND_ZERO,
                    BlendOp: D3D12_BLEND_OP_ADD,
                    SrcBlendAlpha: D3D12_BLEND_ONE,
                    DestBlendAlpha: D3D12_BLEND_ZERO,
                    BlendOpAlpha: D3D12_BLEND_OP_ADD,
                    LogicOp: D3D12_LOGIC_OP_NOOP,
                    RenderTargetWriteMask: D3D12_COLOR_WRITE_ENABLE_ALL.0 as u8,
                },
                D3D12_RENDER_TARGET_BLEND_DESC::default(),
                D3D12_RENDER_TARGET_BLEND_DESC::default(),
                D3D12_RENDER_TARGET_BLEND_DESC::default(),
                D3D12_RENDER_TARGET_BLEND_DESC::default(),
                D3D12_RENDER_TARGET_BLEND_DESC::default(),
                D3D12_RENDER_TARGET_BLEND_DESC::default(),
                D3D12_RENDER_TARGET_BLEND_DESC::default(),
            ],
        };
        pso_desc.RasterizerState = D3D12_RASTERIZER_DESC {
            FillMode: D3D12_FILL_MODE_SOLID,
            // The box index table mixes winding orders; keep both sides
            CullMode: D3D12_CULL_MODE_NONE,
            FrontCounterClockwise: false.into(),
            DepthBias: 0,
            DepthBiasClamp: 0.0,
            SlopeScaledDepthBias: 0.0,
            DepthClipEnable: true.into(),
            MultisampleEnable: false.into(),
            AntialiasedLineEnable: false.into(),
            ForcedSampleCount: 0,
            ConservativeRaster: D3D12_CONSERVATIVE_RASTERIZATION_MODE_OFF,
        };
        pso_desc.DepthStencilState = D3D12_DEPTH_STENCIL_DESC {
            DepthEnable: false.into(),
            StencilEnable: false.into(),
            ..Default::default()
        };
        pso_desc.SampleMask = 0xFFFFFFFF;
        pso_desc.InputLayout = D3D12_INPUT_LAYOUT_DESC {
            pInputElementDescs: input_element_descs.as_ptr(),
            NumElements: input_element_descs.len() as u32,
        };
        pso_desc.PrimitiveTopologyType = D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE;
        pso_desc.NumRenderTargets = 1;
        pso_desc.RTVFormats[0] = BACK_BUFFER_FORMAT;
        pso_desc.SampleDesc.Count = 1;

        let pso: ID3D12PipelineState = unsafe {
            device.CreateGraphicsPipelineState(&pso_desc).map_err(|e| {
                GraphicsError::ResourceCreation(format!("Failed to create pipeline state: {:?}", e))
            })?
        };

        // Canonical box shared by every draw; per-draw matrices do the rest
        let unit_box = Brush::new([-1.0; 3], [1.0; 3]);
        let vertices: Vec<Vertex> = unit_box
            .corners()
            .iter()
            .map(|&position| Vertex { position })
            .collect();

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&vertices);
        let vertex_buffer = create_upload_buffer(device, vertex_bytes, "vertex buffer")?;
        let vertex_buffer_view = D3D12_VERTEX_BUFFER_VIEW {
            BufferLocation: unsafe { vertex_buffer.GetGPUVirtualAddress() },
            SizeInBytes: vertex_bytes.len() as u32,
            StrideInBytes: std::mem::size_of::<Vertex>() as u32,
        };

        let index_bytes: &[u8] = bytemuck::cast_slice(&BRUSH_INDICES);
        let index_buffer = create_upload_buffer(device, index_bytes, "index buffer")?;
        let index_buffer_view = D3D12_INDEX_BUFFER_VIEW {
            BufferLocation: unsafe { index_buffer.GetGPUVirtualAddress() },
            SizeInBytes: index_bytes.len() as u32,
            Format: DXGI_FORMAT_R16_UINT,
        };

        debug!(
            vertices = vertices.len(),
            indices = BRUSH_INDICES.len(),
            "Brush pipeline created"
        );

        Ok(Self {
            root_signature,
            pso,
            vertex_buffer,
            index_buffer,
            vertex_buffer_view,
            index_buffer_view,
            index_count: BRUSH_INDICES.len() as u32,
        })
    }
}

fn create_root_signature(device: &ID3D12Device) -> Result<ID3D12RootSignature> {
    let root_parameters = [D3D12_ROOT_PARAMETER {
        ParameterType: D3D12_ROOT_PARAMETER_TYPE_32BIT_CONSTANTS,
        Anonymous: D3D12_ROOT_PARAMETER_0 {
            Constants: D3D12_ROOT_CONSTANTS {
                ShaderRegister: 0, // b0
                RegisterSpace: 0,
                Num32BitValues: DRAW_CONSTANT_COUNT,
            },
        },
        ShaderVisibility: D3D12_SHADER_VISIBILITY_ALL,
    }];

    let root_desc = D3D12_ROOT_SIGNATURE_DESC {
        NumParameters: root_parameters.len() as u32,
        pParameters: root_parameters.as_ptr(),
        NumStaticSamplers: 0,
        pStaticSamplers: std::ptr::null(),
        Flags: D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
    };

    unsafe {
        let mut signature = None;
        D3D12SerializeRootSignature(&root_desc, D3D_ROOT_SIGNATURE_VERSION_1, &mut signature, None)
            .map_err(|e| {
                GraphicsError::ResourceCreation(format!(
                    "Failed to serialize root signature: {:?}",
                    e
                ))
            })?;
        let signature = signature.ok_or_else(|| {
            GraphicsError::ResourceCreation("No serialized root signature returned".to_string())
        })?;

        device
            .CreateRootSignature(
                0,
                std::slice::from_raw_parts(
                    signature.GetBufferPointer() as _,
                    signature.GetBufferSize(),
                ),
            )
            .map_err(|e| {
                GraphicsError::ResourceCreation(format!("Failed to create root signature: {:?}", e))
                    .into()
            })
    }
}

fn compile_shader(source: &str, entry: PCSTR, target: PCSTR) -> Result<ID3DBlob> {
    unsafe {
        let mut blob = None;
        let mut error_blob = None;
        let compiled = D3DCompile(
            source.as_ptr() as _,
            source.len(),
            None,
            None,
            None,
            entry,
            target,
            0,
            0,
            &mut blob,
            Some(&mut error_blob),
        );

        match compiled {
            Ok(()) => blob.ok_or_else(|| {
                GraphicsError::ShaderCompilation("Compiler returned no bytecode".to_string()).into()
            }),
            Err(e) => {
                let detail = match error_blob {
                    Some(errors) => {
                        let bytes = std::slice::from_raw_parts(
                            errors.GetBufferPointer() as *const u8,
                            errors.GetBufferSize(),
                        );
                        String::from_utf8_lossy(bytes).into_owned()
                    }
                    None => format!("{:?}", e),
                };
                Err(GraphicsError::ShaderCompilation(detail).into())
            }
        }
    }
}

/// Create an upload-heap buffer and copy `bytes` into it
fn create_upload_buffer(
    device: &ID3D12Device,
    bytes: &[u8],
    what: &str,
) -> Result<ID3D12Resource> {
    let heap_props = D3D12_HEAP_PROPERTIES {
        Type: D3D12_HEAP_TYPE_UPLOAD,
        ..Default::default()
    };
    let resource_desc = D3D12_RESOURCE_DESC {
        Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
        Width: bytes.len() as u64,
        Height: 1,
        DepthOrArraySize: 1,
        MipLevels: 1,
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: 1,
            Quality: 0,
        },
        Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
        ..Default::default()
    };

    unsafe {
        let mut buffer: Option<ID3D12Resource> = None;
        device
            .CreateCommittedResource(
                &heap_props,
                D3D12_HEAP_FLAG_NONE,
                &resource_desc,
                D3D12_RESOURCE_STATE_GENERIC_READ,
                None,
                &mut buffer,
            )
            .map_err(|e| {
                GraphicsError::ResourceCreation(format!("Failed to create {}: {:?}", what, e))
            })?;
        let buffer = buffer.ok_or_else(|| {
            GraphicsError::ResourceCreation(format!("No resource returned for {}", what))
        })?;

        let mut data = std::ptr::null_mut();
        buffer.Map(0, None, Some(&mut data)).map_err(|e| {
            GraphicsError::ResourceCreation(format!("Failed to map {}: {:?}", what, e))
        })?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), data as *mut u8, bytes.len());
        buffer.Unmap(0, None);

        Ok(buffer)
    }
}
