// gpu/pass.rs — One bind group layout and dispatch helper for every pass.
//
// Every fill kernel has the same shape: read up to four float textures,
// write one storage texture, take a small uniform block.
//
//   @binding(0..=3)  texture_2d<f32>                    inputs
//   @binding(4)      texture_storage_2d<rgba32float, write>  output
//   @binding(5)      uniform                           params
//
// Sharing the layout lets the pyramid, flood, and fill shaders be compiled
// against a single `PipelineLayout`. Shaders may leave bindings unused; the
// bind group still fills all six, padding missing inputs with the first
// one. An input must never be the output texture of the same dispatch.

use wgpu::util::DeviceExt;

use crate::gpu::device::GpuDevice;
use crate::gpu::image::GpuImage;

/// Number of sampled-texture inputs a pass can bind.
pub const MAX_INPUTS: usize = 4;
const OUTPUT_BINDING: u32 = MAX_INPUTS as u32;
const PARAMS_BINDING: u32 = MAX_INPUTS as u32 + 1;

/// Shared bind group + pipeline layout.
pub struct PassLayout {
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
}

impl PassLayout {
    pub fn new(gpu: &GpuDevice) -> Self {
        let mut entries: Vec<wgpu::BindGroupLayoutEntry> = (0..MAX_INPUTS as u32)
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                },
                count: None,
            })
            .collect();
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: OUTPUT_BINDING,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: wgpu::TextureFormat::Rgba32Float,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: PARAMS_BINDING,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });

        let bind_group_layout = gpu.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("seamfill::pass"),
            entries: &entries,
        });
        let pipeline_layout = gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("seamfill::pass"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        PassLayout { bind_group_layout, pipeline_layout }
    }

    /// Compile `template` with the device's workgroup size baked in.
    pub fn shader(&self, gpu: &GpuDevice, label: &str, template: &str) -> wgpu::ShaderModule {
        let source = gpu.workgroup_size.specialize(template);
        gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    }
}

/// A compute pipeline on the shared layout.
pub struct ComputeProgram {
    pipeline: wgpu::ComputePipeline,
    entry: &'static str,
}

impl ComputeProgram {
    pub fn new(gpu: &GpuDevice, layout: &PassLayout, module: &wgpu::ShaderModule, entry: &'static str) -> Self {
        let pipeline = gpu.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(entry),
            layout: Some(&layout.pipeline_layout),
            module,
            entry_point: entry,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });
        ComputeProgram { pipeline, entry }
    }

    pub fn entry(&self) -> &'static str {
        self.entry
    }

    /// Record one dispatch covering the whole `output` texture.
    ///
    /// # Panics
    /// Panics if `inputs` is empty or longer than [`MAX_INPUTS`].
    pub fn dispatch(
        &self,
        gpu: &GpuDevice,
        layout: &PassLayout,
        encoder: &mut wgpu::CommandEncoder,
        inputs: &[&GpuImage],
        output: &GpuImage,
        params: &[u8],
    ) {
        assert!(
            !inputs.is_empty() && inputs.len() <= MAX_INPUTS,
            "{}: {} inputs, expected 1..={MAX_INPUTS}",
            self.entry,
            inputs.len()
        );
        let params_buf = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(self.entry),
            contents: params,
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let mut entries: Vec<wgpu::BindGroupEntry> = (0..MAX_INPUTS)
            .map(|i| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(&inputs.get(i).unwrap_or(&inputs[0]).view),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: OUTPUT_BINDING,
            resource: wgpu::BindingResource::TextureView(&output.view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: PARAMS_BINDING,
            resource: params_buf.as_entire_binding(),
        });
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.entry),
            layout: &layout.bind_group_layout,
            entries: &entries,
        });

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(self.entry),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        let (dx, dy) = gpu.dispatch_size(output.width, output.height);
        pass.dispatch_workgroups(dx, dy, 1);
    }
}
