// gpu/device.rs — wgpu device abstraction.
//
// Responsibilities:
//   - Enumerate adapters on the primary backends and pick a hardware one.
//   - Expose a `DeviceProfile` that caps limits on a development machine
//     to what a constrained target reports.
//   - Provide `WorkgroupSize`, baked into every compute shader at pipeline
//     creation.
//   - Turn wgpu's asynchronous error reporting into `Result`s through error
//     scopes (`GpuDevice::scoped`).
//
// ADAPTER SELECTION:
// The default `request_adapter` heuristics may pick a software rasterizer
// when one is visible. We enumerate explicitly and only fall back to a CPU
// adapter when nothing else exists. The chosen adapter is logged.
//
// DEVICE LIMITS:
// Under a non-Native profile we request *lower* limits than the hardware
// supports. wgpu validates every dispatch against the requested limits, so
// a fill that would not fit the target fails here first.
//
// ERROR SCOPES:
// wgpu reports allocation and validation failures to an uncaptured-error
// handler, which panics by default. Every fill submission runs inside an
// OutOfMemory + Validation scope instead, and the popped error becomes a
// `GpuError` the painting tool can recover from.
//
// NEW RUST CONCEPTS:
// - `pollster::block_on` — runs an async fn to completion on the current
//   thread. wgpu's adapter, device, and error-scope APIs are async because
//   on the web they map to JS Promises; natively we just block.
// - Closures as `impl FnOnce() -> T` parameters: `scoped` wraps arbitrary
//   resource creation without knowing what it returns.

use std::fmt;

/// Hardware profile controlling device limits and default workgroup sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceProfile {
    /// The adapter's default limits.
    Native,
    /// Embedded-class limits: 256 invocations per workgroup, 4096² textures.
    Constrained,
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceProfile::Native => write!(f, "Native"),
            DeviceProfile::Constrained => write!(f, "Constrained (capped limits)"),
        }
    }
}

/// A workgroup size for 2D compute dispatches.
///
/// The product must not exceed the profile's
/// `max_compute_invocations_per_workgroup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    /// Total invocations per workgroup (x * y).
    pub fn total(&self) -> u32 {
        self.x * self.y
    }

    /// Default for a profile.
    ///
    /// - `Native`: 16×8 = 128 invocations, a whole number of warps and
    ///   wavefronts, 16 texels wide along rows.
    /// - `Constrained`: 8×8 = 64 invocations.
    pub fn for_profile(profile: DeviceProfile) -> Self {
        match profile {
            DeviceProfile::Native => WorkgroupSize { x: 16, y: 8 },
            DeviceProfile::Constrained => WorkgroupSize { x: 8, y: 8 },
        }
    }

    /// Substitute `{{WG_X}}` / `{{WG_Y}}` in a WGSL template.
    ///
    /// naga does not accept `override` expressions in `@workgroup_size`, so
    /// the size is baked into the source text.
    pub fn specialize(&self, template: &str) -> String {
        template
            .replace("{{WG_X}}", &self.x.to_string())
            .replace("{{WG_Y}}", &self.y.to_string())
    }

    /// Workgroups needed to cover `w × h` texels (ceiling division).
    ///
    /// Shaders must guard against the overhang:
    /// ```wgsl
    /// if gid.x >= size.x || gid.y >= size.y { return; }
    /// ```
    pub fn dispatch_size(&self, w: u32, h: u32) -> (u32, u32) {
        (w.div_ceil(self.x), h.div_ceil(self.y))
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{} ({} invocations)", self.x, self.y, self.total())
    }
}

/// Cached adapter information for logging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.backend, self.device_type)
    }
}

/// Adapter, device, queue, and active profile.
///
/// Expensive to create; hold one for the whole painting session.
///
/// # Field drop order
/// Fields drop top to bottom. `_instance` is last so the instance outlives
/// the device and queue; some Vulkan layers crash when the instance is
/// destroyed first.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub profile: DeviceProfile,
    pub adapter_info: AdapterInfo,
    pub workgroup_size: WorkgroupSize,
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// First hardware adapter with `DeviceProfile::Native` limits.
    ///
    /// # Errors
    /// No adapter, or the device request failed.
    pub fn new() -> Result<Self, GpuError> {
        Self::new_with_profile(DeviceProfile::Native)
    }

    pub fn new_with_profile(profile: DeviceProfile) -> Result<Self, GpuError> {
        pollster::block_on(Self::init_async(profile))
    }

    async fn init_async(profile: DeviceProfile) -> Result<Self, GpuError> {
        let flags = if cfg!(debug_assertions) {
            wgpu::InstanceFlags::VALIDATION
                | wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        } else {
            wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        };
        let backends = wgpu::Backends::PRIMARY;
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            flags,
            ..Default::default()
        });

        let adapters = instance.enumerate_adapters(backends);
        for a in &adapters {
            let info = a.get_info();
            log::debug!(
                "[seamfill::gpu] adapter: {} ({:?}, {:?})",
                info.name, info.backend, info.device_type
            );
        }

        // Hardware first; a software adapter only when it is all there is.
        let mut software = None;
        let mut hardware = None;
        for a in adapters {
            if a.get_info().device_type == wgpu::DeviceType::Cpu {
                software.get_or_insert(a);
            } else if hardware.is_none() {
                hardware = Some(a);
            }
        }
        let adapter = hardware.or(software).ok_or(GpuError::NoSuitableAdapter)?;

        let raw = adapter.get_info();
        let adapter_info = AdapterInfo {
            name: raw.name.clone(),
            device_type: raw.device_type,
            backend: raw.backend,
        };
        if raw.device_type == wgpu::DeviceType::Cpu {
            log::warn!("[seamfill::gpu] only a software adapter is available: {adapter_info}");
        }

        // V3D (Raspberry Pi) drivers report tight limits: switch profile.
        let profile = match profile {
            DeviceProfile::Native if raw.name.to_ascii_lowercase().contains("v3d") => {
                log::info!("[seamfill::gpu] V3D adapter detected, using Constrained profile");
                DeviceProfile::Constrained
            }
            other => other,
        };

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("seamfill"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits_for_profile(profile),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(GpuError::DeviceRequest)?;

        let workgroup_size = WorkgroupSize::for_profile(profile);
        log::info!(
            "[seamfill::gpu] using {adapter_info}, profile {profile}, workgroup {workgroup_size}"
        );

        Ok(GpuDevice {
            device,
            queue,
            profile,
            adapter_info,
            workgroup_size,
            _instance: instance,
        })
    }

    /// Override the default workgroup size. Pipelines built afterwards use
    /// the new size.
    ///
    /// # Errors
    /// `WorkgroupTooLarge` if `x * y` exceeds the profile's limit.
    pub fn set_workgroup_size(&mut self, x: u32, y: u32) -> Result<(), GpuError> {
        check_workgroup(x, y, self.profile)?;
        self.workgroup_size = WorkgroupSize { x, y };
        Ok(())
    }

    /// Workgroups needed to cover an `img_w × img_h` dispatch.
    pub fn dispatch_size(&self, img_w: u32, img_h: u32) -> (u32, u32) {
        self.workgroup_size.dispatch_size(img_w, img_h)
    }

    /// Run `f` inside OutOfMemory and Validation error scopes.
    ///
    /// # Errors
    /// `OutOfMemory` / `Validation` carrying `label` and wgpu's message.
    pub fn scoped<T>(&self, label: &str, f: impl FnOnce() -> T) -> Result<T, GpuError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let out = f();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        if let Some(e) = oom {
            return Err(GpuError::OutOfMemory(format!("{label}: {e}")));
        }
        if let Some(e) = validation {
            return Err(GpuError::Validation(format!("{label}: {e}")));
        }
        Ok(out)
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GpuDevice {{ adapter: {}, profile: {}, workgroup: {} }}",
            self.adapter_info, self.profile, self.workgroup_size
        )
    }
}

// ============================================================
// Limits helpers
// ============================================================

fn limits_for_profile(profile: DeviceProfile) -> wgpu::Limits {
    match profile {
        DeviceProfile::Native => wgpu::Limits::default(),
        DeviceProfile::Constrained => wgpu::Limits {
            max_compute_invocations_per_workgroup: 256,
            max_compute_workgroup_size_x: 256,
            max_compute_workgroup_size_y: 256,
            max_compute_workgroup_size_z: 64,
            max_texture_dimension_2d: 4096,
            max_storage_buffer_binding_size: 128 << 20,
            ..wgpu::Limits::default()
        },
    }
}

fn max_invocations_for_profile(profile: DeviceProfile) -> u32 {
    limits_for_profile(profile).max_compute_invocations_per_workgroup
}

/// `x · y` invocations against the profile limit. A product that overflows
/// u32 is reported as `u32::MAX`.
fn check_workgroup(x: u32, y: u32, profile: DeviceProfile) -> Result<u32, GpuError> {
    let max = max_invocations_for_profile(profile);
    match x.checked_mul(y) {
        Some(total) if total <= max => Ok(total),
        total => Err(GpuError::WorkgroupTooLarge { total: total.unwrap_or(u32::MAX), max }),
    }
}

// ============================================================
// Error type
// ============================================================

/// Errors from GPU device setup and fill submission.
#[derive(Debug)]
pub enum GpuError {
    /// No adapter on any primary backend.
    NoSuitableAdapter,
    /// wgpu device request failed (driver issue, unsupported limits, etc.).
    DeviceRequest(wgpu::RequestDeviceError),
    /// Requested workgroup size exceeds the profile's invocation limit.
    WorkgroupTooLarge { total: u32, max: u32 },
    /// A resource allocation failed inside an error scope.
    OutOfMemory(String),
    /// wgpu rejected a pipeline, bind group, or dispatch.
    Validation(String),
    /// Mapping a readback buffer failed.
    MapFailed(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::NoSuitableAdapter => write!(
                f,
                "no GPU adapter found on Vulkan, Metal, DX12, or WebGPU"
            ),
            GpuError::DeviceRequest(e) => write!(f, "device request failed: {e}"),
            GpuError::WorkgroupTooLarge { total, max } => write!(
                f,
                "workgroup size {total} exceeds profile limit of {max} invocations"
            ),
            GpuError::OutOfMemory(what) => write!(f, "out of GPU memory ({what})"),
            GpuError::Validation(what) => write!(f, "GPU validation error ({what})"),
            GpuError::MapFailed(what) => write!(f, "readback map failed ({what})"),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::DeviceRequest(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================================
// Tests
// ============================================================
