// gpu/mod.rs — wgpu compute backend for the fill chain.
//
// Mirrors the CPU modules in the parent crate, which stay the reference:
// every GPU kernel is tested against its CPU counterpart.
//
//   device   adapter selection, profiles, error scopes
//   image    Rgba32Float textures, upload, readback
//   pass     shared bind group layout and dispatch helper
//   pyramid  convolution pyramid passes
//   flood    jump flood
//   fill     staging, solve, finish; the painting backend
//
// The whole chain for one fill is recorded into a single command buffer.
// Only the final texture is read back.
//
// GPU TESTS
// ─────────
// Tests that touch a real device run as `inner_*` tests in a child
// `cargo test` process, driven by an outer `#[ignore]`d test. Some drivers
// crash on process teardown; the child isolates that from the test harness.

pub mod device;
pub mod fill;
pub mod flood;
pub mod image;
pub mod pass;
pub mod pyramid;

pub use device::{DeviceProfile, GpuDevice, GpuError, WorkgroupSize};
pub use fill::{GpuFillBackend, GpuFillPipeline};

/// Run one `inner_*` test in a child process and return its combined output.
#[cfg(test)]
pub(crate) fn run_gpu_test_in_subprocess(test_name: &str) -> String {
    let output = std::process::Command::new("cargo")
        .args(["test", "--lib", "--", test_name, "--exact", "--ignored", "--nocapture"])
        .output()
        .unwrap_or_else(|e| panic!("failed to spawn subprocess for {test_name}: {e}"));
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    print!("{stdout}");
    eprint!("{stderr}");
    stdout + &stderr
}
