// error.rs — Errors surfaced by pyramid construction and fill calls.
//
// Configuration problems (bad level count, mismatched buffers) are reported
// synchronously from `build` / `preproc`. Device failures arrive wrapped in
// `FillError::Device` so the painting tool can treat every failure of a fill
// chain the same way: keep the old texture, report a message.

use std::fmt;

use crate::gpu::device::GpuError;

/// Errors from the fill pipeline.
#[derive(Debug)]
pub enum FillError {
    /// Width or height is zero.
    EmptyDimensions,
    /// Requested pyramid depth is 0 or deeper than the resolution allows.
    InvalidLevels {
        requested: usize,
        max: usize,
        width: usize,
        height: usize,
    },
    /// A buffer's size does not match the pyramid / filler it was given to.
    DimensionMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
    /// A buffer's channel count does not match.
    ChannelMismatch { expected: usize, got: usize },
    /// Channel count outside the supported range for this operation.
    UnsupportedChannels(usize),
    /// `CombineMode::Replace` on a pyramid built without weight planes.
    MissingWeights,
    /// More texels than a `u32` seed index can address.
    TooLarge { width: usize, height: usize },
    /// A step was requested before `preproc`.
    NotPrepared,
    /// GPU device or resource failure.
    Device(GpuError),
}

impl fmt::Display for FillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillError::EmptyDimensions => write!(f, "image dimensions must be non-zero"),
            FillError::InvalidLevels { requested, max, width, height } => write!(
                f,
                "cannot build {requested} pyramid levels for {width}×{height} \
                 (valid range is 1..={max})"
            ),
            FillError::DimensionMismatch { expected, got } => write!(
                f,
                "buffer is {}×{}, expected {}×{}",
                got.0, got.1, expected.0, expected.1
            ),
            FillError::ChannelMismatch { expected, got } => {
                write!(f, "buffer has {got} channels, expected {expected}")
            }
            FillError::UnsupportedChannels(n) => {
                write!(f, "{n} channels not supported here")
            }
            FillError::MissingWeights => write!(f, "replace mode needs a weighted pyramid"),
            FillError::TooLarge { width, height } => {
                write!(f, "{width}×{height} texels exceed the seed index range")
            }
            FillError::NotPrepared => write!(f, "fill step requested before preproc"),
            FillError::Device(e) => write!(f, "GPU failure: {e}"),
        }
    }
}

impl std::error::Error for FillError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FillError::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GpuError> for FillError {
    fn from(e: GpuError) -> Self {
        FillError::Device(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_levels_message() {
        let e = FillError::InvalidLevels { requested: 12, max: 9, width: 256, height: 256 };
        let msg = e.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("1..=9"));
        assert!(msg.contains("256×256"));
    }

    #[test]
    fn test_too_large_message() {
        let msg = FillError::TooLarge { width: 70_000, height: 70_000 }.to_string();
        assert!(msg.contains("70000×70000"), "{msg}");
    }

    #[test]
    fn test_device_error_has_source() {
        use std::error::Error;
        let e: FillError = GpuError::OutOfMemory("level 3".into()).into();
        assert!(matches!(e, FillError::Device(_)));
        assert!(e.source().is_some());
        assert!(FillError::NotPrepared.source().is_none());
    }
}
