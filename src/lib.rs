// seamfill: seam-aware texture fill for painting on UV-mapped surfaces
//
// Painted texels are seeds. A jump flood gives every texel its nearest
// seed, and a convolution pyramid spreads the seeds smoothly over the rest
// of the texture, either as a membrane (Poisson) or by integrating their
// Laplacian. CPU reference implementation plus a wgpu compute backend.
//
// Reference: Farbman, Fattal, Lischinski, "Convolution Pyramids"
// (SIGGRAPH Asia 2011); Rong, Tan, "Jump Flooding in GPU" (I3D 2006)

pub mod image;
pub mod buffer;
pub mod convert;
pub mod convolution;
pub mod kernels;
pub mod pyramid;
pub mod composite;
pub mod flood;
pub mod fill;
pub mod poisson;
pub mod integrator;
pub mod brush;
pub mod painting;
pub mod error;
pub mod gpu;

pub use buffer::ImageBuffer;
pub use composite::Composite;
pub use error::FillError;
pub use fill::{fill_composite, FillMode, FillOptions, FillStrategy, Filler};
pub use painting::{PainterConfig, PaintingTool, ToolState};
