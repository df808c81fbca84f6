#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

#[cfg(feature = "winit")]
pub mod app;
pub mod camera;
pub mod errors;
pub mod renderer;
pub mod sim;
pub mod world;

pub use camera::CameraPose;
pub use errors::{RenderError, Result};
pub use renderer::settings::RenderSettings;
pub use renderer::{FrameInput, Renderer};
pub use world::chunk::{Chunk, ChunkGrid, Voxel, VoxelType};
pub use world::mesher::{MeshingMode, MeshingOptions, PackedVoxelVertex};
pub use world::World;
