//! GPU core: context, allocation, per-frame arena, timeline, timings.

pub mod allocator;
pub mod arena;
pub mod context;
pub mod timeline;
pub mod timing;

pub use allocator::{BufferDesc, BufferHandle, GpuAllocator, ImageDesc, ImageHandle};
pub use arena::{ArenaSlice, FrameArena, UploadKind};
pub use context::{FeatureSupport, GpuContext};
pub use timeline::{CompletionToken, TimelineCoordinator};
pub use timing::{GpuTimingInfo, GpuTimings};
