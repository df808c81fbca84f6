//! Buffer/Image Allocator
//!
//! Typed handle-based GPU allocation with named debug labels. Handles
//! are generational slotmap keys: the allocator is the only place native
//! wgpu objects are resolved, and a destroyed handle simply stops
//! resolving instead of dangling.
//!
//! Creation failure returns `None` (the invalid-handle sentinel);
//! callers branch and degrade, they never dereference.

use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Opaque handle to an allocator-owned buffer.
    pub struct BufferHandle;
    /// Opaque handle to an allocator-owned image.
    pub struct ImageHandle;
}

/// Buffer creation parameters.
pub struct BufferDesc<'a> {
    pub label: &'a str,
    pub size: u64,
    pub usage: wgpu::BufferUsages,
    /// Copied in synchronously through a mapped-at-creation window.
    pub initial_data: Option<&'a [u8]>,
}

/// Image creation parameters. Also serves as the alias-pool key (minus
/// the label), so it stays `Clone + PartialEq + Eq + Hash`.
#[derive(Clone, Debug)]
pub struct ImageDesc {
    pub label: &'static str,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
    pub depth_or_layers: u32,
    pub dimension: wgpu::TextureDimension,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub usage: wgpu::TextureUsages,
}

struct BufferEntry {
    buffer: wgpu::Buffer,
    size: u64,
}

struct ImageEntry {
    texture: wgpu::Texture,
    default_view: wgpu::TextureView,
    /// Per-mip single-level views, built eagerly; blit chains and
    /// storage bindings address individual mips through these.
    mip_views: Vec<wgpu::TextureView>,
    desc: ImageDesc,
}

/// Owns every native buffer and image; everything else holds handles.
pub struct GpuAllocator {
    device: wgpu::Device,
    max_buffer_size: u64,
    max_texture_dimension_2d: u32,
    max_texture_dimension_3d: u32,
    buffers: SlotMap<BufferHandle, BufferEntry>,
    images: SlotMap<ImageHandle, ImageEntry>,
}

impl GpuAllocator {
    #[must_use]
    pub fn new(device: wgpu::Device) -> Self {
        let limits = device.limits();
        Self {
            max_buffer_size: limits.max_buffer_size,
            max_texture_dimension_2d: limits.max_texture_dimension_2d,
            max_texture_dimension_3d: limits.max_texture_dimension_3d,
            device,
            buffers: SlotMap::with_key(),
            images: SlotMap::with_key(),
        }
    }

    // ── Buffers ────────────────────────────────────────────────────────────

    /// Creates a buffer; `None` on an invalid or over-limit request.
    pub fn create_buffer(&mut self, desc: &BufferDesc) -> Option<BufferHandle> {
        if desc.size == 0 || desc.size > self.max_buffer_size {
            log::error!(
                "buffer '{}' rejected: size {} outside (0, {}]",
                desc.label,
                desc.size,
                self.max_buffer_size
            );
            return None;
        }
        if let Some(data) = desc.initial_data {
            debug_assert_eq!(data.len() as u64, desc.size);
        }

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: desc.size,
            usage: desc.usage,
            mapped_at_creation: desc.initial_data.is_some(),
        });
        if let Some(data) = desc.initial_data {
            buffer
                .slice(..)
                .get_mapped_range_mut()
                .copy_from_slice(data);
            buffer.unmap();
        }

        Some(self.buffers.insert(BufferEntry {
            buffer,
            size: desc.size,
        }))
    }

    /// Immediate destruction. The caller guarantees no unreached timeline
    /// value still references the object; deferred paths go through the
    /// timeline coordinator instead.
    pub fn destroy_buffer(&mut self, handle: BufferHandle) -> bool {
        if let Some(entry) = self.buffers.remove(handle) {
            entry.buffer.destroy();
            true
        } else {
            false
        }
    }

    #[inline]
    #[must_use]
    pub fn buffer(&self, handle: BufferHandle) -> Option<&wgpu::Buffer> {
        self.buffers.get(handle).map(|entry| &entry.buffer)
    }

    #[inline]
    #[must_use]
    pub fn buffer_size(&self, handle: BufferHandle) -> Option<u64> {
        self.buffers.get(handle).map(|entry| entry.size)
    }

    // ── Images ─────────────────────────────────────────────────────────────

    /// Creates an image with its default and per-mip views; `None` on an
    /// over-limit request.
    pub fn create_image(&mut self, desc: &ImageDesc) -> Option<ImageHandle> {
        let dimension_limit = match desc.dimension {
            wgpu::TextureDimension::D3 => self.max_texture_dimension_3d,
            _ => self.max_texture_dimension_2d,
        };
        if desc.width == 0
            || desc.height == 0
            || desc.width > dimension_limit
            || desc.height > dimension_limit
        {
            log::error!(
                "image '{}' rejected: extent {}x{} outside limits",
                desc.label,
                desc.width,
                desc.height
            );
            return None;
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.depth_or_layers,
            },
            mip_level_count: desc.mip_level_count,
            sample_count: desc.sample_count,
            dimension: desc.dimension,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });

        let default_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mip_views = (0..desc.mip_level_count)
            .map(|mip| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(desc.label),
                    base_mip_level: mip,
                    mip_level_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        Some(self.images.insert(ImageEntry {
            texture,
            default_view,
            mip_views,
            desc: desc.clone(),
        }))
    }

    pub fn destroy_image(&mut self, handle: ImageHandle) -> bool {
        if let Some(entry) = self.images.remove(handle) {
            entry.texture.destroy();
            true
        } else {
            false
        }
    }

    #[inline]
    #[must_use]
    pub fn image(&self, handle: ImageHandle) -> Option<&wgpu::Texture> {
        self.images.get(handle).map(|entry| &entry.texture)
    }

    #[inline]
    #[must_use]
    pub fn image_view(&self, handle: ImageHandle) -> Option<&wgpu::TextureView> {
        self.images.get(handle).map(|entry| &entry.default_view)
    }

    #[inline]
    #[must_use]
    pub fn image_mip_view(&self, handle: ImageHandle, mip: u32) -> Option<&wgpu::TextureView> {
        self.images
            .get(handle)
            .and_then(|entry| entry.mip_views.get(mip as usize))
    }

    #[inline]
    #[must_use]
    pub fn image_desc(&self, handle: ImageHandle) -> Option<&ImageDesc> {
        self.images.get(handle).map(|entry| &entry.desc)
    }

    // ── Observability ──────────────────────────────────────────────────────

    #[must_use]
    pub fn resident_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    #[must_use]
    pub fn resident_image_count(&self) -> usize {
        self.images.len()
    }
}
