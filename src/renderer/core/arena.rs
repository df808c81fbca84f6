//! Frame Arena
//!
//! Per-in-flight-frame upload rings plus a transient-image alias pool.
//!
//! Each frame slot owns a staging ring (`MAP_WRITE | COPY_SRC`) mirrored
//! by a device-local ring with the bindable usages; slices are written
//! through the persistent mapping and copied across in one
//! `copy_buffer_to_buffer` at the top of the frame's command stream.
//! Requests larger than the ring's free tail open an overflow sub-ring;
//! requests beyond the sub-ring cap are rejected and the caller skips
//! the dependent work with a warning.
//!
//! A slot is reset only after the timeline confirms its last signaled
//! value: `begin_frame` rewinds the ring head, destroys the slot's
//! transient buffers, and moves its transient images into the alias
//! pool, keyed by their descriptor. Alias hits bump `image_alias_reuses`
//! for the stats overlay.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::allocator::{BufferDesc, BufferHandle, GpuAllocator, ImageDesc, ImageHandle};
use crate::renderer::settings::FRAMES_IN_FLIGHT;

/// Default capacity of a slot's primary upload ring.
pub const UPLOAD_RING_CAPACITY: u64 = 24 * 1024 * 1024;

/// Largest overflow sub-ring the arena will open for one request.
const MAX_SUB_RING_CAPACITY: u64 = 256 * 1024 * 1024;

/// Upload classification, used only for per-kind byte accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum UploadKind {
    CameraUniform = 0,
    InstanceData = 1,
    PreviewData = 2,
    Unknown = 3,
}

const UPLOAD_KIND_COUNT: usize = 4;

/// A slice of a slot's upload ring, valid for the current frame.
#[derive(Debug, Clone, Copy)]
pub struct ArenaSlice {
    pub slot: usize,
    pub ring: usize,
    pub offset: u64,
    pub size: u64,
}

/// Per-slot active counters for the stats overlay.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActiveStats {
    pub used_bytes: u64,
    pub capacity_bytes: u64,
    pub kind_bytes: [u64; UPLOAD_KIND_COUNT],
    pub transient_buffers: usize,
    pub transient_images: usize,
}

/// Pool-wide counters for the stats overlay.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResidentStats {
    pub pooled_images: usize,
    pub image_alias_reuses: u64,
    pub sub_rings_opened: u64,
}

struct UploadRing {
    staging: wgpu::Buffer,
    device_local: wgpu::Buffer,
    capacity: u64,
    head: u64,
    mapped: bool,
    remap_ready: Arc<AtomicBool>,
}

impl UploadRing {
    fn new(device: &wgpu::Device, slot: usize, index: usize, capacity: u64) -> Self {
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("frameArena.slot{slot}.ring{index}.staging")),
            size: capacity,
            usage: wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: true,
        });
        let device_local = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("frameArena.slot{slot}.ring{index}.device")),
            size: capacity,
            usage: wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::UNIFORM
                | wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::INDEX
                | wgpu::BufferUsages::INDIRECT,
            mapped_at_creation: false,
        });
        Self {
            staging,
            device_local,
            capacity,
            head: 0,
            mapped: true,
            remap_ready: Arc::new(AtomicBool::new(true)),
        }
    }

    fn try_allocate(&mut self, size: u64, alignment: u64) -> Option<u64> {
        let alignment = alignment.max(4);
        let offset = self.head.next_multiple_of(alignment);
        if offset + size > self.capacity {
            return None;
        }
        self.head = offset + size;
        Some(offset)
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct AliasKey {
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    depth_or_layers: u32,
    dimension: wgpu::TextureDimension,
    mip_level_count: u32,
    sample_count: u32,
    usage: wgpu::TextureUsages,
}

impl AliasKey {
    fn from_desc(desc: &ImageDesc) -> Self {
        Self {
            format: desc.format,
            width: desc.width,
            height: desc.height,
            depth_or_layers: desc.depth_or_layers,
            dimension: desc.dimension,
            mip_level_count: desc.mip_level_count,
            sample_count: desc.sample_count,
            usage: desc.usage,
        }
    }
}

struct FrameSlot {
    rings: SmallVec<[UploadRing; 1]>,
    kind_bytes: [u64; UPLOAD_KIND_COUNT],
    transient_buffers: Vec<BufferHandle>,
    transient_images: Vec<(AliasKey, ImageHandle)>,
}

/// The per-frame upload and transient-resource arena.
///
/// Single-threaded: at most one concurrent user per slot, no locking.
pub struct FrameArena {
    device: wgpu::Device,
    slots: Vec<FrameSlot>,
    alias_pool: FxHashMap<AliasKey, Vec<ImageHandle>>,
    image_alias_reuses: u64,
    sub_rings_opened: u64,
}

impl FrameArena {
    #[must_use]
    pub fn new(device: wgpu::Device) -> Self {
        let slots = (0..FRAMES_IN_FLIGHT)
            .map(|slot| FrameSlot {
                rings: SmallVec::from_iter([UploadRing::new(
                    &device,
                    slot,
                    0,
                    UPLOAD_RING_CAPACITY,
                )]),
                kind_bytes: [0; UPLOAD_KIND_COUNT],
                transient_buffers: Vec::new(),
                transient_images: Vec::new(),
            })
            .collect();
        Self {
            device,
            slots,
            alias_pool: FxHashMap::default(),
            image_alias_reuses: 0,
            sub_rings_opened: 0,
        }
    }

    // ── Frame boundary ─────────────────────────────────────────────────────

    /// Resets a slot for reuse. The caller has already confirmed the
    /// slot's last signaled timeline value is reached.
    pub fn begin_frame(&mut self, slot: usize, allocator: &mut GpuAllocator) {
        let frame_slot = &mut self.slots[slot];

        // Overflow sub-rings only live for one round trip.
        frame_slot.rings.truncate(1);
        let ring = &mut frame_slot.rings[0];
        if !ring.mapped {
            if ring.remap_ready.load(Ordering::Acquire) {
                ring.mapped = true;
            } else {
                // The timeline said this slot completed, so the remap
                // callback should have fired; recreate rather than stall.
                log::warn!("frame arena slot {slot} remap incomplete, recreating ring");
                *ring = UploadRing::new(&self.device, slot, 0, ring.capacity);
            }
        }
        ring.head = 0;
        frame_slot.kind_bytes = [0; UPLOAD_KIND_COUNT];

        for handle in frame_slot.transient_buffers.drain(..) {
            allocator.destroy_buffer(handle);
        }
        for (key, handle) in frame_slot.transient_images.drain(..) {
            self.alias_pool.entry(key).or_default().push(handle);
        }
    }

    /// Unmaps the slot's staging rings; call immediately before the
    /// frame's submissions.
    pub fn finish_uploads(&mut self, slot: usize) {
        for ring in &mut self.slots[slot].rings {
            if ring.mapped {
                ring.staging.unmap();
                ring.mapped = false;
            }
        }
    }

    /// Requests the primary ring be remapped once the GPU is done with
    /// it; call right after the frame's submissions.
    pub fn schedule_remap(&mut self, slot: usize) {
        let ring = &mut self.slots[slot].rings[0];
        ring.remap_ready.store(false, Ordering::Release);
        let ready = ring.remap_ready.clone();
        ring.staging
            .slice(..)
            .map_async(wgpu::MapMode::Write, move |result| {
                if result.is_ok() {
                    ready.store(true, Ordering::Release);
                }
            });
    }

    /// Encodes the staging → device-local copies for everything uploaded
    /// this frame. Must be the first work in the frame's command stream.
    pub fn encode_ring_copies(&self, slot: usize, encoder: &mut wgpu::CommandEncoder) {
        for ring in &self.slots[slot].rings {
            if ring.head > 0 {
                encoder.copy_buffer_to_buffer(
                    &ring.staging,
                    0,
                    &ring.device_local,
                    0,
                    ring.head.next_multiple_of(4),
                );
            }
        }
    }

    // ── Upload allocation ──────────────────────────────────────────────────

    /// Copies `data` into the slot's upload ring and returns the slice,
    /// or `None` when the request exceeds the free tail of every ring and
    /// the sub-ring cap (the caller skips the dependent work).
    pub fn allocate_upload(
        &mut self,
        slot: usize,
        data: &[u8],
        alignment: u64,
        kind: UploadKind,
    ) -> Option<ArenaSlice> {
        let size = data.len() as u64;
        if size == 0 {
            return None;
        }
        let frame_slot = &mut self.slots[slot];

        let mut placement = None;
        for (ring_index, ring) in frame_slot.rings.iter_mut().enumerate() {
            if let Some(offset) = ring.try_allocate(size, alignment) {
                placement = Some((ring_index, offset));
                break;
            }
        }
        let (ring_index, offset) = match placement {
            Some(found) => found,
            None => {
                let capacity = size
                    .next_multiple_of(alignment.max(4))
                    .max(UPLOAD_RING_CAPACITY);
                if capacity > MAX_SUB_RING_CAPACITY {
                    log::warn!(
                        "upload of {size} bytes rejected: exceeds sub-ring cap {MAX_SUB_RING_CAPACITY}"
                    );
                    return None;
                }
                let ring_index = frame_slot.rings.len();
                frame_slot
                    .rings
                    .push(UploadRing::new(&self.device, slot, ring_index, capacity));
                self.sub_rings_opened += 1;
                let offset = frame_slot.rings[ring_index]
                    .try_allocate(size, alignment)
                    .expect("fresh sub-ring must fit its sizing request");
                (ring_index, offset)
            }
        };

        let ring = &frame_slot.rings[ring_index];
        debug_assert!(ring.mapped);
        ring.staging
            .slice(offset..offset + size)
            .get_mapped_range_mut()
            .copy_from_slice(data);
        frame_slot.kind_bytes[kind as usize] += size;

        Some(ArenaSlice {
            slot,
            ring: ring_index,
            offset,
            size,
        })
    }

    /// The bindable (device-local) buffer backing a slice.
    #[must_use]
    pub fn device_buffer(&self, slice: ArenaSlice) -> &wgpu::Buffer {
        &self.slots[slice.slot].rings[slice.ring].device_local
    }

    /// The slot's primary device-local ring; the shared globals bind
    /// group binds into it, so the camera uniform and draw-params slices
    /// must land in ring 0 (they are allocated first each frame).
    #[must_use]
    pub fn primary_device_buffer(&self, slot: usize) -> &wgpu::Buffer {
        &self.slots[slot].rings[0].device_local
    }

    /// The staging buffer backing a slice; source for transfer copies.
    #[must_use]
    pub fn staging_buffer(&self, slice: ArenaSlice) -> &wgpu::Buffer {
        &self.slots[slice.slot].rings[slice.ring].staging
    }

    // ── Transient resources ────────────────────────────────────────────────

    /// Creates a buffer whose lifetime ends at the slot's next
    /// `begin_frame`.
    pub fn create_transient_buffer(
        &mut self,
        slot: usize,
        allocator: &mut GpuAllocator,
        desc: &BufferDesc,
    ) -> Option<BufferHandle> {
        let handle = allocator.create_buffer(desc)?;
        self.slots[slot].transient_buffers.push(handle);
        Some(handle)
    }

    /// Acquires a transient image, reusing a pooled one with an identical
    /// descriptor when available.
    pub fn acquire_transient_image(
        &mut self,
        slot: usize,
        allocator: &mut GpuAllocator,
        desc: &ImageDesc,
    ) -> Option<ImageHandle> {
        let key = AliasKey::from_desc(desc);
        let handle = if let Some(pooled) = self
            .alias_pool
            .get_mut(&key)
            .and_then(std::vec::Vec::pop)
        {
            self.image_alias_reuses += 1;
            pooled
        } else {
            allocator.create_image(desc)?
        };
        self.slots[slot].transient_images.push((key, handle));
        Some(handle)
    }

    /// Destroys pooled images; used on resolution changes so stale
    /// extents do not linger.
    pub fn trim_alias_pool(&mut self, allocator: &mut GpuAllocator) {
        for (_, handles) in self.alias_pool.drain() {
            for handle in handles {
                allocator.destroy_image(handle);
            }
        }
    }

    // ── Observability ──────────────────────────────────────────────────────

    #[must_use]
    pub fn active_stats(&self, slot: usize) -> ActiveStats {
        let frame_slot = &self.slots[slot];
        ActiveStats {
            used_bytes: frame_slot.rings.iter().map(|r| r.head).sum(),
            capacity_bytes: frame_slot.rings.iter().map(|r| r.capacity).sum(),
            kind_bytes: frame_slot.kind_bytes,
            transient_buffers: frame_slot.transient_buffers.len(),
            transient_images: frame_slot.transient_images.len(),
        }
    }

    #[must_use]
    pub fn resident_stats(&self) -> ResidentStats {
        ResidentStats {
            pooled_images: self.alias_pool.values().map(Vec::len).sum(),
            image_alias_reuses: self.image_alias_reuses,
            sub_rings_opened: self.sub_rings_opened,
        }
    }
}
