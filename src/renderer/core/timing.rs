//! GPU pass timings.
//!
//! Each frame slot owns a timestamp query set with one begin/end pair
//! per labeled pass. Queries are resolved into a readback buffer at the
//! end of the frame and read once the slot's timeline value completes,
//! then folded into an EWMA per pass for the stats overlay. Without
//! timestamp support every reading stays `None`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Smoothing factor for the per-pass EWMA.
const TIMING_EWMA_ALPHA: f32 = 0.08;

/// One frame's worth of readable pass timings.
#[derive(Debug, Clone)]
pub struct GpuTimingInfo {
    /// Smoothed milliseconds per pass, `None` when unsupported.
    pub pass_ms: Vec<Option<f32>>,
    pub supported: bool,
}

struct SlotQueries {
    query_set: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    readback: wgpu::Buffer,
    mapped: Arc<AtomicBool>,
    in_flight: bool,
    passes_recorded: u32,
}

/// Timestamp collection across the in-flight frame slots.
pub struct GpuTimings {
    slots: Vec<SlotQueries>,
    timestamp_period_ns: f32,
    pass_count: usize,
    ewma_ms: Vec<Option<f32>>,
    supported: bool,
}

impl GpuTimings {
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        supported: bool,
        slot_count: usize,
        pass_count: usize,
    ) -> Self {
        let slots = if supported {
            (0..slot_count)
                .map(|slot| {
                    let query_count = (pass_count * 2) as u32;
                    let byte_size = u64::from(query_count) * 8;
                    SlotQueries {
                        query_set: device.create_query_set(&wgpu::QuerySetDescriptor {
                            label: Some(&format!("gpuTimings.slot{slot}")),
                            ty: wgpu::QueryType::Timestamp,
                            count: query_count,
                        }),
                        resolve: device.create_buffer(&wgpu::BufferDescriptor {
                            label: Some(&format!("gpuTimings.slot{slot}.resolve")),
                            size: byte_size,
                            usage: wgpu::BufferUsages::QUERY_RESOLVE
                                | wgpu::BufferUsages::COPY_SRC,
                            mapped_at_creation: false,
                        }),
                        readback: device.create_buffer(&wgpu::BufferDescriptor {
                            label: Some(&format!("gpuTimings.slot{slot}.readback")),
                            size: byte_size,
                            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                            mapped_at_creation: false,
                        }),
                        mapped: Arc::new(AtomicBool::new(false)),
                        in_flight: false,
                        passes_recorded: 0,
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            slots,
            timestamp_period_ns: queue.get_timestamp_period(),
            pass_count,
            ewma_ms: vec![None; pass_count],
            supported,
        }
    }

    /// Timestamp writes for a render pass, or `None` when unsupported.
    #[must_use]
    pub fn render_pass_writes(
        &self,
        slot: usize,
        pass_index: usize,
    ) -> Option<wgpu::RenderPassTimestampWrites<'_>> {
        if !self.supported {
            return None;
        }
        let queries = &self.slots[slot];
        Some(wgpu::RenderPassTimestampWrites {
            query_set: &queries.query_set,
            beginning_of_pass_write_index: Some((pass_index * 2) as u32),
            end_of_pass_write_index: Some((pass_index * 2 + 1) as u32),
        })
    }

    /// Begin-only render-pass writes, for multi-render-pass scopes (the
    /// bloom chain): begin stamps the first pass, end stamps the last.
    #[must_use]
    pub fn render_pass_begin_writes(
        &self,
        slot: usize,
        pass_index: usize,
    ) -> Option<wgpu::RenderPassTimestampWrites<'_>> {
        if !self.supported {
            return None;
        }
        Some(wgpu::RenderPassTimestampWrites {
            query_set: &self.slots[slot].query_set,
            beginning_of_pass_write_index: Some((pass_index * 2) as u32),
            end_of_pass_write_index: None,
        })
    }

    /// End-only companion to [`render_pass_begin_writes`](Self::render_pass_begin_writes).
    #[must_use]
    pub fn render_pass_end_writes(
        &self,
        slot: usize,
        pass_index: usize,
    ) -> Option<wgpu::RenderPassTimestampWrites<'_>> {
        if !self.supported {
            return None;
        }
        Some(wgpu::RenderPassTimestampWrites {
            query_set: &self.slots[slot].query_set,
            beginning_of_pass_write_index: None,
            end_of_pass_write_index: Some((pass_index * 2 + 1) as u32),
        })
    }

    /// Timestamp writes for a compute pass, or `None` when unsupported.
    #[must_use]
    pub fn compute_pass_writes(
        &self,
        slot: usize,
        pass_index: usize,
    ) -> Option<wgpu::ComputePassTimestampWrites<'_>> {
        if !self.supported {
            return None;
        }
        let queries = &self.slots[slot];
        Some(wgpu::ComputePassTimestampWrites {
            query_set: &queries.query_set,
            beginning_of_pass_write_index: Some((pass_index * 2) as u32),
            end_of_pass_write_index: Some((pass_index * 2 + 1) as u32),
        })
    }

    /// Resolves this frame's queries into the readback buffer. Encoded
    /// after the last pass of the frame.
    pub fn encode_resolve(&mut self, slot: usize, encoder: &mut wgpu::CommandEncoder) {
        if !self.supported {
            return;
        }
        let queries = &mut self.slots[slot];
        // The previous round trip must be consumed before the readback
        // buffer is reused as a copy target.
        if queries.in_flight {
            return;
        }
        let query_count = (self.pass_count * 2) as u32;
        encoder.resolve_query_set(&queries.query_set, 0..query_count, &queries.resolve, 0);
        encoder.copy_buffer_to_buffer(
            &queries.resolve,
            0,
            &queries.readback,
            0,
            u64::from(query_count) * 8,
        );
        queries.passes_recorded = query_count;
        queries.in_flight = true;
    }

    /// Starts mapping the readback buffer; call after the frame submit.
    pub fn after_submit(&mut self, slot: usize) {
        if !self.supported {
            return;
        }
        let queries = &mut self.slots[slot];
        if !queries.in_flight {
            return;
        }
        queries.mapped.store(false, Ordering::Release);
        let ready = queries.mapped.clone();
        queries
            .readback
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                if result.is_ok() {
                    ready.store(true, Ordering::Release);
                }
            });
    }

    /// Reads the slot's timings once its timeline value has completed,
    /// folding them into the EWMA.
    pub fn read_completed(&mut self, slot: usize) {
        if !self.supported {
            return;
        }
        let queries = &mut self.slots[slot];
        if !queries.in_flight || !queries.mapped.load(Ordering::Acquire) {
            return;
        }

        {
            let view = queries.readback.slice(..).get_mapped_range();
            let stamps: &[u64] = bytemuck::cast_slice(&view);
            for pass in 0..self.pass_count {
                let begin = stamps[pass * 2];
                let end = stamps[pass * 2 + 1];
                if end <= begin {
                    continue;
                }
                let ms = (end - begin) as f32 * self.timestamp_period_ns * 1e-6;
                let smoothed = match self.ewma_ms[pass] {
                    Some(previous) => previous + TIMING_EWMA_ALPHA * (ms - previous),
                    None => ms,
                };
                self.ewma_ms[pass] = Some(smoothed);
            }
        }
        queries.readback.unmap();
        queries.in_flight = false;
    }

    #[must_use]
    pub fn info(&self) -> GpuTimingInfo {
        GpuTimingInfo {
            pass_ms: self.ewma_ms.clone(),
            supported: self.supported,
        }
    }
}
