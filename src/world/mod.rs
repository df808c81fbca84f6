//! World state and binary persistence.
//!
//! The world is a flat collection of chunks. Persistence is a small
//! versioned little-endian layout: header, chunk count, then per chunk
//! the chunk coordinates followed by `(type, color)` byte pairs for
//! every voxel in storage order.

pub mod chunk;
pub mod mesher;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::errors::{RenderError, Result};
use chunk::{CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z, Chunk, ChunkGrid, Voxel, VoxelType};

const WORLD_FILE_MAGIC: [u8; 4] = *b"VDW1";

/// Outcome of [`World::load_or_initialize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadResult {
    pub loaded_from_file: bool,
    pub initialized_fallback: bool,
}

/// The voxel world: chunk storage plus persistence.
#[derive(Default)]
pub struct World {
    chunk_grid: ChunkGrid,
}

impl World {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn chunk_grid(&self) -> &ChunkGrid {
        &self.chunk_grid
    }

    pub fn chunk_grid_mut(&mut self) -> &mut ChunkGrid {
        &mut self.chunk_grid
    }

    /// Loads the world from `path`, falling back to a freshly generated
    /// flat world when the file is absent or unreadable.
    pub fn load_or_initialize(&mut self, path: &Path) -> LoadResult {
        match self.load(path) {
            Ok(()) => LoadResult {
                loaded_from_file: true,
                initialized_fallback: false,
            },
            Err(err) => {
                log::info!("world load from {} failed ({err}), regenerating", path.display());
                self.regenerate_flat_world();
                LoadResult {
                    loaded_from_file: false,
                    initialized_fallback: true,
                }
            }
        }
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != WORLD_FILE_MAGIC {
            return Err(RenderError::WorldCorrupt("bad magic".into()));
        }

        let mut count_bytes = [0u8; 4];
        reader.read_exact(&mut count_bytes)?;
        let chunk_count = u32::from_le_bytes(count_bytes) as usize;
        // A corrupt count would otherwise allocate unbounded memory.
        if chunk_count > 65536 {
            return Err(RenderError::WorldCorrupt(format!(
                "implausible chunk count {chunk_count}"
            )));
        }

        let voxel_count = (CHUNK_SIZE_X * CHUNK_SIZE_Y * CHUNK_SIZE_Z) as usize;
        let mut grid = ChunkGrid::new();
        let mut coord = [0u8; 12];
        let mut payload = vec![0u8; voxel_count * 2];
        for _ in 0..chunk_count {
            reader.read_exact(&mut coord)?;
            let cx = i32::from_le_bytes(coord[0..4].try_into().unwrap());
            let cy = i32::from_le_bytes(coord[4..8].try_into().unwrap());
            let cz = i32::from_le_bytes(coord[8..12].try_into().unwrap());
            reader.read_exact(&mut payload)?;

            let mut chunk = Chunk::new(cx, cy, cz);
            for (voxel, pair) in chunk.voxels_mut().iter_mut().zip(payload.chunks_exact(2)) {
                *voxel = Voxel::new(VoxelType::from_u8(pair[0]), pair[1]);
            }
            grid.insert(chunk);
        }

        self.chunk_grid = grid;
        log::info!(
            "world loaded from {} ({} chunks)",
            path.display(),
            self.chunk_grid.chunks().len()
        );
        Ok(())
    }

    /// Writes the world to `path` in the binary layout `load` reads.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&WORLD_FILE_MAGIC)?;
        writer.write_all(&(self.chunk_grid.chunks().len() as u32).to_le_bytes())?;
        for chunk in self.chunk_grid.chunks() {
            writer.write_all(&chunk.chunk_x().to_le_bytes())?;
            writer.write_all(&chunk.chunk_y().to_le_bytes())?;
            writer.write_all(&chunk.chunk_z().to_le_bytes())?;
            for voxel in chunk.voxels() {
                writer.write_all(&[voxel.ty as u8, voxel.color])?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Replaces the world with a flat 4×4-chunk ground slab: stone base,
    /// dirt fill, grass on top.
    pub fn regenerate_flat_world(&mut self) {
        self.chunk_grid.clear();
        for cz in 0..4 {
            for cx in 0..4 {
                let mut chunk = Chunk::new(cx, 0, cz);
                for y in 0..CHUNK_SIZE_Y {
                    let voxel = match y {
                        0..=11 => Voxel::new(VoxelType::Stone, 7),
                        12..=14 => Voxel::new(VoxelType::Dirt, 5),
                        15 => Voxel::new(VoxelType::Grass, 2),
                        _ => Voxel::EMPTY,
                    };
                    if !voxel.is_solid() {
                        break;
                    }
                    for z in 0..CHUNK_SIZE_Z {
                        for x in 0..CHUNK_SIZE_X {
                            chunk.set_voxel(x, y, z, voxel);
                        }
                    }
                }
                self.chunk_grid.insert(chunk);
            }
        }
    }

    /// Sets a voxel by world coordinates. Returns the index of the chunk
    /// that changed, or `None` when the write hit no chunk or was a
    /// no-op (same value).
    pub fn set_voxel_world(
        &mut self,
        world_x: i32,
        world_y: i32,
        world_z: i32,
        voxel: Voxel,
    ) -> Option<usize> {
        let (index, x, y, z) = self.chunk_grid.world_to_chunk_local(world_x, world_y, world_z)?;
        let changed = self.chunk_grid.chunks_mut()[index].set_voxel(x, y, z, voxel);
        changed.then_some(index)
    }
}
