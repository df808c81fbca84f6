//! Voxel chunks and the chunk grid.
//!
//! A [`Chunk`] is a 32×32×32 block of voxels at integer chunk
//! coordinates. Each voxel carries a type tag and a 4-bit palette color
//! index. The [`ChunkGrid`] owns all chunks and resolves world
//! coordinates to (chunk, local) addresses.

use rustc_hash::FxHashMap;

pub const CHUNK_SIZE_X: i32 = 32;
pub const CHUNK_SIZE_Y: i32 = 32;
pub const CHUNK_SIZE_Z: i32 = 32;

const CHUNK_VOXEL_COUNT: usize =
    (CHUNK_SIZE_X * CHUNK_SIZE_Y * CHUNK_SIZE_Z) as usize;

/// Voxel type tag. The discriminant doubles as the material index in the
/// packed mesh vertex, so it must stay within 4 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum VoxelType {
    #[default]
    Empty = 0,
    Grass = 1,
    Dirt = 2,
    Stone = 3,
    Sand = 4,
    Snow = 5,
    Wood = 6,
    Leaves = 7,
    Metal = 8,
}

impl VoxelType {
    /// Decodes a persisted type tag; unknown tags collapse to `Empty`.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Grass,
            2 => Self::Dirt,
            3 => Self::Stone,
            4 => Self::Sand,
            5 => Self::Snow,
            6 => Self::Wood,
            7 => Self::Leaves,
            8 => Self::Metal,
            _ => Self::Empty,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_solid(self) -> bool {
        self != Self::Empty
    }
}

/// One voxel: a type tag plus a palette color index (low 4 bits used).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Voxel {
    pub ty: VoxelType,
    pub color: u8,
}

impl Voxel {
    pub const EMPTY: Self = Self {
        ty: VoxelType::Empty,
        color: 0,
    };

    #[must_use]
    pub fn new(ty: VoxelType, color: u8) -> Self {
        Self {
            ty,
            color: color & 0x0F,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_solid(self) -> bool {
        self.ty.is_solid()
    }
}

/// A 32³ block of voxels at integer chunk coordinates.
pub struct Chunk {
    chunk_x: i32,
    chunk_y: i32,
    chunk_z: i32,
    voxels: Vec<Voxel>,
}

impl Chunk {
    #[must_use]
    pub fn new(chunk_x: i32, chunk_y: i32, chunk_z: i32) -> Self {
        Self {
            chunk_x,
            chunk_y,
            chunk_z,
            voxels: vec![Voxel::EMPTY; CHUNK_VOXEL_COUNT],
        }
    }

    #[inline]
    #[must_use]
    pub fn chunk_x(&self) -> i32 {
        self.chunk_x
    }

    #[inline]
    #[must_use]
    pub fn chunk_y(&self) -> i32 {
        self.chunk_y
    }

    #[inline]
    #[must_use]
    pub fn chunk_z(&self) -> i32 {
        self.chunk_z
    }

    #[inline]
    fn voxel_index(x: i32, y: i32, z: i32) -> usize {
        debug_assert!(Self::contains_local(x, y, z));
        ((y * CHUNK_SIZE_Z + z) * CHUNK_SIZE_X + x) as usize
    }

    /// Whether a local coordinate lies inside the chunk.
    #[inline]
    #[must_use]
    pub fn contains_local(x: i32, y: i32, z: i32) -> bool {
        (0..CHUNK_SIZE_X).contains(&x)
            && (0..CHUNK_SIZE_Y).contains(&y)
            && (0..CHUNK_SIZE_Z).contains(&z)
    }

    #[inline]
    #[must_use]
    pub fn voxel_at(&self, x: i32, y: i32, z: i32) -> Voxel {
        self.voxels[Self::voxel_index(x, y, z)]
    }

    /// Like [`voxel_at`](Self::voxel_at) but returns `Empty` outside the
    /// chunk bounds instead of panicking. The mesher treats out-of-chunk
    /// neighbors as empty.
    #[inline]
    #[must_use]
    pub fn voxel_at_or_empty(&self, x: i32, y: i32, z: i32) -> Voxel {
        if Self::contains_local(x, y, z) {
            self.voxels[Self::voxel_index(x, y, z)]
        } else {
            Voxel::EMPTY
        }
    }

    #[inline]
    #[must_use]
    pub fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
        Self::contains_local(x, y, z) && self.voxels[Self::voxel_index(x, y, z)].is_solid()
    }

    /// Sets a voxel. Returns `true` if the stored value actually changed,
    /// so callers can keep dirty tracking a no-op for identical writes.
    pub fn set_voxel(&mut self, x: i32, y: i32, z: i32, voxel: Voxel) -> bool {
        let index = Self::voxel_index(x, y, z);
        if self.voxels[index] == voxel {
            return false;
        }
        self.voxels[index] = voxel;
        true
    }

    /// Raw voxel storage, in `x`-fastest, then `z`, then `y` order.
    #[must_use]
    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    pub(crate) fn voxels_mut(&mut self) -> &mut [Voxel] {
        &mut self.voxels
    }
}

/// Owns every chunk in the world plus a coordinate lookup index.
#[derive(Default)]
pub struct ChunkGrid {
    chunks: Vec<Chunk>,
    lookup: FxHashMap<(i32, i32, i32), usize>,
}

impl ChunkGrid {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunks_mut(&mut self) -> &mut [Chunk] {
        &mut self.chunks
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.lookup.clear();
    }

    /// Inserts a chunk, replacing any existing chunk at the same coords.
    pub fn insert(&mut self, chunk: Chunk) -> usize {
        let key = (chunk.chunk_x, chunk.chunk_y, chunk.chunk_z);
        if let Some(&index) = self.lookup.get(&key) {
            self.chunks[index] = chunk;
            index
        } else {
            let index = self.chunks.len();
            self.lookup.insert(key, index);
            self.chunks.push(chunk);
            index
        }
    }

    #[must_use]
    pub fn chunk_index_at(&self, chunk_x: i32, chunk_y: i32, chunk_z: i32) -> Option<usize> {
        self.lookup.get(&(chunk_x, chunk_y, chunk_z)).copied()
    }

    /// Resolves world coordinates to `(chunk index, local x, local y, local z)`.
    #[must_use]
    pub fn world_to_chunk_local(
        &self,
        world_x: i32,
        world_y: i32,
        world_z: i32,
    ) -> Option<(usize, i32, i32, i32)> {
        let chunk_x = world_x.div_euclid(CHUNK_SIZE_X);
        let chunk_y = world_y.div_euclid(CHUNK_SIZE_Y);
        let chunk_z = world_z.div_euclid(CHUNK_SIZE_Z);
        let index = self.chunk_index_at(chunk_x, chunk_y, chunk_z)?;
        Some((
            index,
            world_x.rem_euclid(CHUNK_SIZE_X),
            world_y.rem_euclid(CHUNK_SIZE_Y),
            world_z.rem_euclid(CHUNK_SIZE_Z),
        ))
    }

    /// Voxel lookup by world coordinates; `Empty` where no chunk exists.
    #[must_use]
    pub fn voxel_at_world(&self, world_x: i32, world_y: i32, world_z: i32) -> Voxel {
        match self.world_to_chunk_local(world_x, world_y, world_z) {
            Some((index, x, y, z)) => self.chunks[index].voxel_at(x, y, z),
            None => Voxel::EMPTY,
        }
    }

    #[must_use]
    pub fn is_solid_world(&self, world_x: i32, world_y: i32, world_z: i32) -> bool {
        self.voxel_at_world(world_x, world_y, world_z).is_solid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_voxel_reports_change() {
        let mut chunk = Chunk::new(0, 0, 0);
        let voxel = Voxel::new(VoxelType::Stone, 3);
        assert!(chunk.set_voxel(4, 5, 6, voxel));
        // Same value again is a no-op.
        assert!(!chunk.set_voxel(4, 5, 6, voxel));
        assert_eq!(chunk.voxel_at(4, 5, 6), voxel);
    }

    #[test]
    fn world_to_chunk_local_handles_negative_coords() {
        let mut grid = ChunkGrid::new();
        grid.insert(Chunk::new(-1, 0, 0));
        let (index, x, y, z) = grid.world_to_chunk_local(-1, 5, 31).unwrap();
        assert_eq!(index, 0);
        assert_eq!((x, y, z), (31, 5, 31));
    }

    #[test]
    fn insert_replaces_existing_chunk() {
        let mut grid = ChunkGrid::new();
        let first = grid.insert(Chunk::new(2, 0, 2));
        let second = grid.insert(Chunk::new(2, 0, 2));
        assert_eq!(first, second);
        assert_eq!(grid.chunks().len(), 1);
    }
}
