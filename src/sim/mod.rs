//! Simulation collaborator interface.
//!
//! The simulation itself (belt/pipe/track logic, cargo movement) is an
//! external collaborator. Its only contract with the renderer is to
//! expose read-only arrays of plain-data entries each frame; these are
//! turned into instance streams without further interpretation.

/// A placed pipe segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pipe {
    pub world_x: i32,
    pub world_y: i32,
    pub world_z: i32,
    /// Dominant axis: 0 = X, 1 = Y, 2 = Z.
    pub axis: u8,
    pub style: u8,
}

/// A placed belt segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Belt {
    pub world_x: i32,
    pub world_y: i32,
    pub world_z: i32,
    /// Facing in quarter turns around +Y.
    pub direction: u8,
}

/// A placed track segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Track {
    pub world_x: i32,
    pub world_y: i32,
    pub world_z: i32,
    pub direction: u8,
    /// 0 = straight, 1 = curve left, 2 = curve right.
    pub shape: u8,
}

/// A cargo item riding a belt, at an interpolated world position.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeltCargo {
    pub position: [f32; 3],
    pub item_kind: u8,
}

/// One frame's read-only view of the simulation state.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulationFrame<'a> {
    pub pipes: &'a [Pipe],
    pub belts: &'a [Belt],
    pub tracks: &'a [Track],
    pub belt_cargoes: &'a [BeltCargo],
}
