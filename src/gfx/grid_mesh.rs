//! Grid mesh data shared between compute and rasterization
//!
//! The vertex buffer holds two stacked grids: the fluid surface nodes first,
//! then the floor mesh nodes. The index buffer triangulates both over the
//! *maximum* grid extent once at startup and never changes; partial rendering
//! is achieved by drawing a prefix of each block's rows.

/// One grid node as seen by both the compute passes and the vertex shader.
///
/// The `color` field carries an RGBA8 color packed into the float's bits by
/// the shading passes; the vertex shader unpacks it.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SurfaceVertex {
    pub position: [f32; 3],
    pub color: f32,
}

impl SurfaceVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SurfaceVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

/// Number of indices in one block (fluid or floor) of the index buffer.
pub fn block_index_count(max_x: u32, max_y: u32) -> u32 {
    (max_x - 1) * (max_y - 1) * 6
}

/// Number of indices covering `visible_y` rows of one block, the quantity a
/// partial draw uses.
pub fn visible_index_count(max_x: u32, visible_y: u32) -> u32 {
    (max_x - 1) * (visible_y.saturating_sub(1)) * 6
}

/// Builds the two-block triangle list: fluid cells first, then floor cells
/// offset by one full grid of nodes. Triangles wind clockwise because the
/// render transform flips the vertical axis.
pub fn build_grid_indices(max_x: u32, max_y: u32) -> Vec<u32> {
    let nodes = max_x * max_y;
    let block = block_index_count(max_x, max_y) as usize;
    let mut indices = vec![0u32; block * 2];

    for base in [0u32, nodes] {
        let offset = if base == 0 { 0 } else { block };
        for j in 0..max_y - 1 {
            for i in 0..max_x - 1 {
                let cell = offset + ((j * (max_x - 1) + i) * 6) as usize;
                indices[cell] = base + i + j * max_x;
                indices[cell + 1] = base + (i + 1) + j * max_x;
                indices[cell + 2] = base + (i + 1) + (j + 1) * max_x;

                indices[cell + 3] = base + i + j * max_x;
                indices[cell + 4] = base + (i + 1) + (j + 1) * max_x;
                indices[cell + 5] = base + i + (j + 1) * max_x;
            }
        }
    }

    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_record_is_16_bytes() {
        assert_eq!(std::mem::size_of::<SurfaceVertex>(), 16);
    }

    #[test]
    fn fluid_block_references_only_fluid_nodes() {
        let (max_x, max_y) = (8, 6);
        let nodes = max_x * max_y;
        let indices = build_grid_indices(max_x, max_y);
        let block = block_index_count(max_x, max_y) as usize;

        for &idx in &indices[..block] {
            assert!(idx < nodes, "fluid index {} out of range", idx);
        }
        for &idx in &indices[block..] {
            assert!(
                (nodes..2 * nodes).contains(&idx),
                "floor index {} out of range",
                idx
            );
        }
    }

    #[test]
    fn visible_rows_reference_only_visible_nodes() {
        // Drawing the first (visible_y - 1) rows of cells must only touch
        // nodes with j < visible_y, for any visible_y up to the maximum.
        let (max_x, max_y) = (16, 16);
        let indices = build_grid_indices(max_x, max_y);

        for visible_y in 2..=max_y {
            let count = visible_index_count(max_x, visible_y) as usize;
            let node_bound = max_x * visible_y;
            for &idx in &indices[..count] {
                assert!(idx < node_bound);
            }
        }
    }

    #[test]
    fn floor_block_starts_at_fluid_block_length() {
        let (max_x, max_y) = (8, 8);
        let indices = build_grid_indices(max_x, max_y);
        let block = block_index_count(max_x, max_y) as usize;
        assert_eq!(indices.len(), block * 2);

        // First floor triangle references the floor copy of node (0, 0).
        assert_eq!(indices[block], max_x * max_y);
    }

    #[test]
    fn triangle_count_matches_cell_grid() {
        let (max_x, max_y) = (32, 20);
        assert_eq!(block_index_count(max_x, max_y), 31 * 19 * 6);
        assert_eq!(visible_index_count(max_x, 10), 31 * 9 * 6);
        assert_eq!(visible_index_count(max_x, 1), 0);
    }
}
