//! Lattice-Boltzmann simulation core: domain bookkeeping, obstruction
//! state, compute pass dispatch, and the per-frame solver protocol.

pub mod domain;
pub mod obstruction;
pub mod passes;
pub mod raycast;
pub mod solver;
pub mod uniforms;

pub use domain::{Domain, MAX_XDIM, MAX_YDIM};
pub use obstruction::{Obstruction, ObstructionArena, Shape, State, MAX_OBSTRUCTIONS};
pub use solver::FluidSolver;
pub use uniforms::ContourVariable;
