//! Obstruction records and host-side slot management
//!
//! The GPU table is a fixed-capacity arena; a slot is never removed, only
//! marked inactive. The host mirror keeps an occupancy set alongside the
//! records so finding a free slot and iterating active obstructions do not
//! scan the whole table for sentinel states.

use crate::error::{Result, RippleError};

/// Capacity of the obstruction table.
pub const MAX_OBSTRUCTIONS: usize = 100;

/// Obstruction footprint in the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Shape {
    Circle = 0,
    Square = 1,
    HorizontalLine = 2,
    VerticalLine = 3,
}

/// Lifecycle state stored in the table. Absence is `Inactive`, not removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum State {
    Inactive = 0,
    Active = 1,
    /// Shrinking toward zero radius; the transient-motion pass deactivates
    /// the slot once the radius collapses.
    Vanishing = 2,
}

/// One slot of the GPU obstruction table. 32 bytes, shared layout with the
/// WGSL side.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Obstruction {
    pub shape: i32,
    pub x: f32,
    pub y: f32,
    pub r1: f32,
    pub u: f32,
    pub v: f32,
    pub state: i32,
    pub _pad: i32,
}

impl Obstruction {
    pub fn new(shape: Shape, x: f32, y: f32, r1: f32) -> Self {
        Self {
            shape: shape as i32,
            x,
            y,
            r1,
            u: 0.0,
            v: 0.0,
            state: State::Active as i32,
            _pad: 0,
        }
    }

    pub fn inactive() -> Self {
        Self {
            shape: Shape::Circle as i32,
            x: 0.0,
            y: 0.0,
            r1: 0.0,
            u: 0.0,
            v: 0.0,
            state: State::Inactive as i32,
            _pad: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == State::Active as i32
    }
}

/// Host mirror of the obstruction table.
///
/// Only [`crate::simulation::FluidSolver::update_obstruction`] changes GPU
/// state; this mirror is for initialization and slot bookkeeping and must be
/// refreshed by an explicit readback when GPU-side transients have moved
/// things.
pub struct ObstructionArena {
    slots: Vec<Obstruction>,
    occupied: Vec<bool>,
    free: Vec<usize>,
}

impl ObstructionArena {
    pub fn new() -> Self {
        Self {
            slots: vec![Obstruction::inactive(); MAX_OBSTRUCTIONS],
            occupied: vec![false; MAX_OBSTRUCTIONS],
            // Popping from the back hands out low slot ids first.
            free: (0..MAX_OBSTRUCTIONS).rev().collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        MAX_OBSTRUCTIONS
    }

    /// Claims an unused slot, or `None` when the table is full.
    pub fn claim_slot(&mut self) -> Option<usize> {
        let slot = self.free.pop()?;
        self.occupied[slot] = true;
        Some(slot)
    }

    /// Writes `record` into `slot` on the host mirror.
    pub fn set(&mut self, slot: usize, record: Obstruction) -> Result<()> {
        self.check_slot(slot)?;
        if record.state == State::Inactive as i32 {
            return self.release(slot).map(|_| ());
        }
        if !self.occupied[slot] {
            self.occupied[slot] = true;
            self.free.retain(|&s| s != slot);
        }
        self.slots[slot] = record;
        Ok(())
    }

    /// Marks `slot` unused and returns its last record.
    pub fn release(&mut self, slot: usize) -> Result<Obstruction> {
        self.check_slot(slot)?;
        let old = self.slots[slot];
        if self.occupied[slot] {
            self.occupied[slot] = false;
            self.free.push(slot);
        }
        self.slots[slot] = Obstruction::inactive();
        Ok(old)
    }

    pub fn get(&self, slot: usize) -> Result<&Obstruction> {
        self.check_slot(slot)?;
        Ok(&self.slots[slot])
    }

    /// Occupied slots and their records, in slot order.
    pub fn iter_active(&self) -> impl Iterator<Item = (usize, &Obstruction)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(i, _)| self.occupied[*i])
    }

    pub fn active_count(&self) -> usize {
        self.occupied.iter().filter(|&&o| o).count()
    }

    /// The full table for GPU upload.
    pub fn records(&self) -> &[Obstruction] {
        &self.slots
    }

    /// Replaces the mirror wholesale after a GPU readback.
    pub fn refresh_from(&mut self, records: &[Obstruction]) {
        assert_eq!(records.len(), MAX_OBSTRUCTIONS);
        self.slots.copy_from_slice(records);
        self.free.clear();
        for slot in (0..MAX_OBSTRUCTIONS).rev() {
            let live = self.slots[slot].state != State::Inactive as i32;
            self.occupied[slot] = live;
            if !live {
                self.free.push(slot);
            }
        }
    }

    fn check_slot(&self, slot: usize) -> Result<()> {
        if slot >= MAX_OBSTRUCTIONS {
            return Err(RippleError::SlotOutOfRange {
                slot,
                capacity: MAX_OBSTRUCTIONS,
            });
        }
        Ok(())
    }
}

impl Default for ObstructionArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_32_bytes() {
        assert_eq!(std::mem::size_of::<Obstruction>(), 32);
    }

    #[test]
    fn claims_hand_out_low_slots_first() {
        let mut arena = ObstructionArena::new();
        assert_eq!(arena.claim_slot(), Some(0));
        assert_eq!(arena.claim_slot(), Some(1));
        arena.release(0).unwrap();
        assert_eq!(arena.claim_slot(), Some(0));
    }

    #[test]
    fn out_of_range_slot_is_rejected() {
        let mut arena = ObstructionArena::new();
        let record = Obstruction::new(Shape::Circle, 1.0, 2.0, 5.0);
        assert!(matches!(
            arena.set(MAX_OBSTRUCTIONS, record),
            Err(RippleError::SlotOutOfRange { .. })
        ));
        assert!(arena.get(MAX_OBSTRUCTIONS).is_err());
    }

    #[test]
    fn active_iteration_skips_unoccupied_slots() {
        let mut arena = ObstructionArena::new();
        let a = arena.claim_slot().unwrap();
        let b = arena.claim_slot().unwrap();
        arena.set(a, Obstruction::new(Shape::Circle, 10.0, 10.0, 4.0)).unwrap();
        arena.set(b, Obstruction::new(Shape::Square, 20.0, 20.0, 6.0)).unwrap();
        arena.release(a).unwrap();

        let active: Vec<usize> = arena.iter_active().map(|(i, _)| i).collect();
        assert_eq!(active, vec![b]);
        assert_eq!(arena.active_count(), 1);
    }

    #[test]
    fn arena_fills_to_capacity() {
        let mut arena = ObstructionArena::new();
        for _ in 0..MAX_OBSTRUCTIONS {
            assert!(arena.claim_slot().is_some());
        }
        assert_eq!(arena.claim_slot(), None);
    }

    #[test]
    fn random_claims_and_releases_keep_occupancy_consistent() {
        use rand::Rng;
        let mut rng = rand::rng();
        let mut arena = ObstructionArena::new();
        let mut live: Vec<usize> = Vec::new();

        for _ in 0..1000 {
            if live.is_empty() || (live.len() < MAX_OBSTRUCTIONS && rng.random_bool(0.6)) {
                if let Some(slot) = arena.claim_slot() {
                    let x = rng.random_range(0.0..64.0);
                    let y = rng.random_range(0.0..64.0);
                    arena.set(slot, Obstruction::new(Shape::Circle, x, y, 2.0)).unwrap();
                    live.push(slot);
                }
            } else {
                let idx = rng.random_range(0..live.len());
                let slot = live.swap_remove(idx);
                arena.release(slot).unwrap();
            }
            assert_eq!(arena.active_count(), live.len());
        }
    }

    #[test]
    fn refresh_rebuilds_occupancy() {
        let mut arena = ObstructionArena::new();
        let mut records = vec![Obstruction::inactive(); MAX_OBSTRUCTIONS];
        records[7] = Obstruction::new(Shape::VerticalLine, 3.0, 4.0, 2.0);

        arena.refresh_from(&records);
        assert_eq!(arena.active_count(), 1);
        assert!(arena.get(7).unwrap().is_active());
        // Slot 0 is free again and handed out before 7's neighbors.
        assert_eq!(arena.claim_slot(), Some(0));
    }
}
