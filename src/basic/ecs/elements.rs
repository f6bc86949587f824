use std::collections::HashMap;

pub mod bus;
pub mod generator;
pub mod load;
pub mod sgen;
pub mod trans;
pub mod units;

pub use bus::*;
pub use generator::*;
pub use load::*;
pub use sgen::*;
pub use trans::*;
pub use units::*;

use bevy_ecs::entity::EntityHash;
use bevy_ecs::prelude::*;
use derive_more::{Deref, DerefMut};
use nalgebra::Complex;

/// Base voltage (kV) used to bring a branch admittance into per-unit.
#[derive(Debug, Component, Deref, DerefMut, Default, Clone, Copy)]
pub struct VBase(pub f64);

/// Admittance of a branch in siemens.
#[derive(Component, Clone, Default, PartialEq, Debug)]
pub struct Admittance(pub Complex<f64>);

/// The two bus ids a branch connects. Ground is [`GND`](super::network::GND).
#[derive(Component, Deref, DerefMut, Default, Debug, Clone, PartialEq)]
pub struct Port2(pub nalgebra::Vector2<i64>);

impl Port2 {
    pub fn new(from: i64, to: i64) -> Self {
        Port2(nalgebra::vector![from, to])
    }
}

/// Links a generated admittance branch back to the device entity it models.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchOf(pub Entity);

/// Represents a branch with admittance and port information.
///
/// `AdmittanceBranch` bundles together an admittance value, port information,
/// and base voltage. Transformers are expanded into a set of these before Ybus assembly.
#[derive(Debug, Bundle)]
pub struct AdmittanceBranch {
    /// The admittance value of the branch.
    pub y: Admittance,
    /// The port information (node indices) of the branch.
    pub port: Port2,
    /// Base voltage for per-unit system calculations.
    pub v_base: VBase,
    /// Device that owns the branch.
    pub owner: BranchOf,
}

/// Resource that maps bus ids to ECS entities.
#[derive(Default, Debug, Resource)]
pub struct NodeLookup {
    /// bus_id → entity
    pub forward: Vec<Option<Entity>>,
    /// entity → bus_id
    pub reverse: HashMap<Entity, i64, EntityHash>,
}

/// Resource holding the system base for per-unit conversion.
#[derive(Debug, Resource, Clone, Copy)]
pub struct PFCommonData {
    /// System base power in MVA.
    pub sbase: f64,
}

impl Default for PFCommonData {
    fn default() -> Self {
        Self { sbase: 1.0 }
    }
}

impl NodeLookup {
    pub fn len(&self) -> usize {
        self.reverse.len()
    }
    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (i64, Entity)> + '_ {
        self.forward
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|e| (i as i64, e)))
    }
    pub fn insert(&mut self, bus_id: i64, entity: Entity) {
        let idx = bus_id as usize;
        if self.forward.len() <= idx {
            self.forward.resize_with(idx + 1, || None);
        }
        self.reverse.insert(entity, bus_id);
        self.forward[idx] = Some(entity);
    }

    pub fn get_entity(&self, bus_id: i64) -> Option<Entity> {
        if bus_id < 0 {
            return None;
        }
        self.forward.get(bus_id as usize).and_then(|x| *x)
    }

    pub fn get_id(&self, entity: Entity) -> Option<i64> {
        self.reverse.get(&entity).copied()
    }

    pub fn contains_id(&self, bus_id: i64) -> bool {
        self.get_entity(bus_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_lookup() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let b = world.spawn_empty().id();
        let mut lookup = NodeLookup::default();
        lookup.insert(0, a);
        lookup.insert(1, b);
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.get_entity(1), Some(b));
        assert_eq!(lookup.get_id(a), Some(0));
        assert!(!lookup.contains_id(2));
        assert!(!lookup.contains_id(-1));
        let ids: Vec<i64> = lookup.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![0, 1]);
    }
}
