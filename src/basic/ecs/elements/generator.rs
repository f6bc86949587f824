use bevy_ecs::name::Name;
use bevy_ecs::prelude::*;
use derive_more::derive::{Deref, From};
use serde::{Deserialize, Serialize};

use super::units::*;

/// Bus an injection element is attached to.
#[derive(Component, Debug, Clone, Copy, From, Deref, Serialize, Deserialize)]
pub struct TargetBus(pub i64);

#[derive(Component, Debug, Clone, Copy, From, Deref, Serialize, Deserialize)]
pub struct TargetPMW(pub Megawatts);

#[derive(Component, Debug, Clone, Copy, From, Deref, Serialize, Deserialize)]
pub struct TargetQMVar(pub MVar);

#[derive(Component, Debug, Clone, Copy, From, Deref, Serialize, Deserialize)]
pub struct TargetVmPu(pub PerUnit);

#[derive(Component, Debug, Clone, Copy, From, Deref, Serialize, Deserialize)]
pub struct TargetVaDeg(pub f64);

/// Marker for the external grid connection that acts as the slack.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct ExtGrid;

/// Marker for a voltage-controlled generator.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Generator;

/// External grid: fixes voltage magnitude and angle at its bus.
#[derive(Bundle)]
pub struct ExtGridBundle {
    pub marker: ExtGrid,
    pub name: Name,
    pub bus: TargetBus,
    pub vm_pu: TargetVmPu,
    pub va_degree: TargetVaDeg,
}

impl ExtGridBundle {
    pub fn new(bus: i64, vm_pu: f64, va_degree: f64) -> Self {
        Self {
            marker: ExtGrid,
            name: Name::new(format!("ext_grid_{bus}")),
            bus: TargetBus(bus),
            vm_pu: TargetVmPu(PerUnit(vm_pu)),
            va_degree: TargetVaDeg(va_degree),
        }
    }
}

/// Generator holding active power and voltage magnitude at its bus.
#[derive(Bundle)]
pub struct GeneratorBundle {
    pub marker: Generator,
    pub name: Name,
    pub bus: TargetBus,
    pub p_mw: TargetPMW,
    pub vm_pu: TargetVmPu,
}

impl GeneratorBundle {
    pub fn new(name: impl Into<String>, bus: i64, p_mw: Megawatts, vm_pu: f64) -> Self {
        Self {
            marker: Generator,
            name: Name::new(name.into()),
            bus: TargetBus(bus),
            p_mw: TargetPMW(p_mw),
            vm_pu: TargetVmPu(PerUnit(vm_pu)),
        }
    }
}
