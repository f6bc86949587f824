use bevy_ecs::name::Name;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use super::{generator::TargetBus, units::*};

/// Constant power load, consumption positive.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct LoadDevice {
    pub p_mw: Megawatts,
    pub q_mvar: MVar,
    pub scaling: f64,
}

#[derive(Bundle)]
pub struct LoadBundle {
    pub device: LoadDevice,
    pub bus: TargetBus,
    pub name: Name,
}

impl LoadBundle {
    pub fn new(name: impl Into<String>, bus: i64, p_mw: Megawatts, q_mvar: MVar) -> Self {
        Self {
            device: LoadDevice {
                p_mw,
                q_mvar,
                scaling: 1.0,
            },
            bus: TargetBus(bus),
            name: Name::new(name.into()),
        }
    }
}
