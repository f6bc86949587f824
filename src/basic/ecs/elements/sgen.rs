use bevy_ecs::name::Name;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use super::{generator::TargetBus, units::*};

/// Primary energy source behind a static generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    Pv,
    Wind,
    #[default]
    Other,
}

/// Static generator: a fixed P/Q injection, generation positive.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct SGenDevice {
    pub p_mw: Megawatts,
    pub q_mvar: MVar,
    pub scaling: f64,
    pub kind: GenerationKind,
}

#[derive(Bundle)]
pub struct SGenBundle {
    pub device: SGenDevice,
    pub bus: TargetBus,
    pub name: Name,
}

impl SGenBundle {
    pub fn new(name: impl Into<String>, bus: i64, p_mw: Megawatts, q_mvar: MVar, kind: GenerationKind) -> Self {
        Self {
            device: SGenDevice {
                p_mw,
                q_mvar,
                scaling: 1.0,
                kind,
            },
            bus: TargetBus(bus),
            name: Name::new(name.into()),
        }
    }
}
