use bevy_ecs::name::Name;
use bevy_ecs::prelude::*;
use derive_more::derive::{Deref, DerefMut, From, Into};
use nalgebra::Complex;
use serde::{Deserialize, Serialize};

use super::units::*;

/// Complex bus voltage in per-unit, used as the solver's starting point.
#[derive(Component, Clone, Debug, Serialize, Deserialize)]
pub struct VBusPu(pub Complex<f64>);

impl Default for VBusPu {
    fn default() -> Self {
        VBusPu(Complex::new(1.0, 0.0))
    }
}

/// Specified complex power injection at a bus in per-unit, generation positive.
#[derive(Component, Default, Clone, Debug, Serialize, Deserialize)]
pub struct SBusPu(pub Complex<f64>);

/// Marks an element that does not take part in the power flow.
#[derive(Component, Clone, Debug, Default)]
pub struct OutOfService;

#[derive(
    Component, Debug, Clone, Copy, Default, Eq, Ord, PartialEq, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct BusID(pub i64);

/// Permitted voltage band of a bus.
#[derive(Component, Clone, Copy, Debug, From, Into, Deref, DerefMut, Serialize, Deserialize)]
pub struct VmLimit(pub Limit<f64>);

impl Default for VmLimit {
    fn default() -> Self {
        Self(Limit { min: 0.9, max: 1.1 })
    }
}

impl VmLimit {
    pub fn new(min: f64, max: f64) -> Self {
        VmLimit(Limit { min, max })
    }
}

/// Nominal line-to-line voltage of a bus.
#[derive(Component, Clone, Copy, Debug, From, Into, Deref, Serialize, Deserialize)]
pub struct VNominal(pub KiloVolts);

#[derive(Bundle)]
pub struct BusBundle {
    pub name: Name,
    pub bus_id: BusID,
    pub vm_limit: VmLimit,
    pub vn_kv: VNominal,
    pub v: VBusPu,
    pub s: SBusPu,
}

impl BusBundle {
    pub fn new(id: i64, name: impl Into<String>, vn_kv: f64, vm_limit: VmLimit) -> Self {
        Self {
            name: Name::new(name.into()),
            bus_id: BusID(id),
            vm_limit,
            vn_kv: VNominal(KiloVolts(vn_kv)),
            v: VBusPu::default(),
            s: SBusPu::default(),
        }
    }
}
