use bevy_ecs::name::Name;
use bevy_ecs::prelude::*;
use nalgebra::Complex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// High voltage side bus of a two-port device.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FromBus(pub i64);

/// Low voltage side bus of a two-port device.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ToBus(pub i64);

fn default_parallel() -> u32 {
    1
}

/// Two-winding transformer rating plate, pandapower conventions.
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerDevice {
    pub sn_mva: f64,
    pub vn_hv_kv: f64,
    pub vn_lv_kv: f64,
    /// Short-circuit voltage, total impedance.
    pub vk_percent: f64,
    /// Real part of the short-circuit voltage.
    pub vkr_percent: f64,
    /// Iron losses.
    #[serde(default)]
    pub pfe_kw: f64,
    /// Open-loop no-load current.
    #[serde(default)]
    pub i0_percent: f64,
    #[serde(default = "default_parallel")]
    pub parallel: u32,
    #[serde(default)]
    pub max_loading_percent: Option<f64>,
    #[serde(default)]
    pub tap: Option<TapChanger>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TapSide {
    #[default]
    Hv,
    Lv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TapChanger {
    #[serde(default)]
    pub side: TapSide,
    pub neutral: f64,
    pub pos: f64,
    pub step_percent: f64,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl TapChanger {
    /// Off-nominal turns ratio seen from the HV side.
    pub fn ratio(&self) -> f64 {
        let tap_m = 1.0 + (self.pos - self.neutral) * 0.01 * self.step_percent;
        match self.side {
            TapSide::Hv => tap_m,
            TapSide::Lv => 1.0 / tap_m,
        }
    }
}

impl TransformerDevice {
    /// Series impedance in per-unit on the system base `s_base` (MVA).
    ///
    /// `R = vkr/100 * S_base/S_rated`, `X = sqrt(vk² - vkr²)/100 * S_base/S_rated`.
    pub fn per_unit_impedance(&self, s_base: f64) -> Complex<f64> {
        let scale = s_base / self.sn_mva;
        let vk = self.vk_percent * 0.01;
        let vkr = self.vkr_percent * 0.01;
        let x = (vk.powi(2) - vkr.powi(2)).max(0.0).sqrt();
        Complex::new(vkr * scale, x * scale)
    }

    /// Magnetising admittance in per-unit on the transformer rating.
    pub fn magnetizing_admittance(&self) -> Complex<f64> {
        let gm = self.pfe_kw / (self.sn_mva * 1000.0);
        let ym = self.i0_percent * 0.01;
        let bm = (ym.powi(2) - gm.powi(2)).max(0.0).sqrt();
        Complex::new(gm, -bm)
    }

    pub fn tap_ratio(&self) -> f64 {
        self.tap.as_ref().map_or(1.0, TapChanger::ratio)
    }

    /// Checks the rating plate on its own, independent of the buses it connects.
    pub fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.sn_mva) {
            return Err(SimError::invalid_network(format!(
                "transformer rating must be positive, got {} MVA",
                self.sn_mva
            )));
        }
        if !positive(self.vn_hv_kv) || !positive(self.vn_lv_kv) {
            return Err(SimError::invalid_network(
                "transformer rated voltages must be positive",
            ));
        }
        if !positive(self.vk_percent) {
            return Err(SimError::invalid_network("vk_percent must be positive"));
        }
        if !(0.0..=self.vk_percent).contains(&self.vkr_percent) {
            return Err(SimError::invalid_network(format!(
                "vkr_percent {} must lie in [0, vk_percent = {}]",
                self.vkr_percent, self.vk_percent
            )));
        }
        if self.pfe_kw < 0.0 || self.i0_percent < 0.0 {
            return Err(SimError::invalid_network(
                "pfe_kw and i0_percent must not be negative",
            ));
        }
        if self.parallel == 0 {
            return Err(SimError::invalid_network("parallel must be at least 1"));
        }
        if let Some(tap) = &self.tap {
            let below = tap.min.is_some_and(|min| tap.pos < min);
            let above = tap.max.is_some_and(|max| tap.pos > max);
            if below || above || !tap.ratio().is_finite() || tap.ratio() <= 0.0 {
                return Err(SimError::invalid_network(format!(
                    "tap position {} outside its range",
                    tap.pos
                )));
            }
        }
        Ok(())
    }

    /// Rated current in kA on the given side voltage.
    pub fn rated_current_ka(&self, vn_kv: f64) -> f64 {
        self.sn_mva / (3f64.sqrt() * vn_kv)
    }
}

#[derive(Bundle, Debug, Clone)]
pub struct TransformerBundle {
    pub device: TransformerDevice,
    pub from_bus: FromBus, // hv_bus
    pub to_bus: ToBus,     // lv_bus
    pub name: Name,
}

pub mod systems {
    use bevy_ecs::prelude::*;
    use nalgebra::Complex;
    use tracing::warn;

    use super::*;
    use crate::basic::ecs::{
        elements::{
            Admittance, AdmittanceBranch, BranchOf, NodeLookup, OutOfService, Port2, VBase,
            VNominal,
        },
        network::GND,
    };

    pub fn setup_transformer(
        mut commands: Commands,
        nodes: Res<NodeLookup>,
        buses: Query<&VNominal>,
        q: Query<(Entity, &TransformerDevice, &FromBus, &ToBus), Without<OutOfService>>,
    ) {
        let bus_kv = |id: i64| {
            nodes
                .get_entity(id)
                .and_then(|e| buses.get(e).ok())
                .map(|vn| vn.0.0)
        };
        for (entity, dev, hv, lv) in &q {
            let (Some(hv_kv), Some(lv_kv)) = (bus_kv(hv.0), bus_kv(lv.0)) else {
                warn!(?entity, "transformer references an unknown bus, skipped");
                continue;
            };
            for branch in transformer_branches(entity, dev, (hv.0, hv_kv), (lv.0, lv_kv)) {
                commands.spawn(branch);
            }
        }
    }

    /// Expands a transformer into its π-model admittance branches.
    ///
    /// Admittances are in siemens referred to the LV bus voltage. The ideal ratio combines
    /// the tap position with any mismatch between rated and bus nominal voltages.
    pub fn transformer_branches(
        owner: Entity,
        dev: &TransformerDevice,
        (hv_bus, hv_kv): (i64, f64),
        (lv_bus, lv_kv): (i64, f64),
    ) -> Vec<AdmittanceBranch> {
        let t = dev.tap_ratio() * (dev.vn_hv_kv / hv_kv) / (dev.vn_lv_kv / lv_kv);
        let z_base = dev.vn_lv_kv.powi(2) / dev.sn_mva;
        let parallel = dev.parallel as f64;
        let y = parallel / (dev.per_unit_impedance(dev.sn_mva) * z_base);
        let y_m = parallel * dev.magnetizing_admittance() / z_base;

        let branch = |y: Complex<f64>, from: i64, to: i64| AdmittanceBranch {
            y: Admittance(y),
            port: Port2::new(from, to),
            v_base: VBase(lv_kv),
            owner: BranchOf(owner),
        };
        vec![
            branch(y / t, hv_bus, lv_bus),
            branch((1.0 - t) * y / t.powi(2), hv_bus, GND),
            branch((1.0 - 1.0 / t) * y, lv_bus, GND),
            branch(0.5 * y_m / t.powi(2), hv_bus, GND),
            branch(0.5 * y_m, lv_bus, GND),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::ecs::elements::BranchOf;
    use bevy_ecs::world::World;

    fn rural_trafo() -> TransformerDevice {
        TransformerDevice {
            sn_mva: 0.4,
            vn_hv_kv: 33.0,
            vn_lv_kv: 0.4,
            vk_percent: 6.0,
            vkr_percent: 0.5,
            pfe_kw: 1.0,
            i0_percent: 0.1,
            parallel: 1,
            max_loading_percent: None,
            tap: None,
        }
    }

    #[test]
    fn test_per_unit_impedance() {
        let z = rural_trafo().per_unit_impedance(1.0);
        assert!((z.re - 0.005 / 0.4).abs() < 1e-12);
        let x = (0.06f64.powi(2) - 0.005f64.powi(2)).sqrt() / 0.4;
        assert!((z.im - x).abs() < 1e-12);
    }

    #[test]
    fn test_magnetizing_admittance() {
        let mut dev = rural_trafo();
        // iron losses exceed the no-load current: purely conductive core
        let ym = dev.magnetizing_admittance();
        assert!((ym.re - 1.0 / 400.0).abs() < 1e-12);
        assert_eq!(ym.im, 0.0);

        dev.i0_percent = 1.0;
        let ym = dev.magnetizing_admittance();
        assert!(ym.im < 0.0);
        assert!((ym.norm() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_tap_ratio() {
        let mut dev = rural_trafo();
        assert_eq!(dev.tap_ratio(), 1.0);
        dev.tap = Some(TapChanger {
            side: TapSide::Hv,
            neutral: 0.0,
            pos: 2.0,
            step_percent: 2.5,
            min: Some(-2.0),
            max: Some(2.0),
        });
        assert!((dev.tap_ratio() - 1.05).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_plates() {
        assert!(rural_trafo().validate().is_ok());
        let mut dev = rural_trafo();
        dev.sn_mva = 0.0;
        assert!(matches!(dev.validate(), Err(SimError::InvalidNetwork(_))));
        let mut dev = rural_trafo();
        dev.vkr_percent = 7.0;
        assert!(dev.validate().is_err());
        let mut dev = rural_trafo();
        dev.tap = Some(TapChanger {
            side: TapSide::Lv,
            neutral: 0.0,
            pos: 5.0,
            step_percent: 2.5,
            min: Some(-2.0),
            max: Some(2.0),
        });
        assert!(dev.validate().is_err());
    }

    #[test]
    fn test_series_branch_matches_per_unit_impedance() {
        let mut world = World::new();
        let owner = world.spawn_empty().id();
        let dev = rural_trafo();
        let branches = systems::transformer_branches(owner, &dev, (0, 33.0), (1, 0.4));
        assert_eq!(branches.len(), 5);
        let s_base = 1.0;
        let series_pu = branches[0].y.0 * branches[0].v_base.0.powi(2) / s_base;
        let expected = 1.0 / dev.per_unit_impedance(s_base);
        assert!((series_pu - expected).norm() < 1e-9);
        // no tap: the ratio shunts vanish
        assert!(branches[1].y.0.norm() < 1e-12);
        assert!(branches[2].y.0.norm() < 1e-12);
        assert!(branches.iter().all(|b| b.owner == BranchOf(owner)));
    }
}
