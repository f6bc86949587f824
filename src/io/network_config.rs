use bevy_ecs::name::Name;
use serde::{Deserialize, Serialize};

use crate::basic::ecs::{
    elements::*,
    network::{DataOps, PowerGrid},
    powerflow::systems::PowerFlowConfig,
};
use crate::error::{Result, SimError};
use crate::simulation::Snapshot;

fn yes() -> bool {
    true
}
fn one() -> f64 {
    1.0
}
fn default_min_vm() -> f64 {
    0.9
}
fn default_max_vm() -> f64 {
    1.1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusRecord {
    pub index: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub vn_kv: f64,
    #[serde(default = "default_min_vm")]
    pub min_vm_pu: f64,
    #[serde(default = "default_max_vm")]
    pub max_vm_pu: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtGridRecord {
    pub bus: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "one")]
    pub vm_pu: f64,
    #[serde(default)]
    pub va_degree: f64,
    #[serde(default = "yes")]
    pub in_service: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafoRecord {
    #[serde(default)]
    pub name: Option<String>,
    pub hv_bus: i64,
    pub lv_bus: i64,
    #[serde(default = "yes")]
    pub in_service: bool,
    #[serde(flatten)]
    pub device: TransformerDevice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRecord {
    #[serde(default)]
    pub name: Option<String>,
    pub bus: i64,
    pub p_mw: f64,
    #[serde(default)]
    pub q_mvar: f64,
    #[serde(default = "one")]
    pub scaling: f64,
    #[serde(default = "yes")]
    pub in_service: bool,
}

/// Static generator with a fixed P/Q output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SGenRecord {
    #[serde(default)]
    pub name: Option<String>,
    pub bus: i64,
    pub p_mw: f64,
    #[serde(default)]
    pub q_mvar: f64,
    #[serde(default)]
    pub kind: GenerationKind,
    #[serde(default = "yes")]
    pub in_service: bool,
}

/// Voltage-controlled generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenRecord {
    #[serde(default)]
    pub name: Option<String>,
    pub bus: i64,
    pub p_mw: f64,
    #[serde(default = "one")]
    pub vm_pu: f64,
    #[serde(default = "yes")]
    pub in_service: bool,
}

/// Element tables of a network, plus where the simulated PV and wind plants connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "one")]
    pub sn_mva: f64,
    pub bus: Vec<BusRecord>,
    pub ext_grid: Vec<ExtGridRecord>,
    #[serde(default)]
    pub trafo: Vec<TrafoRecord>,
    #[serde(default)]
    pub load: Vec<LoadRecord>,
    #[serde(default)]
    pub sgen: Vec<SGenRecord>,
    #[serde(default, rename = "gen")]
    pub generator: Vec<GenRecord>,
    pub pv_bus: i64,
    pub wind_bus: i64,
    #[serde(default)]
    pub snapshot: Snapshot,
    #[serde(default)]
    pub power_flow: PowerFlowConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::rural_33kv()
    }
}

impl NetworkConfig {
    /// 33/0.4 kV feeder with a 0.4 MVA transformer and a 0.30 MW + 0.05 MVAr load.
    /// PV and wind connect on the LV bus.
    pub fn rural_33kv() -> Self {
        NetworkConfig {
            sn_mva: 1.0,
            bus: vec![
                BusRecord {
                    index: 0,
                    name: Some("33kV Grid".into()),
                    vn_kv: 33.0,
                    min_vm_pu: default_min_vm(),
                    max_vm_pu: default_max_vm(),
                },
                BusRecord {
                    index: 1,
                    name: Some("0.4kV Bus".into()),
                    vn_kv: 0.4,
                    min_vm_pu: default_min_vm(),
                    max_vm_pu: default_max_vm(),
                },
            ],
            ext_grid: vec![ExtGridRecord {
                bus: 0,
                name: Some("Utility Grid".into()),
                vm_pu: 1.0,
                va_degree: 0.0,
                in_service: true,
            }],
            trafo: vec![TrafoRecord {
                name: Some("33/0.4kV Transformer".into()),
                hv_bus: 0,
                lv_bus: 1,
                in_service: true,
                device: TransformerDevice {
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
                },
            }],
            load: vec![LoadRecord {
                name: Some("Load".into()),
                bus: 1,
                p_mw: 0.30,
                q_mvar: 0.05,
                scaling: 1.0,
                in_service: true,
            }],
            sgen: Vec::new(),
            generator: Vec::new(),
            pv_bus: 1,
            wind_bus: 1,
            snapshot: Snapshot::default(),
            power_flow: PowerFlowConfig::default(),
        }
    }

    /// Active demand of the in-service loads, MW.
    pub fn total_load_mw(&self) -> f64 {
        self.load
            .iter()
            .filter(|l| l.in_service)
            .map(|l| l.p_mw * l.scaling)
            .sum()
    }

    /// Rescales every in-service load so the total demand becomes `p_mw`, keeping power factors.
    pub fn set_total_load_mw(&mut self, p_mw: f64) -> Result<()> {
        if !(p_mw.is_finite() && p_mw >= 0.0) {
            return Err(SimError::invalid_input(format!(
                "load demand must not be negative, got {p_mw} MW"
            )));
        }
        let total = self.total_load_mw();
        if total <= 0.0 {
            return Err(SimError::invalid_input("network has no load to rescale"));
        }
        let factor = p_mw / total;
        for load in self.load.iter_mut().filter(|l| l.in_service) {
            load.p_mw *= factor;
            load.q_mvar *= factor;
        }
        Ok(())
    }

    pub fn build(&self) -> Result<PowerGrid> {
        let mut grid = PowerGrid::new(self.sn_mva)?;
        grid.load_network_config(self)?;
        Ok(grid)
    }
}

/// Populates a grid from element tables.
pub trait LoadNetworkConfig {
    fn load_network_config(&mut self, cfg: &NetworkConfig) -> Result<()>;
}

impl LoadNetworkConfig for PowerGrid {
    fn load_network_config(&mut self, cfg: &NetworkConfig) -> Result<()> {
        let mut buses: Vec<&BusRecord> = cfg.bus.iter().collect();
        buses.sort_by_key(|b| b.index);
        for b in buses {
            let name = b.name.clone().unwrap_or_else(|| format!("bus_{}", b.index));
            self.add_bus_with_limits(b.index, name, b.vn_kv, VmLimit::new(b.min_vm_pu, b.max_vm_pu))?;
        }
        for e in &cfg.ext_grid {
            let entity = self.add_slack(e.bus, e.vm_pu, e.va_degree)?;
            self.set_in_service(entity, e.in_service)?;
            if let Some(name) = &e.name {
                self.world_mut().entity_mut(entity).insert(Name::new(name.clone()));
            }
        }
        for (i, t) in cfg.trafo.iter().enumerate() {
            let name = t.name.clone().unwrap_or_else(|| format!("trafo_{i}"));
            let entity = self.add_transformer(name, t.hv_bus, t.lv_bus, t.device.clone())?;
            self.set_in_service(entity, t.in_service)?;
        }
        for (i, l) in cfg.load.iter().enumerate() {
            let name = l.name.clone().unwrap_or_else(|| format!("load_{i}"));
            let entity = self.add_load(name, l.bus, Megawatts(l.p_mw), MVar(l.q_mvar))?;
            if let Some(mut dev) = self.get_mut::<LoadDevice>(entity) {
                dev.scaling = l.scaling;
            }
            self.set_in_service(entity, l.in_service)?;
        }
        for (i, s) in cfg.sgen.iter().enumerate() {
            let name = s.name.clone().unwrap_or_else(|| format!("sgen_{i}"));
            let entity = self.add_generator_injection(
                name,
                s.bus,
                Megawatts(s.p_mw),
                MVar(s.q_mvar),
                s.kind,
            )?;
            self.set_in_service(entity, s.in_service)?;
        }
        for (i, g) in cfg.generator.iter().enumerate() {
            let name = g.name.clone().unwrap_or_else(|| format!("gen_{i}"));
            let entity = self.add_pv_generator(name, g.bus, Megawatts(g.p_mw), g.vm_pu)?;
            self.set_in_service(entity, g.in_service)?;
        }
        for (role, bus) in [("pv", cfg.pv_bus), ("wind", cfg.wind_bus)] {
            if self.bus_entity(bus).is_none() {
                return Err(SimError::invalid_network(format!(
                    "{role} plant attached to dangling bus id {bus}"
                )));
            }
        }
        self.set_power_flow_config(cfg.power_flow.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::ecs::network::PowerFlow;

    #[test]
    fn test_rural_preset_solves() {
        let cfg = NetworkConfig::rural_33kv();
        assert!((cfg.total_load_mw() - 0.3).abs() < 1e-12);
        let mut grid = cfg.build().unwrap();
        assert_eq!(grid.bus_count(), 2);
        let res = grid.solve().unwrap();
        let lv = res.bus(1).unwrap();
        assert!(lv.vm_pu > 0.9 && lv.vm_pu < 1.0);
        assert_eq!(lv.name, "0.4kV Bus");
        assert!(res.transformer("33/0.4kV Transformer").is_some());
    }

    #[test]
    fn test_json_tables_with_defaults() {
        let json = r#"{
            "bus": [
                {"index": 1, "vn_kv": 0.4},
                {"index": 0, "vn_kv": 33.0, "name": "grid"}
            ],
            "ext_grid": [{"bus": 0}],
            "trafo": [{
                "hv_bus": 0, "lv_bus": 1, "sn_mva": 0.4,
                "vn_hv_kv": 33.0, "vn_lv_kv": 0.4,
                "vk_percent": 6.0, "vkr_percent": 0.5
            }],
            "load": [{"bus": 1, "p_mw": 0.2, "scaling": 0.5}],
            "pv_bus": 1,
            "wind_bus": 1,
            "snapshot": "peak_pv",
            "power_flow": {"tol": 1e-8}
        }"#;
        let cfg: NetworkConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.snapshot, Snapshot::PeakPv);
        assert_eq!(cfg.trafo[0].device.parallel, 1);
        assert!((cfg.total_load_mw() - 0.1).abs() < 1e-12);
        let mut grid = cfg.build().unwrap();
        assert_eq!(grid.power_flow_config().tol, 1e-8);
        let res = grid.solve().unwrap();
        assert!((res.bus(1).unwrap().p_mw - 0.1).abs() < 1e-6);
        assert_eq!(res.transformers[0].name, "trafo_0");
    }

    #[test]
    fn test_rescale_load() {
        let mut cfg = NetworkConfig::rural_33kv();
        cfg.set_total_load_mw(0.15).unwrap();
        assert!((cfg.load[0].p_mw - 0.15).abs() < 1e-12);
        assert!((cfg.load[0].q_mvar - 0.025).abs() < 1e-12);
        assert!(cfg.set_total_load_mw(-1.0).is_err());
    }

    #[test]
    fn test_dangling_plant_bus() {
        let mut cfg = NetworkConfig::rural_33kv();
        cfg.wind_bus = 4;
        assert!(matches!(cfg.build(), Err(SimError::InvalidNetwork(_))));
        let mut cfg = NetworkConfig::rural_33kv();
        cfg.load[0].bus = 9;
        assert!(matches!(cfg.build(), Err(SimError::InvalidNetwork(_))));
    }
}
