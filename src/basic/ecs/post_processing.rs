use std::{collections::HashMap, fmt};

use bevy_app::prelude::*;
use bevy_ecs::{name::Name, prelude::*};
use num_complex::Complex64;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use tabled::{Table, settings::Style};
use tracing::debug;

mod res_display;
use res_display::*;

use super::{
    elements::*,
    network::GND,
    plugin::{BuildNetwork, PFInitStage, SolvePowerFlow, SolverStage},
    powerflow::{
        init::{PVBus, SlackBus},
        systems::{PowerFlowMat, SolverOutput},
    },
};
use crate::basic::newtonpf::{SolverState, StopReason};

/// Solved voltage of a bus and its net power, consumption positive, in MVA.
#[derive(Debug, Component, Clone, Copy)]
pub struct BusPFResult {
    pub v: Complex64,
    pub s_mva: Complex64,
}

/// Terminal quantities of a solved transformer.
#[derive(Debug, Component, Clone, Copy)]
pub struct TransformerPFResult {
    /// Power entering at the HV terminal, MVA.
    pub s_hv: Complex64,
    /// Power entering at the LV terminal, MVA.
    pub s_lv: Complex64,
    pub i_hv_ka: f64,
    pub i_lv_ka: f64,
    pub loading_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusKind {
    Slack,
    PV,
    PQ,
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BusKind::Slack => "slack",
            BusKind::PV => "pv",
            BusKind::PQ => "pq",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusResult {
    pub bus: i64,
    pub name: String,
    pub kind: BusKind,
    pub vn_kv: f64,
    pub vm_pu: f64,
    pub va_degree: f64,
    /// Net active power drawn from the network at this bus.
    pub p_mw: f64,
    pub q_mvar: f64,
    /// `vm_pu` lies inside the bus voltage band.
    pub within_limits: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerResult {
    pub name: String,
    pub hv_bus: i64,
    pub lv_bus: i64,
    pub p_hv_mw: f64,
    pub q_hv_mvar: f64,
    pub p_lv_mw: f64,
    pub q_lv_mvar: f64,
    pub pl_mw: f64,
    pub ql_mvar: f64,
    pub i_hv_ka: f64,
    pub i_lv_ka: f64,
    /// `max(|S_hv|, |S_lv|) / (sn_mva * parallel) * 100`.
    pub loading_percent: f64,
    /// Loading above `max_loading_percent`, 100 % when unset.
    pub overloaded: bool,
}

/// Power supplied by the external grid at the slack bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtGridResult {
    pub bus: i64,
    pub p_mw: f64,
    pub q_mvar: f64,
}

/// Everything a caller gets back from one power flow run.
///
/// A non-converged run still produces a full result built from the last iterate.
#[derive(Debug, Clone, PartialEq, Resource, Serialize, Deserialize)]
pub struct PowerFlowResult {
    pub converged: bool,
    pub state: SolverState,
    pub stop_reason: StopReason,
    pub iterations: usize,
    /// Infinity norm of the final mismatch, per-unit.
    pub max_mismatch: f64,
    pub s_base_mva: f64,
    pub buses: Vec<BusResult>,
    pub transformers: Vec<TransformerResult>,
    pub ext_grids: Vec<ExtGridResult>,
}

impl PowerFlowResult {
    pub fn bus(&self, id: i64) -> Option<&BusResult> {
        self.buses.iter().find(|b| b.bus == id)
    }

    pub fn transformer(&self, name: &str) -> Option<&TransformerResult> {
        self.transformers.iter().find(|t| t.name == name)
    }

    /// Active power delivered by the slack, MW.
    pub fn slack_p_mw(&self) -> f64 {
        self.ext_grids.iter().map(|e| e.p_mw).sum()
    }

    pub fn total_losses_mw(&self) -> f64 {
        self.transformers.iter().map(|t| t.pl_mw).sum()
    }

    pub fn max_loading_percent(&self) -> f64 {
        self.transformers
            .iter()
            .map(|t| t.loading_percent)
            .fold(0.0, f64::max)
    }

    pub fn bus_table(&self) -> String {
        let rows = self.buses.iter().map(|b| BusResTable {
            Bus: b.bus,
            Name: b.name.clone(),
            Type: b.kind.to_string(),
            Vm: FloatWrapper::new(b.vm_pu, 5),
            Va: FloatWrapper::new(b.va_degree, 5),
            P_mw: FloatWrapper::new(b.p_mw, 5),
            Q_mvar: FloatWrapper::new(b.q_mvar, 5),
            In_limits: b.within_limits,
        });
        Table::new(rows).with(Style::markdown()).to_string()
    }

    pub fn transformer_table(&self) -> String {
        let rows = self.transformers.iter().map(|t| TrafoResTable {
            name: t.name.clone(),
            hv_bus: t.hv_bus,
            lv_bus: t.lv_bus,
            p_hv_mw: FloatWrapper::new(t.p_hv_mw, 4),
            q_hv_mvar: FloatWrapper::new(t.q_hv_mvar, 4),
            p_lv_mw: FloatWrapper::new(t.p_lv_mw, 4),
            q_lv_mvar: FloatWrapper::new(t.q_lv_mvar, 4),
            pl_mw: FloatWrapper::new(t.pl_mw, 5),
            ql_mvar: FloatWrapper::new(t.ql_mvar, 5),
            i_hv_ka: FloatWrapper::new(t.i_hv_ka, 4),
            i_lv_ka: FloatWrapper::new(t.i_lv_ka, 4),
            loading_percent: FloatWrapper::new(t.loading_percent, 2),
        });
        Table::new(rows).with(Style::markdown()).to_string()
    }
}

impl fmt::Display for PowerFlowResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "power flow {:?} ({:?}) after {} iterations, max mismatch {:.3e} pu",
            self.state, self.stop_reason, self.iterations, self.max_mismatch
        )?;
        writeln!(f, "{}", self.bus_table())?;
        if !self.transformers.is_empty() {
            writeln!(f, "{}", self.transformer_table())?;
        }
        Ok(())
    }
}

fn clear_results(
    mut cmd: Commands,
    buses: Query<Entity, With<BusPFResult>>,
    trafos: Query<Entity, With<TransformerPFResult>>,
) {
    for entity in buses.iter().chain(trafos.iter()) {
        cmd.entity(entity)
            .remove::<(BusPFResult, TransformerPFResult)>();
    }
    cmd.remove_resource::<PowerFlowResult>();
}

/// Restores bus order and stores voltages and net powers on the bus entities.
fn extract_res_bus(
    mut cmd: Commands,
    out: Res<SolverOutput>,
    mat: Res<PowerFlowMat>,
    nodes: Res<NodeLookup>,
    common: Res<PFCommonData>,
) {
    let v = &out.0.v;
    // calculated injections, generation positive
    let s_inj = v.component_mul(&(&mat.y_bus * v).conjugate());
    for (id, entity) in nodes.iter() {
        let Some(&k) = mat.to_perm.get(id as usize) else {
            continue;
        };
        cmd.entity(entity).insert(BusPFResult {
            v: v[k],
            s_mva: -s_inj[k] * common.sbase,
        });
    }
}

/// Sums the branch currents of each transformer at its two terminals.
fn extract_res_trafo(
    mut cmd: Commands,
    nodes: Res<NodeLookup>,
    common: Res<PFCommonData>,
    buses: Query<(&BusPFResult, &VNominal)>,
    branches: Query<(&Admittance, &Port2, &VBase, &BranchOf)>,
    trafos: Query<(Entity, &TransformerDevice, &FromBus, &ToBus), Without<OutOfService>>,
) {
    let bus = |id: i64| nodes.get_entity(id).and_then(|e| buses.get(e).ok());
    let voltage = |id: i64| bus(id).map_or(Complex64::zero(), |(r, _)| r.v);

    // per-unit current leaving a bus into a device
    let mut terminal: HashMap<(Entity, i64), Complex64> = HashMap::new();
    for (y, port, v_base, owner) in &branches {
        let y_pu = y.0 * v_base.0.powi(2) / common.sbase;
        let i = y_pu * (voltage(port[0]) - voltage(port[1]));
        *terminal.entry((owner.0, port[0])).or_default() += i;
        if port[1] != GND {
            *terminal.entry((owner.0, port[1])).or_default() -= i;
        }
    }

    let sqrt3 = 3f64.sqrt();
    for (entity, dev, hv, lv) in &trafos {
        let (Some((hv_res, hv_vn)), Some((lv_res, lv_vn))) = (bus(hv.0), bus(lv.0)) else {
            continue;
        };
        let power = |bus_id: i64, v: Complex64| {
            let i = terminal.get(&(entity, bus_id)).copied().unwrap_or_default();
            v * i.conj() * common.sbase
        };
        let current_ka = |s: Complex64, v: Complex64, vn: &VNominal| {
            let vm = v.norm();
            if vm > 0.0 { s.norm() / (sqrt3 * vm * vn.0.0) } else { 0.0 }
        };
        let s_hv = power(hv.0, hv_res.v);
        let s_lv = power(lv.0, lv_res.v);
        let rating = dev.sn_mva * dev.parallel as f64;
        cmd.entity(entity).insert(TransformerPFResult {
            s_hv,
            s_lv,
            i_hv_ka: current_ka(s_hv, hv_res.v, hv_vn),
            i_lv_ka: current_ka(s_lv, lv_res.v, lv_vn),
            loading_percent: s_hv.norm().max(s_lv.norm()) / rating * 100.0,
        });
    }
}

/// Gathers the per-element results into the [`PowerFlowResult`] resource.
#[allow(clippy::type_complexity)]
fn collect_results(
    mut cmd: Commands,
    out: Res<SolverOutput>,
    common: Res<PFCommonData>,
    nodes: Res<NodeLookup>,
    buses: Query<(
        &BusID,
        &Name,
        &VNominal,
        &VmLimit,
        &SBusPu,
        &BusPFResult,
        Has<PVBus>,
        Has<SlackBus>,
    )>,
    trafos: Query<(
        Entity,
        &Name,
        &TransformerDevice,
        &FromBus,
        &ToBus,
        &TransformerPFResult,
    )>,
    ext_grids: Query<&TargetBus, (With<ExtGrid>, Without<OutOfService>)>,
) {
    let mut bus_results: Vec<BusResult> = buses
        .iter()
        .map(|(id, name, vn, limit, _, res, is_pv, is_slack)| {
            let vm_pu = res.v.norm();
            BusResult {
                bus: id.0,
                name: name.as_str().to_owned(),
                kind: match (is_slack, is_pv) {
                    (true, _) => BusKind::Slack,
                    (false, true) => BusKind::PV,
                    _ => BusKind::PQ,
                },
                vn_kv: vn.0.0,
                vm_pu,
                va_degree: res.v.arg().to_degrees(),
                p_mw: res.s_mva.re,
                q_mvar: res.s_mva.im,
                within_limits: limit.contains(&vm_pu),
            }
        })
        .collect();
    bus_results.sort_by_key(|b| b.bus);

    let mut trafo_rows: Vec<_> = trafos.iter().collect();
    trafo_rows.sort_by_key(|(entity, ..)| *entity);
    let transformers = trafo_rows
        .into_iter()
        .map(|(_, name, dev, hv, lv, res)| {
            let loss = res.s_hv + res.s_lv;
            TransformerResult {
                name: name.as_str().to_owned(),
                hv_bus: hv.0,
                lv_bus: lv.0,
                p_hv_mw: res.s_hv.re,
                q_hv_mvar: res.s_hv.im,
                p_lv_mw: res.s_lv.re,
                q_lv_mvar: res.s_lv.im,
                pl_mw: loss.re,
                ql_mvar: loss.im,
                i_hv_ka: res.i_hv_ka,
                i_lv_ka: res.i_lv_ka,
                loading_percent: res.loading_percent,
                overloaded: res.loading_percent > dev.max_loading_percent.unwrap_or(100.0),
            }
        })
        .collect();

    // slack supply: calculated injection minus what the bus elements already specify
    let ext_grid_results = ext_grids
        .iter()
        .filter_map(|target| {
            let entity = nodes.get_entity(target.0)?;
            let (.., s_spec, res, _, _) = buses.get(entity).ok()?;
            let s = -res.s_mva - s_spec.0 * common.sbase;
            Some(ExtGridResult {
                bus: target.0,
                p_mw: s.re,
                q_mvar: s.im,
            })
        })
        .collect();

    let outcome = &out.0;
    debug!(
        converged = outcome.converged(),
        iterations = outcome.iterations,
        "power flow results collected"
    );
    cmd.insert_resource(PowerFlowResult {
        converged: outcome.converged(),
        state: outcome.state,
        stop_reason: outcome.stop_reason,
        iterations: outcome.iterations,
        max_mismatch: outcome.max_mismatch,
        s_base_mva: common.sbase,
        buses: bus_results,
        transformers,
        ext_grids: ext_grid_results,
    });
}

/// Turns the raw solver output into [`PowerFlowResult`].
#[derive(Default)]
pub struct ResultExtractPlugin;

impl Plugin for ResultExtractPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(BuildNetwork, clear_results.in_set(PFInitStage::Reset));
        app.add_systems(
            SolvePowerFlow,
            (extract_res_bus, extract_res_trafo, collect_results)
                .chain()
                .in_set(SolverStage::AfterSolve),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PowerFlowResult {
        PowerFlowResult {
            converged: true,
            state: SolverState::Converged,
            stop_reason: StopReason::ToleranceMet,
            iterations: 3,
            max_mismatch: 1e-9,
            s_base_mva: 1.0,
            buses: vec![
                BusResult {
                    bus: 0,
                    name: "hv".into(),
                    kind: BusKind::Slack,
                    vn_kv: 33.0,
                    vm_pu: 1.0,
                    va_degree: 0.0,
                    p_mw: -0.051,
                    q_mvar: -0.06,
                    within_limits: true,
                },
                BusResult {
                    bus: 1,
                    name: "lv".into(),
                    kind: BusKind::PQ,
                    vn_kv: 0.4,
                    vm_pu: 0.97,
                    va_degree: -1.2,
                    p_mw: 0.05,
                    q_mvar: 0.05,
                    within_limits: true,
                },
            ],
            transformers: vec![TransformerResult {
                name: "t1".into(),
                hv_bus: 0,
                lv_bus: 1,
                p_hv_mw: 0.051,
                q_hv_mvar: 0.06,
                p_lv_mw: -0.05,
                q_lv_mvar: -0.05,
                pl_mw: 0.001,
                ql_mvar: 0.01,
                i_hv_ka: 0.0014,
                i_lv_ka: 0.1,
                loading_percent: 19.7,
                overloaded: false,
            }],
            ext_grids: vec![ExtGridResult {
                bus: 0,
                p_mw: 0.051,
                q_mvar: 0.06,
            }],
        }
    }

    #[test]
    fn test_lookups_and_totals() {
        let res = sample();
        assert_eq!(res.bus(1).map(|b| b.kind), Some(BusKind::PQ));
        assert!(res.bus(7).is_none());
        assert!(res.transformer("t1").is_some());
        assert!((res.slack_p_mw() - 0.051).abs() < 1e-12);
        assert!((res.total_losses_mw() - 0.001).abs() < 1e-12);
        assert!((res.max_loading_percent() - 19.7).abs() < 1e-12);
    }

    #[test]
    fn test_tables_render_markdown() {
        let res = sample();
        let buses = res.bus_table();
        assert!(buses.lines().count() >= 4);
        assert!(buses.contains("| Vm"));
        assert!(buses.contains("0.97000"));
        let trafos = res.transformer_table();
        assert!(trafos.contains("loading_percent"));
        assert!(trafos.contains("19.70"));
        assert!(res.to_string().starts_with("power flow Converged"));
    }

    #[test]
    fn test_result_serializes_to_json() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"stop_reason\":\"ToleranceMet\""));
        let back: PowerFlowResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample());
    }
}
