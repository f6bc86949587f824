//! Orchestration: generation time series from the renewables models, injected into the
//! network at the selected snapshots and solved.

mod sweep;

use chrono::{DateTime, FixedOffset};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::basic::ecs::{
    elements::{GenerationKind, MVar, Megawatts, Watts},
    network::PowerFlow,
    post_processing::PowerFlowResult,
};
use crate::error::{Result, SimError};
use crate::io::NetworkConfig;
use crate::renewables::{
    ClearSkyIrradiance, Location, PVArrayConfig, PoaIrradiance, SolarPosition, WindConfig,
    clearsky::clearsky_from_positions, compute_solar_position,
};
use crate::timeseries::TimeSeries;

pub use sweep::{SweepCase, SweepOutcome, TILT_RANGE, WIND_SPEED_RANGE, run_sweep};

/// Which timestamps are injected into the network and solved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Snapshot {
    /// Position in the time series. Must lie inside a non-empty series.
    Index(usize),
    /// The timestamp with the highest PV output, earliest on ties.
    PeakPv,
    All,
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot::Index(12)
    }
}

impl Snapshot {
    fn select(&self, pv_mw: &[Megawatts]) -> Result<Vec<usize>> {
        if pv_mw.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            Snapshot::Index(i) if *i < pv_mw.len() => Ok(vec![*i]),
            Snapshot::Index(i) => Err(SimError::invalid_input(format!(
                "snapshot index {i} outside a series of {} timestamps",
                pv_mw.len()
            ))),
            Snapshot::PeakPv => pv_mw
                .iter()
                .enumerate()
                .rev()
                .max_by_key(|(_, p)| OrderedFloat(p.0))
                .map(|(i, _)| vec![i])
                .ok_or_else(|| SimError::invalid_input("no timestamps to pick a PV peak from")),
            Snapshot::All => Ok((0..pv_mw.len()).collect()),
        }
    }
}

/// Network state at one solved timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotResult {
    pub index: usize,
    pub timestamp: DateTime<FixedOffset>,
    pub pv_mw: Megawatts,
    pub wind_mw: Megawatts,
    pub power_flow: PowerFlowResult,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub peak_pv_mw: f64,
    pub mean_pv_mw: f64,
    /// PV energy over the whole series, trapezoidal.
    pub pv_energy_mwh: f64,
    /// `pv_energy_mwh` per 24 h of simulated span.
    pub pv_daily_energy_mwh: f64,
    pub mean_wind_mw: f64,
    pub mean_hybrid_mw: f64,
}

impl GenerationSummary {
    fn new(times: &TimeSeries, pv: &[Megawatts], wind: &[Megawatts], hybrid: &[Megawatts]) -> Self {
        let mean = |s: &[Megawatts]| {
            if s.is_empty() {
                0.0
            } else {
                s.iter().map(|p| p.0).sum::<f64>() / s.len() as f64
            }
        };
        let pv_energy_mwh: f64 = times
            .windows(2)
            .zip(pv.windows(2))
            .map(|(t, p)| {
                let hours = (t[1] - t[0]).num_seconds() as f64 / 3600.0;
                0.5 * (p[0].0 + p[1].0) * hours
            })
            .sum();
        let span_days = match (times.first(), times.last()) {
            (Some(first), Some(last)) => (*last - *first).num_seconds() as f64 / 86_400.0,
            _ => 0.0,
        };
        GenerationSummary {
            peak_pv_mw: pv.iter().map(|p| p.0).fold(0.0, f64::max),
            mean_pv_mw: mean(pv),
            pv_energy_mwh,
            pv_daily_energy_mwh: if span_days > 0.0 {
                pv_energy_mwh / span_days
            } else {
                0.0
            },
            mean_wind_mw: mean(wind),
            mean_hybrid_mw: mean(hybrid),
        }
    }
}

/// Everything one run produces, ready for plotting or tabulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub location: Location,
    pub timestamps: TimeSeries,
    pub solar_position: Vec<SolarPosition>,
    pub clearsky: Vec<ClearSkyIrradiance>,
    pub poa: Vec<PoaIrradiance>,
    pub pv_mw: Vec<Megawatts>,
    pub wind_mw: Vec<Megawatts>,
    /// Set when the wind profile is a single speed.
    pub wind_constant_mw: Option<Megawatts>,
    pub hybrid_mw: Vec<Megawatts>,
    pub load_mw: Megawatts,
    pub snapshots: Vec<SnapshotResult>,
    pub summary: GenerationSummary,
}

impl SimulationResult {
    /// All snapshot power flows converged.
    pub fn converged(&self) -> bool {
        self.snapshots.iter().all(|s| s.power_flow.converged)
    }
}

/// Runs the generation models over `times`, then solves the network at the snapshots
/// selected by `network.snapshot`.
///
/// Inputs are validated before any model runs. An empty series solves no snapshots. With
/// [`Snapshot::Index`], the default `Index(12)` included, a non-empty series shorter than
/// `index + 1` points is rejected as [`SimError::InvalidInput`]. A snapshot that does not
/// converge ends the run with [`SimError::SolverDivergence`].
pub fn run_simulation(
    location: &Location,
    times: &TimeSeries,
    pv: &PVArrayConfig,
    wind: &WindConfig,
    network: &NetworkConfig,
) -> Result<SimulationResult> {
    location.validate()?;
    pv.validate()?;
    wind.turbine.validate()?;
    network.build()?.validate()?;

    let solar_position = compute_solar_position(location, times)?;
    let clearsky = clearsky_from_positions(location, times, &solar_position, &pv.irradiance)?;
    let pv_out = pv.simulate(&solar_position, &clearsky)?;
    let pv_mw: Vec<Megawatts> = pv_out.injected().iter().copied().map(Watts::to_mw).collect();
    let wind_mw: Vec<Megawatts> = wind
        .power_series(times.len())?
        .into_iter()
        .map(Watts::to_mw)
        .collect();
    let wind_constant_mw = wind.constant_power()?.map(Watts::to_mw);
    let hybrid_mw: Vec<Megawatts> = pv_mw.iter().zip(&wind_mw).map(|(p, w)| *p + *w).collect();
    let summary = GenerationSummary::new(times, &pv_mw, &wind_mw, &hybrid_mw);

    let selected = network.snapshot.select(&pv_mw)?;
    info!(
        location = %location.label(),
        timestamps = times.len(),
        snapshots = selected.len(),
        peak_pv_mw = summary.peak_pv_mw,
        mean_hybrid_mw = summary.mean_hybrid_mw,
        "generation series computed"
    );

    let snapshots = selected
        .into_iter()
        .map(|i| solve_snapshot(network, i, times[i], pv_mw[i], wind_mw[i]))
        .collect::<Result<Vec<_>>>()?;

    Ok(SimulationResult {
        location: location.clone(),
        timestamps: times.clone(),
        solar_position,
        clearsky,
        poa: pv_out.poa,
        pv_mw,
        wind_mw,
        wind_constant_mw,
        hybrid_mw,
        load_mw: Megawatts(network.total_load_mw()),
        snapshots,
        summary,
    })
}

fn solve_snapshot(
    network: &NetworkConfig,
    index: usize,
    timestamp: DateTime<FixedOffset>,
    pv_mw: Megawatts,
    wind_mw: Megawatts,
) -> Result<SnapshotResult> {
    let mut grid = network.build()?;
    grid.add_generator_injection("PV Plant", network.pv_bus, pv_mw, MVar(0.0), GenerationKind::Pv)?;
    grid.add_generator_injection(
        "Wind Farm",
        network.wind_bus,
        wind_mw,
        MVar(0.0),
        GenerationKind::Wind,
    )?;
    let power_flow = grid.solve()?;
    debug!(
        %timestamp,
        pv_mw = pv_mw.0,
        wind_mw = wind_mw.0,
        slack_mw = power_flow.slack_p_mw(),
        "snapshot solved"
    );
    Ok(SnapshotResult {
        index,
        timestamp,
        pv_mw,
        wind_mw,
        power_flow,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SimulationConfig;
    use crate::renewables::{Site, WindProfile, solar_midnight};
    use chrono::NaiveDate;

    #[test]
    fn test_sokoto_reference_day() {
        let res = SimulationConfig::default().run().unwrap();
        assert_eq!(res.timestamps.len(), 25);
        assert_eq!(res.pv_mw.len(), 25);
        assert!(res.pv_mw.iter().all(|p| p.0 >= 0.0 && p.0 < 0.06));
        assert_eq!(res.pv_mw[0].0, 0.0);

        let wind = res.wind_constant_mw.unwrap();
        assert!((wind.0 - 0.250_88).abs() < 1e-9);
        assert!(res.wind_mw.iter().all(|w| *w == wind));
        assert!((res.load_mw.0 - 0.3).abs() < 1e-12);

        assert_eq!(res.snapshots.len(), 1);
        let snap = &res.snapshots[0];
        assert_eq!(snap.index, 12);
        assert!(snap.pv_mw.0 > 0.03 && snap.pv_mw.0 < 0.06);
        let pf = &snap.power_flow;
        assert!(pf.converged);
        let loading = pf.max_loading_percent();
        assert!(loading > 0.0 && loading < 100.0);
        let lv = pf.bus(1).unwrap();
        assert!(lv.vm_pu > 0.9 && lv.vm_pu < 1.1);

        assert!(res.summary.peak_pv_mw >= snap.pv_mw.0);
        assert!(res.summary.pv_energy_mwh > 0.0);
        assert!((res.summary.pv_daily_energy_mwh - res.summary.pv_energy_mwh).abs() < 1e-12);
        assert!((res.summary.mean_hybrid_mw - res.summary.mean_pv_mw - wind.0).abs() < 1e-9);
    }

    #[test]
    fn test_solar_midnight_has_no_pv() {
        let loc = Site::Enugu.location();
        let date = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();
        let midnight = solar_midnight(&loc, date).unwrap();
        let times = TimeSeries::new(vec![midnight]).unwrap();
        let mut network = NetworkConfig::rural_33kv();
        network.snapshot = Snapshot::Index(0);
        let res = run_simulation(
            &loc,
            &times,
            &PVArrayConfig::default(),
            &WindConfig::default(),
            &network,
        )
        .unwrap();
        assert_eq!(res.clearsky[0].ghi, 0.0);
        assert_eq!(res.poa[0].poa_global, 0.0);
        assert_eq!(res.pv_mw[0].0, 0.0);
        assert!(res.snapshots[0].power_flow.converged);
    }

    #[test]
    fn test_snapshot_selection() {
        let mut cfg = SimulationConfig::default();
        cfg.network.snapshot = Snapshot::PeakPv;
        let res = cfg.run().unwrap();
        let peak = &res.snapshots[0];
        assert!(peak.index == 12 || peak.index == 13);
        assert_eq!(peak.pv_mw.0, res.summary.peak_pv_mw);

        cfg.network.snapshot = Snapshot::All;
        let res = cfg.run().unwrap();
        assert_eq!(res.snapshots.len(), 25);
        assert!(res.converged());

        cfg.network.snapshot = Snapshot::Index(25);
        assert!(matches!(cfg.run(), Err(SimError::InvalidInput(_))));
    }

    #[test]
    fn test_short_and_empty_series() {
        let loc = Site::Sokoto.location();
        let network = NetworkConfig::rural_33kv();
        let run = |times: &TimeSeries, network: &NetworkConfig| {
            run_simulation(
                &loc,
                times,
                &PVArrayConfig::default(),
                &WindConfig::default(),
                network,
            )
        };

        let empty = TimeSeries::default();
        let res = run(&empty, &network).unwrap();
        assert!(res.snapshots.is_empty());
        assert!(res.pv_mw.is_empty());
        assert_eq!(res.summary, GenerationSummary::default());

        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let day = TimeSeries::hourly_day(date, loc.timezone().unwrap()).unwrap();
        let short = TimeSeries::new(day[..6].to_vec()).unwrap();
        assert!(matches!(run(&short, &network), Err(SimError::InvalidInput(_))));

        let mut peak = network.clone();
        peak.snapshot = Snapshot::PeakPv;
        let res = run(&short, &peak).unwrap();
        assert_eq!(res.snapshots.len(), 1);
        assert_eq!(res.snapshots[0].index, 0);
    }

    #[test]
    fn test_wind_series_and_divergence() {
        let mut cfg = SimulationConfig::default();
        cfg.wind.profile = WindProfile::Series(vec![3.0; 24]);
        assert!(matches!(cfg.run(), Err(SimError::InvalidInput(_))));
        cfg.wind.profile = WindProfile::Series((0..25).map(|h| h as f64 * 0.5).collect());
        let res = cfg.run().unwrap();
        assert!(res.wind_constant_mw.is_none());
        assert!(res.wind_mw.windows(2).all(|w| w[1].0 >= w[0].0));

        cfg.network.set_total_load_mw(50.0).unwrap();
        let err = cfg.run().unwrap_err();
        let last = err.divergent_result().unwrap();
        assert!(!last.converged);
    }
}
