use std::ops::RangeInclusive;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::SimulationResult;
use crate::error::{Result, SimError};
use crate::io::SimulationConfig;
use crate::renewables::WindProfile;

/// Panel tilts offered for sweeps, degrees.
pub const TILT_RANGE: RangeInclusive<f64> = 10.0..=50.0;
/// Constant wind speeds offered for sweeps, m/s.
pub const WIND_SPEED_RANGE: RangeInclusive<f64> = 2.0..=15.0;

/// Overrides applied to a base scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepCase {
    pub tilt: f64,
    pub wind_speed: f64,
    /// Total demand, MW. Loads keep their power factors.
    pub load_mw: f64,
}

impl SweepCase {
    pub fn validate(&self) -> Result<()> {
        if !TILT_RANGE.contains(&self.tilt) {
            return Err(SimError::invalid_input(format!(
                "sweep tilt {}° outside {:?}",
                self.tilt, TILT_RANGE
            )));
        }
        if !WIND_SPEED_RANGE.contains(&self.wind_speed) {
            return Err(SimError::invalid_input(format!(
                "sweep wind speed {} m/s outside {:?}",
                self.wind_speed, WIND_SPEED_RANGE
            )));
        }
        Ok(())
    }

    /// Cartesian product of the three axes.
    pub fn grid(tilts: &[f64], wind_speeds: &[f64], loads_mw: &[f64]) -> Vec<SweepCase> {
        tilts
            .iter()
            .flat_map(|&tilt| {
                wind_speeds.iter().flat_map(move |&wind_speed| {
                    loads_mw.iter().map(move |&load_mw| SweepCase {
                        tilt,
                        wind_speed,
                        load_mw,
                    })
                })
            })
            .collect()
    }

    fn apply(&self, base: &SimulationConfig) -> Result<SimulationConfig> {
        self.validate()?;
        let mut cfg = base.clone();
        cfg.pv.surface_tilt = self.tilt;
        cfg.wind.profile = WindProfile::Constant(self.wind_speed);
        cfg.network.set_total_load_mw(self.load_mw)?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepOutcome {
    pub case: SweepCase,
    pub result: SimulationResult,
}

/// Runs every case against `base` in parallel, in input order.
///
/// Each case builds its own grid. The first failing case aborts the sweep.
pub fn run_sweep(base: &SimulationConfig, cases: &[SweepCase]) -> Result<Vec<SweepOutcome>> {
    info!(cases = cases.len(), "running parameter sweep");
    cases
        .par_iter()
        .map(|case| {
            let result = case.apply(base)?.run()?;
            Ok(SweepOutcome {
                case: *case,
                result,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_order() {
        let cases = SweepCase::grid(&[10.0, 50.0], &[4.0, 8.0, 12.0], &[0.3]);
        assert_eq!(cases.len(), 6);
        assert_eq!(
            cases[1],
            SweepCase {
                tilt: 10.0,
                wind_speed: 8.0,
                load_mw: 0.3
            }
        );
        assert_eq!(cases[5].tilt, 50.0);
    }

    #[test]
    fn test_sweep_matches_single_runs() {
        let base = SimulationConfig::default();
        let cases = SweepCase::grid(&[10.0, 30.0], &[4.0, 8.0], &[0.2]);
        let out = run_sweep(&base, &cases).unwrap();
        assert_eq!(out.len(), 4);
        for o in &out {
            assert_eq!(o.result, o.case.apply(&base).unwrap().run().unwrap());
            assert!((o.result.load_mw.0 - 0.2).abs() < 1e-12);
            assert!(o.result.converged());
        }
        assert!(out[1].result.wind_mw[0].0 > out[0].result.wind_mw[0].0);
    }

    #[test]
    fn test_out_of_range_case() {
        let base = SimulationConfig::default();
        let bad = SweepCase {
            tilt: 60.0,
            wind_speed: 8.0,
            load_mw: 0.3,
        };
        assert!(matches!(
            run_sweep(&base, &[bad]),
            Err(SimError::InvalidInput(_))
        ));
    }
}
