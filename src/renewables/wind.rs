use serde::{Deserialize, Serialize};

use crate::basic::ecs::elements::Watts;
use crate::error::{Result, SimError};

/// Upper bound on the power coefficient of an ideal rotor.
pub const BETZ_LIMIT: f64 = 0.593;
/// Sea-level standard air density, kg/m³.
pub const STANDARD_AIR_DENSITY: f64 = 1.225;

/// Cubic-law wind turbine with a rated power cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindTurbineConfig {
    /// kg/m³
    pub air_density: f64,
    /// Rotor swept area, m².
    pub rotor_area: f64,
    pub cp: f64,
    pub rated_power: Watts,
    /// Below this speed the turbine is parked. Disabled when `None`.
    pub cut_in_speed: Option<f64>,
    /// Above this speed the turbine is parked. Disabled when `None`.
    pub cut_out_speed: Option<f64>,
}

impl Default for WindTurbineConfig {
    fn default() -> Self {
        Self {
            air_density: STANDARD_AIR_DENSITY,
            rotor_area: 2000.0,
            cp: 0.4,
            rated_power: Watts(1_500_000.0),
            cut_in_speed: None,
            cut_out_speed: None,
        }
    }
}

fn check_speed(wind_speed: f64) -> Result<()> {
    if wind_speed.is_nan() || wind_speed < 0.0 {
        Err(SimError::invalid_input(format!(
            "wind speed must not be negative, got {wind_speed} m/s"
        )))
    } else {
        Ok(())
    }
}

fn check_turbine(air_density: f64, rotor_area: f64, cp: f64, rated_power: Watts) -> Result<()> {
    if !(air_density.is_finite() && air_density > 0.0) {
        return Err(SimError::invalid_input(format!(
            "air density must be positive, got {air_density}"
        )));
    }
    if !(rotor_area.is_finite() && rotor_area > 0.0) {
        return Err(SimError::invalid_input(format!(
            "rotor area must be positive, got {rotor_area}"
        )));
    }
    if !(cp > 0.0 && cp <= BETZ_LIMIT) {
        return Err(SimError::invalid_input(format!(
            "power coefficient {cp} outside (0, {BETZ_LIMIT}]"
        )));
    }
    if !(*rated_power > 0.0) {
        return Err(SimError::invalid_input("rated power must be positive"));
    }
    Ok(())
}

/// `min(0.5 * rho * A * v³ * cp, rated_power)`.
pub fn wind_power(
    wind_speed: f64,
    air_density: f64,
    rotor_area: f64,
    cp: f64,
    rated_power: Watts,
) -> Result<Watts> {
    check_turbine(air_density, rotor_area, cp, rated_power)?;
    check_speed(wind_speed)?;
    let aero = 0.5 * air_density * rotor_area * wind_speed.powi(3) * cp;
    Ok(Watts(aero.min(*rated_power)))
}

impl WindTurbineConfig {
    pub fn validate(&self) -> Result<()> {
        check_turbine(self.air_density, self.rotor_area, self.cp, self.rated_power)?;
        let cut_in = self.cut_in_speed.unwrap_or(0.0);
        if cut_in.is_nan() || cut_in < 0.0 {
            return Err(SimError::invalid_input("cut-in speed must not be negative"));
        }
        if let Some(cut_out) = self.cut_out_speed {
            if !(cut_out > cut_in) {
                return Err(SimError::invalid_input(format!(
                    "cut-out speed {cut_out} must exceed cut-in speed {cut_in}"
                )));
            }
        }
        Ok(())
    }

    /// Electrical output at one wind speed, honouring the cut-in and cut-out speeds.
    pub fn power(&self, wind_speed: f64) -> Result<Watts> {
        self.validate()?;
        check_speed(wind_speed)?;
        let parked = self.cut_in_speed.is_some_and(|v| wind_speed < v)
            || self.cut_out_speed.is_some_and(|v| wind_speed > v);
        if parked {
            return Ok(Watts(0.0));
        }
        wind_power(
            wind_speed,
            self.air_density,
            self.rotor_area,
            self.cp,
            self.rated_power,
        )
    }

    pub fn power_series(&self, wind_speeds: &[f64]) -> Result<Vec<Watts>> {
        wind_speeds.iter().map(|v| self.power(*v)).collect()
    }

    /// Speed at which the cubic law reaches rated power, m/s.
    pub fn rated_wind_speed(&self) -> f64 {
        (2.0 * *self.rated_power / (self.air_density * self.rotor_area * self.cp)).cbrt()
    }
}

/// Wind seen by the turbine over a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindProfile {
    Constant(f64),
    /// One speed per timestamp.
    Series(Vec<f64>),
}

impl Default for WindProfile {
    fn default() -> Self {
        WindProfile::Constant(8.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindConfig {
    pub turbine: WindTurbineConfig,
    pub profile: WindProfile,
}

impl WindConfig {
    /// Turbine output per timestamp. A series profile must match `n` in length.
    pub fn power_series(&self, n: usize) -> Result<Vec<Watts>> {
        match &self.profile {
            WindProfile::Constant(v) => Ok(vec![self.turbine.power(*v)?; n]),
            WindProfile::Series(speeds) if speeds.len() == n => self.turbine.power_series(speeds),
            WindProfile::Series(speeds) => Err(SimError::invalid_input(format!(
                "wind series has {} samples for {n} timestamps",
                speeds.len()
            ))),
        }
    }

    /// Output for a constant profile, `None` for a series.
    pub fn constant_power(&self) -> Result<Option<Watts>> {
        match self.profile {
            WindProfile::Constant(v) => self.turbine.power(v).map(Some),
            WindProfile::Series(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sokoto_turbine_at_8_ms() {
        let p = wind_power(8.0, 1.225, 2000.0, 0.4, Watts(1e9)).unwrap();
        assert!((*p - 250_880.0).abs() < 1e-6);
        assert!((*p.to_mw() - 0.25088).abs() < 1e-12);
    }

    #[test]
    fn test_monotonic_below_rated_then_clipped() {
        let turbine = WindTurbineConfig {
            rotor_area: 100.0,
            rated_power: Watts(1_500_000.0),
            ..Default::default()
        };
        let rated_speed = turbine.rated_wind_speed();
        let mut prev = -1.0;
        let mut v = 0.5;
        while v < rated_speed {
            let p = *turbine.power(v).unwrap();
            let cubic = 0.5 * 1.225 * 100.0 * v.powi(3) * 0.4;
            assert!((p - cubic).abs() <= 1e-9 * cubic.max(1.0));
            assert!(p > prev);
            prev = p;
            v += 0.5;
        }
        for v in [rated_speed + 0.01, 40.0, 80.0] {
            assert_eq!(turbine.power(v).unwrap(), Watts(1_500_000.0));
        }
    }

    #[test]
    fn test_cut_in_and_cut_out() {
        let turbine = WindTurbineConfig {
            cut_in_speed: Some(3.0),
            cut_out_speed: Some(25.0),
            ..Default::default()
        };
        assert_eq!(turbine.power(2.5).unwrap(), Watts(0.0));
        assert!(*turbine.power(3.0).unwrap() > 0.0);
        assert_eq!(turbine.power(25.0).unwrap(), turbine.rated_power);
        assert_eq!(turbine.power(25.5).unwrap(), Watts(0.0));
        let disabled = WindTurbineConfig::default();
        assert!(*disabled.power(60.0).unwrap() > 0.0);
    }

    #[test]
    fn test_invalid_inputs() {
        let rated = Watts(1e6);
        assert!(matches!(
            wind_power(-1.0, 1.225, 2000.0, 0.4, rated),
            Err(SimError::InvalidInput(_))
        ));
        assert!(wind_power(f64::NAN, 1.225, 2000.0, 0.4, rated).is_err());
        assert!(wind_power(8.0, 1.225, 0.0, 0.4, rated).is_err());
        assert!(wind_power(8.0, 0.0, 2000.0, 0.4, rated).is_err());
        assert!(wind_power(8.0, 1.225, 2000.0, 0.6, rated).is_err());
        assert!(wind_power(8.0, 1.225, 2000.0, 0.0, rated).is_err());
        assert!(wind_power(8.0, 1.225, 2000.0, BETZ_LIMIT, rated).is_ok());
        let bad_cut = WindTurbineConfig {
            cut_in_speed: Some(10.0),
            cut_out_speed: Some(5.0),
            ..Default::default()
        };
        assert!(bad_cut.validate().is_err());
    }

    #[test]
    fn test_profiles() {
        let cfg = WindConfig::default();
        let series = cfg.power_series(3).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(Some(series[0]), cfg.constant_power().unwrap());

        let varying = WindConfig {
            profile: WindProfile::Series(vec![3.0, 5.0, 7.0, 9.0]),
            ..Default::default()
        };
        assert!(varying.power_series(3).is_err());
        let p = varying.power_series(4).unwrap();
        assert!(p.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(varying.constant_power().unwrap(), None);
        let series = WindConfig {
            profile: WindProfile::Series(vec![4.0, -2.0]),
            ..Default::default()
        };
        assert!(series.power_series(2).is_err());
    }
}
