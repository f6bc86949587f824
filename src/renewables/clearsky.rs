use chrono::{DateTime, Datelike, FixedOffset};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::{
    location::Location,
    solar_position::{SolarPosition, compute_solar_position},
};
use crate::error::{Result, SimError};

/// Solar constant of the Spencer extraterrestrial model, W/m².
pub const SOLAR_CONSTANT: f64 = 1366.1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearSkyModel {
    /// Ineichen-Perez with a Linke turbidity.
    #[default]
    Ineichen,
    /// Simplified Solis driven by aerosol optical depth and precipitable water.
    Simplified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearSkyConfig {
    pub model: ClearSkyModel,
    pub linke_turbidity: f64,
    /// Aerosol optical depth at 700 nm.
    pub aod700: f64,
    /// Precipitable water, cm.
    pub precipitable_water: f64,
}

impl Default for ClearSkyConfig {
    fn default() -> Self {
        Self {
            model: ClearSkyModel::Ineichen,
            linke_turbidity: 3.0,
            aod700: 0.1,
            precipitable_water: 1.0,
        }
    }
}

impl ClearSkyConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.linke_turbidity.is_finite() && self.linke_turbidity > 0.0) {
            return Err(SimError::invalid_input("linke turbidity must be positive"));
        }
        if !(self.aod700.is_finite() && self.aod700 >= 0.0) {
            return Err(SimError::invalid_input("aod700 must not be negative"));
        }
        if !self.precipitable_water.is_finite() {
            return Err(SimError::invalid_input("precipitable water must be finite"));
        }
        Ok(())
    }
}

/// Clear-sky irradiance components, W/m².
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClearSkyIrradiance {
    pub ghi: f64,
    pub dni: f64,
    pub dhi: f64,
}

/// Extraterrestrial normal irradiance after Spencer (1971).
pub fn extra_radiation(day_of_year: u32) -> f64 {
    let b = 2.0 * PI * (day_of_year as f64 - 1.0) / 365.0;
    SOLAR_CONSTANT
        * (1.00011 + 0.034221 * b.cos() + 0.00128 * b.sin() + 0.000719 * (2.0 * b).cos()
            + 0.000077 * (2.0 * b).sin())
}

/// Standard atmosphere pressure (Pa) at an altitude in metres.
pub fn alt2pres(altitude_m: f64) -> f64 {
    100.0 * ((44331.514 - altitude_m) / 11880.516).powf(1.0 / 0.1902632)
}

/// Kasten and Young (1989) relative airmass. `None` below the horizon.
pub fn relative_airmass(zenith: f64) -> Option<f64> {
    (zenith < 90.0).then(|| {
        1.0 / (zenith.to_radians().cos() + 0.50572 * (6.07995 + (90.0 - zenith)).powf(-1.6364))
    })
}

fn ineichen(apparent_zenith: f64, pressure: f64, altitude: f64, tl: f64, dni_extra: f64) -> ClearSkyIrradiance {
    let Some(am_rel) = relative_airmass(apparent_zenith) else {
        return ClearSkyIrradiance::default();
    };
    let am = am_rel * pressure / 101325.0;
    let cos_zenith = apparent_zenith.to_radians().cos().max(0.0);

    let fh1 = (-altitude / 8000.0).exp();
    let fh2 = (-altitude / 1250.0).exp();
    let cg1 = 5.09e-5 * altitude + 0.868;
    let cg2 = 3.92e-5 * altitude + 0.0387;

    let ghi = cg1 * dni_extra * cos_zenith * (-cg2 * am * (fh1 + fh2 * (tl - 1.0))).exp().max(0.0);

    let b = 0.664 + 0.163 / fh1;
    let bnci = dni_extra * (b * (-0.09 * am * (tl - 1.0)).exp()).max(0.0);
    // empirical upper bound keeping the beam consistent with the global
    let bnci_2 = (1.0 - (0.1 - 0.2 * (-tl).exp()) / (0.1 + 0.882 / fh1)) / cos_zenith;
    let bnci_2 = ghi * bnci_2.clamp(0.0, 1e20);

    let dni = bnci.min(bnci_2);
    let dhi = (ghi - dni * cos_zenith).max(0.0);
    ClearSkyIrradiance { ghi, dni, dhi }
}

fn simplified_solis(
    apparent_elevation: f64,
    pressure: f64,
    aod700: f64,
    precipitable_water: f64,
    dni_extra: f64,
) -> ClearSkyIrradiance {
    if apparent_elevation <= 0.0 {
        return ClearSkyIrradiance::default();
    }
    let w = precipitable_water.max(0.2);
    let ln_w = w.ln();
    let ln_p = (pressure / 101325.0).ln();
    let a = aod700;

    let i0p = dni_extra
        * (0.12 * w.powf(0.56) * a * a + 0.97 * w.powf(0.032) * a + 1.08 * w.powf(0.0051)
            + 0.071 * ln_p);

    let taub = (1.82 + 0.056 * ln_w + 0.0071 * ln_w * ln_w) * a
        + 0.33 + 0.045 * ln_w + 0.0096 * ln_w * ln_w
        + (0.0089 * w + 0.13) * ln_p;
    let b = (0.00925 * a * a + 0.0148 * a - 0.0172) * ln_w + (-0.7565 * a * a + 0.5057 * a + 0.4557);

    let taug = (1.24 + 0.047 * ln_w + 0.0061 * ln_w * ln_w) * a
        + 0.27 + 0.043 * ln_w + 0.0090 * ln_w * ln_w
        + (0.0079 * w + 0.1) * ln_p;
    let g = -0.0147 * ln_w - 0.3079 * a * a + 0.2846 * a + 0.3798;

    let (td4, td3, td2, td1, td0, tdp) = if a < 0.05 {
        (
            86.0 * w - 13800.0,
            -3.11 * w + 79.4,
            -0.23 * w + 74.8,
            0.092 * w - 8.86,
            0.0042 * w + 3.12,
            -0.83 * (1.0 + a).powf(-17.2),
        )
    } else {
        (
            -0.21 * w + 11.6,
            0.27 * w - 20.7,
            -0.134 * w + 15.5,
            0.0554 * w - 5.71,
            0.0057 * w + 2.94,
            -0.71 * (1.0 + a).powf(-15.0),
        )
    };
    let taud = td4 * a.powi(4) + td3 * a.powi(3) + td2 * a * a + td1 * a + td0 + tdp * ln_p;
    let d = -0.337 * a * a + 0.63 * a + 0.116 + ln_p / (18.0 + 152.0 * a);

    let sin_elev = apparent_elevation.to_radians().sin().max(1e-30);
    ClearSkyIrradiance {
        dni: (i0p * (-taub / sin_elev.powf(b)).exp()).max(0.0),
        ghi: (i0p * (-taug / sin_elev.powf(g)).exp() * sin_elev).max(0.0),
        dhi: (i0p * (-taud / sin_elev.powf(d)).exp()).max(0.0),
    }
}

/// Clear-sky irradiance for already computed sun positions.
///
/// Returns exact zeros whenever the apparent zenith is 90° or more.
pub fn clearsky_from_positions(
    location: &Location,
    timestamps: &[DateTime<FixedOffset>],
    positions: &[SolarPosition],
    cfg: &ClearSkyConfig,
) -> Result<Vec<ClearSkyIrradiance>> {
    cfg.validate()?;
    if timestamps.len() != positions.len() {
        return Err(SimError::invalid_input(format!(
            "{} timestamps for {} solar positions",
            timestamps.len(),
            positions.len()
        )));
    }
    let pressure = alt2pres(location.altitude_m);
    Ok(timestamps
        .iter()
        .zip(positions)
        .map(|(t, pos)| {
            if pos.is_night() {
                return ClearSkyIrradiance::default();
            }
            let dni_extra = extra_radiation(t.ordinal());
            match cfg.model {
                ClearSkyModel::Ineichen => ineichen(
                    pos.apparent_zenith,
                    pressure,
                    location.altitude_m,
                    cfg.linke_turbidity,
                    dni_extra,
                ),
                ClearSkyModel::Simplified => simplified_solis(
                    pos.apparent_elevation,
                    pressure,
                    cfg.aod700,
                    cfg.precipitable_water,
                    dni_extra,
                ),
            }
        })
        .collect())
}

pub fn compute_clearsky(
    location: &Location,
    timestamps: &[DateTime<FixedOffset>],
    cfg: &ClearSkyConfig,
) -> Result<Vec<ClearSkyIrradiance>> {
    let positions = compute_solar_position(location, timestamps)?;
    clearsky_from_positions(location, timestamps, &positions, cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renewables::{
        location::Site,
        solar_position::{solar_midnight, solar_position_at, solar_transit},
    };
    use chrono::NaiveDate;

    fn new_year() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn both_models() -> [ClearSkyConfig; 2] {
        [
            ClearSkyConfig::default(),
            ClearSkyConfig {
                model: ClearSkyModel::Simplified,
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_spencer_and_pressure() {
        // perihelion in early January
        assert!(extra_radiation(3) > extra_radiation(185));
        assert!((extra_radiation(1) - 1366.1 * 1.035).abs() < 2.0);
        assert!((alt2pres(0.0) - 101325.0).abs() < 5.0);
        assert!(alt2pres(1000.0) < 90000.0);
        assert!((relative_airmass(0.0).unwrap() - 1.0).abs() < 1e-3);
        assert!(relative_airmass(90.0).is_none());
    }

    #[test]
    fn test_zero_at_solar_midnight() {
        for site in Site::ALL {
            let loc = site.location();
            let t = solar_midnight(&loc, new_year()).unwrap();
            for cfg in both_models() {
                let cs = compute_clearsky(&loc, &[t], &cfg).unwrap();
                assert_eq!(cs[0], ClearSkyIrradiance::default());
            }
        }
    }

    #[test]
    fn test_noon_values_are_plausible() {
        let loc = Site::Sokoto.location();
        let t = solar_transit(&loc, new_year()).unwrap();
        let pos = solar_position_at(&loc, &t);
        for cfg in both_models() {
            let cs = compute_clearsky(&loc, &[t], &cfg).unwrap()[0];
            assert!(cs.ghi > 600.0 && cs.ghi < 1100.0, "{cfg:?}: {cs:?}");
            assert!(cs.dni > 600.0 && cs.dni < 1100.0);
            assert!(cs.dhi >= 0.0 && cs.dhi < 250.0);
            // closure relation of the component model
            let closure = cs.dni * pos.apparent_zenith.to_radians().cos() + cs.dhi;
            assert!((closure - cs.ghi).abs() / cs.ghi < 0.1, "{cfg:?}: {closure} vs {}", cs.ghi);
        }
    }

    #[test]
    fn test_hourly_day_is_non_negative() {
        let loc = Site::PortHarcourt.location();
        let tz = loc.timezone().unwrap();
        let times: Vec<_> = (0..24)
            .map(|h| new_year().and_hms_opt(h, 0, 0).unwrap().and_local_timezone(tz).unwrap())
            .collect();
        for cfg in both_models() {
            let cs = compute_clearsky(&loc, &times, &cfg).unwrap();
            assert!(cs.iter().all(|c| c.ghi >= 0.0 && c.dni >= 0.0 && c.dhi >= 0.0));
            assert_eq!(cs[0].ghi, 0.0);
            assert!(cs[13].ghi > 0.0);
        }
    }

    #[test]
    fn test_turbidity_dims_the_beam() {
        let loc = Site::Enugu.location();
        let t = solar_transit(&loc, new_year()).unwrap();
        let clear = compute_clearsky(&loc, &[t], &ClearSkyConfig::default()).unwrap()[0];
        let hazy = ClearSkyConfig {
            linke_turbidity: 6.0,
            ..Default::default()
        };
        let hazy = compute_clearsky(&loc, &[t], &hazy).unwrap()[0];
        assert!(hazy.dni < clear.dni);
        assert!(hazy.dhi > clear.dhi);
        let bad = ClearSkyConfig {
            linke_turbidity: 0.0,
            ..Default::default()
        };
        assert!(matches!(compute_clearsky(&loc, &[t], &bad), Err(SimError::InvalidInput(_))));
    }
}
