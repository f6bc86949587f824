use serde::{Deserialize, Serialize};

use super::{
    clearsky::{ClearSkyConfig, ClearSkyIrradiance},
    solar_position::SolarPosition,
};
use crate::basic::ecs::elements::Watts;
use crate::error::{Result, SimError};

/// Irradiance at which PVWatts reaches `pdc0`, W/m².
pub const REFERENCE_IRRADIANCE: f64 = 1000.0;
/// Cell temperature at which PVWatts reaches `pdc0`, °C.
pub const REFERENCE_TEMPERATURE: f64 = 25.0;

/// How the cell temperature is obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellTemperature {
    /// Constant cell temperature, °C.
    Fixed(f64),
    /// Faiman (2008): `T = ambient + poa / (u0 + u1 * wind_speed)`.
    Faiman {
        ambient_c: f64,
        #[serde(default = "default_module_wind")]
        wind_speed: f64,
        #[serde(default = "default_u0")]
        u0: f64,
        #[serde(default = "default_u1")]
        u1: f64,
    },
}

fn default_module_wind() -> f64 {
    1.0
}
fn default_u0() -> f64 {
    25.0
}
fn default_u1() -> f64 {
    6.84
}

impl Default for CellTemperature {
    fn default() -> Self {
        CellTemperature::Fixed(REFERENCE_TEMPERATURE)
    }
}

impl CellTemperature {
    pub fn at(&self, poa_global: f64) -> f64 {
        match *self {
            CellTemperature::Fixed(t) => t,
            CellTemperature::Faiman {
                ambient_c,
                wind_speed,
                u0,
                u1,
            } => ambient_c + poa_global / (u0 + u1 * wind_speed),
        }
    }
}

/// PVWatts inverter. The AC limit is `eta_inv_nom * pdc0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InverterConfig {
    /// DC input rating.
    pub pdc0: Watts,
    pub eta_inv_nom: f64,
    pub eta_inv_ref: f64,
}

impl Default for InverterConfig {
    fn default() -> Self {
        Self {
            pdc0: Watts(50_000.0),
            eta_inv_nom: 0.96,
            eta_inv_ref: 0.9637,
        }
    }
}

impl InverterConfig {
    pub fn pac0(&self) -> Watts {
        self.pdc0 * self.eta_inv_nom
    }

    /// AC output for a DC input, clipped to `[0, pac0]`.
    pub fn ac_power(&self, pdc: Watts) -> Watts {
        if *pdc <= 0.0 {
            return Watts(0.0);
        }
        let zeta = *pdc / *self.pdc0;
        let eta = self.eta_inv_nom / self.eta_inv_ref * (-0.0162 * zeta - 0.0059 / zeta + 0.9858);
        Watts((eta * *pdc).min(*self.pac0()).max(0.0))
    }
}

/// A fixed-tilt PV array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PVArrayConfig {
    /// Degrees from horizontal.
    pub surface_tilt: f64,
    /// Degrees clockwise from north, 180 faces south.
    pub surface_azimuth: f64,
    pub pdc0: Watts,
    /// Power temperature coefficient, 1/°C.
    pub gamma_pdc: f64,
    pub albedo: f64,
    /// Clear-sky model feeding the array.
    pub irradiance: ClearSkyConfig,
    pub cell_temperature: CellTemperature,
    pub inverter: Option<InverterConfig>,
}

impl Default for PVArrayConfig {
    fn default() -> Self {
        Self {
            surface_tilt: 30.0,
            surface_azimuth: 180.0,
            pdc0: Watts(50_000.0),
            gamma_pdc: -0.004,
            albedo: 0.25,
            irradiance: ClearSkyConfig::default(),
            cell_temperature: CellTemperature::default(),
            inverter: None,
        }
    }
}

/// Irradiance on the tilted array, W/m², and the angle of incidence in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoaIrradiance {
    pub poa_global: f64,
    pub poa_direct: f64,
    pub poa_diffuse: f64,
    pub poa_sky_diffuse: f64,
    pub poa_ground_diffuse: f64,
    pub aoi: f64,
}

/// Per-timestamp output of a PV array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PvOutput {
    pub poa: Vec<PoaIrradiance>,
    pub cell_temperature: Vec<f64>,
    pub dc: Vec<Watts>,
    /// Present when an inverter is configured.
    pub ac: Option<Vec<Watts>>,
}

impl PvOutput {
    /// Power delivered to the network: AC behind an inverter, DC otherwise.
    pub fn injected(&self) -> &[Watts] {
        self.ac.as_deref().unwrap_or(&self.dc)
    }
}

/// Cosine of the angle between the sun and the panel normal.
pub fn aoi_projection(surface_tilt: f64, surface_azimuth: f64, zenith: f64, azimuth: f64) -> f64 {
    let (tilt, zen) = (surface_tilt.to_radians(), zenith.to_radians());
    let projection = tilt.cos() * zen.cos()
        + tilt.sin() * zen.sin() * (azimuth - surface_azimuth).to_radians().cos();
    projection.clamp(-1.0, 1.0)
}

pub fn aoi(surface_tilt: f64, surface_azimuth: f64, zenith: f64, azimuth: f64) -> f64 {
    aoi_projection(surface_tilt, surface_azimuth, zenith, azimuth)
        .acos()
        .to_degrees()
}

/// Isotropic-sky transposition: beam, sky diffuse and ground-reflected parts.
pub fn poa_isotropic(
    surface_tilt: f64,
    surface_azimuth: f64,
    pos: &SolarPosition,
    cs: &ClearSkyIrradiance,
    albedo: f64,
) -> PoaIrradiance {
    let aoi_deg = aoi(surface_tilt, surface_azimuth, pos.apparent_zenith, pos.azimuth);
    if pos.is_night() {
        return PoaIrradiance {
            aoi: aoi_deg,
            ..Default::default()
        };
    }
    let cos_tilt = surface_tilt.to_radians().cos();
    let poa_direct = (cs.dni * aoi_deg.to_radians().cos()).max(0.0);
    let poa_sky_diffuse = cs.dhi * (1.0 + cos_tilt) * 0.5;
    let poa_ground_diffuse = cs.ghi * albedo * (1.0 - cos_tilt) * 0.5;
    let poa_diffuse = poa_sky_diffuse + poa_ground_diffuse;
    PoaIrradiance {
        poa_global: poa_direct + poa_diffuse,
        poa_direct,
        poa_diffuse,
        poa_sky_diffuse,
        poa_ground_diffuse,
        aoi: aoi_deg,
    }
}

pub fn plane_of_array_irradiance(
    surface_tilt: f64,
    surface_azimuth: f64,
    positions: &[SolarPosition],
    clearsky: &[ClearSkyIrradiance],
    albedo: f64,
) -> Result<Vec<PoaIrradiance>> {
    if positions.len() != clearsky.len() {
        return Err(SimError::invalid_input(format!(
            "{} solar positions for {} irradiance samples",
            positions.len(),
            clearsky.len()
        )));
    }
    Ok(positions
        .iter()
        .zip(clearsky)
        .map(|(pos, cs)| poa_isotropic(surface_tilt, surface_azimuth, pos, cs, albedo))
        .collect())
}

/// PVWatts DC model, `pdc0 * poa/1000 * (1 + gamma_pdc * (t_cell - 25))`, never negative.
pub fn pvwatts_dc(poa_global: f64, cell_temp: f64, pdc0: Watts, gamma_pdc: f64) -> Watts {
    let derate = 1.0 + gamma_pdc * (cell_temp - REFERENCE_TEMPERATURE);
    Watts((*pdc0 * poa_global / REFERENCE_IRRADIANCE * derate).max(0.0))
}

impl PVArrayConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=90.0).contains(&self.surface_tilt) {
            return Err(SimError::invalid_input(format!(
                "surface tilt {} outside [0, 90]",
                self.surface_tilt
            )));
        }
        if !(0.0..360.0).contains(&self.surface_azimuth) {
            return Err(SimError::invalid_input(format!(
                "surface azimuth {} outside [0, 360)",
                self.surface_azimuth
            )));
        }
        if !(self.pdc0.is_finite() && *self.pdc0 > 0.0) {
            return Err(SimError::invalid_input("pdc0 must be positive"));
        }
        if !self.gamma_pdc.is_finite() {
            return Err(SimError::invalid_input("gamma_pdc must be finite"));
        }
        if !(0.0..=1.0).contains(&self.albedo) {
            return Err(SimError::invalid_input(format!(
                "albedo {} outside [0, 1]",
                self.albedo
            )));
        }
        self.irradiance.validate()?;
        if let CellTemperature::Faiman { u0, u1, wind_speed, .. } = self.cell_temperature {
            if !(u0 + u1 * wind_speed > 0.0) {
                return Err(SimError::invalid_input("faiman heat loss must be positive"));
            }
        }
        if let Some(inv) = &self.inverter {
            if !(*inv.pdc0 > 0.0 && inv.eta_inv_nom > 0.0 && inv.eta_inv_ref > 0.0) {
                return Err(SimError::invalid_input(
                    "inverter rating and efficiencies must be positive",
                ));
            }
        }
        Ok(())
    }

    pub fn poa(
        &self,
        positions: &[SolarPosition],
        clearsky: &[ClearSkyIrradiance],
    ) -> Result<Vec<PoaIrradiance>> {
        plane_of_array_irradiance(
            self.surface_tilt,
            self.surface_azimuth,
            positions,
            clearsky,
            self.albedo,
        )
    }

    /// Runs transposition, cell temperature, DC and optional inverter models.
    pub fn simulate(
        &self,
        positions: &[SolarPosition],
        clearsky: &[ClearSkyIrradiance],
    ) -> Result<PvOutput> {
        self.validate()?;
        let poa = self.poa(positions, clearsky)?;
        let cell_temperature: Vec<f64> = poa
            .iter()
            .map(|p| self.cell_temperature.at(p.poa_global))
            .collect();
        let dc: Vec<Watts> = poa
            .iter()
            .zip(&cell_temperature)
            .map(|(p, t)| pvwatts_dc(p.poa_global, *t, self.pdc0, self.gamma_pdc))
            .collect();
        let ac = self
            .inverter
            .as_ref()
            .map(|inv| dc.iter().map(|p| inv.ac_power(*p)).collect());
        Ok(PvOutput {
            poa,
            cell_temperature,
            dc,
            ac,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sun(zenith: f64, azimuth: f64) -> SolarPosition {
        SolarPosition {
            zenith,
            apparent_zenith: zenith,
            elevation: 90.0 - zenith,
            apparent_elevation: 90.0 - zenith,
            azimuth,
            hour_angle: 0.0,
            declination: 0.0,
            equation_of_time: 0.0,
        }
    }

    const SKY: ClearSkyIrradiance = ClearSkyIrradiance {
        ghi: 850.0,
        dni: 930.0,
        dhi: 100.0,
    };

    #[test]
    fn test_pvwatts_dc_reference_and_clamp() {
        let p = pvwatts_dc(1000.0, 25.0, Watts(50_000.0), -0.004);
        assert_eq!(p, Watts(50_000.0));
        let hot = pvwatts_dc(1000.0, 65.0, Watts(50_000.0), -0.004);
        assert!((*hot - 42_000.0).abs() < 1e-9);
        // derate below zero is clamped
        assert_eq!(pvwatts_dc(800.0, 500.0, Watts(50_000.0), -0.004), Watts(0.0));
        assert_eq!(pvwatts_dc(0.0, 25.0, Watts(50_000.0), -0.004), Watts(0.0));
    }

    #[test]
    fn test_pv_power_bounded() {
        let pdc0 = Watts(50_000.0);
        for gamma in [-0.005, -0.004, 0.0] {
            for poa in [0.0, 200.0, 800.0, 1000.0, 1200.0] {
                for t in [-10.0, 25.0, 60.0, 150.0, 400.0] {
                    let p = *pvwatts_dc(poa, t, pdc0, gamma);
                    let bound = *pdc0 * poa / 1000.0 * (1.0 + gamma * (t - 25.0)).max(0.0);
                    assert!(p >= 0.0);
                    assert!(p <= bound + 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_isotropic_components() {
        let pos = sun(36.0, 180.0);
        let poa = poa_isotropic(30.0, 180.0, &pos, &SKY, 0.25);
        assert!((poa.aoi - 6.0).abs() < 1e-9);
        let cos30 = 30f64.to_radians().cos();
        assert!((poa.poa_sky_diffuse - 100.0 * (1.0 + cos30) / 2.0).abs() < 1e-9);
        assert!((poa.poa_ground_diffuse - 850.0 * 0.25 * (1.0 - cos30) / 2.0).abs() < 1e-9);
        assert!(
            (poa.poa_global - (poa.poa_direct + poa.poa_sky_diffuse + poa.poa_ground_diffuse)).abs()
                < 1e-9
        );
        // facing the sun beats lying flat
        let flat = poa_isotropic(0.0, 180.0, &pos, &SKY, 0.25);
        assert!(poa.poa_global > flat.poa_global);
    }

    #[test]
    fn test_sun_behind_panel_has_no_beam() {
        let pos = sun(60.0, 0.0);
        let poa = poa_isotropic(60.0, 180.0, &pos, &SKY, 0.25);
        assert!(poa.aoi > 90.0);
        assert_eq!(poa.poa_direct, 0.0);
        assert!(poa.poa_global > 0.0);
    }

    #[test]
    fn test_night_poa_is_zero() {
        let pos = sun(95.0, 300.0);
        let poa = poa_isotropic(30.0, 180.0, &pos, &SKY, 0.25);
        assert_eq!(poa.poa_global, 0.0);
        assert_eq!(poa.poa_diffuse, 0.0);
    }

    #[test]
    fn test_inverter_clips_and_zeroes() {
        let inv = InverterConfig::default();
        assert_eq!(inv.ac_power(Watts(0.0)), Watts(0.0));
        assert_eq!(inv.ac_power(Watts(80_000.0)), inv.pac0());
        let half = *inv.ac_power(Watts(25_000.0));
        assert!(half > 0.9 * 25_000.0 && half < 25_000.0);
    }

    #[test]
    fn test_simulate_uses_faiman_and_inverter() {
        let cfg = PVArrayConfig {
            cell_temperature: CellTemperature::Faiman {
                ambient_c: 30.0,
                wind_speed: 2.0,
                u0: 25.0,
                u1: 6.84,
            },
            inverter: Some(InverterConfig::default()),
            ..Default::default()
        };
        let out = cfg.simulate(&[sun(36.0, 180.0), sun(100.0, 0.0)], &[SKY, ClearSkyIrradiance::default()]).unwrap();
        assert!(out.cell_temperature[0] > 30.0);
        assert_eq!(out.cell_temperature[1], 30.0);
        let ac = out.ac.as_ref().unwrap();
        assert!(ac[0] < out.dc[0]);
        assert_eq!(out.injected()[1], Watts(0.0));
        assert_eq!(out.injected(), ac.as_slice());
    }

    #[test]
    fn test_validation() {
        let ok = PVArrayConfig::default();
        assert!(ok.validate().is_ok());
        let bad_tilt = PVArrayConfig {
            surface_tilt: 95.0,
            ..Default::default()
        };
        assert!(matches!(bad_tilt.validate(), Err(SimError::InvalidInput(_))));
        let bad_az = PVArrayConfig {
            surface_azimuth: 360.0,
            ..Default::default()
        };
        assert!(bad_az.validate().is_err());
        let bad_pdc = PVArrayConfig {
            pdc0: Watts(0.0),
            ..Default::default()
        };
        assert!(bad_pdc.validate().is_err());
        assert!(ok.poa(&[sun(30.0, 180.0)], &[]).is_err());
    }
}
