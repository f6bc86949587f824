//! Generation models: sun geometry, clear-sky irradiance, PV and wind conversion.

pub mod clearsky;
pub mod location;
pub mod pv;
pub mod solar_position;
pub mod wind;

pub use clearsky::{ClearSkyConfig, ClearSkyIrradiance, ClearSkyModel, compute_clearsky};
pub use location::{Location, Site};
pub use pv::{
    CellTemperature, InverterConfig, PVArrayConfig, PoaIrradiance, PvOutput,
    plane_of_array_irradiance, pvwatts_dc,
};
pub use solar_position::{SolarPosition, compute_solar_position, solar_midnight, solar_transit};
pub use wind::{WindConfig, WindProfile, WindTurbineConfig, wind_power};
