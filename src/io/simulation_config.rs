use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::network_config::NetworkConfig;
use crate::error::Result;
use crate::renewables::{Location, PVArrayConfig, Site, WindConfig};
use crate::simulation::{SimulationResult, run_simulation};
use crate::timeseries::TimeSeriesConfig;

/// Either a named site or explicit coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocationSpec {
    Site(Site),
    Custom(Location),
}

impl Default for LocationSpec {
    fn default() -> Self {
        LocationSpec::Site(Site::Sokoto)
    }
}

impl LocationSpec {
    pub fn resolve(&self) -> Result<Location> {
        let loc = match self {
            LocationSpec::Site(site) => site.location(),
            LocationSpec::Custom(loc) => loc.clone(),
        };
        loc.validate()?;
        Ok(loc)
    }
}

/// One complete scenario: where, when, which plants and which network.
///
/// Every section is optional in JSON and falls back to the Sokoto reference case.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub location: LocationSpec,
    pub time: TimeSeriesConfig,
    pub pv: PVArrayConfig,
    pub wind: WindConfig,
    pub network: NetworkConfig,
}

impl SimulationConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("loading scenario {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn run(&self) -> Result<SimulationResult> {
        let location = self.location.resolve()?;
        let times = self.time.build(&location)?;
        run_simulation(&location, &times, &self.pv, &self.wind, &self.network)
    }
}
