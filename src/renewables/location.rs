use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// A geographic site.
///
/// Latitude is positive north, longitude positive east, both in degrees.
/// `utc_offset_minutes` is the local standard time used when building time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Height above sea level, sets the surface pressure of the clear-sky models.
    #[serde(default)]
    pub altitude_m: f64,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, utc_offset_minutes: i32) -> Result<Self> {
        let loc = Location {
            name: None,
            latitude,
            longitude,
            altitude_m: 0.0,
            utc_offset_minutes,
        };
        loc.validate()?;
        Ok(loc)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_altitude(mut self, altitude_m: f64) -> Self {
        self.altitude_m = altitude_m;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(SimError::InvalidLocation(format!(
                "latitude {} outside [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(SimError::InvalidLocation(format!(
                "longitude {} outside [-180, 180]",
                self.longitude
            )));
        }
        if !self.altitude_m.is_finite() {
            return Err(SimError::InvalidLocation("altitude must be finite".into()));
        }
        self.timezone().map(|_| ())
    }

    pub fn timezone(&self) -> Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                SimError::InvalidLocation(format!(
                    "utc offset of {} minutes is out of range",
                    self.utc_offset_minutes
                ))
            })
    }

    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{:.4}, {:.4}", self.latitude, self.longitude))
    }
}

/// Named Nigerian sites of the reference scenarios, all on West Africa Time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Site {
    Sokoto,
    Enugu,
    PortHarcourt,
}

/// UTC+01:00.
pub const WEST_AFRICA_TIME_MINUTES: i32 = 60;

impl Site {
    pub const ALL: [Site; 3] = [Site::Sokoto, Site::Enugu, Site::PortHarcourt];

    pub fn name(self) -> &'static str {
        match self {
            Site::Sokoto => "Sokoto",
            Site::Enugu => "Enugu",
            Site::PortHarcourt => "Port Harcourt",
        }
    }

    pub fn coordinates(self) -> (f64, f64) {
        match self {
            Site::Sokoto => (13.0059, 5.2476),
            Site::Enugu => (6.4584, 7.5464),
            Site::PortHarcourt => (4.8581, 6.9209),
        }
    }

    pub fn location(self) -> Location {
        let (latitude, longitude) = self.coordinates();
        Location {
            name: Some(self.name().to_owned()),
            latitude,
            longitude,
            altitude_m: 0.0,
            utc_offset_minutes: WEST_AFRICA_TIME_MINUTES,
        }
    }
}

impl From<Site> for Location {
    fn from(site: Site) -> Self {
        site.location()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_coordinates() {
        assert!(matches!(
            Location::new(91.0, 0.0, 0),
            Err(SimError::InvalidLocation(_))
        ));
        assert!(matches!(
            Location::new(0.0, -180.5, 0),
            Err(SimError::InvalidLocation(_))
        ));
        assert!(Location::new(f64::NAN, 0.0, 0).is_err());
        assert!(Location::new(0.0, 0.0, 25 * 60).is_err());
        assert!(Location::new(-90.0, 180.0, -12 * 60).is_ok());
    }

    #[test]
    fn test_sites_are_valid() {
        for site in Site::ALL {
            let loc = site.location();
            assert!(loc.validate().is_ok());
            assert_eq!(loc.timezone().unwrap().local_minus_utc(), 3600);
        }
        assert_eq!(Site::Sokoto.location().label(), "Sokoto");
    }

    #[test]
    fn test_location_json_defaults() {
        let loc: Location =
            serde_json::from_str(r#"{"latitude": 13.0, "longitude": 5.2}"#).unwrap();
        assert_eq!(loc.altitude_m, 0.0);
        assert_eq!(loc.utc_offset_minutes, 0);
        let site: Site = serde_json::from_str(r#""port_harcourt""#).unwrap();
        assert_eq!(site, Site::PortHarcourt);
    }
}
