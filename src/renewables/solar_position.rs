//! Sun position after the NOAA solar calculator.
//!
//! Accurate to about 0.01° in zenith for years 1800-2100, refraction included for the
//! apparent angles. Azimuth is measured clockwise from north.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use super::location::Location;
use crate::error::{Result, SimError};

const MS_PER_DAY: i64 = 86_400_000;
const MS_PER_MINUTE: f64 = 60_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolarPosition {
    /// Geometric zenith, degrees.
    pub zenith: f64,
    /// Zenith corrected for atmospheric refraction, degrees.
    pub apparent_zenith: f64,
    pub elevation: f64,
    pub apparent_elevation: f64,
    pub azimuth: f64,
    /// Degrees, zero at solar noon, negative in the morning.
    pub hour_angle: f64,
    pub declination: f64,
    /// Minutes.
    pub equation_of_time: f64,
}

impl SolarPosition {
    /// The sun is at or below the horizon.
    pub fn is_night(&self) -> bool {
        self.apparent_zenith >= 90.0
    }
}

/// Declination (degrees) and equation of time (minutes) at a Julian century.
fn sun_declination_eot(jc: f64) -> (f64, f64) {
    let l0 = (280.46646 + jc * (36000.76983 + jc * 0.0003032)).rem_euclid(360.0);
    let m = 357.52911 + jc * (35999.05029 - 0.0001537 * jc);
    let e = 0.016708634 - jc * (0.000042037 + 0.0000001267 * jc);
    let m_rad = m.to_radians();
    let center = m_rad.sin() * (1.914602 - jc * (0.004817 + 0.000014 * jc))
        + (2.0 * m_rad).sin() * (0.019993 - 0.000101 * jc)
        + (3.0 * m_rad).sin() * 0.000289;
    let omega = (125.04 - 1934.136 * jc).to_radians();
    let apparent_long = l0 + center - 0.00569 - 0.00478 * omega.sin();
    let mean_obliq =
        23.0 + (26.0 + (21.448 - jc * (46.815 + jc * (0.00059 - jc * 0.001813))) / 60.0) / 60.0;
    let obliq = (mean_obliq + 0.00256 * omega.cos()).to_radians();

    let declination = (obliq.sin() * apparent_long.to_radians().sin())
        .asin()
        .to_degrees();

    let y = (obliq / 2.0).tan().powi(2);
    let l0_rad = l0.to_radians();
    let eot = y * (2.0 * l0_rad).sin() - 2.0 * e * m_rad.sin()
        + 4.0 * e * y * m_rad.sin() * (2.0 * l0_rad).cos()
        - 0.5 * y * y * (4.0 * l0_rad).sin()
        - 1.25 * e * e * (2.0 * m_rad).sin();
    (declination, 4.0 * eot.to_degrees())
}

/// Refraction correction in degrees for a geometric elevation.
fn refraction(elevation: f64) -> f64 {
    let tan_e = elevation.to_radians().tan();
    let arcsec = if elevation > 85.0 {
        0.0
    } else if elevation > 5.0 {
        58.1 / tan_e - 0.07 / tan_e.powi(3) + 0.000086 / tan_e.powi(5)
    } else if elevation > -0.575 {
        1735.0 + elevation * (-518.2 + elevation * (103.4 + elevation * (-12.79 + elevation * 0.711)))
    } else {
        -20.772 / tan_e
    };
    arcsec / 3600.0
}

fn position_at_ms(latitude: f64, longitude: f64, unix_ms: i64) -> SolarPosition {
    let jd = unix_ms as f64 / MS_PER_DAY as f64 + 2440587.5;
    let jc = (jd - 2451545.0) / 36525.0;
    let (declination, equation_of_time) = sun_declination_eot(jc);

    let utc_minutes = unix_ms.rem_euclid(MS_PER_DAY) as f64 / MS_PER_MINUTE;
    let true_solar_time = (utc_minutes + equation_of_time + 4.0 * longitude).rem_euclid(1440.0);
    let hour_angle = true_solar_time / 4.0 - 180.0;

    let lat = latitude.to_radians();
    let decl = declination.to_radians();
    let ha = hour_angle.to_radians();
    let cos_zenith = (lat.sin() * decl.sin() + lat.cos() * decl.cos() * ha.cos()).clamp(-1.0, 1.0);
    let zenith = cos_zenith.acos().to_degrees();
    let azimuth = (ha.sin().atan2(ha.cos() * lat.sin() - decl.tan() * lat.cos()).to_degrees()
        + 180.0)
        .rem_euclid(360.0);

    let elevation = 90.0 - zenith;
    let apparent_elevation = elevation + refraction(elevation);
    SolarPosition {
        zenith,
        apparent_zenith: 90.0 - apparent_elevation,
        elevation,
        apparent_elevation,
        azimuth,
        hour_angle,
        declination,
        equation_of_time,
    }
}

/// Sun position at one instant. The location is assumed valid.
pub fn solar_position_at<Tz: TimeZone>(location: &Location, t: &DateTime<Tz>) -> SolarPosition {
    position_at_ms(location.latitude, location.longitude, t.timestamp_millis())
}

/// Sun position for every timestamp. An empty input gives an empty output.
pub fn compute_solar_position(
    location: &Location,
    timestamps: &[DateTime<FixedOffset>],
) -> Result<Vec<SolarPosition>> {
    location.validate()?;
    Ok(timestamps
        .iter()
        .map(|t| solar_position_at(location, t))
        .collect())
}

/// Walks from `guess_ms` to the instant the hour angle equals `target` degrees.
fn hour_angle_crossing(location: &Location, guess_ms: i64, target: f64) -> i64 {
    let mut t = guess_ms;
    for _ in 0..3 {
        let ha = position_at_ms(location.latitude, location.longitude, t).hour_angle;
        let delta = (ha - target + 180.0).rem_euclid(360.0) - 180.0;
        // the hour angle advances 0.25° per minute
        t -= (delta * 4.0 * MS_PER_MINUTE).round() as i64;
    }
    t
}

fn local_midnight_ms(location: &Location, date: NaiveDate) -> Result<i64> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| SimError::invalid_input(format!("invalid date {date}")))?;
    Ok(midnight.and_utc().timestamp_millis() - location.utc_offset_minutes as i64 * 60_000)
}

fn to_local(location: &Location, unix_ms: i64) -> Result<DateTime<FixedOffset>> {
    let tz = location.timezone()?;
    DateTime::from_timestamp_millis(unix_ms)
        .map(|t| t.with_timezone(&tz))
        .ok_or_else(|| SimError::invalid_input("timestamp out of range"))
}

/// Solar noon on the local calendar day `date`.
pub fn solar_transit(location: &Location, date: NaiveDate) -> Result<DateTime<FixedOffset>> {
    location.validate()?;
    let noon = local_midnight_ms(location, date)? + MS_PER_DAY / 2;
    to_local(location, hour_angle_crossing(location, noon, 0.0))
}

/// The anti-transit nearest to the local midnight that starts `date`.
///
/// Outside the polar circles the sun is below the horizon at this instant.
pub fn solar_midnight(location: &Location, date: NaiveDate) -> Result<DateTime<FixedOffset>> {
    location.validate()?;
    let midnight = local_midnight_ms(location, date)?;
    to_local(location, hour_angle_crossing(location, midnight, 180.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renewables::location::Site;
    use chrono::Timelike;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_equinox_noon_at_equator_is_overhead() {
        let loc = Location::new(0.0, 0.0, 0).unwrap();
        let noon = solar_transit(&loc, date(2025, 3, 20)).unwrap();
        let pos = solar_position_at(&loc, &noon);
        assert!(pos.zenith < 0.6, "zenith {}", pos.zenith);
        assert!(pos.hour_angle.abs() < 0.01);
    }

    #[test]
    fn test_sokoto_new_year_transit() {
        let loc = Site::Sokoto.location();
        let noon = solar_transit(&loc, date(2025, 1, 1)).unwrap();
        // about 39 min for longitude plus 3.5 min equation of time after 12:00 WAT
        assert_eq!(noon.hour(), 12);
        assert!((35..=50).contains(&noon.minute()), "transit at {noon}");
        let pos = solar_position_at(&loc, &noon);
        assert!((pos.azimuth - 180.0).abs() < 0.5);
        assert!((pos.zenith - (loc.latitude - pos.declination)).abs() < 0.05);
        assert!((pos.declination + 23.0).abs() < 0.3);
    }

    #[test]
    fn test_azimuth_moves_east_to_west() {
        let loc = Site::Enugu.location();
        let tz = loc.timezone().unwrap();
        let at = |h: u32| tz.with_ymd_and_hms(2025, 1, 1, h, 0, 0).unwrap();
        let morning = solar_position_at(&loc, &at(9));
        let afternoon = solar_position_at(&loc, &at(16));
        assert!(morning.azimuth > 90.0 && morning.azimuth < 180.0);
        assert!(afternoon.azimuth > 180.0 && afternoon.azimuth < 270.0);
        assert!(morning.hour_angle < 0.0 && afternoon.hour_angle > 0.0);
    }

    #[test]
    fn test_sun_below_horizon_at_solar_midnight() {
        for (lat, lon) in [(13.0059, 5.2476), (-33.9, 18.4), (60.0, -150.0), (0.0, 179.9)] {
            let loc = Location::new(lat, lon, 0).unwrap();
            let t = solar_midnight(&loc, date(2025, 6, 1)).unwrap();
            let pos = solar_position_at(&loc, &t);
            assert!(pos.is_night(), "{lat},{lon}: {pos:?}");
            assert!((pos.hour_angle.abs() - 180.0).abs() < 0.01);
        }
    }

    #[test]
    fn test_refraction_lifts_low_sun() {
        assert_eq!(refraction(89.0), 0.0);
        assert!(refraction(10.0) > 0.0);
        // about half a degree at the horizon
        assert!((refraction(0.0) - 0.482).abs() < 0.01);
    }

    #[test]
    fn test_invalid_location_and_empty_input() {
        let bad = Location {
            name: None,
            latitude: 95.0,
            longitude: 0.0,
            altitude_m: 0.0,
            utc_offset_minutes: 0,
        };
        assert!(matches!(
            compute_solar_position(&bad, &[]),
            Err(SimError::InvalidLocation(_))
        ));
        let ok = Site::Sokoto.location();
        assert!(compute_solar_position(&ok, &[]).unwrap().is_empty());
    }
}
