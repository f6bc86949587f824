use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta};
use derive_more::derive::{Deref, IntoIterator};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::renewables::Location;

/// Strictly increasing sequence of timestamps.
#[derive(Debug, Clone, Default, PartialEq, Deref, IntoIterator, Serialize, Deserialize)]
#[serde(try_from = "Vec<DateTime<FixedOffset>>", into = "Vec<DateTime<FixedOffset>>")]
pub struct TimeSeries(#[into_iterator(owned, ref)] Vec<DateTime<FixedOffset>>);

impl TryFrom<Vec<DateTime<FixedOffset>>> for TimeSeries {
    type Error = SimError;

    fn try_from(points: Vec<DateTime<FixedOffset>>) -> Result<Self> {
        if let Some(w) = points.windows(2).find(|w| w[1] <= w[0]) {
            return Err(SimError::invalid_input(format!(
                "timestamps must be strictly increasing, {} follows {}",
                w[1], w[0]
            )));
        }
        Ok(TimeSeries(points))
    }
}

impl From<TimeSeries> for Vec<DateTime<FixedOffset>> {
    fn from(ts: TimeSeries) -> Self {
        ts.0
    }
}

impl TimeSeries {
    pub fn new(points: Vec<DateTime<FixedOffset>>) -> Result<Self> {
        points.try_into()
    }

    /// Every `step` from `start` up to and including `end`.
    pub fn date_range(
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        step: TimeDelta,
    ) -> Result<Self> {
        if step <= TimeDelta::zero() {
            return Err(SimError::invalid_input("time step must be positive"));
        }
        if end < start {
            return Err(SimError::invalid_input(format!(
                "range ends at {end} before it starts at {start}"
            )));
        }
        let mut points = Vec::new();
        let mut t = start;
        while t <= end {
            points.push(t);
            t = t
                .checked_add_signed(step)
                .ok_or_else(|| SimError::invalid_input("time range overflows"))?;
        }
        Ok(TimeSeries(points))
    }

    /// Hourly points from local midnight of `date` to the next midnight, 25 in total.
    pub fn hourly_day(date: NaiveDate, offset: FixedOffset) -> Result<Self> {
        let start = local_midnight(date, offset)?;
        Self::date_range(start, start + TimeDelta::days(1), TimeDelta::hours(1))
    }

    pub fn as_slice(&self) -> &[DateTime<FixedOffset>] {
        &self.0
    }
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> Result<DateTime<FixedOffset>> {
    date.and_hms_opt(0, 0, 0)
        .and_then(|t| t.and_local_timezone(offset).single())
        .ok_or_else(|| SimError::invalid_input(format!("invalid date {date}")))
}

fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Date range in the location's local time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSeriesConfig {
    #[serde(default = "default_start")]
    pub start: NaiveDate,
    pub days: u32,
    pub step_minutes: u32,
}

impl Default for TimeSeriesConfig {
    fn default() -> Self {
        Self {
            start: default_start(),
            days: 1,
            step_minutes: 60,
        }
    }
}

impl TimeSeriesConfig {
    /// Builds the series from local midnight of `start` through `start + days`, inclusive.
    pub fn build(&self, location: &Location) -> Result<TimeSeries> {
        if self.days == 0 {
            return Err(SimError::invalid_input("simulation must span at least one day"));
        }
        if self.step_minutes == 0 {
            return Err(SimError::invalid_input("time step must be positive"));
        }
        let start = local_midnight(self.start, location.timezone()?)?;
        TimeSeries::date_range(
            start,
            start + TimeDelta::days(self.days as i64),
            TimeDelta::minutes(self.step_minutes as i64),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renewables::Site;
    use chrono::Timelike;

    fn wat() -> FixedOffset {
        FixedOffset::east_opt(3600).unwrap()
    }

    #[test]
    fn test_hourly_day_is_inclusive() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let ts = TimeSeries::hourly_day(day, wat()).unwrap();
        assert_eq!(ts.len(), 25);
        assert_eq!(ts[0].hour(), 0);
        assert_eq!(ts[12].hour(), 12);
        assert_eq!(ts[24].date_naive(), day.succ_opt().unwrap());
        assert_eq!(ts[0].offset(), &wat());
    }

    #[test]
    fn test_date_range_rejects_bad_steps() {
        let t0 = local_midnight(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), wat()).unwrap();
        assert!(TimeSeries::date_range(t0, t0, TimeDelta::zero()).is_err());
        assert!(TimeSeries::date_range(t0, t0 - TimeDelta::hours(1), TimeDelta::hours(1)).is_err());
        let single = TimeSeries::date_range(t0, t0, TimeDelta::hours(1)).unwrap();
        assert_eq!(single.len(), 1);
        let quarter = TimeSeries::date_range(t0, t0 + TimeDelta::hours(1), TimeDelta::minutes(15)).unwrap();
        assert_eq!(quarter.len(), 5);
    }

    #[test]
    fn test_must_increase() {
        let t0 = local_midnight(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), wat()).unwrap();
        assert!(TimeSeries::new(vec![t0, t0]).is_err());
        assert!(TimeSeries::new(vec![]).unwrap().is_empty());
        let json = r#"["2025-01-01T01:00:00+01:00", "2025-01-01T00:00:00+01:00"]"#;
        assert!(serde_json::from_str::<TimeSeries>(json).is_err());
    }

    #[test]
    fn test_config_builds_in_local_time() {
        let cfg = TimeSeriesConfig {
            days: 2,
            step_minutes: 30,
            ..Default::default()
        };
        let ts = cfg.build(&Site::Sokoto.location()).unwrap();
        assert_eq!(ts.len(), 2 * 48 + 1);
        assert_eq!(ts[0].offset().local_minus_utc(), 3600);
        assert!(TimeSeriesConfig { days: 0, ..Default::default() }
            .build(&Site::Sokoto.location())
            .is_err());
        let cfg: TimeSeriesConfig = serde_json::from_str(r#"{"start": "2025-06-21"}"#).unwrap();
        assert_eq!(cfg.days, 1);
        assert_eq!(cfg.build(&Site::Enugu.location()).unwrap().len(), 25);
    }
}
