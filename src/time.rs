//! Calendar/civil time helpers.
//!
//! Slots and schedules carry `chrono::DateTime<Utc>` directly; the
//! ephemeris engine's internal math (root-finding, sidereal time) works in
//! Modified Julian Date, so this module is the seam between the two.

use serde::{Deserialize, Serialize};

/// Modified Julian Date. MJD 0 = 1858-11-17 00:00:00 UTC.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ModifiedJulianDate(qtty::Days);

impl ModifiedJulianDate {
    pub fn new<V: Into<qtty::Days>>(v: V) -> Self {
        Self(v.into())
    }

    pub fn value(&self) -> f64 {
        self.0.value()
    }

    /// Seconds since the Unix epoch (1970-01-01 00:00:00 UTC).
    pub fn to_unix_timestamp(&self) -> f64 {
        (self.value() - 40587.0) * 86400.0
    }

    pub fn from_unix_timestamp(timestamp: f64) -> Self {
        Self::new(timestamp / 86400.0 + 40587.0)
    }

    pub fn to_datetime(&self) -> chrono::DateTime<chrono::Utc> {
        let secs = self.to_unix_timestamp();
        let secs_i64 = secs.floor() as i64;
        let nanos = ((secs - secs.floor()) * 1e9) as u32;
        chrono::DateTime::from_timestamp(secs_i64, nanos).unwrap_or(chrono::DateTime::UNIX_EPOCH)
    }

    pub fn from_datetime(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self::from_unix_timestamp(dt.timestamp() as f64 + dt.timestamp_subsec_nanos() as f64 / 1e9)
    }

    /// Greenwich Mean Sidereal Time, in hours, for this instant (low
    /// precision, sufficient for hour-angle/airmass work per spec.md §4.1).
    pub fn gmst_hours(&self) -> f64 {
        let jd = self.value() + 2_400_000.5;
        let t = (jd - 2_451_545.0) / 36525.0;
        let gmst = 280.460_618_37 + 360.985_647_366_29 * (jd - 2_451_545.0)
            + 0.000_387_933 * t * t
            - t * t * t / 38_710_000.0;
        (gmst.rem_euclid(360.0)) / 15.0
    }
}

impl From<f64> for ModifiedJulianDate {
    fn from(v: f64) -> Self {
        ModifiedJulianDate::new(v)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for ModifiedJulianDate {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        ModifiedJulianDate::from_datetime(dt)
    }
}
