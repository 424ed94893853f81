//! Observer / Site (spec.md §3).

use serde::{Deserialize, Serialize};

/// A fixed ground-based observing site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observer {
    pub name: String,
    /// Geographic longitude, degrees east positive.
    pub longitude_deg: f64,
    /// Geographic latitude, degrees north positive.
    pub latitude_deg: f64,
    /// Elevation above sea level, meters.
    pub elevation_m: f64,
    /// Atmospheric pressure, millibars (used by refraction models).
    pub pressure_mbar: f64,
    /// Ambient temperature, Celsius.
    pub temperature_c: f64,
    /// Relative humidity, percent.
    pub humidity_pct: f64,
    /// IANA timezone name for local-time reporting.
    pub timezone: String,
}

/// Earth radius, meters (`original_source/qplan/util/calcpos.py`).
const EARTH_RADIUS_M: f64 = 6_378_136.6;

impl Observer {
    /// Horizon dip below the astronomical (sea-level) horizon caused by
    /// standing at `elevation_m` above the surrounding terrain, in degrees.
    /// `dip = acos(R / (R + h))`.
    pub fn horizon_dip_deg(&self) -> f64 {
        if self.elevation_m <= 0.0 {
            return 0.0;
        }
        (EARTH_RADIUS_M / (EARTH_RADIUS_M + self.elevation_m))
            .acos()
            .to_degrees()
    }

    pub fn latitude_rad(&self) -> f64 {
        self.latitude_deg.to_radians()
    }

    pub fn longitude_rad(&self) -> f64 {
        self.longitude_deg.to_radians()
    }

    /// Local apparent sidereal time, in hours, at `instant`.
    pub fn local_sidereal_time_hours(&self, instant: chrono::DateTime<chrono::Utc>) -> f64 {
        let mjd = crate::time::ModifiedJulianDate::from_datetime(instant);
        (mjd.gmst_hours() + self.longitude_deg / 15.0).rem_euclid(24.0)
    }
}

/// The Subaru Telescope site, kept as sample/test fixture data (grounded on
/// `original_source/qplan/common.py`), not as an engine default.
pub fn subaru() -> Observer {
    Observer {
        name: "subaru".to_string(),
        longitude_deg: -(155.0 + 28.0 / 60.0 + 48.900 / 3600.0),
        latitude_deg: 19.0 + 49.0 / 60.0 + 42.600 / 3600.0,
        elevation_m: 4163.0,
        pressure_mbar: 615.0,
        temperature_c: 0.0,
        humidity_pct: 0.0,
        timezone: "Pacific/Honolulu".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sea_level_has_no_dip() {
        let o = Observer {
            name: "sea".into(),
            longitude_deg: 0.0,
            latitude_deg: 0.0,
            elevation_m: 0.0,
            pressure_mbar: 1013.0,
            temperature_c: 15.0,
            humidity_pct: 0.0,
            timezone: "UTC".into(),
        };
        assert_eq!(o.horizon_dip_deg(), 0.0);
    }

    #[test]
    fn subaru_elevation_has_positive_dip() {
        let o = subaru();
        assert!(o.horizon_dip_deg() > 0.0);
        assert!(o.horizon_dip_deg() < 5.0);
    }

    #[test]
    fn subaru_coordinates_match_reference() {
        let o = subaru();
        assert!((o.latitude_deg - 19.828_5).abs() < 1e-3);
        assert!((o.longitude_deg - (-155.480_25)).abs() < 1e-3);
    }
}
