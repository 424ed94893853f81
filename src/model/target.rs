//! Target (spec.md §3): a static celestial object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ephemeris::CelestialBody;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub ra_deg: f64,
    pub dec_deg: f64,
    /// Julian-year epoch the coordinates above are expressed in (e.g.
    /// `2000.0` for J2000).
    pub equinox: f64,
    /// Proper motion in right ascension, milliarcsec/year (already
    /// multiplied by `cos(dec)`, the standard on-sky-rate convention).
    pub pm_ra_mas_yr: Option<f64>,
    pub pm_dec_mas_yr: Option<f64>,
    /// A second target used for photometric calibration alongside this one
    /// (spec.md §4.3 step 8; grounded on qplan HSC's `sdss_calib` field,
    /// generalized to any instrument per SPEC_FULL.md §3a).
    pub calib_companion: Option<Box<Target>>,
}

impl Target {
    pub fn new(name: impl Into<String>, ra_deg: f64, dec_deg: f64) -> Self {
        Self {
            name: name.into(),
            ra_deg,
            dec_deg,
            equinox: 2000.0,
            pm_ra_mas_yr: None,
            pm_dec_mas_yr: None,
            calib_companion: None,
        }
    }

    /// This target's apparent-at-epoch position, proper motion applied
    /// linearly from `equinox` to `instant`.
    pub fn body_at(&self, instant: DateTime<Utc>) -> CelestialBody {
        let years = years_since_equinox(self.equinox, instant);
        let ra_deg = self.ra_deg
            + self.pm_ra_mas_yr.unwrap_or(0.0) / 3_600_000.0 * years;
        let dec_deg = self.dec_deg
            + self.pm_dec_mas_yr.unwrap_or(0.0) / 3_600_000.0 * years;
        CelestialBody::Fixed { ra_deg, dec_deg }
    }
}

fn years_since_equinox(equinox: f64, instant: DateTime<Utc>) -> f64 {
    let mjd = crate::time::ModifiedJulianDate::from_datetime(instant).value();
    let equinox_mjd = (equinox - 2000.0) * 365.25 + 51544.5;
    (mjd - equinox_mjd) / 365.25
}
