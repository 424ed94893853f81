//! The ephemeris/visibility engine (spec.md §4.1).
//!
//! Computes apparent position and derived quantities for a target at one or
//! many instants; sunrise/sunset/twilight and moonrise/moonset; and
//! observability windows. Formulas are grounded on
//! `original_source/qplan/util/calcpos.py`.

pub mod bodies;
pub mod cache;

use crate::error::EphemerisError;
use crate::observer::Observer;
use crate::time::ModifiedJulianDate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use cache::EphemerisCache;

/// A position source the engine can compute altitude/azimuth for: either a
/// fixed (proper-motion-corrected) sky position, or one of the two moving
/// bodies whose geometry the feasibility filter and slot evaluator care
/// about.
#[derive(Debug, Clone, Copy)]
pub enum CelestialBody {
    Fixed { ra_deg: f64, dec_deg: f64 },
    Sun,
    Moon,
}

impl CelestialBody {
    pub fn equatorial_at(&self, mjd: &ModifiedJulianDate) -> (f64, f64) {
        match self {
            CelestialBody::Fixed { ra_deg, dec_deg } => (*ra_deg, *dec_deg),
            CelestialBody::Sun => {
                let p = bodies::sun_position(mjd);
                (p.ra_deg, p.dec_deg)
            }
            CelestialBody::Moon => {
                let p = bodies::moon_position(mjd);
                (p.ra_deg, p.dec_deg)
            }
        }
    }
}

/// Standard solar radius, degrees (`original_source/qplan/util/calcpos.py`).
pub const SOLAR_RADIUS_DEG: f64 = 0.25;
/// Standard lunar radius, degrees (same source).
pub const MOON_RADIUS_DEG: f64 = 0.26;
/// Atmospheric refraction at the horizon, degrees (standard value).
pub const REFRACTION_AT_HORIZON_DEG: f64 = 34.0 / 60.0;
/// Sunset/sunrise horizon, degrees below the astronomical horizon
/// (solar radius + refraction already folded in, per spec.md §4.1).
pub const HORIZON_SUNSET_DEG: f64 = SOLAR_RADIUS_DEG + REFRACTION_AT_HORIZON_DEG;
pub const HORIZON_6_DEG: f64 = 6.0;
pub const HORIZON_12_DEG: f64 = 12.0;
pub const HORIZON_18_DEG: f64 = 18.0;
/// Minimum altitude airmass is computed at; altitudes below this are
/// clamped (spec.md §4.1).
pub const MIN_AIRMASS_ALTITUDE_DEG: f64 = 3.0;

/// Immutable snapshot of a body's apparent geometry at one instant, plus
/// its relationship to the Moon (spec.md §3 `CalculationResult`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CalculationResult {
    pub instant: DateTime<Utc>,
    pub alt_deg: f64,
    pub az_deg: f64,
    pub ha_hours: f64,
    pub parallactic_angle_deg: f64,
    pub airmass: f64,
    pub moon_alt_deg: f64,
    pub moon_illumination: f64,
    pub moon_separation_deg: f64,
}

/// Airmass from altitude via the Young (1994) rational approximation.
/// Altitude is clamped to a floor of 3 degrees first.
pub fn airmass(alt_deg: f64) -> f64 {
    let alt = alt_deg.max(MIN_AIRMASS_ALTITUDE_DEG);
    let sz = 1.0 / alt.to_radians().sin() - 1.0;
    1.0 + sz * (0.998_183_3 - sz * (0.002_875 + 0.000_808_3 * sz))
}

/// Inverse of [`airmass`]: the altitude, in degrees, at which the given
/// airmass is reached. Used to turn an `envcfg.airmass` ceiling into an
/// effective minimum altitude (spec.md §4.1 `observable`).
pub fn airmass_to_altitude_deg(target_airmass: f64) -> f64 {
    if target_airmass <= 1.0 {
        return 90.0;
    }
    // Monotone on [3, 90]; bisection is exact enough and avoids inverting
    // the cubic in `sz` directly.
    let (mut lo, mut hi) = (MIN_AIRMASS_ALTITUDE_DEG, 90.0_f64);
    for _ in 0..60 {
        let mid = 0.5 * (lo + hi);
        if airmass(mid) > target_airmass {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Parallactic angle (Meeus), degrees.
pub fn parallactic_angle_deg(ha_deg: f64, dec_deg: f64, lat_deg: f64) -> f64 {
    let (ha, dec, lat) = (ha_deg.to_radians(), dec_deg.to_radians(), lat_deg.to_radians());
    ha.sin()
        .atan2(lat.tan() * dec.cos() - dec.sin() * ha.cos())
        .to_degrees()
}

fn altitude_azimuth_deg(observer: &Observer, ra_deg: f64, dec_deg: f64, ha_deg: f64) -> (f64, f64) {
    let (dec, lat, ha) = (
        dec_deg.to_radians(),
        observer.latitude_rad(),
        ha_deg.to_radians(),
    );
    let alt = (dec.sin() * lat.sin() + dec.cos() * lat.cos() * ha.cos()).asin();
    let az = (-ha.sin()).atan2(dec.tan() * lat.cos() - lat.sin() * ha.cos());
    let _ = ra_deg;
    (alt.to_degrees(), az.to_degrees().rem_euclid(360.0))
}

fn hour_angle_deg(observer: &Observer, ra_deg: f64, instant: DateTime<Utc>) -> f64 {
    let lst_hours = observer.local_sidereal_time_hours(instant);
    let mut ha = lst_hours * 15.0 - ra_deg;
    ha = ((ha + 180.0).rem_euclid(360.0)) - 180.0;
    ha
}

/// Compute the full [`CalculationResult`] for `body` as seen from
/// `observer` at `instant` (spec.md §4.1 `calc`, scalar form).
pub fn calc(observer: &Observer, body: &CelestialBody, instant: DateTime<Utc>) -> CalculationResult {
    let mjd = ModifiedJulianDate::from_datetime(instant);
    let (ra_deg, dec_deg) = body.equatorial_at(&mjd);
    let ha_deg = hour_angle_deg(observer, ra_deg, instant);
    let (alt_deg, az_deg) = altitude_azimuth_deg(observer, ra_deg, dec_deg, ha_deg);
    let pang = parallactic_angle_deg(ha_deg, dec_deg, observer.latitude_deg);
    let am = airmass(alt_deg);

    let (moon_ra, moon_dec) = CelestialBody::Moon.equatorial_at(&mjd);
    let moon_ha = hour_angle_deg(observer, moon_ra, instant);
    let (moon_alt_deg, _) = altitude_azimuth_deg(observer, moon_ra, moon_dec, moon_ha);
    let moon_illumination = bodies::moon_illumination_fraction(&mjd);
    let moon_separation_deg = bodies::angular_separation_deg(ra_deg, dec_deg, moon_ra, moon_dec);

    CalculationResult {
        instant,
        alt_deg,
        az_deg,
        ha_hours: ha_deg / 15.0,
        parallactic_angle_deg: pang,
        airmass: am,
        moon_alt_deg,
        moon_illumination,
        moon_separation_deg,
    }
}

/// Vectorized form of [`calc`] (spec.md §4.1: "Vectorized form must accept
/// an array of N instants and return N values for each field").
pub fn calc_vec(
    observer: &Observer,
    body: &CelestialBody,
    instants: &[DateTime<Utc>],
) -> Vec<CalculationResult> {
    instants.iter().map(|&t| calc(observer, body, t)).collect()
}

const SEARCH_STEP_MINUTES: i64 = 10;
const SEARCH_HORIZON_HOURS: i64 = 48;

fn altitude_at(observer: &Observer, body: &CelestialBody, instant: DateTime<Utc>) -> f64 {
    calc(observer, body, instant).alt_deg
}

/// Find the next time, after `from`, at which `body`'s altitude crosses
/// `horizon_deg` in the given direction. Coarse-scans at
/// `SEARCH_STEP_MINUTES` resolution over a `SEARCH_HORIZON_HOURS` window,
/// then bisects to ~1 minute (spec.md §4.1: "precision of 1 minute is
/// sufficient").
fn next_crossing(
    observer: &Observer,
    body: &CelestialBody,
    from: DateTime<Utc>,
    horizon_deg: f64,
    rising: bool,
) -> Result<DateTime<Utc>, EphemerisError> {
    let step = chrono::Duration::minutes(SEARCH_STEP_MINUTES);
    let end = from + chrono::Duration::hours(SEARCH_HORIZON_HOURS);

    let mut t_prev = from;
    let mut alt_prev = altitude_at(observer, body, t_prev) - horizon_deg;
    let mut t = from + step;
    while t <= end {
        let alt = altitude_at(observer, body, t) - horizon_deg;
        let crosses = if rising {
            alt_prev < 0.0 && alt >= 0.0
        } else {
            alt_prev >= 0.0 && alt < 0.0
        };
        if crosses {
            let (mut lo, mut hi) = (t_prev, t);
            for _ in 0..20 {
                let mid = lo + (hi - lo) / 2;
                let alt_mid = altitude_at(observer, body, mid) - horizon_deg;
                let lo_above = (altitude_at(observer, body, lo) - horizon_deg) >= 0.0;
                if (alt_mid >= 0.0) == lo_above {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            return Ok(hi);
        }
        t_prev = t;
        alt_prev = alt;
        t += step;
    }

    Err(EphemerisError::NeverCrosses {
        body: format!("{body:?}"),
        direction: if rising { "rises" } else { "sets" },
        horizon_deg,
        instant: from,
    })
}

pub fn next_rising(
    observer: &Observer,
    body: &CelestialBody,
    from: DateTime<Utc>,
    horizon_deg: f64,
) -> Result<DateTime<Utc>, EphemerisError> {
    next_crossing(observer, body, from, horizon_deg, true)
}

pub fn next_setting(
    observer: &Observer,
    body: &CelestialBody,
    from: DateTime<Utc>,
    horizon_deg: f64,
) -> Result<DateTime<Utc>, EphemerisError> {
    next_crossing(observer, body, from, horizon_deg, false)
}

pub fn sunset(observer: &Observer, from: DateTime<Utc>) -> Result<DateTime<Utc>, EphemerisError> {
    next_setting(observer, &CelestialBody::Sun, from, -HORIZON_SUNSET_DEG)
}

pub fn sunrise(observer: &Observer, from: DateTime<Utc>) -> Result<DateTime<Utc>, EphemerisError> {
    next_rising(observer, &CelestialBody::Sun, from, -HORIZON_SUNSET_DEG)
}

macro_rules! twilight_pair {
    ($evening:ident, $morning:ident, $horizon:expr) => {
        pub fn $evening(
            observer: &Observer,
            from: DateTime<Utc>,
        ) -> Result<DateTime<Utc>, EphemerisError> {
            next_setting(observer, &CelestialBody::Sun, from, -$horizon)
        }

        pub fn $morning(
            observer: &Observer,
            from: DateTime<Utc>,
        ) -> Result<DateTime<Utc>, EphemerisError> {
            next_rising(observer, &CelestialBody::Sun, from, -$horizon)
        }
    };
}

twilight_pair!(evening_twilight_6, morning_twilight_6, HORIZON_6_DEG);
twilight_pair!(evening_twilight_12, morning_twilight_12, HORIZON_12_DEG);
twilight_pair!(evening_twilight_18, morning_twilight_18, HORIZON_18_DEG);

pub fn moon_illumination(instant: DateTime<Utc>) -> f64 {
    let mjd = ModifiedJulianDate::from_datetime(instant);
    bodies::moon_illumination_fraction(&mjd)
}

/// Result of an observability query (spec.md §4.1 `observable`).
#[derive(Debug, Clone, Copy)]
pub struct Observability {
    pub ok: bool,
    pub visible_start: Option<DateTime<Utc>>,
    pub visible_stop: Option<DateTime<Utc>>,
}

/// Intersect `[t_start, t_stop]` with the interval during which `body`'s
/// altitude lies in `[el_min, el_max]`, honoring an optional airmass
/// ceiling, and report whether the resulting window is at least
/// `time_needed_sec` long (spec.md §4.1).
#[allow(clippy::too_many_arguments)]
pub fn observable(
    observer: &Observer,
    body: &CelestialBody,
    t_start: DateTime<Utc>,
    t_stop: DateTime<Utc>,
    el_min_deg: f64,
    el_max_deg: f64,
    time_needed_sec: f64,
    airmass_limit: Option<f64>,
) -> Observability {
    let effective_min = match airmass_limit {
        Some(limit) => el_min_deg.max(airmass_to_altitude_deg(limit)),
        None => el_min_deg,
    };

    let alt_start = altitude_at(observer, body, t_start);
    let above_at_start = alt_start >= effective_min && alt_start <= el_max_deg;

    let visible_start = if above_at_start {
        t_start
    } else if alt_start > el_max_deg {
        // Past the upper bound, not the lower one (e.g. an alt-az mount's
        // zenith blind spot): becomes visible once altitude descends back
        // through el_max, not when it next rises through el_min.
        match next_setting(observer, body, t_start, el_max_deg) {
            Ok(t) if t <= t_stop => t,
            _ => {
                return Observability {
                    ok: false,
                    visible_start: None,
                    visible_stop: None,
                }
            }
        }
    } else {
        match next_rising(observer, body, t_start, effective_min) {
            Ok(t) if t <= t_stop => t,
            _ => {
                return Observability {
                    ok: false,
                    visible_start: None,
                    visible_stop: None,
                }
            }
        }
    };

    // The window ends at whichever bound is crossed first from here:
    // descending below el_min, or climbing back above el_max.
    let set_below_min = next_setting(observer, body, visible_start, effective_min)
        .map(|t| t.min(t_stop))
        .unwrap_or(t_stop);
    let rise_above_max = next_rising(observer, body, visible_start, el_max_deg)
        .map(|t| t.min(t_stop))
        .unwrap_or(t_stop);
    let visible_stop = set_below_min.min(rise_above_max).min(t_stop);

    if visible_stop <= visible_start {
        return Observability {
            ok: false,
            visible_start: Some(visible_start),
            visible_stop: Some(visible_stop),
        };
    }

    let duration_sec = (visible_stop - visible_start).num_milliseconds() as f64 / 1000.0;
    Observability {
        ok: duration_sec >= time_needed_sec,
        visible_start: Some(visible_start),
        visible_stop: Some(visible_stop),
    }
}
