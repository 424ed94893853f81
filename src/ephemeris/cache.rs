//! The ephemeris cache (spec.md §4.1, §5): keyed by target identity and
//! time instant, bucketed to a configurable grid. Bulk population is the
//! normal path the Feasibility Filter uses to avoid redundant per-instant
//! work, and can optionally fan out across targets with the
//! `parallel-ephemeris` feature (single-writer-per-target, so concurrent
//! bulk population never produces a torn observation for a given target).

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::{calc, CalculationResult, CelestialBody};
use crate::config::EphemerisCacheConfig;
use crate::error::EphemerisError;
use crate::observer::Observer;
use crate::time::ModifiedJulianDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BucketKey(i64);

fn bucket_of(instant: DateTime<Utc>, grid_minutes: f64) -> (BucketKey, DateTime<Utc>) {
    let mjd = ModifiedJulianDate::from_datetime(instant).value();
    let grid_days = grid_minutes / (24.0 * 60.0);
    let bucket_index = (mjd / grid_days).round() as i64;
    let bucket_mjd = bucket_index as f64 * grid_days;
    (BucketKey(bucket_index), ModifiedJulianDate::new(bucket_mjd).to_datetime())
}

pub struct EphemerisCache {
    config: EphemerisCacheConfig,
    entries: RwLock<HashMap<(String, BucketKey), CalculationResult>>,
}

impl EphemerisCache {
    pub fn new(config: EphemerisCacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Populate the cache for one target over an array of instants. This is
    /// the per-target unit of work that bulk population fans out over.
    pub fn populate(
        &self,
        target_id: &str,
        observer: &Observer,
        body: &CelestialBody,
        instants: &[DateTime<Utc>],
    ) {
        let mut computed = Vec::with_capacity(instants.len());
        for &instant in instants {
            let (key, bucket_instant) = bucket_of(instant, self.config.grid_minutes);
            let result = calc(observer, body, bucket_instant);
            computed.push((key, result));
        }
        let mut w = self.entries.write().expect("ephemeris cache lock poisoned");
        for (key, result) in computed {
            w.insert((target_id.to_string(), key), result);
        }
    }

    /// Populate many targets at once. With `parallel-ephemeris` enabled,
    /// each target's instants are computed on a rayon worker (writes are
    /// still serialized per-target through the shared map's lock, but the
    /// expensive `calc` work itself runs concurrently across targets, per
    /// spec.md §5's "calculations for distinct targets are independent").
    pub fn populate_many(
        &self,
        observer: &Observer,
        targets: &[(String, CelestialBody)],
        instants: &[DateTime<Utc>],
    ) {
        #[cfg(feature = "parallel-ephemeris")]
        {
            use rayon::prelude::*;
            targets.par_iter().for_each(|(target_id, body)| {
                self.populate(target_id, observer, body, instants);
            });
        }
        #[cfg(not(feature = "parallel-ephemeris"))]
        {
            for (target_id, body) in targets {
                self.populate(target_id, observer, body, instants);
            }
        }
    }

    /// Look up the cached sample nearest `instant` for `target_id`, using
    /// the cache's configured `precision_minutes` as the match tolerance.
    pub fn get(
        &self,
        target_id: &str,
        instant: DateTime<Utc>,
    ) -> Result<CalculationResult, EphemerisError> {
        self.get_with_tolerance(target_id, instant, self.config.precision_minutes)
    }

    /// Like [`Self::get`], but with an explicit tolerance in minutes. A
    /// tolerance tighter than the cache's grid spacing can legitimately
    /// fail even for a populated bucket, per spec.md §4.1: "A request
    /// precise beyond the grid tolerance MUST fail so callers do not
    /// receive stale values."
    pub fn get_with_tolerance(
        &self,
        target_id: &str,
        instant: DateTime<Utc>,
        tolerance_minutes: f64,
    ) -> Result<CalculationResult, EphemerisError> {
        let (key, bucket_instant) = bucket_of(instant, self.config.grid_minutes);
        let drift_minutes = (instant - bucket_instant).num_seconds().abs() as f64 / 60.0;
        if drift_minutes > tolerance_minutes {
            return Err(EphemerisError::CacheMiss {
                target: target_id.to_string(),
                instant,
                tolerance_min: tolerance_minutes,
            });
        }
        let r = self.entries.read().expect("ephemeris cache lock poisoned");
        r.get(&(target_id.to_string(), key))
            .copied()
            .ok_or(EphemerisError::CacheMiss {
                target: target_id.to_string(),
                instant,
                tolerance_min: tolerance_minutes,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::subaru;
    use chrono::TimeZone;

    #[test]
    fn populated_grid_sample_matches_direct_compute() {
        let cache = EphemerisCache::new(EphemerisCacheConfig::default());
        let observer = subaru();
        let body = CelestialBody::Fixed {
            ra_deg: 120.0,
            dec_deg: 20.0,
        };
        let t = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        cache.populate("t1", &observer, &body, &[t]);

        let (_, bucket_instant) = bucket_of(t, EphemerisCacheConfig::default().grid_minutes);
        let expected = calc(&observer, &body, bucket_instant);
        let got = cache.get("t1", t).unwrap();
        assert_eq!(got.alt_deg, expected.alt_deg);
        assert_eq!(got.az_deg, expected.az_deg);
    }

    #[test]
    fn unpopulated_target_is_a_cache_miss() {
        let cache = EphemerisCache::new(EphemerisCacheConfig::default());
        let t = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let err = cache.get("missing", t).unwrap_err();
        assert!(matches!(err, EphemerisError::CacheMiss { .. }));
    }

    #[test]
    fn tolerance_tighter_than_grid_drift_fails() {
        let cache = EphemerisCache::new(EphemerisCacheConfig {
            grid_minutes: 5.0,
            precision_minutes: 5.0,
        });
        let observer = subaru();
        let body = CelestialBody::Fixed {
            ra_deg: 120.0,
            dec_deg: 20.0,
        };
        let t = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 10, 2, 30).unwrap();
        cache.populate("t1", &observer, &body, &[t]);
        // 2.5 minutes of drift from the nearest 5-minute bucket; a 1-minute
        // tolerance must reject it even though the bucket is populated.
        let err = cache.get_with_tolerance("t1", t, 1.0).unwrap_err();
        assert!(matches!(err, EphemerisError::CacheMiss { .. }));
    }

    #[test]
    fn bulk_population_across_targets_is_independent() {
        let cache = EphemerisCache::new(EphemerisCacheConfig::default());
        let observer = subaru();
        let targets = vec![
            ("a".to_string(), CelestialBody::Fixed { ra_deg: 10.0, dec_deg: 5.0 }),
            ("b".to_string(), CelestialBody::Fixed { ra_deg: 200.0, dec_deg: -30.0 }),
        ];
        let t = chrono::Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        cache.populate_many(&observer, &targets, &[t]);
        assert!(cache.get("a", t).is_ok());
        assert!(cache.get("b", t).is_ok());
    }
}
