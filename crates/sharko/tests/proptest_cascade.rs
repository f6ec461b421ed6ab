//! Property-based tests for the cascade building blocks.
//!
//! These tests verify that numerical properties hold across a wide range of inputs:
//! - Day-of-year encoding is periodic and stays on the unit circle
//! - Scalers invert within tolerance inside their fit range
//! - Grids have the advertised length and stay inside their region
//! - Valid coordinates always encode, invalid ones never do

use chrono::Datelike;
use proptest::prelude::*;

use sharko::{
    cyclical_day, within_roundtrip_tolerance, Coordinate, FeatureEncoder, GridSpec, QueryPoint,
    Region, Scaler, ValueScaler, DEFAULT_DAY_PERIOD,
};

fn date_strategy() -> impl Strategy<Value = chrono::NaiveDate> {
    (2000i32..2100, 1u32..=365).prop_map(|(year, ordinal)| {
        chrono::NaiveDate::from_yo_opt(year, ordinal).unwrap()
    })
}

/// Strategy for fitted scalers.
fn scaler_strategy() -> impl Strategy<Value = Scaler> {
    prop_oneof![
        (-1.0f64..1.0, 0.01f64..2.0).prop_map(|(c, s)| Scaler::robust(c, s)),
        (-1.0f64..1.0, 0.01f64..2.0, 0.5f64..5.0)
            .prop_map(|(c, s, w)| Scaler::robust_clipped(c, s, c - w, c + w)),
        (-50.0f64..50.0, 0.1f64..10.0).prop_map(|(mean, std)| Scaler::Standard { mean, std }),
        (-50.0f64..50.0, 0.1f64..100.0)
            .prop_map(|(min, width)| Scaler::MinMax { min, max: min + width }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        ..ProptestConfig::default()
    })]

    /// Property: shifting the day by one full period lands on the same point.
    #[test]
    fn prop_day_encoding_periodic(doy in 1u32..=366) {
        let doy = f64::from(doy);
        let (s0, c0) = cyclical_day(doy, DEFAULT_DAY_PERIOD);
        let (s1, c1) = cyclical_day(doy + DEFAULT_DAY_PERIOD, DEFAULT_DAY_PERIOD);
        prop_assert!((s0 - s1).abs() < 1e-9);
        prop_assert!((c0 - c1).abs() < 1e-9);
        prop_assert!((s0 * s0 + c0 * c0 - 1.0).abs() < 1e-12);
    }

    /// Property: the same calendar date a year later is within one day's step.
    #[test]
    fn prop_same_date_next_year_close(date in date_strategy()) {
        let next = date.with_year(date.year() + 1).unwrap_or(date);
        let encoder = FeatureEncoder::default();
        let here = Coordinate::new(0.0, 0.0);
        let a = encoder.encode(&QueryPoint::new(here, date)).unwrap();
        let b = encoder.encode(&QueryPoint::new(here, next)).unwrap();

        let step = 2.0 * (std::f64::consts::PI / DEFAULT_DAY_PERIOD).sin();
        let distance = ((a.get("day_sin").unwrap() - b.get("day_sin").unwrap()).powi(2)
            + (a.get("day_cos").unwrap() - b.get("day_cos").unwrap()).powi(2))
        .sqrt();
        prop_assert!(distance <= step + 1e-12, "{} vs {}: {}", date, next, distance);
    }

    /// Property: inverse(transform(x)) == x inside the exact range.
    #[test]
    fn prop_scaler_roundtrip(scaler in scaler_strategy(), t in 0.0f64..=1.0) {
        prop_assert!(scaler.validate().is_ok());
        let (low, high) = match scaler.exact_range() {
            (l, h) if l.is_finite() && h.is_finite() => (l, h),
            _ => (-100.0, 100.0),
        };
        let x = low + t * (high - low);
        let back = scaler.inverse_transform(scaler.transform(x));
        prop_assert!(within_roundtrip_tolerance(x, back), "{} -> {}", x, back);
    }

    /// Property: transform is monotonic non-decreasing.
    #[test]
    fn prop_scaler_monotonic(scaler in scaler_strategy(), a in -10.0f64..10.0, b in -10.0f64..10.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(scaler.transform(lo) <= scaler.transform(hi));
    }

    /// Property: the grid length matches its iterator, and points stay in the region.
    #[test]
    fn prop_grid_len_and_bounds(
        min_lat in -80.0f64..70.0,
        lat_span in 0.0f64..10.0,
        min_lon in -170.0f64..160.0,
        lon_span in 0.0f64..10.0,
        resolution in 0.1f64..2.0,
    ) {
        let region = Region::new(min_lat, min_lat + lat_span, min_lon, min_lon + lon_span);
        let date = chrono::NaiveDate::from_ymd_opt(2025, 5, 15).unwrap();
        let grid = GridSpec::new(region, resolution, date).unwrap();

        let points: Vec<_> = grid.points().collect();
        prop_assert_eq!(points.len(), grid.len());
        prop_assert_eq!(points[0].coordinate, Coordinate::new(min_lat, min_lon));
        for p in &points {
            prop_assert!(region.contains(&p.coordinate));
        }
    }

    /// Property: encoding succeeds exactly for on-globe coordinates.
    #[test]
    fn prop_encoder_range(lat in -120.0f64..120.0, lon in -240.0f64..240.0) {
        let date = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let point = QueryPoint::new(Coordinate::new(lat, lon), date);
        let valid = (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon);
        prop_assert_eq!(FeatureEncoder::default().encode(&point).is_ok(), valid);
    }
}
