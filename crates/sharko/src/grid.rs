//! Regular lattice of query points over a region.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sharko_core::{Coordinate, Error, QueryPoint, Region, Result};

/// Tolerance, in cells, for including the max edge of a region.
const EDGE_TOLERANCE: f64 = 1e-9;

/// Upper bound on points in one grid.
pub const MAX_GRID_POINTS: usize = 50_000_000;

/// A region sampled at a fixed resolution on a single date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub region: Region,
    /// Cell size in degrees, for both axes.
    pub resolution: f64,
    pub date: NaiveDate,
}

impl GridSpec {
    /// Create and validate a grid.
    pub fn new(region: Region, resolution: f64, date: NaiveDate) -> Result<Self> {
        let spec = Self {
            region,
            resolution,
            date,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Check the region, resolution, and total size.
    pub fn validate(&self) -> Result<()> {
        self.region.validate()?;
        if !self.resolution.is_finite() || self.resolution <= 0.0 {
            return Err(Error::InvalidRegion(format!(
                "resolution must be positive, got {}",
                self.resolution
            )));
        }
        let rows = self.axis_count(self.region.min_latitude, self.region.max_latitude);
        let columns = self.axis_count(self.region.min_longitude, self.region.max_longitude);
        let total = rows * columns;
        if !total.is_finite() || total > MAX_GRID_POINTS as f64 {
            return Err(Error::InvalidRegion(format!(
                "grid at {} degrees exceeds {} points",
                self.resolution, MAX_GRID_POINTS
            )));
        }
        Ok(())
    }

    /// Points along one axis, before any integer conversion.
    fn axis_count(&self, min: f64, max: f64) -> f64 {
        ((max - min) / self.resolution + EDGE_TOLERANCE).floor() + 1.0
    }

    // Only called on validated grids, where the count fits in MAX_GRID_POINTS.
    fn steps(&self, min: f64, max: f64) -> usize {
        self.axis_count(min, max) as usize
    }

    /// Number of lattice rows.
    pub fn latitude_steps(&self) -> usize {
        self.steps(self.region.min_latitude, self.region.max_latitude)
    }

    /// Number of lattice columns.
    pub fn longitude_steps(&self) -> usize {
        self.steps(self.region.min_longitude, self.region.max_longitude)
    }

    /// Total number of points.
    pub fn len(&self) -> usize {
        self.latitude_steps()
            .saturating_mul(self.longitude_steps())
    }

    /// Check if the grid has no points. A valid grid always has at least one.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point at a row-major lattice index.
    pub fn point(&self, index: usize) -> QueryPoint {
        let columns = self.longitude_steps();
        let (row, column) = (index / columns, index % columns);
        let latitude = self.region.min_latitude + row as f64 * self.resolution;
        let longitude = self.region.min_longitude + column as f64 * self.resolution;
        QueryPoint::new(
            Coordinate::new(
                latitude.min(self.region.max_latitude),
                longitude.min(self.region.max_longitude),
            ),
            self.date,
        )
    }

    /// Lazily iterate over all points, latitude-major.
    pub fn points(&self) -> GridIter {
        GridIter {
            spec: *self,
            next: 0,
            end: self.len(),
        }
    }
}

impl IntoIterator for &GridSpec {
    type Item = QueryPoint;
    type IntoIter = GridIter;

    fn into_iter(self) -> GridIter {
        self.points()
    }
}

/// Iterator over a grid's points. Cloning restarts from the current position.
#[derive(Debug, Clone)]
pub struct GridIter {
    spec: GridSpec,
    next: usize,
    end: usize,
}

impl Iterator for GridIter {
    type Item = QueryPoint;

    fn next(&mut self) -> Option<QueryPoint> {
        if self.next >= self.end {
            return None;
        }
        let point = self.spec.point(self.next);
        self.next += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }

    fn nth(&mut self, n: usize) -> Option<QueryPoint> {
        self.next = self.next.saturating_add(n).min(self.end);
        self.next()
    }
}

impl DoubleEndedIterator for GridIter {
    fn next_back(&mut self) -> Option<QueryPoint> {
        if self.next >= self.end {
            return None;
        }
        self.end -= 1;
        Some(self.spec.point(self.end))
    }
}

impl ExactSizeIterator for GridIter {}

impl std::iter::FusedIterator for GridIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use sharko_core::parse_date;

    fn grid(region: Region, resolution: f64) -> Result<GridSpec> {
        GridSpec::new(region, resolution, parse_date("2025-05-15").unwrap())
    }

    #[test]
    fn test_inclusive_lattice() {
        let spec = grid(Region::new(0.0, 1.0, -1.0, 0.0), 0.5).unwrap();
        assert_eq!(spec.latitude_steps(), 3);
        assert_eq!(spec.longitude_steps(), 3);

        let points: Vec<_> = spec.points().collect();
        assert_eq!(points.len(), 9);
        assert_eq!(points[0].coordinate, Coordinate::new(0.0, -1.0));
        assert_eq!(points[1].coordinate, Coordinate::new(0.0, -0.5));
        assert_eq!(points[8].coordinate, Coordinate::new(1.0, 0.0));
    }

    #[test]
    fn test_max_edge_within_tolerance() {
        // 0.1 does not divide 0.3 exactly in binary
        let spec = grid(Region::new(0.0, 0.3, 0.0, 0.3), 0.1).unwrap();
        assert_eq!(spec.latitude_steps(), 4);

        let last = spec.points().last().unwrap();
        assert!((last.coordinate.latitude - 0.3).abs() < 1e-12);
        assert!(last.coordinate.latitude <= 0.3);
    }

    #[test]
    fn test_max_edge_excluded_off_lattice() {
        let spec = grid(Region::new(0.0, 1.0, 0.0, 0.0), 0.3).unwrap();
        let lats: Vec<f64> = spec.points().map(|p| p.coordinate.latitude).collect();
        assert_eq!(lats.len(), 4);
        assert!((lats[3] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_index_based_coordinates() {
        let spec = grid(Region::new(-10.0, 10.0, 0.0, 0.0), 0.01).unwrap();
        assert_eq!(spec.len(), 2001);
        let p = spec.points().nth(1500).unwrap();
        assert_eq!(p.coordinate.latitude, -10.0 + 1500.0 * 0.01);
    }

    #[test]
    fn test_exact_size_and_restart() {
        let spec = grid(Region::new(0.0, 2.0, 0.0, 3.0), 1.0).unwrap();
        let mut iter = spec.points();
        assert_eq!(iter.len(), 12);
        iter.next();
        assert_eq!(iter.len(), 11);
        assert_eq!(spec.points().count(), 12);
        assert_eq!(spec.points().rev().next(), spec.points().last());
        assert_eq!(spec.point(5), spec.points().nth(5).unwrap());
    }

    #[test]
    fn test_single_point_region() {
        let spec = grid(Region::new(10.0, 10.0, -40.0, -40.0), 0.25).unwrap();
        assert_eq!(spec.len(), 1);
        assert_eq!(spec.points().next().unwrap().coordinate, Coordinate::new(10.0, -40.0));
    }

    #[test]
    fn test_invalid_regions() {
        let cases = [
            (Region::new(1.0, 0.0, 0.0, 1.0), 0.1),
            (Region::new(-95.0, 0.0, 0.0, 1.0), 0.1),
            (Region::new(0.0, 1.0, 0.0, 181.0), 0.1),
            (Region::new(0.0, 1.0, 0.0, 1.0), 0.0),
            (Region::new(0.0, 1.0, 0.0, 1.0), -0.5),
            (Region::new(0.0, 1.0, 0.0, 1.0), f64::NAN),
            (Region::new(-90.0, 90.0, -180.0, 180.0), 1e-6),
            // Axis counts beyond usize range
            (Region::new(0.0, 1.0, 0.0, 1.0), 1e-20),
            (Region::new(0.0, 1.0, 0.0, 1.0), f64::MIN_POSITIVE),
        ];
        for (region, resolution) in cases {
            assert!(
                matches!(grid(region, resolution), Err(Error::InvalidRegion(_))),
                "{region:?} @ {resolution}"
            );
        }
    }
}
