//! Temperature → beat duration model.
//!
//! An ordinary least-squares line through the confirmed buckets, plus the
//! policy-specific lookups used in RUN mode.

use crate::config::ModelPolicy;
use crate::record::{BucketGrid, CalibrationRecord};

/// Running sums for a least-squares fit.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegressionAccumulator {
    n: u32,
    sum_x: f64,
    sum_y: f64,
    sum_xx: f64,
    sum_xy: f64,
}

impl RegressionAccumulator {
    pub fn push(&mut self, x: f64, y: f64) {
        self.n += 1;
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xx += x * x;
        self.sum_xy += x * y;
    }

    pub fn len(&self) -> u32 {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Closed-form fit. One point, or points sharing a single x, give a flat
    /// line through the mean.
    pub fn finish(&self) -> Option<RegressionModel> {
        if self.n == 0 {
            return None;
        }
        let n = f64::from(self.n);
        let mean_y = self.sum_y / n;
        let denom = n * self.sum_xx - self.sum_x * self.sum_x;
        let scale = (n * self.sum_xx).abs().max(1.0);
        if self.n == 1 || denom.abs() <= scale * 1e-12 {
            return Some(RegressionModel {
                slope: 0.0,
                intercept: mean_y,
                points: self.n,
            });
        }
        let slope = (n * self.sum_xy - self.sum_x * self.sum_y) / denom;
        let intercept = (self.sum_y - slope * self.sum_x) / n;
        Some(RegressionModel {
            slope,
            intercept,
            points: self.n,
        })
    }
}

/// Beat duration as a linear function of temperature in °C.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionModel {
    /// Microseconds per °C.
    pub slope: f64,
    /// Microseconds at 0 °C.
    pub intercept: f64,
    /// Confirmed buckets the line was fitted to.
    pub points: u32,
}

impl RegressionModel {
    /// Fit every confirmed bucket at its centre temperature.
    pub fn fit(record: &CalibrationRecord, grid: &BucketGrid) -> Option<Self> {
        let mut acc = RegressionAccumulator::default();
        for (i, b) in record.confirmed() {
            acc.push(grid.center_c(i), b.avg_duration_us);
        }
        acc.finish()
    }

    #[inline]
    pub fn evaluate(&self, temp_c: f64) -> f64 {
        self.intercept + self.slope * temp_c
    }
}

/// Modelled beat duration at `temp_c` under `policy`, before manual adjust.
///
/// `index` is the bucket the reading fell in, if any. Policies that consult
/// neighbouring buckets fall back to the line when no bucket applies.
pub fn predict(
    model: &RegressionModel,
    policy: ModelPolicy,
    record: &CalibrationRecord,
    grid: &BucketGrid,
    index: Option<usize>,
    temp_c: f64,
) -> f64 {
    match policy {
        ModelPolicy::Regression => model.evaluate(temp_c),
        ModelPolicy::Nearest => index
            .and_then(|i| record.bucket(i))
            .filter(|b| b.is_confirmed())
            .map_or_else(|| model.evaluate(temp_c), |b| b.avg_duration_us),
        ModelPolicy::Interpolate => {
            interpolate(record, grid, temp_c).unwrap_or_else(|| model.evaluate(temp_c))
        }
    }
}

/// Linear interpolation between the nearest confirmed bucket centres at or
/// below and at or above `temp_c`.
fn interpolate(record: &CalibrationRecord, grid: &BucketGrid, temp_c: f64) -> Option<f64> {
    let mut below: Option<(f64, f64)> = None;
    let mut above: Option<(f64, f64)> = None;
    for (i, b) in record.confirmed() {
        let x = grid.center_c(i);
        if x <= temp_c {
            below = Some((x, b.avg_duration_us));
        }
        if x >= temp_c && above.is_none() {
            above = Some((x, b.avg_duration_us));
        }
    }
    let ((x0, y0), (x1, y1)) = (below?, above?);
    if (x1 - x0).abs() < f64::EPSILON {
        return Some(y0);
    }
    Some(y0 + (y1 - y0) * (temp_c - x0) / (x1 - x0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(points: &[(usize, f64)]) -> CalibrationRecord {
        let mut rec = CalibrationRecord::new(50, true);
        for &(i, y) in points {
            let b = &mut rec.buckets[i];
            b.fold(y as i64, 1);
        }
        rec
    }

    #[test]
    fn exact_line_is_recovered() {
        let mut acc = RegressionAccumulator::default();
        for x in [15.0, 20.0, 25.0, 30.0] {
            acc.push(x, 500_000.0 + 12.0 * (x - 20.0));
        }
        let m = acc.finish().unwrap();
        assert!((m.slope - 12.0).abs() < 1e-6);
        assert!((m.evaluate(20.0) - 500_000.0).abs() < 1e-3);
        assert_eq!(m.points, 4);
    }

    #[test]
    fn scattered_points_match_centred_least_squares() {
        let pts = [
            (13.25, 500_010.0),
            (15.75, 500_031.0),
            (16.25, 500_029.0),
            (19.75, 500_052.0),
            (24.25, 500_069.0),
        ];
        let mut acc = RegressionAccumulator::default();
        for (x, y) in pts {
            acc.push(x, y);
        }
        let m = acc.finish().unwrap();

        let n = pts.len() as f64;
        let mx = pts.iter().map(|p| p.0).sum::<f64>() / n;
        let my = pts.iter().map(|p| p.1).sum::<f64>() / n;
        let sxy: f64 = pts.iter().map(|p| (p.0 - mx) * (p.1 - my)).sum();
        let sxx: f64 = pts.iter().map(|p| (p.0 - mx) * (p.0 - mx)).sum();
        let slope = sxy / sxx;
        assert!((m.slope - slope).abs() < 1e-6, "{} vs {}", m.slope, slope);
        assert!((m.intercept - (my - slope * mx)).abs() < 1e-3);
        // the end points alone give a different line
        let ends = (pts[4].1 - pts[0].1) / (pts[4].0 - pts[0].0);
        assert!((m.slope - ends).abs() > 1e-3);
    }

    #[test]
    fn single_point_is_flat() {
        let mut acc = RegressionAccumulator::default();
        acc.push(21.25, 499_980.0);
        let m = acc.finish().unwrap();
        assert_eq!(m.slope, 0.0);
        assert_eq!(m.evaluate(35.0), 499_980.0);
    }

    #[test]
    fn shared_x_is_flat_through_mean() {
        let mut acc = RegressionAccumulator::default();
        acc.push(20.0, 100.0);
        acc.push(20.0, 300.0);
        let m = acc.finish().unwrap();
        assert_eq!(m.slope, 0.0);
        assert!((m.intercept - 200.0).abs() < 1e-9);
    }

    #[test]
    fn empty_has_no_model() {
        assert!(RegressionAccumulator::default().finish().is_none());
        let rec = CalibrationRecord::new(50, true);
        assert!(RegressionModel::fit(&rec, &BucketGrid::new(13, 50)).is_none());
    }

    #[test]
    fn fit_uses_bucket_centres() {
        let grid = BucketGrid::new(13, 50);
        // centres 13.25 and 18.25
        let rec = record_with(&[(0, 500_000.0), (10, 500_050.0)]);
        let m = RegressionModel::fit(&rec, &grid).unwrap();
        assert!((m.slope - 10.0).abs() < 1e-6);
        assert!((m.evaluate(13.25) - 500_000.0).abs() < 1e-3);
    }

    #[test]
    fn nearest_prefers_confirmed_bucket() {
        let grid = BucketGrid::new(13, 50);
        let rec = record_with(&[(0, 500_000.0), (10, 500_050.0), (4, 500_900.0)]);
        let m = RegressionModel::fit(&rec, &grid).unwrap();
        let own = predict(&m, ModelPolicy::Nearest, &rec, &grid, Some(4), 15.3);
        assert_eq!(own, 500_900.0);
        let line = predict(&m, ModelPolicy::Nearest, &rec, &grid, Some(5), 15.8);
        assert!((line - m.evaluate(15.8)).abs() < 1e-9);
    }

    #[test]
    fn interpolate_between_neighbours() {
        let grid = BucketGrid::new(13, 50);
        let rec = record_with(&[(0, 500_000.0), (10, 500_100.0)]);
        let m = RegressionModel::fit(&rec, &grid).unwrap();
        let mid = predict(&m, ModelPolicy::Interpolate, &rec, &grid, Some(5), 15.75);
        assert!((mid - 500_050.0).abs() < 1e-6);
        // outside the confirmed span: falls back to the line
        let out = predict(&m, ModelPolicy::Interpolate, &rec, &grid, Some(20), 23.25);
        assert!((out - m.evaluate(23.25)).abs() < 1e-9);
    }
}
