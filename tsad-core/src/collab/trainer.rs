//! Model training (§4.10). `SeasonalNaiveTrainer` is a real, deterministic
//! algorithm: forecast is the value observed at the same time-of-day on the
//! most recent day that covers it, with a symmetric interval widened until
//! a caller-supplied `ModelAdapter` accepts the coverage.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::fetcher::DataPoint;
use crate::model::{Model, ModelCodec, ModelError};

#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error("not enough points to train a model: need at least 2, got {0}")]
    InsufficientData(usize),
    #[error("training failed: {0}")]
    Other(String),
}

/// `(residuals, half_width) -> accepted`. Supplied by the trainer's caller;
/// the trainer widens `half_width` until this returns `true` (§4.6 step 5).
pub type ModelAdapter = dyn Fn(&[f64], f64) -> bool + Send + Sync;

/// The caller-supplied acceptance rule described in §4.10: at least
/// `min_coverage` of residuals must fall within `±half_width`.
pub fn coverage_adapter(min_coverage: f64) -> Box<ModelAdapter> {
    Box::new(move |residuals: &[f64], half_width: f64| {
        if residuals.is_empty() {
            return true;
        }
        let covered = residuals.iter().filter(|r| r.abs() <= half_width).count();
        covered as f64 / residuals.len() as f64 >= min_coverage
    })
}

/// The default 99.9% coverage target cited in §4.10.
pub fn default_adapter() -> Box<ModelAdapter> {
    coverage_adapter(0.999)
}

#[async_trait::async_trait]
pub trait ModelTrainer: Send + Sync {
    async fn train(
        &self,
        points: &[DataPoint],
        adapter: &ModelAdapter,
    ) -> Result<Box<dyn Model>, TrainError>;
}

const BUCKETS_PER_DAY: i64 = 24 * 60;

fn bucket_of(stamp: DateTime<Utc>) -> i64 {
    i64::from(stamp.hour()) * 60 + i64::from(stamp.minute())
}

#[derive(Clone, Serialize, Deserialize)]
struct SeasonalNaiveData {
    /// Minute-of-day bucket -> most recently observed value in that bucket.
    buckets: Vec<Option<f64>>,
    fallback: f64,
    half_width: f64,
}

impl SeasonalNaiveData {
    fn forecast_at(&self, stamp: DateTime<Utc>) -> f64 {
        let bucket = bucket_of(stamp) as usize;
        if let Some(value) = self.buckets[bucket] {
            return value;
        }

        // Nearest populated bucket, wrapping around the day.
        for offset in 1..=(BUCKETS_PER_DAY / 2) {
            let idx = (bucket as i64 + offset).rem_euclid(BUCKETS_PER_DAY) as usize;
            if let Some(value) = self.buckets[idx] {
                return value;
            }
            let idx = (bucket as i64 - offset).rem_euclid(BUCKETS_PER_DAY) as usize;
            if let Some(value) = self.buckets[idx] {
                return value;
            }
        }

        self.fallback
    }
}

pub struct SeasonalNaiveModel {
    data: SeasonalNaiveData,
}

impl Model for SeasonalNaiveModel {
    fn name(&self) -> &str {
        "seasonal_naive"
    }

    fn forecast(&self, stamp: DateTime<Utc>) -> f64 {
        self.data.forecast_at(stamp)
    }

    fn forecast_interval(&self, stamp: DateTime<Utc>) -> (f64, f64) {
        let forecast = self.forecast(stamp);
        (forecast - self.data.half_width, forecast + self.data.half_width)
    }

    fn serialize(&self) -> Result<Vec<u8>, ModelError> {
        serde_json::to_vec(&self.data).map_err(|error| ModelError::Serialize(error.to_string()))
    }
}

pub struct SeasonalNaiveCodec;

impl ModelCodec for SeasonalNaiveCodec {
    fn model_name(&self) -> &'static str {
        "seasonal_naive"
    }

    fn deserialize(&self, blob: &[u8]) -> Result<Box<dyn Model>, ModelError> {
        let data: SeasonalNaiveData =
            serde_json::from_slice(blob).map_err(|error| ModelError::Deserialize(error.to_string()))?;
        Ok(Box::new(SeasonalNaiveModel { data }))
    }
}

pub struct SeasonalNaiveTrainer;

#[async_trait::async_trait]
impl ModelTrainer for SeasonalNaiveTrainer {
    async fn train(
        &self,
        points: &[DataPoint],
        adapter: &ModelAdapter,
    ) -> Result<Box<dyn Model>, TrainError> {
        if points.len() < 2 {
            return Err(TrainError::InsufficientData(points.len()));
        }

        let mut buckets: Vec<Option<f64>> = vec![None; BUCKETS_PER_DAY as usize];
        // Points are expected sorted ascending by caller (preprocessor);
        // later points overwrite earlier ones in the same bucket so the
        // most recent day wins.
        for point in points {
            buckets[bucket_of(point.stamp) as usize] = Some(point.value);
        }

        let fallback = points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64;
        let data = SeasonalNaiveData {
            buckets,
            fallback,
            half_width: 0.0,
        };

        let residuals: Vec<f64> = points
            .iter()
            .map(|p| p.value - data.forecast_at(p.stamp))
            .collect();

        let half_width = widen_until_accepted(&residuals, adapter);

        Ok(Box::new(SeasonalNaiveModel {
            data: SeasonalNaiveData { half_width, ..data },
        }))
    }
}

/// Doubling search for an upper bound the adapter accepts, then bisect down
/// to a tight width. 40 iterations of bisection on a doubled-to range gives
/// far more precision than residual magnitudes ever need.
fn widen_until_accepted(residuals: &[f64], adapter: &ModelAdapter) -> f64 {
    let max_residual = residuals.iter().fold(0.0_f64, |acc, r| acc.max(r.abs()));
    if max_residual == 0.0 {
        return 0.0;
    }

    let mut hi = max_residual.max(1e-9);
    while !adapter(residuals, hi) {
        hi *= 2.0;
    }

    let mut lo = 0.0;
    for _ in 0..40 {
        let mid = (lo + hi) / 2.0;
        if adapter(residuals, mid) {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    hi
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(secs: i64, value: f64) -> DataPoint {
        DataPoint {
            stamp: DateTime::from_timestamp(secs, 0).unwrap(),
            value,
        }
    }

    #[tokio::test]
    async fn too_few_points_is_rejected() {
        let err = SeasonalNaiveTrainer
            .train(&[pt(0, 1.0)], &*default_adapter())
            .await
            .unwrap_err();
        assert!(matches!(err, TrainError::InsufficientData(1)));
    }

    #[tokio::test]
    async fn flat_series_trains_a_zero_width_model() {
        let points: Vec<DataPoint> = (0..10).map(|i| pt(i * 60, 42.0)).collect();
        let model = SeasonalNaiveTrainer
            .train(&points, &*default_adapter())
            .await
            .unwrap();

        assert!((model.forecast(points[0].stamp) - 42.0).abs() < 1e-6);
        let (lower, upper) = model.forecast_interval(points[0].stamp);
        assert!((upper - lower).abs() < 1e-6);
    }

    #[tokio::test]
    async fn interval_covers_at_least_the_requested_fraction() {
        // 100 points each in their own minute-of-day bucket (perfectly
        // recalled), plus one same-bucket-as-the-first outlier arriving a
        // day later that overwrites that bucket's forecast. 100/101 points
        // still land within a near-zero interval, clearing a 99% target.
        let mut points: Vec<DataPoint> = (0..100).map(|i| pt(i * 60, i as f64)).collect();
        points.push(pt(100 * 60 + 86_400, 9_999.0));

        let model = SeasonalNaiveTrainer
            .train(&points, &*coverage_adapter(0.99))
            .await
            .unwrap();

        let covered = points
            .iter()
            .filter(|p| {
                let (lower, upper) = model.forecast_interval(p.stamp);
                p.value >= lower && p.value <= upper
            })
            .count();

        assert!(covered as f64 / points.len() as f64 >= 0.99);
    }

    #[test]
    fn roundtrips_through_codec() {
        let data = SeasonalNaiveData {
            buckets: vec![Some(1.0); BUCKETS_PER_DAY as usize],
            fallback: 1.0,
            half_width: 2.5,
        };
        let model = SeasonalNaiveModel { data };
        let blob = model.serialize().unwrap();

        let restored = SeasonalNaiveCodec.deserialize(&blob).unwrap();
        assert_eq!(restored.name(), "seasonal_naive");
        let (lower, upper) = restored.forecast_interval(Utc::now());
        assert!((upper - lower - 5.0).abs() < 1e-6);
    }
}
