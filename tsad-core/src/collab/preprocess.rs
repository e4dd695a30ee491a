//! Preprocessing algorithms (§4.10). Out of scope as business logic, but the
//! no-op default still has to actually sort and dedup, or every downstream
//! consumer has to re-derive those invariants itself.

use super::fetcher::DataPoint;

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("preprocessing failed: {0}")]
    Other(String),
}

#[async_trait::async_trait]
pub trait Preprocessor: Send + Sync {
    async fn process(&self, points: Vec<DataPoint>) -> Result<Vec<DataPoint>, PreprocessError>;
}

/// Sorts by stamp and keeps the last point of any exact-stamp collision.
pub struct IdentityPreprocessor;

#[async_trait::async_trait]
impl Preprocessor for IdentityPreprocessor {
    async fn process(&self, mut points: Vec<DataPoint>) -> Result<Vec<DataPoint>, PreprocessError> {
        points.sort_by_key(|p| p.stamp);

        let mut out: Vec<DataPoint> = Vec::with_capacity(points.len());
        for point in points {
            match out.last_mut() {
                Some(last) if last.stamp == point.stamp => *last = point,
                _ => out.push(point),
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn pt(secs: i64, value: f64) -> DataPoint {
        DataPoint {
            stamp: DateTime::from_timestamp(secs, 0).unwrap(),
            value,
        }
    }

    #[tokio::test]
    async fn sorts_and_keeps_last_duplicate() {
        let points = vec![pt(60, 1.0), pt(0, 0.0), pt(60, 2.0)];
        let out = IdentityPreprocessor.process(points).await.unwrap();

        assert_eq!(out, vec![pt(0, 0.0), pt(60, 2.0)]);
    }

    #[tokio::test]
    async fn empty_input_is_empty_output() {
        let out = IdentityPreprocessor.process(vec![]).await.unwrap();
        assert!(out.is_empty());
    }
}
