//! The external metrics query backend (§4.10, §6 "External data fetcher").

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::Source;

/// One observed sample.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub stamp: DateTime<Utc>,
    pub value: f64,
}

/// Optional context passed to a fetch, honored on a best-effort basis by
/// implementations (§6).
#[derive(Clone, Debug)]
pub struct FetchContext {
    pub timeout: Duration,
    pub retry: u32,
    /// Bypass the worker's shared fetch concurrency limiter entirely. Set by
    /// `ForecastAPI` (§4.8) since an ad-hoc query shouldn't queue behind
    /// scheduled monitor fetches.
    pub noblock: bool,
    pub metrics_prefix: Option<String>,
}

impl Default for FetchContext {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry: 5,
            noblock: false,
            metrics_prefix: None,
        }
    }
}

impl FetchContext {
    pub fn noblock() -> Self {
        Self {
            noblock: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("fetch request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("fetch endpoint returned status {0}")]
    Status(u16),
    #[error("fetch response did not decode: {0}")]
    Decode(String),
}

/// A source's external metrics query backend (§3 "Model (runtime)" sibling
/// capability; §6).
#[async_trait::async_trait]
pub trait TSFetcher: Send + Sync {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        source: &Source,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DataPoint>, FetchError>;
}

/// Queries a configured TSDB-style HTTP endpoint, retrying on transport
/// failure and linearly interpolating short gaps in the response.
pub struct HttpTsFetcher {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct RawPoint {
    stamp: DateTime<Utc>,
    value: f64,
}

impl HttpTsFetcher {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait::async_trait]
impl TSFetcher for HttpTsFetcher {
    async fn fetch(
        &self,
        ctx: &FetchContext,
        source: &Source,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DataPoint>, FetchError> {
        let mut attempt = 0u32;
        loop {
            let result = self
                .client
                .get(&self.endpoint)
                .timeout(ctx.timeout)
                .query(&[
                    ("type", source.source_type.as_str()),
                    ("key", source.key.as_str()),
                    ("extra", source.extra.as_str()),
                    ("begin", &begin.to_rfc3339()),
                    ("end", &end.to_rfc3339()),
                ])
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    let raw: Vec<RawPoint> = resp
                        .json()
                        .await
                        .map_err(|error| FetchError::Decode(error.to_string()))?;
                    let points = raw
                        .into_iter()
                        .map(|p| DataPoint {
                            stamp: p.stamp,
                            value: p.value,
                        })
                        .collect();
                    return Ok(interpolate_gaps(points));
                }
                Ok(resp) if attempt >= ctx.retry => {
                    return Err(FetchError::Status(resp.status().as_u16()));
                }
                Err(error) if attempt >= ctx.retry => return Err(error.into()),
                _ => {
                    attempt += 1;
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}

/// Linearly interpolate gaps longer than the series' own nominal sampling
/// frequency (the smallest positive spacing observed) and no longer than 15
/// minutes; leave points ordered by stamp, largest gaps untouched (§6).
pub fn interpolate_gaps(mut points: Vec<DataPoint>) -> Vec<DataPoint> {
    points.sort_by_key(|p| p.stamp);
    if points.len() < 2 {
        return points;
    }

    let frequency = points
        .windows(2)
        .map(|w| w[1].stamp - w[0].stamp)
        .filter(|d| *d > chrono::Duration::zero())
        .min()
        .unwrap_or(chrono::Duration::zero());

    if frequency <= chrono::Duration::zero() {
        return points;
    }

    let max_gap = chrono::Duration::minutes(15);
    let mut out = Vec::with_capacity(points.len());
    out.push(points[0]);

    for pair in points.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        let gap = next.stamp - prev.stamp;

        if gap > frequency && gap <= max_gap {
            let steps = (gap.num_milliseconds() / frequency.num_milliseconds()).max(1);
            for step in 1..steps {
                let frac = step as f64 / steps as f64;
                let stamp = prev.stamp + frequency * step as i32;
                let value = prev.value + (next.value - prev.value) * frac;
                out.push(DataPoint { stamp, value });
            }
        }

        out.push(next);
    }

    out
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

    #[test]
    fn short_gap_is_linearly_interpolated() {
        // Nominal frequency is 60s; a 180s gap gets two interpolated points.
        let points = vec![pt(0, 0.0), pt(60, 10.0), pt(240, 40.0)];
        let filled = interpolate_gaps(points);

        assert_eq!(filled.len(), 5);
        assert_eq!(filled[2].stamp.timestamp(), 120);
        assert!((filled[2].value - 20.0).abs() < 1e-9);
        assert_eq!(filled[3].stamp.timestamp(), 180);
        assert!((filled[3].value - 30.0).abs() < 1e-9);
    }

    #[test]
    fn gap_longer_than_fifteen_minutes_is_preserved() {
        let points = vec![pt(0, 0.0), pt(60, 1.0), pt(60 + 16 * 60, 99.0)];
        let filled = interpolate_gaps(points.clone());
        assert_eq!(filled, points);
    }

    #[test]
    fn single_point_is_unchanged() {
        let points = vec![pt(0, 5.0)];
        assert_eq!(interpolate_gaps(points.clone()), points);
    }
}
