//! On-demand forecast queries against a running task's installed models
//! (§4.8).

use chrono::{DateTime, Utc};
use tsad_core::collab::FetchContext;
use tsad_core::source::Source;
use tsad_core::task::TaskRuntimeState;

use crate::context::DetectorContext;
use crate::detector::Detector;
use crate::error::DetectorError;

const STAMP_STEP: chrono::Duration = chrono::Duration::seconds(30);

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SeriesForecast {
    pub source: Source,
    pub error: Option<String>,
    pub observed: Vec<Option<f64>>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

fn truncate_to_30s(stamp: DateTime<Utc>) -> DateTime<Utc> {
    let secs = stamp.timestamp();
    let truncated = secs - secs.rem_euclid(30);
    DateTime::from_timestamp(truncated, 0).expect("truncated timestamp is in range")
}

/// Canonicalizes `[begin, end]` to 30-second boundaries and enumerates every
/// tick in between, inclusive (§6 worker `forecast_task`).
pub fn canonicalize_stamps(begin: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut stamp = truncate_to_30s(begin);
    let end = truncate_to_30s(end);
    let mut stamps = Vec::new();

    while stamp <= end {
        stamps.push(stamp);
        stamp += STAMP_STEP;
    }

    stamps
}

pub async fn forecast_task(
    detector: &Detector,
    ctx: &DetectorContext,
    name: &str,
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<SeriesForecast>, DetectorError> {
    let task = detector.task_named(name)?;

    if task.state() != TaskRuntimeState::Process {
        return Err(DetectorError::ArgumentInvalid(format!("task {name:?} is not in Process state")));
    }

    let stamps = canonicalize_stamps(begin, end);
    let Some(&first) = stamps.first() else {
        return Ok(Vec::new());
    };
    let last = *stamps.last().expect("stamps is non-empty when first is Some");

    let mut results = Vec::new();
    for series in task.series_snapshot() {
        if let Some((message, _)) = series.last_error() {
            results.push(SeriesForecast {
                source: series.source.clone(),
                error: Some(message),
                observed: Vec::new(),
                lower: Vec::new(),
                upper: Vec::new(),
            });
            continue;
        }

        if !series.has_model() {
            results.push(SeriesForecast {
                source: series.source.clone(),
                error: Some(format!("task {name:?} has no model installed yet, try later")),
                observed: Vec::new(),
                lower: Vec::new(),
                upper: Vec::new(),
            });
            continue;
        }

        let points = ctx
            .fetch(&series.source, &FetchContext::noblock(), first, last)
            .await
            .unwrap_or_default();

        let mut observed = Vec::with_capacity(stamps.len());
        let mut lower = Vec::with_capacity(stamps.len());
        let mut upper = Vec::with_capacity(stamps.len());

        for &stamp in &stamps {
            observed.push(points.iter().find(|p| p.stamp == stamp).map(|p| p.value));
            let (l, u) = series.forecast_interval(stamp).expect("has_model checked above");
            lower.push(l);
            upper.push(u);
        }

        results.push(SeriesForecast { source: series.source.clone(), error: None, observed, lower, upper });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_the_nearest_30_second_boundary() {
        let stamp = DateTime::parse_from_rfc3339("2026-01-01T00:00:47Z").unwrap().with_timezone(&Utc);
        assert_eq!(truncate_to_30s(stamp).to_rfc3339(), "2026-01-01T00:00:30+00:00");
    }

    #[test]
    fn enumerates_every_30_second_tick_inclusive() {
        let begin = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let end = DateTime::parse_from_rfc3339("2026-01-01T00:01:30Z").unwrap().with_timezone(&Utc);
        assert_eq!(canonicalize_stamps(begin, end).len(), 4);
    }
}
