//! Test-only fakes for the collaborator traits wired through
//! [`crate::context::DetectorContext`] (§4.10).

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tsad_core::collab::{DataPoint, FetchContext, FetchError, TSFetcher};
use tsad_core::source::Source;

/// A `TSFetcher` that replays a fixed script of responses in order,
/// regardless of the requested source or window, and records how many times
/// it was called. The last scripted response repeats once the script is
/// exhausted.
pub struct ScriptedFetcher {
    script: Vec<Result<Vec<DataPoint>, FetchError>>,
    calls: Mutex<usize>,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Result<Vec<DataPoint>, FetchError>>) -> Self {
        assert!(!script.is_empty(), "ScriptedFetcher needs at least one scripted response");
        Self { script, calls: Mutex::new(0) }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl TSFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        _ctx: &FetchContext,
        _source: &Source,
        _begin: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<DataPoint>, FetchError> {
        let mut calls = self.calls.lock().unwrap();
        let index = (*calls).min(self.script.len() - 1);
        *calls += 1;

        match &self.script[index] {
            Ok(points) => Ok(points.clone()),
            Err(FetchError::Status(code)) => Err(FetchError::Status(*code)),
            Err(FetchError::Decode(message)) => Err(FetchError::Decode(message.clone())),
            Err(FetchError::Request(_)) => Err(FetchError::Decode("scripted transport failure".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(secs: i64, value: f64) -> DataPoint {
        DataPoint { stamp: DateTime::from_timestamp(secs, 0).unwrap(), value }
    }

    fn source() -> Source {
        Source::new("tsdb", "sys.cpu", "{host=h1}")
    }

    #[tokio::test]
    async fn replays_script_in_order_then_repeats_last() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(vec![pt(0, 1.0)]),
            Ok(vec![pt(60, 2.0)]),
            Err(FetchError::Status(503)),
        ]);

        let ctx = FetchContext::default();
        let now = Utc::now();

        let first = fetcher.fetch(&ctx, &source(), now, now).await.unwrap();
        assert_eq!(first, vec![pt(0, 1.0)]);

        let second = fetcher.fetch(&ctx, &source(), now, now).await.unwrap();
        assert_eq!(second, vec![pt(60, 2.0)]);

        let third = fetcher.fetch(&ctx, &source(), now, now).await.unwrap_err();
        assert!(matches!(third, FetchError::Status(503)));

        let fourth = fetcher.fetch(&ctx, &source(), now, now).await.unwrap_err();
        assert!(matches!(fourth, FetchError::Status(503)));

        assert_eq!(fetcher.call_count(), 4);
    }
}
