//! Regex allow/deny against a submitted source's key/extra (§4, §7, §8-9).
//!
//! The rule is deliberately `inWhite || !inBlack`: a source matching neither
//! list is admitted. This is preserved verbatim from the design notes (§9) —
//! it is not "fixed" to a deny-by-default posture.

use regex::RegexSet;

use crate::source::Source;

#[derive(Debug, thiserror::Error)]
pub enum AdmissionFilterError {
    #[error("invalid regex {pattern:?} in {list} list: {source}")]
    InvalidPattern {
        list: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub struct AdmissionFilter {
    white: RegexSet,
    black: RegexSet,
}

impl AdmissionFilter {
    pub fn new(
        white: &[String],
        black: &[String],
    ) -> Result<Self, AdmissionFilterError> {
        Ok(Self {
            white: build_set("white", white)?,
            black: build_set("black", black)?,
        })
    }

    pub fn allow_all() -> Self {
        Self {
            white: RegexSet::empty(),
            black: RegexSet::empty(),
        }
    }

    /// `true` iff the source is admitted. Matched against `key` and `extra`
    /// independently; a match on either field counts as a list match.
    pub fn allows(&self, source: &Source) -> bool {
        let in_white = self.matches(&self.white, source);
        let in_black = self.matches(&self.black, source);

        in_white || !in_black
    }

    /// The human-readable rejection reason used by the worker's HTTP handler.
    pub const DENIED_MESSAGE: &'static str = "not in white datasource list";

    fn matches(&self, set: &RegexSet, source: &Source) -> bool {
        set.is_match(&source.key) || set.is_match(&source.extra)
    }
}

fn build_set(list: &'static str, patterns: &[String]) -> Result<RegexSet, AdmissionFilterError> {
    RegexSet::new(patterns).map_err(|source| {
        // RegexSet::new doesn't tell us which pattern failed; re-validate one
        // at a time purely to produce a useful error message.
        let bad = patterns
            .iter()
            .find(|p| regex::Regex::new(p).is_err())
            .cloned()
            .unwrap_or_default();

        AdmissionFilterError::InvalidPattern {
            list,
            pattern: bad,
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(key: &str) -> Source {
        Source::new("tsdb", key, "")
    }

    #[test]
    fn white_listed_key_is_admitted() {
        let filter = AdmissionFilter::new(
            &[r"^10\.".to_string()],
            &[r".*".to_string()],
        )
        .unwrap();

        assert!(filter.allows(&source("10.1.2.3")));
    }

    #[test]
    fn non_matching_key_is_rejected_when_black_catches_all() {
        let filter = AdmissionFilter::new(
            &[r"^10\.".to_string()],
            &[r".*".to_string()],
        )
        .unwrap();

        assert!(!filter.allows(&source("11.0.0.1")));
    }

    #[test]
    fn non_matching_key_is_admitted_with_only_a_black_list() {
        let filter = AdmissionFilter::new(&[], &[r"^11\.".to_string()]).unwrap();

        assert!(filter.allows(&source("10.1.2.3")));
        assert!(!filter.allows(&source("11.0.0.1")));
    }

    #[test]
    fn no_lists_admits_everything() {
        let filter = AdmissionFilter::allow_all();
        assert!(filter.allows(&source("anything")));
    }
}
