//! The `(type, key, extra)` triple that identifies a metric query, and the
//! stable digest used to key model persistence.

use sha2::{Digest, Sha256};

/// Identifies an OpenTSDB-style metric query. `key` may carry wildcarded tag
/// values before a task is derived into concrete series (§4.6 step 4); a
/// fully-derived [`TimeSeries`](crate::task) always has a fully-specified
/// source.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Source {
    #[serde(rename = "type")]
    pub source_type: String,
    pub key: String,
    #[serde(default)]
    pub extra: String,
}

impl Source {
    pub fn new(
        source_type: impl Into<String>,
        key: impl Into<String>,
        extra: impl Into<String>,
    ) -> Self {
        Self {
            source_type: source_type.into(),
            key: key.into(),
            extra: extra.into(),
        }
    }

    /// Stable digest of the JSON form of this triple, used as the
    /// `ModelRecord` primary key (§4.7).
    pub fn digest(&self) -> String {
        // Field order matters for a stable digest: serialize through an
        // explicit tuple rather than relying on struct field order surviving
        // serde_json's object encoding.
        let canonical = (&self.source_type, &self.key, &self.extra);
        let json = serde_json::to_vec(&canonical).expect("tuple of strings always serializes");

        let mut hasher = Sha256::new();
        hasher.update(&json);
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_and_order_sensitive() {
        let a = Source::new("tsdb", "sys.cpu", "{host=h1}");
        let b = Source::new("tsdb", "sys.cpu", "{host=h1}");
        let c = Source::new("tsdb", "sys.cpu", "{host=h2}");

        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.digest().len(), 64);
    }
}
