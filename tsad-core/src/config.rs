//! Per-task tunables, parsed opportunistically out of the free-form config
//! string (§6). Missing keys, an empty string, or invalid JSON all fall back
//! to the documented defaults rather than failing the submit.

use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TaskConfig {
    /// Training window length, in days. Default 3.
    pub training_data_length_days: i64,
    /// Monitor tick frequency, in minutes. Default 5, floored at 1.
    pub check_freq_min: i64,
    /// Monitor fetch window, in minutes. Default 8.
    pub check_data_min: i64,
    /// Sensitivity multiplier for the bad-point predicate. Default 0.5.
    pub alert_sensitive: f64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            training_data_length_days: 3,
            check_freq_min: 5,
            check_data_min: 8,
            alert_sensitive: 0.5,
        }
    }
}

#[derive(Deserialize, Default)]
struct RawTaskConfig {
    training_data_length: Option<i64>,
    check_freq_min: Option<i64>,
    check_data_min: Option<i64>,
    alert_sensitive: Option<f64>,
}

impl TaskConfig {
    /// Parse the free-form config string. Any parse failure (empty string,
    /// malformed JSON, wrong value types) is logged and treated as "no
    /// overrides", matching the spec's "parsed opportunistically" wording.
    pub fn parse(config: &str) -> Self {
        let raw: RawTaskConfig = if config.trim().is_empty() {
            RawTaskConfig::default()
        } else {
            match serde_json::from_str(config) {
                Ok(raw) => raw,
                Err(error) => {
                    tracing::warn!(%error, "task config did not parse as JSON; using defaults");
                    RawTaskConfig::default()
                }
            }
        };

        let defaults = Self::default();
        Self {
            training_data_length_days: raw
                .training_data_length
                .unwrap_or(defaults.training_data_length_days),
            check_freq_min: raw.check_freq_min.unwrap_or(defaults.check_freq_min).max(1),
            check_data_min: raw.check_data_min.unwrap_or(defaults.check_data_min),
            alert_sensitive: raw.alert_sensitive.unwrap_or(defaults.alert_sensitive),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_defaults() {
        assert_eq!(TaskConfig::parse(""), TaskConfig::default());
    }

    #[test]
    fn garbage_config_is_defaults() {
        assert_eq!(TaskConfig::parse("not json"), TaskConfig::default());
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let cfg = TaskConfig::parse(r#"{"check_freq_min": 1, "alert_sensitive": 0.25}"#);
        assert_eq!(cfg.check_freq_min, 1);
        assert_eq!(cfg.alert_sensitive, 0.25);
        assert_eq!(cfg.training_data_length_days, 3);
        assert_eq!(cfg.check_data_min, 8);
    }

    #[test]
    fn check_freq_min_is_floored_at_one() {
        let cfg = TaskConfig::parse(r#"{"check_freq_min": 0}"#);
        assert_eq!(cfg.check_freq_min, 1);
    }
}
