//! Analysis configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::error::{AnalysisError, AnalysisResult};
use crate::finding::FindingCategory;

pub const DEFAULT_MAX_ITERATIONS: usize = 5;
pub const DEFAULT_REPEAT_THRESHOLD: usize = 2;
pub const DEFAULT_PER_TOOL_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_SUMMARY_MAX_ENTRIES: usize = 8;
pub const DEFAULT_SUMMARY_MAX_CHARS: usize = 2_000;
pub const DEFAULT_MAX_CONCURRENT_SESSIONS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub max_iterations: usize,
    /// Uses of one tool category after which the selection guard redirects
    /// proposals towards uncovered categories.
    pub repeat_threshold: usize,
    #[serde(rename = "per_tool_timeout_ms", with = "duration_ms")]
    pub per_tool_timeout: Duration,
    /// Category multipliers; categories not listed weigh 1.0.
    pub category_weights: BTreeMap<FindingCategory, f64>,
    pub summary_max_entries: usize,
    pub summary_max_chars: usize,
    pub max_concurrent_sessions: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            repeat_threshold: DEFAULT_REPEAT_THRESHOLD,
            per_tool_timeout: Duration::from_millis(DEFAULT_PER_TOOL_TIMEOUT_MS),
            category_weights: default_category_weights(),
            summary_max_entries: DEFAULT_SUMMARY_MAX_ENTRIES,
            summary_max_chars: DEFAULT_SUMMARY_MAX_CHARS,
            max_concurrent_sessions: DEFAULT_MAX_CONCURRENT_SESSIONS,
        }
    }
}

pub fn default_category_weights() -> BTreeMap<FindingCategory, f64> {
    BTreeMap::from([
        (FindingCategory::Reentrancy, 2.0),
        (FindingCategory::ConcentrationRisk, 3.0),
        (FindingCategory::DeploymentRisk, 4.0),
    ])
}

impl AnalysisConfig {
    /// Defaults overridden by `VIGIL_*` environment variables. Unparseable
    /// values fall back to the default.
    pub fn from_env() -> AnalysisResult<Self> {
        let defaults = Self::default();
        let config = Self {
            max_iterations: env_parse("VIGIL_MAX_ITERATIONS").unwrap_or(defaults.max_iterations),
            repeat_threshold: env_parse("VIGIL_REPEAT_THRESHOLD")
                .unwrap_or(defaults.repeat_threshold),
            per_tool_timeout: env_parse::<u64>("VIGIL_PER_TOOL_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.per_tool_timeout),
            category_weights: env::var("VIGIL_CATEGORY_WEIGHTS")
                .ok()
                .filter(|value| !value.is_empty())
                .and_then(|value| serde_json::from_str(&value).ok())
                .unwrap_or(defaults.category_weights),
            summary_max_entries: env_parse("VIGIL_SUMMARY_MAX_ENTRIES")
                .unwrap_or(defaults.summary_max_entries),
            summary_max_chars: env_parse("VIGIL_SUMMARY_MAX_CHARS")
                .unwrap_or(defaults.summary_max_chars),
            max_concurrent_sessions: env_parse("VIGIL_MAX_CONCURRENT_SESSIONS")
                .unwrap_or(defaults.max_concurrent_sessions),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> AnalysisResult<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        if self.max_iterations == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.repeat_threshold == 0 {
            return Err(AnalysisError::InvalidConfig(
                "repeat_threshold must be at least 1".to_string(),
            ));
        }
        if self.per_tool_timeout.is_zero() {
            return Err(AnalysisError::InvalidConfig(
                "per_tool_timeout must be positive".to_string(),
            ));
        }
        if self.max_concurrent_sessions == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_concurrent_sessions must be at least 1".to_string(),
            ));
        }
        if let Some((category, weight)) = self
            .category_weights
            .iter()
            .find(|(_, weight)| !weight.is_finite() || **weight < 0.0)
        {
            return Err(AnalysisError::InvalidConfig(format!(
                "weight for {category} must be a non-negative number, got {weight}"
            )));
        }
        Ok(())
    }

    pub fn category_weight(&self, category: FindingCategory) -> f64 {
        self.category_weights.get(&category).copied().unwrap_or(1.0)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.trim().parse::<T>().ok())
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
