use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_QUERY: &str = "What courses should I take next term?";

/// Tuning knobs for the recommendation pipeline. Every external call gets an
/// independent timeout; the retrieval fan-out is bounded by
/// `retrieval_width`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub default_query: String,
    /// Upper bound on planned search queries per request.
    pub max_search_queries: usize,
    /// Worker-pool width for parallel retrieval.
    pub retrieval_width: usize,
    /// Top-k passed to each semantic search.
    pub search_top_k: usize,
    #[serde(with = "duration_secs")]
    pub classify_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub plan_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub search_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub verify_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub compose_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_query: DEFAULT_QUERY.to_string(),
            max_search_queries: 5,
            retrieval_width: 5,
            search_top_k: 5,
            classify_timeout: Duration::from_secs(15),
            plan_timeout: Duration::from_secs(60),
            search_timeout: Duration::from_secs(30),
            verify_timeout: Duration::from_secs(60),
            compose_timeout: Duration::from_secs(30),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_bounds() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_search_queries, 5);
        assert_eq!(config.retrieval_width, 5);
        assert_eq!(config.search_top_k, 5);
        assert_eq!(config.default_query, DEFAULT_QUERY);
    }

    #[test]
    fn config_serializes_timeouts_as_seconds() {
        let config = PipelineConfig::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["plan_timeout"], 60);

        let parsed: PipelineConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.plan_timeout, Duration::from_secs(60));
    }
}
