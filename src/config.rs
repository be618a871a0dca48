// src/config.rs
use log::{debug, info};
use std::env;
use std::time::Duration;

/// Tunable thresholds and limits for the matching pipeline.
///
/// Every field has a fixed default; environment variables override
/// individual values for operational tuning without a redeploy.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Jaro-Winkler threshold above which a legal name is considered a match.
    pub legal_name_threshold: f64,
    /// Jaro-Winkler threshold for fund manager names (more lenient).
    pub fund_manager_threshold: f64,
    /// Composite scoring floor for the legal-name component.
    pub composite_legal_floor: f64,
    /// Composite scoring floor for the fund-manager component.
    pub composite_fm_floor: f64,
    /// Cross-form legal-name similarity below which a discrepancy is raised.
    pub cross_source_name_threshold: f64,
    /// Minimum score for a fuzzy-name candidate to enter the result pool.
    pub fuzzy_admit_score: f64,
    /// Maximum candidates returned by the engine.
    pub top_k: usize,
    /// Concurrent workers for batch processing.
    pub worker_pool_size: usize,
    /// Hard deadline for a single record.
    pub record_timeout: Duration,
    /// How long the primary consumer waits for the secondary (tax form) extraction.
    pub secondary_extraction_timeout: Duration,
    /// Grace period when draining workers on shutdown.
    pub shutdown_grace: Duration,
    /// Identifier lookup cache capacity.
    pub identifier_cache_capacity: usize,
    /// Freshness window for cached identifier lookups.
    pub identifier_cache_ttl: Duration,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            legal_name_threshold: 0.85,
            fund_manager_threshold: 0.70,
            composite_legal_floor: 0.70,
            composite_fm_floor: 0.60,
            cross_source_name_threshold: 0.85,
            fuzzy_admit_score: 50.0,
            top_k: 5,
            worker_pool_size: 4,
            record_timeout: Duration::from_secs(60),
            secondary_extraction_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(60),
            identifier_cache_capacity: 1000,
            identifier_cache_ttl: Duration::from_secs(600),
        }
    }
}

impl MatchingConfig {
    /// Build a configuration from environment variables, falling back to
    /// the fixed defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = parse_env::<usize>("MATCHING_WORKER_POOL_SIZE") {
            config.worker_pool_size = v.max(1);
        }
        if let Some(v) = parse_env::<u64>("MATCHING_RECORD_TIMEOUT_SECS") {
            config.record_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_env::<u64>("MATCHING_SECONDARY_TIMEOUT_SECS") {
            config.secondary_extraction_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_env::<f64>("MATCHING_FUZZY_ADMIT_SCORE") {
            config.fuzzy_admit_score = v;
        }
        if let Some(v) = parse_env::<usize>("MATCHING_IDENTIFIER_CACHE_CAPACITY") {
            config.identifier_cache_capacity = v.max(1);
        }

        debug!("Matching config: {:?}", config);
        config
    }

    pub fn log_config(&self) {
        info!(
            "Matching configuration: {} workers, {}s record timeout, {}s secondary-extraction timeout, top-{}",
            self.worker_pool_size,
            self.record_timeout.as_secs(),
            self.secondary_extraction_timeout.as_secs(),
            self.top_k
        );
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
