//! Query execution configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How `Path` nodes inside an algebra tree get evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStrategy {
    /// Walk the graph directly with the path evaluator.
    #[default]
    Traverse,
    /// Lower simple paths into BGP/join/union algebra first; closures still
    /// run through the path evaluator.
    Translate,
}

/// Configuration for query execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub path_strategy: PathStrategy,
    /// Wall-clock budget for one whole evaluation, in milliseconds. Checked at
    /// every algebra node and every path traversal step.
    pub timeout_ms: Option<u64>,
    /// Run the optimiser pipeline before evaluation
    pub optimise: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            path_strategy: PathStrategy::Traverse,
            timeout_ms: None,
            optimise: true,
        }
    }
}

impl QueryConfig {
    /// Parse a (possibly partial) JSON configuration; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse query config JSON")
    }

    pub fn with_path_strategy(mut self, strategy: PathStrategy) -> Self {
        self.path_strategy = strategy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    pub fn without_optimisation(mut self) -> Self {
        self.optimise = false;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = QueryConfig::from_json_str(r#"{ "path_strategy": "translate" }"#).unwrap();
        assert_eq!(config.path_strategy, PathStrategy::Translate);
        assert_eq!(config.timeout_ms, None);
        assert!(config.optimise);
    }

    #[test]
    fn invalid_json_reports_context() {
        let err = QueryConfig::from_json_str(r#"{ "path_strategy": "teleport" }"#).unwrap_err();
        assert!(err.to_string().contains("failed to parse query config"));
    }

    #[test]
    fn builder_sets_timeout() {
        let config = QueryConfig::default()
            .with_timeout(Duration::from_millis(250))
            .without_optimisation();
        assert_eq!(config.timeout(), Some(Duration::from_millis(250)));
        assert!(!config.optimise);
    }
}
