//! Per-call deadlines for the agent, the judge and Google requests
//!
//! The iteration loop has no overall deadline; each remote call carries its own.

use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::constants::{agent, judge, network};
use crate::types::{DeckError, Result};

#[derive(Debug, Clone, Copy)]
pub struct TimeoutConfig {
    pub agent_call: Duration,
    pub judge_call: Duration,
    pub google_request: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            agent_call: Duration::from_secs(agent::DEFAULT_TIMEOUT_SECS),
            judge_call: Duration::from_secs(judge::DEFAULT_TIMEOUT_SECS),
            google_request: Duration::from_secs(network::DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl TimeoutConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            agent_call: Duration::from_secs(config.agent.timeout_secs),
            judge_call: Duration::from_secs(config.judge.timeout_secs),
            ..Self::default()
        }
    }
}

/// Await `future`, failing with `DeckError::Timeout` once `limit` elapses
pub async fn with_timeout<T>(
    limit: Duration,
    future: impl Future<Output = Result<T>>,
    operation: &str,
) -> Result<T> {
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| DeckError::timeout(operation, limit))?
}
