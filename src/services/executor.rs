use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::models::{Environment, MigrationError};

/// Reachability of the cluster behind an environment
#[async_trait::async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn validate_connection(&self, environment: Environment) -> bool;
}

/// Runs SQL text against an environment's HiveServer2 connection
#[async_trait::async_trait]
pub trait SqlExecutor: ConnectionProvider {
    async fn execute(&self, environment: Environment, sql: &str) -> Result<(), MigrationError>;
}

/// One statement as seen by the recording executor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutedStatement {
    pub environment: Environment,
    pub statement: String,
}

/// Executor that records statements instead of running them
///
/// Used for dry runs; statements matching a failure pattern are rejected.
#[derive(Default)]
pub struct RecordingSqlExecutor {
    transcript: Mutex<Vec<ExecutedStatement>>,
    failure_patterns: Vec<String>,
    unavailable: Vec<Environment>,
}

impl RecordingSqlExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any statement containing `pattern` (case-insensitive)
    pub fn failing_on(mut self, pattern: impl Into<String>) -> Self {
        self.failure_patterns.push(pattern.into().to_uppercase());
        self
    }

    pub fn unavailable(mut self, environment: Environment) -> Self {
        self.unavailable.push(environment);
        self
    }

    pub async fn transcript(&self) -> Vec<ExecutedStatement> {
        self.transcript.lock().await.clone()
    }

    pub async fn statements(&self, environment: Environment) -> Vec<String> {
        self.transcript
            .lock()
            .await
            .iter()
            .filter(|s| s.environment == environment)
            .map(|s| s.statement.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl ConnectionProvider for RecordingSqlExecutor {
    async fn validate_connection(&self, environment: Environment) -> bool {
        !self.unavailable.contains(&environment)
    }
}

#[async_trait::async_trait]
impl SqlExecutor for RecordingSqlExecutor {
    async fn execute(&self, environment: Environment, sql: &str) -> Result<(), MigrationError> {
        let upper = sql.to_uppercase();
        if let Some(pattern) = self.failure_patterns.iter().find(|p| upper.contains(p.as_str())) {
            tracing::debug!("[{}] rejected ({}): {}", environment, pattern, sql);
            return Err(MigrationError::Execution(format!(
                "{} statement failed: {}",
                environment, sql
            )));
        }
        tracing::debug!("[{}] {}", environment, sql);
        self.transcript.lock().await.push(ExecutedStatement {
            environment,
            statement: sql.to_string(),
        });
        Ok(())
    }
}
