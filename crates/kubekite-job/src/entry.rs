//! Queue entries handed over by the Buildkite queue reader

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// A Buildkite job that is ready to run and needs an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Buildkite job UUID
    pub id: String,
    /// Agent query rules, e.g. `queue=default`, `image=ruby:3.3`, `cpu=2`
    #[serde(default)]
    pub agent_query_rules: Vec<String>,
}

impl QueueEntry {
    pub fn new<I, S>(id: impl Into<String>, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            agent_query_rules: rules.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse one JSON object, e.g. a line of newline-delimited input
    pub fn from_json(input: &str) -> Result<Self, JobError> {
        let entry: Self = serde_json::from_str(input)?;
        entry.validate()?;
        Ok(entry)
    }

    pub fn validate(&self) -> Result<(), JobError> {
        if self.id.trim().is_empty() {
            return Err(JobError::InvalidEntry("id must not be empty".to_string()));
        }
        Ok(())
    }

    /// Rules joined with commas, the form the agent reads its tags in
    pub fn tags(&self) -> String {
        self.agent_query_rules.join(",")
    }
}
