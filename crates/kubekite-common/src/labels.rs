//! Ownership labels binding cluster objects to one kubekite instance

use std::collections::BTreeMap;

use crate::{MANAGED_LABEL_KEY, ORG_LABEL_KEY, PIPELINE_LABEL_KEY};

/// The three labels stamped on every managed Job and its pod template.
///
/// They are the only link between a cluster object and this manager: the
/// cleanup pass selects pods purely by these labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipLabels {
    /// Buildkite organization slug
    pub org: String,
    /// Buildkite pipeline slug
    pub pipeline: String,
}

impl OwnershipLabels {
    /// Create labels for the given organization and pipeline
    pub fn new(org: impl Into<String>, pipeline: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            pipeline: pipeline.into(),
        }
    }

    /// Labels as a map, ready to merge into object metadata
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (MANAGED_LABEL_KEY.to_string(), "true".to_string()),
            (ORG_LABEL_KEY.to_string(), self.org.clone()),
            (PIPELINE_LABEL_KEY.to_string(), self.pipeline.clone()),
        ])
    }

    /// Equality label selector matching all three labels
    pub fn selector(&self) -> String {
        format!(
            "{}=true,{}={},{}={}",
            MANAGED_LABEL_KEY, ORG_LABEL_KEY, self.org, PIPELINE_LABEL_KEY, self.pipeline
        )
    }
}
