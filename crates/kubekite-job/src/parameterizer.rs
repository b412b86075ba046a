//! Derives a concrete Job from the template and a queue entry
//!
//! Pure transformation: no cluster or disk access, and the template is only
//! ever cloned, never touched.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::EnvVar;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use kubekite_common::{ManagerConfig, OwnershipLabels};

use crate::entry::QueueEntry;
use crate::error::JobError;
use crate::rules::RuleOverrides;
use crate::template::{primary_container_mut, JobTemplate};

/// Turns (template, queue entry) into the Job to submit.
#[derive(Debug, Clone)]
pub struct Parameterizer {
    ownership: OwnershipLabels,
    namespace: String,
    job_name_prefix: String,
    tags_env_var: String,
}

impl Parameterizer {
    pub fn new(config: &ManagerConfig) -> Self {
        Self {
            ownership: config.ownership(),
            namespace: config.namespace.clone(),
            job_name_prefix: config.job_name_prefix.clone(),
            tags_env_var: config.tags_env_var.clone(),
        }
    }

    /// Job name for a queue entry id; stable for the same id.
    ///
    /// Buildkite ids are UUIDs; lowercasing keeps them valid DNS-1123 names.
    pub fn job_name(&self, id: &str) -> String {
        format!("{}{}", self.job_name_prefix, id.to_ascii_lowercase())
    }

    /// Build the Job for `entry`.
    ///
    /// Sets the derived name and namespace, merges the ownership labels into
    /// both the Job and its pod template, exports the raw rules as the tags
    /// variable, and applies `image`/`cpu`/`memory` rules to the first container.
    pub fn derive(&self, template: &JobTemplate, entry: &QueueEntry) -> Result<Job, JobError> {
        entry.validate()?;

        let mut job = template.instantiate();
        let labels = self.ownership.to_map();

        job.metadata.name = Some(self.job_name(&entry.id));
        job.metadata.generate_name = None;
        job.metadata.namespace = Some(self.namespace.clone());
        merge_labels(&mut job.metadata, &labels);

        let spec = job.spec.as_mut().ok_or(JobError::MissingContainer)?;
        let pod_meta = spec.template.metadata.get_or_insert_with(ObjectMeta::default);
        merge_labels(pod_meta, &labels);

        let container = primary_container_mut(&mut job).ok_or(JobError::MissingContainer)?;
        let env = container.env.get_or_insert_with(Vec::new);
        env.retain(|var| var.name != self.tags_env_var);
        env.push(EnvVar {
            name: self.tags_env_var.clone(),
            value: Some(entry.tags()),
            value_from: None,
        });

        RuleOverrides::from_rules(&entry.agent_query_rules).apply(container);

        Ok(job)
    }
}

fn merge_labels(meta: &mut ObjectMeta, labels: &BTreeMap<String, String>) {
    meta.labels
        .get_or_insert_with(BTreeMap::new)
        .extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
}
