//! Local to remote propagation of instant documents

use crate::{ReplicateError, ReplicationOutcome};
use fcast_core::InstantKey;
use fcast_store::DocumentStore;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Tally of one replication pass
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReplicationSummary {
    pub propagated: usize,
    pub already_present: usize,
    pub failed: Vec<(InstantKey, String)>,
}

impl ReplicationSummary {
    pub fn record(&mut self, key: &InstantKey, outcome: ReplicationOutcome) {
        match outcome {
            ReplicationOutcome::Propagated => self.propagated += 1,
            ReplicationOutcome::AlreadyPresent => self.already_present += 1,
            ReplicationOutcome::Failed(reason) => self.failed.push((key.clone(), reason)),
        }
    }
}

/// Pushes local documents to the store of record. Sole writer to remote.
pub struct Replicator {
    local: Arc<dyn DocumentStore>,
    remote: Arc<dyn DocumentStore>,
}

impl Replicator {
    pub fn new(local: Arc<dyn DocumentStore>, remote: Arc<dyn DocumentStore>) -> Self {
        Self { local, remote }
    }

    /// Copy the local document for `key` over the remote one.
    ///
    /// Only an unreachable local store is an error; every remote problem is
    /// reported as an outcome so the caller can move on.
    #[instrument(skip(self), fields(local = self.local.name(), remote = self.remote.name()))]
    pub async fn replicate(&self, key: &InstantKey) -> Result<ReplicationOutcome, ReplicateError> {
        let document = match self.local.find_one(key).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                warn!("No local document to replicate");
                return Ok(ReplicationOutcome::Failed(format!(
                    "no local document for {key}"
                )));
            }
            Err(e) if e.is_unavailable() => return Err(ReplicateError::LocalUnavailable(e)),
            Err(e) => return Ok(ReplicationOutcome::Failed(e.to_string())),
        };

        let outcome = match self.remote.replace_one(&document).await {
            Ok(_) => ReplicationOutcome::Propagated,
            Err(e) if e.is_duplicate_key() => ReplicationOutcome::AlreadyPresent,
            Err(e) => {
                warn!(error = %e, "Remote write failed");
                ReplicationOutcome::Failed(e.to_string())
            }
        };
        debug!(?outcome, "Replicated");
        Ok(outcome)
    }

    /// Replicate each key in turn
    pub async fn replicate_all(
        &self,
        keys: &[InstantKey],
    ) -> Result<ReplicationSummary, ReplicateError> {
        let mut summary = ReplicationSummary::default();
        for key in keys {
            let outcome = self.replicate(key).await?;
            summary.record(key, outcome);
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_tally() {
        let key = InstantKey::new("27601", 10800);
        let mut summary = ReplicationSummary::default();
        summary.record(&key, ReplicationOutcome::Propagated);
        summary.record(&key, ReplicationOutcome::AlreadyPresent);
        summary.record(&key, ReplicationOutcome::Failed("timeout".into()));

        assert_eq!(summary.propagated, 1);
        assert_eq!(summary.already_present, 1);
        assert_eq!(summary.failed, vec![(key, "timeout".to_string())]);
    }
}
