//! Removal of lookup values no sampled loan references

use crate::traits::*;
use crate::types::*;

/// Deletes orphaned lookup values after all batch passes have run
pub struct LookupPruner<S: SampleStore> {
    storage: S,
}

impl<S: SampleStore> LookupPruner<S> {
    /// Create a new pruner over the given storage
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Delete the values of the attribute's table that no sampled loan of
    /// either variant references; returns the number of values removed
    pub async fn prune(
        &self,
        attribute: LookupAttribute,
        context: &LookupContext,
        progress: &dyn ProgressSink,
    ) -> ReconcileResult<u64> {
        let table = context.table(attribute);
        let deleted = self
            .storage
            .delete_unused_lookup_values(table, attribute)
            .await?;

        tracing::info!(table = %table.code, deleted, "pruned unused lookup values");
        progress.post(&format!(
            "Removed {} unused {} lookup value(s).",
            deleted,
            attribute.display_name()
        ));

        Ok(deleted)
    }
}
