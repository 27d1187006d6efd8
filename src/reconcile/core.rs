//! Orchestrator that sequences the update stages

use serde::{Deserialize, Serialize};

use crate::config::LookupCodes;
use crate::reconcile::{BatchProcessor, LookupPruner};
use crate::traits::*;
use crate::types::*;

/// Runs load, batch and prune stages against one storage backend
pub struct SampleDataUpdate<S: UpdateStorage> {
    storage: S,
    batch_processor: BatchProcessor<S>,
    pruner: LookupPruner<S>,
    codes: LookupCodes,
}

impl<S: UpdateStorage + Clone> SampleDataUpdate<S> {
    /// Create an orchestrator using the standard lookup table codes
    pub fn new(storage: S) -> Self {
        Self::with_codes(storage, LookupCodes::default())
    }

    /// Create an orchestrator that loads the given lookup table codes
    pub fn with_codes(storage: S, codes: LookupCodes) -> Self {
        Self {
            batch_processor: BatchProcessor::new(storage.clone()),
            pruner: LookupPruner::new(storage.clone()),
            storage,
            codes,
        }
    }

    /// Load both lookup tables for the run
    pub async fn load_context(&self) -> ReconcileResult<LookupContext> {
        Ok(LookupContext {
            underwriter_name: self.load_table(&self.codes.underwriter_name_code).await?,
            underwriting_group: self.load_table(&self.codes.underwriting_group_code).await?,
        })
    }

    async fn load_table(&self, code: &str) -> ReconcileResult<LookupTable> {
        self.storage
            .get_lookup_table(code)
            .await?
            .ok_or_else(|| ReconcileError::LookupTableNotFound(code.to_string()))
    }

    /// Run every stage, stopping at the first failed stage
    ///
    /// Errors are posted with an `ERROR:` prefix and recorded in the report
    /// instead of being returned. Work completed before a failure is kept.
    pub async fn run(&self, progress: &dyn ProgressSink) -> RunReport {
        let mut report = RunReport::default();

        if let Err(err) = self.run_stages(progress, &mut report).await {
            tracing::error!(error = %err, "sample data update failed");
            progress.post(&format!("ERROR: {}", err));
            report.error = Some(err.to_string());
        }

        report
    }

    async fn run_stages(
        &self,
        progress: &dyn ProgressSink,
        report: &mut RunReport,
    ) -> ReconcileResult<()> {
        let context = self.load_context().await?;
        tracing::info!(
            underwriter_name = %context.underwriter_name.code,
            underwriting_group = %context.underwriting_group.code,
            "loaded lookup tables"
        );

        for variant in LoanVariant::ALL {
            progress.post(&format!("Processing {}...", variant.label()));
            let counts = self
                .batch_processor
                .process(variant, &context, progress)
                .await?;
            progress.post(&format!(
                "Updated {} {}; {} population record(s) not found; {} update error(s).",
                counts.updated,
                variant.label(),
                counts.failed,
                counts.errors
            ));
            report.set_counts(variant, counts);
        }

        progress.post("Removing unused lookup values...");
        for attribute in LookupAttribute::ALL {
            let deleted = self.pruner.prune(attribute, &context, progress).await?;
            report.set_pruned(attribute, deleted);
        }

        Ok(())
    }
}

/// Outcome of one update run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Counts for the primary pass, if it completed
    pub primary: Option<BatchCounts>,
    /// Counts for the DAR pass, if it completed
    pub dar: Option<BatchCounts>,
    /// Underwriter name values removed, if pruning ran
    pub pruned_underwriter_names: Option<u64>,
    /// Underwriting group values removed, if pruning ran
    pub pruned_underwriting_groups: Option<u64>,
    /// Message of the error that ended the run early
    pub error: Option<String>,
}

impl RunReport {
    /// Whether every stage completed
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    pub fn counts(&self, variant: LoanVariant) -> Option<BatchCounts> {
        match variant {
            LoanVariant::Primary => self.primary,
            LoanVariant::Dar => self.dar,
        }
    }

    pub fn pruned(&self, attribute: LookupAttribute) -> Option<u64> {
        match attribute {
            LookupAttribute::UnderwriterName => self.pruned_underwriter_names,
            LookupAttribute::UnderwritingGroup => self.pruned_underwriting_groups,
        }
    }

    fn set_counts(&mut self, variant: LoanVariant, counts: BatchCounts) {
        match variant {
            LoanVariant::Primary => self.primary = Some(counts),
            LoanVariant::Dar => self.dar = Some(counts),
        }
    }

    fn set_pruned(&mut self, attribute: LookupAttribute, deleted: u64) {
        match attribute {
            LookupAttribute::UnderwriterName => self.pruned_underwriter_names = Some(deleted),
            LookupAttribute::UnderwritingGroup => self.pruned_underwriting_groups = Some(deleted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;
    use crate::utils::progress::ProgressLog;

    fn seeded_storage() -> MemoryStorage {
        let storage = MemoryStorage::new();
        let names =
            storage.add_lookup_table(LookupTable::new("UnderwriterNameCode", "Underwriter Names"));
        storage.add_lookup_table(LookupTable::new("UnderwritingGrpCode", "Underwriting Groups"));

        let legacy =
            storage.add_lookup_value(LookupValue::new(names.id, "Legacy", "Underwriter Name"));
        storage.add_sampled_loan(
            LoanVariant::Primary,
            SampledLoan {
                key: SampledLoanKey::new("5", "1"),
                loan_number: "L100".to_string(),
                underwriter_name: Some(legacy),
                underwriting_group: None,
            },
        );
        storage.add_import_record(
            LoanVariant::Primary,
            LoanImportRecord {
                loan_number: "L100 ".to_string(),
                underwriter_name: Some("BankA".to_string()),
                underwriting_group: Some("Retail".to_string()),
            },
        );
        storage
    }

    #[tokio::test]
    async fn test_run_processes_both_variants_and_prunes() {
        let storage = seeded_storage();
        let progress = ProgressLog::new();
        let update = SampleDataUpdate::new(storage.clone());

        let report = update.run(&progress).await;

        assert!(report.succeeded());
        assert_eq!(report.primary.unwrap().updated, 1);
        assert_eq!(report.dar, Some(BatchCounts::default()));
        // "Legacy" lost its only reference
        assert_eq!(report.pruned(LookupAttribute::UnderwriterName), Some(1));
        assert_eq!(report.pruned(LookupAttribute::UnderwritingGroup), Some(0));
        assert!(progress
            .messages()
            .iter()
            .any(|m| m.starts_with("NOTE: There are no sampled DAR loans")));
    }

    #[tokio::test]
    async fn test_missing_lookup_table_is_reported() {
        let storage = MemoryStorage::new();
        let progress = ProgressLog::new();
        let update = SampleDataUpdate::new(storage);

        let report = update.run(&progress).await;

        assert!(!report.succeeded());
        assert!(report.primary.is_none());
        assert_eq!(
            report.error.as_deref(),
            Some("Lookup table not found: UnderwriterNameCode")
        );
        assert_eq!(
            progress.messages().last().map(String::as_str),
            Some("ERROR: Lookup table not found: UnderwriterNameCode")
        );
    }

    #[tokio::test]
    async fn test_update_error_does_not_stop_later_stages() {
        let storage = seeded_storage();
        storage.fail_update_for("5");
        let progress = ProgressLog::new();
        let update = SampleDataUpdate::new(storage.clone());

        let report = update.run(&progress).await;

        assert!(report.succeeded());
        assert_eq!(
            report.primary,
            Some(BatchCounts {
                errors: 1,
                ..BatchCounts::default()
            })
        );
        assert_eq!(report.dar, Some(BatchCounts::default()));
        // The loan still points at "Legacy", so pruning keeps it
        assert_eq!(report.pruned(LookupAttribute::UnderwriterName), Some(1));
        let names = storage.lookup_table("UnderwriterNameCode").unwrap();
        let codes: Vec<String> = storage
            .lookup_values(names.id)
            .into_iter()
            .map(|v| v.code)
            .collect();
        assert_eq!(codes, vec!["Legacy".to_string()]);
        assert!(progress
            .messages()
            .iter()
            .any(|m| m.starts_with("ERROR: ") && m.contains("rejected")));
    }

    #[tokio::test]
    async fn test_custom_lookup_codes() {
        let storage = MemoryStorage::new();
        storage.add_lookup_table(LookupTable::new("UWName", "Underwriter Names"));
        storage.add_lookup_table(LookupTable::new("UWGroup", "Underwriting Groups"));
        let update = SampleDataUpdate::with_codes(
            storage,
            LookupCodes {
                underwriter_name_code: "UWName".to_string(),
                underwriting_group_code: "UWGroup".to_string(),
            },
        );

        let context = update.load_context().await.unwrap();
        assert_eq!(context.underwriter_name.code, "UWName");
        assert_eq!(context.underwriting_group.code, "UWGroup");
    }
}
