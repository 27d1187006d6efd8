//! Traits for storage abstraction and progress reporting

use async_trait::async_trait;

use crate::types::*;

/// Lookup table access
///
/// Lookup values are matched by the owning table's code and the exact
/// (case-sensitive) value code.
#[async_trait]
pub trait LookupService: Send + Sync {
    /// Get a lookup table by its symbolic code
    async fn get_lookup_table(&self, code: &str) -> ReconcileResult<Option<LookupTable>>;

    /// Get a lookup value by table code and value code
    async fn get_lookup_value_by_code(
        &self,
        table_code: &str,
        code: &str,
    ) -> ReconcileResult<Option<LookupValue>>;

    /// Persist a new lookup value and return its assigned identifier
    async fn save_lookup_value(&self, value: &LookupValue) -> ReconcileResult<LookupValueId>;
}

/// Storage abstraction for the sampled loan and import tables
///
/// Implementations choose the physical tables for each [`LoanVariant`];
/// a DAR call must never read or write the primary tables.
#[async_trait]
pub trait SampleStore: Send + Sync {
    /// Sampled loans with an underwriter name or underwriting group assigned
    async fn sampled_loans_to_process(
        &self,
        variant: LoanVariant,
    ) -> ReconcileResult<Vec<SampledLoan>>;

    /// Population record whose trimmed loan number equals `loan_number`
    async fn find_import_record(
        &self,
        variant: LoanVariant,
        loan_number: &str,
    ) -> ReconcileResult<Option<LoanImportRecord>>;

    /// Rewrite both lookup references of one sampled loan
    async fn update_sampled_loan(
        &self,
        variant: LoanVariant,
        key: &SampledLoanKey,
        resolved: &ResolvedLookups,
    ) -> ReconcileResult<()>;

    /// Delete the values of `table` not referenced by `attribute` in any
    /// sampled loan of any variant; returns the number of rows removed
    async fn delete_unused_lookup_values(
        &self,
        table: &LookupTable,
        attribute: LookupAttribute,
    ) -> ReconcileResult<u64>;

    /// Record the audit row for a completed run
    async fn insert_update_log(&self, log: &UpdateLog) -> ReconcileResult<()>;
}

/// Everything a run needs from storage
pub trait UpdateStorage: LookupService + SampleStore {}

impl<T: LookupService + SampleStore> UpdateStorage for T {}

/// Sink for operator-facing progress messages
///
/// Posting is fire-and-forget; implementations must not fail.
pub trait ProgressSink: Send + Sync {
    fn post(&self, message: &str);
}
