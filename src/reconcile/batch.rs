//! Batch reconciliation of sampled loans against their population records

use crate::reconcile::cache::AttributeCaches;
use crate::reconcile::resolver::LookupResolver;
use crate::traits::*;
use crate::types::*;

/// Rewrites the lookup references of one variant's sampled loans
pub struct BatchProcessor<S: UpdateStorage> {
    storage: S,
    resolver: LookupResolver<S>,
}

impl<S: UpdateStorage + Clone> BatchProcessor<S> {
    /// Create a new batch processor over the given storage
    pub fn new(storage: S) -> Self {
        Self {
            resolver: LookupResolver::new(storage.clone()),
            storage,
        }
    }

    /// Reconcile every sampled loan of `variant` that has a lookup assigned
    ///
    /// A missing population record is counted as a failure and a rejected
    /// update is posted as an error; the pass continues in both cases. Any
    /// other storage error ends the pass. Loans updated before the error
    /// keep their new values.
    pub async fn process(
        &self,
        variant: LoanVariant,
        context: &LookupContext,
        progress: &dyn ProgressSink,
    ) -> ReconcileResult<BatchCounts> {
        let mut counts = BatchCounts::default();
        let mut caches = AttributeCaches::new();

        let loans = self.storage.sampled_loans_to_process(variant).await?;
        if loans.is_empty() {
            progress.post(&format!(
                "NOTE: There are no {} with Underwriter Name or Underwriting Group values to process.",
                variant.label()
            ));
            return Ok(counts);
        }

        tracing::info!(%variant, loans = loans.len(), "processing sampled loans");

        for loan in &loans {
            let loan_number = loan.loan_number.trim();
            if loan_number.is_empty() {
                counts.skipped += 1;
                continue;
            }

            let Some(record) = self
                .storage
                .find_import_record(variant, loan_number)
                .await?
            else {
                tracing::warn!(%variant, loan_number, "population record not found");
                progress.post(&format!("POPULATION RECORD NOT FOUND: {}", loan_number));
                counts.failed += 1;
                continue;
            };

            let resolved = self.resolve_record(&record, context, &mut caches).await?;
            match self
                .storage
                .update_sampled_loan(variant, &loan.key, &resolved)
                .await
            {
                Ok(()) => counts.updated += 1,
                Err(err) => {
                    tracing::error!(
                        %variant,
                        loan = %loan.key,
                        error = %err,
                        "sampled loan update failed"
                    );
                    progress.post(&format!("ERROR: {}", err));
                    counts.errors += 1;
                }
            }
        }

        tracing::info!(
            %variant,
            updated = counts.updated,
            failed = counts.failed,
            skipped = counts.skipped,
            errors = counts.errors,
            "finished sampled loans"
        );

        Ok(counts)
    }

    async fn resolve_record(
        &self,
        record: &LoanImportRecord,
        context: &LookupContext,
        caches: &mut AttributeCaches,
    ) -> ReconcileResult<ResolvedLookups> {
        let underwriter_name = self
            .resolve_attribute(LookupAttribute::UnderwriterName, record, context, caches)
            .await?;
        let underwriting_group = self
            .resolve_attribute(LookupAttribute::UnderwritingGroup, record, context, caches)
            .await?;

        Ok(ResolvedLookups {
            underwriter_name,
            underwriting_group,
        })
    }

    async fn resolve_attribute(
        &self,
        attribute: LookupAttribute,
        record: &LoanImportRecord,
        context: &LookupContext,
        caches: &mut AttributeCaches,
    ) -> ReconcileResult<LookupValueId> {
        let raw = record.raw_value(attribute);
        let table = context.table(attribute);
        let resolver = &self.resolver;

        caches
            .for_attribute(attribute)
            .get_or_resolve(raw, move || resolver.resolve(table, raw, attribute.display_name()))
            .await
    }
}
