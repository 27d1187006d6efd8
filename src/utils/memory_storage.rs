//! In-memory storage implementation for testing

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct VariantData {
    loans: Vec<SampledLoan>,
    imports: Vec<LoanImportRecord>,
}

#[derive(Debug, Default)]
struct StorageData {
    tables: Vec<LookupTable>,
    values: Vec<LookupValue>,
    primary: VariantData,
    dar: VariantData,
    update_logs: Vec<UpdateLog>,
    failing_updates: HashSet<String>,
}

impl StorageData {
    fn variant(&self, variant: LoanVariant) -> &VariantData {
        match variant {
            LoanVariant::Primary => &self.primary,
            LoanVariant::Dar => &self.dar,
        }
    }

    fn variant_mut(&mut self, variant: LoanVariant) -> &mut VariantData {
        match variant {
            LoanVariant::Primary => &mut self.primary,
            LoanVariant::Dar => &mut self.dar,
        }
    }
}

/// In-memory storage implementation for testing and development
///
/// Counts lookup queries and saves so tests can observe round-trips.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: Arc<RwLock<StorageData>>,
    lookup_queries: Arc<AtomicUsize>,
    lookup_saves: Arc<AtomicUsize>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lookup table and return it
    pub fn add_lookup_table(&self, table: LookupTable) -> LookupTable {
        self.data.write().unwrap().tables.push(table.clone());
        table
    }

    /// Add a lookup value directly, assigning an identifier if it has none
    pub fn add_lookup_value(&self, mut value: LookupValue) -> LookupValueId {
        let id = *value.id.get_or_insert_with(LookupValueId::new);
        self.data.write().unwrap().values.push(value);
        id
    }

    /// Add a sampled loan to a variant's record set
    pub fn add_sampled_loan(&self, variant: LoanVariant, loan: SampledLoan) {
        self.data
            .write()
            .unwrap()
            .variant_mut(variant)
            .loans
            .push(loan);
    }

    /// Add a population record to a variant's import set
    pub fn add_import_record(&self, variant: LoanVariant, record: LoanImportRecord) {
        self.data
            .write()
            .unwrap()
            .variant_mut(variant)
            .imports
            .push(record);
    }

    /// Make updates of the given loan id fail with a storage error
    pub fn fail_update_for(&self, loan_id: &str) {
        self.data
            .write()
            .unwrap()
            .failing_updates
            .insert(loan_id.to_string());
    }

    pub fn lookup_table(&self, code: &str) -> Option<LookupTable> {
        self.data
            .read()
            .unwrap()
            .tables
            .iter()
            .find(|t| t.code == code)
            .cloned()
    }

    /// Lookup values of one table, in insertion order
    pub fn lookup_values(&self, table_id: LookupTableId) -> Vec<LookupValue> {
        self.data
            .read()
            .unwrap()
            .values
            .iter()
            .filter(|v| v.table_id == table_id)
            .cloned()
            .collect()
    }

    pub fn sampled_loans(&self, variant: LoanVariant) -> Vec<SampledLoan> {
        self.data.read().unwrap().variant(variant).loans.clone()
    }

    pub fn sampled_loan(&self, variant: LoanVariant, key: &SampledLoanKey) -> Option<SampledLoan> {
        self.data
            .read()
            .unwrap()
            .variant(variant)
            .loans
            .iter()
            .find(|l| &l.key == key)
            .cloned()
    }

    pub fn update_logs(&self) -> Vec<UpdateLog> {
        self.data.read().unwrap().update_logs.clone()
    }

    /// Number of `get_lookup_value_by_code` calls served
    pub fn lookup_query_count(&self) -> usize {
        self.lookup_queries.load(Ordering::SeqCst)
    }

    /// Number of `save_lookup_value` calls served
    pub fn saved_lookup_value_count(&self) -> usize {
        self.lookup_saves.load(Ordering::SeqCst)
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        *self.data.write().unwrap() = StorageData::default();
        self.lookup_queries.store(0, Ordering::SeqCst);
        self.lookup_saves.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl LookupService for MemoryStorage {
    async fn get_lookup_table(&self, code: &str) -> ReconcileResult<Option<LookupTable>> {
        Ok(self.lookup_table(code))
    }

    async fn get_lookup_value_by_code(
        &self,
        table_code: &str,
        code: &str,
    ) -> ReconcileResult<Option<LookupValue>> {
        self.lookup_queries.fetch_add(1, Ordering::SeqCst);
        let data = self.data.read().unwrap();
        let Some(table) = data.tables.iter().find(|t| t.code == table_code) else {
            return Ok(None);
        };
        Ok(data
            .values
            .iter()
            .find(|v| v.table_id == table.id && v.code == code)
            .cloned())
    }

    async fn save_lookup_value(&self, value: &LookupValue) -> ReconcileResult<LookupValueId> {
        self.lookup_saves.fetch_add(1, Ordering::SeqCst);
        let mut data = self.data.write().unwrap();
        if !data.tables.iter().any(|t| t.id == value.table_id) {
            return Err(ReconcileError::Storage(format!(
                "Lookup table {} does not exist",
                value.table_id
            )));
        }

        let id = LookupValueId::new();
        let mut saved = value.clone();
        saved.id = Some(id);
        data.values.push(saved);
        Ok(id)
    }
}

#[async_trait]
impl SampleStore for MemoryStorage {
    async fn sampled_loans_to_process(
        &self,
        variant: LoanVariant,
    ) -> ReconcileResult<Vec<SampledLoan>> {
        Ok(self
            .data
            .read()
            .unwrap()
            .variant(variant)
            .loans
            .iter()
            .filter(|loan| loan.has_lookup_values())
            .cloned()
            .collect())
    }

    async fn find_import_record(
        &self,
        variant: LoanVariant,
        loan_number: &str,
    ) -> ReconcileResult<Option<LoanImportRecord>> {
        Ok(self
            .data
            .read()
            .unwrap()
            .variant(variant)
            .imports
            .iter()
            .find(|record| record.loan_number.trim() == loan_number)
            .cloned())
    }

    async fn update_sampled_loan(
        &self,
        variant: LoanVariant,
        key: &SampledLoanKey,
        resolved: &ResolvedLookups,
    ) -> ReconcileResult<()> {
        let mut data = self.data.write().unwrap();
        if data.failing_updates.contains(&key.loan_id) {
            return Err(ReconcileError::Storage(format!(
                "update of sampled loan {} rejected",
                key
            )));
        }

        // Matches SQL UPDATE semantics: zero matching rows is not an error
        for loan in data
            .variant_mut(variant)
            .loans
            .iter_mut()
            .filter(|l| &l.key == key)
        {
            loan.underwriter_name = Some(resolved.underwriter_name);
            loan.underwriting_group = Some(resolved.underwriting_group);
        }
        Ok(())
    }

    async fn delete_unused_lookup_values(
        &self,
        table: &LookupTable,
        attribute: LookupAttribute,
    ) -> ReconcileResult<u64> {
        let mut data = self.data.write().unwrap();
        let referenced: HashSet<LookupValueId> = LoanVariant::ALL
            .iter()
            .flat_map(|variant| data.variant(*variant).loans.iter())
            .filter_map(|loan| loan.lookup(attribute))
            .collect();

        let before = data.values.len();
        data.values.retain(|value| {
            value.table_id != table.id || value.id.is_some_and(|id| referenced.contains(&id))
        });
        Ok((before - data.values.len()) as u64)
    }

    async fn insert_update_log(&self, log: &UpdateLog) -> ReconcileResult<()> {
        self.data.write().unwrap().update_logs.push(log.clone());
        Ok(())
    }
}
